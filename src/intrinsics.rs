//! Built-in intrinsic function table.
//!
//! Built once at parser construction (§3's "intrinsic table" component) and
//! consulted by [`crate::parser`] during call-expression parsing to decide
//! whether an identifier names a user function or a built-in, and by the
//! three code generators to decide how to rewrite the call for its target.
//! Table-as-data per the REDESIGN FLAGS note on intrinsic dispatch: overload
//! resolution here is arity-based (matching the argument *count*, since this
//! crate defers full type-checking to the downstream compiler per §1's
//! scope), and each entry's return type is a [`ReturnTypeRule`] value rather
//! than a closure.
use crate::string_pool::{StringPool, Symbol};
use crate::types::ElementKind;
use indexmap::IndexMap;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum IntrinsicId {
    // Texture methods
    Sample,
    SampleLevel,
    SampleGrad,
    SampleCmp,
    SampleCmpLevelZero,
    Load,
    Gather,
    GetDimensions,
    // Wave ops
    WaveReadLaneFirst,
    WaveActiveBallot,
    WaveGetLaneIndex,
    WaveGetLaneCount,
    QuadReadAcrossX,
    QuadReadAcrossY,
    QuadReadAcrossDiagonal,
    // Atomics
    InterlockedAdd,
    InterlockedCompareExchange,
    InterlockedExchange,
    InterlockedMin,
    InterlockedMax,
    InterlockedAnd,
    InterlockedOr,
    InterlockedXor,
    // Math
    Dot,
    Cross,
    Mul,
    Normalize,
    Length,
    Pow,
    Exp,
    Log,
    Sin,
    Cos,
    Tan,
    Asin,
    Acos,
    Atan,
    Atan2,
    Sqrt,
    Rsqrt,
    Saturate,
    Lerp,
    Clamp,
    Min,
    Max,
    Abs,
    Sign,
    Floor,
    Ceil,
    Round,
    Frac,
    Fmod,
    Step,
    Smoothstep,
    Reflect,
    Refract,
    Transpose,
    Determinant,
    Ddx,
    Ddy,
    Fwidth,
    Mad,
}

/// How an intrinsic's result type is computed from its call-site argument
/// types, carried as data so code generators and the parser share one rule
/// set instead of re-deriving it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ReturnTypeRule {
    /// Same type as the first argument (most elementwise math intrinsics).
    SameAsFirstArg,
    /// A fixed scalar element kind (e.g. `length` always returns a float).
    Scalar(ElementKind),
    /// The element-wise vector/scalar dot/cross result: same element kind
    /// as the operands, but always a scalar for `dot`.
    DotProduct,
    /// Same row/col shape as the first argument, but transposed.
    TransposedFirstArg,
    /// No value (atomics writing through an out-parameter, `GetDimensions`).
    Void,
    /// Determined by the texture element type at the call site; computed by
    /// the caller from the receiver, not from the argument list.
    TextureElement,
}

#[derive(Copy, Clone, Debug)]
pub struct IntrinsicSignature {
    pub id: IntrinsicId,
    pub min_args: u8,
    pub max_args: u8,
    pub return_rule: ReturnTypeRule,
}

/// `(name) -> overload set`, built once and shared read-only by the parser
/// and all three generators.
pub struct IntrinsicTable {
    by_name: IndexMap<Symbol, Vec<IntrinsicSignature>>,
}

impl IntrinsicTable {
    pub fn build(pool: &mut StringPool) -> IntrinsicTable {
        let mut by_name: IndexMap<Symbol, Vec<IntrinsicSignature>> = IndexMap::new();
        let mut add = |pool: &mut StringPool,
                       by_name: &mut IndexMap<Symbol, Vec<IntrinsicSignature>>,
                       name: &str,
                       id: IntrinsicId,
                       min_args: u8,
                       max_args: u8,
                       return_rule: ReturnTypeRule| {
            let sym = pool.intern(name);
            by_name.entry(sym).or_default().push(IntrinsicSignature {
                id,
                min_args,
                max_args,
                return_rule,
            });
        };

        use IntrinsicId::*;
        use ReturnTypeRule::*;

        add(pool, &mut by_name, "Sample", Sample, 2, 3, TextureElement);
        add(pool, &mut by_name, "SampleLevel", SampleLevel, 3, 4, TextureElement);
        add(pool, &mut by_name, "SampleGrad", SampleGrad, 4, 5, TextureElement);
        add(pool, &mut by_name, "SampleCmp", SampleCmp, 3, 4, Scalar(ElementKind::Float));
        add(
            pool,
            &mut by_name,
            "SampleCmpLevelZero",
            SampleCmpLevelZero,
            3,
            4,
            Scalar(ElementKind::Float),
        );
        add(pool, &mut by_name, "Load", Load, 1, 3, TextureElement);
        add(pool, &mut by_name, "Gather", Gather, 2, 3, TextureElement);
        add(pool, &mut by_name, "GetDimensions", GetDimensions, 1, 6, Void);

        add(pool, &mut by_name, "WaveReadLaneFirst", WaveReadLaneFirst, 1, 1, SameAsFirstArg);
        add(
            pool,
            &mut by_name,
            "WaveActiveBallot",
            WaveActiveBallot,
            1,
            1,
            Scalar(ElementKind::Uint),
        );
        add(
            pool,
            &mut by_name,
            "WaveGetLaneIndex",
            WaveGetLaneIndex,
            0,
            0,
            Scalar(ElementKind::Uint),
        );
        add(
            pool,
            &mut by_name,
            "WaveGetLaneCount",
            WaveGetLaneCount,
            0,
            0,
            Scalar(ElementKind::Uint),
        );
        add(pool, &mut by_name, "QuadReadAcrossX", QuadReadAcrossX, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "QuadReadAcrossY", QuadReadAcrossY, 1, 1, SameAsFirstArg);
        add(
            pool,
            &mut by_name,
            "QuadReadAcrossDiagonal",
            QuadReadAcrossDiagonal,
            1,
            1,
            SameAsFirstArg,
        );

        add(pool, &mut by_name, "InterlockedAdd", InterlockedAdd, 2, 3, Void);
        add(
            pool,
            &mut by_name,
            "InterlockedCompareExchange",
            InterlockedCompareExchange,
            3,
            4,
            Void,
        );
        add(pool, &mut by_name, "InterlockedExchange", InterlockedExchange, 2, 3, Void);
        add(pool, &mut by_name, "InterlockedMin", InterlockedMin, 2, 3, Void);
        add(pool, &mut by_name, "InterlockedMax", InterlockedMax, 2, 3, Void);
        add(pool, &mut by_name, "InterlockedAnd", InterlockedAnd, 2, 3, Void);
        add(pool, &mut by_name, "InterlockedOr", InterlockedOr, 2, 3, Void);
        add(pool, &mut by_name, "InterlockedXor", InterlockedXor, 2, 3, Void);

        add(pool, &mut by_name, "dot", Dot, 2, 2, DotProduct);
        add(pool, &mut by_name, "cross", Cross, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "mul", Mul, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "normalize", Normalize, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "length", Length, 1, 1, Scalar(ElementKind::Float));
        add(pool, &mut by_name, "pow", Pow, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "exp", Exp, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "log", Log, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "sin", Sin, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "cos", Cos, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "tan", Tan, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "asin", Asin, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "acos", Acos, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "atan", Atan, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "atan2", Atan2, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "sqrt", Sqrt, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "rsqrt", Rsqrt, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "saturate", Saturate, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "lerp", Lerp, 3, 3, SameAsFirstArg);
        add(pool, &mut by_name, "clamp", Clamp, 3, 3, SameAsFirstArg);
        add(pool, &mut by_name, "min", Min, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "max", Max, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "abs", Abs, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "sign", Sign, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "floor", Floor, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "ceil", Ceil, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "round", Round, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "frac", Frac, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "fmod", Fmod, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "step", Step, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "smoothstep", Smoothstep, 3, 3, SameAsFirstArg);
        add(pool, &mut by_name, "reflect", Reflect, 2, 2, SameAsFirstArg);
        add(pool, &mut by_name, "refract", Refract, 3, 3, SameAsFirstArg);
        add(pool, &mut by_name, "transpose", Transpose, 1, 1, TransposedFirstArg);
        add(pool, &mut by_name, "determinant", Determinant, 1, 1, Scalar(ElementKind::Float));
        add(pool, &mut by_name, "ddx", Ddx, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "ddy", Ddy, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "fwidth", Fwidth, 1, 1, SameAsFirstArg);
        add(pool, &mut by_name, "mad", Mad, 3, 3, SameAsFirstArg);

        IntrinsicTable { by_name }
    }

    /// Looks up `name` called with `arg_count` arguments. Returns the first
    /// overload whose arity range matches; ties are broken by declaration
    /// order (the `Vec`'s order, matching `IndexMap`'s insertion order).
    pub fn lookup(&self, name: Symbol, arg_count: usize) -> Option<IntrinsicSignature> {
        let arg_count = arg_count as u8;
        self.by_name.get(&name).and_then(|overloads| {
            overloads
                .iter()
                .find(|sig| arg_count >= sig.min_args && arg_count <= sig.max_args)
                .copied()
        })
    }

    pub fn is_intrinsic_name(&self, name: Symbol) -> bool {
        self.by_name.contains_key(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_dot_by_name_and_arity() {
        let mut pool = StringPool::new();
        let table = IntrinsicTable::build(&mut pool);
        let dot = pool.intern("dot");
        let sig = table.lookup(dot, 2).expect("dot/2 should resolve");
        assert_eq!(sig.id, IntrinsicId::Dot);
        assert_eq!(sig.return_rule, ReturnTypeRule::DotProduct);
    }

    #[test]
    fn arity_outside_signature_range_does_not_match() {
        let mut pool = StringPool::new();
        let table = IntrinsicTable::build(&mut pool);
        let lerp = pool.intern("lerp");
        assert!(table.lookup(lerp, 2).is_none());
        assert!(table.lookup(lerp, 3).is_some());
    }

    #[test]
    fn unknown_name_is_not_an_intrinsic() {
        let mut pool = StringPool::new();
        let table = IntrinsicTable::build(&mut pool);
        let mine = pool.intern("my_user_function");
        assert!(!table.is_intrinsic_name(mine));
        assert!(table.lookup(mine, 1).is_none());
    }

    #[test]
    fn sample_methods_resolve_with_their_variable_arity() {
        let mut pool = StringPool::new();
        let table = IntrinsicTable::build(&mut pool);
        let sample = pool.intern("Sample");
        assert!(table.lookup(sample, 2).is_some());
        assert!(table.lookup(sample, 3).is_some());
        assert!(table.lookup(sample, 5).is_none());
    }
}
