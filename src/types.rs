//! Base types and the `Type` descriptor attached to declarations and
//! expressions.
//!
//! The reference tokenizer/parser uses one dense `HLSLBaseType` enum with
//! `First*`/`Last*` markers so a range check doubles as a predicate
//! (`IsTextureType`, `isScalarType`, …). A flat Rust enum with ~150
//! near-identical `FloatNxM` variants would bury that structure; this port
//! keeps the predicates but groups the data the way Rust prefers: numeric
//! types are `(ElementKind, rows, cols)` rather than one variant apiece, and
//! textures/buffers/samplers are their own small enums. `is_numeric`,
//! `is_texture`, `is_buffer`, `is_matrix`, `is_vector`, `is_scalar` below are
//! the predicate helpers the reference relied on range checks for.

use crate::string_pool::Symbol;
use smallvec::SmallVec;

/// The scalar element a numeric type is built from.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum ElementKind {
    Bool,
    Int,
    Uint,
    Half,
    Float,
    Min16Float,
    Min10Float,
}

impl ElementKind {
    /// True for the three integral element kinds (`FirstInteger..=LastInteger`
    /// in the reference enum).
    pub fn is_integer(self) -> bool {
        matches!(self, ElementKind::Bool | ElementKind::Int | ElementKind::Uint)
    }
}

/// A scalar, vector, or matrix numeric type: `rows == 1 && cols == 1` is a
/// scalar, `cols == 1 && rows > 1` is a vector, anything else a matrix.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct NumericType {
    pub elem: ElementKind,
    pub rows: u8,
    pub cols: u8,
}

impl NumericType {
    pub fn scalar(elem: ElementKind) -> NumericType {
        NumericType { elem, rows: 1, cols: 1 }
    }

    pub fn vector(elem: ElementKind, rows: u8) -> NumericType {
        NumericType { elem, rows, cols: 1 }
    }

    pub fn matrix(elem: ElementKind, rows: u8, cols: u8) -> NumericType {
        NumericType { elem, rows, cols }
    }

    pub fn is_scalar(self) -> bool {
        self.rows == 1 && self.cols == 1
    }

    pub fn is_vector(self) -> bool {
        self.cols == 1 && self.rows > 1
    }

    pub fn is_matrix(self) -> bool {
        self.cols > 1
    }
}

/// Dimensionality shared by textures and their `RW`/rasterizer-ordered
/// siblings (`FirstTexture..LastTexture` in the reference).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum TextureShape {
    Tex1D,
    Tex1DArray,
    Tex2D,
    Tex2DArray,
    Tex3D,
    Tex2DMS,
    Tex2DMSArray,
    Cube,
    CubeArray,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum TextureAccess {
    ReadOnly,
    ReadWrite,
    RasterizerOrdered,
}

#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub struct TextureType {
    pub shape: TextureShape,
    pub access: TextureAccess,
}

/// Legacy combined sampler/texture types (`sampler2D`, `sampler2DShadow`, …)
/// kept for source compatibility with older HLSL.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum LegacySamplerKind {
    Sampler,
    Sampler2D,
    Sampler3D,
    SamplerCube,
    Sampler2DShadow,
    Sampler2DMS,
    Sampler2DArray,
}

/// MSL-only depth texture flavors, emitted only by the Metal generator
/// (`depth2d<float>`, …) and otherwise opaque to the other two targets.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum DepthTextureShape {
    Depth2D,
    Depth2DArray,
    DepthCube,
    DepthCubeArray,
    Depth2DMS,
    Depth2DMSArray,
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum BufferKind {
    CBuffer,
    TBuffer,
    ConstantBuffer,
    StructuredBuffer,
    Buffer,
    RWBuffer,
    RWStructuredBuffer,
    ByteAddressBuffer,
    RWByteAddressBuffer,
    RasterizerOrderedBuffer,
    RasterizerOrderedStructuredBuffer,
    RasterizerOrderedByteAddressBuffer,
}

impl BufferKind {
    pub fn is_structured(self) -> bool {
        matches!(
            self,
            BufferKind::StructuredBuffer
                | BufferKind::RWStructuredBuffer
                | BufferKind::RasterizerOrderedStructuredBuffer
        )
    }

    pub fn is_read_write(self) -> bool {
        matches!(
            self,
            BufferKind::RWBuffer
                | BufferKind::RWStructuredBuffer
                | BufferKind::RWByteAddressBuffer
                | BufferKind::RasterizerOrderedBuffer
                | BufferKind::RasterizerOrderedStructuredBuffer
                | BufferKind::RasterizerOrderedByteAddressBuffer
        )
    }
}

/// Patch/stream element-type modifiers used only as tessellation or geometry
/// shader argument types (`InputPatch<T, N>`, `PointStream<T>`, …).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum PatchKind {
    InputPatch,
    OutputPatch,
    PointStream,
    LineStream,
    TriangleStream,
    Point,
    Line,
    Triangle,
    LineAdj,
    TriangleAdj,
}

/// One field in a `SamplerState { ... }` body.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Debug)]
pub enum SamplerStateField {
    Filter,
    AddressU,
    AddressV,
    AddressW,
    MipLodBias,
    MaxAnisotropy,
    MinLod,
    MaxLod,
    BorderColor,
    ComparisonFunc,
}

/// The base kind of a `Type`. `is_numeric`/`is_texture`/`is_buffer` below
/// replace the reference's range checks on a flat enum.
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum BaseKind {
    Void,
    Numeric(NumericType),
    Texture(TextureType),
    DepthTexture(DepthTextureShape),
    LegacySampler(LegacySamplerKind),
    SamplerState,
    SamplerComparisonState,
    SamplerStateField(SamplerStateField),
    TextureState,
    RWTextureState,
    Buffer(BufferKind),
    Patch(PatchKind),
    PatchControlPoint,
    /// A struct, named by its interned identifier.
    UserDefined(Symbol),
    /// A `#define`-expanded or otherwise opaque macro token, preserved as a
    /// pass-through marker (see `SPEC_FULL.md` §3 "Supplemented from
    /// original_source").
    UserMacro,
    /// Placeholder used during error recovery.
    Unknown,
}

impl BaseKind {
    pub fn is_numeric(&self) -> bool {
        matches!(self, BaseKind::Numeric(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, BaseKind::Numeric(n) if n.elem.is_integer())
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, BaseKind::Numeric(n) if n.is_scalar())
    }

    pub fn is_vector(&self) -> bool {
        matches!(self, BaseKind::Numeric(n) if n.is_vector())
    }

    pub fn is_matrix(&self) -> bool {
        matches!(self, BaseKind::Numeric(n) if n.is_matrix())
    }

    pub fn is_texture(&self) -> bool {
        matches!(
            self,
            BaseKind::Texture(_) | BaseKind::DepthTexture(_) | BaseKind::LegacySampler(_)
        )
    }

    pub fn is_buffer(&self) -> bool {
        matches!(self, BaseKind::Buffer(_))
    }

    pub fn is_sampler(&self) -> bool {
        matches!(
            self,
            BaseKind::SamplerState | BaseKind::SamplerComparisonState | BaseKind::LegacySampler(_)
        )
    }
}

bitflags::bitflags! {
    /// Storage-class and interpolation modifiers. Several can apply to the
    /// same declaration (`static const`, `centroid noperspective`).
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
    pub struct TypeFlags: u16 {
        const CONST            = 1 << 0;
        const STATIC            = 1 << 1;
        const UNIFORM            = 1 << 2;
        const IN                = 1 << 3;
        const OUT                = 1 << 4;
        const INOUT             = 1 << 5;
        const LINEAR            = 1 << 6;
        const CENTROID           = 1 << 7;
        const NOINTERPOLATION    = 1 << 8;
        const NOPERSPECTIVE      = 1 << 9;
        const SAMPLE             = 1 << 10;
        const ROW_MAJOR          = 1 << 11;
        const COLUMN_MAJOR       = 1 << 12;
    }
}

/// Address space, relevant only to the MSL generator's class-argument
/// lifting (`constant`, `device`, `thread`, `threadgroup`); the other two
/// targets ignore it.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
pub enum AddressSpace {
    #[default]
    Undefined,
    Constant,
    Device,
    Thread,
    Threadgroup,
}

/// One array dimension: a literal extent, an identifier referring to a
/// `static const` integer, or `[]` (runtime-sized, only legal on the last
/// dimension of a structured/byte-address buffer element).
#[derive(Clone, Eq, PartialEq, Hash, Debug)]
pub enum ArrayDim {
    Literal(u32),
    Ident(Symbol),
    Unsized,
}

/// The full type of a declaration, argument, or expression result.
#[derive(Clone, PartialEq, Debug)]
pub struct Type {
    pub base: BaseKind,
    pub flags: TypeFlags,
    pub address_space: AddressSpace,
    /// Non-empty for arrays; up to 3 dimensions as in the reference grammar.
    pub array_dims: SmallVec<[ArrayDim; 3]>,
    /// Element type of a templated container (`StructuredBuffer<T>`,
    /// `Texture2D<T>`), boxed to avoid an infinite-size `Type`.
    pub element_type: Option<Box<Type>>,
    /// Multisample sample count, e.g. `Texture2DMS<float4, 4>`.
    pub sample_count: Option<u32>,
}

impl Type {
    pub fn scalar(elem: ElementKind) -> Type {
        Type::new(BaseKind::Numeric(NumericType::scalar(elem)))
    }

    pub fn new(base: BaseKind) -> Type {
        Type {
            base,
            flags: TypeFlags::empty(),
            address_space: AddressSpace::Undefined,
            array_dims: SmallVec::new(),
            element_type: None,
            sample_count: None,
        }
    }

    pub fn void() -> Type {
        Type::new(BaseKind::Void)
    }

    pub fn is_array(&self) -> bool {
        !self.array_dims.is_empty()
    }

    pub fn with_flags(mut self, flags: TypeFlags) -> Type {
        self.flags |= flags;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vector_and_matrix_classification() {
        let v = NumericType::vector(ElementKind::Float, 3);
        assert!(v.is_vector());
        assert!(!v.is_matrix());
        assert!(!v.is_scalar());

        let m = NumericType::matrix(ElementKind::Float, 4, 4);
        assert!(m.is_matrix());
        assert!(!m.is_vector());
    }

    #[test]
    fn base_kind_predicates() {
        let tex = BaseKind::Texture(TextureType { shape: TextureShape::Tex2D, access: TextureAccess::ReadOnly });
        assert!(tex.is_texture());
        assert!(!tex.is_buffer());

        let buf = BaseKind::Buffer(BufferKind::RWStructuredBuffer);
        assert!(buf.is_buffer());
        assert!(BufferKind::RWStructuredBuffer.is_read_write());
        assert!(BufferKind::RWStructuredBuffer.is_structured());
    }

    #[test]
    fn integer_element_kinds() {
        assert!(ElementKind::Uint.is_integer());
        assert!(!ElementKind::Float.is_integer());
    }
}
