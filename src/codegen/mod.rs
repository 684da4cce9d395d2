//! Shared code-emission plumbing used by all three target generators.
//!
//! `CodeWriter` keeps an indent stack and streams newline-terminated lines,
//! mirroring the reference's `begin_line`/`end_line`-driven emission. Each
//! generator otherwise owns its own AST walk, since the three targets differ
//! enough in syntax that a shared visitor would mostly be `match` arms that
//! immediately diverge.

pub mod glsl;
pub mod hlsl;
pub mod msl;

use crate::types::{BaseKind, ElementKind, NumericType, Type};
use std::fmt::Write as _;

/// Accumulates generated source text with indentation tracking.
///
/// `write`/`write_line` start a fresh line (applying the current indent)
/// only when the cursor is at the start of a line; `begin_line`/`end_line`
/// let a generator stream a single logical line across several calls (useful
/// while walking an expression tree without building an intermediate
/// string).
pub struct CodeWriter {
    out: String,
    indent: usize,
    at_line_start: bool,
}

impl CodeWriter {
    pub fn new() -> CodeWriter {
        CodeWriter { out: String::new(), indent: 0, at_line_start: true }
    }

    pub fn indent(&mut self) {
        self.indent += 1;
    }

    pub fn dedent(&mut self) {
        self.indent = self.indent.saturating_sub(1);
    }

    /// Writes the current indentation if the cursor sits at a fresh line;
    /// a no-op mid-line. Call before streaming a new logical line.
    pub fn begin_line(&mut self) {
        if self.at_line_start {
            for _ in 0..self.indent {
                self.out.push_str("    ");
            }
            self.at_line_start = false;
        }
    }

    /// Terminates the current line.
    pub fn end_line(&mut self) {
        self.out.push('\n');
        self.at_line_start = true;
    }

    /// Writes `text` on the current line, opening one if needed.
    pub fn write(&mut self, text: &str) {
        self.begin_line();
        self.out.push_str(text);
    }

    /// `write` followed by `end_line`.
    pub fn write_line(&mut self, text: &str) {
        self.write(text);
        self.end_line();
    }

    /// A blank line, regardless of current position.
    pub fn blank_line(&mut self) {
        if !self.at_line_start {
            self.end_line();
        }
        self.out.push('\n');
    }

    pub fn write_fmt_args(&mut self, args: std::fmt::Arguments<'_>) {
        self.begin_line();
        let _ = self.out.write_fmt(args);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

impl Default for CodeWriter {
    fn default() -> CodeWriter {
        CodeWriter::new()
    }
}

/// `write!(writer, "...")`-style helper, since `CodeWriter` doesn't
/// implement `fmt::Write` directly (it needs to intercept every write to
/// apply indentation at line starts).
macro_rules! cw_write {
    ($w:expr, $($arg:tt)*) => {
        $w.write_fmt_args(format_args!($($arg)*))
    };
}
pub(crate) use cw_write;

/// Splits a `register(...)` identifier like `"b3"` or `"t0"` into its
/// register-letter class and slot number.
pub fn parse_register(text: &str) -> Option<(char, u32)> {
    let letter = text.chars().next()?;
    let digits = &text[letter.len_utf8()..];
    let slot: u32 = digits.parse().ok()?;
    Some((letter.to_ascii_lowercase(), slot))
}

pub fn element_kind_name(elem: ElementKind) -> &'static str {
    match elem {
        ElementKind::Bool => "bool",
        ElementKind::Int => "int",
        ElementKind::Uint => "uint",
        ElementKind::Half => "half",
        ElementKind::Float => "float",
        ElementKind::Min16Float => "min16float",
        ElementKind::Min10Float => "min10float",
    }
}

/// Canonical HLSL spelling of a numeric type (`float`, `float3`, `float4x4`).
pub fn numeric_type_name(n: NumericType) -> String {
    let base = element_kind_name(n.elem);
    if n.is_scalar() {
        base.to_string()
    } else if n.is_vector() {
        format!("{base}{}", n.rows)
    } else {
        format!("{base}{}x{}", n.rows, n.cols)
    }
}

/// Canonical HLSL spelling of a `BaseKind`, ignoring array dims (callers
/// append those themselves since the three targets place them differently).
pub fn base_kind_name(base: &BaseKind, resolve: impl Fn(crate::string_pool::Symbol) -> String) -> String {
    match base {
        BaseKind::Void => "void".to_string(),
        BaseKind::Numeric(n) => numeric_type_name(*n),
        BaseKind::UserDefined(name) => resolve(*name),
        BaseKind::UserMacro => "/* macro */".to_string(),
        BaseKind::Unknown => "/* unknown */".to_string(),
        BaseKind::SamplerState => "SamplerState".to_string(),
        BaseKind::SamplerComparisonState => "SamplerComparisonState".to_string(),
        BaseKind::TextureState => "Texture".to_string(),
        BaseKind::RWTextureState => "RWTexture".to_string(),
        BaseKind::PatchControlPoint => "PatchControlPoint".to_string(),
        BaseKind::Texture(_) | BaseKind::DepthTexture(_) | BaseKind::LegacySampler(_) => {
            "/* texture */".to_string()
        }
        BaseKind::Buffer(_) => "/* buffer */".to_string(),
        BaseKind::Patch(_) => "/* patch */".to_string(),
        BaseKind::SamplerStateField(_) => "/* sampler field */".to_string(),
    }
}

/// `true` for the float4/half4-family return types `EmulateAlphaTest` (and
/// the GLSL/MSL fragment-output path) special-case.
pub fn is_vector4_or_scalar_float(ty: &Type) -> (bool, bool) {
    match &ty.base {
        BaseKind::Numeric(n) if n.is_vector() && n.rows == 4 => (true, false),
        BaseKind::Numeric(n) if n.is_scalar() => (false, true),
        _ => (false, false),
    }
}

/// Per-invocation binding-slot counters for targets (GLSL, MSL) that assign
/// dense numbers in order of first use rather than re-emitting the source
/// register text.
#[derive(Default)]
pub struct BindingCounters {
    pub buffer: u32,
    pub texture: u32,
    pub sampler: u32,
}

impl BindingCounters {
    pub fn next_buffer(&mut self) -> u32 {
        let slot = self.buffer;
        self.buffer += 1;
        slot
    }

    pub fn next_texture(&mut self) -> u32 {
        let slot = self.texture;
        self.texture += 1;
        slot
    }

    pub fn next_sampler(&mut self) -> u32 {
        let slot = self.sampler;
        self.sampler += 1;
        slot
    }
}

/// A caller-supplied binding override, keyed by the resource's source name.
#[derive(Clone, Debug)]
pub struct BindingOverride {
    pub name: String,
    pub set_or_space: u32,
    pub binding: u32,
}

/// A register shift applied during codegen (§6, `shifts` option):
/// `(register letter, space, shift)`.
#[derive(Clone, Debug)]
pub struct RegisterShift {
    pub letter: char,
    pub space: Option<String>,
    pub shift: i32,
}

/// The shader stage an entry point targets (§6's `target` option). GLSL
/// semantic-to-builtin mapping and MSL attribute syntax both depend on it.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum ShaderStage {
    Vertex,
    Fragment,
    Hull,
    Domain,
    Geometry,
    Compute,
}

/// Options threaded into a single generator invocation. A subset of the
/// public `Options` struct (`src/lib.rs`) — only the fields a code generator
/// actually consults.
#[derive(Clone, Debug, Default)]
pub struct GenOptions {
    pub overrides: Vec<BindingOverride>,
    pub shifts: Vec<RegisterShift>,
    pub override_required: bool,
    pub bindings_required: bool,
    pub pack_matrix_row_major: bool,
}

impl GenOptions {
    fn override_for(&self, name: &str) -> Option<(u32, u32)> {
        self.overrides
            .iter()
            .find(|o| o.name == name)
            .map(|o| (o.set_or_space, o.binding))
    }

    fn shift_for(&self, letter: char, space: Option<&str>) -> i32 {
        self.shifts
            .iter()
            .filter(|s| s.letter == letter && s.space.as_deref() == space)
            .map(|s| s.shift)
            .sum()
    }
}
