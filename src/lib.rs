//! HLSL cross-compiler: tokenizer → parser → AST transforms → one of three
//! target code generators (§2's data-flow). See `compile` for the entry
//! point and `Options` for the knobs a caller can turn.

pub mod ast;
pub mod codegen;
pub mod error;
pub mod intrinsics;
pub mod parser;
pub mod preprocessor;
pub mod string_pool;
pub mod token_buffer;
pub mod tokenizer;
pub mod transforms;
pub mod types;

use codegen::{BindingOverride, GenOptions, RegisterShift};
use error::CompileError;
use intrinsics::IntrinsicTable;
use parser::Parser;
use preprocessor::{Macro, Preprocessor};
use string_pool::{StringPool, Symbol};
use token_buffer::TokenBuffer;
use tokenizer::Tokenizer;

pub use codegen::ShaderStage as Target;

/// Output language (§6's `language` option).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Language {
    Hlsl,
    LegacyHlsl,
    Glsl,
    Msl,
}

/// Which pipeline stages to run (§6's `operation` option).
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum Operation {
    Preproc,
    Parse,
    Generate,
}

/// Caller-facing compile options (§6's table).
#[derive(Clone, Debug, Default)]
pub struct Options {
    pub debug_tokens_enable: bool,
    pub debug_tokens_path: String,
    pub debug_preproc_enable: bool,
    pub debug_preproc_path: String,
    pub generated_write_enable: bool,
    pub generated_write_path: String,
    pub language: Option<Language>,
    pub target: Option<Target>,
    pub operation: Operation,
    pub override_required: bool,
    pub overrides: Vec<BindingOverride>,
    pub shifts: Vec<RegisterShift>,
}

impl Default for Operation {
    fn default() -> Operation {
        Operation::Generate
    }
}

impl Options {
    fn gen_options(&self) -> GenOptions {
        GenOptions {
            overrides: self.overrides.clone(),
            shifts: self.shifts.clone(),
            override_required: self.override_required,
            bindings_required: self.override_required,
            pack_matrix_row_major: false,
        }
    }
}

/// §6's output record: success + error text per phase, plus whatever text
/// each phase produced.
#[derive(Clone, Debug, Default)]
pub struct ParsedData {
    pub preproc_ok: bool,
    pub preproc_errors: Vec<String>,
    pub preprocessed_text: String,
    pub loaded_files: Vec<String>,

    pub parse_ok: bool,
    pub parse_errors: Vec<String>,

    pub generate_ok: bool,
    pub generate_errors: Vec<String>,
    pub generated_text: String,
}

/// Runs the pipeline named by `options.operation`, stopping at the first
/// phase that fails (§7's error policy: preprocessor error aborts before
/// tokenizing, parse error aborts before codegen, codegen errors are
/// accumulated and do not stop emission).
pub fn compile(
    source: &str,
    entry: &str,
    macros: &[Macro],
    preprocessor: &mut impl Preprocessor,
    options: &Options,
) -> Result<ParsedData, CompileError> {
    let mut result = ParsedData::default();

    let preproc = preprocessor.fetch_preproc(source, macros);
    result.preproc_ok = preproc.ok;
    result.preproc_errors = preproc.errors.clone();
    result.preprocessed_text = preproc.output.clone();
    if !preproc.ok {
        log::error!("preprocessor failed: {:?}", preproc.errors);
        return Err(CompileError::Preprocessor(preproc.errors.join("\n")));
    }
    if options.debug_preproc_enable {
        log::debug!("preprocessed output ({}):\n{}", options.debug_preproc_path, preproc.debug);
    }
    if options.operation == Operation::Preproc {
        return Ok(result);
    }

    let mut pool = StringPool::new();
    let file = pool.intern("input.hlsl");
    let tokenizer = Tokenizer::new(&preproc.output, file, 1, &pool);
    let buffer = TokenBuffer::drain(tokenizer, &mut pool, file);

    if options.debug_tokens_enable {
        log::debug!("token dump ({}):\n{}", options.debug_tokens_path, buffer.dump(&pool));
    }

    let intrinsics = IntrinsicTable::build(&mut pool);
    let module = match Parser::parse(buffer, &mut pool, &intrinsics) {
        Ok(module) => {
            result.parse_ok = true;
            module
        }
        Err(e) => {
            result.parse_ok = false;
            result.parse_errors = vec![e.to_string()];
            log::error!("parse failed: {e}");
            return Err(CompileError::Parse(e));
        }
    };

    if options.operation == Operation::Parse {
        return Ok(result);
    }

    let entry_symbol = pool.intern(entry);
    let (text, errors) = generate(&module, &pool, &entry_symbol, options);
    result.generate_ok = errors.is_empty();
    result.generate_errors = errors.iter().map(|e| e.to_string()).collect();
    result.generated_text = text;
    if !result.generate_ok {
        log::error!("codegen produced {} error(s)", errors.len());
    }
    if options.generated_write_enable {
        log::debug!("generated output ({}):\n{}", options.generated_write_path, result.generated_text);
    }
    Ok(result)
}

fn generate(
    module: &ast::Module,
    pool: &StringPool,
    entry: &Symbol,
    options: &Options,
) -> (String, Vec<error::CodegenError>) {
    let gen_options = options.gen_options();
    let stage = options.target.unwrap_or(Target::Fragment);
    match options.language.unwrap_or(Language::Hlsl) {
        Language::Hlsl | Language::LegacyHlsl => codegen::hlsl::generate(module, pool, &gen_options),
        Language::Glsl => codegen::glsl::generate(module, pool, &gen_options, *entry, stage),
        Language::Msl => codegen::msl::generate(module, pool, &gen_options, *entry, stage),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_pass_through_hlsl() {
        let mut pre = preprocessor::NullPreprocessor;
        let options = Options { language: Some(Language::Hlsl), target: Some(Target::Vertex), ..Options::default() };
        let result = compile(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            "main",
            &[],
            &mut pre,
            &options,
        )
        .expect("compiles");
        assert!(result.parse_ok);
        assert!(result.generate_ok);
        assert!(result.generated_text.contains("float4 main"));
        assert!(result.generated_text.contains("return pos;"));
    }

    #[test]
    fn glsl_vertex_target_marshals_position_semantic() {
        let mut pre = preprocessor::NullPreprocessor;
        let options = Options { language: Some(Language::Glsl), target: Some(Target::Vertex), ..Options::default() };
        let result = compile(
            "float4 main(float4 pos : POSITION) : SV_Position { return pos; }",
            "main",
            &[],
            &mut pre,
            &options,
        )
        .expect("compiles");
        assert!(result.generate_ok);
        assert!(result.generated_text.contains("#version 450"));
        assert!(result.generated_text.contains("gl_Position = pos;"));
    }

    #[test]
    fn preproc_only_operation_stops_before_parsing() {
        let mut pre = preprocessor::NullPreprocessor;
        let options = Options { operation: Operation::Preproc, ..Options::default() };
        let result = compile("float4 main() : SV_Position { return 0; }", "main", &[], &mut pre, &options)
            .expect("preproc stage itself can't fail with NullPreprocessor");
        assert!(!result.parse_ok);
        assert!(result.preproc_ok);
    }
}
