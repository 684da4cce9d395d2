//! Crate-level error types, one per pipeline phase (§7's three-kind policy).

use thiserror::Error;

/// A lexer error. `to_string` reproduces the reference's fixed error-buffer
/// format (`"error) FileName \t: %s\nerror) Line (%d)\t: %s\n"`) so callers
/// diffing error text against the original behave identically.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("error) {file} \t: {message}\nerror) Line ({line})\t: {message}\n")]
pub struct TokenizerError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// A parser error: first-error-latched, filename + line + message.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{file}({line}): {message}")]
pub struct ParseError {
    pub file: String,
    pub line: u32,
    pub message: String,
}

/// A codegen error. Unlike the other two kinds this does not stop emission:
/// the generator keeps producing best-effort output after the first one.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
#[error("{message}")]
pub struct CodegenError {
    pub message: String,
}

/// Aggregates the three phase-specific error kinds behind one type so the
/// top-level `compile` entry point has a single `Result` to return.
#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum CompileError {
    #[error("preprocessor error: {0}")]
    Preprocessor(String),
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("codegen failed with {0} error(s)")]
    Codegen(Vec<CodegenError>),
}
