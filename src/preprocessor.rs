//! The C preprocessor, named by its interface only (§1: "explicitly out of
//! scope... treat as external collaborators named by their interface
//! only"). `compile()` accepts anything implementing `Preprocessor`; this
//! crate ships only `NullPreprocessor`, a pass-through used by tests and by
//! callers who preprocess their source themselves before calling in.

/// One `(name, value)` macro definition fed to the preprocessor.
#[derive(Clone, Debug)]
pub struct Macro {
    pub name: String,
    pub value: String,
}

/// Result of running the preprocessor over one file.
pub struct PreprocResult {
    pub output: String,
    pub errors: Vec<String>,
    pub debug: String,
    pub ok: bool,
}

/// `fetch_preproc(filename, macros) -> (output, errors, debug, ok)` from
/// §6's external-interfaces table.
pub trait Preprocessor {
    fn fetch_preproc(&mut self, filename: &str, macros: &[Macro]) -> PreprocResult;
}

/// Passes the named file's contents through unchanged. `filename` is
/// treated as the literal source text rather than a path, since this crate
/// has no file-I/O layer of its own (§1's "on-disk file I/O" Non-goal).
#[derive(Default)]
pub struct NullPreprocessor;

impl Preprocessor for NullPreprocessor {
    fn fetch_preproc(&mut self, filename: &str, _macros: &[Macro]) -> PreprocResult {
        PreprocResult { output: filename.to_string(), errors: Vec::new(), debug: String::new(), ok: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_preprocessor_passes_source_through() {
        let mut p = NullPreprocessor;
        let result = p.fetch_preproc("float4 main() : SV_Position { return 0; }", &[]);
        assert!(result.ok);
        assert!(result.errors.is_empty());
        assert_eq!(result.output, "float4 main() : SV_Position { return 0; }");
    }
}
