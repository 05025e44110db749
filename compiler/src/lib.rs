//! Pipeline entry point: source text in, generated `.il`/`.j` text out.
//! Wires the three independently-testable stages — `parser::parse_program`,
//! `semantic::Analyzer::analyze_program`, `backend::{cil,jvm}::generate` —
//! the way the teacher crate's `Compiler<P, A, G>` wires its own parse/
//! analyze/generate stages, but as one concrete function rather than a
//! generic struct: there is exactly one parser and one analyzer here, so
//! the extra type parameters buy nothing.

pub mod backend;
pub mod parser;
pub mod semantic;

use rusco_common::error::CompileError;

/// Which virtual machine to target. Chosen by the CLI's `--target` flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Cil,
    Jvm,
}

impl Target {
    pub fn file_extension(self) -> &'static str {
        match self {
            Target::Cil => "il",
            Target::Jvm => "j",
        }
    }
}

/// Runs the full pipeline over `source` and returns the generated
/// assembly text for `target`. `module_name` becomes the CIL assembly
/// name or the JVM class name.
pub fn compile(source: &str, target: Target, module_name: &str) -> Result<String, CompileError> {
    let mut root = parser::parse_program(source)?;

    let mut analyzer = semantic::Analyzer::new();
    analyzer.analyze_program(&mut root)?;

    let code = match target {
        Target::Cil => backend::cil::generate(&root, &analyzer.arena, &analyzer.func_scopes, module_name),
        Target::Jvm => backend::jvm::generate(&root, &analyzer.arena, &analyzer.func_scopes, module_name),
    };
    Ok(code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compiles_minimal_program_to_both_targets() {
        let source = "пустота главный() { вернуть; }";
        let cil = compile(source, Target::Cil, "test").unwrap();
        assert!(cil.contains(".entrypoint"));
        let jvm = compile(source, Target::Jvm, "Test").unwrap();
        assert!(jvm.contains(".method public static main"));
    }

    #[test]
    fn syntax_error_is_reported() {
        let err = compile("пустота главный(", Target::Cil, "test").unwrap_err();
        assert!(matches!(err, CompileError::Syntax(_)));
    }

    #[test]
    fn missing_entry_point_is_reported() {
        let err = compile("пустота другая() { вернуть; }", Target::Cil, "test").unwrap_err();
        assert!(matches!(err, CompileError::InvalidProgramShape { .. }));
    }
}
