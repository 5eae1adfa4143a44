pub mod error;
pub mod token;

mod engine;
mod indent;
mod lexer;
mod stream;
mod symbol;
mod vmwriter;

use std::io::Write;

pub use error::{Error, Result};
pub use token::{Token, TokenKind};

/// Lexes, filters, parses and emits VM code for one Ijk source file in a
/// single pass. `out` receives the VM listing; nothing is written once
/// compilation fails partway through a statement.
pub fn compile(source: &str, out: &mut dyn Write) -> Result<()> {
    log::debug!("tokenizing {} bytes of source", source.len());
    let (raw, diagnostics) = lexer::tokenize(source)?;
    for diag in &diagnostics {
        log::warn!("{diag}");
    }
    let tokens = indent::filter(raw)?;
    log::debug!("{} tokens after indent filtering", tokens.len());
    engine::CompilationEngine::new(tokens, out).compile()
}

/// Tokenizes and indent-filters `source` without compiling it, exposing the
/// final token stream for diagnostics (`ijk-cli --show-tokens`).
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let (raw, diagnostics) = lexer::tokenize(source)?;
    for diag in &diagnostics {
        log::warn!("{diag}");
    }
    indent::filter(raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compile_end_to_end() {
        let mut out = Vec::new();
        compile("class A:\n  method f() -> void:\n    return\n", &mut out).unwrap();
        let vm = String::from_utf8(out).unwrap();
        assert!(vm.starts_with("function A.f 0\n"));
        assert!(vm.contains("return\n"));
    }

    #[test]
    fn tokenize_reports_indentation_errors() {
        let err = tokenize("x\n  y\n").unwrap_err();
        assert!(matches!(err, Error::UnexpectedIndent { .. }));
    }
}
