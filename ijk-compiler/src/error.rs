use thiserror::Error;

/// Everything that can abort a single `compile_class` call.
///
/// Line/column are 1-indexed, matching `Token`. The CLI is responsible for
/// prefixing these with the source file path before printing them.
#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum Error {
    #[error("{line}:{column}: illegal character '{ch}'")]
    Lexical { line: usize, column: usize, ch: char },

    #[error("{line}: expected an indented block")]
    ExpectedIndent { line: usize },

    #[error("{line}: indentation increased but not in a new block")]
    UnexpectedIndent { line: usize },

    #[error("{line}: inconsistent indentation")]
    InconsistentIndent { line: usize },

    #[error("{line}:{column}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        column: usize,
        expected: String,
        found: String,
    },

    #[error("{line}:{column}: unresolved identifier '{name}'")]
    UnresolvedSymbol {
        line: usize,
        column: usize,
        name: String,
    },

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("io error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
