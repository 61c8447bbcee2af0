use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// A location-tagged parse failure.
///
/// Lines and columns are 1-based; columns count bytes, which is what
/// tree-sitter reports.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    pub line: usize,
    pub column: usize,
    pub message: String,
}

impl SyntaxError {
    pub fn new(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            column,
            message: message.into(),
        }
    }
}

/// Which filesystem operation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Read,
    Write,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOp::Read => write!(f, "read"),
            IoOp::Write => write!(f, "write"),
        }
    }
}

#[derive(Debug, Error)]
pub enum CodemodError {
    #[error("failed to parse {}: {source}", path.display())]
    Syntax {
        path: PathBuf,
        #[source]
        source: SyntaxError,
    },

    #[error("failed to {op} {}: {source}", path.display())]
    Io {
        path: PathBuf,
        op: IoOp,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid {role} '{value}': expected a Python identifier")]
    InvalidIdentifier { role: &'static str, value: String },

    #[error("generated snippet does not parse: {source}")]
    Template {
        #[source]
        source: SyntaxError,
    },

    #[error("invalid configuration in {}: {message}", path.display())]
    Config { path: PathBuf, message: String },
}

pub type Result<T, E = CodemodError> = std::result::Result<T, E>;
