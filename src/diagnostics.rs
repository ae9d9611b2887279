//! Unified error type for the outer layers of verdict.
//!
//! The core components never surface errors for user misbehaviour: rendering is total,
//! location resolution is total, and condition failures are captured as [`ConditionError`]
//! values attached to the item they belong to. What remains are the failures of loading
//! things from disk, which all funnel into [`VerdictError`] and render through `miette`.

use std::path::PathBuf;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::condition::ConditionError;

/// Type-safe error classification, for callers that branch on the kind of failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorType {
    Io,
    Config,
    Suite,
    Condition,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::Io => "Io",
            ErrorType::Config => "Config",
            ErrorType::Suite => "Suite",
            ErrorType::Condition => "Condition",
        }
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum VerdictError {
    #[error("failed to read '{}'", .path.display())]
    #[diagnostic(code(verdict::io))]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration: {message}")]
    #[diagnostic(code(verdict::config), help("see RunOptions for the accepted keys"))]
    Config {
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error("invalid suite '{}': {message}", .path.display())]
    #[diagnostic(code(verdict::suite))]
    Suite {
        path: PathBuf,
        message: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: Option<SourceSpan>,
    },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Condition(#[from] ConditionError),
}

impl VerdictError {
    pub fn error_type(&self) -> ErrorType {
        match self {
            VerdictError::Io { .. } => ErrorType::Io,
            VerdictError::Config { .. } => ErrorType::Config,
            VerdictError::Suite { .. } => ErrorType::Suite,
            VerdictError::Condition(_) => ErrorType::Condition,
        }
    }
}
