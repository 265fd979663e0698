//! Error types for analyzers.

use thiserror::Error;
use transit_core::{CoreError, LanguageTag};

use crate::lexer::Span;

/// Errors that prevent a source from being analyzed.
///
/// These are fatal for the source in question and are surfaced verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalysisError {
    /// The source uses a construct with no IR counterpart.
    #[error("unsupported construct at {line}:{column}: {construct}")]
    UnsupportedConstruct {
        construct: String,
        line: u32,
        column: u32,
    },

    /// The source is not syntactically valid.
    #[error("malformed source at {line}:{column}: {message}")]
    MalformedSource {
        message: String,
        line: u32,
        column: u32,
    },

    #[error("no analyzer registered for language `{0}`")]
    UnknownLanguage(LanguageTag),

    #[error("source declares no types")]
    NoDeclarations,

    /// More than one declaration (or none) is unreferenced by the others.
    #[error("cannot choose a root type among: {}", .0.join(", "))]
    AmbiguousRoot(Vec<String>),

    #[error("type `{0}` is not declared")]
    TypeNotFound(String),

    #[error("invalid IR: {0}")]
    Ir(#[from] CoreError),
}

impl AnalysisError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        Self::UnsupportedConstruct {
            construct: construct.into(),
            line: span.line,
            column: span.column,
        }
    }

    pub fn malformed(message: impl Into<String>, span: Span) -> Self {
        Self::MalformedSource {
            message: message.into(),
            line: span.line,
            column: span.column,
        }
    }
}

/// Result type for analyzer operations.
pub type Result<T> = std::result::Result<T, AnalysisError>;
