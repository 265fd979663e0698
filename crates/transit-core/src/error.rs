//! Error types for Transit Core.

use thiserror::Error;

use crate::grade::{BindingKind, TransportGrade};
use crate::obligation::{InsufficientEvidence, ObligationFailure, ObligationKind};
use crate::types::CertificateId;

/// Errors raised when an IR type, repr or descriptor is not well formed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CoreError {
    #[error("duplicate {kind} `{name}` in {owner}")]
    DuplicateName {
        kind: &'static str,
        owner: String,
        name: String,
    },

    #[error("empty {0} name")]
    EmptyName(&'static str),

    #[error("variant {0} has no cases")]
    EmptyVariant(String),

    #[error("type nesting depth {depth} exceeds maximum of {max}")]
    TooDeep { depth: usize, max: usize },

    #[error("repr mismatch at {path}: expected {expected}, found {found}")]
    ReprMismatch {
        path: String,
        expected: String,
        found: String,
    },

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),

    #[error("certificate integrity check failed: {0}")]
    Integrity(String),
}

/// A certificate's grade does not permit the requested binding.
///
/// The source is the first obligation blocking the grade, so callers can
/// tell a proven counterexample from a law that was never established.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GateError {
    #[error("{binding} binding needs {required}, certificate {id} is {actual}: {kind} failed")]
    ProvenUnsafe {
        id: CertificateId,
        binding: BindingKind,
        required: TransportGrade,
        actual: TransportGrade,
        kind: ObligationKind,
        #[source]
        source: ObligationFailure,
    },

    #[error("{binding} binding needs {required}, certificate {id} is {actual}: {kind} not established")]
    Unproven {
        id: CertificateId,
        binding: BindingKind,
        required: TransportGrade,
        actual: TransportGrade,
        kind: ObligationKind,
        #[source]
        source: InsufficientEvidence,
    },
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
