//! Error types for the prover.

use thiserror::Error;
use transit_core::CoreError;

/// Preconditions of a proof that do not hold.
///
/// A failed obligation is not an error; it is recorded in the results.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProverError {
    /// The two descriptors do not lower from the same IR type.
    #[error("descriptors lower from different IR types: {difference}")]
    MismatchedIr { difference: String },

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(#[from] CoreError),
}

/// Result type for prover operations.
pub type Result<T> = std::result::Result<T, ProverError>;
