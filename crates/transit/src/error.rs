//! Error types for the Engine.

use thiserror::Error;
use transit_analyzers::AnalysisError;
use transit_core::{CertificateId, CoreError, Side};
use transit_prover::ProverError;
use transit_store::StoreError;

/// Errors that can occur during Engine operations.
///
/// Failed obligations are not errors; they are recorded in the certificate.
#[derive(Debug, Error)]
pub enum EngineError {
    /// One of the two sources could not be analyzed.
    #[error("{side} source: {source}")]
    Analysis {
        side: Side,
        #[source]
        source: AnalysisError,
    },

    /// Proof preconditions do not hold.
    #[error("prover error: {0}")]
    Prover(#[from] ProverError),

    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Malformed IR, descriptor or certificate.
    #[error("core error: {0}")]
    Core(#[from] CoreError),

    /// The store holds a different derivation under the same id.
    #[error("certificate id {0} is bound to different inputs in the store")]
    Collision(CertificateId),

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A background derivation panicked or was cancelled by the runtime.
    #[error("derivation task failed: {0}")]
    Task(String),
}

impl EngineError {
    pub fn analysis(side: Side) -> impl FnOnce(AnalysisError) -> Self {
        move |source| Self::Analysis { side, source }
    }
}

/// Result type for Engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
