//! CertificateStore trait: the abstract interface for certificate persistence.
//!
//! Certificates are keyed by their content id. Implementations include
//! SQLite (primary) and in-memory (for tests).

use async_trait::async_trait;
use transit_core::{CertificateId, SafetyCertificate};

use crate::error::{Result, StoreError};

/// Result of inserting a certificate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsertResult {
    /// Certificate was inserted.
    Inserted,
    /// A certificate derived from the same inputs is already stored
    /// (idempotent - not an error). The stored certificate is kept.
    AlreadyExists,
    /// The stored certificate for the same inputs was unsettled and has been
    /// replaced by one where every obligation reached a verdict.
    Settled,
    /// The id is taken by a certificate with different canonical inputs.
    /// Nothing is overwritten or merged.
    Collision {
        /// Canonical input bytes of the stored certificate.
        existing_input: Vec<u8>,
    },
}

/// Async interface for certificate persistence.
///
/// # Design Notes
///
/// - **Idempotent inserts**: inserting a certificate for the same inputs twice
///   returns `AlreadyExists`.
/// - **Settling**: an unsettled certificate (some obligation still
///   `InsufficientEvidence`) is replaced by a settled one for the same inputs.
///   A settled certificate is never replaced.
/// - **Collision detection**: the canonical input bytes are stored next to
///   each certificate; an id that maps to different bytes is a `Collision`.
/// - **Integrity**: certificates are re-verified before they are written.
#[async_trait]
pub trait CertificateStore: Send + Sync {
    /// Insert a certificate under its id.
    async fn insert(&self, certificate: &SafetyCertificate) -> Result<InsertResult>;

    /// Get a certificate by id.
    async fn get(&self, id: &CertificateId) -> Result<Option<SafetyCertificate>>;

    /// Canonical input bytes stored with a certificate.
    async fn get_input(&self, id: &CertificateId) -> Result<Option<Vec<u8>>>;

    /// Check whether a certificate exists.
    async fn contains(&self, id: &CertificateId) -> Result<bool> {
        Ok(self.get_input(id).await?.is_some())
    }

    /// All stored ids, in ascending order.
    async fn list_ids(&self) -> Result<Vec<CertificateId>>;

    /// Number of stored certificates.
    async fn count(&self) -> Result<u64>;
}

/// Extension methods for CertificateStore.
pub trait CertificateStoreExt: CertificateStore {
    /// Get a certificate and re-verify its id and grade against its contents.
    fn get_verified(
        &self,
        id: &CertificateId,
    ) -> impl std::future::Future<Output = Result<Option<SafetyCertificate>>> + Send;
}

impl<S: CertificateStore + ?Sized> CertificateStoreExt for S {
    async fn get_verified(&self, id: &CertificateId) -> Result<Option<SafetyCertificate>> {
        let Some(certificate) = self.get(id).await? else {
            return Ok(None);
        };
        if certificate.id() != *id {
            return Err(StoreError::InvalidData(format!(
                "certificate {} stored under id {id}",
                certificate.id()
            )));
        }
        certificate.verify_integrity()?;
        Ok(Some(certificate))
    }
}
