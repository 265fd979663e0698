//! In-memory implementation of the CertificateStore trait.
//!
//! This is primarily for testing. It has the same semantics as SQLite
//! but keeps everything in memory with no persistence.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use transit_core::{CertificateId, SafetyCertificate};

use crate::error::{Result, StoreError};
use crate::traits::{CertificateStore, InsertResult};

/// In-memory store implementation.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<BTreeMap<CertificateId, StoredCertificate>>,
}

struct StoredCertificate {
    certificate: SafetyCertificate,
    input: Vec<u8>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, BTreeMap<CertificateId, StoredCertificate>>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, BTreeMap<CertificateId, StoredCertificate>>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

#[async_trait]
impl CertificateStore for MemoryStore {
    async fn insert(&self, certificate: &SafetyCertificate) -> Result<InsertResult> {
        certificate.verify_integrity()?;
        let input = certificate.input_bytes()?;
        let id = certificate.id();

        let mut inner = self.write()?;
        let result = match inner.get(&id) {
            Some(existing) if existing.input != input => {
                tracing::warn!(%id, "certificate id collision");
                return Ok(InsertResult::Collision {
                    existing_input: existing.input.clone(),
                });
            }
            Some(existing) if existing.certificate.is_settled() || !certificate.is_settled() => {
                return Ok(InsertResult::AlreadyExists);
            }
            Some(_) => InsertResult::Settled,
            None => InsertResult::Inserted,
        };
        inner.insert(
            id,
            StoredCertificate {
                certificate: certificate.clone(),
                input,
            },
        );
        Ok(result)
    }

    async fn get(&self, id: &CertificateId) -> Result<Option<SafetyCertificate>> {
        Ok(self.read()?.get(id).map(|s| s.certificate.clone()))
    }

    async fn get_input(&self, id: &CertificateId) -> Result<Option<Vec<u8>>> {
        Ok(self.read()?.get(id).map(|s| s.input.clone()))
    }

    async fn list_ids(&self) -> Result<Vec<CertificateId>> {
        Ok(self.read()?.keys().copied().collect())
    }

    async fn count(&self) -> Result<u64> {
        Ok(self.read()?.len() as u64)
    }
}

/// Overwrite the stored input bytes of `id`, simulating a second input that
/// hashes to the same id.
#[cfg(test)]
pub(crate) fn corrupt_input(store: &MemoryStore, id: &CertificateId, input: Vec<u8>) {
    if let Some(stored) = store.inner.write().unwrap().get_mut(id) {
        stored.input = input;
    }
}
