//! SQLite implementation of the CertificateStore trait.
//!
//! This is the primary storage backend. It uses rusqlite with bundled
//! SQLite, wrapped in async via tokio::spawn_blocking.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use transit_core::{CertificateId, SafetyCertificate};

use crate::error::{Result, StoreError};
use crate::migration::{self, now_millis};
use crate::traits::{CertificateStore, InsertResult};

/// SQLite-based store implementation.
///
/// Thread-safe via internal Mutex. All operations use spawn_blocking
/// to avoid blocking the async runtime.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if needed.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Run `f` against the connection on the blocking pool.
    async fn blocking<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let conn = conn
                .lock()
                .map_err(|e| StoreError::Unavailable(format!("mutex poisoned: {e}")))?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Unavailable(format!("spawn_blocking failed: {e}")))?
    }
}

fn encode(certificate: &SafetyCertificate) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(certificate, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

fn decode(body: &[u8]) -> Result<SafetyCertificate> {
    ciborium::from_reader(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn id_from_blob(bytes: &[u8]) -> Result<CertificateId> {
    CertificateId::try_from(bytes)
        .map_err(|_| StoreError::InvalidData(format!("certificate id of {} bytes", bytes.len())))
}

#[async_trait]
impl CertificateStore for SqliteStore {
    async fn insert(&self, certificate: &SafetyCertificate) -> Result<InsertResult> {
        certificate.verify_integrity()?;
        let input = certificate.input_bytes()?;
        let body = encode(certificate)?;
        let id = certificate.id();
        let type_name = certificate.left().type_name.clone();
        let left_language = certificate.left().language.to_string();
        let right_language = certificate.right().language.to_string();
        let grade = certificate.grade().to_u8();

        let settled = certificate.is_settled();

        self.blocking(move |conn| {
            let existing: Option<(Vec<u8>, Vec<u8>)> = conn
                .query_row(
                    "SELECT input_bytes, body FROM certificates WHERE certificate_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let result = match existing {
                Some((existing_input, _)) if existing_input != input => {
                    tracing::warn!(%id, "certificate id collision");
                    return Ok(InsertResult::Collision { existing_input });
                }
                Some((_, existing_body)) => {
                    if !settled || decode(&existing_body)?.is_settled() {
                        return Ok(InsertResult::AlreadyExists);
                    }
                    InsertResult::Settled
                }
                None => InsertResult::Inserted,
            };

            conn.execute(
                "INSERT OR REPLACE INTO certificates (
                    certificate_id, input_bytes, body, type_name,
                    left_language, right_language, grade, stored_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    id.as_bytes().as_slice(),
                    input,
                    body,
                    type_name,
                    left_language,
                    right_language,
                    grade,
                    now_millis(),
                ],
            )?;

            Ok(result)
        })
        .await
    }

    async fn get(&self, id: &CertificateId) -> Result<Option<SafetyCertificate>> {
        let id = *id;
        self.blocking(move |conn| {
            let body: Option<Vec<u8>> = conn
                .query_row(
                    "SELECT body FROM certificates WHERE certificate_id = ?1",
                    params![id.as_bytes().as_slice()],
                    |row| row.get(0),
                )
                .optional()?;
            body.map(|b| decode(&b)).transpose()
        })
        .await
    }

    async fn get_input(&self, id: &CertificateId) -> Result<Option<Vec<u8>>> {
        let id = *id;
        self.blocking(move |conn| {
            conn.query_row(
                "SELECT input_bytes FROM certificates WHERE certificate_id = ?1",
                params![id.as_bytes().as_slice()],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn list_ids(&self) -> Result<Vec<CertificateId>> {
        self.blocking(|conn| {
            let mut stmt =
                conn.prepare("SELECT certificate_id FROM certificates ORDER BY certificate_id")?;
            let blobs = stmt
                .query_map([], |row| row.get::<_, Vec<u8>>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            blobs.iter().map(|b| id_from_blob(b)).collect()
        })
        .await
    }

    async fn count(&self) -> Result<u64> {
        self.blocking(|conn| {
            let n: i64 = conn.query_row("SELECT COUNT(*) FROM certificates", [], |row| row.get(0))?;
            u64::try_from(n).map_err(|_| StoreError::InvalidData(format!("negative count {n}")))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{certificate, other_certificate, unsettled_certificate};
    use crate::traits::CertificateStoreExt;

    #[tokio::test]
    async fn test_insert_and_get() {
        let store = SqliteStore::open_memory().unwrap();
        let cert = certificate();

        assert_eq!(store.insert(&cert).await.unwrap(), InsertResult::Inserted);
        let loaded = store.get(&cert.id()).await.unwrap().unwrap();
        assert_eq!(loaded, cert);
        assert_eq!(store.get_input(&cert.id()).await.unwrap(), Some(cert.input_bytes().unwrap()));
    }

    #[tokio::test]
    async fn test_insert_idempotent() {
        let store = SqliteStore::open_memory().unwrap();
        let cert = certificate();

        store.insert(&cert).await.unwrap();
        assert_eq!(store.insert(&cert).await.unwrap(), InsertResult::AlreadyExists);
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_settled_certificate_replaces_unsettled() {
        let store = SqliteStore::open_memory().unwrap();
        let (unsettled, settled) = (unsettled_certificate(), certificate());

        store.insert(&unsettled).await.unwrap();
        assert_eq!(store.insert(&settled).await.unwrap(), InsertResult::Settled);
        assert_eq!(store.insert(&unsettled).await.unwrap(), InsertResult::AlreadyExists);

        assert_eq!(store.count().await.unwrap(), 1);
        assert_eq!(store.get_verified(&settled.id()).await.unwrap(), Some(settled));
    }

    #[tokio::test]
    async fn test_collision_is_reported_not_merged() {
        let store = SqliteStore::open_memory().unwrap();
        let cert = certificate();
        store.insert(&cert).await.unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE certificates SET input_bytes = ?1",
                params![b"different inputs".to_vec()],
            )
            .unwrap();
        }

        assert_eq!(
            store.insert(&cert).await.unwrap(),
            InsertResult::Collision {
                existing_input: b"different inputs".to_vec()
            }
        );
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_list_ids_sorted() {
        let store = SqliteStore::open_memory().unwrap();
        let (a, b) = (certificate(), other_certificate());
        store.insert(&b).await.unwrap();
        store.insert(&a).await.unwrap();

        let mut expected = vec![a.id(), b.id()];
        expected.sort();
        assert_eq!(store.list_ids().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("certificates.db");
        let cert = certificate();

        {
            let store = SqliteStore::open(&path).unwrap();
            store.insert(&cert).await.unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        assert_eq!(store.get_verified(&cert.id()).await.unwrap(), Some(cert));
    }

    #[tokio::test]
    async fn test_corrupt_body_is_a_serialization_error() {
        let store = SqliteStore::open_memory().unwrap();
        let cert = certificate();
        store.insert(&cert).await.unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute("UPDATE certificates SET body = x'ff'", []).unwrap();
        }
        assert!(matches!(
            store.get(&cert.id()).await,
            Err(StoreError::Serialization(_))
        ));
    }
}
