//! # Transit Store
//!
//! Content-addressed persistence for safety certificates. Provides a
//! trait-based interface with SQLite and in-memory implementations.
//!
//! ## Key Types
//!
//! - [`CertificateStore`] - The async trait for all storage operations
//! - [`SqliteStore`] - SQLite-based persistent storage
//! - [`MemoryStore`] - In-memory storage for tests
//! - [`InsertResult`] - Result of inserting a certificate
//!
//! ## Usage
//!
//! ```rust,no_run
//! use transit_store::{CertificateStore, SqliteStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("certificates.db").unwrap();
//!     println!("{} certificates", store.count().await.unwrap());
//! }
//! ```
//!
//! ## Design Notes
//!
//! - **Idempotent inserts**: the same inputs inserted twice return `AlreadyExists`
//! - **Settling**: a certificate left unproven by a cut-short derivation is
//!   replaced once a derivation for the same inputs reaches every verdict
//! - **Collision detection**: an id already bound to different canonical
//!   inputs returns `Collision`; the stored certificate is never replaced

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{CertificateStore, CertificateStoreExt, InsertResult};

#[cfg(test)]
pub(crate) mod test_support {
    use transit_core::{
        Counterexample, Evidence, EvidenceSource, InsufficientEvidence, IrType, LanguageTag, ObligationFailure,
        ObligationKind, ObligationResult, Outcome, PlatformDescriptor, PlatformValue, Repr,
        SafetyCertificate, ScalarRepr, WitnessValue,
    };

    fn descriptor(language: &str, id: ScalarRepr) -> PlatformDescriptor {
        let ir = IrType::record("Point", [("x", IrType::int64()), ("label", IrType::string())]);
        let repr = Repr::Record(vec![Repr::Scalar(id), Repr::Scalar(ScalarRepr::Utf8)]);
        PlatformDescriptor::new(LanguageTag::new(language), "Point", ir, repr, true).unwrap()
    }

    fn issue(left: PlatformDescriptor, right: PlatformDescriptor, results: Vec<ObligationResult>) -> SafetyCertificate {
        SafetyCertificate::issue(left.ir().clone(), left.summary(), right.summary(), "accept-all", results).unwrap()
    }

    /// A Concorde certificate.
    pub fn certificate() -> SafetyCertificate {
        let results = ObligationKind::ALL
            .iter()
            .map(|&kind| {
                ObligationResult::new(
                    kind,
                    Outcome::Discharged(Evidence {
                        law: kind.law().to_string(),
                        universe: "Point".to_string(),
                        source: EvidenceSource::Generated { seed: 42 },
                        cases: 256,
                    }),
                )
            })
            .collect();
        issue(descriptor("rust", ScalarRepr::I64), descriptor("rust", ScalarRepr::I64), results)
    }

    /// `certificate()` with one obligation cut short.
    pub fn unsettled_certificate() -> SafetyCertificate {
        let mut results = certificate().results().to_vec();
        results[0].outcome = Outcome::InsufficientEvidence(InsufficientEvidence {
            reason: "cancelled".into(),
            checked: 3,
            required: 64,
        });
        issue(descriptor("rust", ScalarRepr::I64), descriptor("rust", ScalarRepr::I64), results)
    }

    /// A Wheelbarrow certificate carrying a counterexample.
    pub fn other_certificate() -> SafetyCertificate {
        let results = vec![ObligationResult::new(
            ObligationKind::RoundTrip(transit_core::Side::Right),
            Outcome::Failed(ObligationFailure::new("from_ir(to_ir(v)) differs from v").with_counterexample(
                Counterexample {
                    input: WitnessValue::Platform(PlatformValue::Integer(1 << 40)),
                    observed: WitnessValue::Platform(PlatformValue::Float(-0.0)),
                },
            )),
        )];
        issue(descriptor("rust", ScalarRepr::I64), descriptor("c", ScalarRepr::I32), results)
    }
}
