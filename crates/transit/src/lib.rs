//! # Transit
//!
//! Certify that a type crosses a language boundary without losing meaning.
//!
//! ## Overview
//!
//! Two type definitions, possibly in different languages, are analyzed into
//! a shared canonical IR. The prover then discharges the equivalence
//! obligations between the two platform descriptors:
//!
//! - **RoundTrip**: every platform value survives a trip through the IR
//! - **SemanticPreservation**: lowering to the IR is a function
//! - **ValidationEquivalence**: business validators see the same verdict
//!   after a trip through the platform
//! - **LayoutCompatibility**: both layouts are ABI-stable and agree field by
//!   field
//!
//! The results are classified into a [`TransportGrade`](core::TransportGrade)
//! and sealed in a content-addressed [`SafetyCertificate`](core::SafetyCertificate).
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use transit::{CertifyRequest, Engine, EngineConfig, SourceSpec};
//! use transit::core::BindingKind;
//! use transit::prover::{CancellationToken, RequireNonEmpty};
//! use transit::store::SqliteStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = SqliteStore::open("certificates.db")?;
//!     let engine = Engine::new(store, EngineConfig::default());
//!
//!     let request = CertifyRequest::new(
//!         SourceSpec::new("rust", "#[repr(C)] struct User { id: i64, name: String }"),
//!         SourceSpec::new("rescript", "type user = { id: int, name: string }"),
//!     );
//!     let certificate = engine
//!         .certify(&request, Arc::new(RequireNonEmpty), &CancellationToken::new())
//!         .await?;
//!
//!     println!("{}", certificate.report());
//!     certificate.require(BindingKind::Serialized)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Re-exports
//!
//! This crate re-exports the component crates for convenience:
//!
//! - `transit::core` - IR, descriptors, obligations, grades, certificates
//! - `transit::analyzers` - Source-language analyzers and their registry
//! - `transit::prover` - The equivalence prover and validators
//! - `transit::store` - Certificate storage abstraction and SQLite

pub mod config;
pub mod engine;
pub mod error;

// Re-export component crates
pub use transit_analyzers as analyzers;
pub use transit_core as core;
pub use transit_prover as prover;
pub use transit_store as store;

// Re-export main types for convenience
pub use config::EngineConfig;
pub use engine::{CertifyRequest, Engine, SourceSpec};
pub use error::{EngineError, Result};

// Re-export commonly used core types
pub use transit_core::{
    BindingKind, CertificateId, IrType, LanguageTag, ObligationKind, Outcome, PlatformDescriptor,
    SafetyCertificate, TransportGrade,
};
