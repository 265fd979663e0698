//! # Transit Prover
//!
//! Discharges the obligations between two descriptors of one IR type:
//! round trip and semantic preservation on each side, validation
//! equivalence against a caller-supplied [`Validator`], and layout
//! compatibility.
//!
//! Evidence is structural where the codec makes a law hold by construction,
//! exhaustive over small finite domains, and otherwise generated with
//! `proptest` from a boundary corpus and a recorded seed. Generated checks
//! are bounded by [`ProverConfig`] and a [`CancellationToken`]; a search cut
//! short yields `InsufficientEvidence`, never a pass.

pub mod budget;
pub mod config;
pub mod domain;
pub mod error;
pub mod prover;
pub mod validator;

pub use budget::{Budget, CancellationToken, Interruption};
pub use config::ProverConfig;
pub use error::{ProverError, Result};
pub use prover::EquivalenceProver;
pub use validator::{AcceptAll, FnValidator, RequireNonEmpty, Validator};
