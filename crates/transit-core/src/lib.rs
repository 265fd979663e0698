//! # Transit Core
//!
//! Pure primitives for Transit: the canonical IR, platform representations
//! and descriptors, proof obligations, the transport classifier and safety
//! certificates.
//!
//! This crate contains no I/O and no parsing. It is pure computation over
//! type descriptions and values.
//!
//! ## Key Types
//!
//! - [`IrType`] - Language-neutral description of a type's shape
//! - [`PlatformDescriptor`] - One IR type realized in one language
//! - [`ObligationResult`] - Outcome of one equivalence obligation
//! - [`TransportGrade`] - Ordered fidelity grade
//! - [`SafetyCertificate`] - Content-addressed, graded terminal artifact
//!
//! ## Canonicalization
//!
//! Certificate ids hash a deterministic CBOR encoding of the inputs. See the
//! [`canonical`] module.

pub mod canonical;
pub mod certificate;
pub mod crypto;
pub mod descriptor;
pub mod error;
pub mod grade;
pub mod ir;
pub mod layout;
pub mod obligation;
pub mod repr;
pub mod types;
pub mod validation;
pub mod value;

pub use certificate::SafetyCertificate;
pub use crypto::Blake3Hash;
pub use descriptor::{Codec, DescriptorSummary, PlatformDescriptor, ReprCodec};
pub use error::{CoreError, GateError};
pub use grade::{classify, BindingKind, TransportGrade};
pub use ir::{Case, ContainerShape, Field, IrType, PrimitiveKind, MAX_IR_DEPTH};
pub use layout::{FieldLayout, Layout};
pub use obligation::{
    Counterexample, Evidence, EvidenceSource, InsufficientEvidence, ObligationFailure,
    ObligationKind, ObligationResult, Outcome, Side, WitnessValue,
};
pub use repr::{Repr, ScalarRepr, MAX_SAFE_INTEGER};
pub use types::{CertificateId, LanguageTag};
pub use validation::validate_ir_type;
pub use value::{IrValue, PlatformValue};
