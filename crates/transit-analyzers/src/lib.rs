//! # Transit Analyzers
//!
//! Source-language front ends. Each analyzer reads the type-definition
//! subset of its language and produces the canonical IR of the root type
//! together with a [`PlatformDescriptor`](transit_core::PlatformDescriptor)
//! describing how that language stores it.
//!
//! Analyzers are pure and deterministic. Constructs without an IR
//! counterpart are rejected with a source position, never approximated.
//!
//! ## Supported Languages
//!
//! - [`RustAnalyzer`] - `struct`, `enum` and `type` items; `#[repr(C)]`
//!   marks a type ABI-stable
//! - [`ReScriptAnalyzer`] - `type` declarations; the int and string
//!   representations are configured per target

pub mod error;
pub mod lexer;
pub mod lower;
pub mod registry;
pub mod rescript;
pub mod rust;
pub mod traits;

pub use error::{AnalysisError, Result};
pub use lexer::Span;
pub use registry::AnalyzerRegistry;
pub use rescript::{IntRepr, ReScriptAnalyzer, ReScriptConfig, StringRepr};
pub use rust::{RustAnalyzer, RustConfig};
pub use traits::{find_root, Analysis, Analyzer, TypeDecl};
