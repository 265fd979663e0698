//! # Transit Testkit
//!
//! Testing utilities for Transit.
//!
//! ## Overview
//!
//! This crate provides:
//!
//! - **Golden scenarios**: Source pairs with the grade they must certify at
//! - **Generators**: Proptest strategies for IR types, descriptors and
//!   obligation results
//! - **Fixtures**: The reference `User` sources and descriptors, and codecs
//!   that break the conversion laws in known ways
//!
//! ## Golden Scenarios
//!
//! ```rust,no_run
//! use transit_testkit::vectors::{all_scenarios, run_scenario};
//!
//! for scenario in all_scenarios() {
//!     println!("{}: {}", scenario.name, run_scenario(&scenario));
//! }
//! ```
//!
//! ## Property Testing
//!
//! ```rust,ignore
//! use proptest::prelude::*;
//! use transit_core::classify;
//! use transit_testkit::generators::result_set;
//!
//! proptest! {
//!     #[test]
//!     fn classify_is_total(results in result_set()) {
//!         let _ = classify(&results);
//!     }
//! }
//! ```
//!
//! ## Test Fixtures
//!
//! ```rust
//! use transit_testkit::fixtures::{rust_user, trimming_user};
//!
//! let left = rust_user();
//! let right = trimming_user();
//! assert_eq!(left.ir(), right.ir());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{
    rust_user, safe_integer_user, stateful_user, trimming_user, user_descriptor, user_ir,
    StatefulCodec, TrimmingCodec, USER_RESCRIPT, USER_RUST,
};
pub use generators::{complete_result_set, descriptor_pair, ir_type, result_set};
pub use vectors::{all_scenarios, run_scenario, verify_all_scenarios, GoldenScenario};
