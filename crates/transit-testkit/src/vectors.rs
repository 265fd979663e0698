//! Golden scenarios: source pairs with the grade they must certify at.
//!
//! Each scenario runs the real analyzers and prover, so a change in any
//! layer that moves a grade shows up here.

use transit_analyzers::{AnalyzerRegistry, IntRepr, ReScriptConfig, RustConfig, StringRepr};
use transit_core::{classify, LanguageTag, TransportGrade};
use transit_prover::{AcceptAll, CancellationToken, EquivalenceProver};

use crate::fixtures::{USER_RESCRIPT, USER_RUST};

/// A golden scenario.
#[derive(Debug, Clone)]
pub struct GoldenScenario {
    /// Human-readable name for the scenario.
    pub name: &'static str,
    pub left_language: &'static str,
    pub left_source: &'static str,
    pub right_language: &'static str,
    pub right_source: &'static str,
    /// ReScript platform model for this scenario.
    pub rescript: ReScriptConfig,
    /// Grade the pair must certify at under `AcceptAll`.
    pub expected: TransportGrade,
}

const USER_RUST_UNPINNED: &str =
    "pub struct User { pub id: i64, pub name: String, pub email: String, pub active: bool }";

/// Get all golden scenarios.
pub fn all_scenarios() -> Vec<GoldenScenario> {
    vec![
        GoldenScenario {
            name: "repr(C) User against itself",
            left_language: "rust",
            left_source: USER_RUST,
            right_language: "rust",
            right_source: USER_RUST,
            rescript: ReScriptConfig::default(),
            expected: TransportGrade::Concorde,
        },
        GoldenScenario {
            name: "User without repr(C)",
            left_language: "rust",
            left_source: USER_RUST,
            right_language: "rust",
            right_source: USER_RUST_UNPINNED,
            rescript: ReScriptConfig::default(),
            expected: TransportGrade::BusinessClass,
        },
        GoldenScenario {
            name: "Rust User to ReScript User on a JS target",
            left_language: "rust",
            left_source: USER_RUST,
            right_language: "rescript",
            right_source: USER_RESCRIPT,
            rescript: ReScriptConfig::default(),
            expected: TransportGrade::BusinessClass,
        },
        GoldenScenario {
            name: "Rust User to ReScript User with 2^53-limited ids",
            left_language: "rust",
            left_source: USER_RUST,
            right_language: "rescript",
            right_source: USER_RESCRIPT,
            rescript: ReScriptConfig {
                int_repr: IntRepr::SafeInteger,
                string_repr: StringRepr::Utf8,
                lone_surrogates: false,
                abi_stable: true,
            },
            expected: TransportGrade::BusinessClass,
        },
        GoldenScenario {
            name: "ReScript strings holding lone surrogates",
            left_language: "rust",
            left_source: USER_RUST,
            right_language: "rescript",
            right_source: USER_RESCRIPT,
            rescript: ReScriptConfig {
                lone_surrogates: true,
                ..ReScriptConfig::default()
            },
            expected: TransportGrade::Wheelbarrow,
        },
    ]
}

/// Analyze and prove a scenario, returning the grade it certifies at.
pub fn run_scenario(scenario: &GoldenScenario) -> TransportGrade {
    let registry = AnalyzerRegistry::with_defaults(RustConfig::default(), scenario.rescript.clone());
    let left = registry
        .analyze(&LanguageTag::new(scenario.left_language), scenario.left_source)
        .expect("left source analyzes");
    let right = registry
        .analyze(&LanguageTag::new(scenario.right_language), scenario.right_source)
        .expect("right source analyzes");
    let results = EquivalenceProver::default()
        .prove(
            &left.descriptor,
            &right.descriptor,
            &AcceptAll,
            &CancellationToken::new(),
        )
        .expect("scenario sides share an IR");
    classify(&results)
}

/// Run every scenario, returning `(name, expected, actual)` for each mismatch.
pub fn verify_all_scenarios() -> Vec<(&'static str, TransportGrade, TransportGrade)> {
    all_scenarios()
        .iter()
        .filter_map(|s| {
            let actual = run_scenario(s);
            (actual != s.expected).then_some((s.name, s.expected, actual))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_scenarios_hold() {
        let mismatches = verify_all_scenarios();
        assert!(mismatches.is_empty(), "{mismatches:?}");
    }

    #[test]
    fn test_scenarios_are_deterministic() {
        for scenario in all_scenarios() {
            assert_eq!(run_scenario(&scenario), run_scenario(&scenario), "{}", scenario.name);
        }
    }

    #[test]
    fn test_scenario_names_are_unique() {
        let scenarios = all_scenarios();
        let mut names: Vec<_> = scenarios.iter().map(|s| s.name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), scenarios.len());
    }
}
