//! Engine configuration.

use serde::{Deserialize, Serialize};
use transit_analyzers::{ReScriptConfig, RustConfig};
use transit_prover::ProverConfig;

use crate::error::{EngineError, Result};

/// Configuration for the Engine.
///
/// Every section is optional in JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub prover: ProverConfig,
    pub rust: RustConfig,
    pub rescript: ReScriptConfig,
    /// Return a stored certificate for identical inputs instead of proving
    /// again.
    pub reuse_certificates: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            prover: ProverConfig::default(),
            rust: RustConfig::default(),
            rescript: ReScriptConfig::default(),
            reuse_certificates: true,
        }
    }
}

impl EngineConfig {
    /// Parse a JSON configuration document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| EngineError::Config(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_analyzers::IntRepr;

    #[test]
    fn test_from_json() {
        let config = EngineConfig::from_json(
            r#"{
                "prover": { "case_budget": 64, "min_cases": 16 },
                "rescript": { "int_repr": "safe_integer", "abi_stable": true },
                "reuse_certificates": false
            }"#,
        )
        .unwrap();
        assert_eq!(config.prover.case_budget, 64);
        assert_eq!(config.prover.seed, ProverConfig::default().seed);
        assert_eq!(config.rescript.int_repr, IntRepr::SafeInteger);
        assert!(config.rescript.abi_stable);
        assert!(config.rust.vec_u8_as_bytes);
        assert!(!config.reuse_certificates);
    }

    #[test]
    fn test_empty_json_is_default() {
        assert_eq!(EngineConfig::from_json("{}").unwrap(), EngineConfig::default());
    }

    #[test]
    fn test_invalid_json() {
        assert!(matches!(
            EngineConfig::from_json(r#"{"rescript": {"int_repr": "int128"}}"#),
            Err(EngineError::Config(_))
        ));
    }
}
