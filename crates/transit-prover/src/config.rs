//! Prover configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Bounds for generated evidence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProverConfig {
    /// Cases checked per tested obligation, boundary corpus included.
    /// Also the largest finite domain enumerated exhaustively.
    pub case_budget: u64,
    /// Fewest cases that establish a tested obligation. Stopping earlier
    /// (deadline, cancellation) leaves it unestablished.
    pub min_cases: u64,
    /// Wall-clock limit for one `prove` call.
    pub deadline: Duration,
    /// Seed for random generation; recorded in the evidence.
    pub seed: u64,
    pub max_collection_len: usize,
    pub max_string_len: usize,
}

impl Default for ProverConfig {
    fn default() -> Self {
        Self {
            case_budget: 256,
            min_cases: 64,
            deadline: Duration::from_secs(10),
            seed: 0x7472_616e_7369_74,
            max_collection_len: 4,
            max_string_len: 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: ProverConfig = serde_json::from_str(r#"{"case_budget": 32, "seed": 7}"#).unwrap();
        assert_eq!(config.case_budget, 32);
        assert_eq!(config.seed, 7);
        assert_eq!(config.min_cases, ProverConfig::default().min_cases);
    }
}
