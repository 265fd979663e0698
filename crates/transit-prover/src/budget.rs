//! Time and cancellation bounds shared by the obligations of one proof.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::config::ProverConfig;

/// Cooperative cancellation flag. Clones share the flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Why checking stopped before the case budget was spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    Cancelled,
    DeadlineReached,
}

impl Interruption {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::DeadlineReached => "deadline reached",
        }
    }
}

/// Budget for one `prove` call.
#[derive(Debug, Clone)]
pub struct Budget {
    pub case_budget: u64,
    pub min_cases: u64,
    deadline: Instant,
    token: CancellationToken,
}

impl Budget {
    /// Start the clock.
    pub fn start(config: &ProverConfig, token: CancellationToken) -> Self {
        Self {
            case_budget: config.case_budget,
            min_cases: config.min_cases,
            deadline: Instant::now() + config.deadline,
            token,
        }
    }

    pub fn interrupted(&self) -> Option<Interruption> {
        if self.token.is_cancelled() {
            Some(Interruption::Cancelled)
        } else if Instant::now() >= self.deadline {
            Some(Interruption::DeadlineReached)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_cancellation_is_shared() {
        let token = CancellationToken::new();
        let budget = Budget::start(&ProverConfig::default(), token.clone());
        assert_eq!(budget.interrupted(), None);
        token.cancel();
        assert_eq!(budget.interrupted(), Some(Interruption::Cancelled));
    }

    #[test]
    fn test_zero_deadline_is_reached() {
        let config = ProverConfig {
            deadline: Duration::ZERO,
            ..ProverConfig::default()
        };
        let budget = Budget::start(&config, CancellationToken::new());
        assert_eq!(budget.interrupted(), Some(Interruption::DeadlineReached));
    }
}
