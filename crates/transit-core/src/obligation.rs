//! Proof obligations and their outcomes.
//!
//! Outcomes are data: a failed obligation is recorded and classified, never
//! raised. Discharged obligations carry [`Evidence`] naming the law, the
//! universe of inputs it was established over and how.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::value::{IrValue, PlatformValue};

/// Which descriptor an obligation concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    pub const BOTH: [Side; 2] = [Side::Left, Side::Right];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The obligations checked between two descriptors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObligationKind {
    /// `from_ir(to_ir(v)) == v` over the side's platform domain.
    RoundTrip(Side),
    /// Lowering is a function of its input.
    SemanticPreservation(Side),
    /// `validator(v) == validator(to_ir(from_ir(v)))` over the IR domain.
    ValidationEquivalence(Side),
    /// Both layouts agree on size, alignment and every field.
    LayoutCompatibility,
}

impl ObligationKind {
    /// Every obligation, in the order the prover checks them.
    pub const ALL: [ObligationKind; 7] = [
        Self::RoundTrip(Side::Left),
        Self::RoundTrip(Side::Right),
        Self::SemanticPreservation(Side::Left),
        Self::SemanticPreservation(Side::Right),
        Self::ValidationEquivalence(Side::Left),
        Self::ValidationEquivalence(Side::Right),
        Self::LayoutCompatibility,
    ];

    pub fn side(self) -> Option<Side> {
        match self {
            Self::RoundTrip(side)
            | Self::SemanticPreservation(side)
            | Self::ValidationEquivalence(side) => Some(side),
            Self::LayoutCompatibility => None,
        }
    }

    /// Stable numeric tag used by the canonical encoding.
    pub fn to_u8(self) -> u8 {
        let side = |s: Side| match s {
            Side::Left => 0,
            Side::Right => 1,
        };
        match self {
            Self::RoundTrip(s) => side(s),
            Self::SemanticPreservation(s) => 2 + side(s),
            Self::ValidationEquivalence(s) => 4 + side(s),
            Self::LayoutCompatibility => 6,
        }
    }

    /// The law, stated over the side's descriptor.
    pub fn law(self) -> &'static str {
        match self {
            Self::RoundTrip(_) => "from_ir(to_ir(v)) = v",
            Self::SemanticPreservation(_) => "v1 = v2 => to_ir(v1) = to_ir(v2)",
            Self::ValidationEquivalence(_) => "validate(v) = validate(to_ir(from_ir(v)))",
            Self::LayoutCompatibility => "size, alignment and field layouts agree",
        }
    }
}

impl fmt::Display for ObligationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RoundTrip(s) => write!(f, "round-trip({s})"),
            Self::SemanticPreservation(s) => write!(f, "semantic-preservation({s})"),
            Self::ValidationEquivalence(s) => write!(f, "validation-equivalence({s})"),
            Self::LayoutCompatibility => f.write_str("layout-compatibility"),
        }
    }
}

/// How a law was established.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EvidenceSource {
    /// By construction: the conversion is a structural map whose every
    /// scalar conversion is injective on the domain in question.
    Structural,
    /// By enumerating every value of a finite domain.
    Exhaustive,
    /// By bounded testing over boundary and seeded random values. This is
    /// probabilistic evidence only.
    Generated { seed: u64 },
}

impl fmt::Display for EvidenceSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Structural => f.write_str("structural"),
            Self::Exhaustive => f.write_str("exhaustive"),
            Self::Generated { seed } => write!(f, "generated(seed={seed:#x})"),
        }
    }
}

/// Evidence that an obligation holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    pub law: String,
    /// The inputs the law quantifies over, e.g. `all values of struct{i64, utf8}`.
    pub universe: String,
    pub source: EvidenceSource,
    /// Number of inputs checked; zero for structural evidence.
    pub cases: u64,
}

/// A value on either side of a conversion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum WitnessValue {
    Ir(IrValue),
    Platform(PlatformValue),
    Verdict(bool),
}

impl fmt::Display for WitnessValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ir(v) => write!(f, "{v}"),
            Self::Platform(v) => write!(f, "{v}"),
            Self::Verdict(true) => f.write_str("accepted"),
            Self::Verdict(false) => f.write_str("rejected"),
        }
    }
}

/// A concrete input on which a law fails, with what was observed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counterexample {
    pub input: WitnessValue,
    pub observed: WitnessValue,
}

impl fmt::Display for Counterexample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.input, self.observed)
    }
}

/// An obligation shown not to hold.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{reason}")]
pub struct ObligationFailure {
    pub reason: String,
    pub counterexample: Option<Counterexample>,
}

impl ObligationFailure {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            counterexample: None,
        }
    }

    pub fn with_counterexample(mut self, counterexample: Counterexample) -> Self {
        self.counterexample = Some(counterexample);
        self
    }
}

/// Checking stopped before the law was established either way.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("insufficient evidence: {reason} ({checked} of {required} cases checked)")]
pub struct InsufficientEvidence {
    pub reason: String,
    pub checked: u64,
    pub required: u64,
}

/// The outcome of one obligation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Outcome {
    Discharged(Evidence),
    Failed(ObligationFailure),
    InsufficientEvidence(InsufficientEvidence),
}

impl Outcome {
    pub fn is_discharged(&self) -> bool {
        matches!(self, Self::Discharged(_))
    }

    /// Proven not to hold, as opposed to not yet proven.
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed(_))
    }

    /// Neither discharged nor refuted yet.
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Self::InsufficientEvidence(_))
    }

    /// Stable numeric tag used by the canonical encoding.
    pub fn to_u8(&self) -> u8 {
        match self {
            Self::Discharged(_) => 0,
            Self::Failed(_) => 1,
            Self::InsufficientEvidence(_) => 2,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discharged(e) => {
                write!(f, "discharged ({}", e.source)?;
                if e.cases > 0 {
                    write!(f, ", {} cases", e.cases)?;
                }
                f.write_str(")")
            }
            Self::Failed(failure) => {
                write!(f, "FAILED: {}", failure.reason)?;
                if let Some(cx) = &failure.counterexample {
                    write!(f, " [counterexample: {cx}]")?;
                }
                Ok(())
            }
            Self::InsufficientEvidence(ie) => write!(f, "NOT ESTABLISHED: {ie}"),
        }
    }
}

/// One obligation paired with its outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObligationResult {
    pub kind: ObligationKind,
    pub outcome: Outcome,
}

impl ObligationResult {
    pub fn new(kind: ObligationKind, outcome: Outcome) -> Self {
        Self { kind, outcome }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_kinds_have_distinct_tags() {
        let mut tags: Vec<u8> = ObligationKind::ALL.iter().map(|k| k.to_u8()).collect();
        tags.sort_unstable();
        tags.dedup();
        assert_eq!(tags.len(), ObligationKind::ALL.len());
    }

    #[test]
    fn test_outcome_display() {
        let failed = Outcome::Failed(
            ObligationFailure::new("lost information").with_counterexample(Counterexample {
                input: WitnessValue::Platform(PlatformValue::Utf16(vec![0xd800])),
                observed: WitnessValue::Platform(PlatformValue::Utf16(vec![0xfffd])),
            }),
        );
        assert_eq!(
            failed.to_string(),
            "FAILED: lost information [counterexample: u16[d800] -> u16\"\u{fffd}\"]"
        );

        let pending = Outcome::InsufficientEvidence(InsufficientEvidence {
            reason: "deadline reached".into(),
            checked: 10,
            required: 256,
        });
        assert!(pending.to_string().contains("10 of 256 cases"));
        assert!(!pending.is_failed());
        assert!(!pending.is_discharged());
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ObligationKind::RoundTrip(Side::Right).to_string(), "round-trip(right)");
        assert_eq!(ObligationKind::LayoutCompatibility.side(), None);
    }
}
