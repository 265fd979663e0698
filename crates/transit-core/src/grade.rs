//! Transport grades and the classifier.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::obligation::{ObligationKind, ObligationResult, Side};

/// Fidelity grade of a language pair's mapping for one type.
///
/// Ordered by fidelity: `Wheelbarrow < Economy < BusinessClass < Concorde`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TransportGrade {
    /// Conversion loses information on at least one side.
    Wheelbarrow,
    /// Conversion is mechanically possible but changes observable behavior.
    Economy,
    /// Safe to serialize, unsafe to hand a raw pointer across.
    BusinessClass,
    /// Every obligation discharged on both sides.
    Concorde,
}

impl TransportGrade {
    pub const ALL: [TransportGrade; 4] = [
        Self::Wheelbarrow,
        Self::Economy,
        Self::BusinessClass,
        Self::Concorde,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Wheelbarrow => "Wheelbarrow",
            Self::Economy => "Economy",
            Self::BusinessClass => "BusinessClass",
            Self::Concorde => "Concorde",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            Self::Wheelbarrow => "information is lost on conversion; no binding is safe",
            Self::Economy => "values convert but validation or lowering behavior differs",
            Self::BusinessClass => "lossless serialized interop; memory layouts differ",
            Self::Concorde => "lossless, behavior-preserving and layout-identical",
        }
    }

    /// Whether a binding of this kind may be generated at this grade.
    pub fn permits(self, binding: BindingKind) -> bool {
        self >= binding.minimum_grade()
    }

    /// Stable numeric tag used by the canonical encoding.
    pub fn to_u8(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for TransportGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of binding a generator intends to emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BindingKind {
    /// Raw pointers or shared structs across the boundary.
    SharedMemory,
    /// Values are converted and copied across the boundary.
    Serialized,
}

impl BindingKind {
    pub fn minimum_grade(self) -> TransportGrade {
        match self {
            Self::SharedMemory => TransportGrade::Concorde,
            Self::Serialized => TransportGrade::Economy,
        }
    }
}

impl fmt::Display for BindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SharedMemory => f.write_str("shared-memory"),
            Self::Serialized => f.write_str("serialized"),
        }
    }
}

/// Classify a set of obligation results.
///
/// Pessimistic: an obligation counts as discharged only if it is present and
/// every result recorded for it is discharged. Anything else, including
/// insufficient evidence, counts as not discharged.
pub fn classify(results: &[ObligationResult]) -> TransportGrade {
    let discharged = |kind: ObligationKind| {
        let mut matching = results.iter().filter(|r| r.kind == kind).peekable();
        matching.peek().is_some() && matching.all(|r| r.outcome.is_discharged())
    };

    if !Side::BOTH
        .iter()
        .all(|&s| discharged(ObligationKind::RoundTrip(s)))
    {
        return TransportGrade::Wheelbarrow;
    }
    let behavior_preserved = Side::BOTH.iter().all(|&s| {
        discharged(ObligationKind::SemanticPreservation(s))
            && discharged(ObligationKind::ValidationEquivalence(s))
    });
    if !behavior_preserved {
        return TransportGrade::Economy;
    }
    if !discharged(ObligationKind::LayoutCompatibility) {
        return TransportGrade::BusinessClass;
    }
    TransportGrade::Concorde
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::obligation::{Evidence, EvidenceSource, InsufficientEvidence, ObligationFailure, Outcome};

    fn discharged() -> Outcome {
        Outcome::Discharged(Evidence {
            law: "law".into(),
            universe: "all".into(),
            source: EvidenceSource::Structural,
            cases: 0,
        })
    }

    fn failed() -> Outcome {
        Outcome::Failed(ObligationFailure::new("no"))
    }

    fn all_discharged() -> Vec<ObligationResult> {
        ObligationKind::ALL
            .iter()
            .map(|&k| ObligationResult::new(k, discharged()))
            .collect()
    }

    fn with(kind: ObligationKind, outcome: Outcome) -> Vec<ObligationResult> {
        all_discharged()
            .into_iter()
            .map(|r| {
                if r.kind == kind {
                    ObligationResult::new(kind, outcome.clone())
                } else {
                    r
                }
            })
            .collect()
    }

    #[test]
    fn test_grade_ordering() {
        assert!(TransportGrade::Concorde > TransportGrade::BusinessClass);
        assert!(TransportGrade::BusinessClass > TransportGrade::Economy);
        assert!(TransportGrade::Economy > TransportGrade::Wheelbarrow);
    }

    #[test]
    fn test_classify_policy() {
        assert_eq!(classify(&all_discharged()), TransportGrade::Concorde);
        assert_eq!(
            classify(&with(ObligationKind::LayoutCompatibility, failed())),
            TransportGrade::BusinessClass
        );
        assert_eq!(
            classify(&with(ObligationKind::ValidationEquivalence(Side::Right), failed())),
            TransportGrade::Economy
        );
        assert_eq!(
            classify(&with(ObligationKind::SemanticPreservation(Side::Left), failed())),
            TransportGrade::Economy
        );
        assert_eq!(
            classify(&with(ObligationKind::RoundTrip(Side::Left), failed())),
            TransportGrade::Wheelbarrow
        );
    }

    #[test]
    fn test_insufficient_evidence_counts_as_failure() {
        let pending = Outcome::InsufficientEvidence(InsufficientEvidence {
            reason: "budget".into(),
            checked: 1,
            required: 2,
        });
        assert_eq!(
            classify(&with(ObligationKind::RoundTrip(Side::Right), pending)),
            TransportGrade::Wheelbarrow
        );
    }

    #[test]
    fn test_missing_and_duplicate_obligations_are_pessimistic() {
        assert_eq!(classify(&[]), TransportGrade::Wheelbarrow);

        let mut results = all_discharged();
        results.retain(|r| r.kind != ObligationKind::LayoutCompatibility);
        assert_eq!(classify(&results), TransportGrade::BusinessClass);

        let mut results = all_discharged();
        results.push(ObligationResult::new(ObligationKind::LayoutCompatibility, failed()));
        assert_eq!(classify(&results), TransportGrade::BusinessClass);
    }

    #[test]
    fn test_binding_gate() {
        assert!(TransportGrade::Concorde.permits(BindingKind::SharedMemory));
        assert!(!TransportGrade::BusinessClass.permits(BindingKind::SharedMemory));
        assert!(TransportGrade::BusinessClass.permits(BindingKind::Serialized));
        assert!(TransportGrade::Economy.permits(BindingKind::Serialized));
        assert!(!TransportGrade::Wheelbarrow.permits(BindingKind::Serialized));
    }
}
