//! Safety certificates.
//!
//! A [`SafetyCertificate`] is the terminal artifact of the pipeline: the IR
//! type, both descriptor summaries, the validator id, every obligation result
//! and the resulting grade. It is content-addressed by its inputs and never
//! mutated after issue; a changed input means a new certificate.

use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

use crate::canonical::certificate_input_bytes;
use crate::crypto::{Blake3Hash, CERTIFICATE_DOMAIN};
use crate::descriptor::DescriptorSummary;
use crate::error::{CoreError, GateError, Result};
use crate::grade::{classify, BindingKind, TransportGrade};
use crate::ir::IrType;
use crate::obligation::{
    Counterexample, InsufficientEvidence, ObligationKind, ObligationResult, Outcome,
};
use crate::types::CertificateId;

/// An immutable, graded record of an equivalence derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyCertificate {
    id: CertificateId,
    ir: IrType,
    left: DescriptorSummary,
    right: DescriptorSummary,
    validator_id: String,
    results: Vec<ObligationResult>,
    grade: TransportGrade,
}

impl SafetyCertificate {
    /// Issue a certificate. The grade is classified from `results`.
    pub fn issue(
        ir: IrType,
        left: DescriptorSummary,
        right: DescriptorSummary,
        validator_id: impl Into<String>,
        mut results: Vec<ObligationResult>,
    ) -> Result<Self> {
        let validator_id = validator_id.into();
        let id = Self::compute_id(&ir, &left, &right, &validator_id)?;
        results.sort_by_key(|r| r.kind);
        let grade = classify(&results);
        Ok(Self {
            id,
            ir,
            left,
            right,
            validator_id,
            results,
            grade,
        })
    }

    /// The id a certificate over these inputs has.
    pub fn compute_id(
        ir: &IrType,
        left: &DescriptorSummary,
        right: &DescriptorSummary,
        validator_id: &str,
    ) -> Result<CertificateId> {
        let bytes = certificate_input_bytes(ir, left, right, validator_id)?;
        Ok(CertificateId(Blake3Hash::hash_domain(CERTIFICATE_DOMAIN, &bytes).0))
    }

    /// Canonical bytes of the inputs this certificate was derived from.
    pub fn input_bytes(&self) -> Result<Vec<u8>> {
        certificate_input_bytes(&self.ir, &self.left, &self.right, &self.validator_id)
    }

    pub fn id(&self) -> CertificateId {
        self.id
    }

    pub fn ir(&self) -> &IrType {
        &self.ir
    }

    pub fn left(&self) -> &DescriptorSummary {
        &self.left
    }

    pub fn right(&self) -> &DescriptorSummary {
        &self.right
    }

    pub fn validator_id(&self) -> &str {
        &self.validator_id
    }

    pub fn results(&self) -> &[ObligationResult] {
        &self.results
    }

    pub fn grade(&self) -> TransportGrade {
        self.grade
    }

    pub fn outcome(&self, kind: ObligationKind) -> Option<&Outcome> {
        self.results
            .iter()
            .find(|r| r.kind == kind)
            .map(|r| &r.outcome)
    }

    /// Every counterexample recorded, with the obligation it refutes.
    pub fn counterexamples(&self) -> Vec<(ObligationKind, &Counterexample)> {
        self.results
            .iter()
            .filter_map(|r| match &r.outcome {
                Outcome::Failed(failure) => failure.counterexample.as_ref().map(|cx| (r.kind, cx)),
                _ => None,
            })
            .collect()
    }

    /// Some obligation was shown not to hold.
    pub fn is_proven_unsafe(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_failed())
    }

    /// Below Concorde only because some law was never established.
    pub fn is_unproven(&self) -> bool {
        self.grade < TransportGrade::Concorde && !self.is_proven_unsafe()
    }

    /// Every obligation reached a verdict. An unsettled certificate may
    /// improve if the derivation is run again with more time.
    pub fn is_settled(&self) -> bool {
        !self.results.iter().any(|r| r.outcome.is_insufficient())
    }

    /// Recompute the id from the inputs and the grade from the results.
    pub fn verify_integrity(&self) -> Result<()> {
        let id = Self::compute_id(&self.ir, &self.left, &self.right, &self.validator_id)?;
        if id != self.id {
            return Err(CoreError::Integrity(format!(
                "id {} does not match inputs ({})",
                self.id, id
            )));
        }
        let grade = classify(&self.results);
        if grade != self.grade {
            return Err(CoreError::Integrity(format!(
                "grade {} does not match results ({})",
                self.grade, grade
            )));
        }
        Ok(())
    }

    /// Gate a binding on this certificate's grade.
    pub fn require(&self, binding: BindingKind) -> std::result::Result<&Self, GateError> {
        if self.grade.permits(binding) {
            return Ok(self);
        }
        let required = binding.minimum_grade();
        let blocking = ObligationKind::ALL.iter().find_map(|&kind| {
            match self.results.iter().find(|r| r.kind == kind && !r.outcome.is_discharged()) {
                Some(r) => Some((kind, Some(&r.outcome))),
                None if self.outcome(kind).is_none() => Some((kind, None)),
                None => None,
            }
        });
        let (kind, outcome) = blocking.unwrap_or((ObligationKind::LayoutCompatibility, None));
        let err = match outcome {
            Some(Outcome::Failed(failure)) => GateError::ProvenUnsafe {
                id: self.id,
                binding,
                required,
                actual: self.grade,
                kind,
                source: failure.clone(),
            },
            Some(Outcome::InsufficientEvidence(ie)) => GateError::Unproven {
                id: self.id,
                binding,
                required,
                actual: self.grade,
                kind,
                source: ie.clone(),
            },
            _ => GateError::Unproven {
                id: self.id,
                binding,
                required,
                actual: self.grade,
                kind,
                source: InsufficientEvidence {
                    reason: "obligation was not checked".into(),
                    checked: 0,
                    required: 0,
                },
            },
        };
        Err(err)
    }

    /// Human-readable compatibility report.
    pub fn report(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Compatibility Analysis");
        let _ = writeln!(out, "======================");
        let _ = writeln!(out);
        let _ = writeln!(out, "Type: {}", self.ir);
        for (label, side) in [("Left", &self.left), ("Right", &self.right)] {
            let _ = writeln!(
                out,
                "{label}: {} `{}` (size {}, align {}, {}, codec {})",
                side.language,
                side.type_name,
                side.layout.size,
                side.layout.align,
                if side.layout.abi_stable {
                    "abi-stable"
                } else {
                    "layout unspecified"
                },
                side.codec,
            );
        }
        let _ = writeln!(out, "Validator: {}", self.validator_id);
        let _ = writeln!(
            out,
            "Transport Grade: {} ({})",
            self.grade,
            self.grade.description()
        );
        let _ = writeln!(out, "Certificate: {}", self.id.to_hex());

        let _ = writeln!(out);
        let _ = writeln!(out, "Type Mappings:");
        for (l, r) in self.left.layout.fields.iter().zip(&self.right.layout.fields) {
            let _ = write!(out, "  {}: {} → {}", l.name, l.encoding, r.encoding);
            if l.size != r.size {
                let _ = write!(out, " ({} vs {} bytes)", l.size, r.size);
            }
            let _ = writeln!(out);
        }

        let _ = writeln!(out);
        let _ = writeln!(out, "Obligations:");
        for result in &self.results {
            let _ = writeln!(out, "  {}: {}", result.kind, result.outcome);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::PlatformDescriptor;
    use crate::obligation::{Evidence, EvidenceSource, ObligationFailure, Side, WitnessValue};
    use crate::repr::{Repr, ScalarRepr};
    use crate::value::PlatformValue;

    fn user() -> IrType {
        IrType::record(
            "User",
            [("id", IrType::int64()), ("name", IrType::string())],
        )
    }

    fn summary(language: &str, repr: Repr) -> DescriptorSummary {
        PlatformDescriptor::new(language.into(), "User", user(), repr, true)
            .unwrap()
            .summary()
    }

    fn discharged() -> Outcome {
        Outcome::Discharged(Evidence {
            law: "law".into(),
            universe: "all".into(),
            source: EvidenceSource::Structural,
            cases: 0,
        })
    }

    fn results_with(kind: ObligationKind, outcome: Outcome) -> Vec<ObligationResult> {
        ObligationKind::ALL
            .iter()
            .map(|&k| {
                let o = if k == kind { outcome.clone() } else { discharged() };
                ObligationResult::new(k, o)
            })
            .collect()
    }

    fn narrow() -> Repr {
        Repr::Record(vec![
            Repr::Scalar(ScalarRepr::I32),
            Repr::Scalar(ScalarRepr::Utf8),
        ])
    }

    #[test]
    fn test_issue_and_verify() {
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rust", Repr::natural(&user())),
            "accept-all",
            results_with(ObligationKind::LayoutCompatibility, discharged()),
        )
        .unwrap();
        assert_eq!(cert.grade(), TransportGrade::Concorde);
        assert!(cert.verify_integrity().is_ok());
        assert!(cert.require(BindingKind::SharedMemory).is_ok());
        assert!(!cert.is_proven_unsafe());
    }

    #[test]
    fn test_id_depends_on_inputs() {
        let results = results_with(ObligationKind::LayoutCompatibility, discharged());
        let a = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rescript", narrow()),
            "v",
            results.clone(),
        )
        .unwrap();
        let b = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rescript", Repr::natural(&user())),
            "v",
            results,
        )
        .unwrap();
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_tampered_grade_detected() {
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rescript", narrow()),
            "v",
            results_with(
                ObligationKind::LayoutCompatibility,
                Outcome::Failed(ObligationFailure::new("field `id` sizes differ: 8 vs 4 bytes")),
            ),
        )
        .unwrap();
        assert_eq!(cert.grade(), TransportGrade::BusinessClass);

        let mut json = serde_json::to_value(&cert).unwrap();
        json["grade"] = serde_json::json!("Concorde");
        let tampered: SafetyCertificate = serde_json::from_value(json).unwrap();
        assert!(matches!(
            tampered.verify_integrity(),
            Err(CoreError::Integrity(_))
        ));
    }

    #[test]
    fn test_require_reports_blocking_obligation() {
        let failure = ObligationFailure::new("lost information").with_counterexample(Counterexample {
            input: WitnessValue::Platform(PlatformValue::Utf16(vec![0xd800])),
            observed: WitnessValue::Platform(PlatformValue::Utf16(vec![0xfffd])),
        });
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rust", Repr::natural(&user())),
            "v",
            results_with(ObligationKind::RoundTrip(Side::Right), Outcome::Failed(failure)),
        )
        .unwrap();

        assert_eq!(cert.grade(), TransportGrade::Wheelbarrow);
        assert!(cert.is_proven_unsafe());
        assert_eq!(cert.counterexamples().len(), 1);
        let err = cert.require(BindingKind::Serialized).unwrap_err();
        assert!(matches!(
            err,
            GateError::ProvenUnsafe {
                kind: ObligationKind::RoundTrip(Side::Right),
                ..
            }
        ));
    }

    #[test]
    fn test_unproven_distinguished_from_unsafe() {
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rust", Repr::natural(&user())),
            "v",
            results_with(
                ObligationKind::ValidationEquivalence(Side::Left),
                Outcome::InsufficientEvidence(InsufficientEvidence {
                    reason: "cancelled".into(),
                    checked: 3,
                    required: 64,
                }),
            ),
        )
        .unwrap();
        assert_eq!(cert.grade(), TransportGrade::Economy);
        assert!(cert.is_unproven());
        assert!(!cert.is_settled());
        assert!(matches!(
            cert.require(BindingKind::SharedMemory),
            Err(GateError::Unproven { .. })
        ));
    }

    #[test]
    fn test_refuted_certificate_is_settled() {
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rust", narrow()),
            "v",
            results_with(
                ObligationKind::LayoutCompatibility,
                Outcome::Failed(ObligationFailure::new("field `id` sizes differ: 8 vs 4 bytes")),
            ),
        )
        .unwrap();
        assert!(cert.is_settled());
        assert!(!cert.is_unproven());
    }

    #[test]
    fn test_report_mentions_mappings_and_grade() {
        let cert = SafetyCertificate::issue(
            user(),
            summary("rust", Repr::natural(&user())),
            summary("rescript", narrow()),
            "v",
            results_with(
                ObligationKind::LayoutCompatibility,
                Outcome::Failed(ObligationFailure::new("field `id` sizes differ: 8 vs 4 bytes")),
            ),
        )
        .unwrap();
        let report = cert.report();
        assert!(report.contains("Transport Grade: BusinessClass"));
        assert!(report.contains("id: i64 → i32 (8 vs 4 bytes)"));
        assert!(report.contains("layout-compatibility: FAILED"));
    }
}
