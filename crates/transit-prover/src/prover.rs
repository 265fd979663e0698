//! The equivalence prover.
//!
//! Each obligation is discharged by the cheapest evidence that establishes
//! it:
//!
//! 1. **Structural** - the codec is the structural mapping of its repr and
//!    every scalar conversion is injective in the required direction, so the
//!    law holds by construction.
//! 2. **Exhaustive** - the domain is finite and fits the case budget.
//! 3. **Generated** - the boundary corpus, then seeded random values until
//!    the case budget is spent. A failing random value is shrunk before it
//!    is reported.
//!
//! Failures and unfinished searches are results, not errors.

use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, RngAlgorithm, TestRng, TestRunner};
use transit_core::{
    Counterexample, Evidence, EvidenceSource, InsufficientEvidence, IrValue, ObligationFailure,
    ObligationKind, ObligationResult, Outcome, PlatformDescriptor, PlatformValue, Side,
    WitnessValue,
};

use crate::budget::{Budget, CancellationToken};
use crate::config::ProverConfig;
use crate::domain;
use crate::error::{ProverError, Result};
use crate::validator::Validator;

/// Simplification steps spent minimizing one counterexample.
const MAX_SHRINK_STEPS: usize = 1024;

/// Discharges the obligations between two descriptors of one IR type.
#[derive(Debug, Clone, Default)]
pub struct EquivalenceProver {
    config: ProverConfig,
}

impl EquivalenceProver {
    pub fn new(config: ProverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ProverConfig {
        &self.config
    }

    /// Attempt every obligation between `left` and `right`.
    ///
    /// Returns one result per [`ObligationKind`], in `ObligationKind::ALL`
    /// order. Fails only if the descriptors do not share an IR type.
    pub fn prove(
        &self,
        left: &PlatformDescriptor,
        right: &PlatformDescriptor,
        validator: &dyn Validator,
        token: &CancellationToken,
    ) -> Result<Vec<ObligationResult>> {
        if let Some(difference) = left.ir().first_difference(right.ir()) {
            return Err(ProverError::MismatchedIr { difference });
        }

        let budget = Budget::start(&self.config, token.clone());
        let descriptor = |side: Side| match side {
            Side::Left => left,
            Side::Right => right,
        };

        let results: Vec<ObligationResult> = ObligationKind::ALL
            .iter()
            .map(|&kind| {
                let outcome = match kind {
                    ObligationKind::RoundTrip(side) => {
                        self.round_trip(kind, descriptor(side), &budget)
                    }
                    ObligationKind::SemanticPreservation(side) => {
                        self.semantic_preservation(kind, descriptor(side), &budget)
                    }
                    ObligationKind::ValidationEquivalence(side) => {
                        self.validation_equivalence(kind, descriptor(side), validator, &budget)
                    }
                    ObligationKind::LayoutCompatibility => layout_compatibility(left, right),
                };
                match &outcome {
                    Outcome::InsufficientEvidence(ie) => {
                        tracing::warn!(%kind, checked = ie.checked, required = ie.required, reason = %ie.reason, "obligation not established");
                    }
                    _ => tracing::debug!(%kind, %outcome, "obligation settled"),
                }
                ObligationResult::new(kind, outcome)
            })
            .collect();
        Ok(results)
    }

    fn round_trip(&self, kind: ObligationKind, d: &PlatformDescriptor, budget: &Budget) -> Outcome {
        let repr = d.repr();
        let universe = format!("{} values of {}", d.language(), repr.encoding());
        if d.codec().is_structural() && repr.lowering_is_injective() {
            return structural(kind, universe);
        }
        let check = |v: &PlatformValue| {
            let back = d.from_ir(&d.to_ir(v));
            (back != *v).then(|| Counterexample {
                input: WitnessValue::Platform(v.clone()),
                observed: WitnessValue::Platform(back),
            })
        };
        let search = Search {
            kind,
            universe,
            reason: "from_ir(to_ir(v)) differs from v".to_string(),
        };
        self.search_platform(search, d, budget, check)
    }

    fn semantic_preservation(
        &self,
        kind: ObligationKind,
        d: &PlatformDescriptor,
        budget: &Budget,
    ) -> Outcome {
        let universe = format!("{} values of {}", d.language(), d.repr().encoding());
        if d.codec().is_structural() {
            return structural(kind, universe);
        }
        let check = |v: &PlatformValue| {
            let first = d.to_ir(v);
            let twin = v.clone();
            let second = d.to_ir(&twin);
            (first != second).then(|| Counterexample {
                input: WitnessValue::Platform(twin),
                observed: WitnessValue::Ir(second),
            })
        };
        let search = Search {
            kind,
            universe,
            reason: "equal values lowered to different IR values".to_string(),
        };
        self.search_platform(search, d, budget, check)
    }

    fn validation_equivalence(
        &self,
        kind: ObligationKind,
        d: &PlatformDescriptor,
        validator: &dyn Validator,
        budget: &Budget,
    ) -> Outcome {
        let ty = d.ir();
        let universe = format!("IR values of {ty} through {}", d.language());
        if d.codec().is_structural() && d.repr().lifting_is_injective() {
            return structural(kind, universe);
        }
        let check = |v: &IrValue| {
            let back = d.to_ir(&d.from_ir(v));
            (validator.validate(v) != validator.validate(&back)).then(|| Counterexample {
                input: WitnessValue::Ir(v.clone()),
                observed: WitnessValue::Ir(back),
            })
        };
        let search = Search {
            kind,
            universe,
            reason: format!(
                "validator `{}` verdict changed by the trip through {}",
                validator.id(),
                d.language()
            ),
        };
        let exhaustive = domain::ir_cardinality(ty)
            .filter(|n| *n <= budget.case_budget)
            .and_then(|_| domain::enumerate_ir(ty));
        match exhaustive {
            Some(values) => exhaustive_search(search, &values, budget, check),
            None => self.generated_search(
                search,
                &domain::ir_corpus(ty),
                domain::ir_strategy(ty, &self.config),
                budget,
                check,
            ),
        }
    }

    fn search_platform(
        &self,
        search: Search,
        d: &PlatformDescriptor,
        budget: &Budget,
        check: impl Fn(&PlatformValue) -> Option<Counterexample>,
    ) -> Outcome {
        let repr = d.repr();
        let exhaustive = repr
            .finite_cardinality()
            .filter(|n| *n <= budget.case_budget)
            .and_then(|_| domain::enumerate_platform(repr));
        match exhaustive {
            Some(values) => exhaustive_search(search, &values, budget, check),
            None => self.generated_search(
                search,
                &domain::platform_corpus(repr),
                domain::platform_strategy(repr, &self.config),
                budget,
                check,
            ),
        }
    }

    fn generated_search<S>(
        &self,
        search: Search,
        corpus: &[S::Value],
        strategy: S,
        budget: &Budget,
        check: impl Fn(&S::Value) -> Option<Counterexample>,
    ) -> Outcome
    where
        S: Strategy,
    {
        let target = budget.case_budget.max(budget.min_cases);
        let mut checked = 0u64;

        for value in corpus.iter().take(usize::try_from(budget.case_budget).unwrap_or(usize::MAX)) {
            if let Some(why) = budget.interrupted() {
                return search.insufficient(why.as_str(), checked, target);
            }
            if let Some(cx) = check(value) {
                return search.failed(cx);
            }
            checked += 1;
        }

        let mut runner =
            TestRunner::new_with_rng(Config::default(), seeded_rng(self.config.seed, search.kind));
        while checked < budget.case_budget {
            if let Some(why) = budget.interrupted() {
                return search.insufficient(why.as_str(), checked, target);
            }
            let mut tree = match strategy.new_tree(&mut runner) {
                Ok(tree) => tree,
                Err(reason) => {
                    return search.insufficient(&format!("value generation failed: {reason}"), checked, target)
                }
            };
            if let Some(cx) = check(&tree.current()) {
                return search.failed(shrink(&mut tree, cx, budget, &check));
            }
            checked += 1;
        }

        if checked < budget.min_cases {
            return search.insufficient("case budget below the required minimum", checked, target);
        }
        Outcome::Discharged(Evidence {
            law: search.kind.law().to_string(),
            universe: search.universe,
            source: EvidenceSource::Generated {
                seed: self.config.seed,
            },
            cases: checked,
        })
    }
}

/// What is being searched and how to report it.
struct Search {
    kind: ObligationKind,
    universe: String,
    reason: String,
}

impl Search {
    fn failed(self, cx: Counterexample) -> Outcome {
        Outcome::Failed(ObligationFailure::new(self.reason).with_counterexample(cx))
    }

    fn insufficient(self, reason: &str, checked: u64, required: u64) -> Outcome {
        Outcome::InsufficientEvidence(InsufficientEvidence {
            reason: reason.to_string(),
            checked,
            required,
        })
    }
}

fn structural(kind: ObligationKind, universe: String) -> Outcome {
    Outcome::Discharged(Evidence {
        law: kind.law().to_string(),
        universe,
        source: EvidenceSource::Structural,
        cases: 0,
    })
}

fn exhaustive_search<V>(
    search: Search,
    values: &[V],
    budget: &Budget,
    check: impl Fn(&V) -> Option<Counterexample>,
) -> Outcome {
    let total = values.len() as u64;
    let mut checked = 0u64;
    for value in values {
        if let Some(why) = budget.interrupted() {
            return search.insufficient(why.as_str(), checked, total);
        }
        if let Some(cx) = check(value) {
            return search.failed(cx);
        }
        checked += 1;
    }
    Outcome::Discharged(Evidence {
        law: search.kind.law().to_string(),
        universe: search.universe,
        source: EvidenceSource::Exhaustive,
        cases: checked,
    })
}

/// Simplify a failing value for as long as it keeps failing.
fn shrink<T: ValueTree>(
    tree: &mut T,
    mut best: Counterexample,
    budget: &Budget,
    check: &impl Fn(&T::Value) -> Option<Counterexample>,
) -> Counterexample {
    if !tree.simplify() {
        return best;
    }
    for _ in 0..MAX_SHRINK_STEPS {
        if budget.interrupted().is_some() {
            break;
        }
        match check(&tree.current()) {
            Some(cx) => {
                best = cx;
                if !tree.simplify() {
                    break;
                }
            }
            None => {
                if !tree.complicate() {
                    break;
                }
            }
        }
    }
    best
}

/// A generator seeded from the configured seed and the obligation, so every
/// obligation draws a reproducible sequence of its own.
fn seeded_rng(seed: u64, kind: ObligationKind) -> TestRng {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&seed.to_le_bytes());
    bytes[8] = kind.to_u8();
    TestRng::from_seed(RngAlgorithm::ChaCha, &bytes)
}

/// Compare the two layouts, reporting every mismatch.
fn layout_compatibility(left: &PlatformDescriptor, right: &PlatformDescriptor) -> Outcome {
    let (l, r) = (left.layout(), right.layout());
    let mut problems = Vec::new();

    for (side, d) in [(Side::Left, left), (Side::Right, right)] {
        if !d.layout().abi_stable {
            problems.push(format!("{side} layout ({}) is not ABI-stable", d.language()));
        } else if !d.is_ffi_usable() {
            problems.push(format!("{side} layout ({}) is not FFI-usable", d.language()));
        }
    }
    if l.size != r.size {
        problems.push(format!("sizes differ: {} vs {} bytes", l.size, r.size));
    }
    if l.align != r.align {
        problems.push(format!("alignments differ: {} vs {}", l.align, r.align));
    }
    if l.fields.len() != r.fields.len() {
        problems.push(format!(
            "field counts differ: {} vs {}",
            l.fields.len(),
            r.fields.len()
        ));
    }
    for (a, b) in l.fields.iter().zip(&r.fields) {
        if a.offset != b.offset {
            problems.push(format!(
                "field `{}` offsets differ: {} vs {}",
                a.name, a.offset, b.offset
            ));
        }
        if a.size != b.size {
            problems.push(format!(
                "field `{}` sizes differ: {} vs {} bytes",
                a.name, a.size, b.size
            ));
        }
        if a.encoding != b.encoding {
            problems.push(format!(
                "field `{}` encodings differ: {} vs {}",
                a.name, a.encoding, b.encoding
            ));
        }
    }

    if problems.is_empty() {
        structural(
            ObligationKind::LayoutCompatibility,
            format!("layouts of {}", left.ir()),
        )
    } else {
        Outcome::Failed(ObligationFailure::new(problems.join("; ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validator::{AcceptAll, FnValidator, RequireNonEmpty};
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use transit_core::{classify, Codec, IrType, LanguageTag, Repr, ReprCodec, ScalarRepr, TransportGrade};

    fn user_ir() -> IrType {
        IrType::record(
            "User",
            [
                ("id", IrType::int64()),
                ("name", IrType::string()),
                ("email", IrType::string()),
                ("active", IrType::bool()),
            ],
        )
    }

    fn user(language: &str, id: ScalarRepr, string: ScalarRepr, abi_stable: bool) -> PlatformDescriptor {
        let repr = Repr::Record(vec![
            Repr::Scalar(id),
            Repr::Scalar(string),
            Repr::Scalar(string),
            Repr::Scalar(ScalarRepr::Bool),
        ]);
        PlatformDescriptor::new(LanguageTag::new(language), "User", user_ir(), repr, abi_stable).unwrap()
    }

    fn rust_user() -> PlatformDescriptor {
        user("rust", ScalarRepr::I64, ScalarRepr::Utf8, true)
    }

    fn prove(left: &PlatformDescriptor, right: &PlatformDescriptor, validator: &dyn Validator) -> Vec<ObligationResult> {
        EquivalenceProver::default()
            .prove(left, right, validator, &CancellationToken::new())
            .unwrap()
    }

    fn outcome(results: &[ObligationResult], kind: ObligationKind) -> &Outcome {
        &results.iter().find(|r| r.kind == kind).unwrap().outcome
    }

    /// Trims surrounding whitespace from every string on the way in.
    struct Trimming(ReprCodec);

    impl Codec for Trimming {
        fn id(&self) -> &str {
            "trimming"
        }

        fn to_ir(&self, value: &PlatformValue) -> IrValue {
            match self.0.to_ir(value) {
                IrValue::Record(fields) => IrValue::Record(
                    fields
                        .into_iter()
                        .map(|f| match f {
                            IrValue::String(s) => IrValue::String(s.trim().to_string()),
                            other => other,
                        })
                        .collect(),
                ),
                other => other,
            }
        }

        fn from_ir(&self, value: &IrValue) -> PlatformValue {
            self.0.from_ir(value)
        }
    }

    /// Adds a call counter to every lowered id.
    struct Stateful(ReprCodec, AtomicU64);

    impl Codec for Stateful {
        fn id(&self) -> &str {
            "stateful"
        }

        fn to_ir(&self, value: &PlatformValue) -> IrValue {
            let calls = self.1.fetch_add(1, Ordering::Relaxed) as i64;
            match self.0.to_ir(value) {
                IrValue::Record(mut fields) => {
                    if let Some(IrValue::Int64(id)) = fields.first_mut() {
                        *id = id.wrapping_add(calls);
                    }
                    IrValue::Record(fields)
                }
                other => other,
            }
        }

        fn from_ir(&self, value: &IrValue) -> PlatformValue {
            self.0.from_ir(value)
        }
    }

    #[test]
    fn test_identical_abi_stable_descriptors_are_concorde() {
        let results = prove(&rust_user(), &rust_user(), &AcceptAll);
        assert_eq!(results.len(), ObligationKind::ALL.len());
        for r in &results {
            assert!(
                matches!(&r.outcome, Outcome::Discharged(e) if e.source == EvidenceSource::Structural),
                "{}: {}",
                r.kind,
                r.outcome
            );
        }
        assert_eq!(classify(&results), TransportGrade::Concorde);
    }

    #[test]
    fn test_mismatched_ir_is_a_precondition_error() {
        let other = PlatformDescriptor::new(
            LanguageTag::new("rust"),
            "Id",
            IrType::record("Id", [("id", IrType::int64())]),
            Repr::Record(vec![Repr::Scalar(ScalarRepr::I64)]),
            true,
        )
        .unwrap();
        let err = EquivalenceProver::default()
            .prove(&rust_user(), &other, &AcceptAll, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, ProverError::MismatchedIr { .. }));
    }

    #[test]
    fn test_narrow_integers_are_tested_against_the_validator() {
        let rescript = user("rescript", ScalarRepr::I32, ScalarRepr::Utf16 { lone_surrogates: false }, false);
        let results = prove(&rust_user(), &rescript, &AcceptAll);

        assert!(matches!(
            outcome(&results, ObligationKind::RoundTrip(Side::Right)),
            Outcome::Discharged(e) if e.source == EvidenceSource::Structural
        ));
        assert!(matches!(
            outcome(&results, ObligationKind::ValidationEquivalence(Side::Right)),
            Outcome::Discharged(e) if matches!(e.source, EvidenceSource::Generated { .. }) && e.cases == 256
        ));
        assert_eq!(classify(&results), TransportGrade::BusinessClass);

        let positive = FnValidator::new("positive-id", |v: &IrValue| {
            matches!(v, IrValue::Record(f) if matches!(f.first(), Some(IrValue::Int64(n)) if *n > 0))
        });
        let results = prove(&rust_user(), &rescript, &positive);
        let Outcome::Failed(failure) = outcome(&results, ObligationKind::ValidationEquivalence(Side::Right)) else {
            panic!("expected failure");
        };
        assert!(failure.reason.contains("positive-id"));
        assert!(failure.counterexample.is_some());
        assert_eq!(classify(&results), TransportGrade::Economy);
    }

    #[test]
    fn test_lone_surrogates_break_round_trip() {
        let js = user("rescript", ScalarRepr::I32, ScalarRepr::Utf16 { lone_surrogates: true }, false);
        let results = prove(&rust_user(), &js, &AcceptAll);
        let Outcome::Failed(failure) = outcome(&results, ObligationKind::RoundTrip(Side::Right)) else {
            panic!("expected failure");
        };
        let cx = failure.counterexample.as_ref().unwrap();
        assert_ne!(cx.input, cx.observed);
        assert_eq!(classify(&results), TransportGrade::Wheelbarrow);
    }

    #[test]
    fn test_layout_reports_every_mismatch() {
        let safe = user("rescript", ScalarRepr::SafeInteger, ScalarRepr::Utf8, true);
        let results = prove(&rust_user(), &safe, &AcceptAll);
        let Outcome::Failed(failure) = outcome(&results, ObligationKind::LayoutCompatibility) else {
            panic!("expected failure");
        };
        assert_eq!(failure.reason, "field `id` encodings differ: i64 vs f64-safe-int");
        assert_eq!(classify(&results), TransportGrade::BusinessClass);

        let narrow = user("rescript", ScalarRepr::I32, ScalarRepr::Utf8, false);
        let results = prove(&rust_user(), &narrow, &AcceptAll);
        let Outcome::Failed(failure) = outcome(&results, ObligationKind::LayoutCompatibility) else {
            panic!("expected failure");
        };
        assert!(failure.reason.contains("right layout (rescript) is not ABI-stable"));
        assert!(failure.reason.contains("field `id` sizes differ: 8 vs 4 bytes"));
        assert!(!failure.reason.contains("offsets"));
    }

    #[test]
    fn test_layout_is_symmetric() {
        let narrow = user("rescript", ScalarRepr::I32, ScalarRepr::Utf8, true);
        let a = layout_compatibility(&rust_user(), &narrow);
        let b = layout_compatibility(&narrow, &rust_user());
        assert_eq!(a.is_discharged(), b.is_discharged());
        assert!(a.is_failed());
    }

    #[test]
    fn test_trimming_codec_fails_validation_on_blank_name() {
        let base = rust_user();
        let trimming = base
            .clone()
            .with_codec(Arc::new(Trimming(ReprCodec::new(base.repr().clone()))));
        let results = prove(&base, &trimming, &RequireNonEmpty);
        let Outcome::Failed(failure) = outcome(&results, ObligationKind::ValidationEquivalence(Side::Right)) else {
            panic!("expected failure");
        };
        let Some(Counterexample {
            input: WitnessValue::Ir(IrValue::Record(fields)),
            ..
        }) = &failure.counterexample
        else {
            panic!("expected record counterexample");
        };
        assert_eq!(fields[1], IrValue::string(" "));
        assert!(outcome(&results, ObligationKind::RoundTrip(Side::Right)).is_failed());
        assert_eq!(classify(&results), TransportGrade::Wheelbarrow);
    }

    #[test]
    fn test_stateful_codec_fails_semantic_preservation() {
        let base = rust_user();
        let stateful = base
            .clone()
            .with_codec(Arc::new(Stateful(ReprCodec::new(base.repr().clone()), AtomicU64::new(0))));
        let results = prove(&base, &stateful, &AcceptAll);
        assert!(outcome(&results, ObligationKind::SemanticPreservation(Side::Right)).is_failed());
        assert!(outcome(&results, ObligationKind::SemanticPreservation(Side::Left)).is_discharged());
    }

    #[test]
    fn test_finite_domains_are_enumerated() {
        let ty = IrType::record("Flags", [("a", IrType::bool()), ("b", IrType::int64())]);
        let small = PlatformDescriptor::new(
            LanguageTag::new("c"),
            "Flags",
            ty,
            Repr::Record(vec![
                Repr::Scalar(ScalarRepr::Bool),
                Repr::Scalar(ScalarRepr::Integer { bits: 8, signed: false }),
            ]),
            true,
        )
        .unwrap();
        let config = ProverConfig {
            case_budget: 1024,
            ..ProverConfig::default()
        };
        let opaque = small.clone().with_codec(Arc::new(Opaque(ReprCodec::new(small.repr().clone()))));
        let results = EquivalenceProver::new(config)
            .prove(&opaque, &opaque, &AcceptAll, &CancellationToken::new())
            .unwrap();
        assert!(matches!(
            outcome(&results, ObligationKind::RoundTrip(Side::Left)),
            Outcome::Discharged(e) if e.source == EvidenceSource::Exhaustive && e.cases == 512
        ));
    }

    /// The structural mapping behind an opaque id.
    struct Opaque(ReprCodec);

    impl Codec for Opaque {
        fn id(&self) -> &str {
            "opaque"
        }

        fn to_ir(&self, value: &PlatformValue) -> IrValue {
            self.0.to_ir(value)
        }

        fn from_ir(&self, value: &IrValue) -> PlatformValue {
            self.0.from_ir(value)
        }
    }

    #[test]
    fn test_cancellation_leaves_tested_obligations_unestablished() {
        let base = rust_user();
        let opaque = base.clone().with_codec(Arc::new(Opaque(ReprCodec::new(base.repr().clone()))));
        let token = CancellationToken::new();
        token.cancel();
        let results = EquivalenceProver::default()
            .prove(&base, &opaque, &AcceptAll, &token)
            .unwrap();
        assert!(matches!(
            outcome(&results, ObligationKind::RoundTrip(Side::Right)),
            Outcome::InsufficientEvidence(ie) if ie.checked == 0 && ie.reason == "cancelled"
        ));
        assert!(outcome(&results, ObligationKind::RoundTrip(Side::Left)).is_discharged());
        assert_eq!(classify(&results), TransportGrade::Wheelbarrow);
    }

    #[test]
    fn test_generated_evidence_is_reproducible() {
        let base = rust_user();
        let opaque = base.clone().with_codec(Arc::new(Opaque(ReprCodec::new(base.repr().clone()))));
        let first = prove(&base, &opaque, &AcceptAll);
        let second = prove(&base, &opaque, &AcceptAll);
        assert_eq!(first, second);
        assert!(matches!(
            outcome(&first, ObligationKind::RoundTrip(Side::Right)),
            Outcome::Discharged(e) if e.source == EvidenceSource::Generated { seed: ProverConfig::default().seed }
        ));
    }
}
