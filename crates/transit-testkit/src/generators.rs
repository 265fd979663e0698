//! Proptest generators for property-based testing.

use proptest::prelude::*;
use proptest::sample::select;

use transit_core::{
    Evidence, EvidenceSource, InsufficientEvidence, IrType, LanguageTag, ObligationFailure,
    ObligationKind, ObligationResult, Outcome, PlatformDescriptor, PrimitiveKind, Repr,
    ScalarRepr,
};

/// Generate a primitive IR type.
pub fn primitive_type() -> impl Strategy<Value = IrType> {
    prop_oneof![
        Just(IrType::int64()),
        Just(IrType::float64()),
        Just(IrType::string()),
        Just(IrType::bool()),
        Just(IrType::bytes()),
    ]
}

/// Generate a well-formed IR type up to three levels deep.
///
/// Field names are `f0`, `f1`, ... and case names `C0`, `C1`, ... so
/// generated types always pass validation.
pub fn ir_type() -> impl Strategy<Value = IrType> {
    primitive_type().prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            inner.clone().prop_map(IrType::list),
            inner.clone().prop_map(IrType::optional),
            inner.clone().prop_map(IrType::set),
            (inner.clone(), inner.clone()).prop_map(|(k, v)| IrType::map(k, v)),
            prop::collection::vec(inner.clone(), 1..4).prop_map(|tys| {
                IrType::record(
                    "Rec",
                    tys.into_iter().enumerate().map(|(i, ty)| (format!("f{i}"), ty)),
                )
            }),
            prop::collection::vec(prop::option::of(inner), 1..4).prop_map(|payloads| {
                IrType::variant(
                    "Var",
                    payloads
                        .into_iter()
                        .enumerate()
                        .map(|(i, p)| (format!("C{i}"), p)),
                )
            }),
        ]
    })
}

/// The reprs a platform may choose for a primitive.
pub fn scalar_reprs(kind: PrimitiveKind) -> Vec<ScalarRepr> {
    match kind {
        PrimitiveKind::Int64 => vec![
            ScalarRepr::I64,
            ScalarRepr::I32,
            ScalarRepr::SafeInteger,
            ScalarRepr::Integer {
                bits: 16,
                signed: false,
            },
        ],
        PrimitiveKind::Float64 => vec![ScalarRepr::F64, ScalarRepr::Float { bits: 32 }],
        PrimitiveKind::String => vec![
            ScalarRepr::Utf8,
            ScalarRepr::Utf16 {
                lone_surrogates: false,
            },
            ScalarRepr::Utf16 {
                lone_surrogates: true,
            },
        ],
        PrimitiveKind::Bool => vec![ScalarRepr::Bool],
        PrimitiveKind::Bytes => vec![ScalarRepr::Bytes],
    }
}

/// Build a repr for `ty`, taking scalar choices from `choices` in order.
pub fn repr_from_choices(ty: &IrType, choices: &[usize]) -> Repr {
    let mut next = choices.iter().copied().cycle();
    Repr::from_ir_with(ty, &mut |kind| {
        let options = scalar_reprs(kind);
        options[next.next().unwrap_or(0) % options.len()]
    })
}

/// A descriptor of `ty` in `language` with the natural repr.
pub fn natural_descriptor(language: &str, ty: &IrType, abi_stable: bool) -> PlatformDescriptor {
    let name = ty.name().unwrap_or("T").to_string();
    PlatformDescriptor::new(LanguageTag::new(language), name, ty.clone(), Repr::natural(ty), abi_stable)
        .expect("natural repr matches its IR")
}

/// Generate a descriptor of `ty` with arbitrary scalar reprs.
pub fn descriptor_of(ty: IrType) -> impl Strategy<Value = PlatformDescriptor> {
    (
        prop::collection::vec(any::<usize>(), 1..8),
        any::<bool>(),
        select(vec!["rust", "rescript", "c"]),
    )
        .prop_map(move |(choices, abi_stable, language)| {
            let repr = repr_from_choices(&ty, &choices);
            let name = ty.name().unwrap_or("T").to_string();
            PlatformDescriptor::new(LanguageTag::new(language), name, ty.clone(), repr, abi_stable)
                .expect("chosen reprs realize their primitives")
        })
}

/// Generate two descriptors of one IR type.
pub fn descriptor_pair() -> impl Strategy<Value = (PlatformDescriptor, PlatformDescriptor)> {
    ir_type().prop_flat_map(|ty| (descriptor_of(ty.clone()), descriptor_of(ty)))
}

/// Generate an obligation kind.
pub fn obligation_kind() -> impl Strategy<Value = ObligationKind> {
    select(ObligationKind::ALL.to_vec())
}

/// Generate an obligation outcome.
pub fn outcome() -> impl Strategy<Value = Outcome> {
    prop_oneof![
        prop_oneof![
            Just(EvidenceSource::Structural),
            Just(EvidenceSource::Exhaustive),
            any::<u64>().prop_map(|seed| EvidenceSource::Generated { seed }),
        ]
        .prop_map(|source| Outcome::Discharged(Evidence {
            law: "law".into(),
            universe: "universe".into(),
            source,
            cases: 1,
        })),
        "[a-z ]{1,16}".prop_map(|reason| Outcome::Failed(ObligationFailure::new(reason))),
        (0u64..64).prop_map(|checked| Outcome::InsufficientEvidence(InsufficientEvidence {
            reason: "deadline reached".into(),
            checked,
            required: 64,
        })),
    ]
}

/// Generate one obligation result.
pub fn obligation_result() -> impl Strategy<Value = ObligationResult> {
    (obligation_kind(), outcome()).prop_map(|(kind, outcome)| ObligationResult::new(kind, outcome))
}

/// Generate an arbitrary result set, possibly with gaps and duplicates.
pub fn result_set() -> impl Strategy<Value = Vec<ObligationResult>> {
    prop::collection::vec(obligation_result(), 0..12)
}

/// Generate a result set with exactly one result per obligation kind.
pub fn complete_result_set() -> impl Strategy<Value = Vec<ObligationResult>> {
    prop::collection::vec(outcome(), ObligationKind::ALL.len()).prop_map(|outcomes| {
        ObligationKind::ALL
            .iter()
            .zip(outcomes)
            .map(|(&kind, outcome)| ObligationResult::new(kind, outcome))
            .collect()
    })
}
