//! Value domains: boundary corpora, exhaustive enumeration and random
//! generation for platform reprs and IR types.
//!
//! IR values are produced by lowering values of the type's natural repr
//! (i64, f64, UTF-8, bool8), which is a bijection onto the IR domain.

use proptest::prelude::*;
use proptest::strategy::Union;
use transit_core::{Codec, IrType, IrValue, PlatformValue, Repr, ReprCodec, ScalarRepr, MAX_SAFE_INTEGER};

use crate::config::ProverConfig;

const STRINGS: &[&str] = &["a", "", " ", "  a  ", "é", "😀", "\0", "\u{feff}"];

const LONE_SURROGATES: &[&[u16]] = &[&[0xd800], &[0xdc00], &[0x61, 0xdfff]];

fn push_unique<T: PartialEq>(out: &mut Vec<T>, value: T) {
    if !out.contains(&value) {
        out.push(value);
    }
}

fn integer_candidates() -> Vec<i128> {
    let safe = i128::from(MAX_SAFE_INTEGER);
    vec![
        0,
        1,
        -1,
        127,
        128,
        255,
        256,
        i128::from(i32::MAX),
        i128::from(i32::MAX) + 1,
        i128::from(i32::MIN),
        i128::from(i32::MIN) - 1,
        i128::from(u32::MAX) + 1,
        safe,
        safe + 1,
        -safe,
        -safe - 1,
        i128::from(i64::MAX),
        i128::from(i64::MIN),
        i128::from(u64::MAX),
    ]
}

fn float_candidates() -> Vec<f64> {
    vec![
        0.0,
        -0.0,
        1.0,
        -1.0,
        0.1,
        f64::MIN_POSITIVE,
        f64::from_bits(1),
        MAX_SAFE_INTEGER as f64,
        MAX_SAFE_INTEGER as f64 + 2.0,
        f64::MAX,
        f64::MIN,
        f64::INFINITY,
        f64::NEG_INFINITY,
        f64::NAN,
    ]
}

fn scalar_corpus(repr: ScalarRepr) -> Vec<PlatformValue> {
    let mut out = Vec::new();
    match repr {
        ScalarRepr::Integer { .. } => {
            if let Some((lo, hi)) = repr.integer_range() {
                let mut candidates = integer_candidates();
                candidates.extend([lo, lo + 1, hi - 1, hi]);
                for n in candidates.into_iter().filter(|n| (lo..=hi).contains(n)) {
                    push_unique(&mut out, PlatformValue::Integer(n));
                }
            }
        }
        ScalarRepr::SafeInteger => {
            for n in integer_candidates() {
                push_unique(&mut out, PlatformValue::Float(n as f64));
            }
        }
        ScalarRepr::Float { bits } => {
            for x in float_candidates() {
                let x = if bits == 32 { f64::from(x as f32) } else { x };
                push_unique(&mut out, PlatformValue::Float(x));
            }
        }
        ScalarRepr::Utf8 => {
            for s in STRINGS {
                push_unique(&mut out, PlatformValue::utf8(*s));
            }
        }
        ScalarRepr::Utf16 { lone_surrogates } => {
            for s in STRINGS {
                push_unique(&mut out, PlatformValue::utf16(s));
            }
            if lone_surrogates {
                for units in LONE_SURROGATES {
                    push_unique(&mut out, PlatformValue::Utf16(units.to_vec()));
                }
            }
        }
        ScalarRepr::Bool => out.extend([PlatformValue::Bool(false), PlatformValue::Bool(true)]),
        ScalarRepr::Bytes => {
            let samples: [&[u8]; 4] = [&[], &[0], &[0xff], &[0, 1, 2, 3]];
            for bytes in samples {
                out.push(PlatformValue::Bytes(bytes.to_vec()));
            }
        }
    }
    out.retain(|v| repr.contains(v));
    out
}

/// Boundary values of `repr`'s domain.
///
/// The first entry is a typical value. Composites vary one part at a time
/// around the typical value, so a failing entry points at a single field.
pub fn platform_corpus(repr: &Repr) -> Vec<PlatformValue> {
    match repr {
        Repr::Scalar(s) => scalar_corpus(*s),
        Repr::List(e) | Repr::Set(e) => {
            let inner = platform_corpus(e);
            let wrap = |items: Vec<PlatformValue>| match repr {
                Repr::Set(_) => PlatformValue::Set(items),
                _ => PlatformValue::List(items),
            };
            let mut out = vec![wrap(Vec::new())];
            out.extend(inner.iter().map(|v| wrap(vec![v.clone()])));
            if inner.len() >= 2 {
                out.push(wrap(inner.iter().take(3).cloned().collect()));
            }
            out
        }
        Repr::Optional(e) => std::iter::once(PlatformValue::Optional(None))
            .chain(
                platform_corpus(e)
                    .into_iter()
                    .map(|v| PlatformValue::Optional(Some(Box::new(v)))),
            )
            .collect(),
        Repr::Map { key, value } => {
            let keys = platform_corpus(key);
            let values = platform_corpus(value);
            let mut out = vec![PlatformValue::Map(Vec::new())];
            if let (Some(k0), Some(v0)) = (keys.first(), values.first()) {
                for k in &keys {
                    out.push(PlatformValue::Map(vec![(k.clone(), v0.clone())]));
                }
                for v in values.iter().skip(1) {
                    out.push(PlatformValue::Map(vec![(k0.clone(), v.clone())]));
                }
            }
            out
        }
        Repr::Record(fields) => {
            let corpora: Vec<Vec<PlatformValue>> = fields.iter().map(platform_corpus).collect();
            let base: Vec<PlatformValue> = corpora
                .iter()
                .filter_map(|c| c.first().cloned())
                .collect();
            if base.len() != fields.len() {
                return Vec::new();
            }
            let mut out = vec![PlatformValue::Record(base.clone())];
            for (i, corpus) in corpora.iter().enumerate() {
                for v in corpus.iter().skip(1) {
                    let mut values = base.clone();
                    values[i] = v.clone();
                    out.push(PlatformValue::Record(values));
                }
            }
            out
        }
        Repr::Variant(cases) => {
            let mut out = Vec::new();
            for (case, payload) in (0u32..).zip(cases) {
                match payload {
                    None => out.push(PlatformValue::Variant {
                        case,
                        payload: None,
                    }),
                    Some(r) => out.extend(platform_corpus(r).into_iter().map(|v| {
                        PlatformValue::Variant {
                            case,
                            payload: Some(Box::new(v)),
                        }
                    })),
                }
            }
            out
        }
    }
}

/// Every value of a finite domain, or `None` if the domain is infinite.
pub fn enumerate_platform(repr: &Repr) -> Option<Vec<PlatformValue>> {
    match repr {
        Repr::Scalar(ScalarRepr::Bool) => {
            Some(vec![PlatformValue::Bool(false), PlatformValue::Bool(true)])
        }
        Repr::Scalar(s @ ScalarRepr::Integer { bits: 8 | 16, .. }) => {
            let (lo, hi) = s.integer_range()?;
            Some((lo..=hi).map(PlatformValue::Integer).collect())
        }
        Repr::Scalar(_) | Repr::List(_) | Repr::Set(_) | Repr::Map { .. } => None,
        Repr::Optional(e) => {
            let mut out = vec![PlatformValue::Optional(None)];
            out.extend(
                enumerate_platform(e)?
                    .into_iter()
                    .map(|v| PlatformValue::Optional(Some(Box::new(v)))),
            );
            Some(out)
        }
        Repr::Record(fields) => {
            let mut rows: Vec<Vec<PlatformValue>> = vec![Vec::new()];
            for field in fields {
                let values = enumerate_platform(field)?;
                rows = rows
                    .into_iter()
                    .flat_map(|row| {
                        values.iter().map(move |v| {
                            let mut row = row.clone();
                            row.push(v.clone());
                            row
                        })
                    })
                    .collect();
            }
            Some(rows.into_iter().map(PlatformValue::Record).collect())
        }
        Repr::Variant(cases) => {
            let mut out = Vec::new();
            for (case, payload) in (0u32..).zip(cases) {
                match payload {
                    None => out.push(PlatformValue::Variant {
                        case,
                        payload: None,
                    }),
                    Some(r) => out.extend(enumerate_platform(r)?.into_iter().map(|v| {
                        PlatformValue::Variant {
                            case,
                            payload: Some(Box::new(v)),
                        }
                    })),
                }
            }
            Some(out)
        }
    }
}

fn dedup<T: PartialEq>(items: Vec<T>) -> Vec<T> {
    let mut out = Vec::with_capacity(items.len());
    for item in items {
        push_unique(&mut out, item);
    }
    out
}

fn dedup_keys<K: PartialEq, V>(entries: Vec<(K, V)>) -> Vec<(K, V)> {
    let mut out: Vec<(K, V)> = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        if !out.iter().any(|(seen, _)| *seen == k) {
            out.push((k, v));
        }
    }
    out
}

fn scalar_strategy(repr: ScalarRepr, config: &ProverConfig) -> BoxedStrategy<PlatformValue> {
    let max_len = config.max_string_len;
    let text = proptest::collection::vec(any::<char>(), 0..=max_len)
        .prop_map(|chars| chars.into_iter().collect::<String>());
    match repr {
        ScalarRepr::Integer { .. } => match repr.integer_range() {
            Some((lo, hi)) => (lo..=hi).prop_map(PlatformValue::Integer).boxed(),
            None => Just(PlatformValue::Integer(0)).boxed(),
        },
        ScalarRepr::SafeInteger => (-MAX_SAFE_INTEGER..=MAX_SAFE_INTEGER)
            .prop_map(|n| PlatformValue::Float(n as f64))
            .boxed(),
        ScalarRepr::Float { bits: 32 } => proptest::num::f32::ANY
            .prop_map(|x| PlatformValue::Float(f64::from(x)))
            .boxed(),
        ScalarRepr::Float { .. } => proptest::num::f64::ANY.prop_map(PlatformValue::Float).boxed(),
        ScalarRepr::Utf8 => text.prop_map(PlatformValue::Utf8).boxed(),
        ScalarRepr::Utf16 {
            lone_surrogates: false,
        } => text.prop_map(|s| PlatformValue::utf16(&s)).boxed(),
        ScalarRepr::Utf16 {
            lone_surrogates: true,
        } => prop_oneof![
            text.prop_map(|s| PlatformValue::utf16(&s)),
            proptest::collection::vec(any::<u16>(), 0..=max_len).prop_map(PlatformValue::Utf16),
        ]
        .boxed(),
        ScalarRepr::Bool => any::<bool>().prop_map(PlatformValue::Bool).boxed(),
        ScalarRepr::Bytes => proptest::collection::vec(any::<u8>(), 0..=max_len)
            .prop_map(PlatformValue::Bytes)
            .boxed(),
    }
}

/// Random values of `repr`'s domain, with shrinking.
pub fn platform_strategy(repr: &Repr, config: &ProverConfig) -> BoxedStrategy<PlatformValue> {
    let len = 0..=config.max_collection_len;
    match repr {
        Repr::Scalar(s) => scalar_strategy(*s, config),
        Repr::List(e) => proptest::collection::vec(platform_strategy(e, config), len)
            .prop_map(PlatformValue::List)
            .boxed(),
        Repr::Set(e) => proptest::collection::vec(platform_strategy(e, config), len)
            .prop_map(|items| PlatformValue::Set(dedup(items)))
            .boxed(),
        Repr::Optional(e) => proptest::option::of(platform_strategy(e, config))
            .prop_map(|v| PlatformValue::Optional(v.map(Box::new)))
            .boxed(),
        Repr::Map { key, value } => proptest::collection::vec(
            (platform_strategy(key, config), platform_strategy(value, config)),
            len,
        )
        .prop_map(|entries| PlatformValue::Map(dedup_keys(entries)))
        .boxed(),
        Repr::Record(fields) => fields
            .iter()
            .map(|f| platform_strategy(f, config))
            .collect::<Vec<_>>()
            .prop_map(PlatformValue::Record)
            .boxed(),
        Repr::Variant(cases) => {
            let arms: Vec<BoxedStrategy<PlatformValue>> = (0u32..)
                .zip(cases)
                .map(|(case, payload)| match payload {
                    None => Just(PlatformValue::Variant {
                        case,
                        payload: None,
                    })
                    .boxed(),
                    Some(r) => platform_strategy(r, config)
                        .prop_map(move |v| PlatformValue::Variant {
                            case,
                            payload: Some(Box::new(v)),
                        })
                        .boxed(),
                })
                .collect();
            Union::new(arms).boxed()
        }
    }
}

fn natural_codec(ty: &IrType) -> (Repr, ReprCodec) {
    let repr = Repr::natural(ty);
    let codec = ReprCodec::new(repr.clone());
    (repr, codec)
}

/// Boundary values of `ty`'s IR domain, typical value first.
pub fn ir_corpus(ty: &IrType) -> Vec<IrValue> {
    let (repr, codec) = natural_codec(ty);
    platform_corpus(&repr).iter().map(|v| codec.to_ir(v)).collect()
}

/// Every IR value of `ty` if the domain is finite.
pub fn enumerate_ir(ty: &IrType) -> Option<Vec<IrValue>> {
    let (repr, codec) = natural_codec(ty);
    Some(enumerate_platform(&repr)?.iter().map(|v| codec.to_ir(v)).collect())
}

/// Number of IR values of `ty` if finite.
pub fn ir_cardinality(ty: &IrType) -> Option<u64> {
    Repr::natural(ty).finite_cardinality()
}

/// Random IR values of `ty`, with shrinking.
pub fn ir_strategy(ty: &IrType, config: &ProverConfig) -> BoxedStrategy<IrValue> {
    let (repr, codec) = natural_codec(ty);
    platform_strategy(&repr, config)
        .prop_map(move |v| codec.to_ir(&v))
        .boxed()
}
