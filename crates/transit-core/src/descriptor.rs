//! Platform descriptors and their conversion functions.
//!
//! A [`PlatformDescriptor`] is the realization of one IR type in one
//! language: the repr of each part, the memory layout that follows from it,
//! and a [`Codec`] converting values to and from the IR.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::error::Result;
use crate::ir::{IrType, PrimitiveKind};
use crate::layout::Layout;
use crate::repr::{Repr, ScalarRepr, MAX_SAFE_INTEGER};
use crate::types::LanguageTag;
use crate::validation::validate_ir_type;
use crate::value::{IrValue, PlatformValue};

/// Conversion functions between a platform's values and IR values.
///
/// Implementations must be total over the platform's value domain. A codec
/// that is not [`structural`](Codec::is_structural) is treated as opaque and
/// its laws are established by testing.
pub trait Codec: Send + Sync {
    /// Stable identifier, recorded in certificates.
    fn id(&self) -> &str;

    /// Lower a platform value to the IR.
    fn to_ir(&self, value: &PlatformValue) -> IrValue;

    /// Lift an IR value into the platform.
    fn from_ir(&self, value: &IrValue) -> PlatformValue;

    /// Whether the codec is the pure structural mapping of its repr.
    fn is_structural(&self) -> bool {
        false
    }
}

/// The structural codec of a repr: each scalar converts by its repr's rule
/// and every composite converts part by part.
///
/// Narrowing conversions wrap (fixed-width integers), round (binary32) or
/// clamp (safe integers), so `from_ir` is total.
#[derive(Debug, Clone)]
pub struct ReprCodec {
    id: String,
    repr: Repr,
}

impl ReprCodec {
    pub fn new(repr: Repr) -> Self {
        Self {
            id: format!("structural:{}", repr.encoding()),
            repr,
        }
    }
}

impl Codec for ReprCodec {
    fn id(&self) -> &str {
        &self.id
    }

    fn to_ir(&self, value: &PlatformValue) -> IrValue {
        lower(&self.repr, value)
    }

    fn from_ir(&self, value: &IrValue) -> PlatformValue {
        lift(&self.repr, value)
    }

    fn is_structural(&self) -> bool {
        true
    }
}

fn lower(repr: &Repr, value: &PlatformValue) -> IrValue {
    match (repr, value) {
        (Repr::Scalar(s), v) => match lower_scalar(*s, v) {
            Some(ir) => ir,
            None => shape_mismatch_ir(repr, value),
        },
        (Repr::List(e), PlatformValue::List(items)) => {
            IrValue::List(items.iter().map(|v| lower(e, v)).collect())
        }
        (Repr::Set(e), PlatformValue::Set(items)) => {
            IrValue::Set(items.iter().map(|v| lower(e, v)).collect())
        }
        (Repr::Optional(e), PlatformValue::Optional(v)) => {
            IrValue::Optional(v.as_deref().map(|v| Box::new(lower(e, v))))
        }
        (Repr::Map { key, value: val }, PlatformValue::Map(entries)) => IrValue::Map(
            entries
                .iter()
                .map(|(k, v)| (lower(key, k), lower(val, v)))
                .collect(),
        ),
        (Repr::Record(fields), PlatformValue::Record(values)) if fields.len() == values.len() => {
            IrValue::Record(fields.iter().zip(values).map(|(r, v)| lower(r, v)).collect())
        }
        (Repr::Variant(cases), PlatformValue::Variant { case, payload }) => {
            match (cases.get(*case as usize), payload) {
                (Some(None), None) => IrValue::Variant {
                    case: *case,
                    payload: None,
                },
                (Some(Some(r)), Some(p)) => IrValue::Variant {
                    case: *case,
                    payload: Some(Box::new(lower(r, p))),
                },
                _ => shape_mismatch_ir(repr, value),
            }
        }
        _ => shape_mismatch_ir(repr, value),
    }
}

fn lower_scalar(repr: ScalarRepr, value: &PlatformValue) -> Option<IrValue> {
    let ir = match (repr, value) {
        (ScalarRepr::Integer { .. }, PlatformValue::Integer(n)) => IrValue::Int64(*n as i64),
        (ScalarRepr::SafeInteger, PlatformValue::Float(x)) => IrValue::Int64(*x as i64),
        (ScalarRepr::Float { .. }, PlatformValue::Float(x)) => IrValue::Float64(*x),
        (ScalarRepr::Utf8, PlatformValue::Utf8(s)) => IrValue::String(s.clone()),
        (ScalarRepr::Utf16 { .. }, PlatformValue::Utf16(units)) => {
            IrValue::String(String::from_utf16_lossy(units))
        }
        (ScalarRepr::Bool, PlatformValue::Bool(b)) => IrValue::Bool(*b),
        (ScalarRepr::Bytes, PlatformValue::Bytes(b)) => IrValue::Bytes(b.clone()),
        _ => return None,
    };
    Some(ir)
}

fn lift(repr: &Repr, value: &IrValue) -> PlatformValue {
    match (repr, value) {
        (Repr::Scalar(s), v) => match lift_scalar(*s, v) {
            Some(p) => p,
            None => shape_mismatch_platform(repr, value),
        },
        (Repr::List(e), IrValue::List(items)) => {
            PlatformValue::List(items.iter().map(|v| lift(e, v)).collect())
        }
        (Repr::Set(e), IrValue::Set(items)) => {
            PlatformValue::Set(items.iter().map(|v| lift(e, v)).collect())
        }
        (Repr::Optional(e), IrValue::Optional(v)) => {
            PlatformValue::Optional(v.as_deref().map(|v| Box::new(lift(e, v))))
        }
        (Repr::Map { key, value: val }, IrValue::Map(entries)) => PlatformValue::Map(
            entries
                .iter()
                .map(|(k, v)| (lift(key, k), lift(val, v)))
                .collect(),
        ),
        (Repr::Record(fields), IrValue::Record(values)) if fields.len() == values.len() => {
            PlatformValue::Record(fields.iter().zip(values).map(|(r, v)| lift(r, v)).collect())
        }
        (Repr::Variant(cases), IrValue::Variant { case, payload }) => {
            match (cases.get(*case as usize), payload) {
                (Some(None), None) => PlatformValue::Variant {
                    case: *case,
                    payload: None,
                },
                (Some(Some(r)), Some(p)) => PlatformValue::Variant {
                    case: *case,
                    payload: Some(Box::new(lift(r, p))),
                },
                _ => shape_mismatch_platform(repr, value),
            }
        }
        _ => shape_mismatch_platform(repr, value),
    }
}

fn lift_scalar(repr: ScalarRepr, value: &IrValue) -> Option<PlatformValue> {
    let p = match (repr, value) {
        (ScalarRepr::Integer { bits, signed }, IrValue::Int64(n)) => {
            PlatformValue::Integer(wrap_integer(*n, bits, signed))
        }
        (ScalarRepr::SafeInteger, IrValue::Int64(n)) => {
            let limit = MAX_SAFE_INTEGER as f64;
            PlatformValue::Float((*n as f64).clamp(-limit, limit))
        }
        (ScalarRepr::Float { bits: 32 }, IrValue::Float64(x)) => {
            PlatformValue::Float(f64::from(*x as f32))
        }
        (ScalarRepr::Float { .. }, IrValue::Float64(x)) => PlatformValue::Float(*x),
        (ScalarRepr::Utf8, IrValue::String(s)) => PlatformValue::Utf8(s.clone()),
        (ScalarRepr::Utf16 { .. }, IrValue::String(s)) => {
            PlatformValue::Utf16(s.encode_utf16().collect())
        }
        (ScalarRepr::Bool, IrValue::Bool(b)) => PlatformValue::Bool(*b),
        (ScalarRepr::Bytes, IrValue::Bytes(b)) => PlatformValue::Bytes(b.clone()),
        _ => return None,
    };
    Some(p)
}

/// Two's-complement wrap of `n` into a `bits`-wide integer.
fn wrap_integer(n: i64, bits: u8, signed: bool) -> i128 {
    let n = i128::from(n);
    let bits = u32::from(bits.clamp(1, 64));
    let mask = (1i128 << bits) - 1;
    let low = n & mask;
    if signed && low >= (1i128 << (bits - 1)) {
        low - (1i128 << bits)
    } else {
        low
    }
}

fn shape_mismatch_ir(repr: &Repr, value: &PlatformValue) -> IrValue {
    tracing::warn!(repr = %repr, value = %value, "platform value does not match repr, lowering to zero");
    zero_ir(repr)
}

fn shape_mismatch_platform(repr: &Repr, value: &IrValue) -> PlatformValue {
    tracing::warn!(repr = %repr, value = %value, "IR value does not match repr, lifting to zero");
    lift(repr, &zero_ir(repr))
}

/// The zero value of a repr's IR type: `0`, `""`, `false`, empty
/// collections, `none`, and the first case of a variant.
pub fn zero_ir(repr: &Repr) -> IrValue {
    match repr {
        Repr::Scalar(s) => match s.primitive() {
            PrimitiveKind::Int64 => IrValue::Int64(0),
            PrimitiveKind::Float64 => IrValue::Float64(0.0),
            PrimitiveKind::String => IrValue::String(String::new()),
            PrimitiveKind::Bool => IrValue::Bool(false),
            PrimitiveKind::Bytes => IrValue::Bytes(Vec::new()),
        },
        Repr::List(_) => IrValue::List(Vec::new()),
        Repr::Set(_) => IrValue::Set(Vec::new()),
        Repr::Map { .. } => IrValue::Map(Vec::new()),
        Repr::Optional(_) => IrValue::Optional(None),
        Repr::Record(fields) => IrValue::Record(fields.iter().map(zero_ir).collect()),
        Repr::Variant(cases) => IrValue::Variant {
            case: 0,
            payload: cases
                .first()
                .and_then(Option::as_ref)
                .map(|r| Box::new(zero_ir(r))),
        },
    }
}

/// One IR type realized in one language.
#[derive(Clone)]
pub struct PlatformDescriptor {
    language: LanguageTag,
    type_name: String,
    ir: IrType,
    repr: Repr,
    layout: Layout,
    codec: Arc<dyn Codec>,
}

impl PlatformDescriptor {
    /// Build a descriptor with the structural codec of `repr`.
    ///
    /// Fails if `ir` is not well formed or `repr` does not mirror it.
    pub fn new(
        language: LanguageTag,
        type_name: impl Into<String>,
        ir: IrType,
        repr: Repr,
        abi_stable: bool,
    ) -> Result<Self> {
        validate_ir_type(&ir)?;
        repr.check_against(&ir)?;
        let layout = Layout::compute(&ir, &repr, abi_stable);
        let codec = Arc::new(ReprCodec::new(repr.clone()));
        Ok(Self {
            language,
            type_name: type_name.into(),
            ir,
            repr,
            layout,
            codec,
        })
    }

    /// Replace the codec. The descriptor is otherwise unchanged.
    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn language(&self) -> &LanguageTag {
        &self.language
    }

    /// The type's name as spelled in the source language.
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn ir(&self) -> &IrType {
        &self.ir
    }

    pub fn repr(&self) -> &Repr {
        &self.repr
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn codec(&self) -> &dyn Codec {
        self.codec.as_ref()
    }

    pub fn to_ir(&self, value: &PlatformValue) -> IrValue {
        self.codec.to_ir(value)
    }

    pub fn from_ir(&self, value: &IrValue) -> PlatformValue {
        self.codec.from_ir(value)
    }

    pub fn is_ffi_usable(&self) -> bool {
        self.layout.is_ffi_usable()
    }

    /// Serializable summary recorded in certificates.
    pub fn summary(&self) -> DescriptorSummary {
        DescriptorSummary {
            language: self.language.clone(),
            type_name: self.type_name.clone(),
            repr: self.repr.clone(),
            layout: self.layout.clone(),
            codec: self.codec.id().to_string(),
            structural: self.codec.is_structural(),
        }
    }
}

impl fmt::Debug for PlatformDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlatformDescriptor")
            .field("language", &self.language)
            .field("type_name", &self.type_name)
            .field("ir", &self.ir)
            .field("repr", &self.repr)
            .field("layout", &self.layout)
            .field("codec", &self.codec.id())
            .finish()
    }
}

impl PartialEq for PlatformDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.ir == other.ir && self.summary() == other.summary()
    }
}

impl Eq for PlatformDescriptor {}

/// The data of a descriptor without its conversion functions.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DescriptorSummary {
    pub language: LanguageTag,
    pub type_name: String,
    pub repr: Repr,
    pub layout: Layout,
    /// Codec id.
    pub codec: String,
    pub structural: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;

    fn user() -> IrType {
        IrType::record(
            "User",
            [
                ("id", IrType::int64()),
                ("name", IrType::string()),
                ("active", IrType::bool()),
            ],
        )
    }

    #[test]
    fn test_wrap_integer() {
        assert_eq!(wrap_integer(1 << 31, 32, true), -(1i128 << 31));
        assert_eq!(wrap_integer(-1, 32, true), -1);
        assert_eq!(wrap_integer(-1, 64, false), i128::from(u64::MAX));
        assert_eq!(wrap_integer(300, 8, false), 44);
        assert_eq!(wrap_integer(i64::MIN, 64, true), i128::from(i64::MIN));
    }

    #[test]
    fn test_structural_codec_roundtrip() {
        let ty = user();
        let descriptor =
            PlatformDescriptor::new("rust".into(), "User", ty.clone(), Repr::natural(&ty), true)
                .unwrap();
        let value = PlatformValue::Record(vec![
            PlatformValue::Integer(42),
            PlatformValue::utf8("ada"),
            PlatformValue::Bool(true),
        ]);
        let ir = descriptor.to_ir(&value);
        assert_eq!(
            ir,
            IrValue::Record(vec![
                IrValue::Int64(42),
                IrValue::string("ada"),
                IrValue::Bool(true)
            ])
        );
        assert_eq!(descriptor.from_ir(&ir), value);
        assert!(descriptor.codec().is_structural());
    }

    #[test]
    fn test_narrowing_lifts() {
        let i32_codec = ReprCodec::new(Repr::Scalar(ScalarRepr::I32));
        assert_eq!(
            i32_codec.from_ir(&IrValue::Int64(1 << 32)),
            PlatformValue::Integer(0)
        );

        let safe = ReprCodec::new(Repr::Scalar(ScalarRepr::SafeInteger));
        let lifted = safe.from_ir(&IrValue::Int64(i64::MAX));
        assert_eq!(lifted, PlatformValue::Float(MAX_SAFE_INTEGER as f64));
        assert!(ScalarRepr::SafeInteger.contains(&lifted));

        let f32_codec = ReprCodec::new(Repr::Scalar(ScalarRepr::Float { bits: 32 }));
        assert_eq!(
            f32_codec.from_ir(&IrValue::Float64(0.1)),
            PlatformValue::Float(f64::from(0.1f32))
        );
    }

    #[test]
    fn test_lone_surrogate_is_replaced() {
        let codec = ReprCodec::new(Repr::Scalar(ScalarRepr::Utf16 {
            lone_surrogates: true,
        }));
        let ir = codec.to_ir(&PlatformValue::Utf16(vec![0xd800]));
        assert_eq!(ir, IrValue::string("\u{fffd}"));
        assert_eq!(codec.from_ir(&ir), PlatformValue::Utf16(vec![0xfffd]));
    }

    #[test]
    fn test_mismatched_value_lowers_to_zero() {
        let codec = ReprCodec::new(Repr::Scalar(ScalarRepr::I64));
        assert_eq!(codec.to_ir(&PlatformValue::Bool(true)), IrValue::Int64(0));
    }

    #[test]
    fn test_new_rejects_mismatched_repr() {
        let ty = user();
        let result = PlatformDescriptor::new(
            "rust".into(),
            "User",
            ty,
            Repr::Record(vec![Repr::Scalar(ScalarRepr::I64)]),
            true,
        );
        assert!(matches!(result, Err(CoreError::ReprMismatch { .. })));
    }

    #[test]
    fn test_new_rejects_unsigned_64_bit() {
        let ty = IrType::record("A", [("id", IrType::int64())]);
        let repr = Repr::Record(vec![Repr::Scalar(ScalarRepr::Integer {
            bits: 64,
            signed: false,
        })]);
        let err = PlatformDescriptor::new("rust".into(), "A", ty, repr, true).unwrap_err();
        assert_eq!(
            err,
            CoreError::ReprMismatch {
                path: "A.id".into(),
                expected: "int64".into(),
                found: "u64".into(),
            }
        );
    }

    #[test]
    fn test_summary_records_codec() {
        let ty = user();
        let descriptor =
            PlatformDescriptor::new("rust".into(), "User", ty.clone(), Repr::natural(&ty), true)
                .unwrap();
        let summary = descriptor.summary();
        assert!(summary.structural);
        assert_eq!(summary.codec, "structural:struct{i64, utf8, bool8}");
        assert_eq!(summary.layout.size, 32);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn test_i32_lift_wraps_like_a_cast(n in any::<i64>()) {
                let codec = ReprCodec::new(Repr::Scalar(ScalarRepr::I32));
                let lifted = codec.from_ir(&IrValue::Int64(n));
                prop_assert_eq!(lifted, PlatformValue::Integer(i128::from(n as i32)));
            }

            #[test]
            fn test_i32_round_trips_in_range(n in any::<i32>()) {
                let codec = ReprCodec::new(Repr::Scalar(ScalarRepr::I32));
                let value = PlatformValue::Integer(i128::from(n));
                prop_assert_eq!(codec.from_ir(&codec.to_ir(&value)), value);
            }

            #[test]
            fn test_safe_integer_lift_clamps(n in any::<i64>()) {
                let codec = ReprCodec::new(Repr::Scalar(ScalarRepr::SafeInteger));
                let PlatformValue::Float(x) = codec.from_ir(&IrValue::Int64(n)) else {
                    panic!("safe integers lift to floats");
                };
                prop_assert!(x.abs() <= MAX_SAFE_INTEGER as f64);
            }
        }
    }
}
