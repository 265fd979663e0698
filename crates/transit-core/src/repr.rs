//! Platform representations.
//!
//! A [`Repr`] mirrors an [`IrType`] and states how a particular platform
//! stores each part of it. Sizes and alignments describe the C-ABI view on a
//! 64-bit target: strings, byte strings and collections are `(pointer, len)`
//! pairs.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;
use crate::ir::{ContainerShape, IrType, PrimitiveKind};
use crate::value::PlatformValue;

/// Largest integer magnitude an IEEE-754 double holds exactly (2^53).
pub const MAX_SAFE_INTEGER: i64 = 1 << 53;

/// Size of a `(pointer, len)` pair.
pub const SLICE_SIZE: u64 = 16;

/// How a platform stores a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarRepr {
    /// Two's-complement (or unsigned) integer of the given width.
    Integer { bits: u8, signed: bool },
    /// A double restricted to integers with `|v| <= 2^53`.
    SafeInteger,
    /// IEEE-754 binary32 or binary64.
    Float { bits: u8 },
    Utf8,
    /// UTF-16 code units. With `lone_surrogates` the domain includes
    /// ill-formed strings, as JavaScript strings do.
    Utf16 { lone_surrogates: bool },
    Bool,
    Bytes,
}

impl ScalarRepr {
    pub const I32: Self = Self::Integer {
        bits: 32,
        signed: true,
    };
    pub const I64: Self = Self::Integer {
        bits: 64,
        signed: true,
    };
    pub const F64: Self = Self::Float { bits: 64 };

    /// The IR primitive this repr realizes.
    pub fn primitive(self) -> PrimitiveKind {
        match self {
            Self::Integer { .. } | Self::SafeInteger => PrimitiveKind::Int64,
            Self::Float { .. } => PrimitiveKind::Float64,
            Self::Utf8 | Self::Utf16 { .. } => PrimitiveKind::String,
            Self::Bool => PrimitiveKind::Bool,
            Self::Bytes => PrimitiveKind::Bytes,
        }
    }

    /// Whether every value in the domain has an IR counterpart. `Int64`
    /// cannot hold unsigned values above `i64::MAX`.
    pub fn fits_ir(self) -> bool {
        match self {
            Self::Integer { bits, signed } => bits < 64 || (bits == 64 && signed),
            _ => true,
        }
    }

    /// Storage size in bytes.
    pub fn size(self) -> u64 {
        match self {
            Self::Integer { bits, .. } | Self::Float { bits } => u64::from(bits / 8),
            Self::SafeInteger => 8,
            Self::Utf8 | Self::Utf16 { .. } | Self::Bytes => SLICE_SIZE,
            Self::Bool => 1,
        }
    }

    pub fn align(self) -> u64 {
        match self {
            Self::Utf8 | Self::Utf16 { .. } | Self::Bytes => 8,
            _ => self.size(),
        }
    }

    /// Whether lowering to the IR is injective over this repr's domain,
    /// i.e. `from_ir(to_ir(v)) == v` for every platform value `v`.
    pub fn lowering_is_injective(self) -> bool {
        !matches!(
            self,
            Self::Utf16 {
                lone_surrogates: true
            }
        )
    }

    /// Whether lifting from the IR is injective over the IR primitive's
    /// domain, i.e. `to_ir(from_ir(v)) == v` for every IR value `v`.
    pub fn lifting_is_injective(self) -> bool {
        matches!(
            self,
            Self::Integer { bits: 64, .. }
                | Self::Float { bits: 64 }
                | Self::Utf8
                | Self::Utf16 { .. }
                | Self::Bool
                | Self::Bytes
        )
    }

    /// Inclusive integer range of an integral repr.
    pub fn integer_range(self) -> Option<(i128, i128)> {
        match self {
            Self::Integer { bits, signed: true } => {
                let half = 1i128 << (bits - 1);
                Some((-half, half - 1))
            }
            Self::Integer {
                bits,
                signed: false,
            } => Some((0, (1i128 << bits) - 1)),
            Self::SafeInteger => Some((
                -i128::from(MAX_SAFE_INTEGER),
                i128::from(MAX_SAFE_INTEGER),
            )),
            _ => None,
        }
    }

    /// Whether `value` lies in this repr's domain.
    pub fn contains(self, value: &PlatformValue) -> bool {
        match (self, value) {
            (Self::Integer { .. }, PlatformValue::Integer(n)) => match self.integer_range() {
                Some((lo, hi)) => (lo..=hi).contains(n),
                None => false,
            },
            // Integers have no negative zero.
            (Self::SafeInteger, PlatformValue::Float(x)) => {
                x.fract() == 0.0
                    && x.abs() <= MAX_SAFE_INTEGER as f64
                    && x.to_bits() != (-0.0f64).to_bits()
            }
            (Self::Float { bits: 32 }, PlatformValue::Float(x)) => {
                f64::from(*x as f32).to_bits() == x.to_bits()
            }
            (Self::Float { .. }, PlatformValue::Float(_)) => true,
            (Self::Utf8, PlatformValue::Utf8(_)) => true,
            (Self::Utf16 { lone_surrogates }, PlatformValue::Utf16(units)) => {
                lone_surrogates || String::from_utf16(units).is_ok()
            }
            (Self::Bool, PlatformValue::Bool(_)) => true,
            (Self::Bytes, PlatformValue::Bytes(_)) => true,
            _ => false,
        }
    }

    /// Short encoding label, e.g. `i64`, `u32`, `f64-safe-int`, `utf16`.
    pub fn encoding(self) -> String {
        match self {
            Self::Integer { bits, signed } => format!("{}{bits}", if signed { 'i' } else { 'u' }),
            Self::SafeInteger => "f64-safe-int".to_string(),
            Self::Float { bits } => format!("f{bits}"),
            Self::Utf8 => "utf8".to_string(),
            Self::Utf16 {
                lone_surrogates: false,
            } => "utf16".to_string(),
            Self::Utf16 {
                lone_surrogates: true,
            } => "utf16-wtf".to_string(),
            Self::Bool => "bool8".to_string(),
            Self::Bytes => "bytes".to_string(),
        }
    }

    /// Stable numeric tag used by the canonical encoding.
    pub fn to_u16(self) -> u16 {
        match self {
            Self::Integer { bits, signed } => u16::from(bits) | if signed { 0x100 } else { 0 },
            Self::SafeInteger => 0x200,
            Self::Float { bits } => 0x300 | u16::from(bits),
            Self::Utf8 => 0x400,
            Self::Utf16 {
                lone_surrogates: false,
            } => 0x500,
            Self::Utf16 {
                lone_surrogates: true,
            } => 0x501,
            Self::Bool => 0x600,
            Self::Bytes => 0x700,
        }
    }
}

/// A platform representation tree mirroring an IR type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Repr {
    Scalar(ScalarRepr),
    List(Box<Repr>),
    Optional(Box<Repr>),
    Set(Box<Repr>),
    Map { key: Box<Repr>, value: Box<Repr> },
    /// One repr per field, in IR field order.
    Record(Vec<Repr>),
    /// One entry per case, in IR case order.
    Variant(Vec<Option<Repr>>),
}

impl Repr {
    /// The natural 64-bit repr of an IR type: i64, f64, UTF-8, bool8.
    pub fn natural(ty: &IrType) -> Self {
        Self::from_ir_with(ty, &mut |kind| match kind {
            PrimitiveKind::Int64 => ScalarRepr::I64,
            PrimitiveKind::Float64 => ScalarRepr::F64,
            PrimitiveKind::String => ScalarRepr::Utf8,
            PrimitiveKind::Bool => ScalarRepr::Bool,
            PrimitiveKind::Bytes => ScalarRepr::Bytes,
        })
    }

    /// Build a repr for `ty`, choosing each scalar with `scalar`.
    pub fn from_ir_with(ty: &IrType, scalar: &mut dyn FnMut(PrimitiveKind) -> ScalarRepr) -> Self {
        match ty {
            IrType::Primitive(kind) => Self::Scalar(scalar(*kind)),
            IrType::Container { shape, element } => {
                let element = Box::new(Self::from_ir_with(element, scalar));
                match shape {
                    ContainerShape::List => Self::List(element),
                    ContainerShape::Optional => Self::Optional(element),
                    ContainerShape::Set => Self::Set(element),
                    ContainerShape::Map(key) => Self::Map {
                        key: Box::new(Self::from_ir_with(key, scalar)),
                        value: element,
                    },
                }
            }
            IrType::Record { fields, .. } => Self::Record(
                fields
                    .iter()
                    .map(|f| Self::from_ir_with(&f.ty, scalar))
                    .collect(),
            ),
            IrType::Variant { cases, .. } => Self::Variant(
                cases
                    .iter()
                    .map(|c| c.payload.as_ref().map(|p| Self::from_ir_with(p, scalar)))
                    .collect(),
            ),
        }
    }

    /// Check that this repr has the same shape as `ty` and that every
    /// scalar realizes the declared primitive.
    pub fn check_against(&self, ty: &IrType) -> Result<(), CoreError> {
        check_at(ty.name().unwrap_or("$"), self, ty)
    }

    /// Visit every scalar in the tree.
    pub fn scalars(&self) -> Vec<ScalarRepr> {
        let mut out = Vec::new();
        self.collect_scalars(&mut out);
        out
    }

    fn collect_scalars(&self, out: &mut Vec<ScalarRepr>) {
        match self {
            Self::Scalar(s) => out.push(*s),
            Self::List(e) | Self::Optional(e) | Self::Set(e) => e.collect_scalars(out),
            Self::Map { key, value } => {
                key.collect_scalars(out);
                value.collect_scalars(out);
            }
            Self::Record(fields) => fields.iter().for_each(|f| f.collect_scalars(out)),
            Self::Variant(cases) => cases.iter().flatten().for_each(|c| c.collect_scalars(out)),
        }
    }

    pub fn lowering_is_injective(&self) -> bool {
        self.scalars().into_iter().all(ScalarRepr::lowering_is_injective)
    }

    pub fn lifting_is_injective(&self) -> bool {
        self.scalars().into_iter().all(ScalarRepr::lifting_is_injective)
    }

    /// Number of distinct values if the domain is finite, e.g. a bool or a
    /// payload-free variant. Collections are always treated as infinite.
    pub fn finite_cardinality(&self) -> Option<u64> {
        match self {
            Self::Scalar(ScalarRepr::Bool) => Some(2),
            Self::Scalar(ScalarRepr::Integer { bits: 8, .. }) => Some(256),
            Self::Scalar(ScalarRepr::Integer { bits: 16, .. }) => Some(65_536),
            Self::Scalar(_) => None,
            Self::Optional(inner) => inner.finite_cardinality()?.checked_add(1),
            Self::List(_) | Self::Set(_) | Self::Map { .. } => None,
            Self::Record(fields) => fields
                .iter()
                .try_fold(1u64, |acc, f| acc.checked_mul(f.finite_cardinality()?)),
            Self::Variant(cases) => cases.iter().try_fold(0u64, |acc, c| {
                let n = match c {
                    Some(payload) => payload.finite_cardinality()?,
                    None => 1,
                };
                acc.checked_add(n)
            }),
        }
    }

    /// Whether `value` lies in this repr's domain.
    pub fn contains(&self, value: &PlatformValue) -> bool {
        match (self, value) {
            (Self::Scalar(s), v) => s.contains(v),
            (Self::List(e), PlatformValue::List(items)) | (Self::Set(e), PlatformValue::Set(items)) => {
                items.iter().all(|v| e.contains(v))
            }
            (Self::Optional(e), PlatformValue::Optional(v)) => {
                v.as_deref().map_or(true, |v| e.contains(v))
            }
            (Self::Map { key, value: val }, PlatformValue::Map(entries)) => entries
                .iter()
                .all(|(k, v)| key.contains(k) && val.contains(v)),
            (Self::Record(fields), PlatformValue::Record(values)) => {
                fields.len() == values.len()
                    && fields.iter().zip(values).all(|(r, v)| r.contains(v))
            }
            (Self::Variant(cases), PlatformValue::Variant { case, payload }) => {
                match (cases.get(*case as usize), payload) {
                    (Some(None), None) => true,
                    (Some(Some(r)), Some(p)) => r.contains(p),
                    _ => false,
                }
            }
            _ => false,
        }
    }

    /// Encoding label of the whole tree, e.g. `list<utf16>`.
    pub fn encoding(&self) -> String {
        match self {
            Self::Scalar(s) => s.encoding(),
            Self::List(e) => format!("list<{}>", e.encoding()),
            Self::Optional(e) => format!("option<{}>", e.encoding()),
            Self::Set(e) => format!("set<{}>", e.encoding()),
            Self::Map { key, value } => format!("map<{}, {}>", key.encoding(), value.encoding()),
            Self::Record(fields) => {
                let inner: Vec<String> = fields.iter().map(Repr::encoding).collect();
                format!("struct{{{}}}", inner.join(", "))
            }
            Self::Variant(cases) => {
                let inner: Vec<String> = cases
                    .iter()
                    .map(|c| c.as_ref().map_or_else(|| "-".to_string(), Repr::encoding))
                    .collect();
                format!("union{{{}}}", inner.join(" | "))
            }
        }
    }
}

fn check_at(path: &str, repr: &Repr, ty: &IrType) -> Result<(), CoreError> {
    let mismatch = || CoreError::ReprMismatch {
        path: path.to_string(),
        expected: ty.to_string(),
        found: repr.encoding(),
    };
    match (repr, ty) {
        (Repr::Scalar(s), IrType::Primitive(kind)) => {
            if s.primitive() == *kind && s.fits_ir() {
                Ok(())
            } else {
                Err(mismatch())
            }
        }
        (Repr::List(e), IrType::Container { shape: ContainerShape::List, element })
        | (Repr::Optional(e), IrType::Container { shape: ContainerShape::Optional, element })
        | (Repr::Set(e), IrType::Container { shape: ContainerShape::Set, element }) => {
            check_at(&format!("{path}[]"), e, element)
        }
        (
            Repr::Map { key, value },
            IrType::Container {
                shape: ContainerShape::Map(key_ty),
                element,
            },
        ) => {
            check_at(&format!("{path}[key]"), key, key_ty)?;
            check_at(&format!("{path}[]"), value, element)
        }
        (Repr::Record(reprs), IrType::Record { fields, .. }) => {
            if reprs.len() != fields.len() {
                return Err(mismatch());
            }
            for (r, f) in reprs.iter().zip(fields) {
                check_at(&format!("{path}.{}", f.name), r, &f.ty)?;
            }
            Ok(())
        }
        (Repr::Variant(reprs), IrType::Variant { cases, .. }) => {
            if reprs.len() != cases.len() {
                return Err(mismatch());
            }
            for (r, c) in reprs.iter().zip(cases) {
                let case_path = format!("{path}::{}", c.name);
                match (r, &c.payload) {
                    (None, None) => {}
                    (Some(r), Some(p)) => check_at(&case_path, r, p)?,
                    _ => {
                        return Err(CoreError::ReprMismatch {
                            path: case_path,
                            expected: c
                                .payload
                                .as_ref()
                                .map_or_else(|| "no payload".to_string(), IrType::to_string),
                            found: r
                                .as_ref()
                                .map_or_else(|| "no payload".to_string(), Repr::encoding),
                        })
                    }
                }
            }
            Ok(())
        }
        _ => Err(mismatch()),
    }
}

impl fmt::Display for ScalarRepr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding())
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.encoding())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integer_ranges() {
        assert_eq!(
            ScalarRepr::I32.integer_range(),
            Some((i128::from(i32::MIN), i128::from(i32::MAX)))
        );
        assert_eq!(
            ScalarRepr::Integer {
                bits: 64,
                signed: false
            }
            .integer_range(),
            Some((0, i128::from(u64::MAX)))
        );
        assert_eq!(
            ScalarRepr::SafeInteger.integer_range(),
            Some((-(1i128 << 53), 1i128 << 53))
        );
    }

    #[test]
    fn test_domain_membership() {
        assert!(ScalarRepr::I32.contains(&PlatformValue::Integer(-5)));
        assert!(!ScalarRepr::I32.contains(&PlatformValue::Integer(1 << 40)));
        assert!(ScalarRepr::SafeInteger.contains(&PlatformValue::Float(9_007_199_254_740_992.0)));
        assert!(!ScalarRepr::SafeInteger.contains(&PlatformValue::Float(0.5)));
        assert!(!ScalarRepr::Utf16 {
            lone_surrogates: false
        }
        .contains(&PlatformValue::Utf16(vec![0xd800])));
        assert!(ScalarRepr::Utf16 {
            lone_surrogates: true
        }
        .contains(&PlatformValue::Utf16(vec![0xd800])));
        assert!(ScalarRepr::Float { bits: 32 }.contains(&PlatformValue::Float(0.5)));
        assert!(!ScalarRepr::Float { bits: 32 }.contains(&PlatformValue::Float(0.1)));
    }

    #[test]
    fn test_check_against() {
        let ty = IrType::record("P", [("x", IrType::int64()), ("tags", IrType::list(IrType::string()))]);
        let ok = Repr::Record(vec![
            Repr::Scalar(ScalarRepr::I32),
            Repr::List(Box::new(Repr::Scalar(ScalarRepr::Utf16 {
                lone_surrogates: false,
            }))),
        ]);
        assert!(ok.check_against(&ty).is_ok());

        let bad = Repr::Record(vec![
            Repr::Scalar(ScalarRepr::F64),
            Repr::List(Box::new(Repr::Scalar(ScalarRepr::Utf8))),
        ]);
        let err = bad.check_against(&ty).unwrap_err();
        assert!(matches!(err, CoreError::ReprMismatch { ref path, .. } if path == "P.x"));
    }

    #[test]
    fn test_natural_repr_is_injective_both_ways() {
        let ty = IrType::record("T", [("a", IrType::int64()), ("b", IrType::optional(IrType::float64()))]);
        let repr = Repr::natural(&ty);
        assert!(repr.lowering_is_injective());
        assert!(repr.lifting_is_injective());
        assert!(repr.check_against(&ty).is_ok());
    }

    #[test]
    fn test_finite_cardinality() {
        let flag = Repr::Scalar(ScalarRepr::Bool);
        assert_eq!(flag.finite_cardinality(), Some(2));
        assert_eq!(Repr::Optional(Box::new(flag.clone())).finite_cardinality(), Some(3));
        assert_eq!(
            Repr::Record(vec![flag.clone(), flag.clone()]).finite_cardinality(),
            Some(4)
        );
        assert_eq!(
            Repr::Variant(vec![None, Some(flag), None]).finite_cardinality(),
            Some(4)
        );
        assert_eq!(Repr::Scalar(ScalarRepr::I64).finite_cardinality(), None);
    }

    #[test]
    fn test_encoding_labels() {
        let repr = Repr::Map {
            key: Box::new(Repr::Scalar(ScalarRepr::Utf8)),
            value: Box::new(Repr::Scalar(ScalarRepr::SafeInteger)),
        };
        assert_eq!(repr.encoding(), "map<utf8, f64-safe-int>");
    }
}
