//! Runtime values on both sides of a conversion.
//!
//! [`IrValue`] inhabits an [`IrType`](crate::ir::IrType); [`PlatformValue`]
//! is the same value as a particular platform stores it. Records are
//! positional (field order is the IR field order) and variants carry the case
//! index, so values never need to repeat names.
//!
//! Equality is structural. Floats compare by bit pattern: `NaN == NaN` when
//! the payloads match, and `0.0 != -0.0`. A round trip that flips the sign
//! of zero has lost information.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A value of an IR type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IrValue {
    Int64(i64),
    Float64(f64),
    String(String),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<IrValue>),
    Optional(Option<Box<IrValue>>),
    Set(Vec<IrValue>),
    Map(Vec<(IrValue, IrValue)>),
    Record(Vec<IrValue>),
    Variant {
        case: u32,
        payload: Option<Box<IrValue>>,
    },
}

/// A value as stored by a platform.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum PlatformValue {
    /// Any integer representation; the repr bounds the range.
    Integer(i128),
    /// Any floating representation, including doubles that hold integers.
    Float(f64),
    Utf8(String),
    /// UTF-16 code units, possibly containing lone surrogates.
    Utf16(Vec<u16>),
    Bool(bool),
    Bytes(Vec<u8>),
    List(Vec<PlatformValue>),
    Optional(Option<Box<PlatformValue>>),
    Set(Vec<PlatformValue>),
    Map(Vec<(PlatformValue, PlatformValue)>),
    Record(Vec<PlatformValue>),
    Variant {
        case: u32,
        payload: Option<Box<PlatformValue>>,
    },
}

impl PartialEq for IrValue {
    fn eq(&self, other: &Self) -> bool {
        use IrValue::*;
        match (self, other) {
            (Int64(a), Int64(b)) => a == b,
            (Float64(a), Float64(b)) => a.to_bits() == b.to_bits(),
            (String(a), String(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (List(a), List(b)) | (Set(a), Set(b)) | (Record(a), Record(b)) => a == b,
            (Optional(a), Optional(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (
                Variant {
                    case: ca,
                    payload: pa,
                },
                Variant {
                    case: cb,
                    payload: pb,
                },
            ) => ca == cb && pa == pb,
            _ => false,
        }
    }
}

impl Eq for IrValue {}

impl PartialEq for PlatformValue {
    fn eq(&self, other: &Self) -> bool {
        use PlatformValue::*;
        match (self, other) {
            (Integer(a), Integer(b)) => a == b,
            (Float(a), Float(b)) => a.to_bits() == b.to_bits(),
            (Utf8(a), Utf8(b)) => a == b,
            (Utf16(a), Utf16(b)) => a == b,
            (Bool(a), Bool(b)) => a == b,
            (Bytes(a), Bytes(b)) => a == b,
            (List(a), List(b)) | (Set(a), Set(b)) | (Record(a), Record(b)) => a == b,
            (Optional(a), Optional(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (
                Variant {
                    case: ca,
                    payload: pa,
                },
                Variant {
                    case: cb,
                    payload: pb,
                },
            ) => ca == cb && pa == pb,
            _ => false,
        }
    }
}

impl Eq for PlatformValue {}

impl IrValue {
    pub fn string(s: impl Into<String>) -> Self {
        Self::String(s.into())
    }

    pub fn some(value: IrValue) -> Self {
        Self::Optional(Some(Box::new(value)))
    }

    pub fn none() -> Self {
        Self::Optional(None)
    }
}

impl PlatformValue {
    pub fn utf8(s: impl Into<String>) -> Self {
        Self::Utf8(s.into())
    }

    pub fn utf16(s: &str) -> Self {
        Self::Utf16(s.encode_utf16().collect())
    }
}

impl fmt::Display for IrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int64(n) => write!(f, "{n}"),
            Self::Float64(x) => write!(f, "{x:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::List(items) => write_seq(f, "[", items, "]"),
            Self::Set(items) => write_seq(f, "#{", items, "}"),
            Self::Record(items) => write_seq(f, "{", items, "}"),
            Self::Optional(None) => f.write_str("none"),
            Self::Optional(Some(v)) => write!(f, "some({v})"),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
            Self::Variant { case, payload } => match payload {
                Some(p) => write!(f, "#{case}({p})"),
                None => write!(f, "#{case}"),
            },
        }
    }
}

impl fmt::Display for PlatformValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(n) => write!(f, "{n}"),
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Utf8(s) => write!(f, "{s:?}"),
            Self::Utf16(units) => match String::from_utf16(units) {
                Ok(s) => write!(f, "u16{s:?}"),
                Err(_) => write!(f, "u16{units:04x?}"),
            },
            Self::Bool(b) => write!(f, "{b}"),
            Self::Bytes(b) => write!(f, "0x{}", hex::encode(b)),
            Self::List(items) => write_seq(f, "[", items, "]"),
            Self::Set(items) => write_seq(f, "#{", items, "}"),
            Self::Record(items) => write_seq(f, "{", items, "}"),
            Self::Optional(None) => f.write_str("none"),
            Self::Optional(Some(v)) => write!(f, "some({v})"),
            Self::Map(entries) => {
                f.write_str("{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{k} => {v}")?;
                }
                f.write_str("}")
            }
            Self::Variant { case, payload } => match payload {
                Some(p) => write!(f, "#{case}({p})"),
                None => write!(f, "#{case}"),
            },
        }
    }
}

fn write_seq<T: fmt::Display>(
    f: &mut fmt::Formatter<'_>,
    open: &str,
    items: &[T],
    close: &str,
) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{item}")?;
    }
    f.write_str(close)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_equality_is_bitwise() {
        assert_eq!(IrValue::Float64(f64::NAN), IrValue::Float64(f64::NAN));
        assert_ne!(IrValue::Float64(0.0), IrValue::Float64(-0.0));
        assert_ne!(PlatformValue::Float(0.0), PlatformValue::Float(-0.0));
    }

    #[test]
    fn test_cross_variant_inequality() {
        assert_ne!(IrValue::List(vec![]), IrValue::Set(vec![]));
        assert_ne!(PlatformValue::Utf8("a".into()), PlatformValue::utf16("a"));
    }

    #[test]
    fn test_display() {
        let v = IrValue::Record(vec![
            IrValue::Int64(7),
            IrValue::string("ada"),
            IrValue::none(),
        ]);
        assert_eq!(v.to_string(), "{7, \"ada\", none}");
        assert_eq!(PlatformValue::Utf16(vec![0xd800]).to_string(), "u16[d800]");
    }
}
