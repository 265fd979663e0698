//! Canonical CBOR encoding of certificate inputs.
//!
//! This module implements RFC 8949 Core Deterministic Encoding:
//! - Map keys sorted by encoded byte comparison
//! - Integers use smallest valid encoding
//! - Definite lengths only
//! - No floats (nothing hashed here carries one)
//!
//! The encoding is what certificate ids are computed from, so the same IR
//! type, descriptors and validator must produce identical bytes everywhere.

use ciborium::value::Value;

use crate::descriptor::DescriptorSummary;
use crate::error::{CoreError, Result};
use crate::ir::{ContainerShape, IrType};
use crate::layout::Layout;
use crate::repr::Repr;

/// Version of the input encoding. Bumping it changes every certificate id.
pub const ENCODING_VERSION: u64 = 1;

/// Top-level input keys (integer keys for compact encoding).
///
/// Keys 0-23 encode as single bytes in CBOR.
mod keys {
    pub const VERSION: u64 = 0;
    pub const IR: u64 = 1;
    pub const LEFT: u64 = 2;
    pub const RIGHT: u64 = 3;
    pub const VALIDATOR: u64 = 4;

    pub const LANGUAGE: u64 = 0;
    pub const TYPE_NAME: u64 = 1;
    pub const REPR: u64 = 2;
    pub const LAYOUT: u64 = 3;
    pub const CODEC: u64 = 4;
    pub const STRUCTURAL: u64 = 5;

    pub const SIZE: u64 = 0;
    pub const ALIGN: u64 = 1;
    pub const ABI_STABLE: u64 = 2;
    pub const FIELDS: u64 = 3;
}

/// Tags for IR and repr nodes.
mod tags {
    pub const PRIMITIVE: u64 = 0;
    pub const LIST: u64 = 1;
    pub const OPTIONAL: u64 = 2;
    pub const SET: u64 = 3;
    pub const MAP: u64 = 4;
    pub const RECORD: u64 = 5;
    pub const VARIANT: u64 = 6;
}

/// Encode the inputs a certificate is derived from.
pub fn certificate_input_bytes(
    ir: &IrType,
    left: &DescriptorSummary,
    right: &DescriptorSummary,
    validator_id: &str,
) -> Result<Vec<u8>> {
    let value = Value::Map(vec![
        (uint(keys::VERSION), uint(ENCODING_VERSION)),
        (uint(keys::IR), ir_type_value(ir)),
        (uint(keys::LEFT), summary_value(left)),
        (uint(keys::RIGHT), summary_value(right)),
        (uint(keys::VALIDATOR), Value::Text(validator_id.to_string())),
    ]);
    encode_canonical(&value)
}

/// Encode an IR type alone.
pub fn ir_type_bytes(ir: &IrType) -> Result<Vec<u8>> {
    encode_canonical(&ir_type_value(ir))
}

fn uint(n: u64) -> Value {
    Value::Integer(n.into())
}

fn tagged(tag: u64, rest: impl IntoIterator<Item = Value>) -> Value {
    let mut items = vec![uint(tag)];
    items.extend(rest);
    Value::Array(items)
}

/// Convert an IR type to a CBOR value: `[tag, ...]` arrays.
fn ir_type_value(ty: &IrType) -> Value {
    match ty {
        IrType::Primitive(kind) => tagged(tags::PRIMITIVE, [uint(u64::from(kind.to_u8()))]),
        IrType::Container { shape, element } => match shape {
            ContainerShape::List => tagged(tags::LIST, [ir_type_value(element)]),
            ContainerShape::Optional => tagged(tags::OPTIONAL, [ir_type_value(element)]),
            ContainerShape::Set => tagged(tags::SET, [ir_type_value(element)]),
            ContainerShape::Map(key) => {
                tagged(tags::MAP, [ir_type_value(key), ir_type_value(element)])
            }
        },
        IrType::Record { name, fields } => tagged(
            tags::RECORD,
            [
                Value::Text(name.clone()),
                Value::Array(
                    fields
                        .iter()
                        .map(|f| Value::Array(vec![Value::Text(f.name.clone()), ir_type_value(&f.ty)]))
                        .collect(),
                ),
            ],
        ),
        IrType::Variant { name, cases } => tagged(
            tags::VARIANT,
            [
                Value::Text(name.clone()),
                Value::Array(
                    cases
                        .iter()
                        .map(|c| {
                            Value::Array(vec![
                                Value::Text(c.name.clone()),
                                c.payload.as_ref().map_or(Value::Null, ir_type_value),
                            ])
                        })
                        .collect(),
                ),
            ],
        ),
    }
}

fn repr_value(repr: &Repr) -> Value {
    match repr {
        Repr::Scalar(s) => tagged(tags::PRIMITIVE, [uint(u64::from(s.to_u16()))]),
        Repr::List(e) => tagged(tags::LIST, [repr_value(e)]),
        Repr::Optional(e) => tagged(tags::OPTIONAL, [repr_value(e)]),
        Repr::Set(e) => tagged(tags::SET, [repr_value(e)]),
        Repr::Map { key, value } => tagged(tags::MAP, [repr_value(key), repr_value(value)]),
        Repr::Record(fields) => tagged(
            tags::RECORD,
            [Value::Array(fields.iter().map(repr_value).collect())],
        ),
        Repr::Variant(cases) => tagged(
            tags::VARIANT,
            [Value::Array(
                cases
                    .iter()
                    .map(|c| c.as_ref().map_or(Value::Null, repr_value))
                    .collect(),
            )],
        ),
    }
}

fn layout_value(layout: &Layout) -> Value {
    let fields = layout
        .fields
        .iter()
        .map(|f| {
            Value::Array(vec![
                Value::Text(f.name.clone()),
                uint(f.offset),
                uint(f.size),
                uint(f.align),
                Value::Text(f.encoding.clone()),
            ])
        })
        .collect();
    Value::Map(vec![
        (uint(keys::SIZE), uint(layout.size)),
        (uint(keys::ALIGN), uint(layout.align)),
        (uint(keys::ABI_STABLE), Value::Bool(layout.abi_stable)),
        (uint(keys::FIELDS), Value::Array(fields)),
    ])
}

fn summary_value(summary: &DescriptorSummary) -> Value {
    Value::Map(vec![
        (uint(keys::LANGUAGE), Value::Text(summary.language.as_str().to_string())),
        (uint(keys::TYPE_NAME), Value::Text(summary.type_name.clone())),
        (uint(keys::REPR), repr_value(&summary.repr)),
        (uint(keys::LAYOUT), layout_value(&summary.layout)),
        (uint(keys::CODEC), Value::Text(summary.codec.clone())),
        (uint(keys::STRUCTURAL), Value::Bool(summary.structural)),
    ])
}

/// Encode a CBOR value to canonical bytes.
pub fn encode_canonical(value: &Value) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_value_to(&mut buf, value)?;
    Ok(buf)
}

fn encode_value_to(buf: &mut Vec<u8>, value: &Value) -> Result<()> {
    match value {
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Bytes(b) => {
            encode_uint(buf, 2, b.len() as u64);
            buf.extend_from_slice(b);
        }
        Value::Text(s) => {
            encode_uint(buf, 3, s.len() as u64);
            buf.extend_from_slice(s.as_bytes());
        }
        Value::Array(arr) => {
            encode_uint(buf, 4, arr.len() as u64);
            for item in arr {
                encode_value_to(buf, item)?;
            }
        }
        Value::Map(entries) => encode_map_canonical(buf, entries)?,
        Value::Bool(b) => buf.push(if *b { 0xf5 } else { 0xf4 }),
        Value::Null => buf.push(0xf6),
        Value::Float(_) => {
            return Err(CoreError::EncodingError(
                "floats not supported in canonical encoding".into(),
            ))
        }
        _ => {
            return Err(CoreError::EncodingError(
                "unsupported CBOR value type".into(),
            ))
        }
    }
    Ok(())
}

/// Encode a CBOR integer (major types 0 and 1).
fn encode_integer(buf: &mut Vec<u8>, i: ciborium::value::Integer) {
    let n = i128::from(i);
    if n >= 0 {
        encode_uint(buf, 0, n as u64);
    } else {
        // CBOR encodes -1 as 0, -2 as 1, etc.
        encode_uint(buf, 1, (-1 - n) as u64);
    }
}

/// Encode an unsigned integer with the given major type.
fn encode_uint(buf: &mut Vec<u8>, major: u8, n: u64) {
    let mt = major << 5;
    if n < 24 {
        buf.push(mt | (n as u8));
    } else if n <= 0xff {
        buf.push(mt | 24);
        buf.push(n as u8);
    } else if n <= 0xffff {
        buf.push(mt | 25);
        buf.extend_from_slice(&(n as u16).to_be_bytes());
    } else if n <= 0xffff_ffff {
        buf.push(mt | 26);
        buf.extend_from_slice(&(n as u32).to_be_bytes());
    } else {
        buf.push(mt | 27);
        buf.extend_from_slice(&n.to_be_bytes());
    }
}

/// Encode a map (major type 5) with keys sorted by their encoded bytes.
fn encode_map_canonical(buf: &mut Vec<u8>, entries: &[(Value, Value)]) -> Result<()> {
    let mut pairs = Vec::with_capacity(entries.len());
    for (k, v) in entries {
        let mut key_buf = Vec::new();
        encode_value_to(&mut key_buf, k)?;
        pairs.push((key_buf, v));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    if pairs.windows(2).any(|w| w[0].0 == w[1].0) {
        return Err(CoreError::EncodingError("duplicate map key".into()));
    }

    encode_uint(buf, 5, pairs.len() as u64);
    for (key_bytes, value) in pairs {
        buf.extend_from_slice(&key_bytes);
        encode_value_to(buf, value)?;
    }
    Ok(())
}
