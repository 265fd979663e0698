//! Memory layout of a platform representation.
//!
//! Layouts follow C rules on a 64-bit target:
//! - Records place fields in declaration order, each at the next offset
//!   aligned to the field's alignment; the size is rounded up to the
//!   record's alignment (the largest field alignment).
//! - Optionals are a one-byte tag followed by the aligned payload.
//! - Variants are a four-byte tag followed by the aligned union of payloads.
//! - Strings, byte strings and collections are `(pointer, len)` pairs.

use serde::{Deserialize, Serialize};

use crate::ir::IrType;
use crate::repr::{Repr, SLICE_SIZE};

/// Size of a variant discriminant.
pub const VARIANT_TAG_SIZE: u64 = 4;

/// Layout of one top-level field (or variant case).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FieldLayout {
    pub name: String,
    pub offset: u64,
    pub size: u64,
    pub align: u64,
    /// Encoding label of the field's repr, e.g. `i64` or `list<utf16>`.
    pub encoding: String,
}

/// Layout of a whole type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Layout {
    pub size: u64,
    pub align: u64,
    /// Whether the source language guarantees this layout (e.g. `#[repr(C)]`).
    pub abi_stable: bool,
    /// Mirrors the record's fields; a variant lists its cases and any other
    /// type has a single entry named `value`.
    pub fields: Vec<FieldLayout>,
}

impl Layout {
    /// Compute the layout of `repr`, which must already match `ty`.
    pub fn compute(ty: &IrType, repr: &Repr, abi_stable: bool) -> Self {
        let (size, align) = size_align(repr);
        let fields = match (ty, repr) {
            (IrType::Record { fields, .. }, Repr::Record(reprs)) => {
                let mut offset = 0;
                fields
                    .iter()
                    .zip(reprs)
                    .map(|(field, r)| {
                        let (fsize, falign) = size_align(r);
                        offset = align_up(offset, falign);
                        let entry = FieldLayout {
                            name: field.name.clone(),
                            offset,
                            size: fsize,
                            align: falign,
                            encoding: r.encoding(),
                        };
                        offset += fsize;
                        entry
                    })
                    .collect()
            }
            (IrType::Variant { cases, .. }, Repr::Variant(reprs)) => {
                let payload_align = reprs
                    .iter()
                    .flatten()
                    .map(|r| size_align(r).1)
                    .max()
                    .unwrap_or(1);
                let payload_offset = align_up(VARIANT_TAG_SIZE, payload_align);
                cases
                    .iter()
                    .zip(reprs)
                    .map(|(case, r)| {
                        let (csize, calign) = r.as_ref().map_or((0, 1), size_align);
                        FieldLayout {
                            name: case.name.clone(),
                            offset: payload_offset,
                            size: csize,
                            align: calign,
                            encoding: r
                                .as_ref()
                                .map_or_else(|| "unit".to_string(), Repr::encoding),
                        }
                    })
                    .collect()
            }
            _ => vec![FieldLayout {
                name: "value".to_string(),
                offset: 0,
                size,
                align,
                encoding: repr.encoding(),
            }],
        };

        Self {
            size,
            align,
            abi_stable,
            fields,
        }
    }

    /// Usable for raw memory interop: stable, and size a multiple of alignment.
    pub fn is_ffi_usable(&self) -> bool {
        self.abi_stable && self.align > 0 && self.size % self.align == 0
    }
}

/// Size and alignment of a repr.
pub fn size_align(repr: &Repr) -> (u64, u64) {
    match repr {
        Repr::Scalar(s) => (s.size(), s.align()),
        Repr::List(_) | Repr::Set(_) | Repr::Map { .. } => (SLICE_SIZE, 8),
        Repr::Optional(inner) => {
            let (isize, ialign) = size_align(inner);
            let offset = align_up(1, ialign);
            (align_up(offset + isize, ialign), ialign)
        }
        Repr::Record(fields) => {
            let mut offset = 0;
            let mut align = 1;
            for field in fields {
                let (fsize, falign) = size_align(field);
                offset = align_up(offset, falign) + fsize;
                align = align.max(falign);
            }
            (align_up(offset, align), align)
        }
        Repr::Variant(cases) => {
            let (max_size, max_align) = cases
                .iter()
                .flatten()
                .map(size_align)
                .fold((0, 1), |(s, a), (cs, ca)| (s.max(cs), a.max(ca)));
            let align = max_align.max(VARIANT_TAG_SIZE);
            let payload = align_up(VARIANT_TAG_SIZE, max_align);
            (align_up(payload + max_size, align), align)
        }
    }
}

/// Round `offset` up to a multiple of `align`.
pub fn align_up(offset: u64, align: u64) -> u64 {
    if align <= 1 {
        offset
    } else {
        offset.div_ceil(align) * align
    }
}
