//! The canonical intermediate representation.
//!
//! An [`IrType`] is a language-neutral description of a type's shape. Two
//! source types are "the same type" iff their analyzers produce structurally
//! equal `IrType` values: same shape, same names, same field order, same
//! nested types.
//!
//! The IR deliberately records the *declared* primitive. A 53-bit-safe
//! integer and a full 64-bit integer both lower to [`PrimitiveKind::Int64`];
//! the width discrepancy is pushed into the layout comparison so it is
//! diagnosed rather than silently coerced.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Maximum nesting depth of an IR type.
pub const MAX_IR_DEPTH: usize = 64;

/// Primitive kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Int64,
    Float64,
    String,
    Bool,
    Bytes,
}

impl PrimitiveKind {
    /// Stable numeric tag used by the canonical encoding.
    pub fn to_u8(self) -> u8 {
        match self {
            Self::Int64 => 0,
            Self::Float64 => 1,
            Self::String => 2,
            Self::Bool => 3,
            Self::Bytes => 4,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Int64 => "int64",
            Self::Float64 => "float64",
            Self::String => "string",
            Self::Bool => "bool",
            Self::Bytes => "bytes",
        }
    }
}

/// Container shapes. A map carries its key type; the element is the value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerShape {
    List,
    Optional,
    Set,
    Map(Box<IrType>),
}

/// A named record field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub ty: IrType,
}

/// A named variant case with an optional payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Case {
    pub name: String,
    pub payload: Option<IrType>,
}

/// A canonical, language-neutral type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IrType {
    Primitive(PrimitiveKind),
    Container {
        shape: ContainerShape,
        element: Box<IrType>,
    },
    /// Field order is the ABI field order.
    Record { name: String, fields: Vec<Field> },
    Variant { name: String, cases: Vec<Case> },
}

impl IrType {
    pub fn int64() -> Self {
        Self::Primitive(PrimitiveKind::Int64)
    }

    pub fn float64() -> Self {
        Self::Primitive(PrimitiveKind::Float64)
    }

    pub fn string() -> Self {
        Self::Primitive(PrimitiveKind::String)
    }

    pub fn bool() -> Self {
        Self::Primitive(PrimitiveKind::Bool)
    }

    pub fn bytes() -> Self {
        Self::Primitive(PrimitiveKind::Bytes)
    }

    pub fn list(element: IrType) -> Self {
        Self::Container {
            shape: ContainerShape::List,
            element: Box::new(element),
        }
    }

    pub fn optional(element: IrType) -> Self {
        Self::Container {
            shape: ContainerShape::Optional,
            element: Box::new(element),
        }
    }

    pub fn set(element: IrType) -> Self {
        Self::Container {
            shape: ContainerShape::Set,
            element: Box::new(element),
        }
    }

    pub fn map(key: IrType, value: IrType) -> Self {
        Self::Container {
            shape: ContainerShape::Map(Box::new(key)),
            element: Box::new(value),
        }
    }

    /// Build a record from `(name, type)` pairs, preserving order.
    pub fn record<N, I, F>(name: N, fields: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (F, IrType)>,
        F: Into<String>,
    {
        Self::Record {
            name: name.into(),
            fields: fields
                .into_iter()
                .map(|(name, ty)| Field {
                    name: name.into(),
                    ty,
                })
                .collect(),
        }
    }

    /// Build a variant from `(name, payload)` pairs, preserving order.
    pub fn variant<N, I, C>(name: N, cases: I) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = (C, Option<IrType>)>,
        C: Into<String>,
    {
        Self::Variant {
            name: name.into(),
            cases: cases
                .into_iter()
                .map(|(name, payload)| Case {
                    name: name.into(),
                    payload,
                })
                .collect(),
        }
    }

    /// The declared name of a record or variant.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Record { name, .. } | Self::Variant { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Nesting depth; a primitive has depth 1.
    ///
    /// Iterative, so arbitrarily deep values built through the API can be
    /// measured and rejected without exhausting the stack.
    pub fn depth(&self) -> usize {
        let mut deepest = 0;
        let mut pending = vec![(self, 1)];
        while let Some((ty, level)) = pending.pop() {
            deepest = deepest.max(level);
            match ty {
                Self::Primitive(_) => {}
                Self::Container { shape, element } => {
                    if let ContainerShape::Map(key) = shape {
                        pending.push((key.as_ref(), level + 1));
                    }
                    pending.push((element.as_ref(), level + 1));
                }
                Self::Record { fields, .. } => {
                    pending.extend(fields.iter().map(|f| (&f.ty, level + 1)));
                }
                Self::Variant { cases, .. } => {
                    pending.extend(
                        cases
                            .iter()
                            .filter_map(|c| c.payload.as_ref())
                            .map(|p| (p, level + 1)),
                    );
                }
            }
        }
        deepest
    }

    /// Visit this type and every nested type, parents before children.
    pub fn walk<'a>(&'a self, visit: &mut dyn FnMut(&'a IrType)) {
        visit(self);
        match self {
            Self::Primitive(_) => {}
            Self::Container { shape, element } => {
                if let ContainerShape::Map(key) = shape {
                    key.walk(visit);
                }
                element.walk(visit);
            }
            Self::Record { fields, .. } => {
                for field in fields {
                    field.ty.walk(visit);
                }
            }
            Self::Variant { cases, .. } => {
                for payload in cases.iter().filter_map(|c| c.payload.as_ref()) {
                    payload.walk(visit);
                }
            }
        }
    }

    /// Locate the first structural difference between two types.
    ///
    /// Returns `None` when the types are equal, otherwise a path such as
    /// `User.id: int64 vs float64`.
    pub fn first_difference(&self, other: &IrType) -> Option<String> {
        diff_at(self.name().unwrap_or("$"), self, other)
    }
}

fn diff_at(path: &str, a: &IrType, b: &IrType) -> Option<String> {
    match (a, b) {
        (IrType::Primitive(x), IrType::Primitive(y)) if x == y => None,
        (
            IrType::Container {
                shape: sa,
                element: ea,
            },
            IrType::Container {
                shape: sb,
                element: eb,
            },
        ) => {
            match (sa, sb) {
                (ContainerShape::Map(ka), ContainerShape::Map(kb)) => {
                    if let Some(d) = diff_at(&format!("{path}[key]"), ka, kb) {
                        return Some(d);
                    }
                }
                (x, y) if std::mem::discriminant(x) == std::mem::discriminant(y) => {}
                _ => return Some(format!("{path}: {a} vs {b}")),
            }
            diff_at(&format!("{path}[]"), ea, eb)
        }
        (
            IrType::Record {
                name: na,
                fields: fa,
            },
            IrType::Record {
                name: nb,
                fields: fb,
            },
        ) => {
            if na != nb {
                return Some(format!("{path}: record name {na} vs {nb}"));
            }
            for (i, pair) in fa.iter().zip(fb.iter()).enumerate() {
                let (x, y) = pair;
                if x.name != y.name {
                    return Some(format!(
                        "{path}: field #{i} is `{}` vs `{}`",
                        x.name, y.name
                    ));
                }
                if let Some(d) = diff_at(&format!("{path}.{}", x.name), &x.ty, &y.ty) {
                    return Some(d);
                }
            }
            if fa.len() != fb.len() {
                return Some(format!(
                    "{path}: {} fields vs {} fields",
                    fa.len(),
                    fb.len()
                ));
            }
            None
        }
        (
            IrType::Variant {
                name: na,
                cases: ca,
            },
            IrType::Variant {
                name: nb,
                cases: cb,
            },
        ) => {
            if na != nb {
                return Some(format!("{path}: variant name {na} vs {nb}"));
            }
            for (i, (x, y)) in ca.iter().zip(cb.iter()).enumerate() {
                if x.name != y.name {
                    return Some(format!(
                        "{path}: case #{i} is `{}` vs `{}`",
                        x.name, y.name
                    ));
                }
                let case_path = format!("{path}::{}", x.name);
                match (&x.payload, &y.payload) {
                    (None, None) => {}
                    (Some(px), Some(py)) => {
                        if let Some(d) = diff_at(&case_path, px, py) {
                            return Some(d);
                        }
                    }
                    _ => return Some(format!("{case_path}: payload presence differs")),
                }
            }
            if ca.len() != cb.len() {
                return Some(format!(
                    "{path}: {} cases vs {} cases",
                    ca.len(),
                    cb.len()
                ));
            }
            None
        }
        _ => Some(format!("{path}: {a} vs {b}")),
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for IrType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Primitive(kind) => write!(f, "{kind}"),
            Self::Container { shape, element } => match shape {
                ContainerShape::List => write!(f, "list<{element}>"),
                ContainerShape::Optional => write!(f, "optional<{element}>"),
                ContainerShape::Set => write!(f, "set<{element}>"),
                ContainerShape::Map(key) => write!(f, "map<{key}, {element}>"),
            },
            Self::Record { name, fields } => {
                write!(f, "record {name} {{ ")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}: {}", field.name, field.ty)?;
                }
                f.write_str(" }")
            }
            Self::Variant { name, cases } => {
                write!(f, "variant {name} {{ ")?;
                for (i, case) in cases.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" | ")?;
                    }
                    match &case.payload {
                        Some(payload) => write!(f, "{}({payload})", case.name)?,
                        None => f.write_str(&case.name)?,
                    }
                }
                f.write_str(" }")
            }
        }
    }
}

/// Canonical naming for IR identifiers.
///
/// Record and variant names are UpperCamelCase, field names snake_case and
/// case names UpperCamelCase, whatever the source language's convention.
pub mod naming {
    /// `user_profile`, `userProfile` and `UserProfile` all become `UserProfile`.
    pub fn to_upper_camel(name: &str) -> String {
        let mut out = String::with_capacity(name.len());
        let mut upper_next = true;
        for ch in name.chars() {
            if ch == '_' || ch == '-' {
                upper_next = true;
                continue;
            }
            if upper_next {
                out.extend(ch.to_uppercase());
                upper_next = false;
            } else {
                out.push(ch);
            }
        }
        out
    }

    /// `createdAt`, `CreatedAt` and `created_at` all become `created_at`.
    ///
    /// An uppercase run ends before its last capital when a lowercase letter
    /// follows, so `HTTPServer` and `httpServer` both become `http_server`.
    pub fn to_snake(name: &str) -> String {
        let chars: Vec<char> = name.chars().collect();
        let mut out = String::with_capacity(name.len() + 4);
        for (i, &ch) in chars.iter().enumerate() {
            if ch.is_uppercase() {
                let prev = i.checked_sub(1).map(|j| chars[j]);
                let next = chars.get(i + 1);
                let after_lower = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
                let ends_run = prev.is_some_and(char::is_uppercase)
                    && next.is_some_and(|n| n.is_lowercase());
                if after_lower || ends_run {
                    out.push('_');
                }
                out.extend(ch.to_lowercase());
            } else {
                out.push(ch);
            }
        }
        out
    }
}
