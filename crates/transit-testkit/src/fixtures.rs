//! Test fixtures: the reference `User` sources and descriptors, and codecs
//! that break the conversion laws in known ways.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use transit_core::{
    Codec, IrType, IrValue, LanguageTag, PlatformDescriptor, PlatformValue, Repr, ReprCodec,
    ScalarRepr,
};

/// The reference record in Rust, laid out as C.
pub const USER_RUST: &str = r#"
#[repr(C)]
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub active: bool,
}
"#;

/// The reference record in ReScript.
pub const USER_RESCRIPT: &str = r#"
type user = {
  id: int,
  name: string,
  email: string,
  active: bool,
}
"#;

/// The IR both `User` sources lower to.
pub fn user_ir() -> IrType {
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

/// The platform repr of `User` with the given id and string reprs.
pub fn user_repr(id: ScalarRepr, string: ScalarRepr) -> Repr {
    Repr::Record(vec![
        Repr::Scalar(id),
        Repr::Scalar(string),
        Repr::Scalar(string),
        Repr::Scalar(ScalarRepr::Bool),
    ])
}

/// A `User` descriptor with the structural codec.
pub fn user_descriptor(
    language: &str,
    id: ScalarRepr,
    string: ScalarRepr,
    abi_stable: bool,
) -> PlatformDescriptor {
    PlatformDescriptor::new(
        LanguageTag::new(language),
        "User",
        user_ir(),
        user_repr(id, string),
        abi_stable,
    )
    .expect("User descriptor is well formed")
}

/// `User` as `#[repr(C)]` Rust stores it.
pub fn rust_user() -> PlatformDescriptor {
    user_descriptor("rust", ScalarRepr::I64, ScalarRepr::Utf8, true)
}

/// `User` with an id limited to the 2^53 safe-integer range.
pub fn safe_integer_user() -> PlatformDescriptor {
    user_descriptor("javascript", ScalarRepr::SafeInteger, ScalarRepr::Utf8, true)
}

/// Rust `User` whose codec trims string fields on the way in.
pub fn trimming_user() -> PlatformDescriptor {
    let repr = user_repr(ScalarRepr::I64, ScalarRepr::Utf8);
    rust_user().with_codec(Arc::new(TrimmingCodec::new(repr)))
}

/// Rust `User` whose codec keeps a call counter.
pub fn stateful_user() -> PlatformDescriptor {
    let repr = user_repr(ScalarRepr::I64, ScalarRepr::Utf8);
    rust_user().with_codec(Arc::new(StatefulCodec::new(repr)))
}

/// Trims surrounding whitespace from every string when lowering.
///
/// Lifting is structural, so `" "` comes back as `""`.
#[derive(Debug, Clone)]
pub struct TrimmingCodec {
    inner: ReprCodec,
}

impl TrimmingCodec {
    pub fn new(repr: Repr) -> Self {
        Self {
            inner: ReprCodec::new(repr),
        }
    }
}

impl Codec for TrimmingCodec {
    fn id(&self) -> &str {
        "trimming"
    }

    fn to_ir(&self, value: &PlatformValue) -> IrValue {
        trim_strings(self.inner.to_ir(value))
    }

    fn from_ir(&self, value: &IrValue) -> PlatformValue {
        self.inner.from_ir(value)
    }
}

fn trim_strings(value: IrValue) -> IrValue {
    match value {
        IrValue::String(s) => IrValue::String(s.trim().to_string()),
        IrValue::List(items) => IrValue::List(items.into_iter().map(trim_strings).collect()),
        IrValue::Set(items) => IrValue::Set(items.into_iter().map(trim_strings).collect()),
        IrValue::Record(fields) => IrValue::Record(fields.into_iter().map(trim_strings).collect()),
        IrValue::Optional(v) => IrValue::Optional(v.map(|v| Box::new(trim_strings(*v)))),
        IrValue::Map(entries) => IrValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (trim_strings(k), trim_strings(v)))
                .collect(),
        ),
        IrValue::Variant { case, payload } => IrValue::Variant {
            case,
            payload: payload.map(|p| Box::new(trim_strings(*p))),
        },
        other => other,
    }
}

/// Adds the number of previous calls to every lowered integer, so equal
/// inputs lower differently.
#[derive(Debug)]
pub struct StatefulCodec {
    inner: ReprCodec,
    calls: AtomicU64,
}

impl StatefulCodec {
    pub fn new(repr: Repr) -> Self {
        Self {
            inner: ReprCodec::new(repr),
            calls: AtomicU64::new(0),
        }
    }
}

impl Codec for StatefulCodec {
    fn id(&self) -> &str {
        "stateful"
    }

    fn to_ir(&self, value: &PlatformValue) -> IrValue {
        let calls = self.calls.fetch_add(1, Ordering::Relaxed) as i64;
        match self.inner.to_ir(value) {
            IrValue::Int64(n) => IrValue::Int64(n.wrapping_add(calls)),
            IrValue::Record(mut fields) => {
                for field in &mut fields {
                    if let IrValue::Int64(n) = field {
                        *n = n.wrapping_add(calls);
                    }
                }
                IrValue::Record(fields)
            }
            other => other,
        }
    }

    fn from_ir(&self, value: &IrValue) -> PlatformValue {
        self.inner.from_ir(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trimming_codec() {
        let codec = TrimmingCodec::new(user_repr(ScalarRepr::I64, ScalarRepr::Utf8));
        let value = PlatformValue::Record(vec![
            PlatformValue::Integer(1),
            PlatformValue::Utf8(" ".into()),
            PlatformValue::Utf8(" a@b ".into()),
            PlatformValue::Bool(true),
        ]);
        assert_eq!(
            codec.to_ir(&value),
            IrValue::Record(vec![
                IrValue::Int64(1),
                IrValue::String(String::new()),
                IrValue::String("a@b".into()),
                IrValue::Bool(true),
            ])
        );
        assert!(!codec.is_structural());
    }

    #[test]
    fn test_stateful_codec_is_not_a_function() {
        let codec = StatefulCodec::new(Repr::Scalar(ScalarRepr::I64));
        let value = PlatformValue::Integer(7);
        assert_ne!(codec.to_ir(&value), codec.to_ir(&value));
    }

    #[test]
    fn test_user_descriptors_share_ir() {
        assert_eq!(rust_user().ir(), safe_integer_user().ir());
        assert_eq!(trimming_user().codec().id(), "trimming");
        assert_eq!(rust_user().layout().size, 48);
    }
}
