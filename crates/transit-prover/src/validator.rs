//! Business validators checked by the validation-equivalence obligation.

use transit_core::IrValue;

/// A predicate over IR values. Must be deterministic.
pub trait Validator: Send + Sync {
    /// Stable identifier, recorded in certificates.
    fn id(&self) -> &str;

    fn validate(&self, value: &IrValue) -> bool;
}

/// Accepts every value.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl Validator for AcceptAll {
    fn id(&self) -> &str {
        "accept-all"
    }

    fn validate(&self, _value: &IrValue) -> bool {
        true
    }
}

/// A validator backed by a closure.
pub struct FnValidator<F> {
    id: String,
    f: F,
}

impl<F> FnValidator<F>
where
    F: Fn(&IrValue) -> bool + Send + Sync,
{
    pub fn new(id: impl Into<String>, f: F) -> Self {
        Self { id: id.into(), f }
    }
}

impl<F> Validator for FnValidator<F>
where
    F: Fn(&IrValue) -> bool + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn validate(&self, value: &IrValue) -> bool {
        (self.f)(value)
    }
}

impl<F> std::fmt::Debug for FnValidator<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnValidator").field("id", &self.id).finish()
    }
}

/// Rejects any value containing an empty string, at any depth.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequireNonEmpty;

impl Validator for RequireNonEmpty {
    fn id(&self) -> &str {
        "require-non-empty"
    }

    fn validate(&self, value: &IrValue) -> bool {
        match value {
            IrValue::String(s) => !s.is_empty(),
            IrValue::List(items) | IrValue::Set(items) | IrValue::Record(items) => {
                items.iter().all(|v| self.validate(v))
            }
            IrValue::Optional(v) => v.as_deref().map_or(true, |v| self.validate(v)),
            IrValue::Map(entries) => entries
                .iter()
                .all(|(k, v)| self.validate(k) && self.validate(v)),
            IrValue::Variant { payload, .. } => {
                payload.as_deref().map_or(true, |v| self.validate(v))
            }
            IrValue::Int64(_) | IrValue::Float64(_) | IrValue::Bool(_) | IrValue::Bytes(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_non_empty_is_deep() {
        let ok = IrValue::Record(vec![IrValue::Int64(1), IrValue::string(" ")]);
        let nested = IrValue::Record(vec![IrValue::List(vec![IrValue::some(IrValue::string(""))])]);
        assert!(RequireNonEmpty.validate(&ok));
        assert!(!RequireNonEmpty.validate(&nested));
    }

    #[test]
    fn test_fn_validator() {
        let positive = FnValidator::new("positive-id", |v: &IrValue| {
            matches!(v, IrValue::Record(fields) if matches!(fields.first(), Some(IrValue::Int64(n)) if *n > 0))
        });
        assert_eq!(positive.id(), "positive-id");
        assert!(positive.validate(&IrValue::Record(vec![IrValue::Int64(3)])));
        assert!(!positive.validate(&IrValue::Record(vec![IrValue::Int64(-3)])));
        assert!(AcceptAll.validate(&IrValue::Bool(false)));
    }
}
