//! Well-formedness checks for IR types.

use std::collections::HashSet;

use crate::error::{CoreError, Result};
use crate::ir::{ContainerShape, IrType, MAX_IR_DEPTH};

/// Validate an IR type.
///
/// This checks:
/// - Nesting depth is at most [`MAX_IR_DEPTH`]
/// - Record, variant, field and case names are non-empty
/// - Field names are unique within a record, case names within a variant
/// - Every variant has at least one case
pub fn validate_ir_type(ty: &IrType) -> Result<()> {
    let depth = ty.depth();
    if depth > MAX_IR_DEPTH {
        return Err(CoreError::TooDeep {
            depth,
            max: MAX_IR_DEPTH,
        });
    }
    validate_node(ty)
}

fn validate_node(ty: &IrType) -> Result<()> {
    match ty {
        IrType::Primitive(_) => Ok(()),
        IrType::Container { shape, element } => {
            if let ContainerShape::Map(key) = shape {
                validate_node(key)?;
            }
            validate_node(element)
        }
        IrType::Record { name, fields } => {
            if name.is_empty() {
                return Err(CoreError::EmptyName("record"));
            }
            let mut seen = HashSet::with_capacity(fields.len());
            for field in fields {
                if field.name.is_empty() {
                    return Err(CoreError::EmptyName("field"));
                }
                if !seen.insert(field.name.as_str()) {
                    return Err(CoreError::DuplicateName {
                        kind: "field",
                        owner: name.clone(),
                        name: field.name.clone(),
                    });
                }
                validate_node(&field.ty)?;
            }
            Ok(())
        }
        IrType::Variant { name, cases } => {
            if name.is_empty() {
                return Err(CoreError::EmptyName("variant"));
            }
            if cases.is_empty() {
                return Err(CoreError::EmptyVariant(name.clone()));
            }
            let mut seen = HashSet::with_capacity(cases.len());
            for case in cases {
                if case.name.is_empty() {
                    return Err(CoreError::EmptyName("case"));
                }
                if !seen.insert(case.name.as_str()) {
                    return Err(CoreError::DuplicateName {
                        kind: "case",
                        owner: name.clone(),
                        name: case.name.clone(),
                    });
                }
                if let Some(payload) = &case.payload {
                    validate_node(payload)?;
                }
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_record() {
        let ty = IrType::record(
            "User",
            [("id", IrType::int64()), ("tags", IrType::set(IrType::string()))],
        );
        assert!(validate_ir_type(&ty).is_ok());
    }

    #[test]
    fn test_duplicate_field() {
        let ty = IrType::record("User", [("id", IrType::int64()), ("id", IrType::string())]);
        let result = validate_ir_type(&ty);
        assert!(matches!(
            result,
            Err(CoreError::DuplicateName { kind: "field", ref name, .. }) if name == "id"
        ));
    }

    #[test]
    fn test_duplicate_case_in_nested_variant() {
        let inner = IrType::variant("Status", [("On", None), ("On", None)]);
        let ty = IrType::record("Device", [("status", IrType::optional(inner))]);
        assert!(matches!(
            validate_ir_type(&ty),
            Err(CoreError::DuplicateName { kind: "case", .. })
        ));
    }

    #[test]
    fn test_empty_names_and_variants() {
        let ty = IrType::record("", [("id", IrType::int64())]);
        assert_eq!(validate_ir_type(&ty), Err(CoreError::EmptyName("record")));

        let ty = IrType::variant("Never", Vec::<(&str, Option<IrType>)>::new());
        assert_eq!(
            validate_ir_type(&ty),
            Err(CoreError::EmptyVariant("Never".into()))
        );
    }

    #[test]
    fn test_too_deep() {
        let mut ty = IrType::int64();
        for _ in 0..MAX_IR_DEPTH {
            ty = IrType::list(ty);
        }
        assert!(matches!(
            validate_ir_type(&ty),
            Err(CoreError::TooDeep { .. })
        ));
    }
}
