//! Lowering of parsed declarations to IR and platform reprs.
//!
//! The walk is shared; each language supplies a [`TypeMapper`] that resolves
//! its builtin type names and decides which declarations have a fixed layout.

use std::collections::HashMap;

use transit_core::ir::naming;
use transit_core::{validate_ir_type, CoreError, IrType, Repr, ScalarRepr, MAX_IR_DEPTH};

use crate::error::{AnalysisError, Result};
use crate::traits::{CasePayload, DeclBody, FieldDecl, Lowered, TypeDecl, TypeExpr};

/// Declarations being lowered at once. Aliases add no IR depth, so chains of
/// them are bounded separately.
const MAX_DECL_CHAIN: usize = 4 * MAX_IR_DEPTH;

/// A builtin type constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Scalar(ScalarRepr),
    List,
    Optional,
    Set,
    /// Two arguments: key and value.
    Map,
    /// One argument, the value; keys are strings stored as given.
    StringKeyedMap(ScalarRepr),
}

impl Builtin {
    fn arity(self) -> usize {
        match self {
            Self::Scalar(_) => 0,
            Self::List | Self::Optional | Self::Set | Self::StringKeyedMap(_) => 1,
            Self::Map => 2,
        }
    }
}

/// Language-specific resolution used by [`lower_root`].
pub trait TypeMapper {
    /// Resolve a reference that names no declaration. `Ok(None)` means the
    /// name is unknown.
    fn builtin(&self, expr: &TypeExpr) -> Result<Option<Builtin>>;

    /// Whether the language fixes the layout of this record or variant.
    fn layout_stable(&self, decl: &TypeDecl) -> bool;
}

/// Lower `root` and every declaration it reaches.
pub fn lower_root(decls: &[TypeDecl], root: &str, mapper: &dyn TypeMapper) -> Result<Lowered> {
    let mut by_name = HashMap::with_capacity(decls.len());
    for decl in decls {
        if by_name.insert(decl.name.as_str(), decl).is_some() {
            return Err(AnalysisError::malformed(
                format!("type `{}` is declared twice", decl.name),
                decl.span,
            ));
        }
    }
    let root_decl = by_name
        .get(root)
        .copied()
        .ok_or_else(|| AnalysisError::TypeNotFound(root.to_string()))?;

    let mut lowerer = Lowerer {
        decls: by_name,
        mapper,
        stack: Vec::new(),
        depth: 0,
        abi_stable: true,
    };
    let (ir, repr) = lowerer.decl(root_decl)?;
    validate_ir_type(&ir)?;

    Ok(Lowered {
        type_name: root_decl.name.clone(),
        ir,
        repr,
        abi_stable: lowerer.abi_stable,
    })
}

struct Lowerer<'a> {
    decls: HashMap<&'a str, &'a TypeDecl>,
    mapper: &'a dyn TypeMapper,
    /// Declarations currently being lowered, for cycle detection.
    stack: Vec<&'a str>,
    /// Containers, records and variants enclosing the current type.
    depth: usize,
    abi_stable: bool,
}

impl<'a> Lowerer<'a> {
    fn decl(&mut self, decl: &'a TypeDecl) -> Result<(IrType, Repr)> {
        if self.stack.contains(&decl.name.as_str()) {
            return Err(AnalysisError::unsupported(
                format!("recursive type `{}`", decl.name),
                decl.span,
            ));
        }
        if self.stack.len() >= MAX_DECL_CHAIN {
            return Err(AnalysisError::unsupported(
                format!("declarations nested more than {MAX_DECL_CHAIN} deep"),
                decl.span,
            ));
        }
        self.stack.push(&decl.name);
        let nests = !matches!(decl.body, DeclBody::Alias(_));
        if nests {
            self.descend()?;
        }

        let name = naming::to_upper_camel(&decl.name);
        let lowered = match &decl.body {
            DeclBody::Alias(expr) => self.expr(expr),
            DeclBody::Record(fields) => {
                self.abi_stable &= self.mapper.layout_stable(decl);
                self.record(name, fields, decl)
            }
            DeclBody::Variant(cases) => {
                self.abi_stable &= self.mapper.layout_stable(decl);
                let mut ir_cases = Vec::with_capacity(cases.len());
                let mut reprs = Vec::with_capacity(cases.len());
                for case in cases {
                    let case_name = naming::to_upper_camel(&case.name);
                    let payload = match &case.payload {
                        CasePayload::Unit => None,
                        CasePayload::Type(expr) => Some(self.expr(expr)?),
                        CasePayload::Record(fields) => {
                            Some(self.record(format!("{name}{case_name}"), fields, decl)?)
                        }
                    };
                    let (ty, repr) = payload.unzip();
                    ir_cases.push((case_name, ty));
                    reprs.push(repr);
                }
                Ok((IrType::variant(name, ir_cases), Repr::Variant(reprs)))
            }
        };

        if nests {
            self.depth -= 1;
        }
        self.stack.pop();
        lowered
    }

    /// Enter one level of IR nesting, failing before the IR would exceed
    /// [`MAX_IR_DEPTH`].
    fn descend(&mut self) -> Result<()> {
        if self.depth + 1 >= MAX_IR_DEPTH {
            return Err(CoreError::TooDeep {
                depth: self.depth + 2,
                max: MAX_IR_DEPTH,
            }
            .into());
        }
        self.depth += 1;
        Ok(())
    }

    fn record(
        &mut self,
        name: String,
        fields: &'a [FieldDecl],
        decl: &TypeDecl,
    ) -> Result<(IrType, Repr)> {
        if fields.is_empty() {
            return Err(AnalysisError::unsupported(
                format!("record `{}` with no fields", decl.name),
                decl.span,
            ));
        }
        let mut ir_fields = Vec::with_capacity(fields.len());
        let mut reprs = Vec::with_capacity(fields.len());
        for field in fields {
            let (mut ty, mut repr) = self.expr(&field.ty)?;
            if field.optional {
                ty = IrType::optional(ty);
                repr = Repr::Optional(Box::new(repr));
            }
            ir_fields.push((naming::to_snake(&field.name), ty));
            reprs.push(repr);
        }
        Ok((IrType::record(name, ir_fields), Repr::Record(reprs)))
    }

    fn expr(&mut self, expr: &'a TypeExpr) -> Result<(IrType, Repr)> {
        if let Some(decl) = self.decls.get(expr.name.as_str()).copied() {
            if !expr.args.is_empty() {
                return Err(AnalysisError::unsupported(
                    format!("type arguments on `{}`", expr.name),
                    expr.span,
                ));
            }
            return self.decl(decl);
        }

        let builtin = self.mapper.builtin(expr)?.ok_or_else(|| {
            AnalysisError::unsupported(format!("unknown type `{}`", expr.name), expr.span)
        })?;
        if expr.args.len() != builtin.arity() {
            return Err(AnalysisError::malformed(
                format!(
                    "`{}` takes {} type argument(s), found {}",
                    expr.name,
                    builtin.arity(),
                    expr.args.len()
                ),
                expr.span,
            ));
        }

        let nests = builtin.arity() > 0;
        if nests {
            self.descend()?;
        }
        let lowered = match builtin {
            Builtin::Scalar(s) => (IrType::Primitive(s.primitive()), Repr::Scalar(s)),
            Builtin::List => {
                let (ty, repr) = self.expr(&expr.args[0])?;
                (IrType::list(ty), Repr::List(Box::new(repr)))
            }
            Builtin::Optional => {
                let (ty, repr) = self.expr(&expr.args[0])?;
                (IrType::optional(ty), Repr::Optional(Box::new(repr)))
            }
            Builtin::Set => {
                let (ty, repr) = self.expr(&expr.args[0])?;
                (IrType::set(ty), Repr::Set(Box::new(repr)))
            }
            Builtin::Map => {
                let (key_ty, key_repr) = self.expr(&expr.args[0])?;
                let (value_ty, value_repr) = self.expr(&expr.args[1])?;
                (
                    IrType::map(key_ty, value_ty),
                    Repr::Map {
                        key: Box::new(key_repr),
                        value: Box::new(value_repr),
                    },
                )
            }
            Builtin::StringKeyedMap(key) => {
                let (value_ty, value_repr) = self.expr(&expr.args[0])?;
                (
                    IrType::map(IrType::Primitive(key.primitive()), value_ty),
                    Repr::Map {
                        key: Box::new(Repr::Scalar(key)),
                        value: Box::new(value_repr),
                    },
                )
            }
        };
        if nests {
            self.depth -= 1;
        }
        Ok(lowered)
    }
}
