//! The analyzer interface and the language-neutral declarations analyzers
//! parse into.

use std::collections::{BTreeSet, HashSet};

use transit_core::{IrType, IrValue, LanguageTag, PlatformDescriptor, PlatformValue, Repr};

use crate::error::{AnalysisError, Result};
use crate::lexer::Span;

/// A reference to a type, e.g. `Vec<Option<String>>` or `array<user>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeExpr {
    /// Last path segment (`HashMap` for `std::collections::HashMap`), or the
    /// dotted module path where the language qualifies builtins that way.
    pub name: String,
    pub args: Vec<TypeExpr>,
    pub span: Span,
}

impl TypeExpr {
    pub fn named(name: impl Into<String>, span: Span) -> Self {
        Self {
            name: name.into(),
            args: Vec::new(),
            span,
        }
    }

    /// Visit every name referenced by this expression.
    fn names<'a>(&'a self, out: &mut Vec<&'a str>) {
        out.push(&self.name);
        for arg in &self.args {
            arg.names(out);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    pub name: String,
    pub ty: TypeExpr,
    /// Declared optional (`name?: t`); lowered as `Optional`.
    pub optional: bool,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CasePayload {
    Unit,
    Type(TypeExpr),
    /// An inline record payload.
    Record(Vec<FieldDecl>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaseDecl {
    pub name: String,
    pub payload: CasePayload,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclBody {
    Record(Vec<FieldDecl>),
    Variant(Vec<CaseDecl>),
    Alias(TypeExpr),
}

/// A type declaration with its source spelling and attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeDecl {
    pub name: String,
    /// Attribute contents without delimiters, e.g. `repr(C)` or `derive(Debug)`.
    pub attributes: Vec<String>,
    pub body: DeclBody,
    pub span: Span,
}

impl TypeDecl {
    /// Every type name this declaration's body mentions.
    pub fn references(&self) -> Vec<&str> {
        let mut out = Vec::new();
        match &self.body {
            DeclBody::Record(fs) => fs.iter().for_each(|f| f.ty.names(&mut out)),
            DeclBody::Alias(ty) => ty.names(&mut out),
            DeclBody::Variant(cases) => {
                for case in cases {
                    match &case.payload {
                        CasePayload::Unit => {}
                        CasePayload::Type(ty) => ty.names(&mut out),
                        CasePayload::Record(fs) => fs.iter().for_each(|f| f.ty.names(&mut out)),
                    }
                }
            }
        }
        out
    }
}

/// Output of lowering a declaration set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lowered {
    /// Source spelling of the root type.
    pub type_name: String,
    pub ir: IrType,
    pub repr: Repr,
    /// Whether the language guarantees the layout of every record and
    /// variant reachable from the root.
    pub abi_stable: bool,
}

/// An analyzed type: its IR and its descriptor in the analyzer's language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Analysis {
    pub ir: IrType,
    pub descriptor: PlatformDescriptor,
}

/// A source-language front end.
///
/// Implementations must be deterministic: identical text yields identical
/// output. Any construct without an IR counterpart is rejected with
/// [`AnalysisError::UnsupportedConstruct`], never approximated.
pub trait Analyzer: Send + Sync {
    fn language(&self) -> LanguageTag;

    /// Parse the type-definition subset of the language.
    fn parse(&self, source: &str) -> Result<Vec<TypeDecl>>;

    /// Lower the declaration named `root` (source spelling) and everything
    /// it references.
    fn lower(&self, decls: &[TypeDecl], root: &str) -> Result<Lowered>;

    /// Build the descriptor for `root`.
    fn describe(&self, decls: &[TypeDecl], root: &str) -> Result<Analysis> {
        let lowered = self.lower(decls, root)?;
        let descriptor = PlatformDescriptor::new(
            self.language(),
            lowered.type_name,
            lowered.ir.clone(),
            lowered.repr,
            lowered.abi_stable,
        )?;
        tracing::debug!(
            language = %descriptor.language(),
            type_name = descriptor.type_name(),
            ir = %lowered.ir,
            abi_stable = descriptor.layout().abi_stable,
            "described root type"
        );
        Ok(Analysis {
            ir: lowered.ir,
            descriptor,
        })
    }

    /// Analyze a source whose root is the one declaration nothing else
    /// references.
    fn analyze(&self, source: &str) -> Result<Analysis> {
        let decls = self.parse(source)?;
        let root = find_root(&decls)?;
        self.describe(&decls, &root)
    }

    /// Analyze a source, taking `name` (source spelling) as the root.
    fn analyze_named(&self, source: &str, name: &str) -> Result<Analysis> {
        let decls = self.parse(source)?;
        if !decls.iter().any(|d| d.name == name) {
            return Err(AnalysisError::TypeNotFound(name.to_string()));
        }
        self.describe(&decls, name)
    }

    /// Lower a runtime value of the analyzed type.
    fn lower_value(&self, analysis: &Analysis, value: &PlatformValue) -> IrValue {
        analysis.descriptor.to_ir(value)
    }

    /// Lift an IR value into the analyzed type.
    fn lift_value(&self, analysis: &Analysis, value: &IrValue) -> PlatformValue {
        analysis.descriptor.from_ir(value)
    }
}

/// The single declaration no other declaration references.
pub fn find_root(decls: &[TypeDecl]) -> Result<String> {
    if decls.is_empty() {
        return Err(AnalysisError::NoDeclarations);
    }
    let referenced: HashSet<&str> = decls
        .iter()
        .flat_map(|d| d.references().into_iter().filter(move |r| *r != d.name))
        .collect();
    let roots: BTreeSet<&str> = decls
        .iter()
        .map(|d| d.name.as_str())
        .filter(|n| !referenced.contains(n))
        .collect();
    let mut candidates = roots.iter();
    match (candidates.next(), candidates.next()) {
        (Some(root), None) => Ok(root.to_string()),
        (None, _) => Err(AnalysisError::AmbiguousRoot(
            decls.iter().map(|d| d.name.clone()).collect(),
        )),
        _ => Err(AnalysisError::AmbiguousRoot(
            roots.iter().map(|r| r.to_string()).collect(),
        )),
    }
}
