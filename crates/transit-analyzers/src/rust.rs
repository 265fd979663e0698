//! Rust analyzer.
//!
//! Reads `struct` (named fields), `enum` and `type` alias items. A
//! declaration's layout is stable only under `#[repr(C)]`; every record and
//! variant reachable from the root must carry it for the descriptor to be
//! ABI-stable.

use serde::{Deserialize, Serialize};
use transit_core::{LanguageTag, ScalarRepr, MAX_IR_DEPTH};

use crate::error::{AnalysisError, Result};
use crate::lexer::{Span, TokenKind, TokenStream};
use crate::lower::{lower_root, Builtin, TypeMapper};
use crate::traits::{
    Analyzer, CaseDecl, CasePayload, DeclBody, FieldDecl, Lowered, TypeDecl, TypeExpr,
};

/// Platform model for Rust sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RustConfig {
    /// Treat `Vec<u8>` as a byte string rather than a list of integers.
    pub vec_u8_as_bytes: bool,
}

impl Default for RustConfig {
    fn default() -> Self {
        Self {
            vec_u8_as_bytes: true,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RustAnalyzer {
    config: RustConfig,
}

impl RustAnalyzer {
    pub fn new(config: RustConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RustConfig {
        &self.config
    }
}

impl Analyzer for RustAnalyzer {
    fn language(&self) -> LanguageTag {
        LanguageTag::new("rust")
    }

    fn parse(&self, source: &str) -> Result<Vec<TypeDecl>> {
        let mut tokens = TokenStream::new(source)?;
        let mut decls = Vec::new();
        while !tokens.is_at_end() {
            if let Some(decl) = parse_item(&mut tokens)? {
                decls.push(decl);
            }
        }
        Ok(decls)
    }

    fn lower(&self, decls: &[TypeDecl], root: &str) -> Result<Lowered> {
        lower_root(decls, root, self)
    }
}

impl TypeMapper for RustAnalyzer {
    fn builtin(&self, expr: &TypeExpr) -> Result<Option<Builtin>> {
        let integer = |bits, signed| Ok(Some(Builtin::Scalar(ScalarRepr::Integer { bits, signed })));
        match expr.name.as_str() {
            "i8" => integer(8, true),
            "i16" => integer(16, true),
            "i32" => integer(32, true),
            "i64" | "isize" => integer(64, true),
            "u8" => integer(8, false),
            "u16" => integer(16, false),
            "u32" => integer(32, false),
            "f32" => Ok(Some(Builtin::Scalar(ScalarRepr::Float { bits: 32 }))),
            "f64" => Ok(Some(Builtin::Scalar(ScalarRepr::F64))),
            "bool" => Ok(Some(Builtin::Scalar(ScalarRepr::Bool))),
            "String" => Ok(Some(Builtin::Scalar(ScalarRepr::Utf8))),
            "Vec" if self.config.vec_u8_as_bytes && is_plain(expr.args.first(), "u8") => {
                Ok(Some(Builtin::Scalar(ScalarRepr::Bytes)))
            }
            "Vec" | "VecDeque" => Ok(Some(Builtin::List)),
            "Option" => Ok(Some(Builtin::Optional)),
            "HashSet" | "BTreeSet" => Ok(Some(Builtin::Set)),
            "HashMap" | "BTreeMap" => Ok(Some(Builtin::Map)),
            "Box" if is_plain(expr.args.first(), "str") && expr.args.len() == 1 => {
                Ok(Some(Builtin::Scalar(ScalarRepr::Utf8)))
            }
            "Box" | "Rc" | "Arc" => Err(AnalysisError::unsupported(
                format!("pointer indirection `{}<..>`", expr.name),
                expr.span,
            )),
            "u64" | "usize" => Err(AnalysisError::unsupported(
                format!("unsigned 64-bit integer `{}` (values above i64::MAX have no IR form)", expr.name),
                expr.span,
            )),
            "i128" | "u128" => Err(AnalysisError::unsupported(
                format!("128-bit integer `{}`", expr.name),
                expr.span,
            )),
            "char" => Err(AnalysisError::unsupported("`char`", expr.span)),
            "str" => Err(AnalysisError::unsupported("unsized `str`", expr.span)),
            _ => Ok(None),
        }
    }

    fn layout_stable(&self, decl: &TypeDecl) -> bool {
        decl.attributes.iter().any(|attr| {
            attr.strip_prefix("repr(")
                .and_then(|rest| rest.strip_suffix(')'))
                .is_some_and(|inner| inner.split(',').any(|hint| hint == "C"))
        })
    }
}

fn is_plain(expr: Option<&TypeExpr>, name: &str) -> bool {
    expr.is_some_and(|e| e.name == name && e.args.is_empty())
}

/// Parse one item. Returns `None` for items that declare no type (`use`).
fn parse_item(tokens: &mut TokenStream) -> Result<Option<TypeDecl>> {
    let attributes = parse_attributes(tokens)?;
    for attr in &attributes {
        if attr.starts_with("repr(") && (attr.contains("packed") || attr.contains("align")) {
            return Err(AnalysisError::unsupported(format!("`#[{attr}]`"), tokens.span()));
        }
    }
    skip_visibility(tokens)?;

    let (keyword, span) = tokens.expect_ident()?;
    match keyword.as_str() {
        "struct" => parse_struct(tokens, attributes, span).map(Some),
        "enum" => parse_enum(tokens, attributes, span).map(Some),
        "type" => parse_alias(tokens, attributes, span).map(Some),
        "use" => {
            while !tokens.eat_punct(';') {
                if tokens.next().is_none() {
                    return Err(tokens.unexpected("`;`"));
                }
            }
            Ok(None)
        }
        "fn" | "impl" | "trait" | "const" | "static" | "mod" | "union" | "extern"
        | "macro_rules" | "unsafe" | "async" => Err(AnalysisError::unsupported(
            format!("`{keyword}` item"),
            span,
        )),
        other => Err(AnalysisError::malformed(
            format!("expected an item, found `{other}`"),
            span,
        )),
    }
}

/// Outer attributes, e.g. `#[derive(Debug)] #[repr(C)]` as `derive(Debug)`
/// and `repr(C)`. Inner attributes (`#![...]`) are skipped.
fn parse_attributes(tokens: &mut TokenStream) -> Result<Vec<String>> {
    let mut attributes = Vec::new();
    while tokens.eat_punct('#') {
        let inner = tokens.eat_punct('!');
        let text = tokens.skip_group('[', ']')?;
        if !inner {
            attributes.push(text);
        }
    }
    Ok(attributes)
}

fn skip_visibility(tokens: &mut TokenStream) -> Result<()> {
    if tokens.eat_ident("pub") && tokens.peek_punct('(') {
        tokens.skip_group('(', ')')?;
    }
    Ok(())
}

fn reject_generics(tokens: &TokenStream, name: &str) -> Result<()> {
    if tokens.peek_punct('<') {
        return Err(AnalysisError::unsupported(
            format!("generic parameters on `{name}`"),
            tokens.span(),
        ));
    }
    if tokens.peek_ident("where") {
        return Err(AnalysisError::unsupported(
            format!("where clause on `{name}`"),
            tokens.span(),
        ));
    }
    Ok(())
}

fn parse_struct(tokens: &mut TokenStream, attributes: Vec<String>, span: Span) -> Result<TypeDecl> {
    let (name, _) = tokens.expect_ident()?;
    reject_generics(tokens, &name)?;
    if tokens.peek_punct('(') {
        return Err(AnalysisError::unsupported(
            format!("tuple struct `{name}`"),
            tokens.span(),
        ));
    }
    if tokens.peek_punct(';') {
        return Err(AnalysisError::unsupported(
            format!("unit struct `{name}`"),
            tokens.span(),
        ));
    }
    let fields = parse_fields(tokens)?;
    Ok(TypeDecl {
        name,
        attributes,
        body: DeclBody::Record(fields),
        span,
    })
}

/// `{ name: Type, ... }`
fn parse_fields(tokens: &mut TokenStream) -> Result<Vec<FieldDecl>> {
    tokens.expect_punct('{')?;
    let mut fields = Vec::new();
    while !tokens.eat_punct('}') {
        parse_attributes(tokens)?;
        skip_visibility(tokens)?;
        let (name, span) = tokens.expect_ident()?;
        tokens.expect_punct(':')?;
        let ty = parse_type(tokens)?;
        fields.push(FieldDecl {
            name,
            ty,
            optional: false,
            span,
        });
        if !tokens.eat_punct(',') && !tokens.peek_punct('}') {
            return Err(tokens.unexpected("`,` or `}`"));
        }
    }
    Ok(fields)
}

fn parse_enum(tokens: &mut TokenStream, attributes: Vec<String>, span: Span) -> Result<TypeDecl> {
    let (name, _) = tokens.expect_ident()?;
    reject_generics(tokens, &name)?;
    tokens.expect_punct('{')?;

    let mut cases = Vec::new();
    while !tokens.eat_punct('}') {
        parse_attributes(tokens)?;
        let (case_name, case_span) = tokens.expect_ident()?;
        let payload = if tokens.peek_punct('(') {
            tokens.expect_punct('(')?;
            let mut types = Vec::new();
            while !tokens.eat_punct(')') {
                types.push(parse_type(tokens)?);
                if !tokens.eat_punct(',') && !tokens.peek_punct(')') {
                    return Err(tokens.unexpected("`,` or `)`"));
                }
            }
            if types.len() != 1 {
                return Err(AnalysisError::unsupported(
                    format!("tuple variant `{case_name}` with {} fields", types.len()),
                    case_span,
                ));
            }
            CasePayload::Type(types.remove(0))
        } else if tokens.peek_punct('{') {
            CasePayload::Record(parse_fields(tokens)?)
        } else {
            CasePayload::Unit
        };
        if tokens.peek_punct('=') {
            return Err(AnalysisError::unsupported(
                format!("explicit discriminant on `{case_name}`"),
                tokens.span(),
            ));
        }
        cases.push(CaseDecl {
            name: case_name,
            payload,
            span: case_span,
        });
        if !tokens.eat_punct(',') && !tokens.peek_punct('}') {
            return Err(tokens.unexpected("`,` or `}`"));
        }
    }

    Ok(TypeDecl {
        name,
        attributes,
        body: DeclBody::Variant(cases),
        span,
    })
}

fn parse_alias(tokens: &mut TokenStream, attributes: Vec<String>, span: Span) -> Result<TypeDecl> {
    let (name, _) = tokens.expect_ident()?;
    reject_generics(tokens, &name)?;
    tokens.expect_punct('=')?;
    let target = parse_type(tokens)?;
    tokens.expect_punct(';')?;
    Ok(TypeDecl {
        name,
        attributes,
        body: DeclBody::Alias(target),
        span,
    })
}

fn parse_type(tokens: &mut TokenStream) -> Result<TypeExpr> {
    parse_type_at(tokens, 1)
}

fn parse_type_at(tokens: &mut TokenStream, depth: usize) -> Result<TypeExpr> {
    let span = tokens.span();
    if depth > MAX_IR_DEPTH {
        return Err(AnalysisError::unsupported(
            format!("type expression nested more than {MAX_IR_DEPTH} levels deep"),
            span,
        ));
    }
    let rejected = match tokens.peek().map(|t| &t.kind) {
        Some(TokenKind::Punct('&')) => Some("reference type"),
        Some(TokenKind::Punct('*')) => Some("raw pointer"),
        Some(TokenKind::Punct('[')) => Some("array or slice type"),
        Some(TokenKind::Punct('!')) => Some("never type"),
        Some(TokenKind::Punct('(')) => {
            if matches!(tokens.peek_nth(1).map(|t| &t.kind), Some(TokenKind::Punct(')'))) {
                Some("unit type `()`")
            } else {
                Some("tuple type")
            }
        }
        Some(TokenKind::Quoted(_)) => Some("lifetime"),
        Some(TokenKind::Ident(w)) if w == "fn" => Some("function pointer"),
        Some(TokenKind::Ident(w)) if w == "dyn" || w == "impl" => Some("trait object"),
        _ => None,
    };
    if let Some(construct) = rejected {
        return Err(AnalysisError::unsupported(construct, span));
    }

    // Path: `a::b::C`, keep the last segment.
    if tokens.peek_punct(':') {
        tokens.expect_punct(':')?;
        tokens.expect_punct(':')?;
    }
    let (mut name, _) = tokens.expect_ident()?;
    while tokens.peek_punct(':') {
        tokens.expect_punct(':')?;
        tokens.expect_punct(':')?;
        name = tokens.expect_ident()?.0;
    }

    let mut args = Vec::new();
    if tokens.eat_punct('<') {
        while !tokens.eat_punct('>') {
            args.push(parse_type_at(tokens, depth + 1)?);
            if !tokens.eat_punct(',') && !tokens.peek_punct('>') {
                return Err(tokens.unexpected("`,` or `>`"));
            }
        }
    }

    Ok(TypeExpr { name, args, span })
}
