//! ReScript analyzer.
//!
//! Reads `type` declarations (records with optional fields, variants with
//! unit, single-argument or inline-record constructors, aliases) joined by
//! `and`. How ints and strings are stored is a property of the compilation
//! target, so it is configured rather than inferred.

use serde::{Deserialize, Serialize};
use transit_core::{LanguageTag, ScalarRepr, MAX_IR_DEPTH};

use crate::error::{AnalysisError, Result};
use crate::lexer::{TokenKind, TokenStream};
use crate::lower::{lower_root, Builtin, TypeMapper};
use crate::traits::{
    Analyzer, CaseDecl, CasePayload, DeclBody, FieldDecl, Lowered, TypeDecl, TypeExpr,
};

/// Storage of ReScript's `int`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntRepr {
    /// 32-bit two's complement, as on the JavaScript target (`x | 0`).
    Int32,
    /// A double holding integers up to 2^53.
    SafeInteger,
    /// Full 64-bit integers.
    Int64,
}

/// Storage of ReScript's `string`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringRepr {
    Utf16,
    Utf8,
}

/// Platform model for ReScript sources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReScriptConfig {
    pub int_repr: IntRepr,
    pub string_repr: StringRepr,
    /// Whether UTF-16 strings may contain lone surrogates, as JavaScript
    /// strings can.
    pub lone_surrogates: bool,
    /// Whether records and variants have a fixed C-compatible layout on the
    /// target.
    pub abi_stable: bool,
}

impl Default for ReScriptConfig {
    fn default() -> Self {
        Self {
            int_repr: IntRepr::Int32,
            string_repr: StringRepr::Utf16,
            lone_surrogates: false,
            abi_stable: false,
        }
    }
}

impl ReScriptConfig {
    fn int_scalar(&self) -> ScalarRepr {
        match self.int_repr {
            IntRepr::Int32 => ScalarRepr::I32,
            IntRepr::SafeInteger => ScalarRepr::SafeInteger,
            IntRepr::Int64 => ScalarRepr::I64,
        }
    }

    fn string_scalar(&self) -> ScalarRepr {
        match self.string_repr {
            StringRepr::Utf16 => ScalarRepr::Utf16 {
                lone_surrogates: self.lone_surrogates,
            },
            StringRepr::Utf8 => ScalarRepr::Utf8,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReScriptAnalyzer {
    config: ReScriptConfig,
}

impl ReScriptAnalyzer {
    pub fn new(config: ReScriptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReScriptConfig {
        &self.config
    }
}

impl Analyzer for ReScriptAnalyzer {
    fn language(&self) -> LanguageTag {
        LanguageTag::new("rescript")
    }

    fn parse(&self, source: &str) -> Result<Vec<TypeDecl>> {
        let mut tokens = TokenStream::new(source)?;
        let mut decls = Vec::new();
        while !tokens.is_at_end() {
            if tokens.peek_punct('@') {
                let span = tokens.span();
                tokens.expect_punct('@')?;
                let (name, _) = tokens.expect_ident()?;
                return Err(AnalysisError::unsupported(format!("attribute `@{name}`"), span));
            }
            let (keyword, span) = tokens.expect_ident()?;
            match keyword.as_str() {
                "type" => {
                    tokens.eat_ident("rec");
                    decls.push(parse_decl(&mut tokens)?);
                    while tokens.eat_ident("and") {
                        decls.push(parse_decl(&mut tokens)?);
                    }
                }
                "let" | "module" | "open" | "external" | "include" | "exception" => {
                    return Err(AnalysisError::unsupported(
                        format!("`{keyword}` declaration"),
                        span,
                    ))
                }
                other => {
                    return Err(AnalysisError::malformed(
                        format!("expected `type`, found `{other}`"),
                        span,
                    ))
                }
            }
        }
        Ok(decls)
    }

    fn lower(&self, decls: &[TypeDecl], root: &str) -> Result<Lowered> {
        lower_root(decls, root, self)
    }
}

impl TypeMapper for ReScriptAnalyzer {
    fn builtin(&self, expr: &TypeExpr) -> Result<Option<Builtin>> {
        let builtin = match expr.name.as_str() {
            "int" => Builtin::Scalar(self.config.int_scalar()),
            "float" => Builtin::Scalar(ScalarRepr::F64),
            "string" => Builtin::Scalar(self.config.string_scalar()),
            "bool" => Builtin::Scalar(ScalarRepr::Bool),
            "array" | "list" | "Array.t" | "List.t" => Builtin::List,
            "option" | "Option.t" => Builtin::Optional,
            "dict" | "Dict.t" | "Js.Dict.t" => Builtin::StringKeyedMap(self.config.string_scalar()),
            "unit" | "char" | "bigint" | "promise" | "Js.Json.t" => {
                return Err(AnalysisError::unsupported(
                    format!("`{}`", expr.name),
                    expr.span,
                ))
            }
            _ => return Ok(None),
        };
        Ok(Some(builtin))
    }

    fn layout_stable(&self, _decl: &TypeDecl) -> bool {
        self.config.abi_stable
    }
}

/// `name = body`
fn parse_decl(tokens: &mut TokenStream) -> Result<TypeDecl> {
    let (name, span) = tokens.expect_ident()?;
    if tokens.peek_punct('<') {
        return Err(AnalysisError::unsupported(
            format!("type parameters on `{name}`"),
            tokens.span(),
        ));
    }
    if tokens.peek_punct(';') || tokens.peek_ident("and") || tokens.peek_ident("type") || tokens.is_at_end() {
        return Err(AnalysisError::unsupported(
            format!("abstract type `{name}`"),
            span,
        ));
    }
    tokens.expect_punct('=')?;
    let body = parse_body(tokens)?;
    tokens.eat_punct(';');
    Ok(TypeDecl {
        name,
        attributes: Vec::new(),
        body,
        span,
    })
}

fn parse_body(tokens: &mut TokenStream) -> Result<DeclBody> {
    if tokens.peek_punct('{') {
        return Ok(DeclBody::Record(parse_record(tokens)?));
    }
    if tokens.peek_punct('|') || starts_constructor(tokens) {
        return Ok(DeclBody::Variant(parse_variant(tokens)?));
    }
    Ok(DeclBody::Alias(parse_type(tokens)?))
}

/// An uppercase identifier not followed by `.` (a module path).
fn starts_constructor(tokens: &TokenStream) -> bool {
    let upper = matches!(
        tokens.peek().map(|t| &t.kind),
        Some(TokenKind::Ident(w)) if w.starts_with(|c: char| c.is_uppercase())
    );
    let dotted = matches!(tokens.peek_nth(1).map(|t| &t.kind), Some(TokenKind::Punct('.')));
    upper && !dotted
}

/// `{ name: type, name?: type, ... }`
fn parse_record(tokens: &mut TokenStream) -> Result<Vec<FieldDecl>> {
    tokens.expect_punct('{')?;
    let mut fields = Vec::new();
    while !tokens.eat_punct('}') {
        let span = tokens.span();
        match tokens.peek().map(|t| &t.kind) {
            Some(TokenKind::Str(_)) => return Err(AnalysisError::unsupported("object type", span)),
            Some(TokenKind::Punct('.')) => {
                return Err(AnalysisError::unsupported("record spread", span))
            }
            Some(TokenKind::Punct('@')) => {
                return Err(AnalysisError::unsupported("field attribute", span))
            }
            _ => {}
        }
        tokens.eat_ident("mutable");
        let (name, span) = tokens.expect_ident()?;
        let optional = tokens.eat_punct('?');
        tokens.expect_punct(':')?;
        let ty = parse_type(tokens)?;
        fields.push(FieldDecl {
            name,
            ty,
            optional,
            span,
        });
        if !tokens.eat_punct(',') && !tokens.peek_punct('}') {
            return Err(tokens.unexpected("`,` or `}`"));
        }
    }
    Ok(fields)
}

/// `| A | B(type) | C({...})`
fn parse_variant(tokens: &mut TokenStream) -> Result<Vec<CaseDecl>> {
    let mut cases = Vec::new();
    tokens.eat_punct('|');
    loop {
        if tokens.peek_punct('#') {
            return Err(AnalysisError::unsupported("polymorphic variant", tokens.span()));
        }
        let (name, span) = tokens.expect_ident()?;
        let payload = if tokens.eat_punct('(') {
            let payload = if tokens.peek_punct('{') {
                CasePayload::Record(parse_record(tokens)?)
            } else {
                CasePayload::Type(parse_type(tokens)?)
            };
            if tokens.peek_punct(',') {
                return Err(AnalysisError::unsupported(
                    format!("multi-argument constructor `{name}`"),
                    span,
                ));
            }
            tokens.expect_punct(')')?;
            payload
        } else {
            CasePayload::Unit
        };
        cases.push(CaseDecl {
            name,
            payload,
            span,
        });
        if !tokens.eat_punct('|') {
            break;
        }
    }
    Ok(cases)
}

/// `name`, `Mod.name`, `name<arg, ...>`
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
        Some(TokenKind::Quoted(v)) => Some(format!("type variable `'{v}`")),
        Some(TokenKind::Punct('(')) => Some("tuple or function type".to_string()),
        Some(TokenKind::Punct('[')) => Some("polymorphic variant".to_string()),
        Some(TokenKind::Punct('{')) => Some("inline record outside a constructor".to_string()),
        _ => None,
    };
    if let Some(construct) = rejected {
        return Err(AnalysisError::unsupported(construct, span));
    }

    let (mut name, _) = tokens.expect_ident()?;
    while tokens.eat_punct('.') {
        let (segment, _) = tokens.expect_ident()?;
        name.push('.');
        name.push_str(&segment);
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

    if tokens.peek_punct('=') && matches!(tokens.peek_nth(1).map(|t| &t.kind), Some(TokenKind::Punct('>'))) {
        return Err(AnalysisError::unsupported("function type", tokens.span()));
    }

    Ok(TypeExpr { name, args, span })
}

#[cfg(test)]
mod tests {
    use super::*;
    use transit_core::{IrType, Repr};

    const USER: &str = r#"
        // A user account.
        type user = {
          id: int,
          name: string,
          email: string,
          active: bool,
        }
    "#;

    fn user_ir() -> IrType {
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

    #[test]
    fn test_user_record_matches_rust_ir() {
        let analysis = ReScriptAnalyzer::default().analyze(USER).unwrap();
        assert_eq!(analysis.ir, user_ir());
        assert_eq!(analysis.descriptor.type_name(), "user");

        let layout = analysis.descriptor.layout();
        assert!(!layout.abi_stable);
        assert_eq!(layout.fields[0].size, 4);
        assert_eq!(layout.fields[0].encoding, "i32");
        assert_eq!(layout.fields[1].encoding, "utf16");
    }

    #[test]
    fn test_configured_platform_model() {
        let analyzer = ReScriptAnalyzer::new(ReScriptConfig {
            int_repr: IntRepr::SafeInteger,
            string_repr: StringRepr::Utf8,
            lone_surrogates: false,
            abi_stable: true,
        });
        let analysis = analyzer.analyze(USER).unwrap();
        let layout = analysis.descriptor.layout();
        assert!(layout.abi_stable);
        assert_eq!(layout.size, 48);
        assert_eq!(layout.fields[0].size, 8);
        assert_eq!(layout.fields[0].encoding, "f64-safe-int");
    }

    #[test]
    fn test_variants_options_and_and_chains() {
        let source = r#"
            type rec profile = {
              user: user,
              nickname?: string,
              shape: shape,
              tags: array<string>,
              meta: Js.Dict.t<float>,
            }
            and user = { id: int }
            and shape =
              | Empty
              | Circle(float)
              | Rect({width: float, height: float})
        "#;
        let analysis = ReScriptAnalyzer::default().analyze(source).unwrap();
        let IrType::Record { name, fields } = &analysis.ir else {
            panic!("expected record");
        };
        assert_eq!(name, "Profile");
        assert_eq!(fields[0].ty, IrType::record("User", [("id", IrType::int64())]));
        assert_eq!(fields[1].ty, IrType::optional(IrType::string()));
        assert_eq!(
            fields[2].ty,
            IrType::variant(
                "Shape",
                [
                    ("Empty", None),
                    ("Circle", Some(IrType::float64())),
                    (
                        "Rect",
                        Some(IrType::record(
                            "ShapeRect",
                            [("width", IrType::float64()), ("height", IrType::float64())],
                        )),
                    ),
                ],
            )
        );
        assert_eq!(fields[3].ty, IrType::list(IrType::string()));
        assert_eq!(fields[4].ty, IrType::map(IrType::string(), IrType::float64()));

        let Repr::Record(reprs) = analysis.descriptor.repr() else {
            panic!("expected record repr");
        };
        assert_eq!(
            reprs[1],
            Repr::Optional(Box::new(Repr::Scalar(ScalarRepr::Utf16 {
                lone_surrogates: false
            })))
        );
    }

    #[test]
    fn test_camel_case_fields_are_normalized() {
        let analysis = ReScriptAnalyzer::default()
            .analyze("type event = { createdAt: float, userID: int, httpServer: string }")
            .unwrap();
        assert_eq!(
            analysis.ir,
            IrType::record(
                "Event",
                [
                    ("created_at", IrType::float64()),
                    ("user_id", IrType::int64()),
                    ("http_server", IrType::string()),
                ],
            )
        );
    }

    #[test]
    fn test_analysis_is_deterministic() {
        let analyzer = ReScriptAnalyzer::default();
        assert_eq!(analyzer.analyze(USER).unwrap(), analyzer.analyze(USER).unwrap());
    }

    fn unsupported(source: &str) -> String {
        match ReScriptAnalyzer::default().analyze(source) {
            Err(AnalysisError::UnsupportedConstruct { construct, .. }) => construct,
            other => panic!("expected unsupported construct, got {other:?}"),
        }
    }

    #[test]
    fn test_rejects_constructs_without_ir_counterpart() {
        assert!(unsupported("type t<'a> = { x: 'a }").contains("type parameters"));
        assert!(unsupported("@genType type t = { x: int }").contains("@genType"));
        assert!(unsupported("type t = A(int, string)").contains("multi-argument"));
        assert!(unsupported("type t = [#red | #blue]").contains("polymorphic"));
        assert!(unsupported("type t = {\"name\": string}").contains("object"));
        assert!(unsupported("type t = { x: (int, int) }").contains("tuple"));
        assert!(unsupported("type t = { x: uuid }").contains("unknown type `uuid`"));
        assert!(unsupported("type t = { f: int => int }").contains("function"));
        assert!(unsupported("let x = 1").contains("`let`"));
        assert!(unsupported("type t = { x: unit }").contains("unit"));
    }

    #[test]
    fn test_deep_nesting_is_rejected_not_overflowed() {
        let levels = 200_000;
        let source = format!("type t = {{ x: {}int{} }}", "array<".repeat(levels), ">".repeat(levels));
        assert!(unsupported(&source).contains("nested more than 64 levels"));
    }

    #[test]
    fn test_malformed_source() {
        assert!(matches!(
            ReScriptAnalyzer::default().analyze("type t = { x int }"),
            Err(AnalysisError::MalformedSource { .. })
        ));
    }

    #[test]
    fn test_config_from_json() {
        let config: ReScriptConfig =
            serde_json::from_str(r#"{"int_repr": "safe_integer", "lone_surrogates": true}"#).unwrap();
        assert_eq!(config.int_repr, IntRepr::SafeInteger);
        assert_eq!(config.string_repr, StringRepr::Utf16);
        assert!(config.lone_surrogates);
        assert!(!config.abi_stable);
    }

    mod props {
        use super::*;
        use proptest::prelude::*;

        const KEYWORDS: &[&str] = &[
            "and", "else", "exception", "external", "false", "if", "include", "let", "module",
            "mutable", "open", "rec", "switch", "true", "type",
        ];

        fn field_name() -> impl Strategy<Value = String> {
            "[a-z]{1,8}".prop_filter("keyword", |n| !KEYWORDS.contains(&n.as_str()))
        }

        fn field_types() -> impl Strategy<Value = &'static str> {
            prop::sample::select(vec!["int", "float", "string", "bool", "array<int>", "option<string>"])
        }

        proptest! {
            #[test]
            fn test_analysis_is_deterministic(
                fields in prop::collection::btree_map(field_name(), field_types(), 1..6)
            ) {
                let body: Vec<String> = fields.iter().map(|(n, t)| format!("{n}: {t}")).collect();
                let source = format!("type row = {{ {} }}", body.join(", "));
                let analyzer = ReScriptAnalyzer::default();
                let a = analyzer.analyze(&source);
                let b = analyzer.analyze(&source);
                prop_assert_eq!(&a, &b);
                let IrType::Record { fields: ir_fields, .. } = a.unwrap().ir else {
                    panic!("expected record");
                };
                prop_assert_eq!(ir_fields.len(), fields.len());
            }
        }
    }
}
