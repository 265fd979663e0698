//! Tokenizer shared by the analyzers.
//!
//! Both supported languages have C-like lexical structure for the subset we
//! read: identifiers, punctuation, line and (nestable) block comments, string
//! literals inside attributes and integer literals in discriminants.

use crate::error::{AnalysisError, Result};

/// A 1-based source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub line: u32,
    pub column: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Ident(String),
    /// A type variable such as `'a`; in Rust position, a lifetime.
    Quoted(String),
    Number(String),
    Str(String),
    Punct(char),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub span: Span,
}

/// Split `source` into tokens, dropping whitespace and comments.
pub fn tokenize(source: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    let mut line = 1u32;
    let mut column = 1u32;

    let advance = |i: &mut usize, line: &mut u32, column: &mut u32| {
        if chars[*i] == '\n' {
            *line += 1;
            *column = 1;
        } else {
            *column += 1;
        }
        *i += 1;
    };

    while i < chars.len() {
        let c = chars[i];
        let span = Span { line, column };

        if c.is_whitespace() {
            advance(&mut i, &mut line, &mut column);
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'/') {
            while i < chars.len() && chars[i] != '\n' {
                advance(&mut i, &mut line, &mut column);
            }
            continue;
        }

        if c == '/' && chars.get(i + 1) == Some(&'*') {
            let mut depth = 0usize;
            loop {
                if i >= chars.len() {
                    return Err(AnalysisError::malformed("unterminated block comment", span));
                }
                if chars[i] == '/' && chars.get(i + 1) == Some(&'*') {
                    depth += 1;
                    advance(&mut i, &mut line, &mut column);
                    advance(&mut i, &mut line, &mut column);
                } else if chars[i] == '*' && chars.get(i + 1) == Some(&'/') {
                    depth -= 1;
                    advance(&mut i, &mut line, &mut column);
                    advance(&mut i, &mut line, &mut column);
                    if depth == 0 {
                        break;
                    }
                } else {
                    advance(&mut i, &mut line, &mut column);
                }
            }
            continue;
        }

        if c == '"' {
            let mut text = String::new();
            advance(&mut i, &mut line, &mut column);
            loop {
                match chars.get(i) {
                    None => return Err(AnalysisError::malformed("unterminated string", span)),
                    Some('"') => {
                        advance(&mut i, &mut line, &mut column);
                        break;
                    }
                    Some('\\') if i + 1 < chars.len() => {
                        advance(&mut i, &mut line, &mut column);
                        text.push(chars[i]);
                        advance(&mut i, &mut line, &mut column);
                    }
                    Some(&ch) => {
                        text.push(ch);
                        advance(&mut i, &mut line, &mut column);
                    }
                }
            }
            tokens.push(Token {
                kind: TokenKind::Str(text),
                span,
            });
            continue;
        }

        if c == '\'' && chars.get(i + 1).is_some_and(|n| is_ident_start(*n)) {
            advance(&mut i, &mut line, &mut column);
            let name = take_while(&chars, &mut i, &mut column, is_ident_continue);
            tokens.push(Token {
                kind: TokenKind::Quoted(name),
                span,
            });
            continue;
        }

        if is_ident_start(c) {
            let name = take_while(&chars, &mut i, &mut column, is_ident_continue);
            tokens.push(Token {
                kind: TokenKind::Ident(name),
                span,
            });
            continue;
        }

        if c.is_ascii_digit() {
            let digits = take_while(&chars, &mut i, &mut column, |ch| {
                ch.is_ascii_alphanumeric() || ch == '_'
            });
            tokens.push(Token {
                kind: TokenKind::Number(digits),
                span,
            });
            continue;
        }

        if c.is_ascii_punctuation() {
            tokens.push(Token {
                kind: TokenKind::Punct(c),
                span,
            });
            advance(&mut i, &mut line, &mut column);
            continue;
        }

        return Err(AnalysisError::malformed(
            format!("unexpected character `{c}`"),
            span,
        ));
    }

    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Consume a run of non-newline characters matching `pred`.
fn take_while(chars: &[char], i: &mut usize, column: &mut u32, pred: impl Fn(char) -> bool) -> String {
    let start = *i;
    while *i < chars.len() && pred(chars[*i]) {
        *i += 1;
        *column += 1;
    }
    chars[start..*i].iter().collect()
}

/// A cursor over tokens with the small set of helpers the parsers need.
#[derive(Debug)]
pub struct TokenStream {
    tokens: Vec<Token>,
    pos: usize,
    end: Span,
}

impl TokenStream {
    pub fn new(source: &str) -> Result<Self> {
        let tokens = tokenize(source)?;
        let lines = source.lines().count().max(1);
        let last_len = source.lines().last().map_or(0, |l| l.chars().count());
        Ok(Self {
            tokens,
            pos: 0,
            end: Span {
                line: u32::try_from(lines).unwrap_or(u32::MAX),
                column: u32::try_from(last_len + 1).unwrap_or(u32::MAX),
            },
        })
    }

    pub fn is_at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    pub fn peek_nth(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    /// Span of the next token, or of the end of input.
    pub fn span(&self) -> Span {
        self.peek().map_or(self.end, |t| t.span)
    }

    pub fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    pub fn peek_punct(&self, c: char) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Punct(p), .. }) if *p == c)
    }

    pub fn peek_ident(&self, word: &str) -> bool {
        matches!(self.peek(), Some(Token { kind: TokenKind::Ident(w), .. }) if w == word)
    }

    /// Consume `c` if it is next.
    pub fn eat_punct(&mut self, c: char) -> bool {
        if self.peek_punct(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Consume the keyword `word` if it is next.
    pub fn eat_ident(&mut self, word: &str) -> bool {
        if self.peek_ident(word) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    pub fn expect_punct(&mut self, c: char) -> Result<Span> {
        let span = self.span();
        if self.eat_punct(c) {
            Ok(span)
        } else {
            Err(self.unexpected(&format!("`{c}`")))
        }
    }

    pub fn expect_ident(&mut self) -> Result<(String, Span)> {
        match self.peek() {
            Some(Token {
                kind: TokenKind::Ident(name),
                span,
            }) => {
                let out = (name.clone(), *span);
                self.pos += 1;
                Ok(out)
            }
            _ => Err(self.unexpected("an identifier")),
        }
    }

    /// A `MalformedSource` error describing the next token.
    pub fn unexpected(&self, expected: &str) -> AnalysisError {
        let found = match self.peek().map(|t| &t.kind) {
            None => "end of input".to_string(),
            Some(TokenKind::Ident(w)) => format!("`{w}`"),
            Some(TokenKind::Quoted(w)) => format!("`'{w}`"),
            Some(TokenKind::Number(n)) => format!("`{n}`"),
            Some(TokenKind::Str(s)) => format!("{s:?}"),
            Some(TokenKind::Punct(c)) => format!("`{c}`"),
        };
        AnalysisError::malformed(format!("expected {expected}, found {found}"), self.span())
    }

    /// Skip a balanced group opened by `open`, which must be the next token.
    /// Returns the tokens inside, flattened to text.
    pub fn skip_group(&mut self, open: char, close: char) -> Result<String> {
        let start = self.expect_punct(open)?;
        let mut depth = 1usize;
        let mut text = String::new();
        while let Some(token) = self.next() {
            match token.kind {
                TokenKind::Punct(c) if c == open => depth += 1,
                TokenKind::Punct(c) if c == close => {
                    depth -= 1;
                    if depth == 0 {
                        return Ok(text);
                    }
                }
                _ => {}
            }
            match token.kind {
                TokenKind::Ident(w) | TokenKind::Number(w) => text.push_str(&w),
                TokenKind::Quoted(w) => {
                    text.push('\'');
                    text.push_str(&w);
                }
                TokenKind::Str(s) => text.push_str(&format!("{s:?}")),
                TokenKind::Punct(c) => text.push(c),
            }
        }
        Err(AnalysisError::malformed(format!("unclosed `{open}`"), start))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn test_tokens_and_comments() {
        let tokens = kinds("/// doc\npub struct A { /* x /* nested */ */ id: i64 }");
        assert_eq!(
            tokens,
            vec![
                TokenKind::Ident("pub".into()),
                TokenKind::Ident("struct".into()),
                TokenKind::Ident("A".into()),
                TokenKind::Punct('{'),
                TokenKind::Ident("id".into()),
                TokenKind::Punct(':'),
                TokenKind::Ident("i64".into()),
                TokenKind::Punct('}'),
            ]
        );
    }

    #[test]
    fn test_spans() {
        let tokens = tokenize("type t =\n  int").unwrap();
        assert_eq!(tokens[3].span, Span { line: 2, column: 3 });
    }

    #[test]
    fn test_quoted_and_strings() {
        assert_eq!(
            kinds("'a \"x\\\"y\""),
            vec![TokenKind::Quoted("a".into()), TokenKind::Str("x\"y".into())]
        );
    }

    #[test]
    fn test_unterminated_comment() {
        assert!(matches!(
            tokenize("/* open"),
            Err(AnalysisError::MalformedSource { line: 1, column: 1, .. })
        ));
    }

    #[test]
    fn test_skip_group() {
        let mut stream = TokenStream::new("(C, align(8)) rest").unwrap();
        assert_eq!(stream.skip_group('(', ')').unwrap(), "C,align(8)");
        assert!(stream.peek_ident("rest"));
    }
}
