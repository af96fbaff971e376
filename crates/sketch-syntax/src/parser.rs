//! Error-tolerant parser producing a range-annotated value tree.
//!
//! The parser never fails: it always returns a [`Parse`] holding whatever
//! tree could be recovered plus the list of syntax errors encountered.

use text_size::{TextRange, TextSize};

use crate::lexer::{Lexer, Token, TokenKind};

/// Deepest object/array nesting the parser descends into.
pub const MAX_DEPTH: usize = 128;

/// A syntax error with the range it applies to.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct SyntaxError {
    /// Human readable description.
    pub message: String,
    /// Byte range in the source text.
    pub range: TextRange,
}

/// A parsed value together with its source range.
#[derive(Debug, Clone, PartialEq)]
pub struct Value {
    /// What kind of value this is.
    pub kind: ValueKind,
    /// The byte range of the whole value, including quotes and braces.
    pub range: TextRange,
}

/// The payload of a [`Value`].
#[derive(Debug, Clone, PartialEq)]
pub enum ValueKind {
    /// `{ ... }`
    Object(Vec<Member>),
    /// `[ ... ]`
    Array(Vec<Value>),
    /// Unescaped string contents.
    String(String),
    /// Number in its source spelling.
    Number(String),
    /// `true` / `false`
    Bool(bool),
    /// `null`
    Null,
}

/// An object member (`"key": value`).
#[derive(Debug, Clone, PartialEq)]
pub struct Member {
    /// Unescaped key.
    pub key: String,
    /// Range of the quoted key.
    pub key_range: TextRange,
    /// The value, absent when the source is missing it.
    pub value: Option<Value>,
    /// Range from the start of the key to the end of the value.
    pub range: TextRange,
}

impl Value {
    /// Returns the string contents if this is a string value.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            ValueKind::String(text) => Some(text),
            _ => None,
        }
    }

    /// Returns the members of an object, or an empty slice.
    #[must_use]
    pub fn members(&self) -> &[Member] {
        match &self.kind {
            ValueKind::Object(members) => members,
            _ => &[],
        }
    }

    /// Returns the member named `key`. Duplicate keys resolve to the last one.
    #[must_use]
    pub fn member(&self, key: &str) -> Option<&Member> {
        self.members().iter().rev().find(|member| member.key == key)
    }

    /// Returns the member whose text contains `offset` (end inclusive).
    #[must_use]
    pub fn member_at(&self, offset: TextSize) -> Option<&Member> {
        self.members()
            .iter()
            .find(|member| member.range.contains_inclusive(offset))
    }

    /// Follows a JSON-pointer style path of object keys and array indices.
    pub fn lookup<'a, I>(&self, segments: I) -> Option<&Value>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut current = self;
        for segment in segments {
            current = match &current.kind {
                ValueKind::Object(_) => current.member(segment)?.value.as_ref()?,
                ValueKind::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Converts the tree into a `serde_json::Value`.
    ///
    /// Members without a value are skipped; numbers that do not fit JSON's
    /// grammar become `null`.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match &self.kind {
            ValueKind::Object(members) => {
                let mut map = serde_json::Map::new();
                for member in members {
                    if let Some(value) = &member.value {
                        map.insert(member.key.clone(), value.to_json());
                    }
                }
                serde_json::Value::Object(map)
            }
            ValueKind::Array(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_json).collect())
            }
            ValueKind::String(text) => serde_json::Value::String(text.clone()),
            ValueKind::Number(text) => serde_json::from_str::<serde_json::Number>(text)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            ValueKind::Bool(value) => serde_json::Value::Bool(*value),
            ValueKind::Null => serde_json::Value::Null,
        }
    }
}

/// The result of parsing a document.
#[derive(Debug, Clone, PartialEq)]
pub struct Parse {
    root: Option<Value>,
    errors: Vec<SyntaxError>,
}

impl Parse {
    /// The top-level value, if any could be recovered.
    #[must_use]
    pub fn root(&self) -> Option<&Value> {
        self.root.as_ref()
    }

    /// Syntax errors in source order.
    #[must_use]
    pub fn errors(&self) -> &[SyntaxError] {
        &self.errors
    }

    /// Returns true when the document parsed without errors.
    #[must_use]
    pub fn ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Parses a document.
#[must_use]
pub fn parse(source: &str) -> Parse {
    let tokens = Lexer::new(source)
        .filter(|token| !token.kind.is_trivia())
        .collect();
    let mut parser = Parser {
        source,
        tokens,
        pos: 0,
        depth: 0,
        errors: Vec::new(),
    };

    let root = parser.parse_value();
    if let Some(extra) = parser.peek() {
        parser.error("unexpected content after the document", extra.range);
    }

    Parse {
        root,
        errors: parser.errors,
    }
}

struct Parser<'src> {
    source: &'src str,
    tokens: Vec<Token>,
    pos: usize,
    depth: usize,
    errors: Vec<SyntaxError>,
}

impl<'src> Parser<'src> {
    fn peek(&self) -> Option<Token> {
        self.tokens.get(self.pos).copied()
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.peek().is_some_and(|token| token.kind == kind)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.peek()?;
        self.pos += 1;
        Some(token)
    }

    fn text(&self, token: Token) -> &'src str {
        &self.source[usize::from(token.range.start())..usize::from(token.range.end())]
    }

    fn eof_range(&self) -> TextRange {
        let end = TextSize::of(self.source);
        TextRange::empty(end)
    }

    fn error(&mut self, message: impl Into<String>, range: TextRange) {
        self.errors.push(SyntaxError {
            message: message.into(),
            range,
        });
    }

    fn parse_value(&mut self) -> Option<Value> {
        let Some(token) = self.peek() else {
            let range = self.eof_range();
            self.error("expected a value", range);
            return None;
        };

        let kind = match token.kind {
            TokenKind::LBrace | TokenKind::LBracket if self.depth >= MAX_DEPTH => {
                self.error("nesting too deep", token.range);
                self.skip_nested();
                return None;
            }
            TokenKind::LBrace => {
                self.bump();
                self.depth += 1;
                let object = self.parse_object(token);
                self.depth -= 1;
                return Some(object);
            }
            TokenKind::LBracket => {
                self.bump();
                self.depth += 1;
                let array = self.parse_array(token);
                self.depth -= 1;
                return Some(array);
            }
            TokenKind::String => ValueKind::String(unescape(self.text(token))),
            TokenKind::Number => ValueKind::Number(self.text(token).to_string()),
            TokenKind::True => ValueKind::Bool(true),
            TokenKind::False => ValueKind::Bool(false),
            TokenKind::Null => ValueKind::Null,
            TokenKind::Error => {
                self.bump();
                let message = if self.text(token).starts_with('"') {
                    "unterminated string"
                } else {
                    "invalid token"
                };
                self.error(message, token.range);
                return None;
            }
            _ => {
                self.bump();
                self.error(
                    format!("expected a value, found `{}`", self.text(token)),
                    token.range,
                );
                return None;
            }
        };

        self.bump();
        Some(Value {
            kind,
            range: token.range,
        })
    }

    fn parse_object(&mut self, open: Token) -> Value {
        let mut members = Vec::new();

        let end = loop {
            let Some(token) = self.peek() else {
                let range = self.eof_range();
                self.error("expected `}`", range);
                break range.end();
            };

            match token.kind {
                TokenKind::RBrace => {
                    self.bump();
                    break token.range.end();
                }
                // Stray and trailing commas are tolerated.
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::String => {
                    let member = self.parse_member(token);
                    members.push(member);
                    self.expect_separator(TokenKind::RBrace);
                }
                _ => {
                    self.error("expected a property name", token.range);
                    self.recover(TokenKind::RBrace);
                }
            }
        };

        Value {
            kind: ValueKind::Object(members),
            range: TextRange::new(open.range.start(), end),
        }
    }

    fn parse_member(&mut self, key: Token) -> Member {
        self.bump();
        let key_text = unescape(self.text(key));

        if self.at(TokenKind::Colon) {
            self.bump();
        } else {
            let range = self.peek().map_or(self.eof_range(), |token| token.range);
            self.error("expected `:`", range);
        }

        let value = match self.peek() {
            Some(token) if matches!(token.kind, TokenKind::Comma | TokenKind::RBrace) => {
                self.error("expected a value", token.range);
                None
            }
            _ => self.parse_value(),
        };

        let end = value
            .as_ref()
            .map_or(key.range.end(), |value| value.range.end());

        Member {
            key: key_text,
            key_range: key.range,
            value,
            range: TextRange::new(key.range.start(), end),
        }
    }

    fn parse_array(&mut self, open: Token) -> Value {
        let mut items = Vec::new();

        let end = loop {
            let Some(token) = self.peek() else {
                let range = self.eof_range();
                self.error("expected `]`", range);
                break range.end();
            };

            match token.kind {
                TokenKind::RBracket => {
                    self.bump();
                    break token.range.end();
                }
                TokenKind::Comma => {
                    self.bump();
                }
                TokenKind::RBrace => {
                    self.error("expected `]`", token.range);
                    break token.range.start();
                }
                _ => {
                    if let Some(item) = self.parse_value() {
                        items.push(item);
                    }
                    self.expect_separator(TokenKind::RBracket);
                }
            }
        };

        Value {
            kind: ValueKind::Array(items),
            range: TextRange::new(open.range.start(), end),
        }
    }

    /// After an element: accept `,` or the closing token, report anything else.
    fn expect_separator(&mut self, close: TokenKind) {
        match self.peek() {
            Some(token) if token.kind == TokenKind::Comma => {
                self.bump();
            }
            Some(token) if token.kind == close => {}
            Some(token) => self.error("expected `,`", token.range),
            None => {}
        }
    }

    /// Skips an object or array without descending into it, up to and
    /// including its matching close token (or the end of input).
    fn skip_nested(&mut self) {
        let mut level = 0usize;
        while let Some(token) = self.bump() {
            match token.kind {
                TokenKind::LBrace | TokenKind::LBracket => level += 1,
                TokenKind::RBrace | TokenKind::RBracket => {
                    level = level.saturating_sub(1);
                    if level == 0 {
                        break;
                    }
                }
                _ => {}
            }
        }
    }

    /// Skips tokens up to (not including) the next `,` or `close`.
    fn recover(&mut self, close: TokenKind) {
        self.bump();
        while let Some(token) = self.peek() {
            if token.kind == TokenKind::Comma || token.kind == close {
                break;
            }
            self.bump();
        }
    }
}

fn unescape(raw: &str) -> String {
    let inner = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let decoded = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .unwrap_or(char::REPLACEMENT_CHARACTER);
                out.push(decoded);
            }
            Some(other) => out.push(other),
            None => {}
        }
    }

    out
}
