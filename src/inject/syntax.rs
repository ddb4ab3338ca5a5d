// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Lossless parsing of JSON with comments.
//!
//! Renovate configuration files are mostly plain JSON, but users routinely
//! sprinkle `//` and `/* */` comments into them, and leave trailing commas
//! behind. Running such a document through a generic parser and serializing
//! it back out would throw all of that away, along with the author's key
//! order and whitespace.
//!
//! Instead, this parser never builds a new document. It produces a tree of
//! byte spans pointing back into the original text: where each value starts
//! and ends, where each object key sits, and where each separating comma
//! was found. Callers edit the document by splicing new text into those
//! positions, leaving every other byte alone.
//!
//! # Accepted Syntax
//!
//! - Everything in RFC 8259.
//! - Line comments (`// ...`) and block comments (`/* ... */`).
//! - Trailing commas in objects and arrays.
//! - A leading UTF-8 byte order mark.
//!
//! String and number literals are validated through [`serde_json`], so
//! escape sequences and number grammar follow it exactly.

use serde::de::IgnoredAny;
use std::ops::Range;

/// Maximum nesting of objects and arrays before parsing gives up.
pub const MAX_DEPTH: usize = 128;

/// Parse JSON with comments into a span tree.
///
/// # Errors
///
/// - Return [`SyntaxError`] if the text is not a single valid value
///   surrounded by optional whitespace and comments.
pub fn parse(text: &str) -> Result<Node> {
    let mut parser = Parser::new(text);
    parser.skip_bom();
    parser.skip_trivia()?;
    let node = parser.value(0)?;
    parser.skip_trivia()?;

    if parser.pos < text.len() {
        return Err(parser.error_at(parser.pos, "unexpected trailing content after value"));
    }

    Ok(node)
}

/// Parsed value with its byte span in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node {
    /// Bytes covered by the value, brackets and quotes included.
    pub span: Range<usize>,

    /// What kind of value was parsed.
    pub kind: NodeKind,
}

/// Kinds of JSON values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    Object(Container<Member>),
    Array(Container<Node>),
    String(String),
    Number,
    Bool(bool),
    Null,
}

impl NodeKind {
    /// Human readable name of value kind for diagnostics.
    pub fn describe(&self) -> &'static str {
        match self {
            Self::Object(_) => "an object",
            Self::Array(_) => "an array",
            Self::String(_) => "a string",
            Self::Number => "a number",
            Self::Bool(_) => "a boolean",
            Self::Null => "null",
        }
    }
}

/// Items of an object or array along with their separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Container<T> {
    /// Items in source order.
    pub items: Vec<T>,

    /// Byte offsets of every comma between (or after) items.
    pub commas: Vec<usize>,
}

impl<T> Default for Container<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            commas: Vec::new(),
        }
    }
}

impl<T> Container<T> {
    /// Check if last item is followed by a comma.
    pub fn has_trailing_comma(&self) -> bool {
        !self.items.is_empty() && self.commas.len() == self.items.len()
    }
}

/// Object member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Member {
    /// Decoded key.
    pub key: String,

    /// Bytes covered by the quoted key.
    pub key_span: Range<usize>,

    /// Member value.
    pub value: Node,
}

/// Anything that occupies a stretch of the source text.
pub trait Spanned {
    /// First byte of the item.
    fn start(&self) -> usize;

    /// One past the last byte of the item.
    fn end(&self) -> usize;
}

impl Spanned for Node {
    fn start(&self) -> usize {
        self.span.start
    }

    fn end(&self) -> usize {
        self.span.end
    }
}

impl Spanned for Member {
    fn start(&self) -> usize {
        self.key_span.start
    }

    fn end(&self) -> usize {
        self.value.span.end
    }
}

struct Parser<'a> {
    text: &'a str,
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            bytes: text.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn skip_bom(&mut self) {
        if self.text.starts_with('\u{feff}') {
            self.pos = '\u{feff}'.len_utf8();
        }
    }

    fn skip_trivia(&mut self) -> Result<()> {
        loop {
            match self.peek() {
                Some(b' ' | b'\t' | b'\n' | b'\r') => self.pos += 1,
                Some(b'/') => match self.bytes.get(self.pos + 1).copied() {
                    Some(b'/') => {
                        self.pos = self.text[self.pos..]
                            .find('\n')
                            .map_or(self.text.len(), |offset| self.pos + offset);
                    }
                    Some(b'*') => match self.text[self.pos + 2..].find("*/") {
                        Some(offset) => self.pos += offset + 4,
                        None => return Err(self.error_at(self.pos, "unterminated block comment")),
                    },
                    _ => return Err(self.unexpected()),
                },
                _ => return Ok(()),
            }
        }
    }

    fn value(&mut self, depth: usize) -> Result<Node> {
        if depth >= MAX_DEPTH {
            return Err(self.error_at(self.pos, "values are nested too deeply"));
        }

        let start = self.pos;
        match self.peek() {
            Some(b'{') => self.object(depth),
            Some(b'[') => self.array(depth),
            Some(b'"') => {
                let value = self.string()?;
                Ok(Node {
                    span: start..self.pos,
                    kind: NodeKind::String(value),
                })
            }
            Some(b'-' | b'0'..=b'9') => self.number(),
            Some(byte) if byte.is_ascii_alphabetic() => self.literal(),
            _ => Err(self.unexpected()),
        }
    }

    fn object(&mut self, depth: usize) -> Result<Node> {
        let start = self.pos;
        self.pos += 1;
        let mut members = Container::default();

        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(b'}') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') if members.commas.len() < members.items.len() => {
                    members.commas.push(self.pos);
                    self.pos += 1;
                }
                Some(b'"') if members.commas.len() == members.items.len() => {
                    let key_start = self.pos;
                    let key = self.string()?;
                    let key_span = key_start..self.pos;

                    self.skip_trivia()?;
                    if self.peek() != Some(b':') {
                        return Err(self.error_at(self.pos, "expected ':' after object key"));
                    }
                    self.pos += 1;
                    self.skip_trivia()?;

                    let value = self.value(depth + 1)?;
                    members.items.push(Member {
                        key,
                        key_span,
                        value,
                    });
                }
                None => return Err(self.error_at(start, "unterminated object")),
                Some(_) if members.commas.len() < members.items.len() => {
                    return Err(self.error_at(self.pos, "expected ',' or '}' after object member"));
                }
                Some(_) => return Err(self.error_at(self.pos, "expected string key or '}'")),
            }
        }

        Ok(Node {
            span: start..self.pos,
            kind: NodeKind::Object(members),
        })
    }

    fn array(&mut self, depth: usize) -> Result<Node> {
        let start = self.pos;
        self.pos += 1;
        let mut elements = Container::default();

        loop {
            self.skip_trivia()?;
            match self.peek() {
                Some(b']') => {
                    self.pos += 1;
                    break;
                }
                Some(b',') if elements.commas.len() < elements.items.len() => {
                    elements.commas.push(self.pos);
                    self.pos += 1;
                }
                None => return Err(self.error_at(start, "unterminated array")),
                Some(_) if elements.commas.len() < elements.items.len() => {
                    return Err(self.error_at(self.pos, "expected ',' or ']' after array element"));
                }
                Some(_) => {
                    let element = self.value(depth + 1)?;
                    elements.items.push(element);
                }
            }
        }

        Ok(Node {
            span: start..self.pos,
            kind: NodeKind::Array(elements),
        })
    }

    fn string(&mut self) -> Result<String> {
        let start = self.pos;
        self.pos += 1;

        loop {
            match self.peek() {
                Some(b'"') => {
                    self.pos += 1;
                    break;
                }
                // INVARIANT: Escape itself is validated by serde_json below.
                Some(b'\\') => self.pos += 2,
                Some(byte) if byte < 0x20 => {
                    return Err(self.error_at(self.pos, "control character inside string"));
                }
                Some(_) => self.pos += 1,
                None => return Err(self.error_at(start, "unterminated string")),
            }
        }

        serde_json::from_str(&self.text[start..self.pos])
            .map_err(|err| self.error_at(start, format!("invalid string literal ({err})")))
    }

    fn number(&mut self) -> Result<Node> {
        let start = self.pos;
        while matches!(
            self.peek(),
            Some(b'-' | b'+' | b'.' | b'e' | b'E' | b'0'..=b'9')
        ) {
            self.pos += 1;
        }

        // INVARIANT: Validate grammar only, never range, so huge exponents pass.
        serde_json::from_str::<IgnoredAny>(&self.text[start..self.pos])
            .map_err(|err| self.error_at(start, format!("invalid number literal ({err})")))?;

        Ok(Node {
            span: start..self.pos,
            kind: NodeKind::Number,
        })
    }

    fn literal(&mut self) -> Result<Node> {
        let start = self.pos;
        while matches!(self.peek(), Some(byte) if byte.is_ascii_alphanumeric() || byte == b'_') {
            self.pos += 1;
        }

        let kind = match &self.text[start..self.pos] {
            "true" => NodeKind::Bool(true),
            "false" => NodeKind::Bool(false),
            "null" => NodeKind::Null,
            word => return Err(self.error_at(start, format!("unexpected token {word:?}"))),
        };

        Ok(Node {
            span: start..self.pos,
            kind,
        })
    }

    fn unexpected(&self) -> SyntaxError {
        match self.text.get(self.pos..).and_then(|rest| rest.chars().next()) {
            Some(ch) => self.error_at(self.pos, format!("unexpected character {ch:?}")),
            None => self.error_at(self.pos, "unexpected end of input"),
        }
    }

    fn error_at(&self, offset: usize, message: impl Into<String>) -> SyntaxError {
        let mut offset = offset.min(self.text.len());
        while !self.text.is_char_boundary(offset) {
            offset -= 1;
        }

        let before = &self.text[..offset];
        let line_start = before.rfind('\n').map_or(0, |newline| newline + 1);

        SyntaxError {
            line: before.matches('\n').count() + 1,
            column: before[line_start..].chars().count() + 1,
            message: message.into(),
        }
    }
}

/// Text is not valid JSON with comments.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}, column {column}: {message}")]
pub struct SyntaxError {
    /// Line of offending input, starting at one.
    pub line: usize,

    /// Column of offending input in characters, starting at one.
    pub column: usize,

    /// What went wrong.
    pub message: String,
}

/// Friendly result alias :3
pub type Result<T, E = SyntaxError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    fn object_members(node: &Node) -> &Container<Member> {
        match &node.kind {
            NodeKind::Object(members) => members,
            kind => panic!("expected object, found {}", kind.describe()),
        }
    }

    #[test]
    fn spans_point_back_into_source() -> anyhow::Result<()> {
        let text = r#"{"a": [1, "two"], "b": null}"#;
        let root = parse(text)?;
        let members = object_members(&root);

        assert_eq!(root.span, 0..text.len());
        assert_eq!(members.items.len(), 2);
        assert_eq!(members.commas, vec![16]);

        let first = &members.items[0];
        assert_eq!(first.key, "a");
        assert_eq!(&text[first.key_span.clone()], r#""a""#);
        assert_eq!(&text[first.value.span.clone()], r#"[1, "two"]"#);

        let second = &members.items[1];
        assert_eq!(&text[second.value.span.clone()], "null");
        assert_eq!(second.value.kind, NodeKind::Null);

        Ok(())
    }

    #[test]
    fn comments_and_trailing_commas_are_accepted() -> anyhow::Result<()> {
        let text = indoc! {r#"
            // leading comment
            {
              /* block */ "extends": [
                "config:recommended", // inline
              ],
            }
        "#};
        let root = parse(text)?;
        let members = object_members(&root);

        assert!(members.has_trailing_comma());
        match &members.items[0].value.kind {
            NodeKind::Array(elements) => {
                assert!(elements.has_trailing_comma());
                assert_eq!(
                    elements.items[0].kind,
                    NodeKind::String("config:recommended".into())
                );
            }
            kind => panic!("expected array, found {}", kind.describe()),
        }

        Ok(())
    }

    #[test]
    fn escapes_are_decoded() -> anyhow::Result<()> {
        let root = parse(r#"{"ext\u0065nds": "a\"b\\c"}"#)?;
        let member = &object_members(&root).items[0];

        assert_eq!(member.key, "extends");
        assert_eq!(member.value.kind, NodeKind::String(r#"a"b\c"#.into()));

        Ok(())
    }

    #[test]
    fn byte_order_mark_is_skipped() -> anyhow::Result<()> {
        let text = "\u{feff}{}";
        let root = parse(text)?;
        assert_eq!(root.span, 3..5);

        Ok(())
    }

    #[test]
    fn out_of_range_numbers_are_still_numbers() -> anyhow::Result<()> {
        let root = parse("[1e400, -0.5, 12]")?;
        match root.kind {
            NodeKind::Array(elements) => {
                assert!(elements.items.iter().all(|node| node.kind == NodeKind::Number));
            }
            kind => panic!("expected array, found {}", kind.describe()),
        }

        Ok(())
    }

    #[test]
    fn error_reports_line_and_column() {
        let result = parse("{\n  \"a\": tru\n}");
        let expect = SyntaxError {
            line: 2,
            column: 8,
            message: "unexpected token \"tru\"".into(),
        };
        assert_eq!(result, Err(expect));
    }

    #[test_case(""; "empty input")]
    #[test_case("{"; "unterminated object")]
    #[test_case("[1 2]"; "missing comma")]
    #[test_case("[,]"; "leading comma")]
    #[test_case("{\"a\" 1}"; "missing colon")]
    #[test_case("{a: 1}"; "unquoted key")]
    #[test_case("\"abc"; "unterminated string")]
    #[test_case("\"\\q\""; "bad escape")]
    #[test_case("01"; "leading zero")]
    #[test_case("+1"; "leading plus")]
    #[test_case("{} {}"; "trailing value")]
    #[test_case("{} /* open"; "unterminated comment")]
    #[test_case("{} / x"; "lone slash")]
    #[test]
    fn invalid_input_is_rejected(text: &str) {
        assert!(parse(text).is_err(), "{text:?} should not parse");
    }

    #[test]
    fn deep_nesting_is_rejected() {
        let text = format!("{}{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert!(parse(&text).is_err());

        let text = format!("{}{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse(&text).is_ok());
    }
}
