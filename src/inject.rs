// SPDX-FileCopyrightText: 2025 Jason Pena <jasonpena@awkless.com>
// SPDX-License-Identifier: MIT

//! Preset injection.
//!
//! Add a preset reference to the `extends` array of a Renovate configuration
//! document without disturbing anything else in it.
//!
//! # Idempotence
//!
//! Injection is a no-op when the reference is already listed. Running it a
//! second time on its own output never produces a duplicate entry, and hands
//! back the exact text it was given.
//!
//! # Formatting
//!
//! The document is never re-serialized. Instead, it is parsed into a span
//! tree (see [`syntax`]) and the new entry is spliced into the original
//! text. Comments, key order, whitespace, trailing commas, and line endings
//! outside the inserted text stay byte-for-byte identical. The inserted text
//! itself mimics its surroundings: inline containers get an inline entry,
//! multi-line containers get a new line indented like its siblings.

pub mod syntax;

use crate::inject::syntax::{Container, Member, Node, NodeKind, Spanned};

pub use crate::inject::syntax::SyntaxError;

use std::ops::Range;
use tracing::{debug, instrument};

/// Name of the array that lists preset references.
pub const EXTENDS_KEY: &str = "extends";

/// Result of injecting a preset reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Injection {
    /// Document text after injection.
    pub text: String,

    /// Whether the text differs from the input.
    pub changed: bool,
}

/// Add preset reference to the `extends` array of a configuration document.
///
/// Creates the `extends` array as the last member of the top-level object if
/// it does not exist yet. Appends the reference to the end of the array
/// otherwise, unless it is already listed, in which case the original text
/// is returned untouched.
///
/// # Errors
///
/// - Return [`InjectError::EmptyReference`] if the reference is empty.
/// - Return [`InjectError::Parse`] if the document is not valid JSON with
///   comments.
/// - Return [`InjectError::Format`] if the document is not an object, or its
///   `extends` member is anything other than one array of strings.
#[instrument(skip(text), level = "debug")]
pub fn inject(text: &str, reference: &str) -> Result<Injection> {
    if reference.is_empty() {
        return Err(InjectError::EmptyReference);
    }

    let root = syntax::parse(text)?;
    let NodeKind::Object(members) = &root.kind else {
        return Err(FormatError::NotAnObject {
            found: root.kind.describe(),
        }
        .into());
    };

    let layout = Layout::detect(text);
    let mut extends = members.items.iter().filter(|member| member.key == EXTENDS_KEY);
    let edits = match (extends.next(), extends.next()) {
        (Some(_), Some(_)) => return Err(FormatError::DuplicateExtends.into()),
        (Some(member), None) => {
            let entries = extends_entries(&member.value)?;
            let listed = entries
                .items
                .iter()
                .any(|entry| matches!(&entry.kind, NodeKind::String(value) if value == reference));
            if listed {
                debug!("{reference:?} already listed in {EXTENDS_KEY:?}");
                return Ok(Injection {
                    text: text.to_owned(),
                    changed: false,
                });
            }

            debug!("append {reference:?} to existing {EXTENDS_KEY:?}");
            layout.append(&member.value.span, entries, &quote(reference))
        }
        (None, _) => {
            debug!("create {EXTENDS_KEY:?} with {reference:?}");
            let entry = format!(
                "{}{}[{}]",
                quote(EXTENDS_KEY),
                key_separator(text, members),
                quote(reference)
            );
            layout.append(&root.span, members, &entry)
        }
    };

    Ok(Injection {
        text: apply(text, edits),
        changed: true,
    })
}

/// Detect indentation unit used by a document.
///
/// Takes the leading whitespace of the first indented line. Any tab in it
/// means the document is tab indented. Falls back to two spaces when nothing
/// is indented.
pub fn detect_indentation(text: &str) -> String {
    text.lines()
        .skip(1)
        .map(|line| &line[..line.len() - line.trim_start_matches([' ', '\t']).len()])
        .find(|indent| !indent.is_empty())
        .map_or_else(
            || "  ".to_owned(),
            |indent| {
                if indent.contains('\t') {
                    "\t".to_owned()
                } else {
                    indent.to_owned()
                }
            },
        )
}

fn extends_entries(node: &Node) -> Result<&Container<Node>> {
    let NodeKind::Array(entries) = &node.kind else {
        return Err(FormatError::ExtendsNotArray {
            found: node.kind.describe(),
        }
        .into());
    };

    let invalid = entries
        .items
        .iter()
        .enumerate()
        .find(|(_, entry)| !matches!(entry.kind, NodeKind::String(_)));
    if let Some((index, entry)) = invalid {
        return Err(FormatError::ExtendsEntryNotString {
            index,
            found: entry.kind.describe(),
        }
        .into());
    }

    Ok(entries)
}

fn quote(value: &str) -> String {
    serde_json::Value::from(value).to_string()
}

// Reuse whatever sits between the first key and its value, e.g. ": " or ":".
fn key_separator<'t>(text: &'t str, members: &Container<Member>) -> &'t str {
    members
        .items
        .first()
        .map(|member| &text[member.key_span.end..member.value.span.start])
        .filter(|separator| !separator.contains(['/', '\n']))
        .unwrap_or(": ")
}

/// Replacement of a byte range in the source text.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Edit {
    range: Range<usize>,
    insert: String,
}

impl Edit {
    fn insert(at: usize, insert: impl Into<String>) -> Self {
        Self {
            range: at..at,
            insert: insert.into(),
        }
    }

    fn replace(range: Range<usize>, insert: impl Into<String>) -> Self {
        Self {
            range,
            insert: insert.into(),
        }
    }
}

fn apply(text: &str, mut edits: Vec<Edit>) -> String {
    // INVARIANT: Stable sort keeps edits at the same offset in push order.
    edits.sort_by_key(|edit| edit.range.start);

    let grown = edits.iter().map(|edit| edit.insert.len()).sum::<usize>();
    let mut out = String::with_capacity(text.len() + grown);
    let mut cursor = 0;
    for edit in edits {
        out.push_str(&text[cursor..edit.range.start]);
        out.push_str(&edit.insert);
        cursor = edit.range.end;
    }
    out.push_str(&text[cursor..]);

    out
}

/// Formatting conventions of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Layout<'t> {
    text: &'t str,
    newline: &'static str,
    unit: String,
}

impl<'t> Layout<'t> {
    fn detect(text: &'t str) -> Self {
        Self {
            text,
            newline: if text.contains("\r\n") { "\r\n" } else { "\n" },
            unit: detect_indentation(text),
        }
    }

    /// Plan edits that append an entry as the last item of a container.
    fn append<T: Spanned>(
        &self,
        span: &Range<usize>,
        container: &Container<T>,
        entry: &str,
    ) -> Vec<Edit> {
        let open = span.start;
        let close = span.end - 1;
        let multiline = self.text[open..close].contains('\n');
        let nl = self.newline;

        let Some(last) = container.items.last() else {
            return self.fill_empty(open, close, multiline, entry);
        };

        match (multiline, container.commas.last()) {
            (true, Some(&comma)) if container.has_trailing_comma() => {
                let indent = line_indent(self.text, last.start());
                vec![Edit::insert(
                    self.line_end(comma + 1),
                    format!("{nl}{indent}{entry},"),
                )]
            }
            (true, _) => {
                let indent = line_indent(self.text, last.start());
                vec![
                    Edit::insert(last.end(), ","),
                    Edit::insert(self.line_end(last.end()), format!("{nl}{indent}{entry}")),
                ]
            }
            (false, Some(&comma)) if container.has_trailing_comma() => {
                let space = inline_space(self.text, container);
                vec![Edit::insert(comma + 1, format!("{space}{entry},"))]
            }
            (false, _) => {
                let space = inline_space(self.text, container);
                vec![Edit::insert(last.end(), format!(",{space}{entry}"))]
            }
        }
    }

    fn fill_empty(&self, open: usize, close: usize, multiline: bool, entry: &str) -> Vec<Edit> {
        let inner = &self.text[open + 1..close];
        let blank = inner.trim().is_empty();

        if !multiline {
            return if blank {
                vec![Edit::replace(open + 1..close, entry)]
            } else {
                vec![Edit::insert(close, entry)]
            };
        }

        let nl = self.newline;
        let outer = line_indent(self.text, open);
        let unit = &self.unit;
        if blank {
            return vec![Edit::replace(
                open + 1..close,
                format!("{nl}{outer}{unit}{entry}{nl}{outer}"),
            )];
        }

        // INVARIANT: Only comments are inside, so keep them above the new entry.
        let line_start = self.text[..close].rfind('\n').map_or(0, |newline| newline + 1);
        if self.text[line_start..close].trim().is_empty() {
            vec![Edit::insert(line_start, format!("{outer}{unit}{entry}{nl}"))]
        } else {
            vec![Edit::insert(close, entry)]
        }
    }

    /// End of line after an item, skipping trailing whitespace and comments.
    ///
    /// Returns `pos` itself if anything other than whitespace or comments
    /// follows on the same line.
    fn line_end(&self, pos: usize) -> usize {
        let bytes = self.text.as_bytes();
        let mut cursor = pos;

        loop {
            match (bytes.get(cursor).copied(), bytes.get(cursor + 1).copied()) {
                (Some(b' ' | b'\t'), _) => cursor += 1,
                (Some(b'\n'), _) | (Some(b'\r'), Some(b'\n')) => return cursor,
                (Some(b'/'), Some(b'/')) => {
                    let end = self.text[cursor..]
                        .find('\n')
                        .map_or(self.text.len(), |offset| cursor + offset);
                    return if bytes[end - 1] == b'\r' { end - 1 } else { end };
                }
                (Some(b'/'), Some(b'*')) => match self.text[cursor + 2..].find("*/") {
                    Some(offset) if !self.text[cursor..cursor + offset + 2].contains('\n') => {
                        cursor += offset + 4;
                    }
                    _ => return pos,
                },
                _ => return pos,
            }
        }
    }
}

// Whitespace after separating commas of an inline container.
fn inline_space<T>(text: &str, container: &Container<T>) -> &'static str {
    let separating = container.items.len().saturating_sub(1);
    match container.commas[..separating.min(container.commas.len())]
        .first()
        .and_then(|&comma| text.as_bytes().get(comma + 1).copied())
    {
        Some(b' ' | b'\t') | None => " ",
        Some(_) => "",
    }
}

fn line_indent(text: &str, pos: usize) -> &str {
    let line_start = text[..pos].rfind('\n').map_or(0, |newline| newline + 1);
    let line = &text[line_start..pos];
    &line[..line.len() - line.trim_start_matches([' ', '\t']).len()]
}

/// Document parses, but does not have the shape of a Renovate configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// Top-level value is not an object.
    #[error("top-level value must be an object, found {found}")]
    NotAnObject { found: &'static str },

    /// Member `extends` is not an array.
    #[error("\"extends\" must be an array of strings, found {found}")]
    ExtendsNotArray { found: &'static str },

    /// Member `extends` holds something other than a string.
    #[error("\"extends\" entry {index} must be a string, found {found}")]
    ExtendsEntryNotString { index: usize, found: &'static str },

    /// Member `extends` appears more than once.
    #[error("\"extends\" is defined more than once")]
    DuplicateExtends,
}

/// Preset injection error types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InjectError {
    /// Document is not valid JSON with comments.
    #[error("invalid JSON at {0}")]
    Parse(#[from] SyntaxError),

    /// Document has an unexpected structure.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// Preset reference to inject is empty.
    #[error("preset reference cannot be empty")]
    EmptyReference,
}

/// Friendly result alias :3
type Result<T, E = InjectError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use simple_test_case::test_case;

    const BASE: &str = "github>lewtec/renovate-config:base";

    fn extends_of(text: &str) -> Vec<String> {
        let value: serde_json::Value = serde_json::from_str(text).unwrap();
        value[EXTENDS_KEY]
            .as_array()
            .unwrap()
            .iter()
            .map(|entry| entry.as_str().unwrap().to_owned())
            .collect()
    }

    #[test]
    fn fresh_document_gains_extends() -> anyhow::Result<()> {
        let result = inject("{}", BASE)?;
        let expect = Injection {
            text: r#"{"extends": ["github>lewtec/renovate-config:base"]}"#.into(),
            changed: true,
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn existing_extends_is_appended_to() -> anyhow::Result<()> {
        let result = inject(r#"{"extends": ["config:recommended"]}"#, BASE)?;
        let expect = Injection {
            text: r#"{"extends": ["config:recommended", "github>lewtec/renovate-config:base"]}"#
                .into(),
            changed: true,
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test]
    fn listed_reference_is_left_alone() -> anyhow::Result<()> {
        let text = r#"{"extends": ["github>lewtec/renovate-config:base"]}"#;
        let result = inject(text, BASE)?;
        let expect = Injection {
            text: text.into(),
            changed: false,
        };
        assert_eq!(result, expect);

        Ok(())
    }

    #[test_case("{}"; "empty object")]
    #[test_case("{\n}\n"; "empty multi-line object")]
    #[test_case(r#"{"extends": []}"#; "empty extends")]
    #[test_case("{\n  \"extends\": [\n  ]\n}\n"; "empty multi-line extends")]
    #[test_case(r#"{"automerge": true}"#; "no extends")]
    #[test_case("{\n\t\"extends\": [\"a\", \"b\"],\n\t\"automerge\": true\n}\n"; "tab indented")]
    #[test_case("{\r\n  \"extends\": [\r\n    \"a\"\r\n  ]\r\n}\r\n"; "crlf")]
    #[test_case("{\"a\":1,\"extends\":[\"x\",],}"; "compact with trailing commas")]
    #[test]
    fn injection_is_idempotent(text: &str) {
        use pretty_assertions::assert_eq;
        let first = inject(text, BASE).unwrap();
        assert!(first.changed);

        let second = inject(&first.text, BASE).unwrap();
        assert_eq!(
            second,
            Injection {
                text: first.text.clone(),
                changed: false
            }
        );

        let extends = extends_of(&strip_trailing_commas(&first.text));
        assert_eq!(extends.iter().filter(|entry| *entry == BASE).count(), 1);
    }

    // serde_json rejects trailing commas, so drop them before checking the result.
    fn strip_trailing_commas(text: &str) -> String {
        text.replace(",]", "]").replace(",}", "}")
    }

    #[test]
    fn existing_order_is_preserved() -> anyhow::Result<()> {
        let result = inject(r#"{"extends": ["a", "b"]}"#, "c")?;
        assert_eq!(extends_of(&result.text), vec!["a", "b", "c"]);

        let result = inject(r#"{"extends": ["c", "a", "b"]}"#, "c")?;
        assert!(!result.changed);

        Ok(())
    }

    #[test]
    fn multi_line_document_keeps_its_formatting() -> anyhow::Result<()> {
        let text = indoc! {r#"
            {
              "$schema": "https://docs.renovatebot.com/renovate-schema.json",
              "extends": [
                "config:recommended"
              ],
              "automerge": true
            }
        "#};
        let result = inject(text, BASE)?;
        let expect = indoc! {r#"
            {
              "$schema": "https://docs.renovatebot.com/renovate-schema.json",
              "extends": [
                "config:recommended",
                "github>lewtec/renovate-config:base"
              ],
              "automerge": true
            }
        "#};
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn missing_extends_becomes_last_member() -> anyhow::Result<()> {
        let text = indoc! {r#"
            {
                "$schema": "https://docs.renovatebot.com/renovate-schema.json",
                "automerge": true
            }
        "#};
        let result = inject(text, BASE)?;
        let expect = indoc! {r#"
            {
                "$schema": "https://docs.renovatebot.com/renovate-schema.json",
                "automerge": true,
                "extends": ["github>lewtec/renovate-config:base"]
            }
        "#};
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn comments_survive_injection() -> anyhow::Result<()> {
        let text = indoc! {r#"
            // Managed by the platform team.
            {
              "extends": [
                "config:recommended" // upstream defaults
              ],
              /* keep lockfiles fresh */
              "lockFileMaintenance": { "enabled": true }
            }
        "#};
        let result = inject(text, BASE)?;
        let expect = indoc! {r#"
            // Managed by the platform team.
            {
              "extends": [
                "config:recommended", // upstream defaults
                "github>lewtec/renovate-config:base"
              ],
              /* keep lockfiles fresh */
              "lockFileMaintenance": { "enabled": true }
            }
        "#};
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn trailing_commas_are_kept() -> anyhow::Result<()> {
        let text = indoc! {r#"
            {
              "extends": [
                "config:recommended",
              ],
            }
        "#};
        let result = inject(text, BASE)?;
        let expect = indoc! {r#"
            {
              "extends": [
                "config:recommended",
                "github>lewtec/renovate-config:base",
              ],
            }
        "#};
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn empty_multi_line_extends_uses_detected_indent() -> anyhow::Result<()> {
        let text = "{\n    \"extends\": [\n    ]\n}\n";
        let result = inject(text, BASE)?;
        let expect = "{\n    \"extends\": [\n        \"github>lewtec/renovate-config:base\"\n    ]\n}\n";
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn empty_extends_with_comment_keeps_comment() -> anyhow::Result<()> {
        let text = "{\n  \"extends\": [\n    // nothing yet\n  ]\n}\n";
        let result = inject(text, BASE)?;
        let expect =
            "{\n  \"extends\": [\n    // nothing yet\n    \"github>lewtec/renovate-config:base\"\n  ]\n}\n";
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn crlf_line_endings_are_kept() -> anyhow::Result<()> {
        let text = "{\r\n  \"extends\": [\r\n    \"a\"\r\n  ]\r\n}\r\n";
        let result = inject(text, "b")?;
        let expect = "{\r\n  \"extends\": [\r\n    \"a\",\r\n    \"b\"\r\n  ]\r\n}\r\n";
        assert_eq!(result.text, expect);

        Ok(())
    }

    #[test]
    fn compact_document_stays_compact() -> anyhow::Result<()> {
        let result = inject(r#"{"a":1,"b":[1,2]}"#, BASE)?;
        assert_eq!(
            result.text,
            r#"{"a":1,"b":[1,2],"extends":["github>lewtec/renovate-config:base"]}"#
        );

        let result = inject(r#"{"extends":["x","y"]}"#, "z")?;
        assert_eq!(result.text, r#"{"extends":["x","y","z"]}"#);

        Ok(())
    }

    #[test]
    fn unrelated_fields_are_untouched() -> anyhow::Result<()> {
        let text = r#"{"$schema": "s", "extends": ["a"], "packageRules": [{"matchUpdateTypes": ["minor"], "automerge": true}], "timezone": "UTC"}"#;
        let result = inject(text, BASE)?;

        let before: serde_json::Value = serde_json::from_str(text)?;
        let after: serde_json::Value = serde_json::from_str(&result.text)?;
        for key in ["$schema", "packageRules", "timezone"] {
            assert_eq!(before[key], after[key]);
        }
        assert_eq!(
            result.text.replace(r#", "github>lewtec/renovate-config:base""#, ""),
            text
        );

        Ok(())
    }

    #[test]
    fn reference_is_escaped() -> anyhow::Result<()> {
        let result = inject("{}", r#"local>odd"name"#)?;
        assert_eq!(result.text, r#"{"extends": ["local>odd\"name"]}"#);
        assert_eq!(extends_of(&result.text), vec![r#"local>odd"name"#]);

        Ok(())
    }

    #[test]
    fn byte_order_mark_is_kept() -> anyhow::Result<()> {
        let result = inject("\u{feff}{}", BASE)?;
        let expect = Injection {
            text: "\u{feff}{\"extends\": [\"github>lewtec/renovate-config:base\"]}".into(),
            changed: true,
        };
        assert_eq!(result, expect);

        let again = inject(&result.text, BASE)?;
        assert!(!again.changed);

        Ok(())
    }

    #[test]
    fn extends_as_string_is_rejected() {
        let result = inject(r#"{"extends": "config:recommended"}"#, BASE);
        let expect = InjectError::Format(FormatError::ExtendsNotArray { found: "a string" });
        assert_eq!(result, Err(expect));
    }

    #[test]
    fn extends_with_non_string_entry_is_rejected() {
        let result = inject(r#"{"extends": ["a", 42]}"#, BASE);
        let expect = InjectError::Format(FormatError::ExtendsEntryNotString {
            index: 1,
            found: "a number",
        });
        assert_eq!(result, Err(expect));
    }

    #[test]
    fn duplicate_extends_is_rejected() {
        let result = inject(r#"{"extends": [], "extends": ["a"]}"#, BASE);
        assert_eq!(result, Err(InjectError::Format(FormatError::DuplicateExtends)));
    }

    #[test_case("[]", "an array"; "array")]
    #[test_case("\"renovate\"", "a string"; "string")]
    #[test_case("null", "null"; "null")]
    #[test]
    fn non_object_document_is_rejected(text: &str, found: &'static str) {
        use pretty_assertions::assert_eq;
        let result = inject(text, BASE);
        assert_eq!(result, Err(InjectError::Format(FormatError::NotAnObject { found })));
    }

    #[test]
    fn invalid_json_is_a_parse_error() {
        let result = inject("extends = [base]", BASE);
        assert!(matches!(result, Err(InjectError::Parse(_))));

        let result = inject("{\"extends\": [\"a\"", BASE);
        assert!(matches!(result, Err(InjectError::Parse(_))));
    }

    #[test]
    fn empty_reference_is_rejected() {
        assert_eq!(inject("{}", ""), Err(InjectError::EmptyReference));
    }

    #[test]
    fn indentation_detection() {
        assert_eq!(detect_indentation("{\n  \"extends\": []\n}"), "  ");
        assert_eq!(detect_indentation("{\n    \"extends\": []\n}"), "    ");
        assert_eq!(detect_indentation("{\n\t\"extends\": []\n}"), "\t");
        assert_eq!(detect_indentation("{\n\n   \"a\": 1\n}"), "   ");
        assert_eq!(detect_indentation("{}"), "  ");
    }
}
