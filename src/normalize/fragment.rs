//! Structured documents embedded in text.
//!
//! Chat clients paste small JSON blocks into message text, fenced either as a
//! Markdown code block or as an inline backtick span. This module finds those
//! spans and parses/re-renders them while keeping the layout the client used,
//! so nothing outside the removed fragment moves.

use std::io;
use std::string::FromUtf8Error;

use serde::Serialize;
use serde_json::ser::{Formatter, PrettyFormatter, Serializer};
use serde_json::Value;
use thiserror::Error;

/// Why a candidate span was left as written.
#[derive(Debug, Error)]
pub enum FragmentError {
    #[error("not valid JSON: {0}")]
    Parse(#[source] serde_json::Error),
    #[error("failed to render JSON: {0}")]
    Render(#[source] serde_json::Error),
    #[error("rendered JSON is not UTF-8: {0}")]
    Encoding(#[from] FromUtf8Error),
}

/// A piece of a text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Ordinary text. `at_line_start` is true when the segment begins a line.
    Plain { text: &'a str, at_line_start: bool },
    /// A fenced span: opening marker (with info string), body, closing marker.
    Fenced {
        open: &'a str,
        body: &'a str,
        close: &'a str,
    },
}

/// Split `text` into plain and fenced segments, in order.
///
/// Concatenating every segment's pieces reproduces `text` exactly.
pub fn segments(text: &str) -> Vec<Segment<'_>> {
    let bytes = text.as_bytes();
    let mut segments = Vec::new();
    let mut plain_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'`' {
            i += 1;
            continue;
        }
        let run = bytes[i..].iter().take_while(|&&b| b == b'`').count();
        match find_fence(text, i, run) {
            Some((body_start, close_start, end)) => {
                if plain_start < i {
                    segments.push(plain(text, plain_start, i));
                }
                segments.push(Segment::Fenced {
                    open: &text[i..body_start],
                    body: &text[body_start..close_start],
                    close: &text[close_start..end],
                });
                i = end;
                plain_start = end;
            }
            None => i += run,
        }
    }

    if plain_start < text.len() {
        segments.push(plain(text, plain_start, text.len()));
    }
    segments
}

fn plain(text: &str, start: usize, end: usize) -> Segment<'_> {
    Segment::Plain {
        text: &text[start..end],
        at_line_start: start == 0 || text.as_bytes()[start - 1] == b'\n',
    }
}

/// Locate the fence opened by `run` backticks at `start`.
///
/// Returns (body start, closing marker start, end) as byte offsets.
fn find_fence(text: &str, start: usize, run: usize) -> Option<(usize, usize, usize)> {
    let after = start + run;
    match run {
        1 => {
            // Inline span: closes on the same line, holds a JSON object or array.
            let line = &text[after..];
            let line = &line[..line.find('\n').unwrap_or(line.len())];
            let close = after + line.find('`')?;
            is_structured(&text[after..close]).then_some((after, close, close + 1))
        }
        2 => None,
        _ => {
            // Block: info string up to the newline, body up to a matching run.
            let newline = after + text[after..].find('\n')?;
            if text[after..newline].contains('`') {
                return None;
            }
            let body_start = newline + 1;
            let marker = &text[start..after];
            let close = body_start + text[body_start..].find(marker)?;
            Some((body_start, close, close + run))
        }
    }
}

/// Returns true if `text` looks like a JSON object or array.
pub fn is_structured(text: &str) -> bool {
    matches!(text.trim_start().as_bytes().first(), Some(b'{' | b'['))
}

/// A parsed JSON document and the framing needed to write it back.
#[derive(Debug)]
pub struct Document<'a> {
    pub value: Value,
    pub frame: Frame<'a>,
}

/// Surrounding whitespace and layout of a parsed document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    leading: &'a str,
    trailing: &'a str,
    layout: Layout,
}

impl<'a> Document<'a> {
    /// Parse `src` as a JSON document, remembering how it was laid out.
    pub fn parse(src: &'a str) -> Result<Self, FragmentError> {
        let trimmed = src.trim();
        let value: Value = serde_json::from_str(trimmed).map_err(FragmentError::Parse)?;

        let leading = &src[..src.len() - src.trim_start().len()];
        let trailing = &src[src.trim_end().len()..];
        Ok(Self {
            value,
            frame: Frame {
                leading,
                trailing,
                layout: Layout::detect(trimmed),
            },
        })
    }
}

impl Frame<'_> {
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Render `value` in this frame's layout, surrounding whitespace included.
    pub fn render(&self, value: &Value) -> Result<String, FragmentError> {
        let body = self.layout.render(value)?;
        let mut out = String::with_capacity(self.leading.len() + body.len() + self.trailing.len());
        out.push_str(self.leading);
        out.push_str(&body);
        out.push_str(self.trailing);
        Ok(out)
    }
}

/// JSON formatting convention of a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Layout {
    /// Single line. Each flag records whether that separator is followed by
    /// a space, so `{"a":1, "b":2}` keeps its mixed spacing.
    Inline { spaced_colon: bool, spaced_comma: bool },
    /// One member per line. `indent` is the nesting unit, `base` the
    /// indentation of the closing bracket and `newline` the line ending.
    Pretty {
        indent: String,
        base: String,
        newline: String,
    },
}

impl Layout {
    /// `{"a":1,"b":2}`
    pub const COMPACT: Self = Self::Inline {
        spaced_colon: false,
        spaced_comma: false,
    };
    /// `{"a": 1, "b": 2}`
    pub const SPACED: Self = Self::Inline {
        spaced_colon: true,
        spaced_comma: true,
    };

    /// Infer the layout of trimmed JSON text.
    pub fn detect(json: &str) -> Self {
        if json.contains('\n') {
            return Self::detect_pretty(json);
        }
        let spaced = |sep: u8| first_separator(json, sep).map(|i| json.as_bytes().get(i + 1) == Some(&b' '));
        let colon = spaced(b':');
        let comma = spaced(b',');
        Self::Inline {
            spaced_colon: colon.or(comma).unwrap_or(false),
            spaced_comma: comma.or(colon).unwrap_or(false),
        }
    }

    fn detect_pretty(json: &str) -> Self {
        let base = json.lines().last().map(leading_whitespace).unwrap_or("");
        let member = json
            .lines()
            .skip(1)
            .find(|line| !line.trim().is_empty())
            .map(leading_whitespace)
            .unwrap_or("");
        let indent = member.strip_prefix(base).unwrap_or(member);
        let indent = if indent.is_empty() { "  " } else { indent };
        let newline = if json.contains("\r\n") { "\r\n" } else { "\n" };

        Self::Pretty {
            indent: indent.to_string(),
            base: base.to_string(),
            newline: newline.to_string(),
        }
    }

    /// Serialize `value` in this layout.
    pub fn render(&self, value: &Value) -> Result<String, FragmentError> {
        let mut buf = Vec::new();
        match self {
            Self::Inline {
                spaced_colon,
                spaced_comma,
            } => value
                .serialize(&mut Serializer::with_formatter(
                    &mut buf,
                    InlineFormatter {
                        colon: if *spaced_colon { b": " } else { b":" },
                        comma: if *spaced_comma { b", " } else { b"," },
                    },
                ))
                .map_err(FragmentError::Render)?,
            Self::Pretty { indent, .. } => value
                .serialize(&mut Serializer::with_formatter(
                    &mut buf,
                    PrettyFormatter::with_indent(indent.as_bytes()),
                ))
                .map_err(FragmentError::Render)?,
        }

        let out = String::from_utf8(buf)?;
        match self {
            // JSON strings never contain raw newlines, so every newline is layout.
            Self::Pretty { base, newline, .. } if !base.is_empty() || newline != "\n" => {
                Ok(out.replace('\n', &format!("{newline}{base}")))
            }
            _ => Ok(out),
        }
    }
}

fn leading_whitespace(line: &str) -> &str {
    &line[..line.len() - line.trim_start().len()]
}

/// Byte offset of the first `sep` outside a string literal.
fn first_separator(json: &str, sep: u8) -> Option<usize> {
    let mut in_string = false;
    let mut escaped = false;
    for (i, b) in json.bytes().enumerate() {
        if in_string {
            match b {
                _ if escaped => escaped = false,
                b'\\' => escaped = true,
                b'"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match b {
            b'"' => in_string = true,
            _ if b == sep => return Some(i),
            _ => {}
        }
    }
    None
}

/// Single-line formatter with configurable `:` and `,` separators.
struct InlineFormatter {
    colon: &'static [u8],
    comma: &'static [u8],
}

impl Formatter for InlineFormatter {
    fn begin_array_value<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.comma)
        }
    }

    fn begin_object_key<W>(&mut self, writer: &mut W, first: bool) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        if first {
            Ok(())
        } else {
            writer.write_all(self.comma)
        }
    }

    fn begin_object_value<W>(&mut self, writer: &mut W) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        writer.write_all(self.colon)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rejoin(segments: &[Segment<'_>]) -> String {
        segments
            .iter()
            .map(|s| match s {
                Segment::Plain { text, .. } => text.to_string(),
                Segment::Fenced { open, body, close } => format!("{open}{body}{close}"),
            })
            .collect()
    }

    #[test]
    fn finds_inline_and_block_fences() {
        let text = "Context:\n```json\n{\n  \"a\": 1\n}\n```\nthen `{\"b\":2}` and `code`";
        let segs = segments(text);
        assert_eq!(rejoin(&segs), text);

        let fenced: Vec<_> = segs
            .iter()
            .filter_map(|s| match s {
                Segment::Fenced { open, body, close } => Some((*open, *body, *close)),
                _ => None,
            })
            .collect();
        assert_eq!(
            fenced,
            vec![("```json\n", "{\n  \"a\": 1\n}\n", "```"), ("`", "{\"b\":2}", "`")]
        );
    }

    #[test]
    fn plain_segments_know_line_starts() {
        let segs = segments("`{}`\nnext");
        assert_eq!(
            segs[1],
            Segment::Plain {
                text: "\nnext",
                at_line_start: false
            }
        );

        let segs = segments("intro\n`[1]` tail");
        assert_eq!(
            segs[0],
            Segment::Plain {
                text: "intro\n",
                at_line_start: true
            }
        );
    }

    #[test]
    fn unterminated_fences_are_plain_text() {
        for text in ["```json\n{\"a\":1}", "`{\"a\":1}\n`", "no fences here", "``{}``"] {
            let segs = segments(text);
            assert_eq!(segs.len(), 1, "{text}");
            assert!(matches!(segs[0], Segment::Plain { .. }));
        }
    }

    #[test]
    fn non_json_block_is_still_a_fence() {
        let text = "```python\nprint(1)\n```";
        let segs = segments(text);
        assert!(matches!(segs[0], Segment::Fenced { body: "print(1)\n", .. }));
    }

    #[test]
    fn detects_layouts() {
        assert_eq!(Layout::detect(r#"{"a":1,"b":[1,2]}"#), Layout::COMPACT);
        assert_eq!(Layout::detect(r#"{"a": 1, "b": [1, 2]}"#), Layout::SPACED);
        assert_eq!(Layout::detect(r#"{"a:b":1}"#), Layout::COMPACT);
        assert_eq!(Layout::detect(r#"{"a\": ":1}"#), Layout::COMPACT);
        assert_eq!(
            Layout::detect("{\n    \"a\": 1\n}"),
            Layout::Pretty {
                indent: "    ".into(),
                base: "".into(),
                newline: "\n".into(),
            }
        );
        assert_eq!(
            Layout::detect("{\n    \"a\": 1\n  }"),
            Layout::Pretty {
                indent: "  ".into(),
                base: "  ".into(),
                newline: "\n".into(),
            }
        );
    }

    #[test]
    fn detects_separator_spacing_independently() {
        assert_eq!(
            Layout::detect(r#"{"a":1, "message_id":"x", "b":2}"#),
            Layout::Inline {
                spaced_colon: false,
                spaced_comma: true,
            }
        );
        assert_eq!(
            Layout::detect(r#"{"a": 1,"b": 2}"#),
            Layout::Inline {
                spaced_colon: true,
                spaced_comma: false,
            }
        );
        // A lone member has no comma to look at; follow the colon.
        assert_eq!(Layout::detect(r#"{"a": 1}"#), Layout::SPACED);
    }

    #[test]
    fn detects_crlf_line_endings() {
        let layout = Layout::detect("{\r\n  \"a\": 1\r\n}");
        assert_eq!(
            layout,
            Layout::Pretty {
                indent: "  ".into(),
                base: "".into(),
                newline: "\r\n".into(),
            }
        );
    }

    #[test]
    fn renders_each_layout() {
        let value = json!({"schema": "x", "tags": [1, 2]});
        assert_eq!(Layout::COMPACT.render(&value).unwrap(), r#"{"schema":"x","tags":[1,2]}"#);
        assert_eq!(Layout::SPACED.render(&value).unwrap(), r#"{"schema": "x", "tags": [1, 2]}"#);
        let mixed = Layout::Inline {
            spaced_colon: false,
            spaced_comma: true,
        };
        assert_eq!(mixed.render(&value).unwrap(), r#"{"schema":"x", "tags":[1, 2]}"#);
        let pretty = Layout::Pretty {
            indent: "  ".into(),
            base: "  ".into(),
            newline: "\n".into(),
        };
        assert_eq!(
            pretty.render(&value).unwrap(),
            "{\n    \"schema\": \"x\",\n    \"tags\": [\n      1,\n      2\n    ]\n  }"
        );
    }

    #[test]
    fn crlf_document_renders_with_crlf() {
        let src = "{\r\n  \"a\": 1,\r\n  \"b\": true\r\n}\r\n";
        let doc = Document::parse(src).unwrap();
        assert_eq!(doc.frame.render(&doc.value).unwrap(), src);
    }

    #[test]
    fn document_round_trips_framing() {
        let src = "\n  {\n    \"a\": 1,\n    \"b\": true\n  }\n";
        let doc = Document::parse(src).unwrap();
        assert_eq!(doc.frame.render(&doc.value).unwrap(), src);
    }

    #[test]
    fn document_parse_error_is_reported() {
        let err = Document::parse("{\"a\": }").unwrap_err();
        assert!(matches!(err, FragmentError::Parse(_)));
    }
}
