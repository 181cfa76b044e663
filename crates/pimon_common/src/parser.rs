//! Indentation-nested `key: value` parser.
//!
//! Grammar, one construct per non-blank line:
//!
//! - `key: value` is a string leaf
//! - `key:` or a bare `key` opens a nested block made of the deeper lines
//!   that follow; with no deeper lines it is an empty string leaf
//! - `- item` is a list element; `-` alone may open a nested block
//!
//! A block is the run of lines sharing one indentation. Blocks hold either
//! entries or list items, never both. Quoted scalars lose their quotes.

use crate::value::{Mapping, Value};
use thiserror::Error;

const RENDER_INDENT: usize = 4;

/// Why a normalized text could not be read as nested key-value data.
/// Line numbers are 1-based and count blank lines.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("no content to parse")]
    Empty,

    #[error("line {line}: tab character in indentation")]
    TabIndent { line: usize },

    #[error("line {line}: indentation does not match any open block")]
    InconsistentIndent { line: usize },

    #[error("line {line}: nested block under an entry that already has a value")]
    UnexpectedChildren { line: usize },

    #[error("line {line}: list items and keys mixed in one block")]
    MixedBlock { line: usize },

    #[error("top-level block is a list, expected key-value entries")]
    NotAMapping,
}

#[derive(Debug, Clone, Copy)]
enum LineKind<'a> {
    Entry { key: &'a str, inline: Option<&'a str> },
    Item { inline: Option<&'a str> },
}

#[derive(Debug, Clone, Copy)]
struct Line<'a> {
    num: usize,
    indent: usize,
    kind: LineKind<'a>,
}

/// Parse normalized diagnostic text into an ordered mapping.
pub fn parse_structured(text: &str) -> Result<Mapping, ParseError> {
    let lines = tokenize(text)?;
    let root_indent = lines.first().ok_or(ParseError::Empty)?.indent;

    let mut parser = Parser { lines, pos: 0 };
    let root = parser.block(root_indent)?;

    // Anything left dedented past the root block.
    if let Some(line) = parser.lines.get(parser.pos) {
        return Err(ParseError::InconsistentIndent { line: line.num });
    }

    match root {
        Value::Map(map) => Ok(map),
        _ => Err(ParseError::NotAMapping),
    }
}

fn tokenize(text: &str) -> Result<Vec<Line<'_>>, ParseError> {
    let mut lines = Vec::new();

    for (idx, raw) in text.lines().enumerate() {
        let num = idx + 1;
        if raw.trim().is_empty() {
            continue;
        }

        let rest = raw.trim_start_matches(' ');
        if rest.starts_with('\t') {
            return Err(ParseError::TabIndent { line: num });
        }
        let indent = raw.len() - rest.len();
        let content = rest.trim_end();

        lines.push(Line {
            num,
            indent,
            kind: classify(content),
        });
    }

    Ok(lines)
}

fn classify(content: &str) -> LineKind<'_> {
    if content == "-" {
        return LineKind::Item { inline: None };
    }
    if let Some(item) = content.strip_prefix("- ") {
        return LineKind::Item {
            inline: non_empty(item.trim()),
        };
    }

    if let Some(pos) = content.find(": ") {
        LineKind::Entry {
            key: content[..pos].trim_end(),
            inline: non_empty(content[pos + 2..].trim()),
        }
    } else if let Some(key) = content.strip_suffix(':') {
        LineKind::Entry {
            key: key.trim_end(),
            inline: None,
        }
    } else {
        LineKind::Entry {
            key: content,
            inline: None,
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() {
        None
    } else {
        Some(s)
    }
}

struct Parser<'a> {
    lines: Vec<Line<'a>>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn block(&mut self, indent: usize) -> Result<Value, ParseError> {
        match self.lines.get(self.pos).map(|l| l.kind) {
            Some(LineKind::Item { .. }) => self.list(indent).map(Value::List),
            _ => self.mapping(indent).map(Value::Map),
        }
    }

    fn mapping(&mut self, indent: usize) -> Result<Mapping, ParseError> {
        let mut map = Mapping::new();

        while let Some(line) = self.next_in_block(indent)? {
            let LineKind::Entry { key, inline } = line.kind else {
                return Err(ParseError::MixedBlock { line: line.num });
            };
            let value = self.value_after(inline, indent)?;
            map.insert(unquote(key), value);
        }

        Ok(map)
    }

    fn list(&mut self, indent: usize) -> Result<Vec<Value>, ParseError> {
        let mut items = Vec::new();

        while let Some(line) = self.next_in_block(indent)? {
            let LineKind::Item { inline } = line.kind else {
                return Err(ParseError::MixedBlock { line: line.num });
            };
            items.push(self.value_after(inline, indent)?);
        }

        Ok(items)
    }

    /// Consume the next line if it belongs to the block at `indent`.
    fn next_in_block(&mut self, indent: usize) -> Result<Option<Line<'a>>, ParseError> {
        let Some(&line) = self.lines.get(self.pos) else {
            return Ok(None);
        };
        if line.indent < indent {
            return Ok(None);
        }
        if line.indent > indent {
            return Err(ParseError::InconsistentIndent { line: line.num });
        }
        self.pos += 1;
        Ok(Some(line))
    }

    /// Value for the line just consumed: its nested block if deeper lines
    /// follow, otherwise its inline scalar.
    fn value_after(&mut self, inline: Option<&str>, indent: usize) -> Result<Value, ParseError> {
        let child = self.lines.get(self.pos).filter(|l| l.indent > indent).copied();

        match (child, inline) {
            (Some(child), Some(_)) => Err(ParseError::UnexpectedChildren { line: child.num }),
            (Some(child), None) => self.block(child.indent),
            (None, inline) => Ok(Value::Str(unquote(inline.unwrap_or("")))),
        }
    }
}

fn unquote(s: &str) -> String {
    let quoted = |q: char| s.len() >= 2 && s.starts_with(q) && s.ends_with(q);

    if quoted('\'') {
        s[1..s.len() - 1].replace("''", "'")
    } else if quoted('"') {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Render a mapping back to indented text that [`parse_structured`] reads.
///
/// Leaves are always single-quoted. Keys are written raw, so keys containing
/// `": "` and empty nested mappings do not survive a round trip.
pub fn render(map: &Mapping) -> String {
    let mut out = String::new();
    render_mapping(map, 0, &mut out);
    out
}

fn render_mapping(map: &Mapping, depth: usize, out: &mut String) {
    let pad = " ".repeat(depth * RENDER_INDENT);
    for (key, value) in map.iter() {
        match value {
            Value::Str(s) => out.push_str(&format!("{}{}: {}\n", pad, key, quote(s))),
            nested => {
                out.push_str(&format!("{}{}:\n", pad, key));
                render_nested(nested, depth + 1, out);
            }
        }
    }
}

fn render_list(items: &[Value], depth: usize, out: &mut String) {
    let pad = " ".repeat(depth * RENDER_INDENT);
    for item in items {
        match item {
            Value::Str(s) => out.push_str(&format!("{}- {}\n", pad, quote(s))),
            nested => {
                out.push_str(&format!("{}-\n", pad));
                render_nested(nested, depth + 1, out);
            }
        }
    }
}

fn render_nested(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Map(m) => render_mapping(m, depth, out),
        Value::List(items) => render_list(items, depth, out),
        Value::Str(_) => unreachable!("leaves are rendered inline"),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}
