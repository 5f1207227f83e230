//! Strict JSON and safe YAML parsing into [`Node`] trees.
//!
//! JSON is parsed without comment or trailing-comma tolerance. YAML is
//! loaded without any tag support: a tagged node (`!custom`,
//! `!!python/object`, even `!!str`) is a syntax error, never an
//! instantiated value. Both parsers reject duplicate mapping keys and
//! report the location of the failure.

use serde::Serialize;
use thiserror::Error;

use crate::format::Format;
use crate::node::Node;

/// Malformed JSON or YAML text.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[error("Invalid {}{}: {}", .format, location_suffix(.line, .column), .message)]
pub struct SyntaxError {
    pub format: Format,
    pub message: String,
    /// 1-based line, when the underlying scanner reports one.
    pub line: Option<usize>,
    /// 1-based column, when the underlying scanner reports one.
    pub column: Option<usize>,
    /// Byte offset into the source text.
    pub offset: Option<usize>,
}

fn location_suffix(line: &Option<usize>, column: &Option<usize>) -> String {
    match (line, column) {
        (Some(line), Some(column)) => format!(" at line {line}, column {column}"),
        (Some(line), None) => format!(" at line {line}"),
        _ => String::new(),
    }
}

/// Parse `text` as `format`.
pub fn parse(text: &str, format: Format) -> Result<Node, SyntaxError> {
    match format {
        Format::Json => parse_json(text),
        Format::Yaml => parse_yaml(text),
    }
}

/// Parse with the format chosen by [`Format::detect`].
pub fn parse_detected(text: &str) -> Result<(Format, Node), SyntaxError> {
    let format = Format::detect(text);
    parse(text, format).map(|node| (format, node))
}

fn parse_json(text: &str) -> Result<Node, SyntaxError> {
    serde_json::from_str::<Node>(text).map_err(|e| {
        let (line, column) = (e.line(), e.column());
        let message = strip_position(&e.to_string());
        // serde_json reports line 0 for errors without a position
        let located = line > 0;
        SyntaxError {
            format: Format::Json,
            message,
            line: located.then_some(line),
            column: located.then_some(column),
            offset: located.then(|| byte_offset(text, line, column)),
        }
    })
}

fn parse_yaml(text: &str) -> Result<Node, SyntaxError> {
    // serde_yaml resolves `!!type` tags to the core schema and drops them
    if let Some(tag) = find_tag(text) {
        return Err(SyntaxError {
            format: Format::Yaml,
            message: format!("tag `{}` is not allowed", tag.text),
            line: Some(tag.line),
            column: Some(tag.column),
            offset: Some(tag.offset),
        });
    }
    serde_yaml::from_str::<Node>(text).map_err(|e| {
        let location = e.location();
        SyntaxError {
            format: Format::Yaml,
            message: strip_position(&e.to_string()),
            line: location.as_ref().map(|l| l.line()),
            column: location.as_ref().map(|l| l.column()),
            offset: location.as_ref().map(|l| l.index()),
        }
    })
}

/// A node tag in YAML text.
struct Tag<'t> {
    text: &'t str,
    line: usize,
    column: usize,
    offset: usize,
}

/// Find the first node tag (`!local`, `!!type`, `!<uri>`) in `text`.
///
/// A tag is a node property, so only a `!` where a node may begin counts:
/// at the start of a line, after an indicator (`- `, `? `, `: `), after an
/// anchor, or after `[`, `{` and `,` in flow context. Quoted scalars,
/// comments and block scalar bodies are skipped.
fn find_tag(text: &str) -> Option<Tag<'_>> {
    let spaced = |c: Option<char>| c.map_or(true, char::is_whitespace);
    let ends_token = |c: char| c.is_whitespace() || ",[]{}".contains(c);

    let mut quote: Option<char> = None;
    let mut flow_depth = 0usize;
    // Indentation of the line that opened a block scalar
    let mut block: Option<usize> = None;
    let mut line_start = 0;

    for (number, raw) in text.split_inclusive('\n').enumerate() {
        let start = line_start;
        line_start += raw.len();
        let line = raw.trim_end_matches(['\n', '\r']);
        let indent = line.len() - line.trim_start_matches(' ').len();

        if let Some(parent) = block {
            if line.trim().is_empty() || indent > parent {
                continue;
            }
            block = None;
        }
        if quote.is_none() && line.starts_with('%') {
            continue;
        }

        // `--- !tag` puts a node right after the document marker
        let body = match line.strip_prefix("---") {
            Some(rest) if quote.is_none() && spaced(rest.chars().next()) => 3,
            _ => 0,
        };
        let mut node_start = quote.is_none();
        let mut prev: Option<char> = None;
        let mut chars = line[body..].char_indices().map(|(i, c)| (i + body, c)).peekable();

        while let Some((i, c)) = chars.next() {
            let next = chars.peek().map(|&(_, n)| n);
            match quote {
                Some('\'') => {
                    if c == '\'' {
                        if next == Some('\'') {
                            chars.next();
                        } else {
                            quote = None;
                        }
                    }
                }
                Some(_) => {
                    if c == '\\' {
                        chars.next();
                    } else if c == '"' {
                        quote = None;
                    }
                }
                None => match c {
                    ' ' | '\t' => {}
                    '#' if spaced(prev) => break,
                    '!' if node_start => {
                        let len = line[i..].find(ends_token).unwrap_or(line.len() - i);
                        return Some(Tag {
                            text: &line[i..i + len],
                            line: number + 1,
                            column: line[..i].chars().count() + 1,
                            offset: start + i,
                        });
                    }
                    '&' if node_start => {
                        while chars.peek().map_or(false, |&(_, n)| !ends_token(n)) {
                            chars.next();
                        }
                    }
                    '\'' | '"' if node_start => {
                        quote = Some(c);
                        node_start = false;
                    }
                    '|' | '>' if node_start && flow_depth == 0 => {
                        block = Some(indent);
                        break;
                    }
                    '[' | '{' if node_start || flow_depth > 0 => {
                        flow_depth += 1;
                        node_start = true;
                    }
                    ']' | '}' if flow_depth > 0 => {
                        flow_depth -= 1;
                        node_start = false;
                    }
                    ',' if flow_depth > 0 => node_start = true,
                    ':' if flow_depth > 0 || spaced(next) => node_start = true,
                    '-' | '?' if node_start && spaced(next) => {}
                    _ => node_start = false,
                },
            }
            prev = Some(c);
        }
    }
    None
}

/// Both serde backends append " at line X column Y" to their messages; the
/// location is carried in dedicated fields instead.
fn strip_position(message: &str) -> String {
    match message.rfind(" at line ") {
        Some(idx) => message[..idx].to_string(),
        None => message.to_string(),
    }
}

fn byte_offset(text: &str, line: usize, column: usize) -> usize {
    let line_start: usize = text
        .split_inclusive('\n')
        .take(line.saturating_sub(1))
        .map(str::len)
        .sum();
    (line_start + column.saturating_sub(1)).min(text.len())
}
