//! Splits a raw content file into a metadata block and the Markdown body.
//!
//! A frontmatter block is delimited by a `---` fence on its own line at the
//! very start of the file, closed by another `---` line. Inside the block,
//! `key: value` lines are collected into a metadata map; quoted scalars have
//! their surrounding quotes stripped, and bracketed values (`[a, b]`) are
//! parsed as ordered string sequences. Parsing never fails: a malformed or
//! unterminated block simply means the whole input is body text.

use std::collections::HashMap;

/// A coerced frontmatter value: either a scalar string or an ordered
/// sequence of strings.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Scalar(String),
    List(Vec<String>),
}

impl Value {
    /// Returns the scalar form of the value, or `None` for lists.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Scalar(s) => Some(s),
            Value::List(_) => None,
        }
    }

    /// Returns the list form of the value, or `None` for scalars.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            Value::Scalar(_) => None,
            Value::List(items) => Some(items),
        }
    }
}

/// The metadata map extracted from a frontmatter block.
pub type Metadata = HashMap<String, Value>;

const FENCE: &str = "---";

/// Splits `input` into `(metadata, body)`. The metadata map is empty when
/// the input carries no well-formed frontmatter block, in which case `body`
/// is the entire input.
pub fn parse(input: &str) -> (Metadata, &str) {
    let mut lines = LineOffsets::new(input);

    match lines.next() {
        Some((_, first)) if first.trim_end() == FENCE => {}
        _ => return (Metadata::new(), input),
    }

    let block_start = lines.offset();
    for (offset, line) in lines {
        if line.trim_end() == FENCE {
            let block = &input[block_start..offset];
            // The line text includes its terminating newline, so the body
            // starts right after the closing fence line.
            let body_start = offset + line.len();
            return (parse_block(block), &input[body_start..]);
        }
    }

    // Unterminated block: not frontmatter at all.
    (Metadata::new(), input)
}

/// Parses the interior of a frontmatter block. Lines that don't look like
/// `key: value` are ignored rather than rejected.
fn parse_block(block: &str) -> Metadata {
    let mut metadata = Metadata::new();
    for line in block.lines() {
        let mut parts = line.splitn(2, ':');
        let key = match parts.next() {
            Some(key) => key.trim(),
            None => continue,
        };
        let raw = match parts.next() {
            Some(raw) => raw.trim(),
            None => continue,
        };
        if key.is_empty() {
            continue;
        }
        metadata.insert(key.to_owned(), coerce(raw));
    }
    metadata
}

/// Coerces a raw frontmatter value: bracketed values become lists, quoted
/// scalars are unquoted.
fn coerce(raw: &str) -> Value {
    if raw.starts_with('[') && raw.ends_with(']') {
        Value::List(parse_list(raw))
    } else {
        Value::Scalar(unquote(raw).to_owned())
    }
}

/// Parses a bracketed sequence. Tries a strict structured parse first and
/// falls back to naive comma-splitting with per-element quote stripping.
fn parse_list(raw: &str) -> Vec<String> {
    if let Ok(items) = serde_yaml::from_str::<Vec<String>>(raw) {
        return items;
    }
    raw[1..raw.len() - 1]
        .split(',')
        .map(|item| unquote(item.trim()).to_owned())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Strips one pair of matching surrounding quotes, if present.
fn unquote(raw: &str) -> &str {
    let stripped = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .or_else(|| raw.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')));
    stripped.unwrap_or(raw)
}

/// Iterates over the lines of a string along with each line's byte offset.
/// Unlike [`str::lines`], the line text keeps its meaning relative to the
/// original input so the body can be sliced out without reallocation.
struct LineOffsets<'a> {
    input: &'a str,
    offset: usize,
}

impl<'a> LineOffsets<'a> {
    fn new(input: &'a str) -> Self {
        LineOffsets { input, offset: 0 }
    }

    fn offset(&self) -> usize {
        self.offset
    }
}

impl<'a> Iterator for LineOffsets<'a> {
    type Item = (usize, &'a str);

    fn next(&mut self) -> Option<(usize, &'a str)> {
        if self.offset >= self.input.len() {
            return None;
        }
        let start = self.offset;
        let rest = &self.input[start..];
        match rest.find('\n') {
            Some(i) => {
                self.offset = start + i + 1;
                Some((start, &rest[..i + 1]))
            }
            None => {
                self.offset = self.input.len();
                Some((start, rest))
            }
        }
    }
}
