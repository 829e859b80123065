//! Ledger parser
//!
//! Scans the text line by line with two states: `Scanning` looks for an
//! entry header, `InBlock` consumes the fenced YAML block the header opens.
//! Every other line is non-entry content and is left alone. Parsing is
//! all-or-nothing: the first structural problem aborts with a positional
//! error and no entries are returned.

use super::entry::{ActionEntry, Mapping};
use super::{split_lines, trim_eol};
use crate::error::ParseError;
use regex::Regex;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::LazyLock;

/// `- [ ] `id` — *kind* v1.0`
static HEADER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^- \[([ xX])\] `([a-zA-Z0-9-]+)` — \*([a-z-]+)\* v([0-9]+(?:\.[0-9]+)+)$")
        .expect("header pattern is hardcoded and must be valid")
});

pub(crate) const OPEN_FENCE: &str = "```yaml";
pub(crate) const CLOSE_FENCE: &str = "```";

#[derive(Debug)]
struct Header {
    completed: bool,
    id: String,
    kind: String,
    version: String,
}

fn match_header(line: &str) -> Option<Header> {
    let caps = HEADER_PATTERN.captures(line)?;
    Some(Header {
        completed: caps[1].eq_ignore_ascii_case("x"),
        id: caps[2].to_string(),
        kind: caps[3].to_string(),
        version: caps[4].to_string(),
    })
}

/// Line positions of one entry (0-based indices into the split lines)
#[derive(Debug, Clone)]
pub(crate) struct EntrySpan {
    pub header: usize,
    pub open_fence: usize,
    pub close_fence: usize,
    /// Decoded block, keeping keys other than inputs/outputs/meta
    pub block: serde_yaml::Mapping,
}

/// Result of a full scan, shared with the editor
#[derive(Debug)]
pub(crate) struct ScannedLedger<'a> {
    pub lines: Vec<&'a str>,
    pub entries: Vec<(ActionEntry, EntrySpan)>,
}

enum State {
    Scanning,
    InBlock {
        header: Header,
        header_line: usize,
        open_fence: usize,
    },
}

/// Parse ledger text into its action entries, in order of appearance
///
/// # Errors
///
/// Returns a [`ParseError`] carrying the offending line and two lines of
/// context on each side when an entry is malformed.
pub fn parse(text: &str) -> Result<Vec<ActionEntry>, ParseError> {
    Ok(scan(text)?
        .entries
        .into_iter()
        .map(|(entry, _)| entry)
        .collect())
}

pub(crate) fn scan(text: &str) -> Result<ScannedLedger<'_>, ParseError> {
    let lines = split_lines(text);
    let mut entries = Vec::new();
    let mut seen_ids = HashSet::new();
    let mut state = State::Scanning;
    let mut index = 0;

    while index < lines.len() {
        let line = trim_eol(lines[index]);

        state = match state {
            State::Scanning => match match_header(line) {
                Some(header) => {
                    if !seen_ids.insert(header.id.clone()) {
                        return Err(ParseError::at(
                            &lines,
                            index,
                            format!("Duplicate action id '{}'", header.id),
                        ));
                    }

                    let fence = index + 1;
                    if lines
                        .get(fence)
                        .is_none_or(|l| trim_eol(l).trim() != OPEN_FENCE)
                    {
                        return Err(ParseError::at(
                            &lines,
                            fence,
                            format!(
                                "Expected '{OPEN_FENCE}' after action header for action '{}'",
                                header.id
                            ),
                        ));
                    }

                    let header_line = index;
                    index = fence;
                    State::InBlock {
                        header,
                        header_line,
                        open_fence: fence,
                    }
                }
                None => State::Scanning,
            },
            State::InBlock {
                header,
                header_line,
                open_fence,
            } => {
                if line.trim() == CLOSE_FENCE {
                    let span = EntrySpan {
                        header: header_line,
                        open_fence,
                        close_fence: index,
                        block: serde_yaml::Mapping::new(),
                    };
                    entries.push(decode_block(&lines, header, span)?);
                    State::Scanning
                } else {
                    State::InBlock {
                        header,
                        header_line,
                        open_fence,
                    }
                }
            }
        };

        index += 1;
    }

    if let State::InBlock {
        header, open_fence, ..
    } = state
    {
        return Err(ParseError::at(
            &lines,
            open_fence + 1,
            format!("Missing closing '{CLOSE_FENCE}' for action '{}'", header.id),
        ));
    }

    Ok(ScannedLedger { lines, entries })
}

fn decode_block(
    lines: &[&str],
    header: Header,
    mut span: EntrySpan,
) -> Result<(ActionEntry, EntrySpan), ParseError> {
    let first = span.open_fence + 1;
    let body = lines[first..span.close_fence]
        .iter()
        .map(|l| trim_eol(l))
        .collect::<Vec<_>>()
        .join("\n");

    let value: serde_yaml::Value = serde_yaml::from_str(&body).map_err(|e| {
        let offset = e.location().map_or(0, |loc| loc.line().saturating_sub(1));
        ParseError::at(
            lines,
            first + offset,
            format!("Invalid YAML in action '{}': {e}", header.id),
        )
    })?;

    let serde_yaml::Value::Mapping(block) = value else {
        return Err(ParseError::at(
            lines,
            first,
            format!("Action block must be a mapping for action '{}'", header.id),
        ));
    };

    let read_section = |key: &str| {
        section(&block, key).map_err(|message| {
            ParseError::at(
                lines,
                first,
                format!("{message} for action '{}'", header.id),
            )
        })
    };
    let inputs = read_section("inputs")?;
    let outputs = read_section("outputs")?;
    let meta = read_section("meta")?;

    if !header.completed && (!outputs.is_empty() || !meta.is_empty()) {
        return Err(ParseError::at(
            lines,
            span.header,
            format!(
                "Pending action '{}' must not carry outputs or meta",
                header.id
            ),
        ));
    }

    if header.completed && meta.is_empty() {
        return Err(ParseError::at(
            lines,
            span.header,
            format!("Completed action '{}' has no execution meta", header.id),
        ));
    }

    let entry = ActionEntry {
        id: header.id,
        kind: header.kind,
        version: header.version,
        completed: header.completed,
        inputs,
        outputs,
        meta,
        source_line: span.header + 1,
    };
    span.block = block;
    Ok((entry, span))
}

fn section(block: &serde_yaml::Mapping, key: &str) -> Result<Mapping, String> {
    match block.get(key) {
        None | Some(serde_yaml::Value::Null) => Ok(Mapping::new()),
        Some(value @ serde_yaml::Value::Mapping(_)) => match serde_json::to_value(value) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(format!("'{key}' must be a mapping")),
            Err(e) => Err(format!("'{key}' cannot be represented as JSON ({e})")),
        },
        Some(_) => Err(format!("'{key}' must be a mapping")),
    }
}
