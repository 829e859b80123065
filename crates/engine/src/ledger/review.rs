//! Proposal review
//!
//! Compares a proposed ledger against the version it was branched from and
//! flags every change to an entry that has already been executed.

use super::entry::ActionEntry;
use super::parser::parse;
use crate::error::ParseError;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Kind of immutability violation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    /// A completed entry was modified, removed or reset to pending
    ImmutableEntry,
    /// A new entry appeared already completed
    BornCompleted,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ImmutableEntry => f.write_str("ImmutableEntry"),
            Self::BornCompleted => f.write_str("BornCompleted"),
        }
    }
}

/// One flagged entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewViolation {
    /// Entry id
    pub action_id: String,
    /// What kind of violation
    pub kind: ViolationKind,
    /// Human-readable description
    pub message: String,
}

impl ReviewViolation {
    fn new(action_id: &str, kind: ViolationKind, message: impl Into<String>) -> Self {
        Self {
            action_id: action_id.to_string(),
            kind,
            message: message.into(),
        }
    }
}

/// Review `head` against `base`, returning violations in head order
///
/// Entries removed from head are reported after the others, in base order.
///
/// # Errors
///
/// Returns the parse error of either side
pub fn review(base: &str, head: &str) -> Result<Vec<ReviewViolation>, ParseError> {
    let base_entries = parse(base)?;
    let head_entries = parse(head)?;

    let base_by_id: HashMap<&str, &ActionEntry> =
        base_entries.iter().map(|e| (e.id.as_str(), e)).collect();
    let head_by_id: HashMap<&str, &ActionEntry> =
        head_entries.iter().map(|e| (e.id.as_str(), e)).collect();

    let mut violations = Vec::new();

    for entry in &head_entries {
        let previous = base_by_id.get(entry.id.as_str());
        match previous {
            Some(before) if before.completed && !entry.completed => {
                violations.push(ReviewViolation::new(
                    &entry.id,
                    ViolationKind::ImmutableEntry,
                    "completed entry was reset to pending",
                ));
            }
            Some(before) if entry.completed && !same_content(before, entry) => {
                violations.push(ReviewViolation::new(
                    &entry.id,
                    ViolationKind::ImmutableEntry,
                    format!("completed entry was modified ({})", changed_fields(before, entry)),
                ));
            }
            None if entry.completed => {
                violations.push(ReviewViolation::new(
                    &entry.id,
                    ViolationKind::BornCompleted,
                    "new entry is already marked completed",
                ));
            }
            _ => {}
        }
    }

    for entry in base_entries.iter().filter(|e| e.completed) {
        if !head_by_id.contains_key(entry.id.as_str()) {
            violations.push(ReviewViolation::new(
                &entry.id,
                ViolationKind::ImmutableEntry,
                "completed entry was removed",
            ));
        }
    }

    Ok(violations)
}

fn same_content(a: &ActionEntry, b: &ActionEntry) -> bool {
    a.kind == b.kind
        && a.version == b.version
        && a.inputs == b.inputs
        && a.outputs == b.outputs
        && a.meta == b.meta
}

fn changed_fields(a: &ActionEntry, b: &ActionEntry) -> String {
    let mut fields = Vec::new();
    if a.kind != b.kind {
        fields.push("kind");
    }
    if a.version != b.version {
        fields.push("version");
    }
    if a.inputs != b.inputs {
        fields.push("inputs");
    }
    if a.outputs != b.outputs {
        fields.push("outputs");
    }
    if a.meta != b.meta {
        fields.push("meta");
    }
    fields.join(", ")
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const BASE: &str = "- [x] `a1` — *echo* v1.0
```yaml
inputs:
  message: hi
outputs:
  echoed: hi
meta:
  runId: '1'
```
- [ ] `a2` — *echo* v1.0
```yaml
inputs:
  message: later
```
";

    #[test]
    fn test_untouched_ledger_passes() {
        let head = format!("{BASE}\n- [ ] `a3` — *echo* v1.0\n```yaml\ninputs: {{}}\n```\n");
        assert!(review(BASE, &head).unwrap().is_empty());
    }

    #[test]
    fn test_pending_entries_may_change() {
        let head = BASE.replace("message: later", "message: sooner");
        assert!(review(BASE, &head).unwrap().is_empty());
    }

    #[test]
    fn test_modified_inputs_flagged() {
        let head = BASE.replace("message: hi", "message: bye");
        let violations = review(BASE, &head).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].action_id, "a1");
        assert_eq!(violations[0].kind, ViolationKind::ImmutableEntry);
        assert!(violations[0].message.contains("inputs"));
    }

    #[test]
    fn test_reset_to_pending_flagged() {
        let head = "- [ ] `a1` — *echo* v1.0\n```yaml\ninputs:\n  message: hi\n```\n";
        let violations = review(BASE, head).unwrap();
        assert!(violations.iter().any(|v| v.action_id == "a1"
            && v.kind == ViolationKind::ImmutableEntry
            && v.message.contains("pending")));
    }

    #[test]
    fn test_removed_completed_entry_flagged() {
        let head = "- [ ] `a2` — *echo* v1.0\n```yaml\ninputs:\n  message: later\n```\n";
        let violations = review(BASE, head).unwrap();
        assert_eq!(violations.len(), 1);
        assert!(violations[0].message.contains("removed"));
    }

    #[test]
    fn test_born_completed_flagged() {
        let head = format!(
            "{BASE}- [x] `a3` — *echo* v1.0\n```yaml\ninputs: {{}}\nmeta:\n  runId: forged\n```\n"
        );
        let violations = review(BASE, &head).unwrap();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].kind, ViolationKind::BornCompleted);
        assert_eq!(violations[0].action_id, "a3");
    }

    #[test]
    fn test_parse_errors_propagate() {
        assert!(review(BASE, "- [ ] `a1` — *echo* v1.0\n").is_err());
    }
}
