//! Action entry model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Ordered string-keyed mapping used for inputs, outputs and meta
pub type Mapping = Map<String, Value>;

/// One line-item in a ledger
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionEntry {
    /// Identifier, unique within its ledger file
    pub id: String,
    /// Which registered action implementation to invoke
    pub kind: String,
    /// Version pinned for `kind` in the registry
    pub version: String,
    /// Whether the entry has been executed
    pub completed: bool,
    /// Parameters fixed at proposal time
    pub inputs: Mapping,
    /// Execution results, empty until executed
    pub outputs: Mapping,
    /// Execution metadata (`executedAt`, `runId`, optional `error`)
    pub meta: Mapping,
    /// 1-based line of the entry header, for diagnostics
    pub source_line: usize,
}

impl ActionEntry {
    /// Check whether the entry still waits for execution
    #[must_use]
    pub fn is_pending(&self) -> bool {
        !self.completed
    }

    /// Error recorded when the action ran, if any
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.meta.get("error").and_then(Value::as_str)
    }

    /// Checkbox character as rendered in the header
    #[must_use]
    pub fn checkbox(&self) -> char {
        if self.completed { 'x' } else { ' ' }
    }

    /// Render the entry header line (without line ending)
    #[must_use]
    pub fn header(&self) -> String {
        format!(
            "- [{}] `{}` — *{}* v{}",
            self.checkbox(),
            self.id,
            self.kind,
            self.version
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn entry(completed: bool) -> ActionEntry {
        ActionEntry {
            id: "a1".to_string(),
            kind: "echo".to_string(),
            version: "1.0".to_string(),
            completed,
            inputs: Mapping::new(),
            outputs: Mapping::new(),
            meta: Mapping::new(),
            source_line: 3,
        }
    }

    #[test]
    fn test_header_rendering() {
        assert_eq!(entry(false).header(), "- [ ] `a1` — *echo* v1.0");
        assert_eq!(entry(true).header(), "- [x] `a1` — *echo* v1.0");
    }

    #[test]
    fn test_error_accessor() {
        let mut e = entry(true);
        assert_eq!(e.error(), None);
        e.meta.insert("error".to_string(), json!("boom"));
        assert_eq!(e.error(), Some("boom"));
    }
}
