//! In-place ledger editor
//!
//! Rewrites a single entry and copies every other line through verbatim, so
//! the diff of a write touches only the target entry. The block is
//! re-rendered only when outputs or meta actually change, and an update that
//! leaves the entry as it was returns the input unchanged.

use super::entry::{ActionEntry, Mapping};
use super::parser::{EntrySpan, scan};
use super::{line_ending, trim_eol};
use crate::error::EditError;

/// Who is asking for the edit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpdateOrigin {
    /// An arbitrary caller such as a proposal tool
    #[default]
    Proposal,
    /// The execution loop recording an outcome
    Execution,
}

/// Changes to apply to one entry
///
/// Inputs are fixed at proposal time and cannot be part of an update.
#[derive(Debug, Clone, Default)]
pub struct EntryUpdate {
    origin: UpdateOrigin,
    completed: Option<bool>,
    outputs: Option<Mapping>,
    meta: Option<Mapping>,
}

impl EntryUpdate {
    /// Start an update on behalf of an arbitrary caller
    #[must_use]
    pub fn proposal() -> Self {
        Self::default()
    }

    /// Start an update on behalf of the execution path
    #[must_use]
    pub fn execution() -> Self {
        Self {
            origin: UpdateOrigin::Execution,
            ..Self::default()
        }
    }

    /// Set the completed flag
    #[must_use]
    pub fn completed(mut self, completed: bool) -> Self {
        self.completed = Some(completed);
        self
    }

    /// Merge these outputs into the entry
    #[must_use]
    pub fn outputs(mut self, outputs: Mapping) -> Self {
        self.outputs = Some(outputs);
        self
    }

    /// Merge this metadata into the entry
    #[must_use]
    pub fn meta(mut self, meta: Mapping) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Origin of this update
    #[must_use]
    pub fn origin(&self) -> UpdateOrigin {
        self.origin
    }

    fn touches_data(&self) -> bool {
        self.outputs.is_some() || self.meta.is_some()
    }
}

/// Apply `update` to the entry `entry_id` and return the new ledger text
///
/// # Errors
///
/// - [`EditError::NotFound`] if no entry has this id
/// - [`EditError::ImmutableEntry`] if the entry is completed and the update would alter it
/// - [`EditError::InvalidUpdate`] if the update is not allowed on a pending entry
/// - [`EditError::Parse`] if the ledger is malformed
pub fn update_entry(text: &str, entry_id: &str, update: &EntryUpdate) -> Result<String, EditError> {
    let scanned = scan(text)?;
    let (entry, span) = scanned
        .entries
        .iter()
        .find(|(entry, _)| entry.id == entry_id)
        .ok_or_else(|| EditError::NotFound(entry_id.to_string()))?;

    check_allowed(entry, update)?;

    let completed = update.completed.unwrap_or(entry.completed);
    let outputs = merge(&entry.outputs, update.outputs.as_ref());
    let meta = merge(&entry.meta, update.meta.as_ref());

    if completed && !entry.completed && meta.is_empty() {
        return Err(EditError::InvalidUpdate {
            id: entry.id.clone(),
            reason: "completing an entry requires execution metadata".to_string(),
        });
    }

    let header_changed = completed != entry.completed;
    let block_changed = outputs != entry.outputs || meta != entry.meta;
    if !header_changed && !block_changed {
        tracing::trace!(action_id = %entry.id, "Update is a no-op");
        return Ok(text.to_string());
    }

    let lines = &scanned.lines;
    let mut out = String::with_capacity(text.len() + 256);

    for line in &lines[..span.header] {
        out.push_str(line);
    }

    let header = lines[span.header];
    if header_changed {
        out.push_str(&flip_checkbox(header, completed));
    } else {
        out.push_str(header);
    }

    out.push_str(lines[span.open_fence]);
    if block_changed {
        let ending = line_ending(lines[span.open_fence]);
        for line in render_block(&entry.id, span, update)?.lines() {
            out.push_str(line);
            out.push_str(ending);
        }
    } else {
        for line in &lines[span.open_fence + 1..span.close_fence] {
            out.push_str(line);
        }
    }

    for line in &lines[span.close_fence..] {
        out.push_str(line);
    }

    tracing::debug!(
        action_id = %entry.id,
        completed,
        block_changed,
        "Rewrote ledger entry"
    );
    Ok(out)
}

fn check_allowed(entry: &ActionEntry, update: &EntryUpdate) -> Result<(), EditError> {
    let immutable = |reason: &str| EditError::ImmutableEntry {
        id: entry.id.clone(),
        reason: reason.to_string(),
    };
    let invalid = |reason: &str| EditError::InvalidUpdate {
        id: entry.id.clone(),
        reason: reason.to_string(),
    };

    if entry.completed {
        if update.completed == Some(false) {
            return Err(immutable("a completed entry cannot return to pending"));
        }
        if update.origin == UpdateOrigin::Proposal && update.touches_data() {
            return Err(immutable("only the execution path may record outputs or meta"));
        }
        return Ok(());
    }

    match update.origin {
        UpdateOrigin::Proposal => {
            if update.completed == Some(true) {
                return Err(invalid("only the execution path may complete an entry"));
            }
            if update.touches_data() {
                return Err(invalid(
                    "outputs and meta of a pending entry are written only on completion",
                ));
            }
        }
        UpdateOrigin::Execution => {
            if update.completed != Some(true) && update.touches_data() {
                return Err(invalid(
                    "outputs and meta require promoting the entry to completed",
                ));
            }
        }
    }
    Ok(())
}

fn merge(current: &Mapping, update: Option<&Mapping>) -> Mapping {
    let mut merged = current.clone();
    if let Some(update) = update {
        for (key, value) in update {
            merged.insert(key.clone(), value.clone());
        }
    }
    merged
}

/// Replace the checkbox character, keeping the rest of the line as-is
fn flip_checkbox(header: &str, completed: bool) -> String {
    let mark = if completed { 'x' } else { ' ' };
    // Headers always start with the ASCII prefix "- [" followed by the mark
    let rest = header.get(4..).unwrap_or_else(|| trim_eol(header));
    format!("- [{mark}{rest}")
}

fn render_block(id: &str, span: &EntrySpan, update: &EntryUpdate) -> Result<String, EditError> {
    let serialize_error = |e: serde_yaml::Error| EditError::Serialize {
        id: id.to_string(),
        message: e.to_string(),
    };

    let mut block = span.block.clone();
    for (key, changes) in [("outputs", &update.outputs), ("meta", &update.meta)] {
        let Some(changes) = changes else { continue };

        let mut section = match block.get(key) {
            Some(serde_yaml::Value::Mapping(existing)) => existing.clone(),
            _ => serde_yaml::Mapping::new(),
        };
        for (k, v) in changes {
            let value = serde_yaml::to_value(v).map_err(serialize_error)?;
            section.insert(serde_yaml::Value::String(k.clone()), value);
        }
        block.insert(
            serde_yaml::Value::String(key.to_string()),
            serde_yaml::Value::Mapping(section),
        );
    }

    serde_yaml::to_string(&serde_yaml::Value::Mapping(block)).map_err(serialize_error)
}
