//! Hook configuration structures
//!
//! Defines hook definitions, lifecycle events, execution modes and the
//! registry the dispatcher selects from.

use crate::ledger::Mapping;
use actledger_core::{Error, Result};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Upper bound for a single retry delay
const MAX_RETRY_DELAY: Duration = Duration::from_secs(3600);

/// Point in an action's lifecycle where hooks run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    /// Before the action script runs
    BeforeExecute,
    /// The action succeeded
    AfterSuccess,
    /// The action failed
    AfterFailure,
    /// The action timed out
    AfterTimeout,
}

impl LifecycleEvent {
    /// All events in lifecycle order
    pub const ALL: [Self; 4] = [
        Self::BeforeExecute,
        Self::AfterSuccess,
        Self::AfterFailure,
        Self::AfterTimeout,
    ];

    /// Get the configuration name of this event
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::BeforeExecute => "before_execute",
            Self::AfterSuccess => "after_success",
            Self::AfterFailure => "after_failure",
            Self::AfterTimeout => "after_timeout",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LifecycleEvent {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|event| event.name() == s)
            .ok_or_else(|| {
                Error::HookConfig(format!(
                    "Unknown lifecycle event '{s}' (expected one of: {})",
                    Self::ALL.map(|e| e.name()).join(", ")
                ))
            })
    }
}

/// Hook execution mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum HookMode {
    /// Blocks the firing group until finished (default)
    #[default]
    Sync,
    /// Detached; never blocks the firing action
    Async,
}

/// A single hook definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookDefinition {
    /// Unique hook identifier
    pub id: String,

    /// Event this hook subscribes to
    pub lifecycle_event: LifecycleEvent,

    /// Action kinds this hook applies to (empty = all kinds)
    #[serde(default)]
    pub kind_filter: IndexSet<String>,

    /// Execution mode (sync, async)
    #[serde(default)]
    pub mode: HookMode,

    /// Execution order (lower numbers run first)
    #[serde(default = "default_order")]
    pub order: i32,

    /// Disabled hooks are never selected
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Executable run under the request/response contract
    pub script_path: PathBuf,

    /// Timeout per attempt in seconds (default: 30)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Additional attempts after a failure (default: 0)
    #[serde(default)]
    pub retry_count: u32,

    /// Base delay between attempts, doubled after each retry (default: 1.0)
    #[serde(default = "default_backoff")]
    pub retry_backoff_seconds: f64,

    /// Opaque settings passed to the script as `hookConfig`
    #[serde(default)]
    pub config: Mapping,
}

fn default_order() -> i32 {
    100
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    30
}

fn default_backoff() -> f64 {
    1.0
}

impl HookDefinition {
    /// Validate hook configuration
    ///
    /// # Errors
    ///
    /// Returns an error for an empty id or script path, a zero timeout, or a
    /// negative or non-finite backoff.
    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(Error::HookConfig("Hook id cannot be empty".to_string()));
        }

        if self.script_path.as_os_str().is_empty() {
            return Err(Error::HookConfig(format!(
                "Hook '{}' has empty 'scriptPath'",
                self.id
            )));
        }

        if self.timeout_seconds == 0 {
            return Err(Error::HookConfig(format!(
                "Hook '{}' has timeoutSeconds = 0; timeouts must be positive",
                self.id
            )));
        }

        if !self.retry_backoff_seconds.is_finite() || self.retry_backoff_seconds < 0.0 {
            return Err(Error::HookConfig(format!(
                "Hook '{}' has invalid retryBackoffSeconds {}",
                self.id, self.retry_backoff_seconds
            )));
        }

        if let Some(kind) = self.kind_filter.iter().find(|k| k.trim().is_empty()) {
            return Err(Error::HookConfig(format!(
                "Hook '{}' has an empty entry '{kind}' in kindFilter",
                self.id
            )));
        }

        Ok(())
    }

    /// Check whether this hook runs for `event` on an action of `kind`
    #[must_use]
    pub fn applies_to(&self, event: LifecycleEvent, kind: &str) -> bool {
        self.enabled
            && self.lifecycle_event == event
            && (self.kind_filter.is_empty() || self.kind_filter.contains(kind))
    }

    /// Delay before the given retry (1-based): `backoff * 2^(retry-1)`, at most an hour
    #[must_use]
    pub fn retry_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry.saturating_sub(1)).unwrap_or(i32::MAX);
        let seconds = self.retry_backoff_seconds * 2f64.powi(exponent);
        Duration::try_from_secs_f64(seconds).map_or(MAX_RETRY_DELAY, |d| d.min(MAX_RETRY_DELAY))
    }
}

/// All registered hooks, in load order
#[derive(Debug, Clone, Default)]
pub struct HookRegistry {
    hooks: Vec<HookDefinition>,
}

impl HookRegistry {
    /// Build a registry, validating every definition
    ///
    /// # Errors
    ///
    /// Returns an error if a definition is invalid or an id is used twice
    pub fn new(hooks: Vec<HookDefinition>) -> Result<Self> {
        let mut seen = HashSet::new();
        for hook in &hooks {
            hook.validate()?;
            if !seen.insert(hook.id.as_str()) {
                return Err(Error::HookConfig(format!(
                    "Duplicate hook id '{}'",
                    hook.id
                )));
            }
        }
        Ok(Self { hooks })
    }

    /// Hooks applicable to `event` for an action of `kind`
    #[must_use]
    pub fn select(&self, event: LifecycleEvent, kind: &str) -> Vec<&HookDefinition> {
        self.hooks
            .iter()
            .filter(|hook| hook.applies_to(event, kind))
            .collect()
    }

    /// Iterate over all hooks
    pub fn iter(&self) -> impl Iterator<Item = &HookDefinition> {
        self.hooks.iter()
    }

    /// Number of registered hooks
    #[must_use]
    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    /// Check if no hooks are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }
}
