//! Action context and call depth
//!
//! The context is the payload hooks receive for one action instance. It is
//! immutable once built; nested firings derive a new context instead of
//! mutating the current one.

use super::config::LifecycleEvent;
use crate::ledger::Mapping;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Deepest level at which hooks still run
pub const MAX_CALL_DEPTH: u32 = 10;

/// Environment variable carrying the call depth into hook processes
pub const HOOK_DEPTH_ENV: &str = "ACTLEDGER_HOOK_DEPTH";

/// Recursion counter for chained lifecycle firings
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct CallDepth(u32);

impl CallDepth {
    /// Depth of a firing not caused by any hook
    pub const ROOT: Self = Self(0);

    /// Create a depth with an explicit value
    #[must_use]
    pub fn new(depth: u32) -> Self {
        Self(depth)
    }

    /// Depth inherited from a parent hook process, or root
    #[must_use]
    pub fn from_env() -> Self {
        std::env::var(HOOK_DEPTH_ENV)
            .ok()
            .and_then(|value| value.trim().parse().ok())
            .map_or(Self::ROOT, Self)
    }

    /// Depth of firings caused by hooks running at this depth
    #[must_use]
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }

    /// Raw depth value
    #[must_use]
    pub fn value(self) -> u32 {
        self.0
    }

    /// Check whether hooks must be refused at this depth
    #[must_use]
    pub fn exceeded(self) -> bool {
        self.0 >= MAX_CALL_DEPTH
    }
}

impl fmt::Display for CallDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of the action as seen by hooks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// The action has not run yet (`before_execute`)
    Pending,
    /// The action succeeded
    Success,
    /// The action failed
    Failure,
    /// The action timed out
    Timeout,
}

impl ActionStatus {
    /// Lifecycle event announcing this final status
    #[must_use]
    pub fn event(self) -> LifecycleEvent {
        match self {
            Self::Pending => LifecycleEvent::BeforeExecute,
            Self::Success => LifecycleEvent::AfterSuccess,
            Self::Failure => LifecycleEvent::AfterFailure,
            Self::Timeout => LifecycleEvent::AfterTimeout,
        }
    }
}

/// Payload passed to hooks for one action instance
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionContext {
    action_id: String,
    action_kind: String,
    status: ActionStatus,
    start_time: DateTime<Utc>,
    end_time: Option<DateTime<Utc>>,
    inputs: Mapping,
    outputs: Mapping,
    error: Option<String>,
    metadata: Mapping,
}

impl ActionContext {
    /// Start building a context
    pub fn builder(
        action_id: impl Into<String>,
        action_kind: impl Into<String>,
    ) -> ActionContextBuilder {
        ActionContextBuilder {
            context: Self {
                action_id: action_id.into(),
                action_kind: action_kind.into(),
                status: ActionStatus::Pending,
                start_time: Utc::now(),
                end_time: None,
                inputs: Mapping::new(),
                outputs: Mapping::new(),
                error: None,
                metadata: Mapping::new(),
            },
        }
    }

    /// Action id
    #[must_use]
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    /// Action kind
    #[must_use]
    pub fn action_kind(&self) -> &str {
        &self.action_kind
    }

    /// Action status
    #[must_use]
    pub fn status(&self) -> ActionStatus {
        self.status
    }

    /// When the action started
    #[must_use]
    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    /// When the action finished, if it has
    #[must_use]
    pub fn end_time(&self) -> Option<DateTime<Utc>> {
        self.end_time
    }

    /// Action inputs
    #[must_use]
    pub fn inputs(&self) -> &Mapping {
        &self.inputs
    }

    /// Action outputs
    #[must_use]
    pub fn outputs(&self) -> &Mapping {
        &self.outputs
    }

    /// Action error
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Arbitrary metadata
    #[must_use]
    pub fn metadata(&self) -> &Mapping {
        &self.metadata
    }

    /// Context for a firing requested by a hook, defaulting to this one's values
    #[must_use]
    pub fn derive(&self, trigger: &HookTrigger) -> Self {
        let mut derived = self.clone();
        if let Some(id) = &trigger.action_id {
            derived.action_id.clone_from(id);
        }
        if let Some(kind) = &trigger.action_kind {
            derived.action_kind.clone_from(kind);
        }
        if let Some(status) = trigger.status {
            derived.status = status;
        }
        if let Some(outputs) = &trigger.outputs {
            derived.outputs.clone_from(outputs);
        }
        derived
    }
}

/// Builder for [`ActionContext`]
#[derive(Debug, Clone)]
pub struct ActionContextBuilder {
    context: ActionContext,
}

impl ActionContextBuilder {
    /// Set the status
    #[must_use]
    pub fn status(mut self, status: ActionStatus) -> Self {
        self.context.status = status;
        self
    }

    /// Set the start time
    #[must_use]
    pub fn start_time(mut self, time: DateTime<Utc>) -> Self {
        self.context.start_time = time;
        self
    }

    /// Set the end time
    #[must_use]
    pub fn end_time(mut self, time: DateTime<Utc>) -> Self {
        self.context.end_time = Some(time);
        self
    }

    /// Set the inputs
    #[must_use]
    pub fn inputs(mut self, inputs: Mapping) -> Self {
        self.context.inputs = inputs;
        self
    }

    /// Set the outputs
    #[must_use]
    pub fn outputs(mut self, outputs: Mapping) -> Self {
        self.context.outputs = outputs;
        self
    }

    /// Set the error
    #[must_use]
    pub fn error(mut self, error: Option<String>) -> Self {
        self.context.error = error;
        self
    }

    /// Set the metadata
    #[must_use]
    pub fn metadata(mut self, metadata: Mapping) -> Self {
        self.context.metadata = metadata;
        self
    }

    /// Finish building
    #[must_use]
    pub fn build(self) -> ActionContext {
        self.context
    }
}

/// A nested firing requested in a hook response's `triggers` list
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookTrigger {
    /// Event to fire
    pub event: LifecycleEvent,
    /// Override for the action id
    #[serde(default)]
    pub action_id: Option<String>,
    /// Override for the action kind
    #[serde(default)]
    pub action_kind: Option<String>,
    /// Override for the status
    #[serde(default)]
    pub status: Option<ActionStatus>,
    /// Override for the outputs
    #[serde(default)]
    pub outputs: Option<Mapping>,
}

/// Request written to a hook script's standard input
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HookRequest<'a> {
    #[serde(flatten)]
    pub context: &'a ActionContext,
    pub hook_config: &'a Mapping,
}
