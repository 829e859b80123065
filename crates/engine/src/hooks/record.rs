//! Hook execution records

use super::config::LifecycleEvent;
use super::context::{CallDepth, MAX_CALL_DEPTH};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Error prefix of records for hooks refused by loop prevention
pub const DEPTH_EXCEEDED: &str = "DepthExceeded";

/// Outcome of one hook invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    /// The hook succeeded (possibly after retries)
    Success,
    /// The hook failed, timed out or was refused
    Failure,
}

/// One audit entry per hook invocation, never mutated after write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookExecutionRecord {
    /// When the invocation completed
    pub timestamp: DateTime<Utc>,
    /// Hook id
    pub hook_id: String,
    /// Event that selected the hook
    pub event: LifecycleEvent,
    /// Action the event fired for
    pub action_id: String,
    /// Final outcome
    pub status: RecordStatus,
    /// Total time including retries
    pub duration_ms: u64,
    /// Failure description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HookExecutionRecord {
    /// Record for a finished invocation
    #[must_use]
    pub fn finished(
        hook_id: &str,
        event: LifecycleEvent,
        action_id: &str,
        duration: Duration,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            hook_id: hook_id.to_string(),
            event,
            action_id: action_id.to_string(),
            status: if error.is_none() {
                RecordStatus::Success
            } else {
                RecordStatus::Failure
            },
            duration_ms: u64::try_from(duration.as_millis()).unwrap_or(u64::MAX),
            error,
        }
    }

    /// Record for a hook refused because the call depth is exhausted
    #[must_use]
    pub fn depth_exceeded(
        hook_id: &str,
        event: LifecycleEvent,
        action_id: &str,
        depth: CallDepth,
    ) -> Self {
        Self::finished(
            hook_id,
            event,
            action_id,
            Duration::ZERO,
            Some(format!(
                "{DEPTH_EXCEEDED}: call depth {depth} reached the maximum of {MAX_CALL_DEPTH}"
            )),
        )
    }

    /// Check whether the hook succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == RecordStatus::Success
    }

    /// Check whether the hook was refused by loop prevention
    #[must_use]
    pub fn is_depth_exceeded(&self) -> bool {
        self.error
            .as_deref()
            .is_some_and(|e| e.starts_with(DEPTH_EXCEEDED))
    }
}
