//! Hook lifecycle dispatcher
//!
//! Each firing goes through select, group, execute and record:
//!
//! - hooks matching the event and action kind are selected
//! - they are grouped by ascending `order`; groups run strictly one after another
//! - within a group, async hooks are handed to the supervisor first, then the
//!   sync hooks run in parallel and the group waits for them only
//! - every invocation (retries included) produces exactly one record, written
//!   to the audit log as soon as it completes
//!
//! Hook failures never escape a firing. A hook response may request nested
//! firings through `triggers`; those run one call depth deeper, and at the
//! maximum depth hooks are refused with a `DepthExceeded` record.

use super::config::{HookDefinition, HookMode, HookRegistry, LifecycleEvent};
use super::context::{ActionContext, CallDepth, HOOK_DEPTH_ENV, HookRequest, HookTrigger};
use super::record::HookExecutionRecord;
use super::supervisor::Supervisor;
use crate::audit::AuditLog;
use crate::runner::{ScriptOutcome, ScriptRunner};
use actledger_core::Result;
use rayon::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default number of supervisor threads for async hooks
pub const DEFAULT_WORKERS: usize = 4;

struct DispatcherInner {
    registry: HookRegistry,
    audit: Option<Arc<AuditLog>>,
    supervisor: Supervisor,
    runner: ScriptRunner,
    base_depth: CallDepth,
}

/// Fires lifecycle events at registered hooks
///
/// Cloning is cheap; clones share the registry, audit log and supervisor.
#[derive(Clone)]
pub struct HookDispatcher {
    inner: Arc<DispatcherInner>,
}

impl std::fmt::Debug for HookDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HookDispatcher")
            .field("hooks", &self.inner.registry.len())
            .field("base_depth", &self.inner.base_depth)
            .field("supervisor", &self.inner.supervisor)
            .finish_non_exhaustive()
    }
}

impl HookDispatcher {
    /// Create a builder for configuring a `HookDispatcher`
    ///
    /// # Examples
    ///
    /// ```ignore
    /// let dispatcher = HookDispatcher::builder(registry)
    ///     .audit_log(Arc::new(AuditLog::new(config.audit_log_path())))
    ///     .workers(config.hooks.workers)
    ///     .build()?;
    /// let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context);
    /// ```
    #[must_use]
    pub fn builder(registry: HookRegistry) -> HookDispatcherBuilder {
        HookDispatcherBuilder::new(registry)
    }

    /// Registered hooks
    #[must_use]
    pub fn registry(&self) -> &HookRegistry {
        &self.inner.registry
    }

    /// Fire `event` at the dispatcher's base call depth
    ///
    /// Returns the records of sync invocations, nested firings and refused
    /// hooks. Async invocations report only to the audit log.
    pub fn fire(&self, event: LifecycleEvent, context: &ActionContext) -> Vec<HookExecutionRecord> {
        self.fire_at(event, context, self.inner.base_depth)
    }

    /// Fire `event` at an explicit call depth
    pub fn fire_at(
        &self,
        event: LifecycleEvent,
        context: &ActionContext,
        depth: CallDepth,
    ) -> Vec<HookExecutionRecord> {
        self.inner.fire(event, &Arc::new(context.clone()), depth)
    }

    /// Number of async invocations still running
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.supervisor.in_flight()
    }

    /// Block until every async invocation has finished
    pub fn wait_idle(&self) {
        self.inner.supervisor.wait_idle();
    }

    /// Block until idle or `timeout` elapses; returns whether idle was reached
    pub fn wait_idle_timeout(&self, timeout: Duration) -> bool {
        self.inner.supervisor.wait_idle_timeout(timeout)
    }
}

impl DispatcherInner {
    #[tracing::instrument(
        skip(self, context),
        fields(event = %event, action_id = %context.action_id(), depth = depth.value())
    )]
    fn fire(
        self: &Arc<Self>,
        event: LifecycleEvent,
        context: &Arc<ActionContext>,
        depth: CallDepth,
    ) -> Vec<HookExecutionRecord> {
        let selected = self.registry.select(event, context.action_kind());
        if selected.is_empty() {
            tracing::trace!("No hooks selected");
            return Vec::new();
        }

        if depth.exceeded() {
            tracing::warn!(
                hooks = selected.len(),
                "Call depth exhausted; refusing hooks"
            );
            return selected
                .iter()
                .map(|hook| {
                    let record = HookExecutionRecord::depth_exceeded(
                        &hook.id,
                        event,
                        context.action_id(),
                        depth,
                    );
                    self.audit(&record);
                    record
                })
                .collect();
        }

        tracing::debug!(hook_count = selected.len(), "Firing hooks");

        let mut hooks_by_order: BTreeMap<i32, Vec<&HookDefinition>> = BTreeMap::new();
        for hook in selected {
            hooks_by_order.entry(hook.order).or_default().push(hook);
        }

        let mut records = Vec::new();
        for (order, group) in hooks_by_order {
            let (async_hooks, sync_hooks): (Vec<&HookDefinition>, Vec<&HookDefinition>) =
                group.into_iter().partition(|hook| hook.mode == HookMode::Async);

            tracing::debug!(
                order,
                sync = sync_hooks.len(),
                detached = async_hooks.len(),
                "Dispatching order group"
            );

            for hook in async_hooks {
                let inner = Arc::clone(self);
                let hook = hook.clone();
                let context = Arc::clone(context);
                self.supervisor.spawn(move || {
                    let nested = inner.invoke(&hook, event, &context, depth);
                    tracing::trace!(
                        hook_id = %hook.id,
                        nested = nested.len().saturating_sub(1),
                        "Detached hook finished"
                    );
                });
            }

            // Sync hooks of one group run concurrently; the group is a barrier
            let results: Vec<Vec<HookExecutionRecord>> = sync_hooks
                .par_iter()
                .map(|hook| self.invoke(hook, event, context, depth))
                .collect();
            records.extend(results.into_iter().flatten());
        }

        records
    }

    /// Run one hook with retries; returns its record followed by nested ones
    fn invoke(
        self: &Arc<Self>,
        hook: &HookDefinition,
        event: LifecycleEvent,
        context: &Arc<ActionContext>,
        depth: CallDepth,
    ) -> Vec<HookExecutionRecord> {
        let span = tracing::info_span!(
            "hook_execution",
            hook_id = %hook.id,
            hook_order = hook.order,
            hook_mode = ?hook.mode,
            timeout = hook.timeout_seconds,
            retries = hook.retry_count,
        );
        let _guard = span.enter();

        let start = Instant::now();
        let (outcome, error) = self.run_with_retries(hook, context, depth);
        let elapsed = start.elapsed();

        match &error {
            None => tracing::debug!(elapsed_ms = elapsed.as_millis(), "Hook completed successfully"),
            Some(e) => tracing::warn!(
                elapsed_ms = elapsed.as_millis(),
                error = %e,
                "Hook failed; action outcome unaffected"
            ),
        }

        let record =
            HookExecutionRecord::finished(&hook.id, event, context.action_id(), elapsed, error);
        self.audit(&record);

        let mut records = vec![record];
        if let Some(outcome) = outcome {
            for trigger in triggers(&hook.id, &outcome) {
                let derived = Arc::new(context.derive(&trigger));
                records.extend(self.fire(trigger.event, &derived, depth.next()));
            }
        }
        records
    }

    /// Bounded retry loop around the script runner
    ///
    /// Returns the final outcome (if the script could be run at all) and the
    /// error to record, `None` on success.
    fn run_with_retries(
        &self,
        hook: &HookDefinition,
        context: &ActionContext,
        depth: CallDepth,
    ) -> (Option<ScriptOutcome>, Option<String>) {
        let request = HookRequest {
            context,
            hook_config: &hook.config,
        };
        let runner = self
            .runner
            .clone()
            .env(HOOK_DEPTH_ENV, depth.next().to_string());

        let attempts = hook.retry_count.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            if attempt > 1 {
                let delay = hook.retry_delay(attempt - 1);
                tracing::debug!(attempt, delay_ms = delay.as_millis(), "Retrying hook");
                std::thread::sleep(delay);
            }

            match runner.run(&hook.script_path, &request, hook.timeout_seconds) {
                Ok(outcome) if outcome.is_success() => return (Some(outcome), None),
                Ok(outcome) => {
                    let error = outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "Hook failed".to_string());
                    tracing::debug!(attempt, kind = ?outcome.kind, %error, "Hook attempt failed");
                    last_error = Some(error);
                    if attempt == attempts {
                        return (Some(outcome), last_error);
                    }
                }
                // Contract violations do not improve with retries
                Err(e) => return (None, Some(e.to_string())),
            }
        }

        (None, last_error)
    }

    fn audit(&self, record: &HookExecutionRecord) {
        if let Some(audit) = &self.audit
            && let Err(e) = audit.append(record)
        {
            tracing::warn!(hook_id = %record.hook_id, error = %e, "Failed to write audit record");
        }
    }
}

/// Nested firings requested by a hook response
fn triggers(hook_id: &str, outcome: &ScriptOutcome) -> Vec<HookTrigger> {
    let Some(value) = outcome.extra.get("triggers") else {
        return Vec::new();
    };
    match serde_json::from_value::<Vec<HookTrigger>>(value.clone()) {
        Ok(triggers) => triggers,
        Err(e) => {
            tracing::warn!(%hook_id, error = %e, "Ignoring malformed triggers in hook response");
            Vec::new()
        }
    }
}

/// Builder for [`HookDispatcher`]
#[derive(Debug)]
pub struct HookDispatcherBuilder {
    registry: HookRegistry,
    audit: Option<Arc<AuditLog>>,
    workers: usize,
    working_dir: Option<PathBuf>,
    base_depth: Option<CallDepth>,
}

impl HookDispatcherBuilder {
    fn new(registry: HookRegistry) -> Self {
        Self {
            registry,
            audit: None,
            workers: DEFAULT_WORKERS,
            working_dir: None,
            base_depth: None,
        }
    }

    /// Write every record to this audit log
    #[must_use]
    pub fn audit_log(mut self, audit: Arc<AuditLog>) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Number of supervisor threads for async hooks
    #[must_use]
    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    /// Run hook scripts in this directory
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Depth of top-level firings (default: inherited from the environment)
    #[must_use]
    pub fn base_depth(mut self, depth: CallDepth) -> Self {
        self.base_depth = Some(depth);
        self
    }

    /// Build the dispatcher and start its supervisor
    ///
    /// # Errors
    ///
    /// Returns an error if the supervisor thread pool cannot be started
    pub fn build(self) -> Result<HookDispatcher> {
        let mut runner = ScriptRunner::new();
        if let Some(dir) = self.working_dir {
            runner = runner.working_dir(dir);
        }

        Ok(HookDispatcher {
            inner: Arc::new(DispatcherInner {
                registry: self.registry,
                audit: self.audit,
                supervisor: Supervisor::new(self.workers)?,
                runner,
                base_depth: self.base_depth.unwrap_or_else(CallDepth::from_env),
            }),
        })
    }
}

#[cfg(all(test, unix))]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::hooks::{ActionStatus, RecordStatus};
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use std::path::Path;
    use tempfile::TempDir;

    fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, format!("#!/bin/sh\ncat >/dev/null\n{body}\n")).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn hook(id: &str, script_path: &Path, order: i32) -> HookDefinition {
        let mut hook: HookDefinition = toml::from_str(&format!(
            "id = \"{id}\"\nlifecycleEvent = \"after_success\"\nscriptPath = \"{}\"\n",
            script_path.display()
        ))
        .unwrap();
        hook.order = order;
        hook
    }

    fn dispatcher(dir: &TempDir, hooks: Vec<HookDefinition>) -> (HookDispatcher, Arc<AuditLog>) {
        let audit = Arc::new(AuditLog::new(dir.path().join("audit.jsonl")));
        let dispatcher = HookDispatcher::builder(HookRegistry::new(hooks).unwrap())
            .audit_log(Arc::clone(&audit))
            .workers(2)
            .base_depth(CallDepth::ROOT)
            .build()
            .unwrap();
        (dispatcher, audit)
    }

    fn context() -> ActionContext {
        ActionContext::builder("a1", "echo")
            .status(ActionStatus::Success)
            .build()
    }

    #[test]
    fn test_no_matching_hooks() {
        let dir = TempDir::new().unwrap();
        let ok = script(&dir, "ok.sh", "echo '{}'");
        let (dispatcher, audit) = dispatcher(&dir, vec![hook("ok", &ok, 10)]);
        assert!(dispatcher.fire(LifecycleEvent::AfterFailure, &context()).is_empty());
        assert!(audit.read_records().unwrap().is_empty());
    }

    #[test]
    fn test_order_groups_run_sequentially() {
        let dir = TempDir::new().unwrap();
        let trace = dir.path().join("trace");
        let first = script(
            &dir,
            "first.sh",
            &format!("sleep 0.2\necho first >> {}\necho '{{}}'", trace.display()),
        );
        let second = script(
            &dir,
            "second.sh",
            &format!("echo second >> {}\necho '{{}}'", trace.display()),
        );
        let (dispatcher, audit) =
            dispatcher(&dir, vec![hook("second", &second, 20), hook("first", &first, 10)]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        let ids: Vec<&str> = records.iter().map(|r| r.hook_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second"]);
        assert!(records.iter().all(HookExecutionRecord::is_success));
        assert_eq!(fs::read_to_string(&trace).unwrap(), "first\nsecond\n");
        assert_eq!(audit.read_records().unwrap().len(), 2);
    }

    #[test]
    fn test_failing_hook_is_isolated() {
        let dir = TempDir::new().unwrap();
        let bad = script(&dir, "bad.sh", "exit 4");
        let good = script(&dir, "good.sh", "echo '{\"status\":\"success\"}'");
        let (dispatcher, _audit) = dispatcher(
            &dir,
            vec![hook("bad", &bad, 10), hook("good", &good, 10)],
        );

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(records.len(), 2);
        let bad = records.iter().find(|r| r.hook_id == "bad").unwrap();
        assert_eq!(bad.status, RecordStatus::Failure);
        assert_eq!(bad.error.as_deref(), Some("Exited with code 4"));
        assert!(records.iter().find(|r| r.hook_id == "good").unwrap().is_success());
    }

    #[test]
    fn test_retry_produces_single_record() {
        let dir = TempDir::new().unwrap();
        let marker = dir.path().join("attempted");
        let flaky = script(
            &dir,
            "flaky.sh",
            &format!(
                "if [ -f {m} ]; then echo '{{}}'; else touch {m}; exit 1; fi",
                m = marker.display()
            ),
        );
        let mut flaky_hook = hook("flaky", &flaky, 10);
        flaky_hook.retry_count = 2;
        flaky_hook.retry_backoff_seconds = 0.01;
        let (dispatcher, audit) = dispatcher(&dir, vec![flaky_hook]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(records.len(), 1);
        assert!(records[0].is_success());
        assert_eq!(audit.read_records().unwrap().len(), 1);
    }

    #[test]
    fn test_retries_exhausted() {
        let dir = TempDir::new().unwrap();
        let count = dir.path().join("count");
        let broken = script(
            &dir,
            "broken.sh",
            &format!("echo x >> {}\necho '{{\"status\":\"error\",\"error\":\"nope\"}}'", count.display()),
        );
        let mut broken_hook = hook("broken", &broken, 10);
        broken_hook.retry_count = 2;
        broken_hook.retry_backoff_seconds = 0.01;
        let (dispatcher, _audit) = dispatcher(&dir, vec![broken_hook]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].error.as_deref(), Some("nope"));
        assert_eq!(fs::read_to_string(&count).unwrap().lines().count(), 3);
    }

    #[test]
    fn test_self_triggering_hook_stops_at_max_depth() {
        let dir = TempDir::new().unwrap();
        let looping = script(
            &dir,
            "loop.sh",
            r#"echo '{"status":"success","triggers":[{"event":"after_success"}]}'"#,
        );
        let (dispatcher, audit) = dispatcher(&dir, vec![hook("loop", &looping, 10)]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(records.len(), 11);
        assert!(records[..10].iter().all(HookExecutionRecord::is_success));
        assert!(records[10].is_depth_exceeded());
        assert_eq!(audit.read_records().unwrap().len(), 11);
    }

    #[test]
    fn test_trigger_overrides_reach_nested_hooks() {
        let dir = TempDir::new().unwrap();
        let seen = dir.path().join("seen");
        let trigger = script(
            &dir,
            "trigger.sh",
            r#"echo '{"status":"success","triggers":[{"event":"after_failure","actionId":"derived"}]}'"#,
        );
        let listener = script(&dir, "listener.sh", &format!("touch {}\necho '{{}}'", seen.display()));
        let mut listener_hook = hook("listener", &listener, 10);
        listener_hook.lifecycle_event = LifecycleEvent::AfterFailure;
        let (dispatcher, _audit) =
            dispatcher(&dir, vec![hook("trigger", &trigger, 10), listener_hook]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].hook_id, "listener");
        assert_eq!(records[1].action_id, "derived");
        assert_eq!(records[1].event, LifecycleEvent::AfterFailure);
        assert!(seen.exists());
    }

    #[test]
    fn test_async_hook_reports_to_audit_only() {
        let dir = TempDir::new().unwrap();
        let done = dir.path().join("done");
        let slow = script(&dir, "slow.sh", &format!("sleep 0.3\ntouch {}\necho '{{}}'", done.display()));
        let mut slow_hook = hook("slow", &slow, 10);
        slow_hook.mode = HookMode::Async;
        let (dispatcher, audit) = dispatcher(&dir, vec![slow_hook]);

        let records = dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert!(records.is_empty());
        assert!(dispatcher.wait_idle_timeout(Duration::from_secs(10)));
        assert!(done.exists());
        let audited = audit.read_records().unwrap();
        assert_eq!(audited.len(), 1);
        assert_eq!(audited[0].hook_id, "slow");
    }

    #[test]
    fn test_depth_env_passed_to_hooks() {
        let dir = TempDir::new().unwrap();
        let out = dir.path().join("depth");
        let probe = script(
            &dir,
            "probe.sh",
            &format!("printf '%s' \"$ACTLEDGER_HOOK_DEPTH\" > {}\necho '{{}}'", out.display()),
        );
        let audit = Arc::new(AuditLog::new(dir.path().join("audit.jsonl")));
        let dispatcher = HookDispatcher::builder(HookRegistry::new(vec![hook("probe", &probe, 10)]).unwrap())
            .audit_log(audit)
            .workers(1)
            .base_depth(CallDepth::new(3))
            .build()
            .unwrap();

        dispatcher.fire(LifecycleEvent::AfterSuccess, &context());
        assert_eq!(fs::read_to_string(&out).unwrap(), "4");
    }
}
