//! Execution loop
//!
//! Runs the pending entries of a ledger file one at a time, in ledger order.
//! Each outcome is written back into the file (and optionally committed)
//! before the next entry starts, so a crash never loses a finished action
//! and a rerun simply skips what is already completed.

use crate::audit::AuditLog;
use crate::error::ExecuteError;
use crate::fs::atomic_write;
use crate::git::{GitCommitter, commit_message};
use crate::hooks::{ActionContext, ActionStatus, HookDispatcher, HookLoader, LifecycleEvent};
use crate::ledger::{ActionEntry, EntryUpdate, Mapping, parse, update_entry};
use crate::runner::{OutcomeKind, ScriptOutcome, ScriptRunner};
use actledger_config::{ActionRegistry, Config, RegistryEntry};
use actledger_core::{CURRENT_ENVIRONMENT, Committer, NoCommit, RuntimeEnvironment};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Final status of one entry in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    /// The action script succeeded
    Success,
    /// The action script failed
    Error,
    /// The action script was killed on timeout
    Timeout,
    /// The entry was not run (unknown kind, version or environment mismatch)
    Skipped,
}

impl ResultStatus {
    /// Check whether this status counts as a failure
    #[must_use]
    pub fn is_failure(self) -> bool {
        matches!(self, Self::Error | Self::Timeout)
    }
}

/// Result of one pending entry
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResult {
    /// Entry id
    pub action_id: String,
    /// Entry kind
    pub kind: String,
    /// Final status
    pub status: ResultStatus,
    /// Outputs reported by the action (empty unless successful)
    pub outputs: Mapping,
    /// Failure or skip reason
    pub error: Option<String>,
    /// Completion time (RFC 3339, UTC), absent when skipped
    pub executed_at: Option<String>,
    /// Run identifier, absent when skipped
    pub run_id: Option<String>,
    /// Wall-clock time of the action script
    pub duration_ms: u64,
}

impl ActionResult {
    fn skipped(entry: &ActionEntry, reason: String) -> Self {
        Self {
            action_id: entry.id.clone(),
            kind: entry.kind.clone(),
            status: ResultStatus::Skipped,
            outputs: Mapping::new(),
            error: Some(reason),
            executed_at: None,
            run_id: None,
            duration_ms: 0,
        }
    }
}

/// Summary of a run over one or more ledger files
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionReport {
    /// Entries in the ledger(s)
    pub total: usize,
    /// Entries pending before the run
    pub pending: usize,
    /// Entries whose script was run
    pub executed: usize,
    /// Entries that succeeded
    pub successful: usize,
    /// Entries that failed or timed out
    pub failed: usize,
    /// Entries that were not run
    pub skipped: usize,
    /// Per-entry results, in ledger order
    pub results: Vec<ActionResult>,
}

impl ExecutionReport {
    fn record(&mut self, result: ActionResult) {
        match result.status {
            ResultStatus::Skipped => self.skipped += 1,
            ResultStatus::Success => {
                self.executed += 1;
                self.successful += 1;
            }
            ResultStatus::Error | ResultStatus::Timeout => {
                self.executed += 1;
                self.failed += 1;
            }
        }
        self.results.push(result);
    }

    /// Fold another report into this one
    pub fn merge(&mut self, other: Self) {
        self.total += other.total;
        self.pending += other.pending;
        self.executed += other.executed;
        self.successful += other.successful;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.results.extend(other.results);
    }

    /// Check whether any action failed
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failed > 0
    }

    /// Results of failed actions
    pub fn failures(&self) -> impl Iterator<Item = &ActionResult> {
        self.results.iter().filter(|r| r.status.is_failure())
    }
}

/// Request written to an action script's standard input
#[derive(Debug, Serialize)]
struct ActionRequest<'a> {
    kind: &'a str,
    version: &'a str,
    inputs: &'a Mapping,
}

/// Runs pending ledger entries through their registered scripts
pub struct LedgerExecutor {
    registry: ActionRegistry,
    dispatcher: HookDispatcher,
    committer: Box<dyn Committer>,
    runner: ScriptRunner,
    run_id: String,
    environment: RuntimeEnvironment,
}

impl std::fmt::Debug for LedgerExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerExecutor")
            .field("kinds", &self.registry.len())
            .field("dispatcher", &self.dispatcher)
            .field("run_id", &self.run_id)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl LedgerExecutor {
    /// Create an executor that never commits, with run id `local`
    #[must_use]
    pub fn new(registry: ActionRegistry, dispatcher: HookDispatcher) -> Self {
        Self {
            registry,
            dispatcher,
            committer: Box::new(NoCommit),
            runner: ScriptRunner::new(),
            run_id: "local".to_string(),
            environment: *CURRENT_ENVIRONMENT,
        }
    }

    /// Build an executor from project configuration
    ///
    /// Loads the action registry and hook definitions, opens the audit log and
    /// commits through git when `general.commit` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the registry or a hook file is invalid, or the
    /// hook supervisor cannot be started
    pub fn from_config(config: &Config) -> actledger_core::Result<Self> {
        let registry = ActionRegistry::load(&config.registry_path())?;
        let hooks = HookLoader::new(&config.hooks_dir()).load()?;

        let root = config.root();
        let has_root = !root.as_os_str().is_empty();

        let mut builder = HookDispatcher::builder(hooks)
            .audit_log(Arc::new(AuditLog::new(config.audit_log_path())))
            .workers(config.hooks.workers);
        if has_root {
            builder = builder.working_dir(root);
        }

        let mut executor = Self::new(registry, builder.build()?).with_run_id(config.run_id());
        if has_root {
            executor = executor.with_working_dir(root);
        }
        if config.general.commit {
            executor = executor.with_committer(GitCommitter::new());
        }
        Ok(executor)
    }

    /// Commit each rewritten ledger through `committer`
    #[must_use]
    pub fn with_committer(mut self, committer: impl Committer + 'static) -> Self {
        self.committer = Box::new(committer);
        self
    }

    /// Record `run_id` in the meta of executed entries
    #[must_use]
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Treat the process as running in `environment`
    #[must_use]
    pub fn with_environment(mut self, environment: RuntimeEnvironment) -> Self {
        self.environment = environment;
        self
    }

    /// Run action scripts in `dir`
    #[must_use]
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.runner = self.runner.working_dir(dir);
        self
    }

    /// Hook dispatcher, for waiting on detached hooks before exit
    #[must_use]
    pub fn dispatcher(&self) -> &HookDispatcher {
        &self.dispatcher
    }

    /// Run every pending entry of the ledger at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the ledger cannot be read, parsed or written back.
    /// Action failures are not errors; they are recorded in the ledger and
    /// the report.
    #[tracing::instrument(skip(self, path), fields(file = %path.display()))]
    pub fn execute_file(&self, path: &Path) -> Result<ExecutionReport, ExecuteError> {
        let text = read_ledger(path)?;
        let entries = parse(&text).map_err(|e| e.with_file(path.display().to_string()))?;

        let mut report = ExecutionReport {
            total: entries.len(),
            ..ExecutionReport::default()
        };
        let pending: Vec<&ActionEntry> = entries.iter().filter(|e| e.is_pending()).collect();
        report.pending = pending.len();

        if pending.is_empty() {
            tracing::info!(total = report.total, "No pending actions");
            return Ok(report);
        }

        for entry in pending {
            let result = self.execute_entry(path, entry)?;
            report.record(result);
        }

        tracing::info!(
            executed = report.executed,
            successful = report.successful,
            failed = report.failed,
            skipped = report.skipped,
            "Ledger processed"
        );
        Ok(report)
    }

    fn execute_entry(&self, path: &Path, entry: &ActionEntry) -> Result<ActionResult, ExecuteError> {
        let span = tracing::info_span!("action", action_id = %entry.id, kind = %entry.kind);
        let _guard = span.enter();

        let registered = match self.admit(entry) {
            Ok(registered) => registered,
            Err(reason) => {
                tracing::warn!(%reason, "Skipping action");
                return Ok(ActionResult::skipped(entry, reason));
            }
        };

        let start_time = Utc::now();
        let context = ActionContext::builder(&entry.id, &entry.kind)
            .start_time(start_time)
            .inputs(entry.inputs.clone())
            .build();
        self.dispatcher.fire(LifecycleEvent::BeforeExecute, &context);

        let request = ActionRequest {
            kind: &entry.kind,
            version: &entry.version,
            inputs: &entry.inputs,
        };
        tracing::info!(script = %registered.script.display(), "Running action");
        let outcome = self
            .runner
            .run(&registered.script, &request, registered.timeout)?;
        let end_time = Utc::now();

        let (status, action_status) = match outcome.kind {
            OutcomeKind::Success => (ResultStatus::Success, ActionStatus::Success),
            OutcomeKind::TimedOut => (ResultStatus::Timeout, ActionStatus::Timeout),
            _ => (ResultStatus::Error, ActionStatus::Failure),
        };
        match &outcome.error {
            None => tracing::info!(elapsed_ms = outcome.duration.as_millis(), "Action succeeded"),
            Some(error) => tracing::warn!(
                elapsed_ms = outcome.duration.as_millis(),
                %error,
                "Action failed"
            ),
        }

        let executed_at = end_time.to_rfc3339_opts(SecondsFormat::Secs, true);
        let meta = self.meta(&executed_at, &outcome);
        let update = EntryUpdate::execution()
            .completed(true)
            .outputs(outcome.outputs.clone())
            .meta(meta.clone());
        if self.record_outcome(path, &entry.id, &update)? {
            self.commit(path, &entry.id);
        }

        let context = ActionContext::builder(&entry.id, &entry.kind)
            .status(action_status)
            .start_time(start_time)
            .end_time(end_time)
            .inputs(entry.inputs.clone())
            .outputs(outcome.outputs.clone())
            .error(outcome.error.clone())
            .metadata(meta)
            .build();
        self.dispatcher.fire(action_status.event(), &context);

        Ok(ActionResult {
            action_id: entry.id.clone(),
            kind: entry.kind.clone(),
            status,
            outputs: outcome.outputs,
            error: outcome.error,
            executed_at: Some(executed_at),
            run_id: Some(self.run_id.clone()),
            duration_ms: duration_ms(start_time, end_time),
        })
    }

    /// Registry entry for `entry`, or the reason it may not run here
    fn admit(&self, entry: &ActionEntry) -> Result<&RegistryEntry, String> {
        let registered = self
            .registry
            .get(&entry.kind)
            .ok_or_else(|| format!("Action kind '{}' is not registered", entry.kind))?;

        if registered.version != entry.version {
            return Err(format!(
                "Action kind '{}' is registered at v{}, entry declares v{}",
                entry.kind, registered.version, entry.version
            ));
        }

        if !registered.environment.allows(self.environment) {
            return Err(format!(
                "Action requires '{}' environment, current is '{}'",
                registered.environment.name(),
                self.environment
            ));
        }

        Ok(registered)
    }

    fn meta(&self, executed_at: &str, outcome: &ScriptOutcome) -> Mapping {
        let mut meta = Mapping::new();
        meta.insert("executedAt".to_string(), Value::from(executed_at));
        meta.insert("runId".to_string(), Value::from(self.run_id.as_str()));
        if let Some(error) = &outcome.error {
            meta.insert("error".to_string(), Value::from(error.as_str()));
        }
        meta
    }

    /// Apply `update` to the current file content; returns whether it was written
    fn record_outcome(
        &self,
        path: &Path,
        action_id: &str,
        update: &EntryUpdate,
    ) -> Result<bool, ExecuteError> {
        // The file may have changed since the loop started
        let current = read_ledger(path)?;
        let updated = update_entry(&current, action_id, update)?;
        if updated == current {
            return Ok(false);
        }

        atomic_write(path, updated.as_bytes()).map_err(|e| match e {
            actledger_core::Error::FileWrite { path, source } => ExecuteError::Write { path, source },
            other => ExecuteError::Write {
                path: path.to_path_buf(),
                source: std::io::Error::other(other.to_string()),
            },
        })?;
        tracing::debug!("Recorded outcome in ledger");
        Ok(true)
    }

    fn commit(&self, path: &Path, action_id: &str) {
        match self.committer.commit(path, &commit_message(action_id)) {
            Ok(true) => tracing::info!("Committed outcome"),
            Ok(false) => tracing::debug!("Nothing to commit"),
            Err(e) => tracing::warn!(error = %e, "Failed to commit outcome; continuing"),
        }
    }
}

fn read_ledger(path: &Path) -> Result<String, ExecuteError> {
    fs::read_to_string(path).map_err(|source| ExecuteError::Read {
        path: path.to_path_buf(),
        source,
    })
}

fn duration_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> u64 {
    u64::try_from((end - start).num_milliseconds()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::hooks::{CallDepth, HookDefinition, HookRegistry};
    use actledger_config::EnvironmentConstraint;
    use indexmap::IndexMap;
    use std::cell::RefCell;
    use std::rc::Rc;
    use tempfile::TempDir;

    const LEDGER: &str = "# Actions for 2026-01-15\n\n- [ ] `a1` — *echo* v1.0\n```yaml\ninputs:\n  message: hi\n```\n";

    fn registry(script: &Path, environment: EnvironmentConstraint) -> ActionRegistry {
        let mut entries = IndexMap::new();
        entries.insert(
            "echo".to_string(),
            RegistryEntry {
                script: script.to_path_buf(),
                version: "1.0".to_string(),
                timeout: 10,
                environment,
            },
        );
        ActionRegistry::from_entries(entries)
    }

    fn executor(registry: ActionRegistry) -> LedgerExecutor {
        let dispatcher = HookDispatcher::builder(HookRegistry::default())
            .workers(1)
            .base_depth(CallDepth::ROOT)
            .build()
            .unwrap();
        LedgerExecutor::new(registry, dispatcher)
            .with_run_id("42")
            .with_environment(RuntimeEnvironment::Local)
    }

    #[derive(Clone, Default)]
    struct RecordingCommitter {
        messages: Rc<RefCell<Vec<String>>>,
    }

    impl Committer for RecordingCommitter {
        fn commit(&self, _path: &Path, message: &str) -> actledger_core::Result<bool> {
            self.messages.borrow_mut().push(message.to_string());
            Ok(true)
        }
    }

    #[test]
    fn test_unknown_kind_skipped_without_write() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("2026-01-15.md");
        fs::write(&ledger, LEDGER).unwrap();

        let report = executor(ActionRegistry::default()).execute_file(&ledger).unwrap();
        assert_eq!(report.pending, 1);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.executed, 0);
        assert_eq!(report.results[0].status, ResultStatus::Skipped);
        assert_eq!(fs::read_to_string(&ledger).unwrap(), LEDGER);
    }

    #[test]
    fn test_environment_mismatch_skipped() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("2026-01-15.md");
        fs::write(&ledger, LEDGER).unwrap();

        let report = executor(registry(Path::new("/bin/true"), EnvironmentConstraint::CiOnly))
            .execute_file(&ledger)
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert!(
            report.results[0]
                .error
                .as_deref()
                .unwrap()
                .contains("'ci-only' environment")
        );
        assert_eq!(fs::read_to_string(&ledger).unwrap(), LEDGER);
    }

    #[test]
    fn test_version_mismatch_skipped() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("2026-01-15.md");
        fs::write(&ledger, LEDGER.replace("v1.0", "v2.0")).unwrap();

        let report = executor(registry(Path::new("/bin/true"), EnvironmentConstraint::Any))
            .execute_file(&ledger)
            .unwrap();
        assert_eq!(report.skipped, 1);
        assert!(report.results[0].error.as_deref().unwrap().contains("v2.0"));
    }

    #[test]
    fn test_parse_error_names_file() {
        let dir = TempDir::new().unwrap();
        let ledger = dir.path().join("broken.md");
        fs::write(&ledger, "- [ ] `a1` — *echo* v1.0\nno fence here\n").unwrap();

        let err = executor(ActionRegistry::default())
            .execute_file(&ledger)
            .unwrap_err();
        let ExecuteError::Parse(parse) = err else {
            panic!("expected parse error, got {err:?}");
        };
        assert!(parse.file.unwrap().ends_with("broken.md"));
    }

    #[test]
    fn test_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = executor(ActionRegistry::default())
            .execute_file(&dir.path().join("none.md"))
            .unwrap_err();
        assert!(matches!(err, ExecuteError::Read { .. }));
    }

    /// Collects the field names declared by `execute_file` spans
    #[derive(Clone, Default)]
    struct SpanFields(Arc<std::sync::Mutex<Vec<String>>>);

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for SpanFields {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if attrs.metadata().name() == "execute_file" {
                let fields = attrs.metadata().fields().iter().map(|f| f.name().to_string());
                self.0.lock().unwrap().extend(fields);
            }
        }
    }

    #[test]
    fn test_file_span_records_name_once() {
        use tracing_subscriber::layer::SubscriberExt;

        let dir = TempDir::new().unwrap();
        let fields = SpanFields::default();
        let subscriber = tracing_subscriber::registry().with(fields.clone());

        tracing::subscriber::with_default(subscriber, || {
            let _ = executor(ActionRegistry::default()).execute_file(&dir.path().join("a.md"));
        });

        assert_eq!(*fields.0.lock().unwrap(), vec!["file".to_string()]);
    }

    #[test]
    fn test_report_merge() {
        let mut first = ExecutionReport {
            total: 2,
            pending: 1,
            executed: 1,
            failed: 1,
            ..ExecutionReport::default()
        };
        first.merge(ExecutionReport {
            total: 3,
            pending: 2,
            executed: 2,
            successful: 2,
            ..ExecutionReport::default()
        });
        assert_eq!(first.total, 5);
        assert_eq!(first.executed, 3);
        assert!(first.has_failures());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_success_promotes_entry_and_commits() {
            let dir = TempDir::new().unwrap();
            let echo = script(
                &dir,
                "echo.sh",
                r#"input=$(cat)
printf '{"status":"success","outputs":{"request":%s}}' "$input""#,
            );
            let ledger = dir.path().join("2026-01-15.md");
            fs::write(&ledger, LEDGER).unwrap();

            let committer = RecordingCommitter::default();
            let report = executor(registry(&echo, EnvironmentConstraint::Any))
                .with_committer(committer.clone())
                .execute_file(&ledger)
                .unwrap();

            assert_eq!(report.successful, 1);
            let result = &report.results[0];
            assert_eq!(result.run_id.as_deref(), Some("42"));
            assert_eq!(result.outputs["request"]["kind"], Value::from("echo"));
            assert_eq!(result.outputs["request"]["version"], Value::from("1.0"));
            assert_eq!(
                result.outputs["request"]["inputs"]["message"],
                Value::from("hi")
            );

            let entries = parse(&fs::read_to_string(&ledger).unwrap()).unwrap();
            assert!(entries[0].completed);
            assert_eq!(entries[0].meta["runId"], Value::from("42"));
            assert!(entries[0].meta["executedAt"].as_str().unwrap().ends_with('Z'));
            assert!(entries[0].error().is_none());
            assert_eq!(
                *committer.messages.borrow(),
                vec!["Execute action a1 [skip ci]".to_string()]
            );
        }

        #[test]
        fn test_timeout_recorded() {
            let dir = TempDir::new().unwrap();
            let slow = script(&dir, "slow.sh", "exec sleep 10");
            let ledger = dir.path().join("2026-01-15.md");
            fs::write(&ledger, LEDGER).unwrap();

            let mut entries = IndexMap::new();
            entries.insert(
                "echo".to_string(),
                RegistryEntry {
                    script: slow,
                    version: "1.0".to_string(),
                    timeout: 1,
                    environment: EnvironmentConstraint::Any,
                },
            );
            let registry = ActionRegistry::from_entries(entries);

            let payload = dir.path().join("timeout-payload.json");
            let on_timeout = script(
                &dir,
                "on-timeout.sh",
                &format!(
                    "cat > '{}'\necho '{{\"status\":\"success\"}}'",
                    payload.display()
                ),
            );
            let hook: HookDefinition = toml::from_str(&format!(
                "id = \"on-timeout\"\nlifecycleEvent = \"after_timeout\"\nscriptPath = \"{}\"\n",
                on_timeout.display()
            ))
            .unwrap();
            let audit = Arc::new(AuditLog::new(dir.path().join("audit.jsonl")));
            let dispatcher = HookDispatcher::builder(HookRegistry::new(vec![hook]).unwrap())
                .audit_log(Arc::clone(&audit))
                .workers(1)
                .base_depth(CallDepth::ROOT)
                .build()
                .unwrap();
            let executor = LedgerExecutor::new(registry, dispatcher)
                .with_run_id("42")
                .with_environment(RuntimeEnvironment::Local);

            let report = executor.execute_file(&ledger).unwrap();
            assert_eq!(report.failed, 1);
            assert_eq!(report.results[0].status, ResultStatus::Timeout);

            let records = audit.read_records().unwrap();
            assert_eq!(records.len(), 1);
            assert_eq!(records[0].hook_id, "on-timeout");
            assert_eq!(records[0].event, LifecycleEvent::AfterTimeout);
            assert!(records[0].is_success());

            let request: Value =
                serde_json::from_str(&fs::read_to_string(&payload).unwrap()).unwrap();
            assert_eq!(request["actionId"], Value::from("a1"));
            assert_eq!(request["status"], Value::from("timeout"));

            let entries = parse(&fs::read_to_string(&ledger).unwrap()).unwrap();
            assert!(entries[0].completed);
            assert!(entries[0].error().unwrap().contains("Timed out"));
            assert!(entries[0].outputs.is_empty());
        }
    }
}
