//! Script runner
//!
//! Launches an external executable, writes a JSON request to its standard
//! input and reads a JSON response from its standard output within a time
//! bound. The program's own failures (non-zero exit, timeout, garbage output,
//! missing executable) are outcomes, never errors.

use crate::error::RunnerError;
use crate::ledger::Mapping;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// How a script run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeKind {
    /// Exit 0 with a `success` response
    Success,
    /// Exit 0 with an `error` response
    ReportedError,
    /// Non-zero exit code
    NonZeroExit,
    /// Killed after exceeding its timeout
    TimedOut,
    /// Exit 0 but the response was not a valid payload
    InvalidOutput,
    /// The executable is missing or could not be started
    NotRunnable,
}

/// Structured result of one script run
///
/// Standard error is logged for diagnostics and never part of the outcome.
#[derive(Debug, Clone)]
pub struct ScriptOutcome {
    /// How the run ended
    pub kind: OutcomeKind,
    /// Exit code, when the process exited on its own
    pub exit_code: Option<i32>,
    /// Outputs reported by a successful run (empty otherwise)
    pub outputs: Mapping,
    /// Failure description for every non-success outcome
    pub error: Option<String>,
    /// Additional response fields beyond status/outputs/error
    pub extra: Mapping,
    /// Wall-clock time of the run
    pub duration: Duration,
}

impl ScriptOutcome {
    /// Check whether the run succeeded
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    /// Check whether the run was killed on timeout
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.kind == OutcomeKind::TimedOut
    }

    fn failed(kind: OutcomeKind, exit_code: Option<i32>, error: String, duration: Duration) -> Self {
        Self {
            kind,
            exit_code,
            outputs: Mapping::new(),
            error: Some(error),
            extra: Mapping::new(),
            duration,
        }
    }
}

#[derive(Debug, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
enum ResponseStatus {
    Success,
    Error,
}

#[derive(Debug, Deserialize)]
struct ScriptResponse {
    status: Option<ResponseStatus>,
    #[serde(default)]
    outputs: Mapping,
    #[serde(default)]
    error: Option<String>,
    #[serde(flatten)]
    extra: Mapping,
}

/// Runs executables under the request/response contract
///
/// # Examples
///
/// ```ignore
/// let runner = ScriptRunner::new().env("ACTLEDGER_HOOK_DEPTH", "1");
/// let outcome = runner.run(Path::new("scripts/echo.sh"), &request, 30)?;
/// if outcome.is_success() {
///     println!("{:?}", outcome.outputs);
/// }
/// ```
#[derive(Debug, Clone, Default)]
pub struct ScriptRunner {
    env: Vec<(String, String)>,
    working_dir: Option<PathBuf>,
}

impl ScriptRunner {
    /// Create a runner that inherits the parent environment
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an extra environment variable for launched processes
    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Run launched processes in this directory
    #[must_use]
    pub fn working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Run `executable` with `request` on standard input
    ///
    /// # Errors
    ///
    /// Only for input-contract violations: a zero timeout or a request that
    /// cannot be serialized. Everything the program itself does is reported
    /// in the returned [`ScriptOutcome`].
    #[tracing::instrument(skip(self, request), fields(executable = %executable.display()))]
    pub fn run<T: Serialize>(
        &self,
        executable: &Path,
        request: &T,
        timeout_seconds: u64,
    ) -> Result<ScriptOutcome, RunnerError> {
        if timeout_seconds == 0 {
            return Err(RunnerError::InvalidTimeout(timeout_seconds));
        }
        let body = serde_json::to_vec(request)?;

        let start = Instant::now();
        let program = match resolve_executable(executable) {
            Ok(program) => program,
            Err(message) => {
                tracing::debug!(%message, "Executable not runnable");
                return Ok(ScriptOutcome::failed(
                    OutcomeKind::NotRunnable,
                    None,
                    message,
                    start.elapsed(),
                ));
            }
        };

        let mut expression = duct::cmd(program.as_path(), std::iter::empty::<&str>())
            .stdin_bytes(body)
            .stdout_capture()
            .stderr_capture()
            .unchecked();
        if let Some(dir) = &self.working_dir {
            expression = expression.dir(dir);
        }
        for (key, value) in &self.env {
            expression = expression.env(key, value);
        }

        let handle = match expression.start() {
            Ok(handle) => handle,
            Err(e) => {
                return Ok(ScriptOutcome::failed(
                    OutcomeKind::NotRunnable,
                    None,
                    format!("Failed to start {}: {e}", program.display()),
                    start.elapsed(),
                ));
            }
        };

        let output = match handle.wait_timeout(Duration::from_secs(timeout_seconds)) {
            Ok(Some(output)) => output,
            Ok(None) => {
                if let Err(e) = handle.kill() {
                    tracing::warn!(error = %e, "Failed to kill timed-out process");
                }
                tracing::debug!(elapsed_ms = start.elapsed().as_millis(), "Script timed out");
                return Ok(ScriptOutcome::failed(
                    OutcomeKind::TimedOut,
                    None,
                    format!("Timed out after {timeout_seconds} seconds"),
                    start.elapsed(),
                ));
            }
            Err(e) => {
                return Ok(ScriptOutcome::failed(
                    OutcomeKind::NotRunnable,
                    None,
                    format!("Failed to wait for {}: {e}", program.display()),
                    start.elapsed(),
                ));
            }
        };
        let duration = start.elapsed();

        if !output.stderr.is_empty() {
            tracing::debug!(
                stderr = %String::from_utf8_lossy(&output.stderr).trim_end(),
                "Script diagnostics"
            );
        }

        let outcome = interpret(output.status.code(), &output.stdout, duration);
        tracing::debug!(
            kind = ?outcome.kind,
            exit_code = ?outcome.exit_code,
            elapsed_ms = duration.as_millis(),
            "Script finished"
        );
        Ok(outcome)
    }
}

/// Resolve bare program names through `PATH`; check paths exist
fn resolve_executable(executable: &Path) -> Result<PathBuf, String> {
    let is_bare = executable.components().count() == 1 && !executable.is_absolute();
    if is_bare && !executable.exists() {
        return which::which(executable)
            .map_err(|e| format!("Executable '{}' not found: {e}", executable.display()));
    }
    if executable.is_file() {
        Ok(executable.to_path_buf())
    } else {
        Err(format!("Executable not found: {}", executable.display()))
    }
}

fn interpret(exit_code: Option<i32>, stdout: &[u8], duration: Duration) -> ScriptOutcome {
    let response = serde_json::from_slice::<ScriptResponse>(stdout);

    match exit_code {
        Some(0) => {}
        Some(code) => {
            // A failing script may still explain itself
            let error = response
                .ok()
                .and_then(|r| r.error)
                .unwrap_or_else(|| format!("Exited with code {code}"));
            return ScriptOutcome::failed(OutcomeKind::NonZeroExit, Some(code), error, duration);
        }
        None => {
            return ScriptOutcome::failed(
                OutcomeKind::NonZeroExit,
                None,
                "Terminated by signal".to_string(),
                duration,
            );
        }
    }

    let response = match response {
        Ok(response) => response,
        Err(e) => {
            return ScriptOutcome::failed(
                OutcomeKind::InvalidOutput,
                Some(0),
                format!("Invalid JSON response: {e}"),
                duration,
            );
        }
    };

    match response.status {
        Some(ResponseStatus::Error) => ScriptOutcome {
            kind: OutcomeKind::ReportedError,
            exit_code: Some(0),
            outputs: Mapping::new(),
            error: Some(
                response
                    .error
                    .unwrap_or_else(|| "Script reported an error".to_string()),
            ),
            extra: response.extra,
            duration,
        },
        Some(ResponseStatus::Success) | None => ScriptOutcome {
            kind: OutcomeKind::Success,
            exit_code: Some(0),
            outputs: response.outputs,
            error: None,
            extra: response.extra,
            duration,
        },
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use serde_json::json;

    fn ms() -> Duration {
        Duration::from_millis(5)
    }

    #[test]
    fn test_success_response() {
        let out = interpret(
            Some(0),
            br#"{"status":"success","outputs":{"id":7},"triggers":[]}"#,
            ms(),
        );
        assert!(out.is_success());
        assert_eq!(out.outputs["id"], json!(7));
        assert!(out.extra.contains_key("triggers"));
        assert!(out.error.is_none());
    }

    #[test]
    fn test_missing_status_defaults_to_success() {
        let out = interpret(Some(0), br#"{"outputs":{}}"#, ms());
        assert!(out.is_success());
    }

    #[test]
    fn test_reported_error() {
        let out = interpret(Some(0), br#"{"status":"error","error":"bad ticket"}"#, ms());
        assert_eq!(out.kind, OutcomeKind::ReportedError);
        assert_eq!(out.error.as_deref(), Some("bad ticket"));
        assert!(out.outputs.is_empty());
    }

    #[test]
    fn test_nonzero_exit_overrides_payload() {
        let out = interpret(Some(2), br#"{"status":"success","outputs":{"x":1}}"#, ms());
        assert_eq!(out.kind, OutcomeKind::NonZeroExit);
        assert_eq!(out.exit_code, Some(2));
        assert!(out.outputs.is_empty());
        assert_eq!(out.error.as_deref(), Some("Exited with code 2"));
    }

    #[test]
    fn test_invalid_output() {
        for stdout in [&b""[..], b"not json", b"[1,2]", br#"{"status":"maybe"}"#] {
            let out = interpret(Some(0), stdout, ms());
            assert_eq!(out.kind, OutcomeKind::InvalidOutput);
        }
    }

    #[test]
    fn test_zero_timeout_is_contract_violation() {
        let err = ScriptRunner::new()
            .run(Path::new("/bin/true"), &json!({}), 0)
            .unwrap_err();
        assert!(matches!(err, RunnerError::InvalidTimeout(0)));
    }

    #[test]
    fn test_missing_executable_is_outcome() {
        let out = ScriptRunner::new()
            .run(Path::new("/definitely/not/here.sh"), &json!({}), 5)
            .unwrap();
        assert_eq!(out.kind, OutcomeKind::NotRunnable);
        assert!(out.error.is_some());
    }

    #[cfg(unix)]
    mod unix {
        use super::*;
        use std::fs;
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        fn script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
            let path = dir.path().join(name);
            fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            path
        }

        #[test]
        fn test_request_reaches_stdin() {
            let dir = TempDir::new().unwrap();
            let path = script(
                &dir,
                "echo.sh",
                r#"input=$(cat)
printf '{"status":"success","outputs":{"request":%s}}' "$input""#,
            );
            let out = ScriptRunner::new()
                .run(&path, &json!({"kind": "echo", "inputs": {"m": "hi"}}), 10)
                .unwrap();
            assert!(out.is_success(), "{out:?}");
            assert_eq!(out.outputs["request"]["inputs"]["m"], json!("hi"));
        }

        #[test]
        fn test_stderr_excluded_and_env_passed() {
            let dir = TempDir::new().unwrap();
            let path = script(
                &dir,
                "env.sh",
                r#"cat >/dev/null
echo "noise" >&2
printf '{"status":"success","outputs":{"depth":"%s"}}' "$ACTLEDGER_HOOK_DEPTH""#,
            );
            let out = ScriptRunner::new()
                .env("ACTLEDGER_HOOK_DEPTH", "3")
                .run(&path, &json!({}), 10)
                .unwrap();
            assert!(out.is_success());
            assert_eq!(out.outputs["depth"], json!("3"));
        }

        #[test]
        fn test_timeout_kills_process() {
            let dir = TempDir::new().unwrap();
            let path = script(&dir, "slow.sh", "exec sleep 10");
            let start = Instant::now();
            let out = ScriptRunner::new().run(&path, &json!({}), 1).unwrap();
            assert!(out.is_timeout());
            assert!(start.elapsed() < Duration::from_secs(8));
        }

        #[test]
        fn test_nonzero_exit() {
            let dir = TempDir::new().unwrap();
            let path = script(&dir, "fail.sh", "cat >/dev/null\necho 'boom' >&2\nexit 3");
            let out = ScriptRunner::new().run(&path, &json!({}), 10).unwrap();
            assert_eq!(out.kind, OutcomeKind::NonZeroExit);
            assert_eq!(out.exit_code, Some(3));
        }

        #[test]
        fn test_not_executable() {
            let dir = TempDir::new().unwrap();
            let path = dir.path().join("plain.sh");
            fs::write(&path, "#!/bin/sh\n").unwrap();
            fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();
            let out = ScriptRunner::new().run(&path, &json!({}), 5).unwrap();
            assert_eq!(out.kind, OutcomeKind::NotRunnable);
        }
    }
}
