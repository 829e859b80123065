//! `--json` modes must leave stdout as a single JSON document
#![cfg(unix)]
#![allow(clippy::unwrap_used)]

use serde_json::Value;
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const LEDGER: &str = "\
# Actions for 2026-01-15

- [ ] `a1` — *echo* v1.0
```yaml
inputs:
  message: hello
```
";

fn project() -> TempDir {
    let root = TempDir::new().unwrap();
    let actions = root.path().join("actions");
    let script = actions.join("scripts/echo.sh");
    fs::create_dir_all(script.parent().unwrap()).unwrap();
    fs::write(
        &script,
        "#!/bin/sh\ncat >/dev/null\necho '{\"status\":\"success\",\"outputs\":{\"ok\":true}}'\n",
    )
    .unwrap();
    fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
    fs::write(
        actions.join("registry.toml"),
        "[actions.echo]\nscript = \"scripts/echo.sh\"\nversion = \"1.0\"\n",
    )
    .unwrap();
    fs::write(actions.join("2026-01-15.md"), LEDGER).unwrap();
    root
}

fn actledger(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_actledger"))
        .arg("--root")
        .arg(root)
        .args(args)
        .env_remove("ACTLEDGER_CONFIG")
        .env_remove("RUST_LOG")
        .output()
        .unwrap()
}

fn stdout_json(output: &Output) -> Value {
    let stdout = String::from_utf8(output.stdout.clone()).unwrap();
    serde_json::from_str(&stdout).unwrap_or_else(|e| panic!("stdout is not JSON ({e}): {stdout}"))
}

#[test]
fn test_execute_json_is_clean() {
    let root = project();

    let output = actledger(root.path(), &["execute", "--json"]);

    assert!(output.status.success(), "{output:?}");
    let report = stdout_json(&output);
    assert_eq!(report["executed"], 1);
    assert_eq!(report["results"][0]["actionId"], "a1");
    assert_eq!(report["results"][0]["status"], "success");
}

#[test]
fn test_check_json_is_clean() {
    let root = project();

    let output = actledger(root.path(), &["check", "--json"]);

    assert!(output.status.success(), "{output:?}");
    let entries = stdout_json(&output);
    assert_eq!(entries[0]["id"], "a1");
    assert_eq!(entries[0]["completed"], false);
}

#[test]
fn test_audit_json_is_clean() {
    let root = project();

    let output = actledger(root.path(), &["audit", "--json"]);

    assert!(output.status.success(), "{output:?}");
    assert_eq!(stdout_json(&output), Value::Array(vec![]));
}
