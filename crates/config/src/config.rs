//! Configuration management
//!
//! This module handles loading actledger project configuration from
//! `actledger.toml` at the project root. Every key is optional; a missing
//! file yields the defaults.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// General configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding the date-named ledger files
    #[serde(default = "default_ledger_dir", rename = "ledgerDir")]
    pub ledger_dir: PathBuf,

    /// Action registry file (kind → script, version, timeout)
    #[serde(default = "default_registry")]
    pub registry: PathBuf,

    /// Directory scanned for hook definition files
    #[serde(default = "default_hooks_dir", rename = "hooksDir")]
    pub hooks_dir: PathBuf,

    /// JSON Lines file receiving one record per hook invocation
    #[serde(default = "default_audit_log", rename = "auditLog")]
    pub audit_log: PathBuf,

    /// Environment variable holding the CI run identifier
    #[serde(default = "default_run_id_env", rename = "runIdEnv")]
    pub run_id_env: String,

    /// Commit the ledger after each executed action
    #[serde(default)]
    pub commit: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            ledger_dir: default_ledger_dir(),
            registry: default_registry(),
            hooks_dir: default_hooks_dir(),
            audit_log: default_audit_log(),
            run_id_env: default_run_id_env(),
            commit: false,
        }
    }
}

/// Hook dispatch configuration section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HooksConfig {
    /// Worker threads owned by the async hook supervisor
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings
    #[serde(default)]
    pub general: GeneralConfig,

    /// Hook dispatch settings
    #[serde(default)]
    pub hooks: HooksConfig,

    /// Directory relative paths are resolved against (not serialized)
    #[serde(skip)]
    root: PathBuf,
}

fn default_ledger_dir() -> PathBuf {
    PathBuf::from("actions")
}

fn default_registry() -> PathBuf {
    PathBuf::from("actions/registry.toml")
}

fn default_hooks_dir() -> PathBuf {
    PathBuf::from(".actledger/hooks")
}

fn default_audit_log() -> PathBuf {
    PathBuf::from(".actledger/hook-executions.jsonl")
}

fn default_run_id_env() -> String {
    "GITHUB_RUN_ID".to_string()
}

fn default_workers() -> usize {
    4
}

impl Config {
    /// Name of the project configuration file
    pub const FILE_NAME: &'static str = "actledger.toml";

    /// Load configuration from a project root
    ///
    /// Falls back to defaults when `actledger.toml` does not exist.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load_from_root(root: &Path) -> Result<Self> {
        let config_path = root.join(Self::FILE_NAME);
        if !config_path.exists() {
            tracing::debug!("No {} in {}, using defaults", Self::FILE_NAME, root.display());
            let mut config = Self::default();
            config.root = root.to_path_buf();
            return Ok(config);
        }

        let content = fs::read_to_string(&config_path).map_err(|e| {
            actledger_core::Error::Config(format!(
                "Failed to read config file {}: {e}",
                config_path.display()
            ))
        })?;

        Self::from_toml_str(&content, root)
    }

    /// Load configuration from an explicit file path
    ///
    /// Relative paths inside the file resolve against the file's directory.
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or TOML parsing fails
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|e| {
            actledger_core::Error::Config(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let root = path.parent().unwrap_or(Path::new("."));
        Self::from_toml_str(&content, root)
    }

    /// Parse configuration from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing fails or a value is out of range
    pub fn from_toml_str(toml_content: &str, root: &Path) -> Result<Self> {
        let mut config: Self = toml::from_str(toml_content).map_err(|e| {
            actledger_core::Error::Config(format!("Failed to parse config TOML: {e}"))
        })?;
        config.root = root.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.hooks.workers == 0 {
            return Err(actledger_core::Error::Config(
                "hooks.workers must be at least 1".to_string(),
            ));
        }
        if self.general.run_id_env.trim().is_empty() {
            return Err(actledger_core::Error::Config(
                "general.runIdEnv cannot be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Project root that relative paths resolve against
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a configured path against the project root
    #[must_use]
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }

    /// Absolute ledger directory
    #[must_use]
    pub fn ledger_dir(&self) -> PathBuf {
        self.resolve(&self.general.ledger_dir)
    }

    /// Absolute action registry path
    #[must_use]
    pub fn registry_path(&self) -> PathBuf {
        self.resolve(&self.general.registry)
    }

    /// Absolute hooks directory
    #[must_use]
    pub fn hooks_dir(&self) -> PathBuf {
        self.resolve(&self.general.hooks_dir)
    }

    /// Absolute audit log path
    #[must_use]
    pub fn audit_log_path(&self) -> PathBuf {
        self.resolve(&self.general.audit_log)
    }

    /// Identifier of the current run, `local` outside CI
    #[must_use]
    pub fn run_id(&self) -> String {
        std::env::var(&self.general.run_id_env)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "local".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_when_file_missing() {
        let temp = TempDir::new().unwrap();
        let config = Config::load_from_root(temp.path()).unwrap();

        assert_eq!(config.general.ledger_dir, PathBuf::from("actions"));
        assert_eq!(config.general.run_id_env, "GITHUB_RUN_ID");
        assert!(!config.general.commit);
        assert_eq!(config.hooks.workers, 4);
        assert_eq!(config.ledger_dir(), temp.path().join("actions"));
        assert_eq!(
            config.audit_log_path(),
            temp.path().join(".actledger/hook-executions.jsonl")
        );
    }

    #[test]
    fn test_load_camel_case_keys() {
        let temp = TempDir::new().unwrap();
        fs::write(
            temp.path().join(Config::FILE_NAME),
            r#"
[general]
ledgerDir = "daily"
hooksDir = "hooks"
auditLog = "/var/log/actledger.jsonl"
runIdEnv = "CI_PIPELINE_ID"
commit = true

[hooks]
workers = 2
"#,
        )
        .unwrap();

        let config = Config::load_from_root(temp.path()).unwrap();
        assert_eq!(config.ledger_dir(), temp.path().join("daily"));
        assert_eq!(config.hooks_dir(), temp.path().join("hooks"));
        assert_eq!(
            config.audit_log_path(),
            PathBuf::from("/var/log/actledger.jsonl")
        );
        assert_eq!(config.general.run_id_env, "CI_PIPELINE_ID");
        assert!(config.general.commit);
        assert_eq!(config.hooks.workers, 2);
    }

    #[test]
    fn test_load_explicit_path_resolves_against_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("conf");
        fs::create_dir_all(&nested).unwrap();
        let path = nested.join("custom.toml");
        fs::write(&path, "[general]\nregistry = \"reg.toml\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.registry_path(), nested.join("reg.toml"));
    }

    #[test]
    fn test_zero_workers_rejected() {
        let err = Config::from_toml_str("[hooks]\nworkers = 0\n", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("workers"));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        let err = Config::from_toml_str("[general\n", Path::new(".")).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config TOML"));
    }
}
