//! Action registry
//!
//! Pins every action kind to the script that implements it, the version a
//! ledger entry must declare, a timeout and an environment constraint.
//!
//! ```toml
//! [actions.jira-comment]
//! script = "../scripts/jira-comment.py"
//! version = "1.0"
//! timeout = 120
//! environment = "ci-only"
//! ```

use crate::Result;
use actledger_core::{Error, RuntimeEnvironment};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Where an action kind is allowed to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EnvironmentConstraint {
    /// Runs everywhere (default)
    #[default]
    Any,
    /// Runs only on CI runners
    CiOnly,
    /// Runs only outside CI
    LocalOnly,
}

impl EnvironmentConstraint {
    /// Check whether the constraint admits the given environment
    #[must_use]
    pub fn allows(&self, env: RuntimeEnvironment) -> bool {
        match self {
            Self::Any => true,
            Self::CiOnly => env == RuntimeEnvironment::Ci,
            Self::LocalOnly => env == RuntimeEnvironment::Local,
        }
    }

    /// Get the configuration name of this constraint
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::CiOnly => "ci-only",
            Self::LocalOnly => "local-only",
        }
    }
}

/// Registration of a single action kind
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryEntry {
    /// Executable implementing the action
    pub script: PathBuf,

    /// Version ledger entries must declare
    pub version: String,

    /// Timeout in seconds (default: 300)
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Environment constraint (default: any)
    #[serde(default)]
    pub environment: EnvironmentConstraint,
}

fn default_timeout() -> u64 {
    300
}

#[derive(Debug, Default, Deserialize)]
struct RegistryFile {
    #[serde(default)]
    actions: IndexMap<String, RegistryEntry>,
}

/// Registered action kinds, in file order
#[derive(Debug, Clone, Default)]
pub struct ActionRegistry {
    entries: IndexMap<String, RegistryEntry>,
}

impl ActionRegistry {
    /// Load the registry from a TOML file
    ///
    /// Relative script paths are resolved against the registry file's directory.
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be read, parsed or an entry is invalid
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            Error::Registry(format!("Failed to read registry {}: {e}", path.display()))
        })?;
        let base = path.parent().unwrap_or(Path::new("."));
        Self::from_toml_str(&content, base)
    }

    /// Parse a registry from a TOML string
    ///
    /// # Errors
    ///
    /// Returns error if TOML parsing fails or an entry is invalid
    pub fn from_toml_str(content: &str, base: &Path) -> Result<Self> {
        let file: RegistryFile = toml::from_str(content)
            .map_err(|e| Error::Registry(format!("Failed to parse registry TOML: {e}")))?;

        let mut entries = file.actions;
        for (kind, entry) in &mut entries {
            validate_entry(kind, entry)?;
            if entry.script.is_relative() {
                entry.script = base.join(&entry.script);
            }
        }

        tracing::debug!(kinds = entries.len(), "Loaded action registry");
        Ok(Self { entries })
    }

    /// Build a registry from already-constructed entries
    #[must_use]
    pub fn from_entries(entries: IndexMap<String, RegistryEntry>) -> Self {
        Self { entries }
    }

    /// Get the registration for an action kind
    #[must_use]
    pub fn get(&self, kind: &str) -> Option<&RegistryEntry> {
        self.entries.get(kind)
    }

    /// Check whether a kind is registered with exactly this version
    #[must_use]
    pub fn version_matches(&self, kind: &str, version: &str) -> bool {
        self.get(kind).is_some_and(|e| e.version == version)
    }

    /// Iterate over registered kinds
    pub fn iter(&self) -> impl Iterator<Item = (&String, &RegistryEntry)> {
        self.entries.iter()
    }

    /// Number of registered kinds
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no kinds are registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn validate_entry(kind: &str, entry: &RegistryEntry) -> Result<()> {
    if kind.is_empty() || !kind.chars().all(|c| c.is_ascii_lowercase() || c == '-') {
        return Err(Error::Registry(format!(
            "Invalid action kind '{kind}': must match [a-z-]+"
        )));
    }
    if entry.script.as_os_str().is_empty() {
        return Err(Error::Registry(format!("Action '{kind}' has empty 'script'")));
    }
    if entry.version.trim().is_empty() {
        return Err(Error::Registry(format!("Action '{kind}' has empty 'version'")));
    }
    if entry.timeout == 0 {
        return Err(Error::Registry(format!(
            "Action '{kind}' has timeout 0; timeouts must be positive"
        )));
    }
    Ok(())
}
