//! Runtime environment detection
//!
//! Actions may be pinned to run only in CI or only on a developer machine.
//! The environment is detected from the conventional `CI=true` variable that
//! CI providers export.
//!
//! Detection is cached on first access.

use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

/// Environment of the current process (cached)
///
/// # Example
/// ```
/// use actledger_core::CURRENT_ENVIRONMENT;
///
/// println!("running in {}", CURRENT_ENVIRONMENT.name());
/// ```
pub static CURRENT_ENVIRONMENT: LazyLock<RuntimeEnvironment> =
    LazyLock::new(RuntimeEnvironment::detect);

/// Where actions are being executed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeEnvironment {
    /// Continuous integration runner
    Ci,
    /// Anything else (developer machine)
    Local,
}

impl RuntimeEnvironment {
    /// Detect the environment from the `CI` variable
    pub fn detect() -> Self {
        Self::from_ci_var(std::env::var("CI").ok().as_deref())
    }

    /// Interpret a raw `CI` value; only the literal `true` means CI
    #[must_use]
    pub fn from_ci_var(value: Option<&str>) -> Self {
        match value {
            Some("true") => Self::Ci,
            _ => Self::Local,
        }
    }

    /// Get the string name of this environment
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Ci => "ci",
            Self::Local => "local",
        }
    }
}

impl std::fmt::Display for RuntimeEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_ci_var() {
        assert_eq!(RuntimeEnvironment::from_ci_var(Some("true")), RuntimeEnvironment::Ci);
        assert_eq!(RuntimeEnvironment::from_ci_var(Some("1")), RuntimeEnvironment::Local);
        assert_eq!(RuntimeEnvironment::from_ci_var(None), RuntimeEnvironment::Local);
    }

    #[test]
    #[serial_test::serial]
    fn test_detect_reads_ci_variable() {
        temp_env::with_var("CI", Some("true"), || {
            assert_eq!(RuntimeEnvironment::detect(), RuntimeEnvironment::Ci);
        });
        temp_env::with_var_unset("CI", || {
            assert_eq!(RuntimeEnvironment::detect(), RuntimeEnvironment::Local);
        });
    }

    #[test]
    fn test_name_and_display() {
        assert_eq!(RuntimeEnvironment::Ci.name(), "ci");
        assert_eq!(RuntimeEnvironment::Local.to_string(), "local");
    }
}
