//! Hook discovery and loading
//!
//! Loads hook definitions from the TOML files of the hooks directory. A file
//! holds either `[[hook]]` tables or a single hook table at the top level.

use super::config::{HookDefinition, HookRegistry};
use actledger_core::{Error, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize)]
struct HookList {
    hook: Vec<HookDefinition>,
}

/// Discover and load hooks from the hooks directory
#[derive(Debug, Clone)]
pub struct HookLoader {
    hooks_dir: PathBuf,
}

impl HookLoader {
    /// Create a loader for the given hooks directory
    #[must_use]
    pub fn new(hooks_dir: &Path) -> Self {
        Self {
            hooks_dir: hooks_dir.to_path_buf(),
        }
    }

    /// Check if the hooks directory exists
    #[must_use]
    pub fn exists(&self) -> bool {
        self.hooks_dir.exists()
    }

    /// Load all hooks, in file-name order then file order
    ///
    /// A missing directory yields an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be read or parsed, a definition is
    /// invalid, or an id is used twice
    pub fn load(&self) -> Result<HookRegistry> {
        use rayon::prelude::*;

        if !self.exists() {
            tracing::debug!(
                "Hooks directory does not exist: {}",
                self.hooks_dir.display()
            );
            return Ok(HookRegistry::default());
        }

        let mut file_paths: Vec<PathBuf> = fs::read_dir(&self.hooks_dir)
            .map_err(|e| {
                Error::HookConfig(format!(
                    "Failed to read directory {}: {e}",
                    self.hooks_dir.display()
                ))
            })?
            .filter_map(std::result::Result::ok)
            .map(|e| e.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                // Skip hidden files and editor backups
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|name| !name.starts_with('.') && !name.ends_with('~'))
            })
            .filter(|path| {
                let is_toml = path.extension().is_some_and(|ext| ext == "toml");
                if !is_toml {
                    tracing::debug!("Skipping non-TOML file: {}", path.display());
                }
                is_toml
            })
            .collect();

        // Sort by filename for consistent ordering (numeric prefixes)
        file_paths.sort();

        let per_file: Result<Vec<Vec<HookDefinition>>> = file_paths
            .par_iter()
            .map(|path| {
                tracing::debug!("Loading hook file: {}", path.display());
                load_hook_file(path)
            })
            .collect();

        let registry = HookRegistry::new(per_file?.into_iter().flatten().collect())?;
        tracing::debug!(hooks = registry.len(), "Loaded hook registry");
        Ok(registry)
    }
}

/// Load hooks from a single TOML file
fn load_hook_file(path: &Path) -> Result<Vec<HookDefinition>> {
    let content = fs::read_to_string(path).map_err(|e| {
        Error::HookConfig(format!("Failed to read TOML file {}: {e}", path.display()))
    })?;

    let parse_error =
        |e: toml::de::Error| Error::HookConfig(format!("Invalid hook file {}: {e}", path.display()));

    let table: toml::Table = toml::from_str(&content).map_err(parse_error)?;
    let mut hooks = if table.contains_key("hook") {
        toml::from_str::<HookList>(&content)
            .map_err(parse_error)?
            .hook
    } else {
        vec![toml::from_str::<HookDefinition>(&content).map_err(parse_error)?]
    };

    let hook_dir = path.parent().unwrap_or(Path::new("."));
    for hook in &mut hooks {
        if hook.script_path.is_relative() && !hook.script_path.as_os_str().is_empty() {
            hook.script_path = hook_dir.join(&hook.script_path);
        }
        match hook.validate() {
            Err(Error::HookConfig(message)) => {
                return Err(Error::HookConfig(format!(
                    "{message} (in {})",
                    path.display()
                )));
            }
            other => other?,
        }
    }

    Ok(hooks)
}
