//! Common types and utilities for CLI commands
//!
//! This module provides the runtime context shared by all commands together
//! with ledger file selection and parse error rendering.

use actledger_config::Config;
use actledger_engine::ParseError;
use owo_colors::OwoColorize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{CommandError, Result};

/// Runtime context for command execution
///
/// Holds the loaded project configuration. The `Arc` keeps cloning cheap for
/// commands that hand the config to engine components.
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    /// Project configuration
    pub config: Arc<Config>,
}

impl RuntimeContext {
    /// Create a new runtime context
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    /// Project root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        self.config.root()
    }
}

/// Expand ledger arguments into a list of markdown files
///
/// Each argument is a path or glob pattern. With no arguments every `*.md`
/// file in `ledger_dir` is selected. Non-markdown matches are skipped and
/// duplicates are removed, keeping first-seen order.
///
/// # Errors
///
/// Returns an error if a pattern is malformed
pub fn expand_ledger_args(patterns: &[String], ledger_dir: &Path) -> Result<Vec<PathBuf>> {
    let default_pattern;
    let patterns: Vec<&str> = if patterns.is_empty() {
        default_pattern = ledger_dir.join("*.md").to_string_lossy().into_owned();
        vec![default_pattern.as_str()]
    } else {
        patterns.iter().map(String::as_str).collect()
    };

    let mut seen = HashSet::new();
    let mut files = Vec::new();

    for pattern in patterns {
        let mut matches: Vec<PathBuf> = glob::glob(pattern)
            .map_err(|e| CommandError::InvalidPattern {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?
            .filter_map(|entry| match entry {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Skipping unreadable path: {e}");
                    None
                }
            })
            .collect();

        // A literal path that does not exist still reaches the executor so
        // the missing file is reported instead of silently ignored
        if matches.is_empty() && !has_glob_chars(pattern) {
            matches.push(PathBuf::from(pattern));
        }

        for path in matches {
            if !is_markdown(&path) {
                tracing::debug!("Skipping non-markdown file {}", path.display());
                continue;
            }
            if seen.insert(path.clone()) {
                files.push(path);
            }
        }
    }

    Ok(files)
}

fn has_glob_chars(pattern: &str) -> bool {
    pattern.contains(['*', '?', '['])
}

fn is_markdown(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "md")
}

/// Render a ledger parse error with its surrounding lines
#[must_use]
pub fn render_parse_error(error: &ParseError) -> String {
    let location = match &error.file {
        Some(file) => format!("{file}:{}", error.line),
        None => format!("line {}", error.line),
    };

    let mut out = format!(
        "{} {}\n  {} {}\n",
        "error:".red().bold(),
        error.message.bold(),
        "-->".blue(),
        location
    );

    let width = error
        .context
        .last()
        .map_or(1, |(number, _)| number.to_string().len());

    for (number, text) in &error.context {
        let gutter = format!("{number:>width$} |");
        if *number == error.line {
            out.push_str(&format!("{} {}\n", gutter.blue().bold(), text.yellow()));
        } else {
            out.push_str(&format!("{} {}\n", gutter.blue(), text.dimmed()));
        }
    }

    out
}
