//! Check command implementation
//!
//! Parse ledgers without executing anything and list their entries.

use actledger_engine::parse;
use clap::Args;
use owo_colors::OwoColorize;
use serde::Serialize;
use std::fs;

use crate::command::Command;
use crate::common::{RuntimeContext, expand_ledger_args, render_parse_error};
use crate::error::{CommandError, Result};

/// Validate ledger structure
#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Ledger files or glob patterns (default: all ledgers in the ledger directory)
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,

    /// Print entries as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntrySummary {
    file: String,
    id: String,
    kind: String,
    version: String,
    completed: bool,
    line: usize,
}

impl Command for CheckCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let files = expand_ledger_args(&self.files, &context.config.ledger_dir())?;

        let mut summaries = Vec::new();
        let mut invalid = 0usize;

        for path in &files {
            let name = path.display().to_string();
            let text = match fs::read_to_string(path) {
                Ok(text) => text,
                Err(e) => {
                    invalid += 1;
                    tracing::error!("Failed to read {name}: {e}");
                    continue;
                }
            };

            match parse(&text) {
                Ok(entries) => {
                    if !self.json {
                        let pending = entries.iter().filter(|e| e.is_pending()).count();
                        println!(
                            "{} {} {}",
                            "✓".green(),
                            name.bold(),
                            format!("({} entries, {pending} pending)", entries.len()).dimmed()
                        );
                        for entry in &entries {
                            println!(
                                "    [{}] {} {} v{}",
                                entry.checkbox(),
                                entry.id.cyan(),
                                entry.kind,
                                entry.version.dimmed()
                            );
                        }
                    }
                    summaries.extend(entries.into_iter().map(|entry| EntrySummary {
                        file: name.clone(),
                        id: entry.id,
                        kind: entry.kind,
                        version: entry.version,
                        completed: entry.completed,
                        line: entry.source_line,
                    }));
                }
                Err(error) => {
                    invalid += 1;
                    eprint!("{}", render_parse_error(&error.with_file(name)));
                }
            }
        }

        if self.json {
            println!("{}", serde_json::to_string_pretty(&summaries)?);
        }

        if invalid > 0 {
            return Err(CommandError::InvalidLedgers { count: invalid });
        }
        Ok(())
    }
}
