//! Execute command implementation
//!
//! Run every pending entry in the selected ledger files.

use actledger_engine::{ExecuteError, ExecutionReport, LedgerExecutor, ResultStatus};
use clap::Args;
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::{RuntimeContext, expand_ledger_args, render_parse_error};
use crate::error::{CommandError, Result};

/// Execute pending actions
#[derive(Debug, Args)]
pub struct ExecuteCommand {
    /// Ledger files or glob patterns (default: all ledgers in the ledger directory)
    #[arg(value_name = "FILE")]
    pub files: Vec<String>,

    /// Commit each updated ledger
    #[arg(long, overrides_with = "no_commit")]
    pub commit: bool,

    /// Do not commit updated ledgers
    #[arg(long, overrides_with = "commit")]
    pub no_commit: bool,

    /// Print the execution report as JSON
    #[arg(long)]
    pub json: bool,
}

impl ExecuteCommand {
    /// Commit setting requested on the command line, if any
    fn commit_override(&self) -> Option<bool> {
        if self.commit {
            Some(true)
        } else if self.no_commit {
            Some(false)
        } else {
            None
        }
    }
}

impl Command for ExecuteCommand {
    type Output = ExecutionReport;

    fn execute(&self, context: &RuntimeContext) -> Result<ExecutionReport> {
        let mut config = (*context.config).clone();
        if let Some(commit) = self.commit_override() {
            config.general.commit = commit;
        }

        let files = expand_ledger_args(&self.files, &config.ledger_dir())?;
        if files.is_empty() {
            if !self.json {
                println!("{}", "No ledger files found.".dimmed());
            }
            return Ok(ExecutionReport::default());
        }

        let executor = LedgerExecutor::from_config(&config)?;

        let mut report = ExecutionReport::default();
        let mut invalid = 0usize;

        for path in &files {
            match executor.execute_file(path) {
                Ok(file_report) => report.merge(file_report),
                Err(ExecuteError::Parse(error)) => {
                    invalid += 1;
                    eprint!("{}", render_parse_error(&error));
                }
                Err(error) => {
                    invalid += 1;
                    tracing::error!("{error}");
                }
            }
        }

        // Detached hooks must finish before the process exits
        executor.dispatcher().wait_idle();

        if self.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_summary(&report);
        }

        if report.has_failures() {
            return Err(CommandError::ActionsFailed {
                failed: report.failed,
                executed: report.executed,
            });
        }
        if invalid > 0 {
            return Err(CommandError::InvalidLedgers { count: invalid });
        }

        Ok(report)
    }
}

fn print_summary(report: &ExecutionReport) {
    for result in &report.results {
        let marker = match result.status {
            ResultStatus::Success => "✓".green().to_string(),
            ResultStatus::Error | ResultStatus::Timeout => "✗".red().to_string(),
            ResultStatus::Skipped => "-".yellow().to_string(),
        };
        let mut line = format!(
            "  {marker} {} {}",
            result.action_id.bold(),
            format!("({})", result.kind).dimmed()
        );
        if let Some(error) = &result.error {
            line.push_str(&format!(": {}", error.dimmed()));
        }
        println!("{line}");
    }

    if !report.results.is_empty() {
        println!();
    }

    println!(
        "{} {} pending, {} executed ({} succeeded, {} failed), {} skipped",
        "Summary:".bold(),
        report.pending,
        report.executed,
        report.successful.to_string().green(),
        if report.failed > 0 {
            report.failed.to_string().red().to_string()
        } else {
            report.failed.to_string()
        },
        report.skipped.to_string().yellow()
    );
}
