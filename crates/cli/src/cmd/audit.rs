//! Audit command implementation
//!
//! Show the most recent hook execution records.

use actledger_engine::AuditLog;
use actledger_engine::hooks::RecordStatus;
use clap::Args;
use owo_colors::OwoColorize;

use crate::command::Command;
use crate::common::RuntimeContext;
use crate::error::Result;

/// Show recent hook executions
#[derive(Debug, Args)]
pub struct AuditCommand {
    /// Number of records to show
    #[arg(short = 'n', long, default_value_t = 20)]
    pub tail: usize,

    /// Print records as JSON
    #[arg(long)]
    pub json: bool,
}

impl Command for AuditCommand {
    type Output = ();

    fn execute(&self, context: &RuntimeContext) -> Result<()> {
        let audit = AuditLog::new(context.config.audit_log_path());
        let records = audit.read_records()?;
        let start = records.len().saturating_sub(self.tail);
        let recent = &records[start..];

        if self.json {
            println!("{}", serde_json::to_string_pretty(recent)?);
            return Ok(());
        }

        if recent.is_empty() {
            println!("{}", "No hook executions recorded.".dimmed());
            return Ok(());
        }

        for record in recent {
            let status = match record.status {
                RecordStatus::Success => "✓".green().to_string(),
                RecordStatus::Failure => "✗".red().to_string(),
            };
            let mut line = format!(
                "{} {status} {} {} {} {}",
                record
                    .timestamp
                    .format("%Y-%m-%d %H:%M:%S")
                    .to_string()
                    .dimmed(),
                record.hook_id.bold(),
                record.event.to_string().cyan(),
                record.action_id,
                format!("{}ms", record.duration_ms).dimmed()
            );
            if let Some(error) = &record.error {
                line.push_str(&format!(" {}", error.yellow()));
            }
            println!("{line}");
        }

        Ok(())
    }
}
