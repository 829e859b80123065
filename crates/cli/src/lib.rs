//! actledger CLI library
//!
//! This library contains all the CLI logic for actledger, making it reusable
//! for testing and integration with other tools.

pub mod cmd;
pub mod command;
pub mod common;
pub mod error;

use actledger_config::Config;
use actledger_engine::LifecycleEvent;
use actledger_engine::git::find_working_tree;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use command::Command;
use common::RuntimeContext;

/// actledger - execute version-controlled action ledgers
#[derive(Parser)]
#[command(name = "actledger")]
#[command(about = "Execute actions declared in version-controlled markdown ledgers")]
#[command(version)]
#[command(long_about = "Execute actions declared in version-controlled markdown ledgers

Each ledger is a date-named markdown file listing actions as checkbox entries.
Pending entries are executed in order by scripts pinned in the action
registry, and their outcomes are written back into the same file.

Features:
  • Immutable history: executed entries can never be edited again
  • Lifecycle hooks with ordering, retries and detached execution
  • Audit log of every hook invocation")]
pub struct Cli {
    /// Project root (default: enclosing git working tree, else current directory)
    #[arg(long, env = "ACTLEDGER_ROOT", value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Path to the config file (default: <root>/actledger.toml)
    #[arg(long, env = "ACTLEDGER_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Enable verbose output (shows DEBUG level logs)
    #[arg(short, long)]
    pub verbose: bool,

    /// Write logs to a file (useful for debugging)
    #[arg(long, env = "ACTLEDGER_LOG_FILE", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for actledger CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Execute pending actions in ledger files
    Execute(cmd::execute::ExecuteCommand),

    /// Validate ledger files without executing anything
    Check(cmd::check::CheckCommand),

    /// Check a proposed ledger for changes to executed entries
    #[command(long_about = "Check a proposed ledger for changes to executed entries

Compares the proposed (head) version of a ledger with the version it was
based on. Any change to an entry that is already checked, or a new entry
that arrives already checked, is reported and the command exits non-zero.

Examples:
  • actledger review --base main.md actions/2026-01-15.md
  • git show main:actions/2026-01-15.md > /tmp/base.md && \\
    actledger review --base /tmp/base.md actions/2026-01-15.md")]
    Review(cmd::review::ReviewCommand),

    /// Inspect lifecycle hooks
    #[command(subcommand)]
    Hooks(HooksCommands),

    /// Show recent hook executions from the audit log
    Audit(cmd::audit::AuditCommand),
}

/// Commands for inspecting hooks
#[derive(Subcommand)]
pub enum HooksCommands {
    /// List configured hooks in dispatch order
    List {
        /// Only show hooks for this event
        #[arg(short, long, value_name = "EVENT")]
        event: Option<LifecycleEvent>,

        /// Output format (simple, json)
        #[arg(short, long, default_value = "simple")]
        format: String,
    },
}

/// Determine the project root from CLI arguments
fn determine_root(cli: &Cli) -> Result<PathBuf> {
    if let Some(root) = &cli.root {
        return Ok(root.clone());
    }
    let cwd = std::env::current_dir().context("Failed to get current directory")?;
    Ok(find_working_tree(&cwd).unwrap_or(cwd))
}

/// Load configuration, preferring an explicit config file
fn load_config(cli: &Cli, root: &Path) -> Result<Config> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => Config::load_from_root(root)
            .with_context(|| format!("Failed to load config from {}", root.display()))?,
    };
    Ok(config)
}

/// Execute the command based on the command type
fn execute_command(command: Commands, context: &RuntimeContext) -> Result<()> {
    match command {
        Commands::Execute(execute_cmd) => {
            execute_cmd.execute(context)?;
        }
        Commands::Check(check_cmd) => {
            check_cmd.execute(context)?;
        }
        Commands::Review(review_cmd) => {
            review_cmd.execute(context)?;
        }
        Commands::Hooks(hooks_cmd) => match hooks_cmd {
            HooksCommands::List { event, format } => {
                cmd::hooks::run_list(&context.config, event, &format)?;
            }
        },
        Commands::Audit(audit_cmd) => {
            audit_cmd.execute(context)?;
        }
    }

    Ok(())
}

/// Main entry point for the CLI logic
///
/// # Errors
///
/// Returns an error if logging cannot be initialized, the configuration
/// cannot be loaded, or the command fails
pub fn run(cli: Cli) -> Result<()> {
    actledger_config::logging::init(cli.verbose, cli.log_file.as_deref())?;

    let root = determine_root(&cli)?;
    let config = load_config(&cli, &root)?;
    tracing::debug!(root = %config.root().display(), "Loaded configuration");

    let context = RuntimeContext::new(config);
    execute_command(cli.command, &context)
}
