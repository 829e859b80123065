//! Hooks command implementation
//!
//! Inspect the lifecycle hooks configured for a project.

use actledger_config::Config;
use actledger_engine::hooks::{HookDefinition, HookMode};
use actledger_engine::{HookLoader, LifecycleEvent};
use anyhow::anyhow;
use owo_colors::OwoColorize;

use crate::error::Result;

/// Load hooks, optionally restricted to one event, in dispatch order
fn selected_hooks(config: &Config, event: Option<LifecycleEvent>) -> Result<Vec<HookDefinition>> {
    let registry = HookLoader::new(&config.hooks_dir()).load()?;

    let mut hooks: Vec<HookDefinition> = registry
        .iter()
        .filter(|hook| event.is_none_or(|e| hook.lifecycle_event == e))
        .cloned()
        .collect();

    // Stable sort keeps load order within equal orders
    hooks.sort_by_key(|hook| (hook.lifecycle_event, hook.order));
    Ok(hooks)
}

/// List configured hooks
///
/// # Errors
///
/// Returns an error if the hooks cannot be loaded or the format is unknown
pub fn run_list(config: &Config, event: Option<LifecycleEvent>, format: &str) -> Result<()> {
    let hooks = selected_hooks(config, event)?;

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&hooks)?);
        }
        "simple" => print_simple(&hooks),
        other => {
            return Err(anyhow!("Unknown format '{other}' (expected: simple, json)").into());
        }
    }

    Ok(())
}

fn print_simple(hooks: &[HookDefinition]) {
    if hooks.is_empty() {
        println!("{}", "No hooks configured.".dimmed());
        return;
    }

    let mut current = None;
    for hook in hooks {
        if current != Some(hook.lifecycle_event) {
            if current.is_some() {
                println!();
            }
            println!("{}", hook.lifecycle_event.to_string().bold());
            current = Some(hook.lifecycle_event);
        }

        let name = if hook.enabled {
            hook.id.green().to_string()
        } else {
            format!("{} {}", hook.id.dimmed(), "(disabled)".dimmed())
        };
        let mode = match hook.mode {
            HookMode::Sync => "sync".cyan().to_string(),
            HookMode::Async => "async".yellow().to_string(),
        };

        println!("  • {name} (order: {}, {mode})", hook.order);
        println!("      {}", hook.script_path.display().dimmed());

        if !hook.kind_filter.is_empty() {
            let kinds: Vec<&str> = hook.kind_filter.iter().map(String::as_str).collect();
            println!("      {} {}", "kinds:".dimmed(), kinds.join(", "));
        }
        if hook.retry_count > 0 {
            println!(
                "      {} {} (backoff {}s)",
                "retries:".dimmed(),
                hook.retry_count,
                hook.retry_backoff_seconds
            );
        }
    }
}
