//! Lifecycle hooks
//!
//! Hooks are external scripts bound to lifecycle events of ledger actions.
//!
//! ## Execution Model
//!
//! - `before_execute` fires before an action runs; one of `after_success`,
//!   `after_failure` or `after_timeout` fires after its result is recorded
//! - Different order values execute sequentially (order 10 before order 20)
//! - Sync hooks with the same order value execute **in parallel**
//! - Async hooks are detached to the supervisor and never delay the action
//! - Hook failures are recorded and logged, never propagated
//!
//! ## Module Organization
//!
//! - `config`: Hook definitions, events and the registry
//! - `context`: Action context payload and call depth tracking
//! - `dispatcher`: Select, group, execute and record
//! - `loader`: Hook discovery and loading from the hooks directory
//! - `record`: Audit records, one per invocation
//! - `supervisor`: Thread pool for detached hooks

pub mod config;
pub mod context;
pub mod dispatcher;
pub mod loader;
pub mod record;
pub mod supervisor;

// Re-export main types for convenience
pub use config::{HookDefinition, HookMode, HookRegistry, LifecycleEvent};
pub use context::{
    ActionContext, ActionContextBuilder, ActionStatus, CallDepth, HOOK_DEPTH_ENV, HookTrigger,
    MAX_CALL_DEPTH,
};
pub use dispatcher::{HookDispatcher, HookDispatcherBuilder};
pub use loader::HookLoader;
pub use record::{DEPTH_EXCEEDED, HookExecutionRecord, RecordStatus};
pub use supervisor::Supervisor;
