//! Configuration management for actledger
//!
//! This crate handles:
//! - Project configuration loading (`actledger.toml`)
//! - The action registry pinning each action kind to a script and version
//! - Logging initialization

pub mod config;
pub mod logging;
pub mod registry;

// Re-export error types from core
pub use actledger_core::{Error, Result};

// Re-export main types
pub use config::{Config, GeneralConfig, HooksConfig};
pub use registry::{ActionRegistry, EnvironmentConstraint, RegistryEntry};
