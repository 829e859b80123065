//! Core types and utilities for actledger
//!
//! This is the foundation crate (Layer 0) that all other actledger crates depend on.
//! It provides:
//! - Base error types
//! - Runtime environment detection (CI or local)
//! - Collaborator traits consumed by the execution loop (`Committer`)
//!
//! This crate has no dependencies on other actledger crates.

pub mod environment;
pub mod error;
pub mod traits;

pub use environment::{CURRENT_ENVIRONMENT, RuntimeEnvironment};
pub use error::{Error, Result};
pub use traits::{Committer, NoCommit};
