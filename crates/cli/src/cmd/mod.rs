//! Command implementations
//!
//! Each module implements one CLI subcommand.

pub mod audit;
pub mod check;
pub mod execute;
pub mod hooks;
pub mod review;
