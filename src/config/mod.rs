//! # Configuration Module
//!
//! This module provides the run configuration and the target-size control shared by the CLI
//! and the library.

pub mod config;
pub mod target;

pub use config::ReduceConfig;
pub use target::TargetSize;
