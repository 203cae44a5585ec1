//! # Core Runtime Module
//!
//! Provides the runtime infrastructure shared by the tag engine:
//! - Logging and tracing infrastructure
//! - Sync configuration (collaborators, defaults, concurrency)
//!
//! ## Overview
//!
//! This crate contains the utilities that `core-tags` and host applications
//! depend on. It establishes the logging conventions and the fail-fast
//! configuration checks used throughout the system.

pub mod config;
pub mod error;
pub mod logging;

pub use config::{SyncConfig, SyncConfigBuilder};
pub use error::{Error, Result};
