//! Workspace placeholder crate.
//!
//! This crate exists to expose a single feature flag (`engine`) that pulls in
//! the tag reconciliation engine (`core-tags`) together with its runtime
//! support (`core-runtime`). Host applications can depend on
//! `tagsync-workspace` without wiring each crate individually.

#[cfg(feature = "engine")]
pub use core_runtime;
#[cfg(feature = "engine")]
pub use core_tags;
