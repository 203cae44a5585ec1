//! # Host Bridge Traits
//!
//! Collaborator contracts the tag engine depends on but does not implement
//! itself.
//!
//! ## Overview
//!
//! The tag reconciliation engine never talks to the network and never decodes
//! images on its own. Whatever it needs from the outside world is expressed as
//! a trait here and injected through `core_runtime::config::SyncConfig`.
//!
//! ## Traits
//!
//! ### Remote Music Service
//! - [`RemoteLink`](remote::RemoteLink) - Identifier validation and the
//!   "unavailable" sentinel used to mark tracks that have no remote match
//!
//! ### Images
//! - [`ImageSource`](image::ImageSource) - Resolves an image link (path or URL)
//!   into raw image bytes with a known MIME type
//!
//! ### Utilities
//! - [`LoggerSink`](logging::LoggerSink) - Forward structured logs to host logging
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing:
//!
//! ```ignore
//! use core_runtime::error::Error;
//!
//! let source = config.image_source.clone().ok_or_else(|| Error::CapabilityMissing {
//!     capability: "ImageSource".to_string(),
//!     message: "Image links were supplied but no ImageSource was injected.".to_string(),
//! })?;
//! ```
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Adapters
//! should convert their own failures into `BridgeError` and include the
//! offending link or path in the message.
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` so one adapter instance can be
//! shared by every worker task of a batch save.

pub mod error;
pub mod image;
pub mod logging;
pub mod remote;

pub use error::BridgeError;

// Re-export commonly used types
pub use image::{ImageSource, LoadedImage};
pub use logging::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use remote::RemoteLink;
