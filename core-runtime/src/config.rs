//! # Sync Configuration Module
//!
//! Provides configuration for the tag reconciliation engine.
//!
//! ## Overview
//!
//! The configuration system uses a builder pattern to construct a `SyncConfig`
//! instance holding the injected collaborators and the default flags used by
//! save operations. Validation is fail-fast: a misconfigured URI carrier field
//! or concurrency width is rejected at `build()` time rather than on the first
//! save.
//!
//! ## Optional Dependencies
//!
//! - `RemoteLink` - Enables reading and writing the remote identifier (URI).
//!   Without it URI fields are never decoded and URI writes are no-ops.
//! - `ImageSource` - Resolves image links when images are written. Required
//!   only when a save actually needs to embed images.
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::SyncConfig;
//! use std::sync::Arc;
//!
//! let config = SyncConfig::builder()
//!     .remote_link(Arc::new(SpotifyLink))
//!     .image_source(Arc::new(FileImageSource))
//!     .uri_field("comments")
//!     .dry_run(false)
//!     .build()
//!     .expect("Failed to build config");
//! ```
//!
//! ## Error Handling
//!
//! ```should_panic
//! use core_runtime::config::SyncConfig;
//!
//! // Only text fields can carry the remote identifier
//! let config = SyncConfig::builder()
//!     .uri_field("images")
//!     .build()
//!     .expect("Should fail - images cannot carry a URI");
//! ```

use crate::error::{Error, Result};
use bridge_traits::{ImageSource, RemoteLink};
use std::sync::Arc;

/// Fields able to carry the remote identifier as a plain string value.
pub const URI_CARRIER_FIELDS: &[&str] = &[
    "title",
    "artist",
    "album",
    "album_artist",
    "genres",
    "key",
    "comments",
];

/// Default field carrying the remote identifier.
pub const DEFAULT_URI_FIELD: &str = "comments";

/// Default number of files processed concurrently by batch operations.
pub const DEFAULT_MAX_CONCURRENT_FILES: usize = 8;

const MAX_CONCURRENT_FILES_LIMIT: usize = 256;

/// Configuration for the tag reconciliation engine.
///
/// Use [`SyncConfigBuilder`] to construct instances.
#[derive(Clone)]
pub struct SyncConfig {
    /// Remote identifier validation (optional)
    pub remote_link: Option<Arc<dyn RemoteLink>>,

    /// Image link resolver (optional until images are written)
    pub image_source: Option<Arc<dyn ImageSource>>,

    /// Name of the semantic field carrying the remote identifier
    pub uri_field: String,

    /// Default destructive-replace flag for saves
    pub replace: bool,

    /// Default dry-run flag for saves
    pub dry_run: bool,

    /// Maximum number of files processed concurrently by batch operations
    pub max_concurrent_files: usize,
}

impl std::fmt::Debug for SyncConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncConfig")
            .field(
                "remote_link",
                &self.remote_link.as_ref().map(|_| "RemoteLink { ... }"),
            )
            .field(
                "image_source",
                &self.image_source.as_ref().map(|_| "ImageSource { ... }"),
            )
            .field("uri_field", &self.uri_field)
            .field("replace", &self.replace)
            .field("dry_run", &self.dry_run)
            .field("max_concurrent_files", &self.max_concurrent_files)
            .finish()
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            remote_link: None,
            image_source: None,
            uri_field: DEFAULT_URI_FIELD.to_string(),
            replace: false,
            dry_run: true,
            max_concurrent_files: DEFAULT_MAX_CONCURRENT_FILES,
        }
    }
}

impl SyncConfig {
    /// Creates a new builder for constructing a `SyncConfig`.
    pub fn builder() -> SyncConfigBuilder {
        SyncConfigBuilder::default()
    }

    /// Validates the configuration and returns an error if invalid.
    ///
    /// This checks:
    /// - The URI carrier is a text field
    /// - The concurrency width is within 1..=256
    pub fn validate(&self) -> Result<()> {
        if !URI_CARRIER_FIELDS.contains(&self.uri_field.as_str()) {
            return Err(Error::Config(format!(
                "Field '{}' cannot carry a remote identifier. Expected one of: {}",
                self.uri_field,
                URI_CARRIER_FIELDS.join(", ")
            )));
        }

        if self.max_concurrent_files == 0 {
            return Err(Error::Config(
                "Concurrent file limit must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_files > MAX_CONCURRENT_FILES_LIMIT {
            return Err(Error::Config(format!(
                "Concurrent file limit exceeds maximum of {}",
                MAX_CONCURRENT_FILES_LIMIT
            )));
        }

        Ok(())
    }

    /// Returns `true` when URI fields are read and written.
    pub fn has_remote_link(&self) -> bool {
        self.remote_link.is_some()
    }

    /// Returns the image source or a capability error explaining how to
    /// provide one.
    pub fn require_image_source(&self) -> Result<Arc<dyn ImageSource>> {
        self.image_source
            .clone()
            .ok_or_else(|| Error::CapabilityMissing {
                capability: "ImageSource".to_string(),
                message: "Image links were supplied for writing but no ImageSource was \
                          injected. Use core_tags::image::FileImageSource for local paths \
                          or provide an adapter that can fetch remote URLs."
                    .to_string(),
            })
    }
}

/// Builder for constructing [`SyncConfig`] instances.
#[derive(Default)]
pub struct SyncConfigBuilder {
    remote_link: Option<Arc<dyn RemoteLink>>,
    image_source: Option<Arc<dyn ImageSource>>,
    uri_field: Option<String>,
    replace: Option<bool>,
    dry_run: Option<bool>,
    max_concurrent_files: Option<usize>,
}

impl SyncConfigBuilder {
    /// Sets the remote identifier validator.
    pub fn remote_link(mut self, link: Arc<dyn RemoteLink>) -> Self {
        self.remote_link = Some(link);
        self
    }

    /// Sets the image link resolver.
    pub fn image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.image_source = Some(source);
        self
    }

    /// Sets the field carrying the remote identifier (default: `comments`).
    pub fn uri_field(mut self, field: impl Into<String>) -> Self {
        self.uri_field = Some(field.into());
        self
    }

    /// Sets the default destructive-replace flag.
    pub fn replace(mut self, replace: bool) -> Self {
        self.replace = Some(replace);
        self
    }

    /// Sets the default dry-run flag.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = Some(dry_run);
        self
    }

    /// Sets the concurrency width for batch operations.
    pub fn max_concurrent_files(mut self, limit: usize) -> Self {
        self.max_concurrent_files = Some(limit);
        self
    }

    /// Builds and validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] when validation fails.
    pub fn build(self) -> Result<SyncConfig> {
        let defaults = SyncConfig::default();
        let config = SyncConfig {
            remote_link: self.remote_link,
            image_source: self.image_source,
            uri_field: self
                .uri_field
                .map(|f| f.trim().to_lowercase())
                .unwrap_or(defaults.uri_field),
            replace: self.replace.unwrap_or(defaults.replace),
            dry_run: self.dry_run.unwrap_or(defaults.dry_run),
            max_concurrent_files: self
                .max_concurrent_files
                .unwrap_or(defaults.max_concurrent_files),
        };

        config.validate()?;
        Ok(config)
    }
}
