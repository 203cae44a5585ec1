//! # Tag Reconciliation Module
//!
//! Reads, compares and rewrites the tags of FLAC, MP3, MP4 and WMA files.
//!
//! ## Overview
//!
//! This module handles:
//! - Format-neutral tag snapshots ([`TagValues`]) keyed by [`TagField`]
//! - Raw container codecs for Vorbis comments, ID3v2, MP4 atoms and ASF objects
//! - Per-field write policies that decide whether a value may be overwritten
//! - The [`Track`] entity with load, edit, save and delete operations
//! - Case-insensitive path lookup and batch fan-out over many files
//!
//! ## Usage
//!
//! ```ignore
//! use core_tags::{TagField, Track};
//!
//! let mut track = Track::load(path, &config).await?;
//! track.edit(|tags| tags.title = Some("New Title".to_string()))?;
//! let result = track.save(&[TagField::Title], false, false).await?;
//! assert!(result.saved);
//! ```

pub mod batch;
pub mod container;
pub mod error;
pub mod field;
pub mod image;
pub mod paths;
pub mod policy;
pub mod properties;
pub mod reader;
pub mod remote;
pub mod tag_map;
pub mod tags;
pub mod track;
pub mod value;
pub mod writer;

pub use batch::{load_tracks, save_tracks};
pub use error::{Result, TagError};
pub use field::TagField;
pub use image::{FileImageSource, PictureType, PreparedImage};
pub use paths::PathLookup;
pub use properties::AudioProperties;
pub use reader::TagReader;
pub use remote::{SpotifyLink, SPOTIFY_UNAVAILABLE};
pub use tag_map::FormatKind;
pub use tags::TagValues;
pub use track::{FileInfo, LibraryInfo, Track, TrackIdentity};
pub use writer::{SyncResult, TagWriter};
