//! # Track Entity
//!
//! One [`Track`] per audio file: decoded tags, file-system facts, audio
//! properties and the parsed tag store backing them.
//!
//! ## Overview
//!
//! Tags are edited in memory and only reach the file through
//! [`Track::save`]. A save never compares against the in-memory values it is
//! about to write: it rereads the file, decodes a fresh `source` snapshot and
//! reconciles the in-memory `target` onto it. Every staged change is then
//! flushed in one atomic write (temp file + rename).
//!
//! ## Usage
//!
//! ```ignore
//! use core_tags::{Track, TagField};
//!
//! let mut track = Track::load(Path::new("/music/a.flac"), &config).await?;
//! track.edit(|tags| tags.title = Some("Intro".into()))?;
//! let result = track.save(&[TagField::Title], false, false).await?;
//! assert!(result.saved);
//! ```

use std::hash::{Hash, Hasher};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

use core_runtime::logging::strip_path;
use core_runtime::SyncConfig;

use crate::container::{open_store, TagStore};
use crate::error::{Result, TagError};
use crate::field::TagField;
use crate::image::PreparedImage;
use crate::policy::{self, PolicyInput};
use crate::properties::AudioProperties;
use crate::reader::TagReader;
use crate::tag_map::{spec_for_path, FormatKind, FormatSpec};
use crate::tags::{validate_day, validate_image_kind, validate_month, validate_year, TagValues};
use crate::writer::{SyncResult, TagWriter};

/// File-system facts captured at load and after every save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub size: u64,
    pub modified: Option<DateTime<Utc>>,
    /// Lower-case extension without the dot
    pub extension: String,
}

/// Library bookkeeping carried alongside the tags. Never written to the file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryInfo {
    pub date_added: Option<DateTime<Utc>>,
    pub last_played: Option<DateTime<Utc>>,
    pub play_count: u32,
    /// 0.0 to 1.0
    pub rating: Option<f32>,
}

/// Identity used to match tracks across sources.
///
/// Paths decide when both sides have one, then remote identifiers, then
/// names. Because the deciding key depends on which fields both sides carry,
/// [`TrackIdentity::matches`] is not transitive: `a` may match `b` by name and
/// `b` match `c` by path while `a` and `c` differ. Do not use it to group
/// tracks into equivalence classes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackIdentity {
    pub path: Option<PathBuf>,
    pub uri: Option<String>,
    pub name: String,
}

impl TrackIdentity {
    pub fn matches(&self, other: &TrackIdentity) -> bool {
        match (&self.path, &other.path) {
            (Some(a), Some(b)) => a == b,
            _ => match (&self.uri, &other.uri) {
                (Some(a), Some(b)) => a == b,
                _ => self.name == other.name,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct Track {
    path: PathBuf,
    spec: &'static FormatSpec,
    file_info: FileInfo,
    properties: AudioProperties,
    tags: TagValues,
    library: LibraryInfo,
    store: Box<dyn TagStore>,
    config: SyncConfig,
    uri_field: TagField,
}

impl Track {
    /// Load and decode the file at `path`.
    ///
    /// # Errors
    ///
    /// - [`TagError::NotFound`] when `path` is not an existing file
    /// - [`TagError::UnsupportedFormat`] when no adapter handles the extension
    /// - [`TagError::CorruptedContainer`] when the tag structures cannot be parsed
    #[instrument(skip_all, fields(file = %strip_path(&path.to_string_lossy())))]
    pub async fn load(path: &Path, config: &SyncConfig) -> Result<Self> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|e| not_found(path, e))?;
        if !metadata.is_file() {
            return Err(TagError::NotFound(path.display().to_string()));
        }

        let spec = spec_for_path(path)?;
        let uri_field: TagField = config.uri_field.parse()?;
        let path = tokio::fs::canonicalize(path)
            .await
            .map_err(|e| not_found(path, e))?;

        let data = tokio::fs::read(&path).await.map_err(|e| not_found(&path, e))?;
        let store = open_store(spec.kind, &data)?;
        let properties = AudioProperties::read(spec.kind, &data);
        let tags = decode(store.as_ref(), spec, config, uri_field)?;

        debug!(format = spec.kind.name(), length = properties.length, "Track loaded");

        Ok(Self {
            file_info: file_info(&path, &metadata),
            path,
            spec,
            properties,
            tags,
            library: LibraryInfo::default(),
            store,
            config: config.clone(),
            uri_field,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn format(&self) -> FormatKind {
        self.spec.kind
    }

    pub fn file_info(&self) -> &FileInfo {
        &self.file_info
    }

    pub fn properties(&self) -> &AudioProperties {
        &self.properties
    }

    pub fn tags(&self) -> &TagValues {
        &self.tags
    }

    pub fn library(&self) -> &LibraryInfo {
        &self.library
    }

    pub fn library_mut(&mut self) -> &mut LibraryInfo {
        &mut self.library
    }

    /// Title, or the file stem when the title is absent.
    pub fn name(&self) -> String {
        match &self.tags.title {
            Some(title) => title.clone(),
            None => self
                .path
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default(),
        }
    }

    pub fn identity(&self) -> TrackIdentity {
        TrackIdentity {
            path: Some(self.path.clone()),
            uri: self.tags.uri.clone(),
            name: self.name(),
        }
    }

    /// Re-decode the tags from the parsed store, dropping in-memory edits.
    pub fn refresh(&mut self) -> Result<()> {
        self.tags = decode(self.store.as_ref(), self.spec, &self.config, self.uri_field)?;
        Ok(())
    }

    /// Apply `edit` to the tags. The edit is rejected as a whole when the
    /// result does not validate.
    pub fn edit<F>(&mut self, edit: F) -> Result<()>
    where
        F: FnOnce(&mut TagValues),
    {
        let mut edited = self.tags.clone();
        edit(&mut edited);
        edited.validate()?;
        self.tags = edited;
        Ok(())
    }

    pub fn set_year(&mut self, year: Option<i32>) -> Result<()> {
        validate_year(year)?;
        self.tags.year = year;
        Ok(())
    }

    pub fn set_month(&mut self, month: Option<u32>) -> Result<()> {
        validate_month(month)?;
        self.tags.month = month;
        Ok(())
    }

    pub fn set_day(&mut self, day: Option<u32>) -> Result<()> {
        validate_day(day)?;
        self.tags.day = day;
        Ok(())
    }

    /// Register an image to embed on the next save, keyed by picture kind.
    pub fn set_image_link(&mut self, kind: &str, link: impl Into<String>) -> Result<()> {
        let kind = validate_image_kind(kind)?;
        self.tags
            .image_links
            .insert(kind.label().to_string(), link.into());
        Ok(())
    }

    /// Link the track to a remote identifier.
    pub fn set_uri(&mut self, uri: impl Into<String>) -> Result<()> {
        let uri = uri.into();
        if let Some(remote) = &self.config.remote_link {
            if !remote.validate_identifier(&uri) {
                return Err(TagError::Validation {
                    field: "uri",
                    message: format!("'{}' is not a valid remote identifier", uri),
                });
            }
        }
        self.tags.uri = Some(uri);
        self.tags.has_uri = Some(true);
        Ok(())
    }

    /// Mark the track as having no remote counterpart.
    pub fn mark_unavailable(&mut self) {
        self.tags.uri = None;
        self.tags.has_uri = Some(false);
    }

    /// Copy `other`'s present values for `fields` onto this track.
    pub fn merge(&mut self, other: &Track, fields: &[TagField]) {
        self.tags.merge(&other.tags, fields);
    }

    /// Reconcile the in-memory tags onto the file for `fields`.
    ///
    /// `replace` enables destructive updates of values already present on
    /// disk. A dry run reports what would change and leaves the file
    /// untouched.
    #[instrument(skip(self, fields), fields(file = %strip_path(&self.path.to_string_lossy())))]
    pub async fn save(&mut self, fields: &[TagField], replace: bool, dry_run: bool) -> Result<SyncResult> {
        let original = tokio::fs::read(&self.path)
            .await
            .map_err(|e| not_found(&self.path, e))?;
        let mut store = open_store(self.spec.kind, &original)?;
        let source = decode(store.as_ref(), self.spec, &self.config, self.uri_field)?;

        let images = if !dry_run && self.writes_images(&source, fields, replace) {
            self.load_images().await?
        } else {
            Vec::new()
        };

        let result = TagWriter::new(
            store.as_mut(),
            self.spec,
            self.config.remote_link.as_deref(),
            self.uri_field,
        )
        .write(&source, &self.tags, fields, replace, dry_run, &images)?;

        if result.saved {
            self.flush(store, &original).await?;
            self.clear_loaded_images();
            if result.updated.contains_key(&TagField::Images) {
                self.tags.has_image = true;
            }
            info!(fields = result.updated.len(), "Tags saved");
        } else {
            debug!(fields = result.updated.len(), dry_run, "Nothing flushed");
        }
        Ok(result)
    }

    /// [`save`](Self::save) with the configured replace and dry-run defaults.
    pub async fn sync(&mut self, fields: &[TagField]) -> Result<SyncResult> {
        let (replace, dry_run) = (self.config.replace, self.config.dry_run);
        self.save(fields, replace, dry_run).await
    }

    /// Remove the stored tags behind `fields`.
    ///
    /// Only the removed fields are cleared in memory; other unsaved edits
    /// and image links stay.
    #[instrument(skip(self, fields), fields(file = %strip_path(&self.path.to_string_lossy())))]
    pub async fn delete_tags(&mut self, fields: &[TagField], dry_run: bool) -> Result<SyncResult> {
        let original = tokio::fs::read(&self.path)
            .await
            .map_err(|e| not_found(&self.path, e))?;
        let mut store = open_store(self.spec.kind, &original)?;

        let result = TagWriter::new(
            store.as_mut(),
            self.spec,
            self.config.remote_link.as_deref(),
            self.uri_field,
        )
        .delete_tags(fields, dry_run)?;

        if result.saved {
            self.flush(store, &original).await?;
            let removed: Vec<TagField> = result.updated.keys().copied().collect();
            self.tags.clear(&removed);
            self.clear_loaded_images();
            info!(fields = result.updated.len(), "Tags deleted");
        }
        Ok(result)
    }

    /// Write every embedded picture to `dir` as `<stem>_<index>.<ext>`.
    ///
    /// Returns the number of files written.
    #[instrument(skip_all, fields(file = %strip_path(&self.path.to_string_lossy())))]
    pub async fn extract_images_to_dir(&self, dir: &Path) -> Result<usize> {
        let data = tokio::fs::read(&self.path)
            .await
            .map_err(|e| not_found(&self.path, e))?;
        let store = open_store(self.spec.kind, &data)?;
        let images = TagReader::new(
            store.as_ref(),
            self.spec,
            self.config.remote_link.as_deref(),
            self.uri_field,
        )
        .read_images()?;
        if images.is_empty() {
            return Ok(0);
        }

        tokio::fs::create_dir_all(dir).await?;
        let stem = self
            .path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        for (index, image) in images.iter().enumerate() {
            let target = dir.join(format!("{}_{}.{}", stem, index, image.extension()));
            tokio::fs::write(&target, &image.data).await?;
        }

        debug!(count = images.len(), "Images extracted");
        Ok(images.len())
    }

    /// Drop picture bytes held by the parsed store.
    pub fn clear_loaded_images(&mut self) {
        self.store.release_picture_data();
    }

    fn writes_images(&self, source: &TagValues, fields: &[TagField], replace: bool) -> bool {
        TagField::write_units(fields).contains(&TagField::Images)
            && policy::evaluate(
                TagField::Images,
                &PolicyInput {
                    source,
                    target: &self.tags,
                    replace,
                },
            )
            .is_some()
    }

    async fn load_images(&self) -> Result<Vec<PreparedImage>> {
        let source = self.config.require_image_source()?;
        let mut images = Vec::with_capacity(self.tags.image_links.len());
        for (label, link) in &self.tags.image_links {
            let kind = validate_image_kind(label)?;
            let loaded = source
                .load(link)
                .await
                .map_err(|e| TagError::ImageError(format!("{}: {}", link, e)))?;
            images.push(PreparedImage::from_loaded(kind, loaded));
        }
        Ok(images)
    }

    async fn flush(&mut self, store: Box<dyn TagStore>, original: &[u8]) -> Result<()> {
        let rendered = store.render(original)?;
        write_atomic(&self.path, &rendered).await?;
        self.store = store;

        let metadata = tokio::fs::metadata(&self.path).await?;
        self.file_info = file_info(&self.path, &metadata);
        Ok(())
    }
}

impl PartialEq for Track {
    fn eq(&self, other: &Self) -> bool {
        self.identity().matches(&other.identity())
    }
}

impl Eq for Track {}

/// Hashes the path only. A loaded track always carries its path, so
/// equality falls to the path tier of [`TrackIdentity::matches`] and agrees
/// with the hash.
impl Hash for Track {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.path.hash(state);
    }
}

fn decode(
    store: &dyn TagStore,
    spec: &'static FormatSpec,
    config: &SyncConfig,
    uri_field: TagField,
) -> Result<TagValues> {
    TagReader::new(store, spec, config.remote_link.as_deref(), uri_field).decode()
}

fn not_found(path: &Path, err: std::io::Error) -> TagError {
    if err.kind() == ErrorKind::NotFound {
        TagError::NotFound(path.display().to_string())
    } else {
        TagError::Io(err)
    }
}

fn file_info(path: &Path, metadata: &std::fs::Metadata) -> FileInfo {
    FileInfo {
        size: metadata.len(),
        modified: metadata.modified().ok().map(DateTime::<Utc>::from),
        extension: path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default(),
    }
}

/// Hidden sibling path the rendered file is staged at before the rename.
fn atomic_temp_path(original: &Path) -> PathBuf {
    let stem = original
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("track");
    let ext = original
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("tmp");
    let nanos = Utc::now().timestamp_nanos_opt().unwrap_or(0);
    original.with_file_name(format!(".{}.{}-{}.{}", stem, std::process::id(), nanos, ext))
}

async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let temp_path = atomic_temp_path(path);
    if let Err(e) = tokio::fs::write(&temp_path, data).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    if let Err(e) = tokio::fs::rename(&temp_path, path).await {
        let _ = tokio::fs::remove_file(&temp_path).await;
        return Err(e.into());
    }
    Ok(())
}
