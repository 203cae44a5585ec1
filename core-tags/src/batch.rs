//! # Batch Operations
//!
//! Fans independent files out over a bounded number of concurrent loads or
//! saves. Each file gets its own result so one unreadable file never aborts
//! the rest of the batch.
//!
//! ## Usage
//!
//! ```ignore
//! let loaded = load_tracks(&paths, &config).await;
//! let mut tracks: Vec<Track> = loaded
//!     .into_iter()
//!     .filter_map(|(_, result)| result.ok())
//!     .collect();
//! let saved = save_tracks(&mut tracks, &[TagField::All], false, true, &config).await;
//! ```

use std::path::PathBuf;

use futures::stream::{self, StreamExt};
use tracing::{debug, warn};

use core_runtime::SyncConfig;

use crate::error::Result;
use crate::field::TagField;
use crate::track::Track;
use crate::writer::SyncResult;

/// Load every path, at most `config.max_concurrent_files` at a time.
///
/// Results come back in input order.
pub async fn load_tracks(paths: &[PathBuf], config: &SyncConfig) -> Vec<(PathBuf, Result<Track>)> {
    let width = config.max_concurrent_files.max(1);
    debug!(files = paths.len(), width, "Loading tracks");

    let mut results: Vec<(usize, PathBuf, Result<Track>)> = stream::iter(paths.iter().enumerate())
        .map(|(index, path)| async move {
            let result = Track::load(path, config).await;
            if let Err(e) = &result {
                warn!(path = %path.display(), error = %e, "Track load failed");
            }
            (index, path.clone(), result)
        })
        .buffer_unordered(width)
        .collect()
        .await;

    results.sort_by_key(|(index, _, _)| *index);
    results
        .into_iter()
        .map(|(_, path, result)| (path, result))
        .collect()
}

/// Save every track, at most `config.max_concurrent_files` at a time.
///
/// Each track is borrowed by exactly one future, so no two operations ever
/// touch the same file. Results come back in input order.
pub async fn save_tracks(
    tracks: &mut [Track],
    fields: &[TagField],
    replace: bool,
    dry_run: bool,
    config: &SyncConfig,
) -> Vec<(PathBuf, Result<SyncResult>)> {
    let width = config.max_concurrent_files.max(1);
    debug!(files = tracks.len(), width, replace, dry_run, "Saving tracks");

    let mut results: Vec<(usize, PathBuf, Result<SyncResult>)> =
        stream::iter(tracks.iter_mut().enumerate())
            .map(|(index, track)| async move {
                let path = track.path().to_path_buf();
                let result = track.save(fields, replace, dry_run).await;
                if let Err(e) = &result {
                    warn!(path = %path.display(), error = %e, "Track save failed");
                }
                (index, path, result)
            })
            .buffer_unordered(width)
            .collect()
            .await;

    results.sort_by_key(|(index, _, _)| *index);
    results
        .into_iter()
        .map(|(_, path, result)| (path, result))
        .collect()
}
