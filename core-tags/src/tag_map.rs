//! Per-format tag maps and encoding strategies.
//!
//! ## Overview
//!
//! Each supported container is described by one static [`FormatSpec`]:
//! - a [`TagMap`] from semantic field to ordered tag identifiers (first
//!   non-empty identifier wins on read, the first identifier is written)
//! - how identifiers are matched against the container's live keys
//! - the handful of encoding choices that differ between containers
//!   (number pairs, genre joining, native scalar types, comment and image
//!   layouts)
//!
//! The reader and writer run one shared algorithm parameterised by these
//! tables instead of per-format subclasses.

use std::path::Path;

use crate::error::{Result, TagError};
use crate::field::TagField;

/// Container family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    Flac,
    Mp3,
    Mp4,
    Wma,
}

impl FormatKind {
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::Flac => "FLAC",
            FormatKind::Mp3 => "MP3",
            FormatKind::Mp4 => "MP4",
            FormatKind::Wma => "WMA",
        }
    }
}

/// Ordered tag identifiers per semantic field. An empty list means the field
/// is unsupported by the format.
#[derive(Debug, Clone, Copy)]
pub struct TagMap {
    pub title: &'static [&'static str],
    pub artist: &'static [&'static str],
    pub album: &'static [&'static str],
    pub album_artist: &'static [&'static str],
    pub track_number: &'static [&'static str],
    pub track_total: &'static [&'static str],
    pub genres: &'static [&'static str],
    pub date: &'static [&'static str],
    pub year: &'static [&'static str],
    pub month: &'static [&'static str],
    pub day: &'static [&'static str],
    pub bpm: &'static [&'static str],
    pub key: &'static [&'static str],
    pub disc_number: &'static [&'static str],
    pub disc_total: &'static [&'static str],
    pub compilation: &'static [&'static str],
    pub comments: &'static [&'static str],
    pub images: &'static [&'static str],
}

impl TagMap {
    const EMPTY: TagMap = TagMap {
        title: &[],
        artist: &[],
        album: &[],
        album_artist: &[],
        track_number: &[],
        track_total: &[],
        genres: &[],
        date: &[],
        year: &[],
        month: &[],
        day: &[],
        bpm: &[],
        key: &[],
        disc_number: &[],
        disc_total: &[],
        compilation: &[],
        comments: &[],
        images: &[],
    };

    /// Identifiers for a stored field. Composite request aliases and `Uri`
    /// have no identifiers of their own.
    pub fn ids(&self, field: TagField) -> &'static [&'static str] {
        match field {
            TagField::Title => self.title,
            TagField::Artist => self.artist,
            TagField::Album => self.album,
            TagField::AlbumArtist => self.album_artist,
            TagField::TrackNumber => self.track_number,
            TagField::TrackTotal => self.track_total,
            TagField::Genres => self.genres,
            TagField::Date => self.date,
            TagField::Year => self.year,
            TagField::Month => self.month,
            TagField::Day => self.day,
            TagField::Bpm => self.bpm,
            TagField::Key => self.key,
            TagField::DiscNumber => self.disc_number,
            TagField::DiscTotal => self.disc_total,
            TagField::Compilation => self.compilation,
            TagField::Comments => self.comments,
            TagField::Images => self.images,
            TagField::All | TagField::Track | TagField::Disc | TagField::Uri => &[],
        }
    }

    /// First identifier, i.e. the one written.
    pub fn primary(&self, field: TagField) -> Option<&'static str> {
        self.ids(field).first().copied()
    }
}

/// How map identifiers are matched against container keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyMatch {
    Exact,
    /// Identifier matches keys whose part before the separator equals it
    /// (ID3 `COMM:desc:lang`, `APIC:desc`).
    Prefix(char),
}

/// How number/total pairs are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NumberLayout {
    /// `"N/M"` text, or separate text tags when number and total map to
    /// different identifiers
    Text,
    /// Native integer pair
    Pair,
}

/// How scalar bpm/compilation values are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScalarStyle {
    /// Stringified (`"128"`, `"1"`)
    Text,
    /// Native integer bpm and boolean compilation
    Native,
}

/// How free-text comments and the URI share the comments field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommentLayout {
    /// One key holding a list of values; the URI is one of those values
    Values,
    /// One entry per description (`COMM:<desc>:<lang>`); comments and URI
    /// use distinct descriptions
    Described {
        comment_key: &'static str,
        uri_key: &'static str,
    },
}

/// Binary layout used for embedded images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageLayout {
    /// One key holding every structured picture (FLAC PICTURE blocks)
    PictureList,
    /// One key per structured picture, keyed by description (ID3 APIC)
    PictureFrames,
    /// Typed cover blobs without classification (MP4 `covr`)
    CoverList,
    /// Flat packed byte blobs (ASF `WM/Picture`)
    PackedBlob,
}

/// Static description of one container format.
#[derive(Debug)]
pub struct FormatSpec {
    pub kind: FormatKind,
    pub extensions: &'static [&'static str],
    pub tag_map: TagMap,
    pub key_match: KeyMatch,
    pub number_layout: NumberLayout,
    pub scalar_style: ScalarStyle,
    /// Separator joining multiple genres into one value
    pub genre_separator: Option<char>,
    pub comment_layout: CommentLayout,
    pub image_layout: ImageLayout,
}

impl FormatSpec {
    /// Whether `key` (a live container key) is covered by identifier `id`.
    pub fn key_matches(&self, id: &str, key: &str) -> bool {
        match self.key_match {
            KeyMatch::Exact => id.eq_ignore_ascii_case(key),
            KeyMatch::Prefix(sep) => key.split(sep).next() == Some(id),
        }
    }
}

pub static FLAC: FormatSpec = FormatSpec {
    kind: FormatKind::Flac,
    extensions: &["flac"],
    tag_map: TagMap {
        title: &["TITLE"],
        artist: &["ARTIST"],
        album: &["ALBUM"],
        album_artist: &["ALBUMARTIST"],
        track_number: &["TRACKNUMBER", "TRACK"],
        track_total: &["TRACKTOTAL", "TOTALTRACKS"],
        genres: &["GENRE"],
        date: &["DATE", "YEAR"],
        year: &["YEAR"],
        bpm: &["BPM"],
        key: &["INITIALKEY"],
        disc_number: &["DISCNUMBER"],
        disc_total: &["DISCTOTAL", "TOTALDISCS"],
        compilation: &["COMPILATION"],
        comments: &["COMMENT", "DESCRIPTION"],
        images: &["METADATA_BLOCK_PICTURE"],
        ..TagMap::EMPTY
    },
    key_match: KeyMatch::Exact,
    number_layout: NumberLayout::Text,
    scalar_style: ScalarStyle::Text,
    genre_separator: None,
    comment_layout: CommentLayout::Values,
    image_layout: ImageLayout::PictureList,
};

pub static MP3: FormatSpec = FormatSpec {
    kind: FormatKind::Mp3,
    extensions: &["mp3"],
    tag_map: TagMap {
        title: &["TIT2"],
        artist: &["TPE1"],
        album: &["TALB"],
        album_artist: &["TPE2"],
        track_number: &["TRCK"],
        track_total: &["TRCK"],
        genres: &["TCON"],
        date: &["TDRC", "TDAT", "TDOR"],
        year: &["TYER", "TORY"],
        bpm: &["TBPM"],
        key: &["TKEY"],
        disc_number: &["TPOS"],
        disc_total: &["TPOS"],
        compilation: &["TCMP"],
        comments: &["COMM"],
        images: &["APIC"],
        ..TagMap::EMPTY
    },
    key_match: KeyMatch::Prefix(':'),
    number_layout: NumberLayout::Text,
    scalar_style: ScalarStyle::Text,
    genre_separator: Some(';'),
    comment_layout: CommentLayout::Described {
        comment_key: "COMM:ID3v1 Comment:eng",
        uri_key: "COMM:URI:eng",
    },
    image_layout: ImageLayout::PictureFrames,
};

pub static MP4: FormatSpec = FormatSpec {
    kind: FormatKind::Mp4,
    extensions: &["m4a", "mp4", "m4b"],
    tag_map: TagMap {
        title: &["©nam"],
        artist: &["©ART"],
        album: &["©alb"],
        album_artist: &["aART"],
        track_number: &["trkn"],
        track_total: &["trkn"],
        genres: &["----:com.apple.iTunes:GENRE", "©gen", "gnre"],
        date: &["©day"],
        bpm: &["tmpo"],
        key: &["----:com.apple.iTunes:INITIALKEY"],
        disc_number: &["disk"],
        disc_total: &["disk"],
        compilation: &["cpil"],
        comments: &["©cmt"],
        images: &["covr"],
        ..TagMap::EMPTY
    },
    key_match: KeyMatch::Exact,
    number_layout: NumberLayout::Pair,
    scalar_style: ScalarStyle::Native,
    genre_separator: None,
    comment_layout: CommentLayout::Values,
    image_layout: ImageLayout::CoverList,
};

pub static WMA: FormatSpec = FormatSpec {
    kind: FormatKind::Wma,
    extensions: &["wma"],
    tag_map: TagMap {
        title: &["Title"],
        artist: &["Author"],
        album: &["WM/AlbumTitle"],
        album_artist: &["WM/AlbumArtist"],
        track_number: &["WM/TrackNumber"],
        track_total: &["TotalTracks", "WM/TrackNumber"],
        genres: &["WM/Genre"],
        year: &["WM/Year", "WM/OriginalReleaseYear"],
        bpm: &["WM/BeatsPerMinute"],
        key: &["WM/InitialKey"],
        disc_number: &["WM/PartOfSet"],
        disc_total: &["WM/PartOfSet"],
        compilation: &["COMPILATION"],
        comments: &["Description", "WM/Comments"],
        images: &["WM/Picture"],
        ..TagMap::EMPTY
    },
    key_match: KeyMatch::Exact,
    number_layout: NumberLayout::Text,
    scalar_style: ScalarStyle::Text,
    genre_separator: None,
    comment_layout: CommentLayout::Values,
    image_layout: ImageLayout::PackedBlob,
};

/// Every supported format. Fixed at startup and read-only afterwards.
pub static FORMATS: [&FormatSpec; 4] = [&FLAC, &MP3, &MP4, &WMA];

/// Select the format for a path by its extension.
pub fn spec_for_path(path: &Path) -> Result<&'static FormatSpec> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
        .unwrap_or_default();

    FORMATS
        .iter()
        .copied()
        .find(|spec| spec.extensions.contains(&extension.as_str()))
        .ok_or_else(|| {
            TagError::UnsupportedFormat(format!(
                "No tag adapter for extension '{}' ({})",
                extension,
                path.display()
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spec_for_path() {
        assert_eq!(spec_for_path(Path::new("a/b.FLAC")).unwrap().kind, FormatKind::Flac);
        assert_eq!(spec_for_path(Path::new("b.m4a")).unwrap().kind, FormatKind::Mp4);
        assert_eq!(spec_for_path(Path::new("b.wma")).unwrap().kind, FormatKind::Wma);
        assert!(matches!(
            spec_for_path(Path::new("b.ogg")),
            Err(TagError::UnsupportedFormat(_))
        ));
        assert!(spec_for_path(Path::new("noext")).is_err());
    }

    #[test]
    fn test_prefix_key_matching() {
        assert!(MP3.key_matches("COMM", "COMM:URI:eng"));
        assert!(MP3.key_matches("TIT2", "TIT2"));
        assert!(!MP3.key_matches("TIT2", "TIT3"));
        assert!(!MP3.key_matches("COMM", "COMMX:a"));
        assert!(FLAC.key_matches("TITLE", "title"));
    }

    #[test]
    fn test_unsupported_fields_are_empty() {
        assert!(WMA.tag_map.ids(TagField::Date).is_empty());
        assert!(FLAC.tag_map.ids(TagField::Month).is_empty());
        assert_eq!(MP3.tag_map.primary(TagField::Date), Some("TDRC"));
        assert!(MP3.tag_map.ids(TagField::Uri).is_empty());
    }

    #[test]
    fn test_shared_number_ids() {
        assert_eq!(
            MP3.tag_map.primary(TagField::TrackNumber),
            MP3.tag_map.primary(TagField::TrackTotal)
        );
        assert_ne!(
            WMA.tag_map.primary(TagField::TrackNumber),
            WMA.tag_map.primary(TagField::TrackTotal)
        );
    }
}
