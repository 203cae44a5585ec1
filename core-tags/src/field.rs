//! Semantic tag fields.
//!
//! [`TagField`] names every format-independent attribute the engine reads or
//! writes, plus the request aliases (`All`, `Track`, `Disc`, `Date`) callers
//! use to select groups of fields. The declaration order is significant: it
//! drives write order and the ordering of [`SyncResult`](crate::SyncResult)
//! entries.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TagError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagField {
    /// Every stored field
    All,
    Title,
    Artist,
    Album,
    AlbumArtist,
    /// Track number and track total
    Track,
    TrackNumber,
    TrackTotal,
    Genres,
    /// Combined date tag, or year/month/day when requested as a group
    Date,
    Year,
    Month,
    Day,
    Bpm,
    Key,
    /// Disc number and disc total
    Disc,
    DiscNumber,
    DiscTotal,
    Compilation,
    Comments,
    Uri,
    Images,
}

impl TagField {
    /// Fields with a physical representation in a container, in declared order.
    pub const STORED: [TagField; 19] = [
        TagField::Title,
        TagField::Artist,
        TagField::Album,
        TagField::AlbumArtist,
        TagField::TrackNumber,
        TagField::TrackTotal,
        TagField::Genres,
        TagField::Date,
        TagField::Year,
        TagField::Month,
        TagField::Day,
        TagField::Bpm,
        TagField::Key,
        TagField::DiscNumber,
        TagField::DiscTotal,
        TagField::Compilation,
        TagField::Comments,
        TagField::Uri,
        TagField::Images,
    ];

    /// Units the writer evaluates, one policy table each.
    pub const WRITE_UNITS: [TagField; 14] = [
        TagField::Title,
        TagField::Artist,
        TagField::Album,
        TagField::AlbumArtist,
        TagField::Track,
        TagField::Genres,
        TagField::Date,
        TagField::Bpm,
        TagField::Key,
        TagField::Disc,
        TagField::Compilation,
        TagField::Comments,
        TagField::Uri,
        TagField::Images,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            TagField::All => "all",
            TagField::Title => "title",
            TagField::Artist => "artist",
            TagField::Album => "album",
            TagField::AlbumArtist => "album_artist",
            TagField::Track => "track",
            TagField::TrackNumber => "track_number",
            TagField::TrackTotal => "track_total",
            TagField::Genres => "genres",
            TagField::Date => "date",
            TagField::Year => "year",
            TagField::Month => "month",
            TagField::Day => "day",
            TagField::Bpm => "bpm",
            TagField::Key => "key",
            TagField::Disc => "disc",
            TagField::DiscNumber => "disc_number",
            TagField::DiscTotal => "disc_total",
            TagField::Compilation => "compilation",
            TagField::Comments => "comments",
            TagField::Uri => "uri",
            TagField::Images => "images",
        }
    }

    /// Stored fields covered by this field, in declared order.
    ///
    /// `Date` expands to the combined tag plus its parts since deleting a date
    /// must clear every representation of it.
    pub fn expand(&self) -> Vec<TagField> {
        match self {
            TagField::All => Self::STORED.to_vec(),
            TagField::Track => vec![TagField::TrackNumber, TagField::TrackTotal],
            TagField::Disc => vec![TagField::DiscNumber, TagField::DiscTotal],
            TagField::Date => vec![
                TagField::Date,
                TagField::Year,
                TagField::Month,
                TagField::Day,
            ],
            other => vec![*other],
        }
    }

    /// Write unit this field belongs to.
    pub fn write_unit(&self) -> Option<TagField> {
        match self {
            TagField::All => None,
            TagField::Track | TagField::TrackNumber | TagField::TrackTotal => Some(TagField::Track),
            TagField::Disc | TagField::DiscNumber | TagField::DiscTotal => Some(TagField::Disc),
            TagField::Date | TagField::Year | TagField::Month | TagField::Day => {
                Some(TagField::Date)
            }
            other => Some(*other),
        }
    }

    /// Collapse a request into deduplicated write units in declared order.
    pub fn write_units(fields: &[TagField]) -> Vec<TagField> {
        if fields.contains(&TagField::All) {
            return Self::WRITE_UNITS.to_vec();
        }

        let mut units: Vec<TagField> = fields.iter().filter_map(|f| f.write_unit()).collect();
        units.sort();
        units.dedup();
        units
    }

    /// Collapse a request into deduplicated stored fields in declared order.
    pub fn stored_fields(fields: &[TagField]) -> Vec<TagField> {
        let mut stored: Vec<TagField> = fields.iter().flat_map(|f| f.expand()).collect();
        stored.sort();
        stored.dedup();
        stored
    }
}

impl fmt::Display for TagField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for TagField {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase().replace([' ', '-'], "_");
        Self::STORED
            .iter()
            .chain([TagField::All, TagField::Track, TagField::Disc].iter())
            .find(|field| field.name() == normalized)
            .copied()
            .ok_or_else(|| TagError::Validation {
                field: "tag_field",
                message: format!("Unknown tag field: {}", s),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_composites() {
        assert_eq!(
            TagField::Track.expand(),
            vec![TagField::TrackNumber, TagField::TrackTotal]
        );
        assert_eq!(TagField::Date.expand().len(), 4);
        assert_eq!(TagField::All.expand().len(), TagField::STORED.len());
        assert_eq!(TagField::Title.expand(), vec![TagField::Title]);
    }

    #[test]
    fn test_write_units_collapse_constituents() {
        let units = TagField::write_units(&[
            TagField::Year,
            TagField::TrackTotal,
            TagField::Title,
            TagField::Day,
            TagField::DiscNumber,
        ]);
        assert_eq!(
            units,
            vec![
                TagField::Title,
                TagField::Track,
                TagField::Date,
                TagField::Disc
            ]
        );
    }

    #[test]
    fn test_write_units_all() {
        let units = TagField::write_units(&[TagField::All, TagField::Title]);
        assert_eq!(units, TagField::WRITE_UNITS.to_vec());
    }

    #[test]
    fn test_from_str() {
        assert_eq!("Album Artist".parse::<TagField>().unwrap(), TagField::AlbumArtist);
        assert_eq!("comments".parse::<TagField>().unwrap(), TagField::Comments);
        assert_eq!("track".parse::<TagField>().unwrap(), TagField::Track);
        assert!("lyrics".parse::<TagField>().is_err());
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&TagField::AlbumArtist).unwrap();
        assert_eq!(json, "\"album_artist\"");
        let parsed: TagField = serde_json::from_str("\"disc_total\"").unwrap();
        assert_eq!(parsed, TagField::DiscTotal);
    }
}
