//! Semantic tag snapshot.
//!
//! [`TagValues`] holds every user-editable field of a track in
//! format-independent form. The reader produces it, the write policy compares
//! two of them and the writer encodes one back into a container.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::{BitOr, BitOrAssign};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TagError};
use crate::field::TagField;
use crate::image::PictureType;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TagValues {
    pub title: Option<String>,
    pub artist: Option<String>,
    pub album: Option<String>,
    pub album_artist: Option<String>,
    pub track_number: Option<u32>,
    pub track_total: Option<u32>,
    /// Stored order, empty when absent
    pub genres: Vec<String>,
    pub year: Option<i32>,
    pub month: Option<u32>,
    pub day: Option<u32>,
    pub bpm: Option<f64>,
    pub key: Option<String>,
    pub disc_number: Option<u32>,
    pub disc_total: Option<u32>,
    pub compilation: Option<bool>,
    pub comments: BTreeSet<String>,
    /// Picture kind label (`"cover front"`) to image link, used for writing
    pub image_links: BTreeMap<String, String>,
    /// Whether the container holds at least one embedded image
    pub has_image: bool,
    pub uri: Option<String>,
    /// `Some(true)` linked, `Some(false)` marked unavailable, `None` unknown
    pub has_uri: Option<bool>,
}

impl TagValues {
    /// Full date, only when year, month and day are known and form a
    /// calendar date.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year?, self.month?, self.day?)
    }

    pub fn validate(&self) -> Result<()> {
        validate_year(self.year)?;
        validate_month(self.month)?;
        validate_day(self.day)?;
        for label in self.image_links.keys() {
            validate_image_kind(label)?;
        }
        Ok(())
    }

    /// Copy `other`'s present values for `fields` onto `self`.
    ///
    /// Absent values on `other` never clear values on `self`. Image links are
    /// unioned with `other` winning on the same kind.
    pub fn merge(&mut self, other: &TagValues, fields: &[TagField]) {
        for field in TagField::stored_fields(fields) {
            match field {
                TagField::Title => merge_opt(&mut self.title, &other.title),
                TagField::Artist => merge_opt(&mut self.artist, &other.artist),
                TagField::Album => merge_opt(&mut self.album, &other.album),
                TagField::AlbumArtist => merge_opt(&mut self.album_artist, &other.album_artist),
                TagField::TrackNumber => merge_opt(&mut self.track_number, &other.track_number),
                TagField::TrackTotal => merge_opt(&mut self.track_total, &other.track_total),
                TagField::Genres => {
                    if !other.genres.is_empty() {
                        self.genres = other.genres.clone();
                    }
                }
                TagField::Date => {}
                TagField::Year => merge_opt(&mut self.year, &other.year),
                TagField::Month => merge_opt(&mut self.month, &other.month),
                TagField::Day => merge_opt(&mut self.day, &other.day),
                TagField::Bpm => merge_opt(&mut self.bpm, &other.bpm),
                TagField::Key => merge_opt(&mut self.key, &other.key),
                TagField::DiscNumber => merge_opt(&mut self.disc_number, &other.disc_number),
                TagField::DiscTotal => merge_opt(&mut self.disc_total, &other.disc_total),
                TagField::Compilation => merge_opt(&mut self.compilation, &other.compilation),
                TagField::Comments => {
                    if !other.comments.is_empty() {
                        self.comments = other.comments.clone();
                    }
                }
                TagField::Uri => {
                    if other.has_uri.is_some() {
                        self.uri = other.uri.clone();
                        self.has_uri = other.has_uri;
                    }
                }
                TagField::Images => {
                    self.image_links.extend(
                        other
                            .image_links
                            .iter()
                            .map(|(k, v)| (k.clone(), v.clone())),
                    );
                    self.has_image |= other.has_image;
                }
                TagField::All | TagField::Track | TagField::Disc => {}
            }
        }
    }

    /// Drop the values behind `fields` after their tags were removed from
    /// the file. Image links are kept; only the embedded-image flag clears.
    pub fn clear(&mut self, fields: &[TagField]) {
        for field in TagField::stored_fields(fields) {
            match field {
                TagField::Title => self.title = None,
                TagField::Artist => self.artist = None,
                TagField::Album => self.album = None,
                TagField::AlbumArtist => self.album_artist = None,
                TagField::TrackNumber => self.track_number = None,
                TagField::TrackTotal => self.track_total = None,
                TagField::Genres => self.genres.clear(),
                TagField::Date => {}
                TagField::Year => self.year = None,
                TagField::Month => self.month = None,
                TagField::Day => self.day = None,
                TagField::Bpm => self.bpm = None,
                TagField::Key => self.key = None,
                TagField::DiscNumber => self.disc_number = None,
                TagField::DiscTotal => self.disc_total = None,
                TagField::Compilation => self.compilation = None,
                TagField::Comments => self.comments.clear(),
                TagField::Uri => {
                    self.uri = None;
                    self.has_uri = None;
                }
                TagField::Images => self.has_image = false,
                TagField::All | TagField::Track | TagField::Disc => {}
            }
        }
    }
}

fn merge_opt<T: Clone>(into: &mut Option<T>, from: &Option<T>) {
    if from.is_some() {
        into.clone_from(from);
    }
}

impl BitOr for TagValues {
    type Output = TagValues;

    fn bitor(mut self, rhs: TagValues) -> TagValues {
        self.merge(&rhs, &[TagField::All]);
        self
    }
}

impl BitOr<&TagValues> for &TagValues {
    type Output = TagValues;

    fn bitor(self, rhs: &TagValues) -> TagValues {
        let mut merged = self.clone();
        merged.merge(rhs, &[TagField::All]);
        merged
    }
}

impl BitOrAssign<&TagValues> for TagValues {
    fn bitor_assign(&mut self, rhs: &TagValues) {
        self.merge(rhs, &[TagField::All]);
    }
}

pub(crate) fn validate_year(year: Option<i32>) -> Result<()> {
    match year {
        Some(y) if !(1000..=9999).contains(&y) => Err(TagError::Validation {
            field: "year",
            message: format!("{} is not a four digit year", y),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn validate_month(month: Option<u32>) -> Result<()> {
    match month {
        Some(m) if !(1..=12).contains(&m) => Err(TagError::Validation {
            field: "month",
            message: format!("{} is outside 1-12", m),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn validate_day(day: Option<u32>) -> Result<()> {
    match day {
        Some(d) if !(1..=31).contains(&d) => Err(TagError::Validation {
            field: "day",
            message: format!("{} is outside 1-31", d),
        }),
        _ => Ok(()),
    }
}

pub(crate) fn validate_image_kind(label: &str) -> Result<PictureType> {
    PictureType::from_label(label).ok_or_else(|| TagError::Validation {
        field: "image_links",
        message: format!("Unknown image kind '{}'", label),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_date_requires_all_parts() {
        let mut values = TagValues {
            year: Some(2020),
            month: Some(5),
            ..Default::default()
        };
        assert_eq!(values.date(), None);
        values.day = Some(3);
        assert_eq!(values.date(), NaiveDate::from_ymd_opt(2020, 5, 3));
        values.day = Some(31);
        values.month = Some(2);
        assert_eq!(values.date(), None);
    }

    #[test]
    fn test_validate_ranges() {
        let bad_year = TagValues {
            year: Some(999),
            ..Default::default()
        };
        assert!(matches!(
            bad_year.validate(),
            Err(TagError::Validation { field: "year", .. })
        ));

        let bad_kind = TagValues {
            image_links: BTreeMap::from([("poster".to_string(), "a.png".to_string())]),
            ..Default::default()
        };
        assert!(bad_kind.validate().is_err());

        let ok = TagValues {
            year: Some(1999),
            month: Some(12),
            day: Some(31),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_merge_selected_fields() {
        let mut local = TagValues {
            title: Some("Local".into()),
            artist: Some("Artist".into()),
            ..Default::default()
        };
        let remote = TagValues {
            title: Some("Remote".into()),
            album: Some("Album".into()),
            track_number: Some(4),
            track_total: Some(10),
            ..Default::default()
        };

        local.merge(&remote, &[TagField::Track]);
        assert_eq!(local.title.as_deref(), Some("Local"));
        assert_eq!(local.track_number, Some(4));
        assert_eq!(local.track_total, Some(10));
        assert_eq!(local.album, None);
    }

    #[test]
    fn test_bitor_prefers_present_right_hand_values() {
        let left = TagValues {
            title: Some("Left".into()),
            artist: Some("Artist".into()),
            has_image: true,
            ..Default::default()
        };
        let right = TagValues {
            title: Some("Right".into()),
            has_uri: Some(false),
            ..Default::default()
        };

        let merged = &left | &right;
        assert_eq!(merged.title.as_deref(), Some("Right"));
        assert_eq!(merged.artist.as_deref(), Some("Artist"));
        assert_eq!(merged.has_uri, Some(false));
        assert!(merged.has_image);

        let mut assigned = left.clone();
        assigned |= &right;
        assert_eq!(assigned, merged);
        assert_eq!(left | right, merged);
    }
}
