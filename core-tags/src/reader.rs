//! Tag decoding.
//!
//! ## Overview
//!
//! [`TagReader`] turns a container's raw values into a [`TagValues`]
//! snapshot using the format's [`FormatSpec`]. The decode rules are shared by
//! every format; adapters only differ in the raw values they hand back.
//!
//! Malformed values (an unparsable bpm, a month of 13) decode to `None` and
//! are logged. A raw value of a kind the reader has no rule for raises
//! [`TagError::UnrecognizedRawType`].

use std::collections::BTreeSet;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use bridge_traits::RemoteLink;

use crate::container::TagStore;
use crate::error::{Result, TagError};
use crate::field::TagField;
use crate::image::{unpack_wm_picture, EmbeddedImage, PictureType};
use crate::tag_map::FormatSpec;
use crate::tags::TagValues;
use crate::value::RawValue;

static DATE_YMD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\D+(\d{1,2})\D+(\d{1,2})").expect("valid date pattern"));
static DATE_DMY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{1,2})\D+(\d{1,2})\D+(\d{4})").expect("valid date pattern"));
static DATE_YM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d{4})\D+(\d{1,2})").expect("valid date pattern"));
static DATE_Y: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d{4})").expect("valid date pattern"));
static YEAR_PART: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})").expect("valid date pattern"));
static DAY_MONTH_PART: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{1,2})").expect("valid date pattern"));

/// Which identifiers yielded a value.
struct Found {
    id: &'static str,
    values: Vec<RawValue>,
}

/// Decoder over one container's tag store.
pub struct TagReader<'a> {
    store: &'a dyn TagStore,
    spec: &'static FormatSpec,
    remote: Option<&'a dyn RemoteLink>,
    uri_field: TagField,
}

impl<'a> TagReader<'a> {
    pub fn new(
        store: &'a dyn TagStore,
        spec: &'static FormatSpec,
        remote: Option<&'a dyn RemoteLink>,
        uri_field: TagField,
    ) -> Self {
        Self {
            store,
            spec,
            remote,
            uri_field,
        }
    }

    /// Values of the first identifier in `ids` holding a non-blank value.
    pub fn read_tag(&self, ids: &[&'static str]) -> Option<Vec<RawValue>> {
        self.find_tag(ids).map(|found| found.values)
    }

    fn find_tag(&self, ids: &[&'static str]) -> Option<Found> {
        if ids.is_empty() {
            return None;
        }
        let keys = self.store.keys();

        ids.iter().find_map(|&id| {
            let values: Vec<RawValue> = keys
                .iter()
                .filter(|key| self.spec.key_matches(id, key))
                .filter_map(|key| self.store.get(key))
                .flatten()
                .filter(|value| !value.is_blank())
                .collect();
            (!values.is_empty()).then_some(Found { id, values })
        })
    }

    /// Whether any identifier of `field` is present. Does not decode values.
    pub fn has_tag(&self, field: TagField) -> bool {
        let ids = self.spec.tag_map.ids(field);
        self.store
            .keys()
            .iter()
            .any(|key| ids.iter().any(|id| self.spec.key_matches(id, key)))
    }

    fn texts(&self, ids: &[&'static str]) -> Result<Option<Vec<String>>> {
        match self.find_tag(ids) {
            Some(found) => found
                .values
                .iter()
                .map(|value| value.to_text(found.id))
                .collect::<Result<Vec<_>>>()
                .map(Some),
            None => Ok(None),
        }
    }

    fn first_text(&self, field: TagField) -> Result<Option<String>> {
        Ok(self
            .texts(self.spec.tag_map.ids(field))?
            .and_then(|texts| texts.into_iter().next()))
    }

    /// Decode every field.
    pub fn decode(&self) -> Result<TagValues> {
        let (track_number, track_total) = self.read_number(TagField::TrackNumber, TagField::TrackTotal)?;
        let (disc_number, disc_total) = self.read_number(TagField::DiscNumber, TagField::DiscTotal)?;
        let (year, month, day) = self.read_date()?;
        let (uri, has_uri) = self.read_uri()?;

        let mut values = TagValues {
            title: self.first_text(TagField::Title)?,
            artist: self.first_text(TagField::Artist)?,
            album: self.first_text(TagField::Album)?,
            album_artist: self.first_text(TagField::AlbumArtist)?,
            track_number,
            track_total,
            genres: self.read_genres()?,
            year,
            month,
            day,
            bpm: self.read_bpm()?,
            key: self.first_text(TagField::Key)?,
            disc_number,
            disc_total,
            compilation: self.read_compilation()?,
            comments: self.read_comments()?,
            has_image: self.has_tag(TagField::Images),
            uri,
            has_uri,
            ..TagValues::default()
        };

        if self.remote.is_some() && self.uri_field == TagField::Genres {
            values.genres.retain(|genre| !self.is_uri_like(genre));
        }

        Ok(values)
    }

    fn read_bpm(&self) -> Result<Option<f64>> {
        let Some(found) = self.find_tag(self.spec.tag_map.ids(TagField::Bpm)) else {
            return Ok(None);
        };
        Ok(match &found.values[0] {
            RawValue::Integer(bpm) => Some(*bpm as f64),
            other => {
                let text = other.to_text(found.id)?;
                match text.trim().parse::<f64>() {
                    Ok(bpm) if bpm.is_finite() => Some(bpm),
                    _ => {
                        warn!(tag = found.id, value = %text, "Ignoring invalid bpm");
                        None
                    }
                }
            }
        })
    }

    fn read_compilation(&self) -> Result<Option<bool>> {
        let Some(found) = self.find_tag(self.spec.tag_map.ids(TagField::Compilation)) else {
            return Ok(None);
        };
        Ok(match &found.values[0] {
            RawValue::Boolean(flag) => Some(*flag),
            RawValue::Integer(n) => Some(*n != 0),
            other => {
                let text = other.to_text(found.id)?;
                let text = text.trim();
                match text.parse::<i64>() {
                    Ok(n) => Some(n != 0),
                    Err(_) if text.eq_ignore_ascii_case("true") => Some(true),
                    Err(_) if text.eq_ignore_ascii_case("false") => Some(false),
                    Err(_) => {
                        warn!(tag = found.id, value = %text, "Ignoring invalid compilation flag");
                        None
                    }
                }
            }
        })
    }

    fn read_genres(&self) -> Result<Vec<String>> {
        let Some(texts) = self.texts(self.spec.tag_map.ids(TagField::Genres))? else {
            return Ok(Vec::new());
        };
        Ok(match self.spec.genre_separator {
            Some(separator) => texts
                .iter()
                .flat_map(|text| text.split(separator))
                .map(str::trim)
                .filter(|genre| !genre.is_empty())
                .map(str::to_string)
                .collect(),
            None => texts,
        })
    }

    fn read_comments(&self) -> Result<BTreeSet<String>> {
        let texts = self
            .texts(self.spec.tag_map.ids(TagField::Comments))?
            .unwrap_or_default();
        let strip_uri = self.remote.is_some() && self.uri_field == TagField::Comments;
        Ok(texts
            .into_iter()
            .filter(|text| !(strip_uri && self.is_uri_like(text)))
            .collect())
    }

    /// Number/total pair for track or disc.
    pub fn read_number(&self, number: TagField, total: TagField) -> Result<(Option<u32>, Option<u32>)> {
        let number_ids = self.spec.tag_map.ids(number);
        let total_ids = self.spec.tag_map.ids(total);

        let Some(found) = self.find_tag(number_ids) else {
            return Ok((None, self.read_separate_total(number_ids, total_ids)?));
        };

        let (n, combined_total) = match &found.values[0] {
            RawValue::Pair(n, t) => (nonzero(*n), nonzero(*t)),
            other => {
                let text = other.to_text(found.id)?;
                let (left, right) = match text.split_once('/') {
                    Some((left, right)) => (left, Some(right)),
                    None => (text.as_str(), None),
                };
                (
                    parse_count(found.id, left),
                    right.and_then(|r| parse_count(found.id, r)),
                )
            }
        };

        let t = if number_ids == total_ids {
            combined_total
        } else {
            self.read_separate_total(number_ids, total_ids)?
                .or(combined_total)
        };
        Ok((n, t))
    }

    fn read_separate_total(
        &self,
        number_ids: &[&'static str],
        total_ids: &[&'static str],
    ) -> Result<Option<u32>> {
        let Some(found) = self.find_tag(total_ids) else {
            return Ok(None);
        };
        Ok(match &found.values[0] {
            RawValue::Pair(_, t) => nonzero(*t),
            other => {
                let text = other.to_text(found.id)?;
                match text.split_once('/') {
                    Some((_, right)) => parse_count(found.id, right),
                    // a bare number under the number's own tag is not a total
                    None if number_ids.contains(&found.id) => None,
                    None => parse_count(found.id, &text),
                }
            }
        })
    }

    /// Year, month, day from the combined date tag, else the separate tags.
    pub fn read_date(&self) -> Result<(Option<i32>, Option<u32>, Option<u32>)> {
        let map = &self.spec.tag_map;

        if let Some(texts) = self.texts(map.ids(TagField::Date))? {
            let numeric = !texts.is_empty()
                && texts.len() <= 3
                && texts
                    .iter()
                    .all(|t| !t.trim().is_empty() && t.trim().chars().all(|c| c.is_ascii_digit()));
            let candidate = if numeric {
                texts.iter().map(|t| t.trim()).collect::<Vec<_>>().join("/")
            } else {
                texts[0].trim().to_string()
            };
            return Ok(parse_date(&candidate));
        }

        let part = |field: TagField, pattern: &Regex| -> Result<Option<String>> {
            Ok(self.first_text(field)?.and_then(|text| {
                pattern
                    .captures(&text)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
            }))
        };

        let year = part(TagField::Year, &YEAR_PART)?;
        let month = part(TagField::Month, &DAY_MONTH_PART)?;
        let day = part(TagField::Day, &DAY_MONTH_PART)?;
        Ok(checked_date(year.as_deref(), month.as_deref(), day.as_deref()))
    }

    fn read_uri(&self) -> Result<(Option<String>, Option<bool>)> {
        let Some(remote) = self.remote else {
            return Ok((None, None));
        };
        let Some(texts) = self.texts(self.spec.tag_map.ids(self.uri_field))? else {
            return Ok((None, None));
        };

        let sentinel = remote.unavailable_sentinel();
        for text in texts {
            let value = text.trim();
            if value.eq_ignore_ascii_case(sentinel) {
                return Ok((None, Some(false)));
            }
            if remote.validate_identifier(value) {
                return Ok((Some(value.to_string()), Some(true)));
            }
        }
        Ok((None, None))
    }

    /// Whether `value` is a remote identifier or the unavailable sentinel.
    pub fn is_uri_like(&self, value: &str) -> bool {
        self.remote.is_some_and(|remote| {
            let value = value.trim();
            value.eq_ignore_ascii_case(remote.unavailable_sentinel()) || remote.validate_identifier(value)
        })
    }

    /// Decode every embedded image.
    pub fn read_images(&self) -> Result<Vec<EmbeddedImage>> {
        let Some(found) = self.find_tag(self.spec.tag_map.ids(TagField::Images)) else {
            return Ok(Vec::new());
        };

        found
            .values
            .into_iter()
            .map(|value| match value {
                RawValue::Picture(picture) => Ok(EmbeddedImage {
                    picture_type: picture.picture_type,
                    mime_type: picture.mime_type,
                    description: picture.description,
                    data: picture.data,
                }),
                RawValue::Cover(cover) => Ok(EmbeddedImage {
                    picture_type: PictureType::CoverFront,
                    mime_type: cover.format.mime_type().to_string(),
                    description: String::new(),
                    data: cover.data,
                }),
                RawValue::Binary(data) => unpack_wm_picture(&data),
                other => Err(TagError::unrecognized(found.id, format!("{} as image", other.kind()))),
            })
            .collect()
    }
}

fn nonzero(value: u32) -> Option<u32> {
    (value > 0).then_some(value)
}

fn parse_count(tag: &str, text: &str) -> Option<u32> {
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    match text.parse::<u32>() {
        Ok(n) => nonzero(n),
        Err(_) => {
            warn!(tag, value = %text, "Ignoring invalid number");
            None
        }
    }
}

/// Match a date string against the supported layouts, most specific first.
fn parse_date(text: &str) -> (Option<i32>, Option<u32>, Option<u32>) {
    if let Some(c) = DATE_YMD.captures(text) {
        return checked_date(group(&c, 1), group(&c, 2), group(&c, 3));
    }
    if let Some(c) = DATE_DMY.captures(text) {
        return checked_date(group(&c, 3), group(&c, 2), group(&c, 1));
    }
    if let Some(c) = DATE_YM.captures(text) {
        return checked_date(group(&c, 1), group(&c, 2), None);
    }
    if let Some(c) = DATE_Y.captures(text) {
        return checked_date(group(&c, 1), None, None);
    }
    if !text.is_empty() {
        warn!(value = %text, "Unrecognized date layout");
    }
    (None, None, None)
}

fn group<'t>(captures: &regex::Captures<'t>, index: usize) -> Option<&'t str> {
    captures.get(index).map(|m| m.as_str())
}

fn checked_date(
    year: Option<&str>,
    month: Option<&str>,
    day: Option<&str>,
) -> (Option<i32>, Option<u32>, Option<u32>) {
    let year = year
        .and_then(|y| y.parse::<i32>().ok())
        .filter(|y| (1000..=9999).contains(y));
    let month = month
        .and_then(|m| m.parse::<u32>().ok())
        .filter(|m| (1..=12).contains(m));
    let day = day
        .and_then(|d| d.parse::<u32>().ok())
        .filter(|d| (1..=31).contains(d));
    (year, month, day)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::flac::FlacStore;
    use crate::container::id3::Id3Store;
    use crate::container::mp4::Mp4Store;
    use crate::remote::{SpotifyLink, SPOTIFY_UNAVAILABLE};
    use crate::tag_map::{FormatKind, FLAC, MP3, MP4};
    use mockall::mock;

    mock! {
        pub Store {}
        impl TagStore for Store {
            fn kind(&self) -> FormatKind;
            fn keys(&self) -> Vec<String>;
            fn get(&self, key: &str) -> Option<Vec<RawValue>>;
            fn contains(&self, key: &str) -> bool;
            fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()>;
            fn delete(&mut self, key: &str) -> bool;
            fn render(&self, original: &[u8]) -> Result<Vec<u8>>;
            fn release_picture_data(&mut self);
            fn clone_box(&self) -> Box<dyn TagStore>;
        }
    }

    impl std::fmt::Debug for MockStore {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockStore").finish()
        }
    }

    const TRACK_URI: &str = "spotify:track:6rqhFgbbKwnb9MLmUQDhG6";

    fn flac_store(entries: &[(&str, &[&str])]) -> FlacStore {
        let mut streaminfo = vec![0u8; 34];
        streaminfo[10] = 0x0A;
        streaminfo[11] = 0xC4;
        streaminfo[12] = 0x42;
        let mut data = b"fLaC".to_vec();
        data.push(0x80);
        data.extend_from_slice(&(34u32.to_be_bytes()[1..]));
        data.extend_from_slice(&streaminfo);

        let mut store = FlacStore::parse(&data).unwrap();
        for (key, values) in entries {
            store
                .set(key, values.iter().map(|v| RawValue::text(*v)).collect())
                .unwrap();
        }
        store
    }

    fn reader<'a>(store: &'a dyn TagStore, spec: &'static FormatSpec) -> TagReader<'a> {
        TagReader::new(store, spec, None, TagField::Comments)
    }

    #[test]
    fn test_scalars_and_blank_skipping() {
        let store = flac_store(&[("TITLE", &["  "]), ("ARTIST", &["Artist"]), ("BPM", &["abc"])]);
        let values = reader(&store, &FLAC).decode().unwrap();
        assert_eq!(values.title, None);
        assert_eq!(values.artist.as_deref(), Some("Artist"));
        assert_eq!(values.bpm, None);
    }

    #[test]
    fn test_combined_and_separate_numbers() {
        let store = flac_store(&[("TRACKNUMBER", &["3/12"]), ("DISCNUMBER", &["1"]), ("DISCTOTAL", &["2"])]);
        let values = reader(&store, &FLAC).decode().unwrap();
        assert_eq!((values.track_number, values.track_total), (Some(3), Some(12)));
        assert_eq!((values.disc_number, values.disc_total), (Some(1), Some(2)));

        let mut id3 = Id3Store::parse(b"").unwrap();
        id3.set("TRCK", vec![RawValue::text("03/12")]).unwrap();
        id3.set("TPOS", vec![RawValue::text("2")]).unwrap();
        let values = reader(&id3, &MP3).decode().unwrap();
        assert_eq!((values.track_number, values.track_total), (Some(3), Some(12)));
        assert_eq!((values.disc_number, values.disc_total), (Some(2), None));
    }

    #[test]
    fn test_date_fallback_order() {
        let combined = flac_store(&[("DATE", &["2020-05-03"])]);
        assert_eq!(
            reader(&combined, &FLAC).read_date().unwrap(),
            (Some(2020), Some(5), Some(3))
        );

        let split = flac_store(&[("DATE", &["2020", "5", "3"])]);
        assert_eq!(
            reader(&split, &FLAC).read_date().unwrap(),
            (Some(2020), Some(5), Some(3))
        );

        let year_only = flac_store(&[("YEAR", &["2020"])]);
        assert_eq!(
            reader(&year_only, &FLAC).read_date().unwrap(),
            (Some(2020), None, None)
        );

        let day_first = flac_store(&[("DATE", &["03.05.2020"])]);
        assert_eq!(
            reader(&day_first, &FLAC).read_date().unwrap(),
            (Some(2020), Some(5), Some(3))
        );

        let bad_month = flac_store(&[("DATE", &["2020-13"])]);
        assert_eq!(
            reader(&bad_month, &FLAC).read_date().unwrap(),
            (Some(2020), None, None)
        );
    }

    #[test]
    fn test_comment_deduplication() {
        let store = flac_store(&[("COMMENT", &["one", "two", "one"])]);
        let values = reader(&store, &FLAC).decode().unwrap();
        assert_eq!(values.comments.len(), 2);
    }

    #[test]
    fn test_uri_first_match_wins() {
        let link = SpotifyLink;
        let store = flac_store(&[("COMMENT", &["hello", SPOTIFY_UNAVAILABLE, TRACK_URI])]);
        let r = TagReader::new(&store, &FLAC, Some(&link), TagField::Comments);
        let values = r.decode().unwrap();
        assert_eq!(values.has_uri, Some(false));
        assert_eq!(values.uri, None);
        assert_eq!(values.comments, BTreeSet::from(["hello".to_string()]));

        let store = flac_store(&[("COMMENT", &[TRACK_URI, SPOTIFY_UNAVAILABLE])]);
        let r = TagReader::new(&store, &FLAC, Some(&link), TagField::Comments);
        let values = r.decode().unwrap();
        assert_eq!(values.has_uri, Some(true));
        assert_eq!(values.uri.as_deref(), Some(TRACK_URI));
    }

    #[test]
    fn test_uri_ignored_without_remote_link() {
        let store = flac_store(&[("COMMENT", &[TRACK_URI])]);
        let values = reader(&store, &FLAC).decode().unwrap();
        assert_eq!(values.has_uri, None);
        assert!(values.comments.contains(TRACK_URI));
    }

    #[test]
    fn test_id3_genre_split_and_comment_prefix() {
        let mut id3 = Id3Store::parse(b"").unwrap();
        id3.set("TCON", vec![RawValue::text("Rock; Pop")]).unwrap();
        id3.set("COMM:ID3v1 Comment:eng", vec![RawValue::text("nice")]).unwrap();
        id3.set("COMM:URI:eng", vec![RawValue::text(TRACK_URI)]).unwrap();

        let link = SpotifyLink;
        let r = TagReader::new(&id3, &MP3, Some(&link), TagField::Comments);
        let values = r.decode().unwrap();
        assert_eq!(values.genres, vec!["Rock", "Pop"]);
        assert_eq!(values.comments, BTreeSet::from(["nice".to_string()]));
        assert_eq!(values.uri.as_deref(), Some(TRACK_URI));
    }

    #[test]
    fn test_opaque_value_raises() {
        let mut store = MockStore::new();
        store
            .expect_keys()
            .returning(|| vec!["TITLE".to_string(), "ARTIST".to_string()]);
        store.expect_get().returning(|key| match key {
            "TITLE" => Some(vec![RawValue::Opaque("vorbis binary".to_string())]),
            _ => Some(vec![RawValue::text("Artist")]),
        });

        let r = reader(&store, &FLAC);
        assert_eq!(r.first_text(TagField::Artist).unwrap().as_deref(), Some("Artist"));
        assert!(matches!(
            r.decode(),
            Err(TagError::UnrecognizedRawType { ref tag_id, .. }) if tag_id == "TITLE"
        ));
    }

    #[test]
    fn test_mp4_native_values() {
        let ftyp = [&20u32.to_be_bytes()[..], b"ftypM4A \0\0\0\0M4A "].concat();
        let moov = [&8u32.to_be_bytes()[..], b"moov"].concat();
        let mut store = Mp4Store::parse(&[ftyp, moov].concat()).unwrap();
        store.set("trkn", vec![RawValue::Pair(5, 0)]).unwrap();
        store.set("tmpo", vec![RawValue::Integer(20)]).unwrap();
        store.set("cpil", vec![RawValue::Boolean(false)]).unwrap();

        let values = reader(&store, &MP4).decode().unwrap();
        assert_eq!((values.track_number, values.track_total), (Some(5), None));
        assert_eq!(values.bpm, Some(20.0));
        assert_eq!(values.compilation, Some(false));
    }
}
