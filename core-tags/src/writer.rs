//! Tag encoding and reconciliation.
//!
//! ## Overview
//!
//! [`TagWriter::write`] compares a freshly decoded `source` snapshot with the
//! desired `target` snapshot, field by field, and stages every warranted
//! change in the container's in-memory [`TagStore`]. Nothing is flushed here:
//! the caller renders and writes the file once, after every field of the
//! request has been applied.
//!
//! Whether a field is written is decided by the rule tables in
//! [`policy`](crate::policy); the index of the rule that fired is reported in
//! [`SyncResult::updated`].
//!
//! ## Usage
//!
//! ```ignore
//! let mut writer = TagWriter::new(store.as_mut(), spec, remote, TagField::Comments);
//! let result = writer.write(&source, &target, &[TagField::All], false, false, &images)?;
//! if result.saved {
//!     let bytes = store.render(&original)?;
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use bridge_traits::RemoteLink;

use crate::container::TagStore;
use crate::error::Result;
use crate::field::TagField;
use crate::image::{pack_wm_picture, unpack_wm_picture, PictureType, PreparedImage};
use crate::policy::{self, PolicyInput};
use crate::reader::TagReader;
use crate::tag_map::{CommentLayout, FormatSpec, ImageLayout, NumberLayout, ScalarStyle};
use crate::tags::TagValues;
use crate::value::{Cover, CoverFormat, Picture, RawValue};

/// Outcome of a write or delete request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    /// Whether staged changes must be flushed to disk
    pub saved: bool,
    /// Field to index of the rule that justified the change
    pub updated: BTreeMap<TagField, usize>,
}

impl SyncResult {
    fn finish(updated: BTreeMap<TagField, usize>, dry_run: bool) -> Self {
        Self {
            saved: !dry_run && !updated.is_empty(),
            updated,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.updated.is_empty()
    }
}

/// Encoder over one container's tag store.
pub struct TagWriter<'a> {
    store: &'a mut dyn TagStore,
    spec: &'static FormatSpec,
    remote: Option<&'a dyn RemoteLink>,
    uri_field: TagField,
}

impl<'a> TagWriter<'a> {
    pub fn new(
        store: &'a mut dyn TagStore,
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

    fn reader(&self) -> TagReader<'_> {
        TagReader::new(&*self.store, self.spec, self.remote, self.uri_field)
    }

    /// Reconcile `target` onto the store for the requested fields.
    ///
    /// `images` holds the resolved `target.image_links`; it may be empty on
    /// a dry run.
    pub fn write(
        &mut self,
        source: &TagValues,
        target: &TagValues,
        fields: &[TagField],
        replace: bool,
        dry_run: bool,
        images: &[PreparedImage],
    ) -> Result<SyncResult> {
        let input = PolicyInput {
            source,
            target,
            replace,
        };
        let mut updated = BTreeMap::new();

        for unit in TagField::write_units(fields) {
            if unit == TagField::Uri && self.remote.is_none() {
                continue;
            }
            let Some(condition) = policy::evaluate(unit, &input) else {
                continue;
            };

            let written = self.write_unit(unit, target, dry_run, images)?;
            if !written.is_empty() {
                debug!(
                    format = self.spec.kind.name(),
                    field = unit.name(),
                    condition,
                    dry_run,
                    "Field staged for write"
                );
            }
            for field in written {
                updated.insert(field, condition);
            }
        }

        Ok(SyncResult::finish(updated, dry_run))
    }

    /// Stage one write unit, returning the fields it actually touched.
    fn write_unit(
        &mut self,
        unit: TagField,
        target: &TagValues,
        dry_run: bool,
        images: &[PreparedImage],
    ) -> Result<Vec<TagField>> {
        let written = match unit {
            TagField::Title => self.write_text(unit, target.title.as_deref(), dry_run)?,
            TagField::Artist => self.write_text(unit, target.artist.as_deref(), dry_run)?,
            TagField::Album => self.write_text(unit, target.album.as_deref(), dry_run)?,
            TagField::AlbumArtist => {
                self.write_text(unit, target.album_artist.as_deref(), dry_run)?
            }
            TagField::Key => self.write_text(unit, target.key.as_deref(), dry_run)?,
            TagField::Track => self.write_numbers(
                TagField::TrackNumber,
                TagField::TrackTotal,
                target.track_number,
                target.track_total,
                dry_run,
            )?,
            TagField::Disc => self.write_numbers(
                TagField::DiscNumber,
                TagField::DiscTotal,
                target.disc_number,
                target.disc_total,
                dry_run,
            )?,
            TagField::Genres => self.write_genres(&target.genres, dry_run)?,
            TagField::Date => return self.write_date(target, dry_run),
            TagField::Bpm => self.write_bpm(target.bpm, dry_run)?,
            TagField::Compilation => self.write_compilation(target.compilation, dry_run)?,
            TagField::Comments => self.write_comments(&target.comments, dry_run)?,
            TagField::Uri => self.write_uri(uri_value(target, self.remote), dry_run)?,
            TagField::Images => self.write_images(target, images, dry_run)?,
            _ => false,
        };
        Ok(if written { vec![unit] } else { Vec::new() })
    }

    /// Remove the stored tags behind `fields`.
    ///
    /// Every removed stored field is reported with condition index 0.
    pub fn delete_tags(&mut self, fields: &[TagField], dry_run: bool) -> Result<SyncResult> {
        let mut updated = BTreeMap::new();

        for field in TagField::stored_fields(fields) {
            let removed = match field {
                TagField::Comments => self.write_comments(&BTreeSet::new(), dry_run)?,
                TagField::Uri => self.remote.is_some() && self.write_uri(None, dry_run)?,
                TagField::TrackNumber | TagField::TrackTotal => {
                    self.delete_number_part(field, TagField::TrackNumber, TagField::TrackTotal, dry_run)?
                }
                TagField::DiscNumber | TagField::DiscTotal => {
                    self.delete_number_part(field, TagField::DiscNumber, TagField::DiscTotal, dry_run)?
                }
                other => self.clear_ids(self.spec.tag_map.ids(other), dry_run),
            };
            if removed {
                debug!(format = self.spec.kind.name(), field = field.name(), dry_run, "Tag removed");
                updated.insert(field, 0);
            }
        }

        Ok(SyncResult::finish(updated, dry_run))
    }

    /// Set `id` to `values`, or remove every key matching `id` when `values`
    /// is `None`.
    pub fn write_tag(&mut self, id: &str, values: Option<Vec<RawValue>>, dry_run: bool) -> Result<bool> {
        match values {
            Some(values) => {
                if !dry_run {
                    self.store.set(id, values)?;
                }
                Ok(true)
            }
            None => Ok(self.clear_ids(&[id], dry_run)),
        }
    }

    fn clear_ids(&mut self, ids: &[&str], dry_run: bool) -> bool {
        let keys: Vec<String> = self
            .store
            .keys()
            .into_iter()
            .filter(|key| ids.iter().any(|id| self.spec.key_matches(id, key)))
            .collect();
        if !dry_run {
            for key in &keys {
                self.store.delete(key);
            }
        }
        !keys.is_empty()
    }

    fn delete_key(&mut self, key: &str, dry_run: bool) -> bool {
        if dry_run {
            self.store.contains(key)
        } else {
            self.store.delete(key)
        }
    }

    /// Primary identifier set to `value`, or every identifier cleared.
    fn write_scalar(&mut self, field: TagField, value: Option<RawValue>, dry_run: bool) -> Result<bool> {
        let ids = self.spec.tag_map.ids(field);
        let Some(&primary) = ids.first() else {
            return Ok(false);
        };
        match value {
            Some(value) => self.write_tag(primary, Some(vec![value]), dry_run),
            None => Ok(self.clear_ids(ids, dry_run)),
        }
    }

    fn write_text(&mut self, field: TagField, value: Option<&str>, dry_run: bool) -> Result<bool> {
        self.write_scalar(field, value.map(RawValue::text), dry_run)
    }

    fn write_bpm(&mut self, bpm: Option<f64>, dry_run: bool) -> Result<bool> {
        let value = bpm.map(|bpm| match self.spec.scalar_style {
            ScalarStyle::Native => RawValue::Integer(bpm.trunc() as i64),
            ScalarStyle::Text if bpm.fract() == 0.0 => RawValue::text((bpm as i64).to_string()),
            ScalarStyle::Text => RawValue::text(bpm.to_string()),
        });
        self.write_scalar(TagField::Bpm, value, dry_run)
    }

    fn write_compilation(&mut self, compilation: Option<bool>, dry_run: bool) -> Result<bool> {
        let value = compilation.map(|flag| match self.spec.scalar_style {
            ScalarStyle::Native => RawValue::Boolean(flag),
            ScalarStyle::Text => RawValue::text(if flag { "1" } else { "0" }),
        });
        self.write_scalar(TagField::Compilation, value, dry_run)
    }

    /// URI-like values living in `field` that must survive a rewrite of it.
    fn carried_uri_values(&self, field: TagField) -> Result<Vec<String>> {
        if self.remote.is_none() || self.uri_field != field {
            return Ok(Vec::new());
        }
        let reader = self.reader();
        Ok(self
            .list_texts(&reader, field)?
            .into_iter()
            .filter(|text| reader.is_uri_like(text))
            .collect())
    }

    /// Stored texts of a list field, split on the genre separator.
    fn list_texts(&self, reader: &TagReader<'_>, field: TagField) -> Result<Vec<String>> {
        let Some(values) = reader.read_tag(self.spec.tag_map.ids(field)) else {
            return Ok(Vec::new());
        };

        let mut texts = Vec::new();
        for value in values {
            let text = value.to_text(field.name())?;
            match self.spec.genre_separator {
                Some(separator) if field == TagField::Genres => texts.extend(
                    text.split(separator)
                        .map(str::trim)
                        .filter(|part| !part.is_empty())
                        .map(str::to_string),
                ),
                _ => texts.push(text),
            }
        }
        Ok(texts)
    }

    /// Write a list-valued text field, joining on the genre separator when
    /// the format stores genres in one value.
    fn write_list(&mut self, field: TagField, values: Vec<String>, dry_run: bool) -> Result<bool> {
        let ids = self.spec.tag_map.ids(field);
        let Some(&primary) = ids.first() else {
            return Ok(false);
        };
        if values.is_empty() {
            return Ok(self.clear_ids(ids, dry_run));
        }

        let raw = match self.spec.genre_separator {
            Some(separator) if field == TagField::Genres => {
                vec![RawValue::text(values.join(&separator.to_string()))]
            }
            _ => values.into_iter().map(RawValue::Text).collect(),
        };
        self.write_tag(primary, Some(raw), dry_run)
    }

    fn write_genres(&mut self, genres: &[String], dry_run: bool) -> Result<bool> {
        let mut values = genres.to_vec();
        values.extend(self.carried_uri_values(TagField::Genres)?);
        self.write_list(TagField::Genres, values, dry_run)
    }

    fn write_comments(&mut self, comments: &BTreeSet<String>, dry_run: bool) -> Result<bool> {
        match self.spec.comment_layout {
            CommentLayout::Described {
                comment_key,
                uri_key,
            } => {
                let ids = self.spec.tag_map.ids(TagField::Comments);
                let stale: Vec<String> = self
                    .store
                    .keys()
                    .into_iter()
                    .filter(|key| key != uri_key && ids.iter().any(|id| self.spec.key_matches(id, key)))
                    .collect();

                if !dry_run {
                    for key in &stale {
                        self.store.delete(key);
                    }
                }
                if comments.is_empty() {
                    return Ok(!stale.is_empty());
                }

                let values = comments.iter().cloned().map(RawValue::Text).collect();
                self.write_tag(comment_key, Some(values), dry_run)
            }
            CommentLayout::Values => {
                let mut values: Vec<String> = comments.iter().cloned().collect();
                values.extend(self.carried_uri_values(TagField::Comments)?);
                self.write_list(TagField::Comments, values, dry_run)
            }
        }
    }

    /// Write or remove the remote identifier in its carrier field.
    fn write_uri(&mut self, value: Option<String>, dry_run: bool) -> Result<bool> {
        let carrier = self.uri_field;

        if let (TagField::Comments, CommentLayout::Described { uri_key, .. }) =
            (carrier, self.spec.comment_layout)
        {
            return match value {
                Some(value) => self.write_tag(uri_key, Some(vec![RawValue::Text(value)]), dry_run),
                None => Ok(self.delete_key(uri_key, dry_run)),
            };
        }

        if matches!(carrier, TagField::Comments | TagField::Genres) {
            let (mut kept, had_uri) = {
                let reader = self.reader();
                let texts = self.list_texts(&reader, carrier)?;
                let had_uri = texts.iter().any(|text| reader.is_uri_like(text));
                let kept: Vec<String> = texts
                    .into_iter()
                    .filter(|text| !reader.is_uri_like(text))
                    .collect();
                (kept, had_uri)
            };
            if value.is_none() && !had_uri {
                return Ok(false);
            }

            kept.extend(value);
            return self.write_list(carrier, kept, dry_run);
        }

        self.write_text(carrier, value.as_deref(), dry_run)
    }

    fn write_numbers(
        &mut self,
        number_field: TagField,
        total_field: TagField,
        number: Option<u32>,
        total: Option<u32>,
        dry_run: bool,
    ) -> Result<bool> {
        let spec = self.spec;
        let map = &spec.tag_map;
        let number_ids = map.ids(number_field);
        let total_ids = map.ids(total_field);
        let Some(&number_id) = number_ids.first() else {
            return Ok(false);
        };

        if self.spec.number_layout == NumberLayout::Pair {
            if number.is_none() && total.is_none() {
                return Ok(self.clear_ids(number_ids, dry_run));
            }
            let pair = RawValue::Pair(number.unwrap_or(0), total.unwrap_or(0));
            return self.write_tag(number_id, Some(vec![pair]), dry_run);
        }

        let width = pad_width(number_field, total);
        let padded = |n: u32| format!("{:0width$}", n, width = width);

        if number_ids == total_ids {
            let text = match (number, total) {
                (None, None) => return Ok(self.clear_ids(number_ids, dry_run)),
                (n, None) => padded(n.unwrap_or(0)),
                (n, Some(t)) => format!("{}/{}", padded(n.unwrap_or(0)), t),
            };
            return self.write_tag(number_id, Some(vec![RawValue::Text(text)]), dry_run);
        }

        let total_only: Vec<&str> = total_ids
            .iter()
            .copied()
            .filter(|id| !number_ids.contains(id))
            .collect();

        let wrote_number = match number {
            Some(n) => self.write_tag(number_id, Some(vec![RawValue::Text(padded(n))]), dry_run)?,
            None => self.clear_ids(number_ids, dry_run),
        };
        let wrote_total = match (total, total_only.first()) {
            (Some(t), Some(&total_id)) => {
                self.write_tag(total_id, Some(vec![RawValue::Text(t.to_string())]), dry_run)?
            }
            (None, _) => self.clear_ids(&total_only, dry_run),
            (Some(_), None) => false,
        };
        Ok(wrote_number || wrote_total)
    }

    fn delete_number_part(
        &mut self,
        part: TagField,
        number_field: TagField,
        total_field: TagField,
        dry_run: bool,
    ) -> Result<bool> {
        let (number, total) = self.reader().read_number(number_field, total_field)?;
        let (number, total, present) = if part == number_field {
            (None, total, number.is_some())
        } else {
            (number, None, total.is_some())
        };

        if present && !dry_run {
            self.write_numbers(number_field, total_field, number, total, false)?;
        }
        Ok(present)
    }

    /// Combined date when the format has one, otherwise the separate parts.
    fn write_date(&mut self, target: &TagValues, dry_run: bool) -> Result<Vec<TagField>> {
        let spec = self.spec;
        let map = &spec.tag_map;
        let date_ids = map.ids(TagField::Date);

        let Some(year) = target.year else {
            let mut cleared = self.clear_ids(date_ids, dry_run);
            for part in [TagField::Year, TagField::Month, TagField::Day] {
                cleared |= self.clear_ids(map.ids(part), dry_run);
            }
            let reported = if date_ids.is_empty() { TagField::Year } else { TagField::Date };
            return Ok(if cleared { vec![reported] } else { Vec::new() });
        };

        if let Some(&date_id) = date_ids.first() {
            let text = match (target.month, target.day) {
                (Some(month), Some(day)) => format!("{:04}-{:02}-{:02}", year, month, day),
                (Some(month), None) => format!("{:04}-{:02}", year, month),
                (None, _) => format!("{:04}", year),
            };
            self.write_tag(date_id, Some(vec![RawValue::Text(text)]), dry_run)?;
            return Ok(vec![TagField::Date]);
        }

        let parts = [
            (TagField::Year, Some(format!("{:04}", year))),
            (TagField::Month, target.month.map(|m| format!("{:02}", m))),
            (TagField::Day, target.day.map(|d| format!("{:02}", d))),
        ];
        let mut written = Vec::new();
        for (field, value) in parts {
            let ids = map.ids(field);
            let Some(&primary) = ids.first() else {
                continue;
            };
            let changed = match value {
                Some(text) => self.write_tag(primary, Some(vec![RawValue::Text(text)]), dry_run)?,
                None => self.clear_ids(ids, dry_run),
            };
            if changed {
                written.push(field);
            }
        }
        Ok(written)
    }

    fn write_images(&mut self, target: &TagValues, images: &[PreparedImage], dry_run: bool) -> Result<bool> {
        let ids = self.spec.tag_map.ids(TagField::Images);
        let Some(&id) = ids.first() else {
            return Ok(false);
        };
        if target.image_links.is_empty() {
            return Ok(false);
        }
        if dry_run {
            return Ok(true);
        }
        if images.is_empty() {
            return Ok(false);
        }

        let kinds: BTreeSet<PictureType> = images.iter().map(|image| image.kind).collect();

        match self.spec.image_layout {
            ImageLayout::PictureList => {
                let mut values: Vec<RawValue> = self
                    .store
                    .get(id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|value| !matches!(value, RawValue::Picture(p) if kinds.contains(&p.picture_type)))
                    .collect();
                values.extend(images.iter().map(|image| RawValue::Picture(picture_from(image))));
                self.store.set(id, values)?;
            }
            ImageLayout::PictureFrames => {
                let replaced: Vec<String> = self
                    .store
                    .keys()
                    .into_iter()
                    .filter(|key| self.spec.key_matches(id, key))
                    .filter(|key| {
                        self.store.get(key).unwrap_or_default().iter().any(
                            |value| matches!(value, RawValue::Picture(p) if kinds.contains(&p.picture_type)),
                        )
                    })
                    .collect();
                for key in &replaced {
                    self.store.delete(key);
                }
                for image in images {
                    let key = format!("{}:{}", id, image.kind.label());
                    self.store.set(&key, vec![RawValue::Picture(picture_from(image))])?;
                }
            }
            ImageLayout::CoverList => {
                let covers = images
                    .iter()
                    .map(|image| {
                        RawValue::Cover(Cover {
                            format: CoverFormat::from_mime(&image.mime_type),
                            data: image.data.clone(),
                        })
                    })
                    .collect();
                self.store.set(id, covers)?;
            }
            ImageLayout::PackedBlob => {
                let mut values: Vec<RawValue> = self
                    .store
                    .get(id)
                    .unwrap_or_default()
                    .into_iter()
                    .filter(|value| match value {
                        RawValue::Binary(data) => unpack_wm_picture(data)
                            .map(|existing| !kinds.contains(&existing.picture_type))
                            .unwrap_or(true),
                        _ => true,
                    })
                    .collect();
                for image in images {
                    let packed = pack_wm_picture(image.kind, &image.mime_type, "", &image.data)?;
                    values.push(RawValue::Binary(packed.into()));
                }
                self.store.set(id, values)?;
            }
        }
        Ok(true)
    }
}

/// Value the URI carrier should hold: the sentinel when marked unavailable,
/// the identifier when linked, nothing when unknown.
fn uri_value(target: &TagValues, remote: Option<&dyn RemoteLink>) -> Option<String> {
    match target.has_uri {
        Some(false) => remote.map(|remote| remote.unavailable_sentinel().to_string()),
        Some(true) => target.uri.clone(),
        None => None,
    }
}

/// Digits of the total, else 2 for tracks and 1 for discs.
fn pad_width(number_field: TagField, total: Option<u32>) -> usize {
    match total {
        Some(total) => total.to_string().len(),
        None if number_field == TagField::TrackNumber => 2,
        None => 1,
    }
}

fn picture_from(image: &PreparedImage) -> Picture {
    Picture {
        picture_type: image.kind,
        mime_type: image.mime_type.clone(),
        description: String::new(),
        data: image.data.clone(),
        width: image.width,
        height: image.height,
        depth: image.depth,
        colors: 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::flac::FlacStore;
    use crate::container::id3::Id3Store;
    use crate::container::mp4::Mp4Store;
    use crate::remote::{SpotifyLink, SPOTIFY_UNAVAILABLE};
    use crate::tag_map::{FLAC, MP3, MP4};
    use bytes::Bytes;

    const TRACK_URI: &str = "spotify:track:6rqhFgbbKwnb9MLmUQDhG6";

    fn flac_store() -> FlacStore {
        let mut data = b"fLaC".to_vec();
        data.push(0x80);
        data.extend_from_slice(&(34u32.to_be_bytes()[1..]));
        data.extend_from_slice(&[0u8; 34]);
        FlacStore::parse(&data).unwrap()
    }

    fn mp4_store() -> Mp4Store {
        let ftyp = [&20u32.to_be_bytes()[..], b"ftypM4A \0\0\0\0M4A "].concat();
        let moov = [&8u32.to_be_bytes()[..], b"moov"].concat();
        Mp4Store::parse(&[ftyp, moov].concat()).unwrap()
    }

    fn texts(store: &dyn TagStore, key: &str) -> Vec<String> {
        store
            .get(key)
            .unwrap_or_default()
            .iter()
            .map(|v| v.to_text(key).unwrap())
            .collect()
    }

    fn decode(store: &dyn TagStore, spec: &'static FormatSpec, remote: Option<&dyn RemoteLink>) -> TagValues {
        TagReader::new(store, spec, remote, TagField::Comments)
            .decode()
            .unwrap()
    }

    fn prepared(kind: PictureType, data: &'static [u8]) -> PreparedImage {
        PreparedImage {
            kind,
            mime_type: "image/png".to_string(),
            data: Bytes::from_static(data),
            width: 1,
            height: 1,
            depth: 24,
        }
    }

    #[test]
    fn test_fill_missing_and_replace_report_conditions() {
        let mut store = flac_store();
        store.set("TITLE", vec![RawValue::text("Old")]).unwrap();
        let source = decode(&store, &FLAC, None);
        let target = TagValues {
            title: Some("New".into()),
            artist: Some("Artist".into()),
            ..Default::default()
        };

        let mut writer = TagWriter::new(&mut store, &FLAC, None, TagField::Comments);
        let result = writer
            .write(&source, &target, &[TagField::Title, TagField::Artist], false, false, &[])
            .unwrap();
        assert!(result.saved);
        assert_eq!(result.updated, BTreeMap::from([(TagField::Artist, 0)]));
        assert_eq!(texts(&store, "TITLE"), vec!["Old"]);

        let mut writer = TagWriter::new(&mut store, &FLAC, None, TagField::Comments);
        let result = writer
            .write(&source, &target, &[TagField::Title], true, false, &[])
            .unwrap();
        assert_eq!(result.updated, BTreeMap::from([(TagField::Title, 1)]));
        assert_eq!(texts(&store, "TITLE"), vec!["New"]);
    }

    #[test]
    fn test_dry_run_reports_without_mutating() {
        let mut store = flac_store();
        let source = decode(&store, &FLAC, None);
        let target = TagValues {
            title: Some("New".into()),
            genres: vec!["Rock".into()],
            ..Default::default()
        };

        let mut writer = TagWriter::new(&mut store, &FLAC, None, TagField::Comments);
        let result = writer
            .write(&source, &target, &[TagField::All], false, true, &[])
            .unwrap();
        assert!(!result.saved);
        assert_eq!(result.updated.len(), 2);
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_joined_numbers_pad_to_total_width() {
        let mut store = Id3Store::parse(b"").unwrap();
        let target = TagValues {
            track_number: Some(3),
            track_total: Some(120),
            disc_number: Some(1),
            ..Default::default()
        };
        let mut writer = TagWriter::new(&mut store, &MP3, None, TagField::Comments);
        let result = writer
            .write(&TagValues::default(), &target, &[TagField::Track, TagField::Disc], false, false, &[])
            .unwrap();
        assert_eq!(
            result.updated,
            BTreeMap::from([(TagField::Track, 0), (TagField::Disc, 0)])
        );
        assert_eq!(texts(&store, "TRCK"), vec!["003/120"]);
        assert_eq!(texts(&store, "TPOS"), vec!["1"]);

        let values = decode(&store, &MP3, None);
        assert_eq!((values.track_number, values.track_total), (Some(3), Some(120)));
    }

    #[test]
    fn test_separate_numbers_and_pair_layout() {
        let mut flac = flac_store();
        let target = TagValues {
            track_number: Some(7),
            track_total: Some(9),
            ..Default::default()
        };
        TagWriter::new(&mut flac, &FLAC, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Track], false, false, &[])
            .unwrap();
        assert_eq!(texts(&flac, "TRACKNUMBER"), vec!["7"]);
        assert_eq!(texts(&flac, "TRACKTOTAL"), vec!["9"]);

        let mut mp4 = mp4_store();
        TagWriter::new(&mut mp4, &MP4, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Track], false, false, &[])
            .unwrap();
        assert_eq!(mp4.get("trkn"), Some(vec![RawValue::Pair(7, 9)]));
    }

    #[test]
    fn test_date_layouts_and_part_fallback() {
        let mut store = flac_store();
        let target = TagValues {
            year: Some(2020),
            month: Some(5),
            ..Default::default()
        };
        let result = TagWriter::new(&mut store, &FLAC, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Year], false, false, &[])
            .unwrap();
        assert_eq!(result.updated, BTreeMap::from([(TagField::Date, 0)]));
        assert_eq!(texts(&store, "DATE"), vec!["2020-05"]);

        let source = decode(&store, &FLAC, None);
        assert_eq!((source.year, source.month, source.day), (Some(2020), Some(5), None));

        let cleared = TagValues::default();
        let result = TagWriter::new(&mut store, &FLAC, None, TagField::Comments)
            .write(&source, &cleared, &[TagField::Date], true, false, &[])
            .unwrap();
        assert_eq!(result.updated, BTreeMap::from([(TagField::Date, 1)]));
        assert!(store.keys().is_empty());
    }

    #[test]
    fn test_native_scalars_on_mp4() {
        let mut store = mp4_store();
        let target = TagValues {
            bpm: Some(127.6),
            compilation: Some(true),
            genres: vec!["Rock".into(), "Pop".into()],
            ..Default::default()
        };
        TagWriter::new(&mut store, &MP4, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::All], false, false, &[])
            .unwrap();

        assert_eq!(store.get("tmpo"), Some(vec![RawValue::Integer(128)]));
        assert_eq!(store.get("cpil"), Some(vec![RawValue::Boolean(true)]));
        let values = decode(&store, &MP4, None);
        assert_eq!(values.genres, vec!["Rock", "Pop"]);
    }

    #[test]
    fn test_id3_genres_join_and_comments_keep_uri_frame() {
        let link = SpotifyLink;
        let mut store = Id3Store::parse(b"").unwrap();
        store.set("COMM:URI:eng", vec![RawValue::text(TRACK_URI)]).unwrap();
        store.set("COMM:Old:eng", vec![RawValue::text("stale")]).unwrap();

        let source = decode(&store, &MP3, Some(&link));
        let target = TagValues {
            genres: vec!["Rock".into(), "Pop".into()],
            comments: BTreeSet::from(["b".to_string(), "a".to_string()]),
            ..source.clone()
        };
        TagWriter::new(&mut store, &MP3, Some(&link), TagField::Comments)
            .write(&source, &target, &[TagField::Genres, TagField::Comments], true, false, &[])
            .unwrap();

        assert_eq!(texts(&store, "TCON"), vec!["Rock;Pop"]);
        assert_eq!(texts(&store, "COMM:ID3v1 Comment:eng"), vec!["a", "b"]);
        assert!(!store.contains("COMM:Old:eng"));
        assert_eq!(texts(&store, "COMM:URI:eng"), vec![TRACK_URI]);

        let values = decode(&store, &MP3, Some(&link));
        assert_eq!(values.comments, target.comments);
        assert_eq!(values.uri.as_deref(), Some(TRACK_URI));
    }

    #[test]
    fn test_uri_in_comment_values_coexists_with_text() {
        let link = SpotifyLink;
        let mut store = flac_store();
        store
            .set("COMMENT", vec![RawValue::text("hello"), RawValue::text(TRACK_URI)])
            .unwrap();
        let source = decode(&store, &FLAC, Some(&link));
        assert_eq!(source.uri.as_deref(), Some(TRACK_URI));

        let target = TagValues {
            comments: BTreeSet::from(["hello".to_string(), "world".to_string()]),
            uri: None,
            has_uri: Some(false),
            ..source.clone()
        };
        let result = TagWriter::new(&mut store, &FLAC, Some(&link), TagField::Comments)
            .write(&source, &target, &[TagField::All], true, false, &[])
            .unwrap();
        assert_eq!(result.updated.get(&TagField::Comments), Some(&1));
        assert_eq!(result.updated.get(&TagField::Uri), Some(&0));
        assert_eq!(
            texts(&store, "COMMENT"),
            vec!["hello", "world", SPOTIFY_UNAVAILABLE]
        );

        let values = decode(&store, &FLAC, Some(&link));
        assert_eq!(values.comments, target.comments);
        assert_eq!(values.has_uri, Some(false));
    }

    #[test]
    fn test_uri_skipped_without_remote_link() {
        let mut store = flac_store();
        let target = TagValues {
            uri: Some(TRACK_URI.into()),
            has_uri: Some(true),
            ..Default::default()
        };
        let result = TagWriter::new(&mut store, &FLAC, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Uri], true, false, &[])
            .unwrap();
        assert!(result.is_empty());
        assert!(!result.saved);
    }

    #[test]
    fn test_bpm_text_form() {
        let mut store = flac_store();
        let target = TagValues {
            bpm: Some(128.0),
            ..Default::default()
        };
        TagWriter::new(&mut store, &FLAC, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Bpm], false, false, &[])
            .unwrap();
        assert_eq!(texts(&store, "BPM"), vec!["128"]);
    }

    #[test]
    fn test_picture_list_replaces_same_kind_only() {
        let mut store = flac_store();
        store
            .set(
                "METADATA_BLOCK_PICTURE",
                vec![
                    RawValue::Picture(Picture::new(PictureType::CoverFront, "image/jpeg", Bytes::from_static(b"old"))),
                    RawValue::Picture(Picture::new(PictureType::Media, "image/jpeg", Bytes::from_static(b"cd"))),
                ],
            )
            .unwrap();
        let source = decode(&store, &FLAC, None);
        let target = TagValues {
            image_links: BTreeMap::from([("cover front".to_string(), "cover.png".to_string())]),
            ..source.clone()
        };
        let images = [prepared(PictureType::CoverFront, b"new")];

        let result = TagWriter::new(&mut store, &FLAC, None, TagField::Comments)
            .write(&source, &target, &[TagField::Images], true, false, &images)
            .unwrap();
        assert_eq!(result.updated, BTreeMap::from([(TagField::Images, 1)]));

        let pictures: Vec<(PictureType, Bytes)> = store
            .get("METADATA_BLOCK_PICTURE")
            .unwrap()
            .into_iter()
            .map(|v| match v {
                RawValue::Picture(p) => (p.picture_type, p.data),
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        assert_eq!(
            pictures,
            vec![
                (PictureType::Media, Bytes::from_static(b"cd")),
                (PictureType::CoverFront, Bytes::from_static(b"new")),
            ]
        );
    }

    #[test]
    fn test_apic_frames_keyed_by_label() {
        let mut store = Id3Store::parse(b"").unwrap();
        let target = TagValues {
            image_links: BTreeMap::from([
                ("cover front".to_string(), "a.png".to_string()),
                ("cover back".to_string(), "b.png".to_string()),
            ]),
            ..Default::default()
        };
        let images = [
            prepared(PictureType::CoverFront, b"front"),
            prepared(PictureType::CoverBack, b"back"),
        ];
        TagWriter::new(&mut store, &MP3, None, TagField::Comments)
            .write(&TagValues::default(), &target, &[TagField::Images], false, false, &images)
            .unwrap();

        assert!(store.contains("APIC:cover front"));
        assert!(store.contains("APIC:cover back"));
        let reader = TagReader::new(&store, &MP3, None, TagField::Comments);
        assert_eq!(reader.read_images().unwrap().len(), 2);
    }

    #[test]
    fn test_delete_keeps_other_half_of_shared_number() {
        let mut store = Id3Store::parse(b"").unwrap();
        store.set("TRCK", vec![RawValue::text("03/12")]).unwrap();
        store.set("TIT2", vec![RawValue::text("Title")]).unwrap();

        let mut writer = TagWriter::new(&mut store, &MP3, None, TagField::Comments);
        let dry = writer
            .delete_tags(&[TagField::TrackTotal, TagField::Album], true)
            .unwrap();
        assert_eq!(dry.updated, BTreeMap::from([(TagField::TrackTotal, 0)]));
        assert!(!dry.saved);
        assert_eq!(texts(&store, "TRCK"), vec!["03/12"]);

        let mut writer = TagWriter::new(&mut store, &MP3, None, TagField::Comments);
        let result = writer.delete_tags(&[TagField::TrackTotal], false).unwrap();
        assert!(result.saved);
        assert_eq!(texts(&store, "TRCK"), vec!["03"]);

        let mut writer = TagWriter::new(&mut store, &MP3, None, TagField::Comments);
        let result = writer.delete_tags(&[TagField::All], false).unwrap();
        assert_eq!(
            result.updated.keys().copied().collect::<Vec<_>>(),
            vec![TagField::Title, TagField::TrackNumber]
        );
        assert!(store.keys().is_empty());
    }
}
