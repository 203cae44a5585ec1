//! FLAC metadata blocks.
//!
//! Vorbis comments are exposed under their upper-cased field names; PICTURE
//! blocks are exposed together under `METADATA_BLOCK_PICTURE`. Parsing and
//! writing go through lofty's [`VorbisComments`]; STREAMINFO, SEEKTABLE,
//! APPLICATION and CUESHEET blocks are carried through untouched.

use std::io::Cursor;

use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::flac::FlacFile;
use lofty::ogg::{OggPictureStorage, VorbisComments};
use lofty::tag::TagExt;

use super::bytes_ext::be_u24;
use super::pictures::{from_lofty, to_lofty, without_data};
use super::TagStore;
use crate::error::{Result, TagError};
use crate::tag_map::FormatKind;
use crate::value::{split_nulls, RawValue};

pub const PICTURE_KEY: &str = "METADATA_BLOCK_PICTURE";

const BLOCK_PADDING: u8 = 1;
const RENDER_PADDING: u32 = 1024;

#[derive(Debug, Clone)]
pub struct FlacStore {
    comments: VorbisComments,
    released: bool,
}

fn corrupted(message: impl std::fmt::Display) -> TagError {
    TagError::corrupted("FLAC", message)
}

/// Field names are ASCII 0x20..=0x7D without `=`.
fn valid_key(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| (0x20..=0x7D).contains(&b) && b != b'=')
}

impl FlacStore {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let options = ParseOptions::new().read_properties(false);
        let mut file = FlacFile::read_from(&mut Cursor::new(data), options).map_err(corrupted)?;

        let mut comments = file.remove_vorbis_comments().unwrap_or_default();
        for (picture, info) in file.pictures() {
            comments
                .insert_picture(picture.clone(), Some(*info))
                .map_err(corrupted)?;
        }

        Ok(FlacStore {
            comments,
            released: false,
        })
    }
}

/// Length of a leading ID3v2 tag, 0 when absent.
fn id3v2_len(data: &[u8]) -> usize {
    if data.len() < 10 || &data[0..3] != b"ID3" {
        return 0;
    }
    let size = data[6..10]
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F));
    let footer = if data[5] & 0x10 != 0 { 10 } else { 0 };
    10 + size + footer
}

/// Copy of `stream` whose metadata chain ends in a PADDING block.
///
/// lofty rewrites the comment and picture blocks in place but only keeps a
/// trailing PADDING block intact, so one is appended when missing.
fn with_final_padding(stream: &[u8]) -> Result<Vec<u8>> {
    if stream.get(0..4) != Some(b"fLaC".as_slice()) {
        return Err(corrupted("missing fLaC stream marker"));
    }

    let mut pos = 4;
    let (last_header, last_type) = loop {
        let header = *stream.get(pos).ok_or_else(|| corrupted("truncated block header"))?;
        let len = be_u24(stream, pos + 1).ok_or_else(|| corrupted("truncated block header"))? as usize;
        if pos + 4 + len > stream.len() {
            return Err(corrupted(format!("block type {} overruns file", header & 0x7F)));
        }
        if header & 0x80 != 0 {
            break (pos, header & 0x7F);
        }
        pos += 4 + len;
    };

    let mut out = stream.to_vec();
    if last_type == BLOCK_PADDING {
        return Ok(out);
    }

    let block_end = last_header + 4 + be_u24(stream, last_header + 1).unwrap_or(0) as usize;
    out[last_header] &= 0x7F;
    let mut padding = vec![0x80 | BLOCK_PADDING];
    padding.extend_from_slice(&RENDER_PADDING.to_be_bytes()[1..]);
    padding.resize(4 + RENDER_PADDING as usize, 0);
    out.splice(block_end..block_end, padding);
    Ok(out)
}

impl TagStore for FlacStore {
    fn kind(&self) -> FormatKind {
        FormatKind::Flac
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for (key, _) in self.comments.items() {
            let key = key.to_uppercase();
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        if !self.comments.pictures().is_empty() {
            keys.push(PICTURE_KEY.to_string());
        }
        keys
    }

    fn get(&self, key: &str) -> Option<Vec<RawValue>> {
        let values: Vec<RawValue> = if key.eq_ignore_ascii_case(PICTURE_KEY) {
            self.comments
                .pictures()
                .iter()
                .map(|(picture, info)| RawValue::Picture(from_lofty(picture, *info)))
                .collect()
        } else {
            self.comments
                .get_all(key)
                .flat_map(split_nulls)
                .map(RawValue::Text)
                .collect()
        };

        (!values.is_empty()).then_some(values)
    }

    fn contains(&self, key: &str) -> bool {
        if key.eq_ignore_ascii_case(PICTURE_KEY) {
            !self.comments.pictures().is_empty()
        } else {
            self.comments.contains(key)
        }
    }

    fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()> {
        let key = key.to_uppercase();

        if key == PICTURE_KEY {
            let pictures = values
                .into_iter()
                .map(|value| match value {
                    RawValue::Picture(picture) => Ok(to_lofty(&picture)),
                    other => Err(TagError::unrecognized(&key, other.kind())),
                })
                .collect::<Result<Vec<_>>>()?;
            self.comments.remove_pictures();
            for (picture, info) in pictures {
                self.comments
                    .insert_picture(picture, Some(info))
                    .map_err(corrupted)?;
            }
            return Ok(());
        }

        if !valid_key(&key) {
            return Err(TagError::unrecognized(&key, "invalid Vorbis comment field name"));
        }
        let texts = values
            .iter()
            .map(|value| value.to_text(&key))
            .collect::<Result<Vec<_>>>()?;

        let mut items: Vec<(String, String)> = self.comments.take_items().collect();
        let insert_at = items
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(&key))
            .unwrap_or(items.len());
        items.retain(|(k, _)| !k.eq_ignore_ascii_case(&key));
        let insert_at = insert_at.min(items.len());
        items.splice(
            insert_at..insert_at,
            texts.into_iter().map(|text| (key.clone(), text)),
        );

        for (k, v) in items {
            self.comments.push(k, v);
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        if key.eq_ignore_ascii_case(PICTURE_KEY) {
            return !self.comments.remove_pictures().is_empty();
        }
        self.comments.remove(key).count() > 0
    }

    fn render(&self, original: &[u8]) -> Result<Vec<u8>> {
        if self.released {
            return Err(corrupted("picture data was released; reopen before rendering"));
        }
        let prefix_len = id3v2_len(original);
        let stream = original
            .get(prefix_len..)
            .ok_or_else(|| corrupted("ID3v2 prefix overruns file"))?;

        let mut cursor = Cursor::new(with_final_padding(stream)?);
        self.comments
            .save_to(&mut cursor, WriteOptions::default())
            .map_err(corrupted)?;

        let mut out = original[..prefix_len].to_vec();
        out.extend_from_slice(&cursor.into_inner());
        Ok(out)
    }

    fn release_picture_data(&mut self) {
        if self.comments.pictures().is_empty() {
            return;
        }
        for (picture, info) in self.comments.remove_pictures() {
            // Inserting with explicit information never fails
            let _ = self.comments.insert_picture(without_data(&picture), Some(info));
        }
        self.released = true;
    }

    fn clone_box(&self) -> Box<dyn TagStore> {
        Box::new(self.clone())
    }
}
