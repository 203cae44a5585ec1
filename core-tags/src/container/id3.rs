//! ID3v2 tags in front of MPEG audio.
//!
//! ## Overview
//!
//! Reads ID3v2.2, v2.3 and v2.4 tags through lofty's frame types and always
//! writes ID3v2.4 with UTF-8 text. Frames are addressed by key:
//!
//! | Frame | Key |
//! |-------|-----|
//! | text frames | frame id (`TIT2`) |
//! | user text | `TXXX:<description>` |
//! | comments | `COMM:<description>:<language>` |
//! | pictures | `APIC:<description>` |
//!
//! Every other frame is carried through and surfaces as
//! [`RawValue::Opaque`]. Compressed frames are kept and written back
//! uncompressed. ID3v2.2 frames are upgraded to their v2.3 ids; a v2.2 frame
//! without an equivalent, or an encrypted frame, has no v2.4 form, so
//! rendering refuses until that key is deleted.

use std::io::Cursor;

use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::id3::v2::{
    AttachedPictureFrame, CommentFrame, ExtendedTextFrame, Frame, FrameFlags, FrameId, Id3v2Tag,
    TextInformationFrame,
};
use lofty::mpeg::MpegFile;
use lofty::tag::TagExt;
use lofty::TextEncoding;
use tracing::{debug, warn};

use super::pictures::{from_lofty, to_lofty, without_data};
use super::TagStore;
use crate::error::{Result, TagError};
use crate::tag_map::FormatKind;
use crate::value::{split_nulls, RawValue};

/// Room for the trailer lookups lofty performs after the tag.
const TRAILER_ROOM: usize = 128;

#[derive(Debug, Clone)]
pub struct Id3Store {
    frames: Vec<Frame<'static>>,
    /// Offset of the first byte after the parsed tag
    tag_end: usize,
    released: bool,
}

fn corrupted(message: impl std::fmt::Display) -> TagError {
    TagError::corrupted("ID3", message)
}

fn syncsafe(bytes: &[u8]) -> usize {
    bytes
        .iter()
        .fold(0usize, |acc, b| (acc << 7) | usize::from(b & 0x7F))
}

fn frame_key(frame: &Frame<'_>) -> String {
    match frame {
        Frame::UserText(f) => format!("TXXX:{}", f.description),
        Frame::Comment(f) => format!(
            "COMM:{}:{}",
            f.description,
            String::from_utf8_lossy(&f.language)
        ),
        Frame::Picture(f) => format!("APIC:{}", f.picture.description().unwrap_or_default()),
        other => other.id_str().to_string(),
    }
}

fn frame_values(frame: &Frame<'_>) -> Vec<RawValue> {
    let texts = |text: &str| -> Vec<RawValue> { split_nulls(text).into_iter().map(RawValue::Text).collect() };
    match frame {
        Frame::Text(f) => texts(&f.value),
        Frame::UserText(f) => texts(&f.content),
        Frame::Comment(f) => texts(&f.content),
        Frame::Timestamp(f) => vec![RawValue::Text(f.timestamp.to_string())],
        Frame::Picture(f) => vec![RawValue::Picture(from_lofty(&f.picture, Default::default()))],
        other => vec![RawValue::Opaque(format!("ID3 frame {}", other.id_str()))],
    }
}

/// Frames that lofty cannot write back as ID3v2.4.
fn unwritable(frame: &Frame<'_>) -> bool {
    matches!(frame.id(), FrameId::Outdated(_)) || frame.flags().encryption.is_some()
}

/// Clear the flags describing the stored encoding: lofty hands content back
/// decompressed and de-unsynchronised.
fn plain_flags(mut frame: Frame<'static>) -> Frame<'static> {
    let flags = frame.flags();
    if flags.encryption.is_none() {
        frame.set_flags(FrameFlags {
            compression: false,
            data_length_indicator: None,
            unsynchronisation: false,
            ..flags
        });
    }
    frame
}

impl Id3Store {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let mut store = Id3Store {
            frames: Vec::new(),
            tag_end: 0,
            released: false,
        };

        if data.len() < 10 || &data[0..3] != b"ID3" {
            return Ok(store);
        }

        let major = data[3];
        let footer = if major == 4 && data[5] & 0x10 != 0 { 10 } else { 0 };
        let tag_end = 10 + syncsafe(&data[6..10]) + footer;
        if tag_end > data.len() {
            return Err(corrupted("tag size exceeds file length"));
        }
        store.tag_end = tag_end;

        if !(2..=4).contains(&major) {
            warn!(version = major, "Unknown ID3v2 version, tag will be replaced on save");
            return Ok(store);
        }

        let mut tag_only = data[..tag_end].to_vec();
        tag_only.resize(tag_end + TRAILER_ROOM, 0);
        let options = ParseOptions::new()
            .read_properties(false)
            .implicit_conversions(false);
        let mut file = MpegFile::read_from(&mut Cursor::new(tag_only), options).map_err(corrupted)?;

        store.frames = file
            .remove_id3v2()
            .unwrap_or_default()
            .into_iter()
            .map(plain_flags)
            .collect();

        debug!(version = major, frames = store.frames.len(), "Parsed ID3v2 tag");
        Ok(store)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.frames.iter().position(|frame| frame_key(frame) == key)
    }
}

fn texts(key: &str, values: &[RawValue]) -> Result<String> {
    let texts = values
        .iter()
        .map(|value| value.to_text(key))
        .collect::<Result<Vec<_>>>()?;
    Ok(texts.join("\0"))
}

fn language(code: Option<&str>) -> [u8; 3] {
    let mut lang = *b"eng";
    if let Some(code) = code {
        lang = [b'X'; 3];
        for (slot, byte) in lang.iter_mut().zip(code.bytes()) {
            *slot = byte;
        }
    }
    lang
}

impl TagStore for Id3Store {
    fn kind(&self) -> FormatKind {
        FormatKind::Mp3
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for frame in &self.frames {
            let key = frame_key(frame);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn get(&self, key: &str) -> Option<Vec<RawValue>> {
        let values: Vec<RawValue> = self
            .frames
            .iter()
            .filter(|frame| frame_key(frame) == key)
            .flat_map(frame_values)
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn contains(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()> {
        let mut parts = key.splitn(3, ':');
        let id = parts.next().unwrap_or_default();
        let description = parts.next().unwrap_or_default().to_string();

        let new_frames: Vec<Frame<'static>> = if values.is_empty() {
            Vec::new()
        } else {
            match id {
                "APIC" => values
                    .into_iter()
                    .map(|value| match value {
                        RawValue::Picture(picture) => {
                            let (picture, _) = to_lofty(&picture.with_description(description.clone()));
                            Ok(Frame::Picture(AttachedPictureFrame::new(TextEncoding::UTF8, picture)))
                        }
                        other => Err(TagError::unrecognized(key, other.kind())),
                    })
                    .collect::<Result<Vec<_>>>()?,
                "TXXX" => vec![Frame::UserText(ExtendedTextFrame::new(
                    TextEncoding::UTF8,
                    description,
                    texts(key, &values)?,
                ))],
                "COMM" => vec![Frame::Comment(CommentFrame::new(
                    TextEncoding::UTF8,
                    language(parts.next()),
                    description,
                    texts(key, &values)?,
                ))],
                _ if id.len() == 4 && id.starts_with('T') => {
                    let frame_id = FrameId::new(id.to_string())
                        .map_err(|_| TagError::unrecognized(key, "invalid ID3 frame id"))?;
                    vec![Frame::Text(TextInformationFrame::new(
                        frame_id,
                        TextEncoding::UTF8,
                        texts(key, &values)?,
                    ))]
                }
                _ => {
                    return Err(TagError::unrecognized(
                        key,
                        "ID3 frame type without a writable form",
                    ))
                }
            }
        };

        let insert_at = self.position(key).unwrap_or(self.frames.len());
        self.frames.retain(|frame| frame_key(frame) != key);
        let insert_at = insert_at.min(self.frames.len());
        self.frames.splice(insert_at..insert_at, new_frames);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        let before = self.frames.len();
        self.frames.retain(|frame| frame_key(frame) != key);
        self.frames.len() != before
    }

    fn render(&self, original: &[u8]) -> Result<Vec<u8>> {
        if self.released {
            return Err(corrupted("picture data was released; reopen before rendering"));
        }
        let audio = original
            .get(self.tag_end..)
            .ok_or_else(|| corrupted("original bytes shorter than parsed tag"))?;

        let blocked: Vec<String> = self
            .frames
            .iter()
            .filter(|frame| unwritable(frame))
            .map(frame_key)
            .collect();
        if !blocked.is_empty() {
            return Err(corrupted(format!(
                "frames {} cannot be written as ID3v2.4; delete them before saving",
                blocked.join(", ")
            )));
        }

        let mut tag = Id3v2Tag::new();
        for frame in &self.frames {
            tag.insert(frame.clone());
        }

        let mut out = Vec::with_capacity(original.len());
        tag.dump_to(&mut out, WriteOptions::default())
            .map_err(corrupted)?;
        out.extend_from_slice(audio);
        Ok(out)
    }

    fn release_picture_data(&mut self) {
        for frame in &mut self.frames {
            if let Frame::Picture(f) = frame {
                f.picture = without_data(&f.picture);
                self.released = true;
            }
        }
    }

    fn clone_box(&self) -> Box<dyn TagStore> {
        Box::new(self.clone())
    }
}
