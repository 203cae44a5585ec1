//! iTunes-style metadata in MP4/M4A files.
//!
//! Items live in `moov/udta/meta/ilst` and are held as lofty [`Ilst`]
//! atoms. Keys are the four-character item names with `©` standing for
//! byte `0xA9`; freeform items are keyed `----:<mean>:<name>`. lofty
//! rebuilds `moov` on render and shifts `stco`/`co64` chunk offsets.

use std::borrow::Cow;
use std::io::Cursor;

use bytes::Bytes;
use lofty::config::{ParseOptions, WriteOptions};
use lofty::file::AudioFile;
use lofty::mp4::{Atom, AtomData, AtomIdent, Ilst, Mp4File};
use lofty::picture::{MimeType, Picture as LoftyPicture, PictureType as LoftyPictureType};
use lofty::tag::TagExt;
use tracing::debug;

use super::pictures::without_data;
use super::TagStore;
use crate::error::{Result, TagError};
use crate::tag_map::FormatKind;
use crate::value::{split_nulls, Cover, CoverFormat, RawValue};

/// Data type codes of the `data` atom.
const TYPE_IMPLICIT: u32 = 0;
const TYPE_INTEGER: u32 = 21;

const FREEFORM: &str = "----";
const DEFAULT_MEAN: &str = "com.apple.iTunes";

fn corrupted(message: impl std::fmt::Display) -> TagError {
    TagError::corrupted("MP4", message)
}

fn key_of(ident: &AtomIdent<'_>) -> String {
    match ident {
        AtomIdent::Fourcc(name) => name.iter().map(|&b| char::from(b)).collect(),
        AtomIdent::Freeform { mean, name } => format!("{}:{}:{}", FREEFORM, mean, name),
    }
}

fn ident_of(key: &str) -> Result<AtomIdent<'static>> {
    if let Some(rest) = key.strip_prefix("----:") {
        let (mean, name) = rest.split_once(':').unwrap_or((DEFAULT_MEAN, rest));
        return Ok(AtomIdent::Freeform {
            mean: Cow::Owned(mean.to_string()),
            name: Cow::Owned(name.to_string()),
        });
    }

    let bytes = key
        .chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| TagError::unrecognized(key, "non Latin-1 item name")))
        .collect::<Result<Vec<u8>>>()?;
    let name = <[u8; 4]>::try_from(bytes.as_slice())
        .map_err(|_| TagError::unrecognized(key, "item name must be four characters"))?;
    Ok(AtomIdent::Fourcc(name))
}

#[derive(Debug, Clone)]
pub struct Mp4Store {
    ilst: Ilst,
    released: bool,
}

impl Mp4Store {
    pub fn parse(data: &[u8]) -> Result<Self> {
        let options = ParseOptions::new().read_properties(false);
        let mut file = Mp4File::read_from(&mut Cursor::new(data), options).map_err(corrupted)?;
        let ilst = file.remove_ilst().unwrap_or_default();

        debug!(items = (&ilst).into_iter().count(), "Parsed MP4 ilst");
        Ok(Mp4Store {
            ilst,
            released: false,
        })
    }

    fn atoms<'a>(&'a self, ident: &'a AtomIdent<'static>) -> impl Iterator<Item = &'a Atom<'static>> {
        (&self.ilst).into_iter().filter(move |atom| atom.ident() == ident)
    }

    fn decode(key: &str, data: &AtomData) -> Vec<RawValue> {
        match (key, data) {
            ("trkn" | "disk", AtomData::Unknown { data, .. }) => {
                let half = |at: usize| {
                    data.get(at..at + 2)
                        .map_or(0, |b| u32::from(u16::from_be_bytes([b[0], b[1]])))
                };
                vec![RawValue::Pair(half(2), half(4))]
            }
            (_, AtomData::UTF8(text) | AtomData::UTF16(text)) => {
                split_nulls(text).into_iter().map(RawValue::Text).collect()
            }
            (_, AtomData::SignedInteger(n)) => vec![RawValue::Integer(i64::from(*n))],
            (_, AtomData::UnsignedInteger(n)) => vec![RawValue::Integer(i64::from(*n))],
            (_, AtomData::Bool(flag)) => vec![RawValue::Boolean(*flag)],
            (_, AtomData::Picture(picture)) => vec![RawValue::Cover(Cover {
                format: CoverFormat::from_mime(picture.mime_type().map_or("image/jpeg", |m| m.as_str())),
                data: Bytes::copy_from_slice(picture.data()),
            })],
            ("tmpo", AtomData::Unknown { code: TYPE_IMPLICIT, data })
            | (_, AtomData::Unknown { code: TYPE_INTEGER, data }) => match decode_int(data) {
                Some(value) => vec![RawValue::Integer(value)],
                None => vec![RawValue::Opaque(format!("MP4 integer of {} bytes", data.len()))],
            },
            (_, AtomData::Unknown { code: TYPE_IMPLICIT, data }) => {
                vec![RawValue::Binary(Bytes::copy_from_slice(data))]
            }
            (_, AtomData::Unknown { code, .. }) => vec![RawValue::Opaque(format!("MP4 data type {}", code))],
        }
    }

    fn encode(key: &str, value: &RawValue) -> Result<AtomData> {
        let data = match (key, value) {
            ("trkn" | "disk", RawValue::Pair(number, total)) => {
                let number = u16::try_from(*number).unwrap_or(u16::MAX);
                let total = u16::try_from(*total).unwrap_or(u16::MAX);
                let mut payload = vec![0, 0];
                payload.extend_from_slice(&number.to_be_bytes());
                payload.extend_from_slice(&total.to_be_bytes());
                if key == "trkn" {
                    payload.extend_from_slice(&[0, 0]);
                }
                AtomData::Unknown {
                    code: TYPE_IMPLICIT,
                    data: payload,
                }
            }
            ("trkn" | "disk", other) => return Err(TagError::unrecognized(key, other.kind())),
            // tmpo is a 16-bit integer; lofty would shrink a SignedInteger
            ("tmpo", RawValue::Integer(bpm)) => AtomData::Unknown {
                code: TYPE_INTEGER,
                data: i16::try_from(*bpm).unwrap_or(i16::MAX).to_be_bytes().to_vec(),
            },
            (_, RawValue::Boolean(flag)) => AtomData::Bool(*flag),
            (_, RawValue::Cover(cover)) => AtomData::Picture(LoftyPicture::new_unchecked(
                LoftyPictureType::Other,
                Some(MimeType::from_str(cover.format.mime_type())),
                None,
                cover.data.to_vec(),
            )),
            (_, RawValue::Picture(picture)) => {
                return Self::encode(
                    key,
                    &RawValue::Cover(Cover {
                        format: CoverFormat::from_mime(&picture.mime_type),
                        data: picture.data.clone(),
                    }),
                )
            }
            (_, RawValue::Integer(number)) if !key.starts_with(FREEFORM) && !key.starts_with('©') => {
                AtomData::SignedInteger(i32::try_from(*number).map_err(|_| TagError::Validation {
                    field: "mp4 integer",
                    message: format!("{} does not fit a 32-bit item", number),
                })?)
            }
            (_, RawValue::Binary(data)) => AtomData::Unknown {
                code: TYPE_IMPLICIT,
                data: data.to_vec(),
            },
            (_, other) => AtomData::UTF8(other.to_text(key)?),
        };
        Ok(data)
    }

    /// Replace every atom with `ident` by `atom`, keeping the position of the
    /// first one. `None` removes them.
    fn replace(&mut self, ident: &AtomIdent<'static>, atom: Option<Atom<'static>>) {
        let mut replacement = atom;
        let mut rebuilt = Ilst::new();
        for existing in std::mem::take(&mut self.ilst) {
            if existing.ident() == ident {
                if let Some(atom) = replacement.take() {
                    rebuilt.insert(atom);
                }
                continue;
            }
            rebuilt.insert(existing);
        }
        if let Some(atom) = replacement {
            rebuilt.insert(atom);
        }
        self.ilst = rebuilt;
    }
}

fn decode_int(payload: &[u8]) -> Option<i64> {
    Some(match payload.len() {
        1 => i64::from(payload[0] as i8),
        2 => i64::from(i16::from_be_bytes([payload[0], payload[1]])),
        4 => i64::from(i32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]])),
        _ => return None,
    })
}

impl TagStore for Mp4Store {
    fn kind(&self) -> FormatKind {
        FormatKind::Mp4
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for atom in &self.ilst {
            let key = key_of(atom.ident());
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        keys
    }

    fn get(&self, key: &str) -> Option<Vec<RawValue>> {
        let ident = ident_of(key).ok()?;
        let values: Vec<RawValue> = self
            .atoms(&ident)
            .flat_map(|atom| atom.data())
            .flat_map(|data| Self::decode(key, data))
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn contains(&self, key: &str) -> bool {
        ident_of(key).is_ok_and(|ident| self.atoms(&ident).next().is_some())
    }

    fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()> {
        let ident = ident_of(key)?;
        let encoded = values
            .iter()
            .map(|value| Self::encode(key, value))
            .collect::<Result<Vec<_>>>()?;

        let atom = Atom::from_collection(ident.clone(), encoded);
        self.replace(&ident, atom);
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        let Ok(ident) = ident_of(key) else {
            return false;
        };
        self.ilst.remove(&ident).count() > 0
    }

    fn render(&self, original: &[u8]) -> Result<Vec<u8>> {
        if self.released {
            return Err(corrupted("picture data was released; reopen before rendering"));
        }
        let mut cursor = Cursor::new(original.to_vec());
        self.ilst
            .save_to(&mut cursor, WriteOptions::default())
            .map_err(corrupted)?;
        Ok(cursor.into_inner())
    }

    fn release_picture_data(&mut self) {
        let Some(pictures) = self.ilst.pictures() else {
            return;
        };
        let stripped: Vec<LoftyPicture> = pictures.map(without_data).collect();
        if stripped.is_empty() {
            return;
        }
        self.ilst.remove_pictures();
        for picture in stripped {
            self.ilst.insert_picture(picture);
        }
        self.released = true;
    }

    fn clone_box(&self) -> Box<dyn TagStore> {
        Box::new(self.clone())
    }
}
