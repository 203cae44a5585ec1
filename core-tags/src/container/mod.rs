//! Binary tag store adapters.
//!
//! ## Overview
//!
//! One adapter per container family gives raw key/value access to the
//! container's tag dictionary:
//!
//! | Format | Adapter | Tag structure | Codec |
//! |--------|---------|---------------|-------|
//! | FLAC   | [`flac::FlacStore`] | Vorbis comment + PICTURE blocks | `lofty::ogg::VorbisComments` |
//! | MP3    | [`id3::Id3Store`]   | ID3v2.2/2.3/2.4 frames | `lofty::id3::v2` frames |
//! | MP4    | [`mp4::Mp4Store`]   | `moov/udta/meta/ilst` atoms | `lofty::mp4::Ilst` |
//! | WMA    | [`asf::AsfStore`]   | ASF content description objects | in-crate |
//!
//! lofty has no ASF support, so the WMA adapter parses and writes the header
//! objects itself. Adapters keep only the tag structures in memory:
//! [`TagStore::render`] writes the tags into a copy of the original file
//! bytes, so one flush writes the whole batch of in-memory mutations at once.

pub mod asf;
pub mod flac;
pub mod id3;
pub mod mp4;

use crate::error::Result;
use crate::tag_map::FormatKind;
use crate::value::RawValue;

/// Raw key/value access into one container's tag dictionary.
pub trait TagStore: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> FormatKind;

    /// Live keys in container order.
    fn keys(&self) -> Vec<String>;

    /// Values stored under `key`, `None` when absent. Values carrying
    /// embedded null separators are already split.
    fn get(&self, key: &str) -> Option<Vec<RawValue>>;

    /// Cheap existence probe that does not clone values.
    fn contains(&self, key: &str) -> bool;

    /// Replace every value stored under `key`.
    fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()>;

    /// Remove `key`, returning whether anything was removed.
    fn delete(&mut self, key: &str) -> bool;

    /// Re-encode the tags into a copy of `original` (the bytes the store was
    /// parsed from, or a fresh read of the same file).
    fn render(&self, original: &[u8]) -> Result<Vec<u8>>;

    /// Drop decoded image bytes held in memory. Presence is kept.
    fn release_picture_data(&mut self);

    fn clone_box(&self) -> Box<dyn TagStore>;
}

impl Clone for Box<dyn TagStore> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Parse the tag store for `kind` from the complete file bytes.
pub fn open_store(kind: FormatKind, data: &[u8]) -> Result<Box<dyn TagStore>> {
    Ok(match kind {
        FormatKind::Flac => Box::new(flac::FlacStore::parse(data)?),
        FormatKind::Mp3 => Box::new(id3::Id3Store::parse(data)?),
        FormatKind::Mp4 => Box::new(mp4::Mp4Store::parse(data)?),
        FormatKind::Wma => Box::new(asf::AsfStore::parse(data)?),
    })
}

/// Bounds-checked big/little endian readers shared by the adapters.
pub(crate) mod bytes_ext {
    pub fn be_u24(data: &[u8], pos: usize) -> Option<u32> {
        data.get(pos..pos + 3)
            .map(|b| u32::from_be_bytes([0, b[0], b[1], b[2]]))
    }

    pub fn le_u16(data: &[u8], pos: usize) -> Option<u16> {
        data.get(pos..pos + 2).map(|b| u16::from_le_bytes([b[0], b[1]]))
    }

    pub fn le_u32(data: &[u8], pos: usize) -> Option<u32> {
        data.get(pos..pos + 4)
            .map(|b| u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    pub fn le_u64(data: &[u8], pos: usize) -> Option<u64> {
        data.get(pos..pos + 8).map(|b| {
            let mut buf = [0u8; 8];
            buf.copy_from_slice(b);
            u64::from_le_bytes(buf)
        })
    }
}

/// Conversions between [`Picture`](crate::value::Picture) and lofty's
/// picture types, shared by the FLAC and ID3 adapters.
pub(crate) mod pictures {
    use bytes::Bytes;
    use lofty::picture::{
        MimeType, Picture as LoftyPicture, PictureInformation, PictureType as LoftyPictureType,
    };

    use crate::image::PictureType;
    use crate::value::Picture;

    pub fn to_lofty(picture: &Picture) -> (LoftyPicture, PictureInformation) {
        let mime_type = (!picture.mime_type.is_empty()).then(|| MimeType::from_str(&picture.mime_type));
        let description = (!picture.description.is_empty()).then(|| picture.description.clone());
        let converted = LoftyPicture::new_unchecked(
            LoftyPictureType::from_u8(picture.picture_type.code()),
            mime_type,
            description,
            picture.data.to_vec(),
        );
        let info = PictureInformation {
            width: picture.width,
            height: picture.height,
            color_depth: picture.depth,
            num_colors: picture.colors,
        };
        (converted, info)
    }

    pub fn from_lofty(picture: &LoftyPicture, info: PictureInformation) -> Picture {
        Picture {
            picture_type: PictureType::from_code(picture.pic_type().as_u8()),
            mime_type: picture.mime_type().map(|m| m.as_str().to_string()).unwrap_or_default(),
            description: picture.description().unwrap_or_default().to_string(),
            data: Bytes::copy_from_slice(picture.data()),
            width: info.width,
            height: info.height,
            depth: info.color_depth,
            colors: info.num_colors,
        }
    }

    /// Same picture without its image bytes.
    pub fn without_data(picture: &LoftyPicture) -> LoftyPicture {
        LoftyPicture::new_unchecked(
            picture.pic_type(),
            picture.mime_type().cloned(),
            picture.description().map(str::to_string),
            Vec::new(),
        )
    }
}
