//! Raw tag values exchanged with container adapters.
//!
//! Adapters hand back [`RawValue`]s in their container's native shape. The
//! reader coerces them into semantic types and the writer builds them back
//! from a [`Track`](crate::Track)'s fields.

use bytes::Bytes;

use crate::error::{Result, TagError};
use crate::image::PictureType;

/// Structured embedded picture (FLAC PICTURE block, ID3 APIC frame).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Picture {
    pub picture_type: PictureType,
    pub mime_type: String,
    pub description: String,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
    pub colors: u32,
}

impl Picture {
    pub fn new(picture_type: PictureType, mime_type: impl Into<String>, data: Bytes) -> Self {
        Self {
            picture_type,
            mime_type: mime_type.into(),
            description: String::new(),
            data,
            width: 0,
            height: 0,
            depth: 0,
            colors: 0,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// Image format flag carried by MP4 `covr` data atoms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverFormat {
    Jpeg,
    Png,
    Bmp,
}

impl CoverFormat {
    pub fn from_mime(mime_type: &str) -> Self {
        match mime_type.to_ascii_lowercase().as_str() {
            "image/png" => CoverFormat::Png,
            "image/bmp" => CoverFormat::Bmp,
            _ => CoverFormat::Jpeg,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            CoverFormat::Jpeg => "image/jpeg",
            CoverFormat::Png => "image/png",
            CoverFormat::Bmp => "image/bmp",
        }
    }
}

/// Typed cover blob (MP4 `covr`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cover {
    pub format: CoverFormat,
    pub data: Bytes,
}

/// One raw value as stored by a container.
#[derive(Debug, Clone, PartialEq)]
pub enum RawValue {
    Text(String),
    Integer(i64),
    Boolean(bool),
    /// Number/total pair (MP4 `trkn`/`disk`); 0 means absent
    Pair(u32, u32),
    Binary(Bytes),
    Picture(Picture),
    Cover(Cover),
    /// Value the adapter preserves but cannot interpret
    Opaque(String),
}

impl RawValue {
    pub fn text(value: impl Into<String>) -> Self {
        RawValue::Text(value.into())
    }

    /// Short name of the variant, used in error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            RawValue::Text(_) => "text",
            RawValue::Integer(_) => "integer",
            RawValue::Boolean(_) => "boolean",
            RawValue::Pair(_, _) => "pair",
            RawValue::Binary(_) => "binary",
            RawValue::Picture(_) => "picture",
            RawValue::Cover(_) => "cover",
            RawValue::Opaque(_) => "opaque",
        }
    }

    /// Blank text counts as absent.
    pub fn is_blank(&self) -> bool {
        matches!(self, RawValue::Text(s) if s.trim().is_empty())
    }

    /// Textual form of a scalar value.
    ///
    /// Image payloads and opaque values have no textual form and raise
    /// [`TagError::UnrecognizedRawType`].
    pub fn to_text(&self, tag_id: &str) -> Result<String> {
        match self {
            RawValue::Text(s) => Ok(s.clone()),
            RawValue::Integer(i) => Ok(i.to_string()),
            RawValue::Boolean(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            RawValue::Pair(number, 0) => Ok(number.to_string()),
            RawValue::Pair(number, total) => Ok(format!("{}/{}", number, total)),
            RawValue::Binary(data) => Ok(String::from_utf8_lossy(data).into_owned()),
            RawValue::Picture(_) | RawValue::Cover(_) => {
                Err(TagError::unrecognized(tag_id, format!("{} in text context", self.kind())))
            }
            RawValue::Opaque(kind) => Err(TagError::unrecognized(tag_id, kind.clone())),
        }
    }
}

/// Split text on embedded null separators, dropping empty trailing parts.
pub(crate) fn split_nulls(value: &str) -> Vec<String> {
    let mut parts: Vec<String> = value.split('\0').map(str::to_string).collect();
    while parts.len() > 1 && parts.last().is_some_and(|p| p.is_empty()) {
        parts.pop();
    }
    parts
}
