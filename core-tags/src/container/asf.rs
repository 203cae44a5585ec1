//! ASF (WMA) header attributes.
//!
//! ## Overview
//!
//! Attributes from the Content Description, Extended Content Description and
//! Metadata Library objects are merged into one ordered list. On render they
//! are distributed back:
//! - the five Content Description names go there when they hold a single
//!   string
//! - values larger than 64 KiB go to the Metadata Library (inside the Header
//!   Extension)
//! - everything else goes to the Extended Content Description
//!
//! The header size, header object count and the File Properties file size are
//! patched after the rebuild. The data object is copied verbatim.

use tracing::debug;

use super::bytes_ext::{le_u16, le_u32, le_u64};
use super::TagStore;
use crate::error::{Result, TagError};
use crate::tag_map::FormatKind;
use crate::value::{split_nulls, RawValue};

type Guid = [u8; 16];

const HEADER: Guid = [
    0x30, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const FILE_PROPERTIES: Guid = [
    0xA1, 0xDC, 0xAB, 0x8C, 0x47, 0xA9, 0xCF, 0x11, 0x8E, 0xE4, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const STREAM_PROPERTIES: Guid = [
    0x91, 0x07, 0xDC, 0xB7, 0xB7, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const CONTENT_DESCRIPTION: Guid = [
    0x33, 0x26, 0xB2, 0x75, 0x8E, 0x66, 0xCF, 0x11, 0xA6, 0xD9, 0x00, 0xAA, 0x00, 0x62, 0xCE, 0x6C,
];
const EXTENDED_CONTENT_DESCRIPTION: Guid = [
    0x40, 0xA4, 0xD0, 0xD2, 0x07, 0xE3, 0xD2, 0x11, 0x97, 0xF0, 0x00, 0xA0, 0xC9, 0x5E, 0xA8, 0x50,
];
const HEADER_EXTENSION: Guid = [
    0xB5, 0x03, 0xBF, 0x5F, 0x2E, 0xA9, 0xCF, 0x11, 0x8E, 0xE3, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const HEADER_EXTENSION_RESERVED: Guid = [
    0x11, 0xD2, 0xD3, 0xAB, 0xBA, 0xA9, 0xCF, 0x11, 0x8E, 0xE6, 0x00, 0xC0, 0x0C, 0x20, 0x53, 0x65,
];
const METADATA_LIBRARY: Guid = [
    0x94, 0x1C, 0x23, 0x44, 0x98, 0x94, 0xD1, 0x49, 0xA1, 0x41, 0x1D, 0x13, 0x4E, 0x45, 0x70, 0x54,
];
const AUDIO_MEDIA: Guid = [
    0x40, 0x9E, 0x69, 0xF8, 0x4D, 0x5B, 0xCF, 0x11, 0xA8, 0xFD, 0x00, 0x80, 0x5F, 0x5C, 0x44, 0x2B,
];

const CONTENT_DESCRIPTION_NAMES: [&str; 5] = ["Title", "Author", "Copyright", "Description", "Rating"];
const OBJECT_HEADER_LEN: usize = 24;
const HEADER_OBJECT_LEN: usize = 30;

/// Typed ASF attribute value.
#[derive(Debug, Clone, PartialEq)]
enum AsfValue {
    Unicode(String),
    Bytes(Vec<u8>),
    Bool(bool),
    Dword(u32),
    Qword(u64),
    Word(u16),
    Guid(Guid),
}

impl AsfValue {
    fn type_code(&self) -> u16 {
        match self {
            AsfValue::Unicode(_) => 0,
            AsfValue::Bytes(_) => 1,
            AsfValue::Bool(_) => 2,
            AsfValue::Dword(_) => 3,
            AsfValue::Qword(_) => 4,
            AsfValue::Word(_) => 5,
            AsfValue::Guid(_) => 6,
        }
    }

    fn decode(type_code: u16, data: &[u8], in_library: bool) -> Option<Self> {
        Some(match type_code {
            0 => AsfValue::Unicode(utf16le(data)),
            1 => AsfValue::Bytes(data.to_vec()),
            2 if in_library => AsfValue::Bool(le_u16(data, 0)? != 0),
            2 => AsfValue::Bool(le_u32(data, 0)? != 0),
            3 => AsfValue::Dword(le_u32(data, 0)?),
            4 => AsfValue::Qword(le_u64(data, 0)?),
            5 => AsfValue::Word(le_u16(data, 0)?),
            6 => AsfValue::Guid(data.get(0..16)?.try_into().ok()?),
            _ => return None,
        })
    }

    fn encode(&self, in_library: bool) -> Vec<u8> {
        match self {
            AsfValue::Unicode(text) => encode_utf16z(text),
            AsfValue::Bytes(data) => data.clone(),
            AsfValue::Bool(flag) if in_library => u16::from(*flag).to_le_bytes().to_vec(),
            AsfValue::Bool(flag) => u32::from(*flag).to_le_bytes().to_vec(),
            AsfValue::Dword(v) => v.to_le_bytes().to_vec(),
            AsfValue::Qword(v) => v.to_le_bytes().to_vec(),
            AsfValue::Word(v) => v.to_le_bytes().to_vec(),
            AsfValue::Guid(g) => g.to_vec(),
        }
    }

    fn to_raw(&self) -> Vec<RawValue> {
        match self {
            AsfValue::Unicode(text) => split_nulls(text).into_iter().map(RawValue::Text).collect(),
            AsfValue::Bytes(data) => vec![RawValue::Binary(bytes::Bytes::copy_from_slice(data))],
            AsfValue::Bool(flag) => vec![RawValue::Boolean(*flag)],
            AsfValue::Dword(v) => vec![RawValue::Integer(i64::from(*v))],
            AsfValue::Qword(v) => vec![RawValue::Integer(i64::try_from(*v).unwrap_or(i64::MAX))],
            AsfValue::Word(v) => vec![RawValue::Integer(i64::from(*v))],
            AsfValue::Guid(_) => vec![RawValue::Opaque("ASF GUID attribute".to_string())],
        }
    }
}

fn utf16le(data: &[u8]) -> String {
    let units: Vec<u16> = data
        .chunks_exact(2)
        .map(|p| u16::from_le_bytes([p[0], p[1]]))
        .collect();
    String::from_utf16_lossy(&units)
        .trim_end_matches('\0')
        .to_string()
}

fn encode_utf16z(text: &str) -> Vec<u8> {
    let mut out: Vec<u8> = text.encode_utf16().flat_map(u16::to_le_bytes).collect();
    out.extend_from_slice(&[0, 0]);
    out
}

fn corrupted(message: impl std::fmt::Display) -> TagError {
    TagError::corrupted("ASF", message)
}

#[derive(Debug, Clone, Copy)]
struct Object {
    guid: Guid,
    start: usize,
    end: usize,
}

impl Object {
    fn body<'a>(&self, data: &'a [u8]) -> &'a [u8] {
        &data[self.start + OBJECT_HEADER_LEN..self.end]
    }
}

fn objects(data: &[u8], start: usize, end: usize) -> Result<Vec<Object>> {
    let mut found = Vec::new();
    let mut pos = start;
    while pos + OBJECT_HEADER_LEN <= end {
        let mut guid = [0u8; 16];
        guid.copy_from_slice(&data[pos..pos + 16]);
        let size = le_u64(data, pos + 16).ok_or_else(|| corrupted("truncated object header"))?;
        let size = usize::try_from(size).map_err(|_| corrupted("object too large"))?;
        if size < OBJECT_HEADER_LEN || pos + size > end {
            return Err(corrupted(format!("object at {} has invalid size {}", pos, size)));
        }
        found.push(Object {
            guid,
            start: pos,
            end: pos + size,
        });
        pos += size;
    }
    Ok(found)
}

fn encode_object(guid: &Guid, body: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(body.len() + OBJECT_HEADER_LEN);
    out.extend_from_slice(guid);
    out.extend_from_slice(&((body.len() + OBJECT_HEADER_LEN) as u64).to_le_bytes());
    out.extend_from_slice(body);
    out
}

/// Audio parameters from the File Properties and Stream Properties objects.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct AsfAudioInfo {
    pub duration_secs: f64,
    pub bitrate: u32,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

#[derive(Debug, Clone)]
pub struct AsfStore {
    attributes: Vec<(String, AsfValue)>,
    header_end: usize,
    audio: AsfAudioInfo,
    released: bool,
}

impl AsfStore {
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.get(0..16) != Some(HEADER.as_slice()) {
            return Err(corrupted("missing ASF header object"));
        }
        let header_size = le_u64(data, 16).ok_or_else(|| corrupted("truncated header object"))?;
        let header_end = usize::try_from(header_size)
            .ok()
            .filter(|&end| end >= HEADER_OBJECT_LEN && end <= data.len())
            .ok_or_else(|| corrupted("header size exceeds file length"))?;

        let mut store = AsfStore {
            attributes: Vec::new(),
            header_end,
            audio: AsfAudioInfo::default(),
            released: false,
        };

        for object in objects(data, HEADER_OBJECT_LEN, header_end)? {
            let body = object.body(data);
            match object.guid {
                CONTENT_DESCRIPTION => store.read_content_description(body)?,
                EXTENDED_CONTENT_DESCRIPTION => store.read_extended_content(body)?,
                HEADER_EXTENSION => store.read_header_extension(data, &object)?,
                FILE_PROPERTIES => store.read_file_properties(body),
                STREAM_PROPERTIES => store.read_stream_properties(body),
                _ => {}
            }
        }

        debug!(attributes = store.attributes.len(), "Parsed ASF header");
        Ok(store)
    }

    pub fn audio_info(&self) -> AsfAudioInfo {
        self.audio
    }

    fn read_content_description(&mut self, body: &[u8]) -> Result<()> {
        let mut pos = 10;
        for (i, name) in CONTENT_DESCRIPTION_NAMES.iter().enumerate() {
            let len = le_u16(body, i * 2).ok_or_else(|| corrupted("truncated content description"))? as usize;
            let text = body
                .get(pos..pos + len)
                .ok_or_else(|| corrupted("truncated content description"))?;
            pos += len;
            let text = utf16le(text);
            if !text.is_empty() {
                self.attributes.push((name.to_string(), AsfValue::Unicode(text)));
            }
        }
        Ok(())
    }

    fn read_extended_content(&mut self, body: &[u8]) -> Result<()> {
        let truncated = || corrupted("truncated extended content description");
        let count = le_u16(body, 0).ok_or_else(truncated)?;
        let mut pos = 2;
        for _ in 0..count {
            let name_len = le_u16(body, pos).ok_or_else(truncated)? as usize;
            let name = utf16le(body.get(pos + 2..pos + 2 + name_len).ok_or_else(truncated)?);
            pos += 2 + name_len;
            let type_code = le_u16(body, pos).ok_or_else(truncated)?;
            let value_len = le_u16(body, pos + 2).ok_or_else(truncated)? as usize;
            let value = body.get(pos + 4..pos + 4 + value_len).ok_or_else(truncated)?;
            pos += 4 + value_len;

            match AsfValue::decode(type_code, value, false) {
                Some(value) => self.attributes.push((name, value)),
                None => debug!(attribute = %name, type_code, "Skipping undecodable ASF attribute"),
            }
        }
        Ok(())
    }

    fn read_header_extension(&mut self, data: &[u8], object: &Object) -> Result<()> {
        let start = object.start + OBJECT_HEADER_LEN + 22;
        if start > object.end {
            return Err(corrupted("truncated header extension"));
        }
        for child in objects(data, start, object.end)? {
            if child.guid == METADATA_LIBRARY {
                self.read_metadata_library(child.body(data))?;
            }
        }
        Ok(())
    }

    fn read_metadata_library(&mut self, body: &[u8]) -> Result<()> {
        let truncated = || corrupted("truncated metadata library");
        let count = le_u16(body, 0).ok_or_else(truncated)?;
        let mut pos = 2;
        for _ in 0..count {
            let name_len = le_u16(body, pos + 4).ok_or_else(truncated)? as usize;
            let type_code = le_u16(body, pos + 6).ok_or_else(truncated)?;
            let data_len = le_u32(body, pos + 8).ok_or_else(truncated)? as usize;
            pos += 12;
            let name = utf16le(body.get(pos..pos + name_len).ok_or_else(truncated)?);
            pos += name_len;
            let value = body.get(pos..pos + data_len).ok_or_else(truncated)?;
            pos += data_len;

            if let Some(value) = AsfValue::decode(type_code, value, true) {
                self.attributes.push((name, value));
            }
        }
        Ok(())
    }

    fn read_file_properties(&mut self, body: &[u8]) {
        let play_duration = le_u64(body, 40).unwrap_or(0);
        let preroll_ms = le_u64(body, 56).unwrap_or(0);
        let duration_100ns = play_duration.saturating_sub(preroll_ms * 10_000);
        self.audio.duration_secs = duration_100ns as f64 / 10_000_000.0;
        self.audio.bitrate = le_u32(body, 76).unwrap_or(0);
    }

    fn read_stream_properties(&mut self, body: &[u8]) {
        if body.get(0..16) != Some(AUDIO_MEDIA.as_slice()) {
            return;
        }
        let format = 54;
        self.audio.channels = le_u16(body, format + 2).unwrap_or(0);
        self.audio.sample_rate = le_u32(body, format + 4).unwrap_or(0);
        let avg_bytes = le_u32(body, format + 8).unwrap_or(0);
        self.audio.bits_per_sample = le_u16(body, format + 14).unwrap_or(0);
        if avg_bytes > 0 {
            self.audio.bitrate = avg_bytes * 8;
        }
    }

    /// Distribute attributes over the three description objects.
    fn partition(&self) -> (Vec<(String, String)>, Vec<&(String, AsfValue)>, Vec<&(String, AsfValue)>) {
        let mut content = Vec::new();
        let mut extended = Vec::new();
        let mut library = Vec::new();

        for attribute in &self.attributes {
            let (name, value) = attribute;
            let single = self.attributes.iter().filter(|(n, _)| n == name).count() == 1;
            match value {
                AsfValue::Unicode(text) if single && CONTENT_DESCRIPTION_NAMES.contains(&name.as_str()) => {
                    content.push((name.clone(), text.clone()))
                }
                _ if value.encode(false).len() > usize::from(u16::MAX) => library.push(attribute),
                _ => extended.push(attribute),
            }
        }
        (content, extended, library)
    }

    fn render_content_description(content: &[(String, String)]) -> Result<Vec<u8>> {
        let mut lengths = Vec::new();
        let mut strings = Vec::new();
        for name in CONTENT_DESCRIPTION_NAMES {
            let encoded = content
                .iter()
                .find(|(n, _)| n == name)
                .map(|(_, text)| encode_utf16z(text))
                .unwrap_or_default();
            let len = u16::try_from(encoded.len()).map_err(|_| corrupted("content description too long"))?;
            lengths.extend_from_slice(&len.to_le_bytes());
            strings.extend(encoded);
        }
        Ok(encode_object(&CONTENT_DESCRIPTION, &[lengths, strings].concat()))
    }

    fn render_extended_content(attributes: &[&(String, AsfValue)]) -> Result<Vec<u8>> {
        let count = u16::try_from(attributes.len()).map_err(|_| corrupted("too many attributes"))?;
        let mut body = count.to_le_bytes().to_vec();
        for (name, value) in attributes {
            let name = encode_utf16z(name);
            let data = value.encode(false);
            body.extend_from_slice(&(name.len() as u16).to_le_bytes());
            body.extend(name);
            body.extend_from_slice(&value.type_code().to_le_bytes());
            body.extend_from_slice(&(data.len() as u16).to_le_bytes());
            body.extend(data);
        }
        Ok(encode_object(&EXTENDED_CONTENT_DESCRIPTION, &body))
    }

    fn render_metadata_library(attributes: &[&(String, AsfValue)]) -> Result<Vec<u8>> {
        let count = u16::try_from(attributes.len()).map_err(|_| corrupted("too many attributes"))?;
        let mut body = count.to_le_bytes().to_vec();
        for (name, value) in attributes {
            let name = encode_utf16z(name);
            let data = value.encode(true);
            let data_len = u32::try_from(data.len()).map_err(|_| corrupted("attribute too large"))?;
            body.extend_from_slice(&[0, 0, 0, 0]);
            body.extend_from_slice(&(name.len() as u16).to_le_bytes());
            body.extend_from_slice(&value.type_code().to_le_bytes());
            body.extend_from_slice(&data_len.to_le_bytes());
            body.extend(name);
            body.extend(data);
        }
        Ok(encode_object(&METADATA_LIBRARY, &body))
    }

    /// Header Extension with its Metadata Library replaced. `None` when there
    /// is neither an existing extension nor library content.
    fn render_header_extension(
        original: &[u8],
        existing: Option<&Object>,
        library: Option<Vec<u8>>,
    ) -> Result<Option<Vec<u8>>> {
        let mut children = Vec::new();
        let prefix = match existing {
            Some(object) => {
                let start = object.start + OBJECT_HEADER_LEN + 22;
                for child in objects(original, start, object.end)? {
                    if child.guid != METADATA_LIBRARY {
                        children.extend_from_slice(&original[child.start..child.end]);
                    }
                }
                original[object.start + OBJECT_HEADER_LEN..object.start + OBJECT_HEADER_LEN + 18].to_vec()
            }
            None if library.is_some() => {
                let mut prefix = HEADER_EXTENSION_RESERVED.to_vec();
                prefix.extend_from_slice(&6u16.to_le_bytes());
                prefix
            }
            None => return Ok(None),
        };
        if let Some(library) = library {
            children.extend(library);
        }
        let mut body = prefix;
        body.extend_from_slice(&(children.len() as u32).to_le_bytes());
        body.extend(children);
        Ok(Some(encode_object(&HEADER_EXTENSION, &body)))
    }
}

impl TagStore for AsfStore {
    fn kind(&self) -> FormatKind {
        FormatKind::Wma
    }

    fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = Vec::new();
        for (name, _) in &self.attributes {
            if !keys.contains(name) {
                keys.push(name.clone());
            }
        }
        keys
    }

    fn get(&self, key: &str) -> Option<Vec<RawValue>> {
        let values: Vec<RawValue> = self
            .attributes
            .iter()
            .filter(|(name, _)| name == key)
            .flat_map(|(_, value)| value.to_raw())
            .collect();
        (!values.is_empty()).then_some(values)
    }

    fn contains(&self, key: &str) -> bool {
        self.attributes.iter().any(|(name, _)| name == key)
    }

    fn set(&mut self, key: &str, values: Vec<RawValue>) -> Result<()> {
        let encoded = values
            .into_iter()
            .map(|value| match value {
                RawValue::Boolean(flag) => Ok(AsfValue::Bool(flag)),
                RawValue::Binary(data) => Ok(AsfValue::Bytes(data.to_vec())),
                other => other.to_text(key).map(AsfValue::Unicode),
            })
            .collect::<Result<Vec<_>>>()?;

        let insert_at = self
            .attributes
            .iter()
            .position(|(name, _)| name == key)
            .unwrap_or(self.attributes.len());
        self.attributes.retain(|(name, _)| name != key);
        let insert_at = insert_at.min(self.attributes.len());

        for (offset, value) in encoded.into_iter().enumerate() {
            self.attributes
                .insert(insert_at + offset, (key.to_string(), value));
        }
        Ok(())
    }

    fn delete(&mut self, key: &str) -> bool {
        let before = self.attributes.len();
        self.attributes.retain(|(name, _)| name != key);
        self.attributes.len() != before
    }

    fn render(&self, original: &[u8]) -> Result<Vec<u8>> {
        if self.released {
            return Err(corrupted("picture data was released; reopen before rendering"));
        }
        let header_end = self.header_end.min(original.len());
        let children = objects(original, HEADER_OBJECT_LEN, header_end)?;
        let (content, extended, library) = self.partition();

        let library = if library.is_empty() {
            None
        } else {
            Some(Self::render_metadata_library(&library)?)
        };
        let extension = Self::render_header_extension(
            original,
            children.iter().find(|o| o.guid == HEADER_EXTENSION),
            library,
        )?;

        let mut body = Vec::new();
        let mut count = 0u32;
        let mut file_properties_at = None;
        for child in &children {
            match child.guid {
                CONTENT_DESCRIPTION | EXTENDED_CONTENT_DESCRIPTION | HEADER_EXTENSION => continue,
                FILE_PROPERTIES => file_properties_at = Some(HEADER_OBJECT_LEN + body.len()),
                _ => {}
            }
            body.extend_from_slice(&original[child.start..child.end]);
            count += 1;
        }
        if let Some(extension) = extension {
            body.extend(extension);
            count += 1;
        }
        if !content.is_empty() {
            body.extend(Self::render_content_description(&content)?);
            count += 1;
        }
        if !extended.is_empty() {
            body.extend(Self::render_extended_content(&extended)?);
            count += 1;
        }

        let mut out = Vec::with_capacity(HEADER_OBJECT_LEN + body.len() + original.len() - header_end);
        out.extend_from_slice(&HEADER);
        out.extend_from_slice(&((HEADER_OBJECT_LEN + body.len()) as u64).to_le_bytes());
        out.extend_from_slice(&count.to_le_bytes());
        out.extend_from_slice(&original[HEADER_OBJECT_LEN - 2..HEADER_OBJECT_LEN]);
        out.extend(body);
        out.extend_from_slice(&original[header_end..]);

        if let Some(at) = file_properties_at {
            let size_at = at + OBJECT_HEADER_LEN + 16;
            let file_size = out.len() as u64;
            if let Some(slot) = out.get_mut(size_at..size_at + 8) {
                slot.copy_from_slice(&file_size.to_le_bytes());
            }
        }
        Ok(out)
    }

    fn release_picture_data(&mut self) {
        for (name, value) in &mut self.attributes {
            if name == "WM/Picture" {
                if let AsfValue::Bytes(data) = value {
                    data.clear();
                    self.released = true;
                }
            }
        }
    }

    fn clone_box(&self) -> Box<dyn TagStore> {
        Box::new(self.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    fn file_properties(duration_100ns: u64, preroll_ms: u64) -> Vec<u8> {
        let mut body = vec![0u8; 80];
        body[40..48].copy_from_slice(&duration_100ns.to_le_bytes());
        body[56..64].copy_from_slice(&preroll_ms.to_le_bytes());
        body[76..80].copy_from_slice(&128_000u32.to_le_bytes());
        encode_object(&FILE_PROPERTIES, &body)
    }

    fn stream_properties() -> Vec<u8> {
        let mut body = AUDIO_MEDIA.to_vec();
        body.resize(54, 0);
        let mut wave = vec![0x61, 0x01];
        wave.extend_from_slice(&2u16.to_le_bytes());
        wave.extend_from_slice(&44_100u32.to_le_bytes());
        wave.extend_from_slice(&16_000u32.to_le_bytes());
        wave.extend_from_slice(&[0, 0]);
        wave.extend_from_slice(&16u16.to_le_bytes());
        body.extend(wave);
        encode_object(&STREAM_PROPERTIES, &body)
    }

    fn minimal_asf() -> Vec<u8> {
        let children = [file_properties(31_000_000, 100), stream_properties()].concat();
        let mut out = HEADER.to_vec();
        out.extend_from_slice(&((HEADER_OBJECT_LEN + children.len()) as u64).to_le_bytes());
        out.extend_from_slice(&2u32.to_le_bytes());
        out.extend_from_slice(&[0x01, 0x02]);
        out.extend(children);
        out.extend_from_slice(b"DATAOBJECT");
        out
    }

    #[test]
    fn test_audio_info() {
        let store = AsfStore::parse(&minimal_asf()).unwrap();
        let info = store.audio_info();
        assert!((info.duration_secs - 3.0).abs() < 1e-9);
        assert_eq!(info.sample_rate, 44_100);
        assert_eq!(info.channels, 2);
        assert_eq!(info.bits_per_sample, 16);
        assert_eq!(info.bitrate, 128_000);
    }

    #[test]
    fn test_roundtrip_distributes_objects() {
        let original = minimal_asf();
        let mut store = AsfStore::parse(&original).unwrap();
        store.set("Title", vec![RawValue::text("Song")]).unwrap();
        store
            .set("WM/Genre", vec![RawValue::text("Rock"), RawValue::text("Pop")])
            .unwrap();
        store.set("COMPILATION", vec![RawValue::Boolean(true)]).unwrap();
        store
            .set("WM/Picture", vec![RawValue::Binary(Bytes::from(vec![7u8; 70_000]))])
            .unwrap();

        let rendered = store.render(&original).unwrap();
        assert!(rendered.ends_with(b"DATAOBJECT"));
        assert_eq!(le_u32(&rendered, 24), Some(5));
        let file_size_at = HEADER_OBJECT_LEN + OBJECT_HEADER_LEN + 16;
        assert_eq!(le_u64(&rendered, file_size_at), Some(rendered.len() as u64));

        let reparsed = AsfStore::parse(&rendered).unwrap();
        assert_eq!(reparsed.get("Title"), Some(vec![RawValue::text("Song")]));
        assert_eq!(
            reparsed.get("WM/Genre"),
            Some(vec![RawValue::text("Rock"), RawValue::text("Pop")])
        );
        assert_eq!(reparsed.get("COMPILATION"), Some(vec![RawValue::Boolean(true)]));
        match reparsed.get("WM/Picture").as_deref() {
            Some([RawValue::Binary(data)]) => assert_eq!(data.len(), 70_000),
            other => panic!("unexpected picture: {:?}", other),
        }
        assert_eq!(reparsed.audio_info().sample_rate, 44_100);
    }

    #[test]
    fn test_integer_is_stored_as_text() {
        let mut store = AsfStore::parse(&minimal_asf()).unwrap();
        store.set("WM/BeatsPerMinute", vec![RawValue::Integer(128)]).unwrap();
        assert_eq!(
            store.get("WM/BeatsPerMinute"),
            Some(vec![RawValue::text("128")])
        );
        assert!(store.delete("WM/BeatsPerMinute"));
        assert!(!store.contains("WM/BeatsPerMinute"));
    }

    #[test]
    fn test_rejects_non_asf() {
        assert!(matches!(
            AsfStore::parse(b"RIFF....WAVE"),
            Err(TagError::CorruptedContainer(_))
        ));
    }
}
