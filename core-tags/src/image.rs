//! Embedded image support.
//!
//! ## Overview
//!
//! - [`PictureType`]: the ID3/FLAC picture classification and the
//!   human-readable labels used as `image_links` keys (`"cover front"`).
//! - [`pack_wm_picture`]/[`unpack_wm_picture`]: the flat `WM/Picture` byte
//!   layout used by ASF containers.
//! - [`FileImageSource`]: default [`ImageSource`] reading local files.
//! - [`PreparedImage`]: an image resolved from a link and ready to embed.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::{ImageSource, LoadedImage};
use bytes::Bytes;
use image::GenericImageView;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Result, TagError};

/// Picture classification shared by ID3 APIC, FLAC PICTURE and WM/Picture.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PictureType {
    Other,
    FileIcon,
    OtherFileIcon,
    CoverFront,
    CoverBack,
    LeafletPage,
    Media,
    LeadArtist,
    Artist,
    Conductor,
    Band,
    Composer,
    Lyricist,
    RecordingLocation,
    DuringRecording,
    DuringPerformance,
    ScreenCapture,
    BrightColoredFish,
    Illustration,
    BandLogotype,
    PublisherLogotype,
}

impl PictureType {
    const ALL: [PictureType; 21] = [
        PictureType::Other,
        PictureType::FileIcon,
        PictureType::OtherFileIcon,
        PictureType::CoverFront,
        PictureType::CoverBack,
        PictureType::LeafletPage,
        PictureType::Media,
        PictureType::LeadArtist,
        PictureType::Artist,
        PictureType::Conductor,
        PictureType::Band,
        PictureType::Composer,
        PictureType::Lyricist,
        PictureType::RecordingLocation,
        PictureType::DuringRecording,
        PictureType::DuringPerformance,
        PictureType::ScreenCapture,
        PictureType::BrightColoredFish,
        PictureType::Illustration,
        PictureType::BandLogotype,
        PictureType::PublisherLogotype,
    ];

    /// Unknown codes map to [`PictureType::Other`].
    pub fn from_code(code: u8) -> Self {
        Self::ALL
            .get(code as usize)
            .copied()
            .unwrap_or(PictureType::Other)
    }

    pub fn code(&self) -> u8 {
        *self as u8
    }

    pub fn label(&self) -> &'static str {
        match self {
            PictureType::Other => "other",
            PictureType::FileIcon => "file icon",
            PictureType::OtherFileIcon => "other file icon",
            PictureType::CoverFront => "cover front",
            PictureType::CoverBack => "cover back",
            PictureType::LeafletPage => "leaflet page",
            PictureType::Media => "media",
            PictureType::LeadArtist => "lead artist",
            PictureType::Artist => "artist",
            PictureType::Conductor => "conductor",
            PictureType::Band => "band",
            PictureType::Composer => "composer",
            PictureType::Lyricist => "lyricist",
            PictureType::RecordingLocation => "recording location",
            PictureType::DuringRecording => "during recording",
            PictureType::DuringPerformance => "during performance",
            PictureType::ScreenCapture => "screen capture",
            PictureType::BrightColoredFish => "bright colored fish",
            PictureType::Illustration => "illustration",
            PictureType::BandLogotype => "band logotype",
            PictureType::PublisherLogotype => "publisher logotype",
        }
    }

    /// Parse an `image_links` key such as `"cover front"` or `"COVER_FRONT"`.
    pub fn from_label(label: &str) -> Option<Self> {
        let normalized = label.trim().to_lowercase().replace('_', " ");
        Self::ALL.iter().copied().find(|t| t.label() == normalized)
    }
}

/// Image decoded from a container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbeddedImage {
    pub picture_type: PictureType,
    pub mime_type: String,
    pub description: String,
    pub data: Bytes,
}

impl EmbeddedImage {
    /// File extension matching the MIME type, without the leading dot.
    pub fn extension(&self) -> &str {
        match self.mime_type.to_ascii_lowercase().as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            _ => "jpg",
        }
    }
}

/// Image resolved from an `image_links` entry, ready to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedImage {
    pub kind: PictureType,
    pub mime_type: String,
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    pub depth: u32,
}

impl PreparedImage {
    /// Build from a loaded image, probing dimensions when the bytes decode.
    pub fn from_loaded(kind: PictureType, loaded: LoadedImage) -> Self {
        let (width, height, depth) = match image::load_from_memory(&loaded.data) {
            Ok(img) => {
                let (w, h) = img.dimensions();
                (w, h, img.color().bits_per_pixel() as u32)
            }
            Err(e) => {
                debug!("Could not probe image dimensions: {}", e);
                (0, 0, 0)
            }
        };

        Self {
            kind,
            mime_type: loaded.mime_type,
            data: loaded.data,
            width,
            height,
            depth,
        }
    }
}

/// Guess an image MIME type from its leading bytes.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    image::guess_format(data).ok().map(|f| f.to_mime_type())
}

/// Pack an image into the ASF `WM/Picture` layout.
///
/// Layout: type (1 byte), data length (i32 LE), MIME (UTF-16LE, double-null
/// terminated), description (UTF-16LE, double-null terminated), data.
pub fn pack_wm_picture(
    picture_type: PictureType,
    mime_type: &str,
    description: &str,
    data: &[u8],
) -> Result<Vec<u8>> {
    let length = i32::try_from(data.len())
        .map_err(|_| TagError::ImageError("Image too large for WM/Picture".to_string()))?;

    let mut out = Vec::with_capacity(data.len() + 64);
    out.push(picture_type.code());
    out.extend_from_slice(&length.to_le_bytes());
    for unit in mime_type.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    for unit in description.encode_utf16() {
        out.extend_from_slice(&unit.to_le_bytes());
    }
    out.extend_from_slice(&[0, 0]);
    out.extend_from_slice(data);
    Ok(out)
}

/// Decode a `WM/Picture` value.
///
/// Values holding bare image bytes (written by some taggers) are accepted
/// as-is with their sniffed MIME type.
pub fn unpack_wm_picture(value: &[u8]) -> Result<EmbeddedImage> {
    if let Some(mime) = sniff_mime(value) {
        return Ok(EmbeddedImage {
            picture_type: PictureType::Other,
            mime_type: mime.to_string(),
            description: String::new(),
            data: Bytes::copy_from_slice(value),
        });
    }

    let malformed = || TagError::corrupted("WM/Picture", "truncated picture value");
    if value.len() < 5 {
        return Err(malformed());
    }

    let picture_type = PictureType::from_code(value[0]);
    let size = i32::from_le_bytes([value[1], value[2], value[3], value[4]]);
    let size = usize::try_from(size).map_err(|_| malformed())?;

    let (mime_type, pos) = read_utf16z(value, 5).ok_or_else(malformed)?;
    let (description, pos) = read_utf16z(value, pos).ok_or_else(malformed)?;

    let end = pos.checked_add(size).ok_or_else(malformed)?;
    let data = value.get(pos..end).ok_or_else(malformed)?;

    Ok(EmbeddedImage {
        picture_type,
        mime_type,
        description,
        data: Bytes::copy_from_slice(data),
    })
}

/// Read a double-null terminated UTF-16LE string starting at `pos`.
fn read_utf16z(data: &[u8], mut pos: usize) -> Option<(String, usize)> {
    let mut units = Vec::new();
    loop {
        let pair = data.get(pos..pos + 2)?;
        pos += 2;
        if pair == [0, 0] {
            break;
        }
        units.push(u16::from_le_bytes([pair[0], pair[1]]));
    }
    Some((String::from_utf16_lossy(&units), pos))
}

/// Image source reading links as local file paths.
#[derive(Debug, Clone, Default)]
pub struct FileImageSource;

#[async_trait]
impl ImageSource for FileImageSource {
    async fn load(&self, link: &str) -> BridgeResult<LoadedImage> {
        if link.starts_with("http://") || link.starts_with("https://") {
            return Err(BridgeError::NotAvailable(format!(
                "Remote image link needs a network-capable ImageSource: {}",
                link
            )));
        }

        let data = tokio::fs::read(link).await?;
        let mime = sniff_mime(&data).ok_or_else(|| {
            BridgeError::OperationFailed(format!("Unrecognized image format: {}", link))
        })?;

        Ok(LoadedImage::new(mime, data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, ImageFormat, RgbImage};
    use std::io::Cursor;

    fn png_bytes() -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 3, image::Rgb([255, 0, 0])));
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), ImageFormat::Png)
            .unwrap();
        buffer
    }

    #[test]
    fn test_picture_type_codes_and_labels() {
        assert_eq!(PictureType::CoverFront.code(), 3);
        assert_eq!(PictureType::from_code(4), PictureType::CoverBack);
        assert_eq!(PictureType::from_code(200), PictureType::Other);
        assert_eq!(PictureType::from_label("Cover Front"), Some(PictureType::CoverFront));
        assert_eq!(PictureType::from_label("band_logotype"), Some(PictureType::BandLogotype));
        assert_eq!(PictureType::from_label("poster"), None);
    }

    #[test]
    fn test_wm_picture_layout() {
        let packed = pack_wm_picture(PictureType::CoverFront, "image/jpeg", "", b"JPEGDATA").unwrap();
        assert_eq!(packed[0], 3);
        assert_eq!(&packed[1..5], &8i32.to_le_bytes());
        // "image/jpeg" is 10 UTF-16 units followed by a double null
        assert_eq!(&packed[25..27], &[0, 0]);
        assert_eq!(&packed[packed.len() - 8..], b"JPEGDATA");

        let unpacked = unpack_wm_picture(&packed).unwrap();
        assert_eq!(unpacked.picture_type, PictureType::CoverFront);
        assert_eq!(unpacked.mime_type, "image/jpeg");
        assert_eq!(unpacked.description, "");
        assert_eq!(unpacked.data.as_ref(), b"JPEGDATA");
    }

    #[test]
    fn test_unpack_raw_image_bytes() {
        let png = png_bytes();
        let image = unpack_wm_picture(&png).unwrap();
        assert_eq!(image.mime_type, "image/png");
        assert_eq!(image.data.len(), png.len());
    }

    #[test]
    fn test_unpack_truncated_value() {
        assert!(unpack_wm_picture(&[3, 10, 0]).is_err());
        let mut packed = pack_wm_picture(PictureType::Media, "image/png", "x", b"abcd").unwrap();
        packed.truncate(packed.len() - 2);
        assert!(unpack_wm_picture(&packed).is_err());
    }

    #[test]
    fn test_prepared_image_probes_dimensions() {
        let prepared = PreparedImage::from_loaded(
            PictureType::CoverFront,
            LoadedImage::new("image/png", png_bytes()),
        );
        assert_eq!((prepared.width, prepared.height), (4, 3));
        assert_eq!(prepared.depth, 24);

        let opaque = PreparedImage::from_loaded(
            PictureType::Media,
            LoadedImage::new("image/jpeg", vec![1u8, 2, 3]),
        );
        assert_eq!((opaque.width, opaque.height), (0, 0));
    }

    #[tokio::test]
    async fn test_file_image_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cover.png");
        std::fs::write(&path, png_bytes()).unwrap();

        let loaded = FileImageSource.load(path.to_str().unwrap()).await.unwrap();
        assert!(loaded.is_png());

        let remote = FileImageSource.load("https://example.com/a.jpg").await;
        assert!(matches!(remote, Err(BridgeError::NotAvailable(_))));

        let missing = FileImageSource
            .load(dir.path().join("missing.jpg").to_str().unwrap())
            .await;
        assert!(matches!(missing, Err(BridgeError::Io(_))));
    }
}
