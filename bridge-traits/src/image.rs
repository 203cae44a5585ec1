//! Image Source Abstraction
//!
//! Resolves image links (local paths or remote URLs) into raw image bytes.
//! The tag writer embeds whatever this returns; it never decodes or
//! re-encodes pixels itself.

use bytes::Bytes;

use crate::error::Result;

/// Raw image loaded from an image link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedImage {
    /// MIME type (e.g., "image/jpeg", "image/png")
    pub mime_type: String,
    /// Encoded image bytes exactly as they should be embedded
    pub data: Bytes,
}

impl LoadedImage {
    pub fn new(mime_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: data.into(),
        }
    }

    /// Returns `true` for PNG images.
    pub fn is_png(&self) -> bool {
        self.mime_type.eq_ignore_ascii_case("image/png")
    }

    /// File extension matching the MIME type, without the leading dot.
    pub fn extension(&self) -> &str {
        match self.mime_type.to_ascii_lowercase().as_str() {
            "image/png" => "png",
            "image/gif" => "gif",
            "image/bmp" => "bmp",
            "image/webp" => "webp",
            "image/tiff" => "tiff",
            _ => "jpg",
        }
    }
}

/// Image loader trait
///
/// Implementations decide how a link is fetched (file system, HTTP, cache).
///
/// # Example
///
/// ```ignore
/// use bridge_traits::image::ImageSource;
///
/// async fn load_cover(source: &dyn ImageSource) -> bridge_traits::error::Result<()> {
///     let image = source.load("/music/album/cover.jpg").await?;
///     assert_eq!(image.mime_type, "image/jpeg");
///     Ok(())
/// }
/// ```
#[async_trait::async_trait]
pub trait ImageSource: Send + Sync {
    /// Load the image referenced by `link`.
    async fn load(&self, link: &str) -> Result<LoadedImage>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use mockall::mock;

    mock! {
        pub Source {}
        #[async_trait::async_trait]
        impl ImageSource for Source {
            async fn load(&self, link: &str) -> Result<LoadedImage>;
        }
    }

    #[test]
    fn test_loaded_image_extension() {
        assert_eq!(LoadedImage::new("image/png", vec![1u8]).extension(), "png");
        assert_eq!(LoadedImage::new("image/JPEG", vec![1u8]).extension(), "jpg");
        assert_eq!(
            LoadedImage::new("application/octet-stream", vec![1u8]).extension(),
            "jpg"
        );
        assert!(LoadedImage::new("IMAGE/PNG", vec![1u8]).is_png());
    }

    #[tokio::test]
    async fn test_image_source_mock() {
        let mut mock = MockSource::new();
        mock.expect_load()
            .withf(|link| link == "cover.png")
            .returning(|_| Ok(LoadedImage::new("image/png", vec![0x89, b'P'])));
        mock.expect_load()
            .returning(|link| Err(BridgeError::NotAvailable(link.to_string())));

        let ok = mock.load("cover.png").await.unwrap();
        assert!(ok.is_png());

        let err = mock.load("missing.jpg").await.unwrap_err();
        assert!(err.to_string().contains("missing.jpg"));
    }
}
