use thiserror::Error;

#[derive(Error, Debug)]
pub enum TagError {
    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Invalid value for {field}: {message}")]
    Validation { field: &'static str, message: String },

    #[error("Unrecognized raw tag type for '{tag_id}': {kind}")]
    UnrecognizedRawType { tag_id: String, kind: String },

    #[error("Corrupted container: {0}")]
    CorruptedContainer(String),

    #[error("Image processing failed: {0}")]
    ImageError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Runtime error: {0}")]
    Runtime(#[from] core_runtime::Error),

    #[error("Bridge error: {0}")]
    Bridge(#[from] bridge_traits::error::BridgeError),
}

impl TagError {
    pub(crate) fn corrupted(format: &str, message: impl std::fmt::Display) -> Self {
        TagError::CorruptedContainer(format!("{}: {}", format, message))
    }

    pub(crate) fn unrecognized(tag_id: impl Into<String>, kind: impl Into<String>) -> Self {
        TagError::UnrecognizedRawType {
            tag_id: tag_id.into(),
            kind: kind.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, TagError>;
