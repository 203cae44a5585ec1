//! Failures reported by host adapters.

use thiserror::Error;

/// Error returned by an [`ImageSource`](crate::image::ImageSource) or other
/// host adapter.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The adapter cannot serve this request at all, e.g. a local-only image
    /// source handed an `http://` link.
    #[error("Not supported by this host: {0}")]
    NotAvailable(String),

    /// The request was understood but failed; the message names the link or
    /// path.
    #[error("Host adapter failed: {0}")]
    OperationFailed(String),

    #[error("Host I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, BridgeError>;
