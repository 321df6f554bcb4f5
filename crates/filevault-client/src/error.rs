//! Client error types

use std::time::Duration;
use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, ClientError>;

/// Upload policy violations, detected before any I/O
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// File exceeds the maximum total size
    #[error("file size {size} bytes exceeds the maximum of {max} bytes")]
    FileTooLarge { size: u64, max: u64 },

    /// Declared content type is not on the allow-list
    #[error("file type '{0}' is not supported")]
    UnsupportedType(String),
}

/// Client errors
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    /// Invalid response
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// File rejected by the upload policy
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// The initialize call failed; no chunk was sent
    #[error("Upload initialization failed: {0}")]
    InitializationFailed(#[source] Box<ClientError>),

    /// A chunk was not acknowledged; later chunks were not attempted
    #[error("Chunk {sequence_number} failed to upload: {source}")]
    ChunkUploadFailed {
        sequence_number: u64,
        #[source]
        source: Box<ClientError>,
    },

    /// All chunks were acknowledged but the complete call failed
    #[error("Upload completion failed: {0}")]
    CompletionFailed(#[source] Box<ClientError>),

    /// Reading the local file failed
    #[error("IO error: {0}")]
    IoRead(#[from] std::io::Error),

    /// Chunk size must be positive
    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(u64),

    /// A transport call did not finish in time
    #[error("Timed out after {0:?}")]
    Timeout(Duration),

    /// The caller cancelled the upload
    #[error("Upload cancelled")]
    Cancelled,

    /// Encryption error
    #[error("Encryption error: {0}")]
    Encryption(#[from] filevault_crypto::CryptoError),
}

impl ClientError {
    /// Build an API error from a response body.
    ///
    /// The backend reports failures as `{"error": ..}` and sometimes adds a
    /// `detail` field; the most specific text available is used.
    pub fn from_api_body(body: &str, status: u16) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(|v| v.as_str())
                .map(|s| s.to_string())
        };

        let message = field("detail")
            .or_else(|| field("error"))
            .or_else(|| {
                let trimmed = body.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            })
            .unwrap_or_else(|| format!("HTTP {}", status));

        Self::Api { status, message }
    }

    /// Sequence number of the failed chunk, if this is a chunk failure
    pub fn failed_chunk(&self) -> Option<u64> {
        match self {
            Self::ChunkUploadFailed { sequence_number, .. } => Some(*sequence_number),
            _ => None,
        }
    }

    /// Check if this error was raised before any network call
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }

    /// Check if the backend rejected the credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api { status: 401 | 403, .. })
    }
}
