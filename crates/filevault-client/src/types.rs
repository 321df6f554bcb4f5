//! Common types for the client SDK

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Processing status of a file on the backend
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    #[default]
    Pending,
    Uploading,
    Processing,
    Completed,
    Failed,
}

/// File metadata as returned by the backend
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FileRecord {
    /// Server-assigned identifier
    pub id: String,
    /// Stored name
    pub name: String,
    /// Name the file was uploaded under
    #[serde(default)]
    pub original_name: String,
    /// Declared content type
    #[serde(default)]
    pub mime_type: String,
    /// Size in bytes
    #[serde(default)]
    pub size: u64,
    /// SHA-256 hex digest of the stored content
    #[serde(default)]
    pub checksum: String,
    /// Processing status
    #[serde(default)]
    pub status: FileStatus,
    /// When the upload was initialized
    #[serde(default)]
    pub upload_started_at: Option<DateTime<Utc>>,
    /// When the upload was completed
    #[serde(default)]
    pub upload_completed_at: Option<DateTime<Utc>>,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// User tags
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Body of the initialize call
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitializeUpload {
    /// File name
    pub name: String,
    /// Declared content type
    pub mime_type: String,
    /// Total size in bytes
    pub size: u64,
}

/// Acknowledgment of a single chunk
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkAck {
    /// Chunk record identifier
    #[serde(default)]
    pub id: String,
    /// Sequence number the backend stored the chunk under
    pub chunk_number: u64,
    /// Bytes received
    pub size: u64,
    /// SHA-256 hex digest computed by the backend
    #[serde(default)]
    pub checksum: String,
    /// Chunk status
    #[serde(default)]
    pub status: String,
}

/// Client-side status of an upload session
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// Initialize succeeded, nothing sent yet
    Initialized,
    /// At least one chunk in flight or acknowledged
    InProgress,
    /// Complete call succeeded
    Completed,
    /// Terminated by an error
    Failed,
}

/// Client-tracked state of one upload
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UploadSession {
    /// Server-assigned upload identifier
    pub upload_id: String,
    /// Number of chunks the file splits into
    pub total_chunks: u64,
    /// Chunks acknowledged so far
    pub chunks_sent: u64,
    /// Session status
    pub status: SessionStatus,
}

impl UploadSession {
    /// A session created by a successful initialize call
    pub fn new(upload_id: impl Into<String>, total_chunks: u64) -> Self {
        Self {
            upload_id: upload_id.into(),
            total_chunks,
            chunks_sent: 0,
            status: SessionStatus::Initialized,
        }
    }

    /// Whether every chunk has been acknowledged
    pub fn all_chunks_sent(&self) -> bool {
        self.chunks_sent == self.total_chunks
    }
}

/// Phase of the upload state machine
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadState {
    Idle,
    Initializing,
    SendingChunks,
    Completing,
    Done,
    Failed,
}

impl UploadState {
    /// Whether the machine may move from `self` to `next`
    pub fn can_transition_to(&self, next: UploadState) -> bool {
        use UploadState::*;
        matches!(
            (self, next),
            (Idle, Initializing)
                | (Initializing, SendingChunks)
                | (SendingChunks, Completing)
                | (Completing, Done)
                | (Initializing | SendingChunks | Completing, Failed)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_record_from_backend_json() {
        let json = r#"{
            "id": "5b8f0c1e-8f43-4b8e-9a57-0d6a1c2f3e4d",
            "name": "report.pdf",
            "original_name": "report.pdf",
            "mime_type": "application/pdf",
            "size": 2500000,
            "formatted_size": "2.4 MB",
            "checksum": "",
            "status": "UPLOADING",
            "upload_started_at": "2024-03-01T10:00:00.123456Z",
            "upload_completed_at": null,
            "is_deleted": false,
            "tags": []
        }"#;

        let record: FileRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.name, "report.pdf");
        assert_eq!(record.size, 2_500_000);
        assert_eq!(record.status, FileStatus::Uploading);
        assert!(record.upload_started_at.is_some());
        assert!(record.upload_completed_at.is_none());
    }

    #[test]
    fn test_chunk_ack_from_backend_json() {
        let json = r#"{"id": "c1", "chunk_number": 2, "size": 402848, "checksum": "ab", "status": "COMPLETED"}"#;
        let ack: ChunkAck = serde_json::from_str(json).unwrap();
        assert_eq!(ack.chunk_number, 2);
        assert_eq!(ack.size, 402_848);
    }

    #[test]
    fn test_state_transitions() {
        use UploadState::*;
        assert!(Idle.can_transition_to(Initializing));
        assert!(SendingChunks.can_transition_to(Completing));
        assert!(Completing.can_transition_to(Failed));
        assert!(!Idle.can_transition_to(SendingChunks));
        assert!(!Initializing.can_transition_to(Completing));
        assert!(!Idle.can_transition_to(Failed));
        assert!(!Done.can_transition_to(Failed));
    }
}
