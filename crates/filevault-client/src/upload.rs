//! Chunked upload orchestration
//!
//! An upload runs `Idle -> Initializing -> SendingChunks -> Completing -> Done`
//! and drops to `Failed` from any of the three network phases. Chunks go out
//! strictly one at a time in sequence order: the next chunk is not even read
//! until the previous one has been acknowledged, so at most one chunk's bytes
//! are held in memory.
//!
//! There is no retry and no resume. A failed chunk aborts the upload with
//! [`ClientError::ChunkUploadFailed`] and the caller decides whether to start
//! over. The backend has no abort endpoint, so a failed or cancelled session
//! is simply left behind on the server.

use crate::{
    ClientError, FileSource, Result, UploadPolicy,
    chunker::{iterate_chunks, ChunkDescriptor},
    error::ValidationError,
    progress::{ProgressObserver, UploadProgress},
    transport::UploadTransport,
    types::{ChunkAck, FileRecord, InitializeUpload, SessionStatus, UploadSession, UploadState},
};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Check a file against the upload policy without touching it
pub fn validate_file(policy: &UploadPolicy, file: &dyn FileSource) -> std::result::Result<(), ValidationError> {
    if !policy.allows_type(file.content_type()) {
        return Err(ValidationError::UnsupportedType(file.content_type().to_string()));
    }
    if file.size() > policy.max_file_size {
        return Err(ValidationError::FileTooLarge {
            size: file.size(),
            max: policy.max_file_size,
        });
    }
    Ok(())
}

/// Check a chunk acknowledgment against what was sent
fn verify_ack(ack: &ChunkAck, chunk: &ChunkDescriptor, verify_checksum: bool) -> Result<()> {
    if ack.chunk_number != chunk.sequence_number {
        return Err(ClientError::InvalidResponse(format!(
            "acknowledged chunk {} instead of {}",
            ack.chunk_number, chunk.sequence_number
        )));
    }
    if ack.size != chunk.len() {
        return Err(ClientError::InvalidResponse(format!(
            "backend received {} bytes, sent {}",
            ack.size,
            chunk.len()
        )));
    }
    if verify_checksum && !ack.checksum.is_empty() {
        let expected = chunk.checksum();
        if !ack.checksum.eq_ignore_ascii_case(&expected) {
            return Err(ClientError::InvalidResponse(format!(
                "checksum mismatch: expected {}, got {}",
                expected, ack.checksum
            )));
        }
    }
    Ok(())
}

/// Drives one upload at a time against an [`UploadTransport`]
pub struct Uploader<T> {
    transport: T,
    policy: UploadPolicy,
    chunk_timeout: Duration,
    cancel: Option<CancellationToken>,
    state: UploadState,
    session: Option<UploadSession>,
}

impl<T: UploadTransport> Uploader<T> {
    /// Create an uploader with the given policy and a 30 second chunk timeout
    pub fn new(transport: T, policy: UploadPolicy) -> Self {
        Self {
            transport,
            policy,
            chunk_timeout: Duration::from_secs(30),
            cancel: None,
            state: UploadState::Idle,
            session: None,
        }
    }

    /// Set the upper bound for one chunk transmission
    pub fn with_chunk_timeout(mut self, timeout: Duration) -> Self {
        self.chunk_timeout = timeout;
        self
    }

    /// Check `token` before initializing and before each chunk
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Current phase of the state machine
    pub fn state(&self) -> UploadState {
        self.state
    }

    /// Session of the current or last upload
    pub fn session(&self) -> Option<&UploadSession> {
        self.session.as_ref()
    }

    /// The upload policy
    pub fn policy(&self) -> &UploadPolicy {
        &self.policy
    }

    /// The underlying transport
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Upload `file` using the policy's chunk size
    pub async fn upload_file(
        &mut self,
        file: &dyn FileSource,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<FileRecord> {
        let chunk_size = self.policy.chunk_size;
        self.upload(file, chunk_size, observer).await
    }

    /// Upload `file` in chunks of `chunk_size` bytes.
    ///
    /// Validation happens before anything is read or sent. After each
    /// acknowledged chunk `observer` receives the new progress; an empty file
    /// reports a single 100%.
    #[instrument(skip(self, file, observer), fields(name = %file.name(), size = file.size()))]
    pub async fn upload(
        &mut self,
        file: &dyn FileSource,
        chunk_size: u64,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<FileRecord> {
        self.state = UploadState::Idle;
        self.session = None;

        validate_file(&self.policy, file)?;
        let mut reader = iterate_chunks(file, chunk_size)?;
        self.check_cancelled()?;

        // Initialize
        self.transition(UploadState::Initializing);
        let request = InitializeUpload {
            name: file.name().to_string(),
            mime_type: file.content_type().to_string(),
            size: file.size(),
        };
        let record = match self.transport.initialize(&request).await {
            Ok(record) if record.id.is_empty() => {
                return Err(self.fail(ClientError::InitializationFailed(Box::new(
                    ClientError::InvalidResponse("initialize returned no upload id".to_string()),
                ))));
            }
            Ok(record) => record,
            Err(e) => return Err(self.fail(ClientError::InitializationFailed(Box::new(e)))),
        };

        let upload_id = record.id;
        let total_chunks = reader.total_chunks();
        let total_bytes = file.size();
        info!(%upload_id, total_chunks, chunk_size, "Upload initialized");
        self.session = Some(UploadSession::new(upload_id.clone(), total_chunks));

        // Send chunks
        self.transition(UploadState::SendingChunks);
        if total_chunks == 0 {
            notify(observer, UploadProgress::new(0, 0, 0, 0));
        }

        let mut bytes_sent = 0u64;
        loop {
            self.check_cancelled()?;
            let chunk = match reader.next_chunk().await {
                Some(Ok(chunk)) => chunk,
                Some(Err(e)) => return Err(self.fail(e)),
                None => break,
            };
            let sequence_number = chunk.sequence_number;
            self.set_status(SessionStatus::InProgress);

            if let Err(e) = self.send_chunk(&upload_id, &chunk).await {
                return Err(self.fail(ClientError::ChunkUploadFailed {
                    sequence_number,
                    source: Box::new(e),
                }));
            }

            bytes_sent += chunk.len();
            let chunks_sent = match self.session.as_mut() {
                Some(session) => {
                    session.chunks_sent += 1;
                    session.chunks_sent
                }
                None => sequence_number + 1,
            };
            debug!(sequence_number, chunks_sent, total_chunks, "Chunk acknowledged");
            notify(
                observer,
                UploadProgress::new(chunks_sent, total_chunks, bytes_sent, total_bytes),
            );
        }

        // Complete
        self.transition(UploadState::Completing);
        let record = match self.transport.complete(&upload_id).await {
            Ok(record) => record,
            Err(e) => return Err(self.fail(ClientError::CompletionFailed(Box::new(e)))),
        };

        self.set_status(SessionStatus::Completed);
        self.transition(UploadState::Done);
        info!(%upload_id, file_id = %record.id, "Upload completed");
        Ok(record)
    }

    async fn send_chunk(&self, upload_id: &str, chunk: &ChunkDescriptor) -> Result<ChunkAck> {
        let ack = tokio::time::timeout(self.chunk_timeout, self.transport.send_chunk(upload_id, chunk))
            .await
            .map_err(|_| ClientError::Timeout(self.chunk_timeout))??;
        verify_ack(&ack, chunk, self.policy.verify_checksums)?;
        Ok(ack)
    }

    fn check_cancelled(&mut self) -> Result<()> {
        match &self.cancel {
            Some(token) if token.is_cancelled() => {
                if self.state == UploadState::Idle {
                    warn!("Upload cancelled before it started");
                    Err(ClientError::Cancelled)
                } else {
                    Err(self.fail(ClientError::Cancelled))
                }
            }
            _ => Ok(()),
        }
    }

    fn transition(&mut self, next: UploadState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid transition {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn set_status(&mut self, status: SessionStatus) {
        if let Some(session) = self.session.as_mut() {
            session.status = status;
        }
    }

    fn fail(&mut self, error: ClientError) -> ClientError {
        warn!(state = ?self.state, error = %error, "Upload failed");
        self.transition(UploadState::Failed);
        self.set_status(SessionStatus::Failed);
        error
    }
}

fn notify(observer: Option<&dyn ProgressObserver>, progress: UploadProgress) {
    if let Some(observer) = observer {
        observer.on_progress(&progress);
    }
}
