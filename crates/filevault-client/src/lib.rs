//! # Filevault Client SDK
//!
//! A client SDK for uploading files to a filevault backend in chunks.
//!
//! ## Features
//!
//! - **Chunked uploads**: initialize, send fixed-size chunks in order, complete
//! - **Bounded memory**: only one chunk is read and held at a time
//! - **Progress**: per-chunk events through a closure or a channel
//! - **Client-side encryption**: optional AES-GCM under a fresh per-file key
//!
//! ## Example
//!
//! ```rust,ignore
//! use filevault_client::{Config, Credentials, HttpTransport, LocalFile, Uploader};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::new("http://localhost:8000/api");
//!     let policy = config.upload.clone();
//!     let transport = HttpTransport::new(config, Credentials::bearer("your-access-token"))?;
//!
//!     let file = LocalFile::open("report.pdf").await?;
//!     let mut uploader = Uploader::new(transport, policy);
//!     let progress = |p: &filevault_client::UploadProgress| println!("{}%", p.percent);
//!
//!     let record = uploader.upload_file(&file, Some(&progress)).await?;
//!     println!("Uploaded {} as {}", record.name, record.id);
//!
//!     Ok(())
//! }
//! ```

mod chunker;
mod config;
mod encryption;
mod error;
mod progress;
mod source;
mod transport;
mod types;
mod upload;

pub use chunker::{iterate_chunks, read_range, total_chunks, ChunkDescriptor, ChunkRanges, ChunkReader};
pub use config::{
    Config, Credentials, EncryptionSettings, UploadPolicy, DEFAULT_ALLOWED_TYPES, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_FILE_SIZE,
};
pub use encryption::{decrypt_file, encrypt_file};
pub use error::{ClientError, Result, ValidationError};
pub use progress::{
    format_speed, format_time, percent_complete, progress_channel, ChannelObserver, CryptoProgress,
    CryptoProgressCallback, ProgressObserver, ProgressTracker, TransferRate, UploadProgress,
};
pub use source::{FileSource, LocalFile, MemoryFile, OCTET_STREAM};
pub use transport::{DownloadedFile, HttpTransport, UploadTransport};
pub use types::*;
pub use upload::{validate_file, Uploader};

// Re-export the crypto types callers need to configure encryption
pub use filevault_crypto::{CipherSuite, KeySize, SealedBlob};
pub use tokio_util::sync::CancellationToken;
