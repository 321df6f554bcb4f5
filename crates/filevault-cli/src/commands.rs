//! Subcommand implementations

use crate::ClientSettings;
use anyhow::{Context, Result};
use filevault_client::{
    decrypt_file, encrypt_file, CancellationToken, CryptoProgress, FileRecord, FileSource,
    HttpTransport, LocalFile, ProgressTracker, TransferRate, UploadProgress, Uploader,
};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Instant;
use tracing::{info, warn};

/// Options for `filevault upload`
#[derive(Clone, Debug, Default)]
pub struct UploadOptions {
    /// File to upload
    pub path: PathBuf,
    /// Override the name sent to the backend
    pub name: Option<String>,
    /// Override the guessed content type
    pub content_type: Option<String>,
    /// Encrypt before uploading
    pub encrypt: bool,
    /// Suppress the progress line
    pub quiet: bool,
}

/// Result of an upload
#[derive(Clone, Debug)]
pub struct UploadOutcome {
    /// File record returned by the backend
    pub record: FileRecord,
    /// Exported key when the file was encrypted
    pub key: Option<String>,
}

/// Measures upload throughput from the moment sending starts
#[derive(Debug, Default)]
struct UploadClock {
    started: OnceLock<Instant>,
}

impl UploadClock {
    /// Start the clock; later calls are ignored
    fn start_at(&self, at: Instant) {
        let _ = self.started.set(at);
    }

    /// Rate as of `now`, starting the clock here if nothing started it
    fn rate_at(&self, progress: &UploadProgress, now: Instant) -> TransferRate {
        let started = *self.started.get_or_init(|| now);
        ProgressTracker::start_at(progress.total_bytes, started).update_at(progress.bytes_sent, now)
    }
}

/// Upload a local file, cancelling between chunks when `cancel` fires
pub async fn upload(
    settings: &ClientSettings,
    options: &UploadOptions,
    cancel: CancellationToken,
) -> Result<UploadOutcome> {
    let config = settings.to_config().context("invalid configuration")?;
    let suite = config.encryption.suite()?;
    let policy = config.upload.clone();
    let chunk_timeout = config.chunk_timeout;
    let transport = HttpTransport::new(config, settings.credentials())?;

    let mut file = LocalFile::open(&options.path)
        .await
        .with_context(|| format!("cannot open {}", options.path.display()))?;
    if let Some(name) = &options.name {
        file = file.with_name(name);
    }
    if let Some(content_type) = &options.content_type {
        file = file.with_content_type(content_type);
    }

    // Encryption time must not count towards upload speed
    let clock = UploadClock::default();
    if !options.encrypt {
        clock.start_at(Instant::now());
    }
    let quiet = options.quiet;
    let on_progress = |p: &UploadProgress| {
        if quiet {
            return;
        }
        let rate = clock.rate_at(p, Instant::now());
        eprint!(
            "\rUploading {:>3}%  chunk {}/{}  {}  eta {}   ",
            p.percent,
            p.chunks_sent,
            p.total_chunks,
            rate.formatted_speed(),
            rate.formatted_time()
        );
        if p.is_complete() {
            eprintln!();
        }
    };
    let on_encrypt = |p: CryptoProgress| {
        if p.loaded >= p.total {
            clock.start_at(Instant::now());
        }
        if !quiet {
            eprint!("\rEncrypting {:>3}%   ", p.percentage);
            if p.loaded >= p.total {
                eprintln!();
            }
        }
    };

    let mut uploader = Uploader::new(transport, policy)
        .with_chunk_timeout(chunk_timeout)
        .with_cancellation(cancel);

    let outcome = if options.encrypt {
        let (record, key) = uploader
            .upload_encrypted(&file, suite, Some(&on_encrypt), Some(&on_progress))
            .await?;
        UploadOutcome {
            record,
            key: Some(key),
        }
    } else {
        let record = uploader.upload_file(&file, Some(&on_progress)).await?;
        UploadOutcome { record, key: None }
    };

    info!(file_id = %outcome.record.id, encrypted = options.encrypt, "Upload finished");
    Ok(outcome)
}

/// Encrypt `input` into `output`; returns the exported key
pub async fn encrypt(settings: &ClientSettings, input: &Path, output: &Path) -> Result<String> {
    let suite = settings.suite()?;
    let file = LocalFile::open(input)
        .await
        .with_context(|| format!("cannot open {}", input.display()))?;

    let blob = encrypt_file(&file, suite, settings.chunk_size, None).await?;
    tokio::fs::write(output, blob.payload.to_bytes())
        .await
        .with_context(|| format!("cannot write {}", output.display()))?;

    info!(input = %input.display(), output = %output.display(), "File encrypted");
    Ok(blob.key)
}

/// Decrypt `input` into `output` with an exported key
pub async fn decrypt(settings: &ClientSettings, input: &Path, output: &Path, key: &str) -> Result<()> {
    let file = LocalFile::open(input)
        .await
        .with_context(|| format!("cannot open {}", input.display()))?;

    let plaintext = decrypt_file(&file, key, settings.chunk_size, None)
        .await
        .context("decryption failed: wrong key or corrupted file")?;
    tokio::fs::write(output, plaintext)
        .await
        .with_context(|| format!("cannot write {}", output.display()))?;

    info!(input = %input.display(), output = %output.display(), "File decrypted");
    Ok(())
}

/// Generate a key for the configured suite
pub fn keygen(settings: &ClientSettings) -> Result<String> {
    Ok(settings.suite()?.generate_key()?.export())
}

/// Download a file, decrypting it when `key` is given. Returns the written path.
pub async fn download(
    settings: &ClientSettings,
    file_id: &str,
    output: Option<&Path>,
    key: Option<&str>,
) -> Result<PathBuf> {
    let transport = HttpTransport::new(settings.to_config()?, settings.credentials())?;
    let downloaded = transport.download(file_id).await?;

    let data = match key {
        Some(key) => filevault_crypto::open(&downloaded.data, key)
            .context("decryption failed: wrong key or corrupted file")?,
        None => downloaded.data.to_vec(),
    };

    let path = match output {
        Some(path) if path.is_dir() => path.join(safe_file_name(&downloaded.filename)),
        Some(path) => path.to_path_buf(),
        None => PathBuf::from(safe_file_name(&downloaded.filename)),
    };
    tokio::fs::write(&path, data)
        .await
        .with_context(|| format!("cannot write {}", path.display()))?;

    info!(%file_id, path = %path.display(), "File downloaded");
    Ok(path)
}

/// Last path component of a server-supplied name
fn safe_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    if base.is_empty() || base == "." || base == ".." {
        warn!(%name, "Unusable file name from server");
        "download".to_string()
    } else {
        base.to_string()
    }
}

/// Print a file record as JSON to `out`
pub fn print_record(out: &mut impl Write, outcome: &UploadOutcome) -> Result<()> {
    let mut value = serde_json::to_value(&outcome.record)?;
    if let (Some(key), Some(obj)) = (&outcome.key, value.as_object_mut()) {
        obj.insert("encryption_key".to_string(), serde_json::Value::String(key.clone()));
    }
    writeln!(out, "{}", serde_json::to_string_pretty(&value)?)?;
    Ok(())
}
