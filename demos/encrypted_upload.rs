//! Encrypted upload example for filevault
//!
//! This example demonstrates:
//! - Encrypting a file locally under a fresh AES-256-GCM key
//! - Uploading the ciphertext in chunks with live progress
//! - Downloading it again and decrypting with the exported key
//!
//! Run with: cargo run --example encrypted_upload -- [path]
//!
//! Set FILEVAULT_API_URL and FILEVAULT_ACCESS_TOKEN to point at a backend.

use bytes::Bytes;
use filevault_client::{
    CipherSuite, Config, Credentials, CryptoProgress, FileSource, HttpTransport, LocalFile,
    MemoryFile, ProgressTracker, UploadProgress, Uploader,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt::init();

    println!("🔐 Filevault - Encrypted Upload Example\n");

    let endpoint =
        std::env::var("FILEVAULT_API_URL").unwrap_or_else(|_| "http://localhost:8000/api".to_string());
    let credentials = match std::env::var("FILEVAULT_ACCESS_TOKEN") {
        Ok(token) => Credentials::bearer(token),
        Err(_) => Credentials::anonymous(),
    };

    let config = Config::new(endpoint).with_upload_policy(
        filevault_client::UploadPolicy::default().with_chunk_size(256 * 1024),
    );
    let policy = config.upload.clone();
    let transport = HttpTransport::new(config, credentials)?;
    let mut uploader = Uploader::new(transport, policy);

    // ==================== Pick a file ====================

    let file: Box<dyn FileSource> = match std::env::args().nth(1) {
        Some(path) => Box::new(LocalFile::open(path).await?),
        None => {
            let text = "Filevault keeps your files private.\n".repeat(30_000);
            Box::new(MemoryFile::new("notes.txt", "text/plain", Bytes::from(text)))
        }
    };
    println!("📄 {} ({} bytes, {})", file.name(), file.size(), file.content_type());

    // ==================== Encrypt and upload ====================

    let tracker = ProgressTracker::start(file.size());
    let on_encrypt = |p: CryptoProgress| print!("\r🔒 Encrypting... {:>3}%", p.percentage);
    let on_upload = move |p: &UploadProgress| {
        let rate = tracker.update(p.bytes_sent);
        print!(
            "\r📤 Uploading... {:>3}% ({}/{} chunks, {}, {} left)   ",
            p.percent,
            p.chunks_sent,
            p.total_chunks,
            rate.formatted_speed(),
            rate.formatted_time()
        );
    };

    let (record, key) = uploader
        .upload_encrypted(file.as_ref(), CipherSuite::default(), Some(&on_encrypt), Some(&on_upload))
        .await?;
    println!("\n   ✅ Uploaded as {} ({:?})", record.id, record.status);
    println!("   🔑 Key (keep it safe, the server never sees it): {}", key);

    // ==================== Download and decrypt ====================

    println!("\n📥 Downloading {}...", record.id);
    let downloaded = uploader.transport().download(&record.id).await?;
    let plaintext = filevault_crypto::open(&downloaded.data, &key)?;
    println!(
        "   ✅ {} decrypted, {} bytes",
        downloaded.filename,
        plaintext.len()
    );

    Ok(())
}
