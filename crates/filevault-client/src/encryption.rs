//! Client-side file encryption
//!
//! Files are read through the [`ChunkReader`](crate::ChunkReader) so callers
//! get [`CryptoProgress`] while large files load, then sealed in one AES-GCM
//! pass under a fresh key. The ciphertext is `IV ‖ ciphertext ‖ tag`; the key
//! is returned to the caller in base64 and never sent anywhere.

use crate::{
    chunker::iterate_chunks,
    error::ValidationError,
    progress::{CryptoProgress, CryptoProgressCallback, ProgressObserver},
    transport::UploadTransport,
    types::FileRecord,
    upload::{validate_file, Uploader},
    FileSource, MemoryFile, Result,
};
use filevault_crypto::{CipherSuite, EncryptedPayload, SealedBlob};
use tracing::{debug, instrument};

/// Read the whole file, reporting progress after every chunk
async fn read_with_progress(
    file: &dyn FileSource,
    chunk_size: u64,
    progress: Option<CryptoProgressCallback<'_>>,
) -> Result<Vec<u8>> {
    let total = file.size();
    let mut reader = iterate_chunks(file, chunk_size)?;
    let mut data = Vec::with_capacity(total as usize);

    if total == 0 {
        if let Some(cb) = progress {
            cb(CryptoProgress::new(0, 0));
        }
    }
    while let Some(chunk) = reader.next_chunk().await {
        data.extend_from_slice(&chunk?.payload);
        if let Some(cb) = progress {
            cb(CryptoProgress::new(data.len() as u64, total));
        }
    }
    Ok(data)
}

/// Encrypt a file under a freshly generated key
#[instrument(skip(file, progress), fields(name = %file.name(), size = file.size()))]
pub async fn encrypt_file(
    file: &dyn FileSource,
    suite: CipherSuite,
    chunk_size: u64,
    progress: Option<CryptoProgressCallback<'_>>,
) -> Result<SealedBlob> {
    let plaintext = read_with_progress(file, chunk_size, progress).await?;
    let blob = filevault_crypto::seal_with_size(&plaintext, suite.key_size())?;
    debug!(algorithm = suite.algorithm_id(), bytes = blob.payload.len(), "File encrypted");
    Ok(blob)
}

/// Decrypt an encrypted file with its exported key
#[instrument(skip(file, key, progress), fields(name = %file.name(), size = file.size()))]
pub async fn decrypt_file(
    file: &dyn FileSource,
    key: &str,
    chunk_size: u64,
    progress: Option<CryptoProgressCallback<'_>>,
) -> Result<Vec<u8>> {
    let data = read_with_progress(file, chunk_size, progress).await?;
    Ok(filevault_crypto::open(&data, key)?)
}

impl<T: UploadTransport> Uploader<T> {
    /// Encrypt `file` and upload the ciphertext under the file's name and
    /// content type. Returns the file record and the exported key.
    ///
    /// The ciphertext is [`EncryptedPayload::MIN_LEN`] bytes longer than the
    /// file, so the size limit is checked against that length before anything
    /// is read.
    pub async fn upload_encrypted(
        &mut self,
        file: &dyn FileSource,
        suite: CipherSuite,
        crypto_progress: Option<CryptoProgressCallback<'_>>,
        observer: Option<&dyn ProgressObserver>,
    ) -> Result<(FileRecord, String)> {
        validate_file(self.policy(), file)?;
        let overhead = EncryptedPayload::MIN_LEN as u64;
        let max = self.policy().max_file_size;
        if file.size().saturating_add(overhead) > max {
            return Err(ValidationError::FileTooLarge {
                size: file.size(),
                max: max.saturating_sub(overhead),
            }
            .into());
        }
        let chunk_size = self.policy().chunk_size;

        let blob = encrypt_file(file, suite, chunk_size, crypto_progress).await?;
        let encrypted = MemoryFile::new(file.name(), file.content_type(), blob.payload);

        let record = self.upload(&encrypted, chunk_size, observer).await?;
        Ok((record, blob.key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        chunker::ChunkDescriptor,
        types::{ChunkAck, InitializeUpload},
        ClientError, LocalFile, UploadPolicy,
    };
    use async_trait::async_trait;
    use filevault_crypto::{CryptoError, KeySize, IV_SIZE, TAG_SIZE};
    use std::sync::Mutex;

    fn notes(data: &[u8]) -> MemoryFile {
        MemoryFile::new("notes.txt", "text/plain", data.to_vec())
    }

    #[tokio::test]
    async fn test_encrypt_decrypt_file() {
        let plaintext: Vec<u8> = (0..10_000u32).map(|i| (i % 256) as u8).collect();
        let blob = encrypt_file(&notes(&plaintext), CipherSuite::default(), 4096, None)
            .await
            .unwrap();
        assert_eq!(blob.payload.len(), plaintext.len() + IV_SIZE + TAG_SIZE);

        let encrypted = MemoryFile::new("notes.txt", "text/plain", blob.payload.to_bytes());
        let decrypted = decrypt_file(&encrypted, &blob.key, 4096, None).await.unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[tokio::test]
    async fn test_suite_key_size_is_used() {
        let suite = CipherSuite::with_key_size(KeySize::Aes128);
        let blob = encrypt_file(&notes(b"hello"), suite, 1024, None).await.unwrap();
        let key = filevault_crypto::import_key(&blob.key).unwrap();
        assert_eq!(key.size(), KeySize::Aes128);
    }

    #[tokio::test]
    async fn test_progress_reported_per_chunk() {
        let seen = Mutex::new(Vec::new());
        let cb = |p: CryptoProgress| seen.lock().unwrap().push((p.loaded, p.percentage));

        encrypt_file(&notes(&[1u8; 10]), CipherSuite::default(), 4, Some(&cb))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![(4, 40), (8, 80), (10, 100)]);
    }

    #[tokio::test]
    async fn test_empty_file_progress() {
        let seen = Mutex::new(Vec::new());
        let cb = |p: CryptoProgress| seen.lock().unwrap().push(p.percentage);

        let blob = encrypt_file(&notes(b""), CipherSuite::default(), 4, Some(&cb))
            .await
            .unwrap();
        assert_eq!(*seen.lock().unwrap(), vec![100]);
        assert_eq!(blob.payload.len(), IV_SIZE + TAG_SIZE);
    }

    #[tokio::test]
    async fn test_decrypt_with_wrong_key_fails() {
        let blob = encrypt_file(&notes(b"secret"), CipherSuite::default(), 1024, None)
            .await
            .unwrap();
        let other = filevault_crypto::generate_key().unwrap().export();
        let encrypted = MemoryFile::new("notes.txt", "text/plain", blob.payload.to_bytes());

        let err = decrypt_file(&encrypted, &other, 1024, None).await.unwrap_err();
        assert!(matches!(err, ClientError::Encryption(CryptoError::AuthenticationFailed)));
    }

    #[tokio::test]
    async fn test_local_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.pdf");
        tokio::fs::write(&path, b"%PDF-1.7 quarterly numbers").await.unwrap();

        let file = LocalFile::open(&path).await.unwrap();
        let blob = encrypt_file(&file, CipherSuite::default(), 8, None).await.unwrap();

        let enc_path = dir.path().join("report.pdf.enc");
        tokio::fs::write(&enc_path, blob.payload.to_bytes()).await.unwrap();
        let encrypted = LocalFile::open(&enc_path).await.unwrap();
        let decrypted = decrypt_file(&encrypted, &blob.key, 8, None).await.unwrap();
        assert_eq!(decrypted, b"%PDF-1.7 quarterly numbers");
    }

    /// Keeps every chunk it receives
    #[derive(Default)]
    struct CaptureTransport {
        init: Mutex<Option<InitializeUpload>>,
        received: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl UploadTransport for CaptureTransport {
        async fn initialize(&self, request: &InitializeUpload) -> Result<FileRecord> {
            *self.init.lock().unwrap() = Some(request.clone());
            Ok(serde_json::from_value(serde_json::json!({"id": "enc-1", "name": request.name})).unwrap())
        }

        async fn send_chunk(&self, _upload_id: &str, chunk: &ChunkDescriptor) -> Result<ChunkAck> {
            self.received.lock().unwrap().extend_from_slice(&chunk.payload);
            Ok(ChunkAck {
                id: String::new(),
                chunk_number: chunk.sequence_number,
                size: chunk.len(),
                checksum: chunk.checksum(),
                status: "COMPLETED".into(),
            })
        }

        async fn complete(&self, upload_id: &str) -> Result<FileRecord> {
            Ok(serde_json::from_value(serde_json::json!({"id": upload_id, "name": "notes.txt", "status": "COMPLETED"})).unwrap())
        }
    }

    #[tokio::test]
    async fn test_upload_encrypted() {
        let plaintext = b"meeting notes, do not share".repeat(10);
        let policy = UploadPolicy::default().with_chunk_size(64);
        let mut uploader = Uploader::new(CaptureTransport::default(), policy);

        let (record, key) = uploader
            .upload_encrypted(&notes(&plaintext), CipherSuite::default(), None, None)
            .await
            .unwrap();
        assert_eq!(record.id, "enc-1");

        let transport = uploader.transport();
        let init = transport.init.lock().unwrap().clone().unwrap();
        assert_eq!(init.name, "notes.txt");
        assert_eq!(init.mime_type, "text/plain");
        assert_eq!(init.size, (plaintext.len() + IV_SIZE + TAG_SIZE) as u64);

        let received = transport.received.lock().unwrap().clone();
        assert_ne!(&received[IV_SIZE..IV_SIZE + 16], &plaintext[..16]);
        assert_eq!(filevault_crypto::open(&received, &key).unwrap(), plaintext);
    }

    #[tokio::test]
    async fn test_upload_encrypted_validates_before_encrypting() {
        let mut uploader = Uploader::new(CaptureTransport::default(), UploadPolicy::default());
        let exe = MemoryFile::new("setup.exe", "application/x-msdownload", vec![0u8; 8]);
        let called = Mutex::new(false);
        let cb = |_: CryptoProgress| *called.lock().unwrap() = true;

        let err = uploader
            .upload_encrypted(&exe, CipherSuite::default(), Some(&cb), None)
            .await
            .unwrap_err();
        assert!(err.is_validation());
        assert!(!*called.lock().unwrap());
        assert!(uploader.transport().init.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upload_encrypted_accounts_for_ciphertext_overhead() {
        let policy = UploadPolicy::default().with_max_file_size(100).with_chunk_size(10);
        let mut uploader = Uploader::new(CaptureTransport::default(), policy);
        let reads = Mutex::new(0u32);
        let cb = |_: CryptoProgress| *reads.lock().unwrap() += 1;

        let err = uploader
            .upload_encrypted(&notes(&[0u8; 90]), CipherSuite::default(), Some(&cb), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ClientError::Validation(ValidationError::FileTooLarge { size: 90, max: 72 })
        ));
        assert_eq!(*reads.lock().unwrap(), 0);
        assert!(uploader.transport().init.lock().unwrap().is_none());

        let (_, key) = uploader
            .upload_encrypted(&notes(&[0u8; 72]), CipherSuite::default(), Some(&cb), None)
            .await
            .unwrap();
        assert_eq!(*reads.lock().unwrap(), 8);
        assert_eq!(uploader.transport().init.lock().unwrap().as_ref().unwrap().size, 100);
        assert_eq!(filevault_crypto::open(&uploader.transport().received.lock().unwrap(), &key).unwrap(), vec![0u8; 72]);
    }
}
