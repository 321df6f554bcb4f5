//! Local payloads that can be uploaded
//!
//! A [`FileSource`] knows its name, declared content type and total length up
//! front, and hands out bytes only for the window that is asked for.

use crate::{ClientError, Result};
use async_trait::async_trait;
use bytes::Bytes;
use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncSeekExt};

/// Content type used when nothing better is known
pub const OCTET_STREAM: &str = "application/octet-stream";

/// An unopened binary payload of known length
#[async_trait]
pub trait FileSource: Send + Sync {
    /// File name sent to the backend
    fn name(&self) -> &str;

    /// Declared content type
    fn content_type(&self) -> &str;

    /// Total length in bytes
    fn size(&self) -> u64;

    /// Read bytes `[start, end)`. Implementations must not read outside the window.
    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes>;
}

fn check_range(start: u64, end: u64, size: u64) -> Result<()> {
    if start > end || end > size {
        return Err(ClientError::IoRead(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("range {}..{} outside file of {} bytes", start, end, size),
        )));
    }
    Ok(())
}

/// A file on the local filesystem
#[derive(Clone, Debug)]
pub struct LocalFile {
    path: PathBuf,
    name: String,
    content_type: String,
    size: u64,
}

impl LocalFile {
    /// Stat `path` and guess its content type from the extension
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(ClientError::IoRead(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let content_type = mime_guess::from_path(&path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        Ok(Self {
            path,
            name,
            content_type,
            size: metadata.len(),
        })
    }

    /// Override the guessed content type
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    /// Override the file name sent to the backend
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Path on disk
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl FileSource for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn size(&self) -> u64 {
        self.size
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        check_range(start, end, self.size)?;
        let mut file = tokio::fs::File::open(&self.path).await?;
        file.seek(SeekFrom::Start(start)).await?;

        let mut buf = vec![0u8; (end - start) as usize];
        file.read_exact(&mut buf).await?;
        Ok(Bytes::from(buf))
    }
}

/// An in-memory payload
#[derive(Clone, Debug)]
pub struct MemoryFile {
    name: String,
    content_type: String,
    data: Bytes,
}

impl MemoryFile {
    /// Wrap `data` under the given name and content type
    pub fn new(name: impl Into<String>, content_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            content_type: content_type.into(),
            data: data.into(),
        }
    }

    /// The whole payload
    pub fn data(&self) -> &Bytes {
        &self.data
    }
}

#[async_trait]
impl FileSource for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    fn content_type(&self) -> &str {
        &self.content_type
    }

    fn size(&self) -> u64 {
        self.data.len() as u64
    }

    async fn read_range(&self, start: u64, end: u64) -> Result<Bytes> {
        check_range(start, end, self.size())?;
        Ok(self.data.slice(start as usize..end as usize))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_local_file_reads_window() {
        let mut tmp = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        tmp.write_all(b"0123456789").unwrap();
        tmp.flush().unwrap();

        let file = LocalFile::open(tmp.path()).await.unwrap();
        assert_eq!(file.size(), 10);
        assert_eq!(file.content_type(), "text/plain");
        assert_eq!(&file.read_range(3, 7).await.unwrap()[..], b"3456");
        assert!(file.read_range(8, 8).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_local_file_unknown_extension() {
        let tmp = tempfile::Builder::new().suffix(".zzunknown").tempfile().unwrap();
        let file = LocalFile::open(tmp.path()).await.unwrap();
        assert_eq!(file.content_type(), OCTET_STREAM);

        let file = file.with_content_type("image/png").with_name("photo.png");
        assert_eq!(file.content_type(), "image/png");
        assert_eq!(file.name(), "photo.png");
    }

    #[tokio::test]
    async fn test_local_file_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = LocalFile::open(dir.path().join("nope.bin")).await.unwrap_err();
        assert!(matches!(err, ClientError::IoRead(_)));

        let err = LocalFile::open(dir.path()).await.unwrap_err();
        assert!(matches!(err, ClientError::IoRead(_)));
    }

    #[tokio::test]
    async fn test_out_of_range_reads_fail() {
        let file = MemoryFile::new("a.txt", "text/plain", &b"hello"[..]);
        assert!(matches!(file.read_range(0, 6).await, Err(ClientError::IoRead(_))));
        assert!(matches!(file.read_range(4, 2).await, Err(ClientError::IoRead(_))));
        assert_eq!(&file.read_range(1, 4).await.unwrap()[..], b"ell");
    }
}
