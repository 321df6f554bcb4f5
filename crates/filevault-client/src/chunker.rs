//! Bounded-window reads over a [`FileSource`]
//!
//! Splits a file into fixed-size chunks for upload. Chunks are produced
//! lazily and in order, and only one chunk's bytes are held at a time.

use crate::{ClientError, FileSource, Result};
use bytes::Bytes;
use futures::Stream;
use sha2::{Digest, Sha256};
use std::io;
use std::ops::Range;

/// Number of chunks a file of `size` bytes splits into
pub fn total_chunks(size: u64, chunk_size: u64) -> u64 {
    if chunk_size == 0 {
        return 0;
    }
    size.div_ceil(chunk_size)
}

/// Byte ranges `[start, end)` of consecutive chunks covering `[0, size)`
#[derive(Clone, Debug)]
pub struct ChunkRanges {
    size: u64,
    chunk_size: u64,
    offset: u64,
}

impl ChunkRanges {
    /// Ranges for a file of `size` bytes
    pub fn new(size: u64, chunk_size: u64) -> Result<Self> {
        if chunk_size == 0 {
            return Err(ClientError::InvalidChunkSize(chunk_size));
        }
        Ok(Self {
            size,
            chunk_size,
            offset: 0,
        })
    }
}

impl Iterator for ChunkRanges {
    type Item = Range<u64>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.size {
            return None;
        }
        let start = self.offset;
        let end = start.saturating_add(self.chunk_size).min(self.size);
        self.offset = end;
        Some(start..end)
    }
}

/// One chunk of a file, ready to send
#[derive(Clone, Debug)]
pub struct ChunkDescriptor {
    /// Position of this chunk, starting at 0
    pub sequence_number: u64,
    /// Byte range within the file
    pub byte_range: Range<u64>,
    /// Chunk bytes
    pub payload: Bytes,
}

impl ChunkDescriptor {
    /// Payload length in bytes
    pub fn len(&self) -> u64 {
        self.payload.len() as u64
    }

    /// Whether the payload is empty
    pub fn is_empty(&self) -> bool {
        self.payload.is_empty()
    }

    /// SHA-256 of the payload, hex encoded
    pub fn checksum(&self) -> String {
        hex::encode(Sha256::digest(&self.payload))
    }
}

/// Read exactly `end - start` bytes at `start`
pub async fn read_range(file: &dyn FileSource, start: u64, end: u64) -> Result<Bytes> {
    let bytes = file.read_range(start, end).await?;
    let expected = end.saturating_sub(start);
    if bytes.len() as u64 != expected {
        return Err(ClientError::IoRead(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected {} bytes at offset {}, got {}", expected, start, bytes.len()),
        )));
    }
    Ok(bytes)
}

/// Forward-only reader yielding [`ChunkDescriptor`]s in sequence order
pub struct ChunkReader<'a> {
    file: &'a dyn FileSource,
    ranges: ChunkRanges,
    next_sequence: u64,
    total_chunks: u64,
}

impl<'a> ChunkReader<'a> {
    /// Create a reader over `file`; `chunk_size` must be positive
    pub fn new(file: &'a dyn FileSource, chunk_size: u64) -> Result<Self> {
        let ranges = ChunkRanges::new(file.size(), chunk_size)?;
        Ok(Self {
            file,
            ranges,
            next_sequence: 0,
            total_chunks: total_chunks(file.size(), chunk_size),
        })
    }

    /// Total number of chunks this reader yields
    pub fn total_chunks(&self) -> u64 {
        self.total_chunks
    }

    /// Chunks not yet produced
    pub fn remaining(&self) -> u64 {
        self.total_chunks - self.next_sequence
    }

    /// Read the next chunk. After an error the reader is exhausted.
    pub async fn next_chunk(&mut self) -> Option<Result<ChunkDescriptor>> {
        let range = self.ranges.next()?;
        let sequence_number = self.next_sequence;
        self.next_sequence += 1;

        match read_range(self.file, range.start, range.end).await {
            Ok(payload) => Some(Ok(ChunkDescriptor {
                sequence_number,
                byte_range: range,
                payload,
            })),
            Err(e) => {
                self.ranges.offset = self.ranges.size;
                self.next_sequence = self.total_chunks;
                Some(Err(e))
            }
        }
    }

    /// Turn the reader into a stream of chunks
    pub fn into_stream(self) -> impl Stream<Item = Result<ChunkDescriptor>> + Send + 'a {
        futures::stream::unfold(self, |mut reader| async move {
            reader.next_chunk().await.map(|item| (item, reader))
        })
    }
}

/// Start reading `file` in chunks of `chunk_size` bytes
pub fn iterate_chunks(file: &dyn FileSource, chunk_size: u64) -> Result<ChunkReader<'_>> {
    ChunkReader::new(file, chunk_size)
}
