use chunkup_protocol::ChunkData;

use crate::{CHUNK_SIZE_UNIT, DEFAULT_CHUNK_SIZE, TransferError};

/// A validated chunk size: positive and a multiple of [`CHUNK_SIZE_UNIT`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkSize(u64);

impl ChunkSize {
    pub fn new(bytes: u64) -> Result<Self, TransferError> {
        if bytes == 0 || bytes % CHUNK_SIZE_UNIT != 0 {
            return Err(TransferError::InvalidChunkSize(
                i64::try_from(bytes).unwrap_or(i64::MAX),
            ));
        }
        Ok(Self(bytes))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(DEFAULT_CHUNK_SIZE)
    }
}

impl TryFrom<u64> for ChunkSize {
    type Error = TransferError;

    fn try_from(bytes: u64) -> Result<Self, Self::Error> {
        Self::new(bytes)
    }
}

impl TryFrom<i64> for ChunkSize {
    type Error = TransferError;

    fn try_from(bytes: i64) -> Result<Self, Self::Error> {
        let unsigned = u64::try_from(bytes).map_err(|_| TransferError::InvalidChunkSize(bytes))?;
        Self::new(unsigned)
    }
}

/// Half-open byte range `[start_byte, end_byte)` of a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRange {
    pub start_byte: u64,
    pub end_byte: u64,
}

impl ChunkRange {
    pub fn len(&self) -> u64 {
        self.end_byte - self.start_byte
    }

    pub fn is_empty(&self) -> bool {
        self.start_byte == self.end_byte
    }

    /// Wire metadata for this range at 0-based `index` of `total` ranges.
    ///
    /// Sequence numbers are 32-bit on the wire; larger plans are rejected.
    pub fn chunk_data(&self, index: usize, total: usize) -> Result<ChunkData, TransferError> {
        let total_chunks = u32::try_from(total).map_err(|_| TransferError::TooManyChunks(total))?;
        let sequence = index
            .checked_add(1)
            .and_then(|n| u32::try_from(n).ok())
            .ok_or(TransferError::TooManyChunks(total))?;
        Ok(ChunkData {
            sequence,
            total_chunks,
            start_byte: self.start_byte,
            end_byte: self.end_byte,
        })
    }
}

/// Splits `file_size` bytes into contiguous ranges of at most `chunk_size`.
///
/// An empty file still yields one empty range `[0, 0)` so it goes through
/// the protocol as a single chunk.
pub fn plan_chunks(file_size: u64, chunk_size: ChunkSize) -> Vec<ChunkRange> {
    let size = chunk_size.get();
    let count = file_size.div_ceil(size).max(1);
    (0..count)
        .map(|i| ChunkRange {
            start_byte: (i * size).min(file_size),
            end_byte: file_size.min((i + 1) * size),
        })
        .collect()
}
