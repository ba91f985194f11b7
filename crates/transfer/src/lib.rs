//! Chunked transfer building blocks.
//!
//! - `planner`: splits a file size into contiguous byte ranges.
//! - `checksum`: whole-file SHA-256 digests.
//! - `progress`: folds per-request byte progress into one percentage per file.
//! - `receiver`: server-side reassembly of an ordered chunk stream.

mod checksum;
mod planner;
mod progress;
mod receiver;
mod validation;

pub use checksum::{calculate_file_checksum, checksum_bytes, file_checksum};
pub use planner::{ChunkRange, ChunkSize, plan_chunks};
pub use progress::{ChunkCompletion, ProgressAggregator, local_percent, weighted_percent};
pub use receiver::{ChunkReceiver, IncomingUpload, ReceiveOutcome, WriteStrategy};
pub use validation::validate_upload_path;

/// Chunk sizes must be a multiple of this many bytes.
pub const CHUNK_SIZE_UNIT: u64 = 1024;

/// Default chunk size: 1 MiB.
pub const DEFAULT_CHUNK_SIZE: u64 = CHUNK_SIZE_UNIT * CHUNK_SIZE_UNIT;

/// Errors produced by the transfer crate.
#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid chunk size {0}: must be a positive multiple of 1024 bytes")]
    InvalidChunkSize(i64),

    #[error("too many chunks: {0} exceeds the 32-bit chunk sequence")]
    TooManyChunks(usize),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("protocol error: {0}")]
    Protocol(#[from] chunkup_protocol::ProtocolError),
}
