//! Server-side reassembly of an ordered chunk stream.
//!
//! Each request is written with one of three strategies chosen from its
//! chunk metadata. Chunks of one file must arrive in increasing sequence
//! order with no gaps or duplicates; nothing here reorders or deduplicates.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chunkup_protocol::{
    ChunkData, FIELD_CHUNK_DATA, FIELD_FILE_DATA, FileData, ProtocolError, UploadReceipt,
    decode_field, deserialize_field,
};
use serde_json::Map;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::{TransferError, validate_upload_path};

/// How the bytes of one request are written to the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteStrategy {
    /// No chunk metadata: create or truncate, then write.
    Overwrite,
    /// First chunk: remove any stale file, then append to a fresh one.
    ResetThenAppend,
    /// Later chunk: append to the existing file.
    Append,
}

impl WriteStrategy {
    pub fn for_chunk(chunk: Option<&ChunkData>) -> Self {
        match chunk {
            None => WriteStrategy::Overwrite,
            Some(c) if c.sequence <= 1 => WriteStrategy::ResetThenAppend,
            Some(_) => WriteStrategy::Append,
        }
    }

    async fn apply(self, path: &Path, bytes: &[u8]) -> Result<(), TransferError> {
        match self {
            WriteStrategy::Overwrite => tokio::fs::write(path, bytes).await?,
            WriteStrategy::ResetThenAppend => {
                remove_if_exists(path).await?;
                append(path, bytes).await?;
            }
            WriteStrategy::Append => append(path, bytes).await?,
        }
        Ok(())
    }
}

async fn remove_if_exists(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

async fn append(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .await?;
    file.write_all(bytes).await?;
    file.flush().await
}

/// One parsed upload request as handed over by the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct IncomingUpload {
    /// Text fields in arrival order, still in their wire encoding.
    pub fields: Vec<(String, String)>,
    /// File name from the binary part's headers.
    pub file_name: Option<String>,
    /// Entire binary content of the request.
    pub bytes: Vec<u8>,
}

impl IncomingUpload {
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}

/// What a single write did.
#[derive(Debug, Clone)]
pub struct ReceiveOutcome {
    /// Response body for the client.
    pub receipt: UploadReceipt,
    pub path: PathBuf,
    pub strategy: WriteStrategy,
    pub bytes_written: u64,
    /// The request finished its file: unchunked, or the last chunk.
    pub terminal: bool,
}

/// Writes incoming uploads under a fixed storage root.
#[derive(Debug, Clone)]
pub struct ChunkReceiver {
    storage_root: PathBuf,
}

impl ChunkReceiver {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            storage_root: storage_root.into(),
        }
    }

    pub fn storage_root(&self) -> &Path {
        &self.storage_root
    }

    /// Resolves the destination for `file_name`, rejecting names that
    /// would escape the storage root.
    pub fn destination(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        validate_upload_path(file_name)?;
        Ok(self.storage_root.join(file_name))
    }

    /// Writes one request and builds its receipt.
    pub async fn receive(&self, upload: IncomingUpload) -> Result<ReceiveOutcome, TransferError> {
        let raw_file_data = upload
            .field(FIELD_FILE_DATA)
            .ok_or(TransferError::MissingField(FIELD_FILE_DATA))?;
        let file_data: FileData = decode_field(FIELD_FILE_DATA, raw_file_data)?;

        let chunk = upload
            .field(FIELD_CHUNK_DATA)
            .map(|raw| decode_field::<ChunkData>(FIELD_CHUNK_DATA, raw))
            .transpose()?;
        if let Some(c) = &chunk
            && (c.sequence == 0 || c.sequence > c.total_chunks)
        {
            return Err(ProtocolError::InvalidField {
                field: FIELD_CHUNK_DATA.to_string(),
                reason: format!("sequence {} out of range 1..={}", c.sequence, c.total_chunks),
            }
            .into());
        }

        let name = if file_data.name.is_empty() {
            upload
                .file_name
                .as_deref()
                .ok_or(TransferError::MissingField("file name"))?
        } else {
            file_data.name.as_str()
        };
        let path = self.destination(name)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let strategy = WriteStrategy::for_chunk(chunk.as_ref());
        strategy.apply(&path, &upload.bytes).await?;

        let bytes_written = upload.bytes.len() as u64;
        let terminal = chunk.is_none_or(|c| c.sequence().is_last());
        debug!(
            path = %path.display(),
            ?strategy,
            sequence = chunk.map(|c| c.sequence),
            total_chunks = chunk.map(|c| c.total_chunks),
            bytes = bytes_written,
            terminal,
            "upload written"
        );

        let fields: Map<_, _> = upload
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), deserialize_field(v)))
            .collect();

        Ok(ReceiveOutcome {
            receipt: UploadReceipt {
                file_path: path.display().to_string(),
                fields,
            },
            path,
            strategy,
            bytes_written,
            terminal,
        })
    }
}
