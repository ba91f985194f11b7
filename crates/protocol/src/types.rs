use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::envelope::{FIELD_CHUNK_DATA, FIELD_FILE_PATH};

/// Descriptor of a whole file, sent as `fileData` with every request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub name: String,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub last_modified: i64,
    #[serde(rename = "type", default)]
    pub mime_type: String,
    /// SHA-256 hex digest of the whole file, when checksums are enabled.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256_checksum: Option<String>,
}

/// Position of one chunk among all chunks of a file (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkSequence {
    pub sequence: u32,
    pub total_chunks: u32,
}

impl ChunkSequence {
    /// Returns `None` unless `1 <= sequence <= total_chunks`.
    pub fn new(sequence: u32, total_chunks: u32) -> Option<Self> {
        (sequence >= 1 && sequence <= total_chunks).then_some(Self {
            sequence,
            total_chunks,
        })
    }

    pub fn is_first(&self) -> bool {
        self.sequence == 1
    }

    pub fn is_last(&self) -> bool {
        self.sequence == self.total_chunks
    }
}

/// Chunk metadata sent as `chunkData` with every chunked request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkData {
    pub sequence: u32,
    pub total_chunks: u32,
    pub start_byte: u64,
    pub end_byte: u64,
}

impl ChunkData {
    pub fn sequence(&self) -> ChunkSequence {
        ChunkSequence {
            sequence: self.sequence,
            total_chunks: self.total_chunks,
        }
    }

    /// Size of the range in bytes.
    pub fn len(&self) -> u64 {
        self.end_byte.saturating_sub(self.start_byte)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Caller-supplied metadata attached to every request of an upload.
///
/// Only string and object payloads are sent; other JSON values are dropped
/// to match the behavior of the browser client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdditionalFormData {
    pub field_name: String,
    pub data: Value,
}

impl AdditionalFormData {
    pub fn new(field_name: impl Into<String>, data: impl Into<Value>) -> Self {
        Self {
            field_name: field_name.into(),
            data: data.into(),
        }
    }

    /// Returns `true` if this payload is eligible to be sent.
    pub fn is_sendable(&self) -> bool {
        matches!(self.data, Value::String(_) | Value::Object(_))
    }
}

/// Progress event for one logical file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressData {
    /// Overall percentage for the file, 0 to 100.
    pub progress: u8,
    /// Position of the file in its batch; only set for multi-file batches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
}

/// JSON body returned by the receiving side after each write.
///
/// Carries the destination path and every non-file field of the request,
/// decoded from their wire encoding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadReceipt {
    pub file_path: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl UploadReceipt {
    /// Returns the echoed chunk metadata, if the request was chunked.
    pub fn chunk_data(&self) -> Option<ChunkData> {
        self.fields
            .get(FIELD_CHUNK_DATA)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }

    /// A receipt is terminal for its file when the request was not chunked
    /// or when it acknowledged the last chunk.
    pub fn is_terminal(&self) -> bool {
        self.chunk_data().is_none_or(|c| c.sequence().is_last())
    }

    /// Parses a receipt out of a generic JSON body.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.get(FIELD_FILE_PATH)?;
        serde_json::from_value(value.clone()).ok()
    }
}
