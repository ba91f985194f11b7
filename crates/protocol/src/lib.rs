//! Wire types for the chunkup chunked upload protocol.
//!
//! A file travels as one or more multipart requests. Every request carries
//! the file bytes for one byte range plus text fields:
//!
//! - `fileData`: the [`FileData`] descriptor of the whole file.
//! - `chunkData`: the [`ChunkData`] of the range (chunked uploads only).
//! - any caller-supplied [`AdditionalFormData`] field.
//!
//! Text fields use the JSON-or-string encoding in [`codec`].

pub mod codec;
pub mod envelope;
pub mod types;

pub use codec::{decode_field, deserialize_field, serialize_field};
pub use envelope::{
    ChunkEnvelope, FIELD_CHUNK_DATA, FIELD_FILE, FIELD_FILE_DATA, FIELD_FILE_PATH,
    RESERVED_FIELDS,
};
pub use types::{
    AdditionalFormData, ChunkData, ChunkSequence, FileData, ProgressData, UploadReceipt,
};

/// Errors produced while encoding or decoding protocol fields.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid field {field}: {reason}")]
    InvalidField { field: String, reason: String },

    #[error("field name is reserved by the protocol: {0}")]
    ReservedField(String),
}
