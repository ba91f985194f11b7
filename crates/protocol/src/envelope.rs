use crate::ProtocolError;
use crate::codec::serialize_field;
use crate::types::{AdditionalFormData, ChunkData, FileData};

/// Multipart field holding the binary content.
pub const FIELD_FILE: &str = "file";
/// Multipart field holding the serialized [`FileData`].
pub const FIELD_FILE_DATA: &str = "fileData";
/// Multipart field holding the serialized [`ChunkData`].
pub const FIELD_CHUNK_DATA: &str = "chunkData";
/// Response field holding the destination path.
pub const FIELD_FILE_PATH: &str = "filePath";

/// Field names callers may not use for additional metadata.
pub const RESERVED_FIELDS: [&str; 4] =
    [FIELD_FILE, FIELD_FILE_DATA, FIELD_CHUNK_DATA, FIELD_FILE_PATH];

/// Everything sent in one upload request: the bytes of one range plus its
/// metadata. An unchunked upload is an envelope without `chunk`.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkEnvelope {
    pub bytes: Vec<u8>,
    pub file_data: FileData,
    pub chunk: Option<ChunkData>,
    pub additional: Option<AdditionalFormData>,
}

impl ChunkEnvelope {
    /// Builds the text fields in wire order: `fileData`, the additional
    /// field when sendable, then `chunkData`.
    pub fn text_fields(&self) -> Result<Vec<(String, String)>, ProtocolError> {
        let mut fields = Vec::with_capacity(3);
        fields.push((
            FIELD_FILE_DATA.to_string(),
            serde_json::to_string(&self.file_data)?,
        ));

        if let Some(extra) = &self.additional {
            if RESERVED_FIELDS.contains(&extra.field_name.as_str()) {
                return Err(ProtocolError::ReservedField(extra.field_name.clone()));
            }
            if extra.is_sendable() {
                fields.push((extra.field_name.clone(), serialize_field(&extra.data)));
            }
        }

        if let Some(chunk) = &self.chunk {
            fields.push((FIELD_CHUNK_DATA.to_string(), serde_json::to_string(chunk)?));
        }

        Ok(fields)
    }

    /// File name used for the binary part.
    pub fn file_name(&self) -> &str {
        &self.file_data.name
    }

    /// MIME type of the binary part.
    pub fn mime_type(&self) -> &str {
        &self.file_data.mime_type
    }

    pub fn is_chunked(&self) -> bool {
        self.chunk.is_some()
    }
}
