use std::collections::BTreeMap;

use chunkup_protocol::UploadReceipt;
use serde::Serialize;
use serde_json::Value;

/// Response for one completed file: the answer to its final request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub status: u16,
    /// Body decoded according to the configured response type.
    pub body: Value,
    pub headers: BTreeMap<String, String>,
    /// Position of the file in its batch; only set for multi-file batches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_index: Option<usize>,
}

impl UploadResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self {
            status,
            body,
            headers: BTreeMap::new(),
            file_index: None,
        }
    }

    /// Reads the body as a receipt, if it has that shape.
    pub fn receipt(&self) -> Option<UploadReceipt> {
        UploadReceipt::from_value(&self.body)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}
