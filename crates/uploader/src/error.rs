//! Upload error types.

/// Errors produced while configuring or running an upload.
#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("invalid upload request: {0}")]
    Validation(String),

    /// Non-2xx response, or a network failure when `status` is 0.
    #[error("upload failed with status {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transfer error: {0}")]
    Transfer(#[from] chunkup_transfer::TransferError),

    #[error("protocol error: {0}")]
    Protocol(#[from] chunkup_protocol::ProtocolError),

    #[error("cancelled")]
    Cancelled,
}

impl UploadError {
    /// Status code of a failed request, if this error came from one.
    pub fn status(&self) -> Option<u16> {
        match self {
            UploadError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for UploadError {
    fn from(e: reqwest::Error) -> Self {
        UploadError::Http {
            status: e.status().map_or(0, |s| s.as_u16()),
            body: e.to_string(),
        }
    }
}
