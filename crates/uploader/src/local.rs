//! Transport that hands envelopes straight to a [`ChunkReceiver`].
//!
//! Runs the whole protocol in-process against a storage directory, the
//! same way a server would apply each request.

use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use chunkup_protocol::ChunkEnvelope;
use chunkup_transfer::{ChunkReceiver, IncomingUpload};

use crate::error::UploadError;
use crate::transport::{ProgressFn, UploadTransport};
use crate::types::UploadResponse;

pub struct LocalTransport {
    receiver: ChunkReceiver,
}

impl LocalTransport {
    pub fn new(storage_root: impl Into<PathBuf>) -> Self {
        Self {
            receiver: ChunkReceiver::new(storage_root),
        }
    }

    pub fn receiver(&self) -> &ChunkReceiver {
        &self.receiver
    }
}

impl UploadTransport for LocalTransport {
    fn send<'a>(
        &'a self,
        envelope: ChunkEnvelope,
        on_progress: ProgressFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send + 'a>> {
        Box::pin(async move {
            let total = envelope.bytes.len() as u64;
            on_progress(0, total);

            let upload = IncomingUpload {
                fields: envelope.text_fields()?,
                file_name: Some(envelope.file_name().to_string()),
                bytes: envelope.bytes,
            };
            let outcome = self.receiver.receive(upload).await?;
            on_progress(total, total);

            Ok(UploadResponse::new(200, serde_json::to_value(&outcome.receipt)?))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chunkup_protocol::{AdditionalFormData, ChunkData, FileData};
    use serde_json::json;
    use tempfile::TempDir;

    fn envelope(name: &str, bytes: &[u8], chunk: Option<ChunkData>) -> ChunkEnvelope {
        ChunkEnvelope {
            bytes: bytes.to_vec(),
            file_data: FileData {
                name: name.into(),
                size: bytes.len() as u64,
                last_modified: 0,
                mime_type: String::new(),
                sha256_checksum: None,
            },
            chunk,
            additional: Some(AdditionalFormData::new("meta", json!({"tag": "x"}))),
        }
    }

    #[tokio::test]
    async fn writes_and_echoes_receipt() {
        let dir = TempDir::new().unwrap();
        let transport = LocalTransport::new(dir.path());

        let resp = transport
            .send(envelope("l.bin", b"local", None), &|_, _| {})
            .await
            .unwrap();

        assert_eq!(std::fs::read(dir.path().join("l.bin")).unwrap(), b"local");
        let receipt = resp.receipt().unwrap();
        assert!(receipt.is_terminal());
        assert_eq!(receipt.fields["meta"], json!({"tag": "x"}));
    }

    #[tokio::test]
    async fn receiver_errors_propagate() {
        let dir = TempDir::new().unwrap();
        let transport = LocalTransport::new(dir.path());
        let err = transport
            .send(envelope("../out.bin", b"x", None), &|_, _| {})
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Transfer(_)));
    }
}
