//! Transport seam between the orchestrator and the network.
//!
//! `UploadTransport` is implemented by [`HttpTransport`](crate::HttpTransport)
//! for real uploads and by [`LocalTransport`](crate::LocalTransport) for
//! writing into a directory. Tests mock it.

use std::future::Future;
use std::pin::Pin;

use chunkup_protocol::ChunkEnvelope;

use crate::error::UploadError;
use crate::types::UploadResponse;

/// Byte progress callback for one request: `(bytes_sent, bytes_total)`.
pub type ProgressFn<'a> = &'a (dyn Fn(u64, u64) + Send + Sync);

/// Sends one envelope and waits for the full response.
pub trait UploadTransport: Send + Sync {
    /// Sends `envelope` as a single request.
    ///
    /// `on_progress` is called as the binary part goes out. Non-2xx
    /// responses are returned as [`UploadError::Http`].
    fn send<'a>(
        &'a self,
        envelope: ChunkEnvelope,
        on_progress: ProgressFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send + 'a>>;
}
