//! Client side of the chunkup upload protocol.
//!
//! [`UploadOrchestrator`] turns a batch of [`UploadFile`]s into a strictly
//! sequential stream of requests: one file at a time, one chunk at a time.
//! Requests go through an [`UploadTransport`]; [`HttpTransport`] posts
//! multipart forms with `reqwest`, [`LocalTransport`] writes into a
//! directory in-process.
//!
//! # Per file
//!
//! 1. **Describe**: name, size, MIME type, optional SHA-256
//! 2. **Plan**: one range for the whole file, or chunk ranges
//! 3. **Send**: each range with `fileData`, `chunkData` and extra metadata
//! 4. **Report**: aggregated progress, then the final response

pub mod config;
pub mod error;
pub mod http;
pub mod local;
pub mod orchestrator;
pub mod source;
pub mod transport;
pub mod types;

pub use config::{ResponseType, UploaderConfig};
pub use error::UploadError;
pub use http::HttpTransport;
pub use local::LocalTransport;
pub use orchestrator::{UploadHandle, UploadOrchestrator, UploadResult};
pub use source::{DEFAULT_MIME_TYPE, UploadFile, detect_mime_type};
pub use transport::{ProgressFn, UploadTransport};
pub use types::UploadResponse;
