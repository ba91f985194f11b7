//! Files selected for upload.

use std::io::SeekFrom;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use chunkup_protocol::FileData;
use chunkup_transfer::{ChunkRange, checksum_bytes, file_checksum};
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::{debug, warn};

use crate::error::UploadError;

/// MIME type used when the extension is unknown.
pub const DEFAULT_MIME_TYPE: &str = "application/octet-stream";

/// One file of an upload batch.
#[derive(Debug, Clone)]
pub enum UploadFile {
    /// A regular file on disk, read range by range.
    Path(PathBuf),
    /// An in-memory buffer.
    Memory {
        name: String,
        mime_type: Option<String>,
        last_modified: i64,
        bytes: Arc<[u8]>,
    },
}

impl UploadFile {
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        UploadFile::Path(path.into())
    }

    /// An in-memory file; the MIME type is guessed from `name`.
    pub fn from_bytes(name: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        UploadFile::Memory {
            name: name.into(),
            mime_type: None,
            last_modified: now_millis(),
            bytes: bytes.into(),
        }
    }

    /// Keeps the paths that are regular files, logging every skipped one.
    pub fn collect_paths<I, P>(paths: I) -> Vec<UploadFile>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .filter(|path: &PathBuf| match std::fs::metadata(path) {
                Ok(meta) if meta.is_file() => true,
                Ok(_) => {
                    warn!(path = %path.display(), "skipping non-file entry");
                    false
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "skipping unreadable entry");
                    false
                }
            })
            .map(UploadFile::Path)
            .collect()
    }

    /// Name sent as `fileData.name` and as the part file name.
    pub fn name(&self) -> String {
        match self {
            UploadFile::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            UploadFile::Memory { name, .. } => name.clone(),
        }
    }

    /// Builds the descriptor, hashing the whole file first when
    /// `with_checksum` is set.
    pub async fn describe(&self, with_checksum: bool) -> Result<FileData, UploadError> {
        let name = self.name();
        let data = match self {
            UploadFile::Path(path) => {
                let meta = tokio::fs::metadata(path).await?;
                let last_modified = meta.modified().map(system_time_millis).unwrap_or(0);
                let sha256_checksum = if with_checksum {
                    Some(file_checksum(path.clone()).await?)
                } else {
                    None
                };
                FileData {
                    mime_type: detect_mime_type(&name).to_string(),
                    name,
                    size: meta.len(),
                    last_modified,
                    sha256_checksum,
                }
            }
            UploadFile::Memory {
                mime_type,
                last_modified,
                bytes,
                ..
            } => FileData {
                mime_type: mime_type
                    .clone()
                    .unwrap_or_else(|| detect_mime_type(&name).to_string()),
                name,
                size: bytes.len() as u64,
                last_modified: *last_modified,
                sha256_checksum: with_checksum.then(|| checksum_bytes(bytes)),
            },
        };
        debug!(
            file = %data.name,
            size = data.size,
            checksum = data.sha256_checksum.is_some(),
            "file described"
        );
        Ok(data)
    }

    /// Reads exactly the bytes of `range`.
    pub async fn read_range(&self, range: ChunkRange) -> Result<Vec<u8>, UploadError> {
        let len = usize::try_from(range.len())
            .map_err(|_| UploadError::Validation(format!("range too large: {range:?}")))?;
        match self {
            UploadFile::Path(path) => read_file_range(path, range.start_byte, len).await,
            UploadFile::Memory { bytes, .. } => {
                let start = range.start_byte as usize;
                bytes
                    .get(start..start + len)
                    .map(<[u8]>::to_vec)
                    .ok_or_else(|| {
                        UploadError::Validation(format!("range {range:?} outside buffer"))
                    })
            }
        }
    }
}

async fn read_file_range(path: &Path, start: u64, len: usize) -> Result<Vec<u8>, UploadError> {
    let mut file = tokio::fs::File::open(path).await?;
    file.seek(SeekFrom::Start(start)).await?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Guesses a MIME type from the file extension.
pub fn detect_mime_type(name: &str) -> &'static str {
    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match ext.as_deref() {
        Some("txt" | "log") => "text/plain",
        Some("csv") => "text/csv",
        Some("html" | "htm") => "text/html",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        Some("zip") => "application/zip",
        Some("gz") => "application/gzip",
        Some("tar") => "application/x-tar",
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("mp3") => "audio/mpeg",
        _ => DEFAULT_MIME_TYPE,
    }
}

fn system_time_millis(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

fn now_millis() -> i64 {
    system_time_millis(SystemTime::now())
}
