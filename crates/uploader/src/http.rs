//! HTTP transport built on `reqwest` multipart requests.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::future::Future;
use std::pin::Pin;

use chunkup_protocol::{ChunkEnvelope, FIELD_FILE, deserialize_field};
use futures_util::{Stream, stream};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Url};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::{ResponseType, UploaderConfig};
use crate::error::UploadError;
use crate::source::DEFAULT_MIME_TYPE;
use crate::transport::{ProgressFn, UploadTransport};
use crate::types::UploadResponse;

/// The binary part is streamed in pieces of this size; one progress tick
/// per piece.
const STREAM_PIECE_SIZE: usize = 64 * 1024;

/// Posts each envelope as a `multipart/form-data` request.
pub struct HttpTransport {
    client: reqwest::Client,
    url: Url,
    headers: HeaderMap,
    auth: Option<(String, Option<String>)>,
    response_type: ResponseType,
}

impl HttpTransport {
    /// Builds the client from the transport options of `config`.
    pub fn new(config: &UploaderConfig) -> Result<Self, UploadError> {
        let mut url = Url::parse(&config.url)
            .map_err(|e| UploadError::Config(format!("invalid url {}: {e}", config.url)))?;
        let query = config.query_pairs();
        if !query.is_empty() {
            url.query_pairs_mut()
                .extend_pairs(query.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        }

        let mut headers = HeaderMap::new();
        for (name, value) in config.request_headers() {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| UploadError::Config(format!("invalid header name {name}: {e}")))?;
            let header_value = HeaderValue::from_str(value)
                .map_err(|e| UploadError::Config(format!("invalid value for header {name}: {e}")))?;
            headers.insert(header_name, header_value);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.timeout_duration() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| UploadError::Config(format!("http client: {e}")))?;

        Ok(Self {
            client,
            url,
            headers,
            auth: config
                .basic_auth()
                .map(|(user, password)| (user.to_string(), password.map(str::to_string))),
            response_type: config.response_type,
        })
    }

    /// Target URL including query parameters.
    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn execute(
        &self,
        envelope: ChunkEnvelope,
        on_progress: ProgressFn<'_>,
    ) -> Result<UploadResponse, UploadError> {
        let total = envelope.bytes.len() as u64;
        let fields = envelope.text_fields()?;
        let file_name = envelope.file_name().to_string();
        let mime = match envelope.mime_type() {
            "" => DEFAULT_MIME_TYPE.to_string(),
            other => other.to_string(),
        };

        let (tick_tx, mut tick_rx) = mpsc::unbounded_channel();
        let body = Body::wrap_stream(progress_stream(envelope.bytes, tick_tx));
        let part = Part::stream_with_length(body, total)
            .file_name(file_name)
            .mime_str(&mime)
            .map_err(|_| UploadError::Validation(format!("invalid MIME type: {mime}")))?;
        let form = fields
            .into_iter()
            .fold(Form::new(), |form, (name, value)| form.text(name, value))
            .part(FIELD_FILE, part);

        let mut request = self
            .client
            .post(self.url.clone())
            .headers(self.headers.clone())
            .multipart(form);
        if let Some((user, password)) = &self.auth {
            request = request.basic_auth(user, password.as_ref());
        }

        let pending = request.send();
        tokio::pin!(pending);
        let result = loop {
            tokio::select! {
                Some(sent) = tick_rx.recv() => on_progress(sent, total),
                result = &mut pending => break result,
            }
        };
        while let Ok(sent) = tick_rx.try_recv() {
            on_progress(sent, total);
        }

        let response = result?;
        on_progress(total, total);

        let status = response.status();
        let headers = collect_headers(response.headers());
        let text = response.text().await?;

        if !status.is_success() {
            warn!(url = %self.url, status = status.as_u16(), "upload request rejected");
            return Err(UploadError::Http {
                status: status.as_u16(),
                body: text,
            });
        }
        debug!(url = %self.url, status = status.as_u16(), bytes = total, "upload request accepted");

        let body = match self.response_type {
            ResponseType::Json => deserialize_field(&text),
            ResponseType::Text => Value::String(text),
        };
        Ok(UploadResponse {
            status: status.as_u16(),
            body,
            headers,
            file_index: None,
        })
    }
}

impl UploadTransport for HttpTransport {
    fn send<'a>(
        &'a self,
        envelope: ChunkEnvelope,
        on_progress: ProgressFn<'a>,
    ) -> Pin<Box<dyn Future<Output = Result<UploadResponse, UploadError>> + Send + 'a>> {
        Box::pin(self.execute(envelope, on_progress))
    }
}

/// Yields `bytes` in pieces, reporting the running total after each one.
///
/// Pieces are copied out only when polled, so at most one piece exists
/// beside the chunk at a time.
fn progress_stream(
    bytes: Vec<u8>,
    ticks: mpsc::UnboundedSender<u64>,
) -> impl Stream<Item = Result<Vec<u8>, std::io::Error>> + Send + 'static {
    stream::unfold((bytes, 0usize), move |(bytes, offset)| {
        let ticks = ticks.clone();
        async move {
            if offset >= bytes.len() {
                return None;
            }
            let end = bytes.len().min(offset + STREAM_PIECE_SIZE);
            let piece = bytes[offset..end].to_vec();
            let _ = ticks.send(end as u64);
            Some((Ok(piece), (bytes, end)))
        }
    })
}

/// Flattens response headers; repeated names are joined with `, `.
fn collect_headers(headers: &HeaderMap) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes());
        match out.entry(name.as_str().to_string()) {
            Entry::Vacant(slot) => {
                slot.insert(value.into_owned());
            }
            Entry::Occupied(mut slot) => {
                let joined: &mut String = slot.get_mut();
                joined.push_str(", ");
                joined.push_str(&value);
            }
        }
    }
    out
}
