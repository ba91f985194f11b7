//! Uploader configuration.
//!
//! The accepted keys form a closed set; anything else is rejected when the
//! document is parsed.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use chunkup_protocol::serialize_field;
use chunkup_transfer::{ChunkSize, DEFAULT_CHUNK_SIZE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::UploadError;

/// How response bodies are decoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Parse as JSON, falling back to a string when the body is not JSON.
    #[default]
    Json,
    /// Keep the body as a string.
    Text,
}

fn default_chunk_size() -> i64 {
    DEFAULT_CHUNK_SIZE as i64
}

/// Transport and protocol options for an upload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UploaderConfig {
    pub url: String,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// Request timeout in milliseconds; 0 disables it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    // Browser-only options. Accepted so one config document can serve
    // every client; they do nothing here.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cross_domain: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub with_credentials: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_cookie_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xsrf_header_name: Option<String>,
    #[serde(default)]
    pub response_type: ResponseType,
    #[serde(default)]
    pub query_params: Map<String, Value>,
    /// Bytes per chunk; signed so negative values reach validation.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: i64,
    #[serde(default)]
    pub add_checksum: bool,
    #[serde(default)]
    pub use_chunks: bool,
}

impl UploaderConfig {
    /// Creates a configuration with defaults for everything but the URL.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: BTreeMap::new(),
            timeout: None,
            user: None,
            password: None,
            cross_domain: None,
            with_credentials: None,
            xsrf_cookie_name: None,
            xsrf_header_name: None,
            response_type: ResponseType::default(),
            query_params: Map::new(),
            chunk_size: default_chunk_size(),
            add_checksum: false,
            use_chunks: false,
        }
    }

    /// Parses a JSON configuration document.
    pub fn from_json(text: &str) -> Result<Self, UploadError> {
        serde_json::from_str(text).map_err(|e| UploadError::Config(e.to_string()))
    }

    /// Reads and parses a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, UploadError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Checks the options that can be wrong after parsing and returns the
    /// validated chunk size.
    pub fn validate(&self) -> Result<ChunkSize, UploadError> {
        if self.url.trim().is_empty() {
            return Err(UploadError::Config("url must not be empty".into()));
        }
        ChunkSize::try_from(self.chunk_size).map_err(|e| UploadError::Config(e.to_string()))
    }

    /// Caller headers to send. `Content-Type` is dropped because the
    /// multipart body supplies its own.
    pub fn request_headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-type"))
            .map(|(name, value)| (name.as_str(), value.as_str()))
    }

    /// Query parameters, values in field encoding.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.query_params
            .iter()
            .map(|(k, v)| (k.clone(), serialize_field(v)))
            .collect()
    }

    pub fn timeout_duration(&self) -> Option<Duration> {
        self.timeout
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
    }

    /// Basic auth credentials, present when `user` is set.
    pub fn basic_auth(&self) -> Option<(&str, Option<&str>)> {
        self.user
            .as_deref()
            .map(|user| (user, self.password.as_deref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = UploaderConfig::from_json(r#"{"url": "http://localhost/upload"}"#).unwrap();
        assert_eq!(config.chunk_size, 1_048_576);
        assert!(!config.add_checksum);
        assert!(!config.use_chunks);
        assert_eq!(config.response_type, ResponseType::Json);
        assert_eq!(config.validate().unwrap().get(), 1_048_576);
        assert_eq!(config, UploaderConfig::new("http://localhost/upload"));
    }

    #[test]
    fn full_allow_list_parses() {
        let text = r#"{
            "url": "http://localhost/upload",
            "headers": {"X-Token": "t"},
            "timeout": 5000,
            "user": "u",
            "password": "p",
            "crossDomain": true,
            "withCredentials": false,
            "xsrfCookieName": "XSRF-TOKEN",
            "xsrfHeaderName": "X-XSRF-TOKEN",
            "responseType": "text",
            "queryParams": {"bucket": "b1", "n": 3},
            "chunkSize": 2048,
            "addChecksum": true,
            "useChunks": true
        }"#;
        let config = UploaderConfig::from_json(text).unwrap();
        assert_eq!(config.validate().unwrap().get(), 2048);
        assert_eq!(config.timeout_duration(), Some(Duration::from_millis(5000)));
        assert_eq!(config.basic_auth(), Some(("u", Some("p"))));
        assert_eq!(config.response_type, ResponseType::Text);
        assert_eq!(
            config.query_pairs(),
            vec![
                ("bucket".to_string(), "b1".to_string()),
                ("n".to_string(), "3".to_string())
            ]
        );
    }

    #[test]
    fn unknown_key_is_config_error() {
        let err = UploaderConfig::from_json(r#"{"url": "http://x", "method": "PUT"}"#).unwrap_err();
        assert!(matches!(err, UploadError::Config(msg) if msg.contains("method")));
    }

    #[test]
    fn invalid_chunk_sizes() {
        for size in [0i64, 1023, -1024, 1500] {
            let mut config = UploaderConfig::new("http://x");
            config.chunk_size = size;
            assert!(
                matches!(config.validate(), Err(UploadError::Config(_))),
                "size={size}"
            );
        }
    }

    #[test]
    fn empty_url_rejected() {
        assert!(matches!(
            UploaderConfig::new("  ").validate(),
            Err(UploadError::Config(_))
        ));
    }

    #[test]
    fn content_type_header_is_stripped() {
        let mut config = UploaderConfig::new("http://x");
        config.headers.insert("CONTENT-TYPE".into(), "application/json".into());
        config.headers.insert("X-Trace".into(), "1".into());
        let headers: Vec<_> = config.request_headers().collect();
        assert_eq!(headers, vec![("X-Trace", "1")]);
    }

    #[test]
    fn zero_timeout_disables() {
        let mut config = UploaderConfig::new("http://x");
        config.timeout = Some(0);
        assert_eq!(config.timeout_duration(), None);
    }

    #[test]
    fn load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chunkup.json");
        std::fs::write(&path, r#"{"url": "http://x", "useChunks": true}"#).unwrap();
        let config = UploaderConfig::load(&path).unwrap();
        assert!(config.use_chunks);
    }
}
