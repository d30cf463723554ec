//! Remote file fetching
//!
//! Downloads a URL into the temp directory and describes it as an
//! [`UploadedFile`] flagged `remote`, so the rest of the lifecycle treats it
//! like a regular upload.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use tracing::{debug, instrument};
use uploader_core::{UploadError, UploadResult, UploadedFile};
use url::Url;
use uuid::Uuid;

/// Default request timeout in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Fetches remote files
pub trait RemoteFetcher: Send + Sync {
    fn fetch(&self, url: &str) -> UploadResult<UploadedFile>;
}

/// Blocking HTTP fetcher
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    temp_dir: PathBuf,
}

impl HttpFetcher {
    /// Fetcher writing into the system temp directory
    pub fn new() -> UploadResult<Self> {
        Self::with_temp_dir(std::env::temp_dir(), Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_temp_dir(temp_dir: impl Into<PathBuf>, timeout: Duration) -> UploadResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| UploadError::RemoteFetch {
                url: String::new(),
                message: e.to_string(),
            })?;

        Ok(Self {
            client,
            temp_dir: temp_dir.into(),
        })
    }

    fn temp_path(&self, name: &str) -> PathBuf {
        let extension = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| format!(".{}", e))
            .unwrap_or_default();
        self.temp_dir.join(format!("upload-{}{}", Uuid::new_v4(), extension))
    }
}

impl RemoteFetcher for HttpFetcher {
    #[instrument(skip(self))]
    fn fetch(&self, url: &str) -> UploadResult<UploadedFile> {
        let failed = |message: String| UploadError::RemoteFetch {
            url: url.to_string(),
            message,
        };

        let parsed = Url::parse(url).map_err(|e| failed(e.to_string()))?;
        let name = remote_file_name(&parsed);

        let response = self
            .client
            .get(parsed)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| failed(e.to_string()))?;

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(media_type)
            .unwrap_or_else(|| mime_guess::from_path(&name).first_or_octet_stream().to_string());

        let body = response.bytes().map_err(|e| failed(e.to_string()))?;
        let tmp_path = self.temp_path(&name);
        fs::write(&tmp_path, &body)?;

        debug!(name = %name, size = body.len(), content_type = %content_type, tmp = ?tmp_path, "Remote file downloaded");

        Ok(UploadedFile::new(name, tmp_path, body.len() as u64, content_type).remote())
    }
}

/// True for absolute `http`/`https` URLs
pub fn is_remote_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https") && url.has_host())
        .unwrap_or(false)
}

/// Last path segment of the URL, or `download`
pub fn remote_file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("download")
        .to_string()
}

/// The bare media type of a `Content-Type` header value
pub fn media_type(header: &str) -> Option<String> {
    header
        .trim()
        .parse::<mime::Mime>()
        .ok()
        .map(|mime| mime.essence_str().to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_remote_url() {
        assert!(is_remote_url("http://example.com/a.png"));
        assert!(is_remote_url("https://cdn.example.com/img/cat.jpg?size=large"));
        assert!(!is_remote_url("ftp://example.com/a.png"));
        assert!(!is_remote_url("cat.jpg"));
        assert!(!is_remote_url("/uploads/images/1/cat.jpg"));
        assert!(!is_remote_url(""));
    }

    #[test]
    fn test_remote_file_name() {
        let cases = [
            ("https://example.com/images/cat.jpg", "cat.jpg"),
            ("https://example.com/images/cat.jpg?w=100#top", "cat.jpg"),
            ("https://example.com/images/", "download"),
            ("https://example.com", "download"),
        ];

        for (input, expected) in cases {
            let url = Url::parse(input).unwrap();
            assert_eq!(remote_file_name(&url), expected, "Input: {}", input);
        }
    }

    #[test]
    fn test_media_type() {
        assert_eq!(media_type("image/png").as_deref(), Some("image/png"));
        assert_eq!(
            media_type("text/html; charset=UTF-8").as_deref(),
            Some("text/html")
        );
        assert_eq!(media_type("Image/JPEG ").as_deref(), Some("image/jpeg"));
        assert_eq!(media_type(" ; charset=x"), None);
    }

    #[test]
    fn test_temp_path_keeps_extension() {
        let fetcher = HttpFetcher::with_temp_dir("/tmp/uploads", Duration::from_secs(1)).unwrap();
        let path = fetcher.temp_path("cat.jpg");

        assert!(path.starts_with("/tmp/uploads"));
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("jpg"));
        assert_ne!(path, fetcher.temp_path("cat.jpg"));
    }

    #[test]
    fn test_fetch_invalid_url() {
        let fetcher = HttpFetcher::with_temp_dir(std::env::temp_dir(), Duration::from_secs(1)).unwrap();
        let result = fetcher.fetch("not a url");
        assert!(matches!(result, Err(UploadError::RemoteFetch { .. })));
    }
}
