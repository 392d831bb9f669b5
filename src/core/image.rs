//! Turns a local path or remote URL into a base64 data URL.

use std::{fmt, path::Path, time::Duration};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use tracing::debug;

use super::error::ImageFetchError;
use crate::config::ImageConfig;

const DEFAULT_MIME: &str = "image/jpeg";

/// An image in a form the model endpoint accepts inline.
#[derive(Clone, PartialEq, Eq)]
pub struct ImageRef(String);

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self(url.into())
    }

    /// Build a `data:` URL from raw bytes.
    pub fn from_bytes(mime: &str, bytes: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime, STANDARD.encode(bytes)))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

// Data URLs are huge; print only the header.
impl fmt::Debug for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let head = self.0.split(',').next().unwrap_or_default();
        write!(f, "ImageRef({}, {} bytes)", head, self.0.len())
    }
}

#[async_trait]
pub trait ImageResolver: Send + Sync {
    async fn resolve(&self, source: &str) -> Result<ImageRef, ImageFetchError>;
}

pub fn is_remote(source: &str) -> bool {
    source.starts_with("http://") || source.starts_with("https://")
}

/// MIME type guessed from a file extension.
pub fn mime_from_path(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("bmp") => "image/bmp",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => DEFAULT_MIME,
    }
}

/// Resolver backed by `reqwest` for URLs and `tokio::fs` for local paths.
pub struct HttpImageResolver {
    client: reqwest::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl HttpImageResolver {
    pub fn new(config: &ImageConfig) -> Result<Self, ImageFetchError> {
        let timeout = Duration::from_secs(config.fetch_timeout_secs);
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ImageFetchError::Request(e.to_string()))?;
        Ok(Self {
            client,
            timeout,
            max_bytes: config.max_bytes,
        })
    }

    async fn fetch_remote(&self, url: &str) -> Result<ImageRef, ImageFetchError> {
        let map_err = |e: reqwest::Error| {
            if e.is_timeout() {
                ImageFetchError::Timeout {
                    url: url.to_string(),
                    timeout: self.timeout,
                }
            } else {
                ImageFetchError::Request(e.to_string())
            }
        };

        let response = self.client.get(url).send().await.map_err(map_err)?;
        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(ImageFetchError::NotFound(url.to_string()));
        }
        if !status.is_success() {
            return Err(ImageFetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let mime = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .filter(|v| v.starts_with("image/"))
            .map(|v| v.split(';').next().unwrap_or(v).trim().to_string())
            .unwrap_or_else(|| mime_from_path(url).to_string());

        let bytes = response.bytes().await.map_err(map_err)?;
        self.check_size(url, bytes.len())?;
        debug!(url, mime = %mime, bytes = bytes.len(), "fetched remote image");
        Ok(ImageRef::from_bytes(&mime, &bytes))
    }

    async fn read_local(&self, path: &str) -> Result<ImageRef, ImageFetchError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ImageFetchError::NotFound(path.to_string())
            } else {
                ImageFetchError::Io {
                    path: path.to_string(),
                    source,
                }
            }
        })?;
        self.check_size(path, bytes.len())?;
        debug!(path, bytes = bytes.len(), "read local image");
        Ok(ImageRef::from_bytes(mime_from_path(path), &bytes))
    }

    fn check_size(&self, source: &str, len: usize) -> Result<(), ImageFetchError> {
        if len > self.max_bytes {
            return Err(ImageFetchError::Request(format!(
                "{} is {} bytes, limit is {}",
                source, len, self.max_bytes
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl ImageResolver for HttpImageResolver {
    async fn resolve(&self, source: &str) -> Result<ImageRef, ImageFetchError> {
        let source = source.trim();
        if source.starts_with("data:") {
            return Ok(ImageRef::new(source));
        }
        if is_remote(source) {
            self.fetch_remote(source).await
        } else {
            self.read_local(source).await
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn resolver(max_bytes: usize) -> HttpImageResolver {
        HttpImageResolver::new(&ImageConfig {
            fetch_timeout_secs: 5,
            max_bytes,
        })
        .unwrap()
    }

    #[test]
    fn test_mime_from_path() {
        assert_eq!(mime_from_path("a/b/photo.PNG"), "image/png");
        assert_eq!(mime_from_path("https://x/y.webp"), "image/webp");
        assert_eq!(mime_from_path("noext"), "image/jpeg");
    }

    #[test]
    fn test_data_url_encoding() {
        let image = ImageRef::from_bytes("image/png", b"abc");
        assert_eq!(image.as_str(), "data:image/png;base64,YWJj");
        assert_eq!(format!("{:?}", image), "ImageRef(data:image/png;base64, 26 bytes)");
    }

    #[tokio::test]
    async fn test_resolve_local_file() {
        let mut file = tempfile::Builder::new().suffix(".png").tempfile().unwrap();
        file.write_all(b"abc").unwrap();

        let image = resolver(1024)
            .resolve(file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(image.as_str(), "data:image/png;base64,YWJj");
    }

    #[tokio::test]
    async fn test_resolve_missing_file() {
        let err = resolver(1024)
            .resolve("/no/such/meal.jpg")
            .await
            .unwrap_err();
        assert!(matches!(err, ImageFetchError::NotFound(path) if path == "/no/such/meal.jpg"));
    }

    #[tokio::test]
    async fn test_resolve_rejects_oversized_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 64]).unwrap();
        let err = resolver(16)
            .resolve(file.path().to_str().unwrap())
            .await
            .unwrap_err();
        assert!(matches!(err, ImageFetchError::Request(_)));
    }

    #[tokio::test]
    async fn test_data_url_passthrough() {
        let image = resolver(16).resolve("data:image/gif;base64,R0lG").await.unwrap();
        assert_eq!(image.as_str(), "data:image/gif;base64,R0lG");
    }
}
