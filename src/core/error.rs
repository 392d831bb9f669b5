use std::time::Duration;

use thiserror::Error;

/// Failure to turn a path or URL into an inline image.
#[derive(Debug, Error)]
pub enum ImageFetchError {
    #[error("image not found: {0}")]
    NotFound(String),

    #[error("image download timed out after {timeout:?}: {url}")]
    Timeout { url: String, timeout: Duration },

    #[error("image download failed (HTTP {status}): {url}")]
    Status { url: String, status: u16 },

    #[error("failed to read image {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("image request failed: {0}")]
    Request(String),
}

/// Failure of a streamed model call.
#[derive(Debug, Error)]
pub enum ModelCallError {
    #[error("failed to connect to model endpoint: {0}")]
    Connect(String),

    #[error("model endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("model call timed out")]
    Timeout,

    #[error("model stream interrupted: {0}")]
    Stream(String),

    #[error("failed to decode model stream chunk: {0}")]
    Decode(String),

    #[error("model call cancelled")]
    Cancelled,
}

impl ModelCallError {
    /// Whether a fresh connection attempt might succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ModelCallError::Connect(_) | ModelCallError::Timeout => true,
            ModelCallError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ModelCallError::Timeout
        } else if err.is_connect() {
            ModelCallError::Connect(err.to_string())
        } else if err.is_decode() || err.is_body() {
            ModelCallError::Stream(err.to_string())
        } else {
            ModelCallError::Connect(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ModelCallError::Connect("refused".into()).is_retryable());
        assert!(ModelCallError::Timeout.is_retryable());
        assert!(ModelCallError::Status {
            status: 503,
            body: String::new()
        }
        .is_retryable());
        assert!(ModelCallError::Status {
            status: 429,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelCallError::Status {
            status: 401,
            body: String::new()
        }
        .is_retryable());
        assert!(!ModelCallError::Decode("bad".into()).is_retryable());
        assert!(!ModelCallError::Cancelled.is_retryable());
    }

    #[test]
    fn test_messages() {
        let err = ImageFetchError::Status {
            url: "https://x/y.jpg".into(),
            status: 404,
        };
        assert_eq!(
            err.to_string(),
            "image download failed (HTTP 404): https://x/y.jpg"
        );
    }
}
