//! Error types shared by the vendor clients.
//!
//! Vendor calls fail with [`ApiError`]. Components log these and hand an
//! empty result to their caller; the only error that travels up to `main` is
//! [`PollTimeout`].

use std::path::PathBuf;
use std::time::Duration;

use reqwest::StatusCode;

use crate::model::JobHandle;

/// Longest response body kept in an [`ApiError::Status`] message.
const MAX_BODY_EXCERPT: usize = 512;

/// Failure of a single vendor API call.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Connection, TLS or body decoding failure.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The endpoint answered with a status the caller did not expect.
    #[error("{endpoint} responded with {status}: {body}")]
    Status {
        endpoint: String,
        status: StatusCode,
        body: String,
    },

    /// The lookup succeeded but nothing matched.
    #[error("{0} not found")]
    NotFound(String),

    /// A required setting is absent.
    #[error("missing setting: {0}")]
    MissingSetting(&'static str),

    /// A local file to upload does not exist.
    #[error("file {} not found", .0.display())]
    MissingFile(PathBuf),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl ApiError {
    /// Build a [`ApiError::Status`] from a response, consuming its body.
    pub async fn from_response(endpoint: &str, response: reqwest::Response) -> Self {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Self::Status {
            endpoint: endpoint.to_string(),
            status,
            body: excerpt(&body),
        }
    }
}

fn excerpt(body: &str) -> String {
    let body = body.trim();
    if body.len() <= MAX_BODY_EXCERPT {
        return body.to_string();
    }
    let mut end = MAX_BODY_EXCERPT;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &body[..end])
}

/// A polled job did not reach `completed` before the deadline.
#[derive(Debug, thiserror::Error)]
#[error("job {job} did not complete within {}s", .timeout.as_secs())]
pub struct PollTimeout {
    pub job: JobHandle,
    pub timeout: Duration,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_excerpt_short_body_is_kept() {
        assert_eq!(excerpt("  not found \n"), "not found");
    }

    #[test]
    fn test_excerpt_long_body_is_truncated() {
        let body = "x".repeat(MAX_BODY_EXCERPT + 10);
        let short = excerpt(&body);
        assert_eq!(short.len(), MAX_BODY_EXCERPT + 3);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn test_excerpt_respects_char_boundaries() {
        let body = "é".repeat(MAX_BODY_EXCERPT);
        let short = excerpt(&body);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn test_poll_timeout_message() {
        let err = PollTimeout {
            job: JobHandle::new("job-7"),
            timeout: Duration::from_secs(1800),
        };
        assert_eq!(err.to_string(), "job job-7 did not complete within 1800s");
    }

    #[test]
    fn test_missing_file_message() {
        let err = ApiError::MissingFile(PathBuf::from("/tmp/report.xml"));
        assert_eq!(err.to_string(), "file /tmp/report.xml not found");
    }
}
