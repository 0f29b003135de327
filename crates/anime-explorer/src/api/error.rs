//! Errors reported by the catalog API client.

use reqwest::StatusCode;
use thiserror::Error;

/// Failure talking to the remote catalog
#[derive(Debug, Error)]
pub enum ApiError {
    /// Connection, timeout or transport failure
    #[error("network error: {0}")]
    Network(#[source] reqwest::Error),

    /// Non-success HTTP status
    #[error("request failed with status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// Body did not match the expected shape
    #[error("failed to decode response: {0}")]
    Decode(#[source] reqwest::Error),
}

impl ApiError {
    /// Whether the server asked us to slow down
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::Status { status, .. } if *status == StatusCode::TOO_MANY_REQUESTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_display() {
        let err = ApiError::Status {
            status: StatusCode::NOT_FOUND,
            body: "Resource does not exist".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "request failed with status 404 Not Found: Resource does not exist"
        );
        assert!(!err.is_rate_limited());
    }

    #[test]
    fn test_rate_limited() {
        let err = ApiError::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
        };
        assert!(err.is_rate_limited());
    }
}
