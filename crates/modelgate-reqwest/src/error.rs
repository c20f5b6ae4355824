//! Internal error types for modelgate-reqwest.

use reqwest::StatusCode;
use thiserror::Error;

/// Result type alias for modelgate-reqwest operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Internal error type for modelgate-reqwest operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The control plane answered with a non-success status.
    #[error("control plane returned HTTP {status}: {message}")]
    Status { status: StatusCode, message: String },
    /// A request URL could not be built from the base URL.
    #[error("invalid base URL: {0}")]
    InvalidUrl(String),
}

impl From<Error> for modelgate_core::Error {
    fn from(err: Error) -> Self {
        use modelgate_core::{Error as CoreError, ErrorKind};

        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    CoreError::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    CoreError::network_error()
                        .with_message("Connection failed")
                        .with_source(e)
                } else if e.is_decode() {
                    CoreError::serialization()
                        .with_message(e.to_string())
                        .with_source(e)
                } else {
                    CoreError::network_error()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => CoreError::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Status { status, message } => {
                let error = match status {
                    StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => CoreError::authentication(),
                    StatusCode::NOT_FOUND => CoreError::not_found(),
                    StatusCode::TOO_MANY_REQUESTS => CoreError::new(ErrorKind::RateLimited),
                    StatusCode::REQUEST_TIMEOUT | StatusCode::GATEWAY_TIMEOUT => CoreError::timeout(),
                    s if s.is_server_error() => CoreError::service_unavailable(),
                    s if s.is_client_error() => CoreError::invalid_input(),
                    _ => CoreError::external_error(),
                };
                error.with_message(format!("HTTP {status}: {message}"))
            }
            Error::InvalidUrl(message) => CoreError::configuration().with_message(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use modelgate_core::ErrorKind;

    use super::*;

    fn kind(status: StatusCode) -> ErrorKind {
        let error: modelgate_core::Error = Error::Status {
            status,
            message: String::new(),
        }
        .into();
        error.kind()
    }

    #[test]
    fn test_status_conversion() {
        assert_eq!(kind(StatusCode::NOT_FOUND), ErrorKind::NotFound);
        assert_eq!(kind(StatusCode::UNAUTHORIZED), ErrorKind::Authentication);
        assert_eq!(kind(StatusCode::TOO_MANY_REQUESTS), ErrorKind::RateLimited);
        assert_eq!(kind(StatusCode::BAD_GATEWAY), ErrorKind::ServiceUnavailable);
        assert_eq!(kind(StatusCode::UNPROCESSABLE_ENTITY), ErrorKind::InvalidInput);
    }

    #[test]
    fn test_retryable_statuses() {
        let error: modelgate_core::Error = Error::Status {
            status: StatusCode::SERVICE_UNAVAILABLE,
            message: "draining".into(),
        }
        .into();
        assert!(error.is_retryable());

        let error: modelgate_core::Error = Error::Status {
            status: StatusCode::CONFLICT,
            message: "endpoint exists".into(),
        }
        .into();
        assert!(!error.is_retryable());
    }
}
