//! Error types for webhook delivery.

use thiserror::Error;

/// Result type alias for webhook operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for webhook operations.
#[derive(Debug, Error)]
pub enum Error {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Reqwest(#[from] reqwest::Error),
    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    /// The receiver answered with a non-success status.
    #[error("webhook receiver returned HTTP {status}")]
    Status { status: u16 },
    /// The signing key was rejected.
    #[error("invalid signing key")]
    InvalidKey,
}

impl From<Error> for crate::Error {
    fn from(err: Error) -> Self {
        match err {
            Error::Reqwest(e) => {
                if e.is_timeout() {
                    crate::Error::timeout()
                        .with_message(e.to_string())
                        .with_source(e)
                } else if e.is_connect() {
                    crate::Error::network_error()
                        .with_message("Connection failed")
                        .with_source(e)
                } else {
                    crate::Error::network_error()
                        .with_message(e.to_string())
                        .with_source(e)
                }
            }
            Error::Serde(e) => crate::Error::serialization()
                .with_message(e.to_string())
                .with_source(e),
            Error::Status { status } if status >= 500 => crate::Error::service_unavailable()
                .with_message(format!("webhook receiver returned HTTP {status}")),
            Error::Status { status } => crate::Error::external_error()
                .with_message(format!("webhook receiver returned HTTP {status}")),
            Error::InvalidKey => crate::Error::configuration().with_message("invalid signing key"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind;

    #[test]
    fn test_status_conversion() {
        let error: crate::Error = Error::Status { status: 503 }.into();
        assert_eq!(error.kind(), ErrorKind::ServiceUnavailable);

        let error: crate::Error = Error::Status { status: 400 }.into();
        assert_eq!(error.kind(), ErrorKind::ExternalError);
        assert!(!error.is_retryable());
    }
}
