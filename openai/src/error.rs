use std::time::Duration;

use eventsource_stream::EventStreamError;
use thiserror::Error;

/// Errors that can arise when calling an OpenAI-compatible API.
#[derive(Debug, Error)]
pub enum OpenAIError {
    /// Transport errors (connection refused, reset, TLS, ...).
    #[error("HTTP error: {0}")]
    Http(#[source] reqwest::Error),
    /// The request did not complete within the configured timeout.
    #[error("request timed out")]
    Timeout,
    /// HTTP 429.
    #[error("rate limited: {message}")]
    RateLimit {
        /// Server-provided message.
        message: String,
        /// Delay requested through the `Retry-After` header.
        retry_after: Option<Duration>,
    },
    /// HTTP 5xx.
    #[error("server error {status}: {message}")]
    ServerError {
        /// Status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
    /// Any other unsuccessful status (bad request, authentication, ...).
    #[error("request rejected with status {status}: {message}")]
    Status {
        /// Status code.
        status: u16,
        /// Server-provided message.
        message: String,
    },
    /// JSON serialization/deserialization errors.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    /// Embedding input was empty.
    #[error("cannot embed empty text")]
    EmptyInput,
    /// API contract violations, including `error` objects inside a stream.
    #[error("{0}")]
    Api(String),
}

impl OpenAIError {
    /// Whether retrying the same request may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Http(_) | Self::Timeout | Self::RateLimit { .. } | Self::ServerError { .. }
        )
    }
}

impl From<reqwest::Error> for OpenAIError {
    fn from(value: reqwest::Error) -> Self {
        if value.is_timeout() {
            Self::Timeout
        } else {
            Self::Http(value)
        }
    }
}

impl From<EventStreamError<reqwest::Error>> for OpenAIError {
    fn from(value: EventStreamError<reqwest::Error>) -> Self {
        match value {
            EventStreamError::Transport(err) => Self::from(err),
            other => Self::Api(format!("malformed event stream: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_event_stream_is_an_api_error() {
        let invalid = String::from_utf8(vec![0xff]).unwrap_err();
        let err = OpenAIError::from(EventStreamError::<reqwest::Error>::Utf8(invalid));
        assert!(matches!(&err, OpenAIError::Api(message) if message.starts_with("malformed event stream")));
        assert!(!err.is_retryable());
    }

    #[test]
    fn retryable_kinds() {
        assert!(OpenAIError::Timeout.is_retryable());
        assert!(
            OpenAIError::RateLimit {
                message: "slow down".into(),
                retry_after: None
            }
            .is_retryable()
        );
        assert!(
            OpenAIError::ServerError {
                status: 503,
                message: String::new()
            }
            .is_retryable()
        );
        assert!(
            !OpenAIError::Status {
                status: 401,
                message: "bad key".into()
            }
            .is_retryable()
        );
        assert!(!OpenAIError::EmptyInput.is_retryable());
        assert!(!OpenAIError::Api("boom".into()).is_retryable());
    }
}
