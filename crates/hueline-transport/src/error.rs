//! Error handling for the transport layer.

use std::time::Duration;

use thiserror::Error;

/// The main result type used throughout the transport layer.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors produced by the HTTP client and the event stream connection.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP request errors (wraps reqwest::Error)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The bridge answered with a non-success status or a non-empty
    /// `errors` list.
    #[error("API error: status={status}, errors={errors:?}")]
    Api {
        status: http::StatusCode,
        errors: Vec<String>,
    },

    /// Authentication errors
    #[error("Authentication error: {message}")]
    Auth { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The connection or request was not established in time
    #[error("Connect timed out after {duration:?}")]
    ConnectTimeout { duration: Duration },

    /// No bytes arrived on the event stream within the read timeout
    #[error("Read timed out after {duration:?}")]
    ReadTimeout { duration: Duration },

    /// Event stream endpoint answered with a non-success status
    #[error("Event stream rejected with status {status}")]
    SseInvalidStatus { status: http::StatusCode },

    /// Event stream endpoint answered with the wrong content type
    #[error("Event stream has unexpected content type {content_type:?}")]
    SseInvalidContentType { content_type: String },

    /// The server closed the event stream
    #[error("Event stream ended")]
    SseStreamEnded,

    /// The background connection task is gone
    #[error("Connection closed{}", reason_suffix(.reason))]
    ConnectionClosed { reason: Option<String> },
}

fn reason_suffix(reason: &Option<String>) -> String {
    reason
        .as_deref()
        .map(|r| format!(": {r}"))
        .unwrap_or_default()
}

impl TransportError {
    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an authentication error.
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a connect timeout error.
    pub fn connect_timeout(duration: Duration) -> Self {
        Self::ConnectTimeout { duration }
    }

    /// Create a read timeout error.
    pub fn read_timeout(duration: Duration) -> Self {
        Self::ReadTimeout { duration }
    }

    /// Create an API error.
    pub fn api(status: http::StatusCode, errors: Vec<String>) -> Self {
        Self::Api { status, errors }
    }

    /// Create an invalid status error for the event stream.
    pub fn sse_invalid_status(status: http::StatusCode) -> Self {
        Self::SseInvalidStatus { status }
    }

    /// Create an invalid content type error for the event stream.
    pub fn sse_invalid_content_type(content_type: impl Into<String>) -> Self {
        Self::SseInvalidContentType {
            content_type: content_type.into(),
        }
    }

    /// Create a stream ended error.
    pub fn sse_stream_ended() -> Self {
        Self::SseStreamEnded
    }

    /// Create a connection closed error.
    pub fn connection_closed(reason: Option<String>) -> Self {
        Self::ConnectionClosed { reason }
    }

    /// Returns `true` for failures that are expected on a long-lived stream
    /// and clear up by reconnecting: timeouts, resets, refused connections
    /// and the server ending the stream.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectTimeout { .. } | Self::ReadTimeout { .. } | Self::SseStreamEnded => true,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_body() || e.is_request(),
            _ => false,
        }
    }
}
