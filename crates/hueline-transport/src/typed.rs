//! Typed responses and the bridge's response envelope.
//!
//! Every CLIP endpoint answers with the same envelope:
//!
//! ```json
//! { "errors": [{ "description": "..." }], "data": [ ... ] }
//! ```
//!
//! [`parse_envelope`] unwraps it, turning a non-success status or a
//! non-empty `errors` list into [`TransportError::Api`].

use std::{collections::HashMap, time::Duration};

use http::StatusCode;
use serde::{Deserialize, de::DeserializeOwned};

use crate::error::{TransportError, TransportResult};

/// A typed response wrapper that includes both the deserialized data and metadata.
#[derive(Debug, Clone)]
pub struct TypedResponse<T> {
    /// The deserialized response data.
    pub data: T,
    /// HTTP status code of the response.
    pub status: StatusCode,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Round-trip latency.
    pub latency: Duration,
}

impl<T> TypedResponse<T> {
    /// Check if the response indicates success.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Get a header value by name.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(|s| s.as_str())
    }

    /// Map the response data to a new type.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> TypedResponse<U> {
        TypedResponse {
            data: f(self.data),
            status: self.status,
            headers: self.headers,
            latency: self.latency,
        }
    }

    /// Discard the metadata.
    pub fn into_data(self) -> T {
        self.data
    }
}

/// One entry of the envelope's `errors` list.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct ClipError {
    pub description: String,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    errors: Vec<ClipError>,
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct ErrorsOnly {
    #[serde(default)]
    errors: Vec<ClipError>,
}

/// Unwrap a CLIP response body.
///
/// # Errors
///
/// Returns [`TransportError::Api`] when the status is not a success or the
/// envelope reports errors, and [`TransportError::Serialization`] when a
/// successful body does not match `T`.
pub fn parse_envelope<T: DeserializeOwned>(
    status: StatusCode,
    body: &[u8],
) -> TransportResult<Vec<T>> {
    if !status.is_success() {
        let errors = serde_json::from_slice::<ErrorsOnly>(body)
            .map(|e| e.errors.into_iter().map(|e| e.description).collect())
            .unwrap_or_else(|_| {
                let text = String::from_utf8_lossy(body).trim().to_string();
                if text.is_empty() { Vec::new() } else { vec![text] }
            });
        return Err(TransportError::api(status, errors));
    }

    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }

    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    if !envelope.errors.is_empty() {
        return Err(TransportError::api(
            status,
            envelope.errors.into_iter().map(|e| e.description).collect(),
        ));
    }
    Ok(envelope.data)
}
