//! Authentication abstractions.
//!
//! The bridge authenticates every request, including the event stream, with
//! a static application key header. [`ApiKeyAuth::application_key`] builds
//! that authenticator; other header schemes can be plugged in through
//! [`Authentication`].

use async_trait::async_trait;
use http::{HeaderMap, HeaderName, HeaderValue, Method};

use crate::error::{TransportError, TransportResult};

/// Header the bridge reads the application key from.
pub const APPLICATION_KEY_HEADER: &str = "hue-application-key";

/// Authentication trait for different authentication methods.
#[async_trait]
pub trait Authentication: Send + Sync + std::fmt::Debug {
    /// Authenticate a request by modifying it in place.
    async fn authenticate(&self, request: &mut dyn AuthenticatedRequest) -> TransportResult<()>;
}

/// A request that can be authenticated.
pub trait AuthenticatedRequest: Send {
    /// Add a header to the request.
    fn add_header(&mut self, name: &str, value: &str) -> TransportResult<()>;

    /// Get a header value.
    fn get_header(&self, name: &str) -> Option<&str>;

    /// Get the request URL.
    fn url(&self) -> &str;

    /// Get the request method.
    fn method(&self) -> &Method;
}

/// Method, URL and headers of a request about to be sent.
#[derive(Debug, Clone)]
pub struct RequestParts {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
}

impl RequestParts {
    pub fn new(method: Method, url: impl Into<String>, headers: HeaderMap) -> Self {
        Self {
            method,
            url: url.into(),
            headers,
        }
    }
}

impl AuthenticatedRequest for RequestParts {
    fn add_header(&mut self, name: &str, value: &str) -> TransportResult<()> {
        let name = HeaderName::try_from(name)
            .map_err(|e| TransportError::auth(format!("invalid header name {name:?}: {e}")))?;
        let mut value = HeaderValue::from_str(value)
            .map_err(|e| TransportError::auth(format!("invalid header value: {e}")))?;
        value.set_sensitive(true);
        self.headers.insert(name, value);
        Ok(())
    }

    fn get_header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    fn url(&self) -> &str {
        &self.url
    }

    fn method(&self) -> &Method {
        &self.method
    }
}

/// No authentication
#[derive(Debug, Clone, Default)]
pub struct NoAuth;

#[async_trait]
impl Authentication for NoAuth {
    async fn authenticate(&self, _request: &mut dyn AuthenticatedRequest) -> TransportResult<()> {
        Ok(())
    }
}

/// Static API key sent as a request header.
#[derive(Clone)]
pub struct ApiKeyAuth {
    header: String,
    value: String,
}

impl ApiKeyAuth {
    /// Authenticate with `value` in the header `header`.
    pub fn header(header: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            header: header.into(),
            value: value.into(),
        }
    }

    /// Authenticate with a bridge application key.
    pub fn application_key(key: impl Into<String>) -> Self {
        Self::header(APPLICATION_KEY_HEADER, key)
    }
}

impl std::fmt::Debug for ApiKeyAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiKeyAuth")
            .field("header", &self.header)
            .field("value", &"<redacted>")
            .finish()
    }
}

#[async_trait]
impl Authentication for ApiKeyAuth {
    async fn authenticate(&self, request: &mut dyn AuthenticatedRequest) -> TransportResult<()> {
        if self.value.is_empty() {
            return Err(TransportError::auth("API key is empty"));
        }
        request.add_header(&self.header, &self.value)
    }
}
