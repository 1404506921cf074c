//! HTTP client for the bridge's CLIP API.
//!
//! [`HttpClient`] joins relative paths onto the configured base URL,
//! authenticates every request, and unwraps the CLIP envelope into a
//! [`TypedResponse`] holding the `data` list.

use std::{collections::HashMap, sync::Arc, time::Duration};

use http::Method;
use serde::{Serialize, de::DeserializeOwned};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::{
    auth::{Authentication, NoAuth, RequestParts},
    error::{TransportError, TransportResult},
    sse::SseConfig,
    typed::{TypedResponse, parse_envelope},
};

/// Configuration for the HTTP client.
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL for all requests, e.g. `https://192.168.1.2`.
    pub base_url: String,

    /// Default timeout for requests
    pub timeout: Duration,

    /// Connection timeout
    pub connect_timeout: Duration,

    /// User agent string
    pub user_agent: String,

    /// Accept the bridge's self-signed certificate
    pub accept_invalid_certs: bool,

    /// Default headers to include with all requests
    pub default_headers: HashMap<String, String>,
}

impl HttpConfig {
    /// Create a new HTTP configuration with defaults.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            user_agent: concat!("hueline/", env!("CARGO_PKG_VERSION")).to_string(),
            accept_invalid_certs: false,
            default_headers: HashMap::new(),
        }
    }

    /// Create a builder for the HTTP configuration.
    pub fn builder(base_url: impl Into<String>) -> HttpConfigBuilder {
        HttpConfigBuilder::new(base_url)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> TransportResult<()> {
        if self.base_url.is_empty() {
            return Err(TransportError::config("Base URL cannot be empty"));
        }

        if self.timeout.is_zero() {
            return Err(TransportError::config("Timeout cannot be zero"));
        }

        if self.connect_timeout.is_zero() {
            return Err(TransportError::config("Connect timeout cannot be zero"));
        }

        url::Url::parse(&self.base_url)
            .map_err(|e| TransportError::config(format!("Invalid base URL: {e}")))?;

        Ok(())
    }
}

/// Builder for HTTP configuration.
pub struct HttpConfigBuilder {
    config: HttpConfig,
}

impl HttpConfigBuilder {
    /// Create a new builder.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            config: HttpConfig::new(base_url),
        }
    }

    /// Set the timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the user agent.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Accept invalid TLS certificates.
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.config.accept_invalid_certs = accept;
        self
    }

    /// Add a default header.
    pub fn default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config
            .default_headers
            .insert(name.into(), value.into());
        self
    }

    /// Build the configuration.
    pub fn build(self) -> TransportResult<HttpConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

/// HTTP client for CLIP endpoints.
///
/// Cheap to clone; clones share the connection pool and authenticator.
#[derive(Clone)]
pub struct HttpClient {
    config: Arc<HttpConfig>,
    client: reqwest::Client,
    auth: Arc<dyn Authentication>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("auth", &self.auth)
            .finish()
    }
}

impl HttpClient {
    /// Create a new HTTP client.
    pub fn new<A>(config: HttpConfig, auth: A) -> TransportResult<Self>
    where
        A: Authentication + 'static,
    {
        config.validate()?;

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(&config.user_agent)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::config(format!("Failed to build client: {e}")))?;

        Ok(Self {
            config: Arc::new(config),
            client,
            auth: Arc::new(auth),
        })
    }

    /// Create a client without authentication.
    pub fn unauthenticated(config: HttpConfig) -> TransportResult<Self> {
        Self::new(config, NoAuth)
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// The authenticator applied to every request.
    pub fn auth(&self) -> Arc<dyn Authentication> {
        Arc::clone(&self.auth)
    }

    /// Send a GET request.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> TransportResult<TypedResponse<Vec<T>>> {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// Send a POST request.
    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> TransportResult<TypedResponse<Vec<T>>> {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Send a PUT request.
    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> TransportResult<TypedResponse<Vec<T>>> {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Send a DELETE request.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
    ) -> TransportResult<TypedResponse<Vec<T>>> {
        self.request(Method::DELETE, path, None::<&()>).await
    }

    /// Join `path` onto the base URL. Absolute URLs are returned unchanged.
    pub fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!(
                "{}/{}",
                self.config.base_url.trim_end_matches('/'),
                path.trim_start_matches('/')
            )
        }
    }

    /// Stream configuration for an event endpoint on the same bridge.
    ///
    /// Carries over the TLS setting, the default headers and the user agent.
    pub fn event_stream_config(&self, path: &str) -> SseConfig {
        let mut headers = http::HeaderMap::new();
        for (name, value) in self.default_header_values() {
            headers.insert(name, value);
        }
        if let Ok(agent) = http::HeaderValue::from_str(&self.config.user_agent) {
            headers.insert(http::header::USER_AGENT, agent);
        }
        SseConfig::new(self.build_url(path))
            .headers(headers)
            .connect_timeout(self.config.connect_timeout.max(self.config.timeout))
            .accept_invalid_certs(self.config.accept_invalid_certs)
    }

    fn default_header_values(
        &self,
    ) -> impl Iterator<Item = (http::HeaderName, http::HeaderValue)> + '_ {
        self.config
            .default_headers
            .iter()
            .filter_map(|(name, value)| {
                let name = http::HeaderName::try_from(name.as_str()).ok()?;
                let value = http::HeaderValue::from_str(value).ok()?;
                Some((name, value))
            })
    }

    /// Send a request and unwrap the CLIP envelope.
    pub async fn request<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> TransportResult<TypedResponse<Vec<T>>> {
        let mut parts = RequestParts::new(
            method.clone(),
            self.build_url(path),
            self.default_header_values().collect(),
        );
        self.auth.authenticate(&mut parts).await?;

        let mut request = self
            .client
            .request(parts.method, &parts.url)
            .headers(parts.headers);
        if let Some(body) = body {
            request = request.json(body);
        }

        let started = Instant::now();
        let response = request.send().await?;
        let latency = started.elapsed();

        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let bytes = response.bytes().await?;

        debug!(
            method = %method,
            url = %parts.url,
            status = status.as_u16(),
            latency_ms = latency.as_millis() as u64,
            "bridge request completed"
        );

        let data = parse_envelope(status, &bytes).inspect_err(|err| {
            warn!(method = %method, url = %parts.url, error = %err, "bridge request failed");
        })?;

        Ok(TypedResponse {
            data,
            status,
            headers,
            latency,
        })
    }
}
