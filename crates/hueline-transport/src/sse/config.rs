//! Event stream connection configuration.

use std::time::Duration;

use crate::reconnect::BackoffConfig;

/// Configuration for the bridge event stream connection.
///
/// Defaults reconnect forever after a fixed 500 ms pause and treat 60 seconds
/// without any bytes (not even a keep-alive) as a dead connection. The read
/// timeout applies per received chunk, not per complete frame.
#[derive(Clone, Debug)]
pub struct SseConfig {
    /// Event stream endpoint URL.
    pub url: String,
    /// Additional HTTP headers to include with every connection attempt.
    pub headers: http::HeaderMap,
    /// Time allowed for the response headers to arrive.
    pub connect_timeout: Duration,
    /// Maximum silence between two body chunks before the connection is
    /// recycled.
    pub read_timeout: Duration,
    /// Delay before the first reconnection attempt.
    pub reconnect_initial_delay: Duration,
    /// Upper bound for the reconnection delay.
    pub reconnect_max_delay: Duration,
    /// Growth factor applied per consecutive failed attempt (1.0 = fixed).
    pub reconnect_backoff_factor: f64,
    /// Random jitter factor (0.0–1.0) for reconnection delays.
    pub reconnect_jitter: f64,
    /// Accept self-signed bridge certificates.
    pub accept_invalid_certs: bool,
    /// Capacity of the event channel.
    pub event_channel_capacity: usize,
    /// Capacity of the command channel.
    pub command_channel_capacity: usize,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            headers: http::HeaderMap::new(),
            connect_timeout: Duration::from_secs(10),
            read_timeout: Duration::from_secs(60),
            reconnect_initial_delay: Duration::from_millis(500),
            reconnect_max_delay: Duration::from_secs(30),
            reconnect_backoff_factor: 1.0,
            reconnect_jitter: 0.0,
            accept_invalid_certs: false,
            event_channel_capacity: 256,
            command_channel_capacity: 16,
        }
    }
}

impl SseConfig {
    /// Create a new configuration for the given URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Set additional HTTP headers.
    #[must_use]
    pub fn headers(mut self, headers: http::HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    /// Set the initial reconnection delay.
    #[must_use]
    pub fn reconnect_initial_delay(mut self, delay: Duration) -> Self {
        self.reconnect_initial_delay = delay;
        self
    }

    /// Set the maximum reconnection delay.
    #[must_use]
    pub fn reconnect_max_delay(mut self, delay: Duration) -> Self {
        self.reconnect_max_delay = delay;
        self
    }

    /// Set the reconnection backoff factor.
    #[must_use]
    pub fn reconnect_backoff_factor(mut self, factor: f64) -> Self {
        self.reconnect_backoff_factor = factor;
        self
    }

    /// Set the reconnection jitter factor.
    #[must_use]
    pub fn reconnect_jitter(mut self, jitter: f64) -> Self {
        self.reconnect_jitter = jitter;
        self
    }

    /// Accept invalid TLS certificates (the bridge ships a self-signed one).
    #[must_use]
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Set the event channel capacity.
    #[must_use]
    pub fn event_channel_capacity(mut self, capacity: usize) -> Self {
        self.event_channel_capacity = capacity;
        self
    }

    /// Set the command channel capacity.
    #[must_use]
    pub fn command_channel_capacity(mut self, capacity: usize) -> Self {
        self.command_channel_capacity = capacity;
        self
    }

    pub(crate) fn backoff(&self) -> BackoffConfig {
        BackoffConfig {
            initial_delay: self.reconnect_initial_delay,
            max_delay: self.reconnect_max_delay,
            factor: self.reconnect_backoff_factor,
            jitter: self.reconnect_jitter,
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> Result<(), String> {
        if self.url.is_empty() {
            return Err("URL cannot be empty".to_string());
        }
        url::Url::parse(&self.url).map_err(|e| format!("Invalid URL: {e}"))?;
        if self.connect_timeout.is_zero() {
            return Err("Connect timeout must be > 0".to_string());
        }
        if self.read_timeout.is_zero() {
            return Err("Read timeout must be > 0".to_string());
        }
        self.backoff().validate()?;
        if self.event_channel_capacity == 0 {
            return Err("Event channel capacity must be > 0".to_string());
        }
        if self.command_channel_capacity == 0 {
            return Err("Command channel capacity must be > 0".to_string());
        }
        Ok(())
    }
}
