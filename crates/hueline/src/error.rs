//! Errors surfaced by the SDK.

use hueline_transport::TransportError;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    /// A request to the bridge or the event stream setup failed.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Invalid client or router configuration.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// The router task panicked or was aborted.
    #[error("Router task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl Error {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
