//! # hueline-transport
//!
//! HTTP and event stream plumbing for talking to a Hue bridge over CLIP v2.
//!
//! The [`http`] module sends authenticated requests and unwraps the bridge's
//! response envelope; the [`sse`] module keeps the bridge's push channel open
//! and turns it into a stream of [`sse::Frame`]s.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use hueline_transport::{
//!     auth::NoAuth,
//!     http::{HttpClient, HttpConfig},
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = HttpConfig::builder("https://192.168.1.2")
//!         .timeout(std::time::Duration::from_secs(5))
//!         .build()?;
//!
//!     let client = HttpClient::new(config, NoAuth)?;
//!     let _stream = client.event_stream_config("/eventstream/clip/v2");
//!     Ok(())
//! }
//! ```

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod auth;
pub mod error;
pub mod http;
pub(crate) mod reconnect;
pub mod sse;
pub mod typed;

// Re-export commonly used types
pub use auth::{ApiKeyAuth, Authentication, NoAuth};
pub use error::{TransportError, TransportResult};
pub use http::{HttpClient, HttpConfig, HttpConfigBuilder};
pub use sse::{Frame, SseConfig, SseConnection, SseHandle, SseStream, StreamEvent};
pub use typed::{ClipError, TypedResponse, parse_envelope};
