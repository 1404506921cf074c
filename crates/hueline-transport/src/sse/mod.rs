//! Server-sent event stream transport for the bridge's push API.
//!
//! - **Framing**: [`FrameStream`] turns raw body chunks into [`Frame`]s,
//!   independent of how the body is split into chunks.
//! - **Supervision**: [`SseConnection`] spawns a driver task that keeps the
//!   stream open forever, reconnecting after a bounded delay on any failure
//!   and recycling connections that stay silent past the read timeout.
//! - **Handle/Stream split**: control the driver through a clone-able
//!   [`SseHandle`] and consume [`StreamEvent`]s from [`SseStream`].
//!
//! # Architecture
//!
//! ```text
//! SseConnection::connect(config)
//!   └─ spawns background task ──► tokio::spawn(sse_connection_driver)
//!        │                              │
//!        ├── SseHandle ◄─── mpsc/watch ─┤  (commands: Close, Reconnect; state)
//!        │                              │
//!        └── SseStream ◄─── mpsc ◄──────┘  (Ready once, then Frame items)
//! ```
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use hueline_transport::{
//!     auth::ApiKeyAuth,
//!     sse::{Frame, SseConfig, SseConnection, StreamEvent},
//! };
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = SseConfig::new("https://192.168.1.2/eventstream/clip/v2")
//!     .accept_invalid_certs(true);
//!
//! let auth = std::sync::Arc::new(ApiKeyAuth::application_key("my-app-key"));
//! let connection = SseConnection::connect_with_auth(config, auth).await?;
//! let (_handle, mut stream) = connection.split();
//!
//! while let Some(event) = stream.next_event().await {
//!     match event {
//!         StreamEvent::Ready => println!("connected"),
//!         StreamEvent::Frame(Frame::Data { id, payload }) => {
//!             println!("{id}: {} bytes", payload.len());
//!         }
//!         StreamEvent::Frame(Frame::Heartbeat) => {}
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod config;
pub mod connection;
pub mod parse;

pub use config::SseConfig;
pub use connection::{
    SseCommand, SseConnection, SseConnectionState, SseHandle, SseStream, StreamEvent,
};
pub use parse::{Frame, FrameStream};
