//! Event stream connection driver.
//!
//! Provides [`SseConnection`], [`SseHandle`], and [`SseStream`]. The driver
//! task owns the HTTP connection for its whole life: it reconnects after every
//! failure, including read timeouts, and only stops on an explicit close or
//! when the consumer goes away.

use std::{
    pin::{Pin, pin},
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::{
    sync::{mpsc, watch},
    time::timeout,
};
use tracing::{debug, error, info, trace, warn};

use super::{
    config::SseConfig,
    parse::{Frame, FrameStream},
};
use crate::{
    auth::{Authentication, RequestParts},
    error::{TransportError, TransportResult},
    reconnect::calculate_backoff,
};

// ---------------------------------------------------------------------------
// Connection state
// ---------------------------------------------------------------------------

/// Connection state machine states.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SseConnectionState {
    /// Driver not started yet.
    Disconnected,
    /// Attempting to establish a connection.
    Connecting,
    /// Connected and reading frames.
    Streaming,
    /// Waiting before the next connection attempt.
    Reconnecting {
        /// Number of consecutive failed attempts so far.
        attempt: u32,
    },
    /// Fully closed; will not reconnect.
    Closed,
}

impl SseConnectionState {
    /// Returns `true` if the connection is actively streaming.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    /// Returns `true` if the connection is in a terminal state.
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

// ---------------------------------------------------------------------------
// Commands and events
// ---------------------------------------------------------------------------

/// Control commands sent from [`SseHandle`] to the background task.
#[derive(Debug)]
pub enum SseCommand {
    /// Gracefully close the connection.
    Close,
    /// Drop the current connection and open a new one.
    Reconnect {
        /// Human-readable reason for the reconnection request.
        reason: String,
    },
}

/// Items yielded by [`SseStream`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The first connection succeeded. Yielded once per [`SseConnection`],
    /// before any frame, and never again after reconnects.
    Ready,
    /// A frame read from the stream, in arrival order.
    Frame(Frame),
}

// ---------------------------------------------------------------------------
// Public API: SseConnection
// ---------------------------------------------------------------------------

/// Entry point for event stream connections.
///
/// Call [`connect()`](SseConnection::connect) to start the driver and then
/// [`split()`](SseConnection::split) to obtain a [`SseHandle`] (for control)
/// and [`SseStream`] (for events).
pub struct SseConnection {
    handle: SseHandle,
    stream: SseStream,
}

impl SseConnection {
    /// Start an unauthenticated connection.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration validation fails or the HTTP client
    /// cannot be built. Connection failures are never returned; the driver
    /// keeps retrying them in the background.
    pub async fn connect(config: SseConfig) -> TransportResult<Self> {
        Self::connect_inner(config, None).await
    }

    /// Start a connection that authenticates every attempt, reconnects
    /// included.
    ///
    /// # Errors
    ///
    /// Same as [`connect()`](SseConnection::connect).
    pub async fn connect_with_auth(
        config: SseConfig,
        auth: Arc<dyn Authentication>,
    ) -> TransportResult<Self> {
        Self::connect_inner(config, Some(auth)).await
    }

    async fn connect_inner(
        config: SseConfig,
        auth: Option<Arc<dyn Authentication>>,
    ) -> TransportResult<Self> {
        config.validate().map_err(TransportError::config)?;

        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()
            .map_err(|e| TransportError::config(format!("Failed to build HTTP client: {e}")))?;

        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_channel_capacity);
        let (event_tx, event_rx) = mpsc::channel(config.event_channel_capacity);
        let (state_tx, state_rx) = watch::channel(SseConnectionState::Disconnected);

        tokio::spawn(sse_connection_driver(
            Driver {
                config,
                client,
                auth,
                state_tx,
            },
            cmd_rx,
            event_tx,
        ));

        Ok(Self {
            handle: SseHandle { cmd_tx, state_rx },
            stream: SseStream { rx: event_rx },
        })
    }

    /// Split the connection into a control handle and event stream.
    pub fn split(self) -> (SseHandle, SseStream) {
        (self.handle, self.stream)
    }

    /// Get a reference to the control handle.
    pub fn handle(&self) -> &SseHandle {
        &self.handle
    }
}

impl Stream for SseConnection {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.stream).poll_next(cx)
    }
}

// ---------------------------------------------------------------------------
// SseHandle
// ---------------------------------------------------------------------------

/// Clone-able handle for controlling a running connection.
#[derive(Clone, Debug)]
pub struct SseHandle {
    cmd_tx: mpsc::Sender<SseCommand>,
    state_rx: watch::Receiver<SseConnectionState>,
}

impl SseHandle {
    /// Request a graceful close.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn close(&self) -> TransportResult<()> {
        self.cmd_tx.send(SseCommand::Close).await.map_err(|_| {
            TransportError::connection_closed(Some("SSE background task shut down".to_string()))
        })
    }

    /// Request a reconnection.
    ///
    /// # Errors
    ///
    /// Returns an error if the background task has already shut down.
    pub async fn reconnect(&self, reason: &str) -> TransportResult<()> {
        self.cmd_tx
            .send(SseCommand::Reconnect {
                reason: reason.to_string(),
            })
            .await
            .map_err(|_| {
                TransportError::connection_closed(Some("SSE background task shut down".to_string()))
            })
    }

    /// Current connection state.
    pub fn state(&self) -> SseConnectionState {
        self.state_rx.borrow().clone()
    }

    /// Wait until the state satisfies `predicate` and return it.
    ///
    /// # Errors
    ///
    /// Returns an error if the driver exits without ever reaching a matching
    /// state.
    pub async fn wait_for_state(
        &self,
        mut predicate: impl FnMut(&SseConnectionState) -> bool,
    ) -> TransportResult<SseConnectionState> {
        let mut rx = self.state_rx.clone();
        rx.wait_for(|state| predicate(state))
            .await
            .map(|state| state.clone())
            .map_err(|_| TransportError::connection_closed(Some("state channel closed".into())))
    }

    /// Check whether the background task is still running.
    pub fn is_running(&self) -> bool {
        !self.cmd_tx.is_closed()
    }
}

// ---------------------------------------------------------------------------
// SseStream
// ---------------------------------------------------------------------------

/// Stream of [`StreamEvent`]s from a connection.
///
/// Ends once the driver has closed.
pub struct SseStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl SseStream {
    /// Receive the next event, waiting until one is available.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

impl Stream for SseStream {
    type Item = StreamEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        Pin::new(&mut this.rx).poll_recv(cx)
    }
}

// ---------------------------------------------------------------------------
// Internal: establish a single HTTP connection
// ---------------------------------------------------------------------------

struct Driver {
    config: SseConfig,
    client: reqwest::Client,
    auth: Option<Arc<dyn Authentication>>,
    state_tx: watch::Sender<SseConnectionState>,
}

impl Driver {
    fn set_state(&self, state: SseConnectionState) {
        self.state_tx.send_replace(state);
    }

    /// Open one connection and wrap its body in a [`FrameStream`].
    ///
    /// No `Last-Event-ID` is sent: every connection starts from "now".
    async fn establish(
        &self,
    ) -> TransportResult<FrameStream<impl Stream<Item = TransportResult<Bytes>> + use<>>> {
        let config = &self.config;
        let mut headers = config.headers.clone();
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("text/event-stream"),
        );
        headers.insert(
            http::header::CACHE_CONTROL,
            http::HeaderValue::from_static("no-cache"),
        );

        let mut parts = RequestParts::new(http::Method::GET, config.url.clone(), headers);
        if let Some(auth) = &self.auth {
            auth.authenticate(&mut parts).await?;
        }

        let request = self.client.get(&parts.url).headers(parts.headers);
        let resp = timeout(config.connect_timeout, request.send())
            .await
            .map_err(|_| TransportError::connect_timeout(config.connect_timeout))?
            .map_err(TransportError::Http)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(TransportError::sse_invalid_status(status));
        }

        if let Some(ct) = resp.headers().get(http::header::CONTENT_TYPE) {
            let ct_str = ct.to_str().unwrap_or("");
            if !ct_str.contains("text/event-stream") {
                return Err(TransportError::sse_invalid_content_type(ct_str));
            }
        }

        let body = Box::pin(resp.bytes_stream());
        Ok(FrameStream::new(timed_chunks(body, config.read_timeout)))
    }
}

/// Fail the body with [`TransportError::ReadTimeout`] when no chunk arrives
/// within `read_timeout`. The clock restarts on every chunk, so a frame split
/// across slow chunks is not a timeout.
fn timed_chunks<S>(body: S, read_timeout: Duration) -> impl Stream<Item = TransportResult<Bytes>>
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Unpin,
{
    futures_util::stream::unfold(Some(body), move |body| async move {
        let mut body = body?;
        match timeout(read_timeout, body.next()).await {
            Ok(Some(Ok(chunk))) => Some((Ok(chunk), Some(body))),
            Ok(Some(Err(e))) => Some((Err(TransportError::Http(e)), None)),
            Ok(None) => None,
            Err(_) => Some((Err(TransportError::read_timeout(read_timeout)), None)),
        }
    })
}

fn log_failure(url: &str, err: &TransportError) {
    if err.is_transient() {
        warn!(url = %url, error = %err, "SSE connection interrupted");
    } else {
        error!(url = %url, error = %err, "SSE connection failed");
    }
}

// ---------------------------------------------------------------------------
// Internal: background driver
// ---------------------------------------------------------------------------

/// The long-lived background task that drives the connection.
///
/// Connects, forwards frames to the consumer, and reconnects after the
/// configured delay on any failure. There is no attempt limit.
async fn sse_connection_driver(
    driver: Driver,
    mut cmd_rx: mpsc::Receiver<SseCommand>,
    event_tx: mpsc::Sender<StreamEvent>,
) {
    let url = driver.config.url.clone();
    let mut attempt: u32 = 0;
    let mut ready_sent = false;

    'connection: loop {
        // --- Establish connection ---
        driver.set_state(SseConnectionState::Connecting);
        info!(url = %url, attempt, "SSE connecting");

        let connection = tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(SseCommand::Close) | None => break 'connection,
                Some(SseCommand::Reconnect { reason }) => {
                    debug!(reason = %reason, "SSE reconnect requested while connecting");
                    continue 'connection;
                }
            },
            result = driver.establish() => result,
        };

        match connection {
            Ok(frames) => {
                info!(url = %url, "SSE connection established");
                attempt = 0;
                driver.set_state(SseConnectionState::Streaming);

                if !ready_sent {
                    ready_sent = true;
                    if event_tx.send(StreamEvent::Ready).await.is_err() {
                        info!("SSE consumer dropped, shutting down");
                        break 'connection;
                    }
                }

                // --- Read loop ---
                let mut frames = pin!(frames);
                let err = loop {
                    tokio::select! {
                        biased;

                        cmd = cmd_rx.recv() => match cmd {
                            Some(SseCommand::Close) | None => {
                                info!("SSE connection closing (requested)");
                                break 'connection;
                            }
                            Some(SseCommand::Reconnect { reason }) => {
                                warn!(reason = %reason, "SSE reconnect requested");
                                break None;
                            }
                        },

                        item = frames.next() => match item {
                            Some(Ok(frame)) => {
                                match &frame {
                                    Frame::Heartbeat => trace!("SSE heartbeat"),
                                    Frame::Data { id, payload } => {
                                        debug!(id = %id, bytes = payload.len(), "SSE frame received");
                                    }
                                }
                                if event_tx.send(StreamEvent::Frame(frame)).await.is_err() {
                                    info!("SSE consumer dropped, shutting down");
                                    break 'connection;
                                }
                            }
                            Some(Err(e)) => break Some(e),
                            None => break Some(TransportError::sse_stream_ended()),
                        },
                    }
                };

                if let Some(err) = err {
                    log_failure(&url, &err);
                }
            }
            Err(err) => log_failure(&url, &err),
        }

        // --- Reconnect after delay ---
        let delay = calculate_backoff(driver.config.backoff(), attempt);
        attempt = attempt.saturating_add(1);
        driver.set_state(SseConnectionState::Reconnecting { attempt });
        warn!(
            attempt,
            delay_ms = delay.as_millis() as u64,
            "SSE reconnecting after delay"
        );

        tokio::select! {
            biased;

            cmd = cmd_rx.recv() => match cmd {
                Some(SseCommand::Close) | None => break 'connection,
                Some(SseCommand::Reconnect { .. }) => {}
            },
            () = tokio::time::sleep(delay) => {}
        }
    }

    driver.set_state(SseConnectionState::Closed);
    info!(url = %url, "SSE connection closed");
}
