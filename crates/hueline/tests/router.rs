//! End-to-end tests for the router against a mock bridge.
//!
//! The mock serves the CLIP resource endpoints and the event stream from one
//! hyper server, so the whole path is exercised: snapshot fetch, alias
//! resolution, stream supervision, decoding and handler dispatch.

use std::{
    convert::Infallible,
    net::SocketAddr,
    sync::{
        Arc, Mutex,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use futures_util::{StreamExt, stream};
use http_body_util::{BodyExt, Full, StreamBody, combinators::BoxBody};
use hueline::{
    AliasTable, BridgeClient, BridgeConfig, ChangeKind, EventContext, Resource, Router,
    SseConfig, SseConnectionState,
};
use hyper::{
    Request, Response,
    body::{Bytes, Incoming},
    server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::{
    net::TcpListener,
    sync::{mpsc, oneshot},
    time::timeout,
};
use tokio_util::sync::CancellationToken;

const LIGHT_SNAPSHOT: &str = r#"{"errors":[],"data":[
    {"type":"light","id":"l1","metadata":{"name":"Desk","archetype":"sultan_bulb"},"on":{"on":false}},
    {"type":"light","id":"l2","metadata":{"name":"Hall","archetype":"classic_bulb"},"on":{"on":true}}
]}"#;

const NOT_FOUND: &str = r#"{"errors":[{"description":"resource not found"}],"data":[]}"#;

const L1_UPDATE: &str = concat!(
    "id: 1:0\n",
    r#"data: [{"type":"update","creationtime":"2024-05-01T10:00:00Z","data":[{"type":"light","id":"l1","on":{"on":true}}]}]"#,
    "\n\n",
);

const L2_UPDATE: &str = concat!(
    "id: 2:0\n",
    r#"data: [{"type":"update","data":[{"type":"light","id":"l2","on":{"on":false}}]}]"#,
    "\n\n",
);

const BUTTON_THEN_LIGHT: &str = concat!(
    ": hi\n\n",
    "id: 1:0\n",
    r#"data: [{"type":"update","data":[{"type":"button","id":"b1","button":{"last_event":"short_release"}}]}]"#,
    "\n\n",
    ": hi\n\n",
    "id: 2:0\n",
    r#"data: [{"type":"update","data":[{"type":"light","id":"l2","on":{"on":false}}]}]"#,
    "\n\n",
);

// ---------------------------------------------------------------------------
// Mock bridge
// ---------------------------------------------------------------------------

/// What the mock bridge observed.
#[derive(Default)]
struct Seen {
    streams: AtomicUsize,
    snapshots: Mutex<Vec<String>>,
}

impl Seen {
    fn streams(&self) -> usize {
        self.streams.load(Ordering::SeqCst)
    }

    fn snapshots(&self) -> Vec<String> {
        self.snapshots.lock().expect("lock").clone()
    }
}

fn json(status: u16, body: &'static str) -> Response<BoxBody<Bytes, Infallible>> {
    Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(body)).boxed())
        .expect("build response")
}

fn event_stream(body: &'static str) -> Response<BoxBody<Bytes, Infallible>> {
    let chunk = Ok::<_, Infallible>(hyper::body::Frame::data(Bytes::from(body)));
    Response::builder()
        .status(200)
        .header("content-type", "text/event-stream")
        .body(BodyExt::boxed(StreamBody::new(stream::iter([chunk]).chain(stream::pending()))))
        .expect("build response")
}

/// Start a mock bridge. The n-th event stream connection gets the n-th body
/// (the last one repeats); each body is held open after it is sent.
async fn start_bridge(streams: Vec<&'static str>) -> (SocketAddr, Arc<Seen>) {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind mock bridge");
    let addr = listener.local_addr().expect("local addr");
    let seen = Arc::new(Seen::default());
    let server_seen = Arc::clone(&seen);
    let streams = Arc::new(streams);

    tokio::spawn(async move {
        loop {
            let Ok((socket, _)) = listener.accept().await else {
                break;
            };
            let seen = Arc::clone(&server_seen);
            let streams = Arc::clone(&streams);
            tokio::spawn(async move {
                let _ = http1::Builder::new()
                    .serve_connection(
                        TokioIo::new(socket),
                        service_fn(move |req: Request<Incoming>| {
                            let path = req.uri().path().to_string();
                            let response = if path == "/eventstream/clip/v2" {
                                let index = seen.streams.fetch_add(1, Ordering::SeqCst);
                                event_stream(streams[index.min(streams.len() - 1)])
                            } else {
                                seen.snapshots.lock().expect("lock").push(path.clone());
                                match path.as_str() {
                                    "/clip/v2/resource/light" => json(200, LIGHT_SNAPSHOT),
                                    _ => json(404, NOT_FOUND),
                                }
                            };
                            async move { Ok::<_, Infallible>(response) }
                        }),
                    )
                    .await;
            });
        }
    });

    (addr, seen)
}

fn client(addr: SocketAddr) -> BridgeClient {
    BridgeClient::new(BridgeConfig::new(format!("http://{addr}"), "test-key")).expect("client")
}

fn stream_config(client: &BridgeClient) -> SseConfig {
    client
        .event_stream_config()
        .reconnect_initial_delay(Duration::from_millis(200))
}

async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("timeout")
        .expect("channel open")
}

// ---------------------------------------------------------------------------
// Startup
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_aliases_resolve_before_first_frame() {
    let (addr, seen) = start_bridge(vec![L1_UPDATE]).await;
    let client = client(addr);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let (ready_tx, mut ready_rx) = mpsc::unbounded_channel();

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client))
        .alias("l1", "desk")
        .alias("missing", "ghost")
        .on_ready(move |ctx| {
            let ready_tx = ready_tx.clone();
            async move {
                let names: Vec<String> =
                    ctx.aliases().names().into_iter().map(String::from).collect();
                let _ = ready_tx.send(names);
                Ok(())
            }
        })
        .on("light", ChangeKind::Update, move |ctx: EventContext, light: Resource| {
            let tx = tx.clone();
            async move {
                let desk = ctx.alias("desk").map(|r| r.id().to_string());
                let _ = tx.send((ctx.event_id().to_string(), light.id().to_string(), desk));
                Ok(true)
            }
        })
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    let aliases: Arc<AliasTable> = timeout(Duration::from_secs(5), handle.wait_ready())
        .await
        .expect("timeout")
        .expect("ready");
    assert_eq!(aliases.names(), ["desk"]);
    assert_eq!(
        aliases
            .get_as::<hueline::Light>("desk")
            .and_then(hueline::Light::name),
        Some("Desk")
    );
    assert_eq!(recv(&mut ready_rx).await, ["desk"]);

    let (event_id, light_id, desk) = recv(&mut rx).await;
    assert_eq!(event_id, "1:0");
    assert_eq!(light_id, "l1");
    assert_eq!(desk.as_deref(), Some("l1"));

    assert_eq!(seen.snapshots(), ["/clip/v2/resource/light"]);
    assert_eq!(handle.aliases().len(), 1);
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_no_aliases_skips_snapshot() {
    let (addr, seen) = start_bridge(vec![BUTTON_THEN_LIGHT]).await;
    let client = client(addr);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client))
        .on("light", ChangeKind::Update, move |ctx: EventContext, _light: Resource| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(ctx.event_id().to_string());
                Ok(true)
            }
        })
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    let aliases = timeout(Duration::from_secs(5), handle.wait_ready())
        .await
        .expect("timeout")
        .expect("ready");
    assert!(aliases.is_empty());

    // Heartbeats and the button update have no handler; the light update is
    // the first thing that reaches one.
    assert_eq!(recv(&mut rx).await, "2:0");
    assert!(seen.snapshots().is_empty());
    handle.shutdown().await.expect("shutdown");
}

#[tokio::test]
async fn test_snapshot_failure_is_not_fatal() {
    let (addr, seen) = start_bridge(vec![L1_UPDATE]).await;
    let client = client(addr);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client))
        .alias("r1", "kitchen")
        .alias_resource_types(["room"])
        .on("light", ChangeKind::Update, move |_ctx: EventContext, light: Resource| {
            let tx = tx.clone();
            async move {
                let _ = tx.send(light.id().to_string());
                Ok(true)
            }
        })
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    let aliases = timeout(Duration::from_secs(5), handle.wait_ready())
        .await
        .expect("timeout")
        .expect("ready");
    assert!(aliases.is_empty());
    assert_eq!(recv(&mut rx).await, "l1");
    assert_eq!(seen.snapshots(), ["/clip/v2/resource/room"]);
    handle.shutdown().await.expect("shutdown");
}

// ---------------------------------------------------------------------------
// Recovery
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_read_timeout_reconnects_and_resumes() {
    let (addr, seen) = start_bridge(vec![L1_UPDATE, L2_UPDATE]).await;
    let client = client(addr);
    let (tx, mut rx) = mpsc::unbounded_channel();

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client).read_timeout(Duration::from_millis(300)))
        .on("light", ChangeKind::Update, move |ctx: EventContext, light: Resource| {
            let tx = tx.clone();
            async move {
                let _ = tx.send((ctx.event_id().to_string(), light.id().to_string()));
                Ok(true)
            }
        })
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    assert_eq!(recv(&mut rx).await, ("1:0".to_string(), "l1".to_string()));

    // The first connection goes silent; the read timeout recycles it.
    let state = timeout(
        Duration::from_secs(5),
        handle
            .connection()
            .wait_for_state(|state| matches!(state, SseConnectionState::Reconnecting { .. })),
    )
    .await
    .expect("timeout")
    .expect("state");
    assert!(matches!(state, SseConnectionState::Reconnecting { .. }));

    assert_eq!(recv(&mut rx).await, ("2:0".to_string(), "l2".to_string()));
    assert!(seen.streams() >= 2);
    handle.shutdown().await.expect("shutdown");
}

// ---------------------------------------------------------------------------
// Shutdown
// ---------------------------------------------------------------------------

/// Signals when dropped, i.e. when the task owning it is cancelled.
struct DropSignal(Option<oneshot::Sender<()>>);

impl Drop for DropSignal {
    fn drop(&mut self) {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
    }
}

#[tokio::test]
async fn test_shutdown_cancels_running_handlers() {
    let (addr, _seen) = start_bridge(vec![L1_UPDATE]).await;
    let client = client(addr);
    let (started_tx, mut started_rx) = mpsc::unbounded_channel();
    let (dropped_tx, dropped_rx) = oneshot::channel();
    let dropped_tx = Arc::new(Mutex::new(Some(dropped_tx)));

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client))
        .on("light", ChangeKind::Update, move |_ctx: EventContext, _light: Resource| {
            let guard = DropSignal(dropped_tx.lock().expect("lock").take());
            let started_tx = started_tx.clone();
            async move {
                let _guard = guard;
                let _ = started_tx.send(());
                std::future::pending::<()>().await;
                Ok(true)
            }
        })
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    recv(&mut started_rx).await;
    let connection = handle.connection().clone();
    timeout(Duration::from_secs(5), handle.shutdown())
        .await
        .expect("timeout")
        .expect("shutdown");

    timeout(Duration::from_secs(2), dropped_rx)
        .await
        .expect("handler was not cancelled")
        .expect("signal");
    let state = timeout(
        Duration::from_secs(2),
        connection.wait_for_state(SseConnectionState::is_closed),
    )
    .await
    .expect("timeout")
    .expect("state");
    assert_eq!(state, SseConnectionState::Closed);
}

#[tokio::test]
async fn test_cancellation_token_stops_router() {
    let (addr, _seen) = start_bridge(vec![": hi\n\n"]).await;
    let client = client(addr);
    let token = CancellationToken::new();

    let handle = Router::builder(client.clone())
        .stream_config(stream_config(&client))
        .cancellation_token(token.clone())
        .build()
        .expect("router")
        .spawn()
        .await
        .expect("spawn");

    timeout(Duration::from_secs(5), handle.wait_ready())
        .await
        .expect("timeout")
        .expect("ready");
    token.cancel();
    timeout(Duration::from_secs(5), handle.join())
        .await
        .expect("timeout")
        .expect("join");
}
