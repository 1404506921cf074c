//! The live event loop.
//!
//! A [`Router`] owns one event stream connection and one [`Dispatcher`]. It
//! runs until shut down:
//!
//! ```text
//! SseStream ──► Ready ──► fetch snapshots ─► AliasTable ─► on_ready hook
//!          └──► Frame ──► decode ─► Dispatcher::dispatch ─► TaskCache
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use hueline::{
//!     BridgeClient, BridgeConfig, ChangeKind, EventContext, Resource, Router,
//! };
//!
//! # async fn example() -> hueline::Result<()> {
//! let client = BridgeClient::new(
//!     BridgeConfig::new("192.168.1.2", "my-app-key").accept_invalid_certs(true),
//! )?;
//!
//! let handle = Router::builder(client)
//!     .alias("3f4ac4e9-d67a-4dbd-8a16-5ea7e373f281", "desk")
//!     .on("light", ChangeKind::Update, |ctx: EventContext, light: Resource| async move {
//!         let is_desk = ctx.alias("desk").map(Resource::id) == Some(light.id());
//!         Ok(is_desk)
//!     })
//!     .build()?
//!     .spawn()
//!     .await?;
//!
//! handle.wait_ready().await?;
//! handle.shutdown().await?;
//! # Ok(())
//! # }
//! ```

use std::{collections::HashMap, fmt, future::Future, sync::Arc};

use futures_util::future::BoxFuture;
use hueline_transport::{
    SseConfig, TransportError,
    sse::{Frame, SseConnection, SseConnectionState, SseHandle, SseStream, StreamEvent},
};
use tokio::{sync::watch, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::{
    alias::AliasTable,
    client::BridgeClient,
    dispatch::{
        BoxError, Dispatcher, EventContext, HandlerRegistry, HandlerResult, TaskKey, TaskSpawner,
    },
    error::{Error, Result},
    events::ChangeKind,
    models::Resource,
    registry::TypeRegistry,
};

/// Tunables of a [`Router`].
#[derive(Clone, Debug)]
pub struct RouterConfig {
    /// Upper bound on tracked handler tasks; the oldest is cancelled when a
    /// new one would exceed it.
    pub max_tasks: usize,
    /// Resource types fetched at startup to resolve aliases.
    pub alias_resource_types: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_tasks: 64,
            alias_resource_types: vec!["light".to_string()],
        }
    }
}

impl RouterConfig {
    #[must_use]
    pub fn max_tasks(mut self, max_tasks: usize) -> Self {
        self.max_tasks = max_tasks;
        self
    }

    #[must_use]
    pub fn alias_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.alias_resource_types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.max_tasks == 0 {
            return Err("max_tasks must be > 0".to_string());
        }
        if self.alias_resource_types.iter().any(|t| t.trim().is_empty()) {
            return Err("alias resource types cannot be empty strings".to_string());
        }
        Ok(())
    }
}

/// Passed to the `on_ready` hook once aliases are resolved.
#[derive(Clone, Debug)]
pub struct ReadyContext {
    client: BridgeClient,
    aliases: Arc<AliasTable>,
    spawner: TaskSpawner,
}

impl ReadyContext {
    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub fn aliases(&self) -> &Arc<AliasTable> {
        &self.aliases
    }

    pub fn alias(&self, name: &str) -> Option<&Resource> {
        self.aliases.get(name)
    }

    /// Run `future` as a tracked background task.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskKey
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.spawner.spawn(name, future)
    }
}

type ReadyHook =
    Arc<dyn Fn(ReadyContext) -> BoxFuture<'static, Result<(), BoxError>> + Send + Sync>;

/// Builder for a [`Router`].
pub struct RouterBuilder {
    client: BridgeClient,
    handlers: HandlerRegistry,
    on_ready: Option<ReadyHook>,
    alias_map: HashMap<String, String>,
    config: RouterConfig,
    registry: Option<Arc<TypeRegistry>>,
    stream_config: Option<SseConfig>,
    cancel: Option<CancellationToken>,
}

impl fmt::Debug for RouterBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouterBuilder")
            .field("handlers", &self.handlers)
            .field("aliases", &self.alias_map.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl RouterBuilder {
    /// Register a handler for `resource_type` events of `change_kind`.
    #[must_use]
    pub fn on<F, Fut>(
        mut self,
        resource_type: impl Into<String>,
        change_kind: ChangeKind,
        handler: F,
    ) -> Self
    where
        F: Fn(EventContext, Resource) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.handlers.on(resource_type, change_kind, handler);
        self
    }

    /// Replace all handlers.
    #[must_use]
    pub fn handlers(mut self, handlers: HandlerRegistry) -> Self {
        self.handlers = handlers;
        self
    }

    /// Run `hook` after aliases are resolved on the first connection.
    #[must_use]
    pub fn on_ready<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(ReadyContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), BoxError>> + Send + 'static,
    {
        self.on_ready = Some(Arc::new(move |ctx| Box::pin(hook(ctx))));
        self
    }

    /// Name the resource with id `id`.
    #[must_use]
    pub fn alias(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.alias_map.insert(id.into(), name.into());
        self
    }

    /// Add several `(id, name)` aliases.
    #[must_use]
    pub fn aliases<I, K, V>(mut self, aliases: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.alias_map
            .extend(aliases.into_iter().map(|(id, name)| (id.into(), name.into())));
        self
    }

    #[must_use]
    pub fn alias_resource_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.alias_resource_types(types);
        self
    }

    #[must_use]
    pub fn max_tasks(mut self, max_tasks: usize) -> Self {
        self.config.max_tasks = max_tasks;
        self
    }

    #[must_use]
    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    /// Decode events with `registry` instead of the client's.
    #[must_use]
    pub fn registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Override the event stream settings derived from the client.
    #[must_use]
    pub fn stream_config(mut self, config: SseConfig) -> Self {
        self.stream_config = Some(config);
        self
    }

    /// Stop the router when `token` is cancelled.
    #[must_use]
    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// # Errors
    ///
    /// Returns [`Error::Config`] if the router or stream settings are invalid.
    pub fn build(self) -> Result<Router> {
        self.config.validate().map_err(Error::config)?;
        let stream_config = self
            .stream_config
            .unwrap_or_else(|| self.client.event_stream_config());
        stream_config.validate().map_err(Error::config)?;

        Ok(Router {
            registry: self
                .registry
                .unwrap_or_else(|| Arc::clone(self.client.registry())),
            client: self.client,
            handlers: self.handlers,
            on_ready: self.on_ready,
            alias_map: self.alias_map,
            config: self.config,
            stream_config,
            cancel: self.cancel.unwrap_or_default(),
        })
    }
}

/// A configured, not yet running event loop.
pub struct Router {
    client: BridgeClient,
    registry: Arc<TypeRegistry>,
    handlers: HandlerRegistry,
    on_ready: Option<ReadyHook>,
    alias_map: HashMap<String, String>,
    config: RouterConfig,
    stream_config: SseConfig,
    cancel: CancellationToken,
}

impl fmt::Debug for Router {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Router")
            .field("url", &self.stream_config.url)
            .field("handlers", &self.handlers)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Router {
    pub fn builder(client: BridgeClient) -> RouterBuilder {
        RouterBuilder {
            client,
            handlers: HandlerRegistry::new(),
            on_ready: None,
            alias_map: HashMap::new(),
            config: RouterConfig::default(),
            registry: None,
            stream_config: None,
            cancel: None,
        }
    }

    /// Run in the current task until shut down through the cancellation
    /// token.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream settings are rejected or the loop
    /// panics.
    pub async fn start(self) -> Result<()> {
        self.spawn().await?.join().await
    }

    /// Connect and run the loop on a background task.
    ///
    /// # Errors
    ///
    /// Returns an error if the stream settings are rejected. Connection
    /// failures are retried in the background and never returned.
    pub async fn spawn(self) -> Result<RouterHandle> {
        let connection =
            SseConnection::connect_with_auth(self.stream_config.clone(), self.client.auth()).await?;
        let (sse, stream) = connection.split();
        let (aliases_tx, aliases_rx) = watch::channel(None);

        info!(
            url = %self.stream_config.url,
            handlers = self.handlers.len(),
            max_tasks = self.config.max_tasks,
            aliases = self.alias_map.len(),
            "router starting"
        );

        let dispatcher = Dispatcher::new(
            self.client.clone(),
            self.registry,
            self.handlers,
            self.config.max_tasks,
        );
        let event_loop = EventLoop {
            client: self.client,
            dispatcher,
            sse: sse.clone(),
            stream,
            cancel: self.cancel.clone(),
            on_ready: self.on_ready,
            alias_map: self.alias_map,
            alias_types: self.config.alias_resource_types,
            aliases_tx,
        };
        let task = tokio::spawn(event_loop.run());

        Ok(RouterHandle {
            cancel: self.cancel,
            sse,
            aliases: aliases_rx,
            task,
        })
    }
}

/// Control surface of a running [`Router`].
///
/// Dropping the handle leaves the router running; call
/// [`shutdown`](Self::shutdown) or cancel its token to stop it.
#[derive(Debug)]
pub struct RouterHandle {
    cancel: CancellationToken,
    sse: SseHandle,
    aliases: watch::Receiver<Option<Arc<AliasTable>>>,
    task: JoinHandle<()>,
}

impl RouterHandle {
    /// The resolved alias table; empty until the stream first connects.
    pub fn aliases(&self) -> Arc<AliasTable> {
        self.aliases.borrow().clone().unwrap_or_default()
    }

    /// Wait for the first connection and alias resolution.
    ///
    /// # Errors
    ///
    /// Returns an error if the router stops before it got ready.
    pub async fn wait_ready(&self) -> Result<Arc<AliasTable>> {
        let mut rx = self.aliases.clone();
        let ready = rx.wait_for(Option::is_some).await.map_err(|_| {
            TransportError::connection_closed(Some("router stopped before ready".to_string()))
        })?;
        Ok(ready.clone().unwrap_or_default())
    }

    /// Current state of the event stream connection.
    pub fn state(&self) -> SseConnectionState {
        self.sse.state()
    }

    /// The event stream connection handle.
    pub fn connection(&self) -> &SseHandle {
        &self.sse
    }

    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Stop the loop, close the connection, cancel every handler task and
    /// wait for all of it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Join`] if the loop panicked.
    pub async fn shutdown(self) -> Result<()> {
        self.cancel.cancel();
        self.join().await
    }

    /// Wait for the loop to stop on its own.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Join`] if the loop panicked.
    pub async fn join(self) -> Result<()> {
        self.task.await?;
        Ok(())
    }
}

struct EventLoop {
    client: BridgeClient,
    dispatcher: Dispatcher,
    sse: SseHandle,
    stream: SseStream,
    cancel: CancellationToken,
    on_ready: Option<ReadyHook>,
    alias_map: HashMap<String, String>,
    alias_types: Vec<String>,
    aliases_tx: watch::Sender<Option<Arc<AliasTable>>>,
}

impl EventLoop {
    async fn run(mut self) {
        loop {
            tokio::select! {
                biased;

                () = self.cancel.cancelled() => {
                    info!("router shutdown requested");
                    break;
                }

                Some(task) = self.dispatcher.next_spawned() => {
                    self.dispatcher.adopt(task);
                }

                event = self.stream.next_event() => match event {
                    Some(StreamEvent::Ready) => {
                        let cancel = self.cancel.clone();
                        tokio::select! {
                            biased;
                            () = cancel.cancelled() => {
                                info!("router shutdown requested during startup");
                                break;
                            }
                            () = self.ready() => {}
                        }
                    }
                    Some(StreamEvent::Frame(frame)) => self.frame(&frame),
                    None => {
                        warn!("event stream ended, router stopping");
                        break;
                    }
                },
            }
        }

        if let Err(err) = self.sse.close().await {
            debug!(error = %err, "event stream already closed");
        }
        self.dispatcher.shutdown().await;
        info!("router stopped");
    }

    async fn ready(&mut self) {
        let aliases =
            Arc::new(resolve_aliases(&self.client, &self.alias_types, &self.alias_map).await);
        self.dispatcher.set_aliases(Arc::clone(&aliases));
        self.aliases_tx.send_replace(Some(Arc::clone(&aliases)));
        info!(aliases = aliases.len(), "router ready");

        if let Some(hook) = &self.on_ready {
            let ctx = ReadyContext {
                client: self.client.clone(),
                aliases,
                spawner: self.dispatcher.spawner().clone(),
            };
            if let Err(err) = hook(ctx).await {
                warn!(error = %err, "on_ready hook failed");
            }
        }
    }

    fn frame(&mut self, frame: &Frame) {
        match frame.id() {
            None => trace!("heartbeat"),
            Some(id) => {
                let tasks = self.dispatcher.dispatch_frame(frame);
                trace!(event_id = id, tasks = tasks.len(), "frame dispatched");
            }
        }
    }
}

/// Fetch the snapshot of every alias resource type and bind the aliases.
///
/// A failed fetch leaves the aliases of that type unbound.
async fn resolve_aliases(
    client: &BridgeClient,
    resource_types: &[String],
    alias_map: &HashMap<String, String>,
) -> AliasTable {
    if alias_map.is_empty() {
        debug!("no aliases configured, skipping snapshot");
        return AliasTable::default();
    }

    let mut snapshot = Vec::new();
    for resource_type in resource_types {
        match client.fetch_snapshot(resource_type).await {
            Ok(resources) => {
                debug!(resource_type = %resource_type, count = resources.len(), "fetched snapshot");
                snapshot.extend(resources);
            }
            Err(err) => {
                warn!(resource_type = %resource_type, error = %err, "snapshot fetch failed");
            }
        }
    }
    AliasTable::resolve(&snapshot, alias_map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::BridgeConfig;

    fn client() -> BridgeClient {
        BridgeClient::new(BridgeConfig::new("127.0.0.1:9", "key")).expect("client")
    }

    #[test]
    fn test_config_defaults_and_validation() {
        let config = RouterConfig::default();
        assert_eq!(config.max_tasks, 64);
        assert_eq!(config.alias_resource_types, ["light"]);
        assert!(config.validate().is_ok());

        assert!(RouterConfig::default().max_tasks(0).validate().is_err());
        assert!(
            RouterConfig::default()
                .alias_resource_types([" "])
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_build_rejects_invalid_settings() {
        assert!(matches!(
            Router::builder(client()).max_tasks(0).build(),
            Err(Error::Config { .. })
        ));
        assert!(matches!(
            Router::builder(client())
                .stream_config(SseConfig::new(""))
                .build(),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_builder_collects_handlers_and_aliases() {
        let router = Router::builder(client())
            .on("light", ChangeKind::Update, |_ctx: EventContext, _r: Resource| async {
                Ok(true)
            })
            .on("button", ChangeKind::Update, |_ctx: EventContext, _r: Resource| async {
                Ok(false)
            })
            .alias("l1", "desk")
            .aliases([("l2", "hall"), ("l3", "porch")])
            .alias_resource_types(["light", "grouped_light"])
            .build()
            .expect("router");

        assert_eq!(router.handlers.len(), 2);
        assert!(router.handlers.contains("button", ChangeKind::Update));
        assert_eq!(router.alias_map.len(), 3);
        assert_eq!(router.config.alias_resource_types, ["light", "grouped_light"]);
        assert_eq!(
            router.stream_config.url,
            "https://127.0.0.1:9/eventstream/clip/v2"
        );
    }
}
