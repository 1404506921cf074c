//! Event dispatch.
//!
//! The [`Dispatcher`] turns each [`ResourceEvent`] into at most one handler
//! task and keeps the running tasks in a bounded [`TaskCache`]. When the
//! cache is full the least recently touched task is aborted to make room.
//!
//! ```text
//! ResourceEvent ─► TypeRegistry::decode_typed ─► HandlerRegistry lookup
//!                                                     │
//!                                   tokio::spawn(handler(ctx, resource))
//!                                                     │
//!                      TaskCache::insert ─► evict + abort oldest over capacity
//! ```

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures_util::future::BoxFuture;
use hueline_transport::sse::Frame;
use hueline_util::BoundedCache;
use tokio::{sync::mpsc, task::JoinHandle, time::Instant};
use tracing::{debug, trace, warn};

use crate::{
    alias::AliasTable,
    client::BridgeClient,
    events::{ChangeKind, ResourceEvent, decode_frame},
    models::Resource,
    registry::TypeRegistry,
};

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// What a handler returns. The `bool` is logged and otherwise ignored.
pub type HandlerResult = Result<bool, BoxError>;

/// A handler for one `(resource type, change kind)` pair.
///
/// Implemented for every `Fn(EventContext, Resource) -> impl Future<Output =
/// HandlerResult>` closure.
pub trait EventHandler: Send + Sync + 'static {
    fn call(&self, ctx: EventContext, resource: Resource) -> BoxFuture<'static, HandlerResult>;
}

impl<F, Fut> EventHandler for F
where
    F: Fn(EventContext, Resource) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = HandlerResult> + Send + 'static,
{
    fn call(&self, ctx: EventContext, resource: Resource) -> BoxFuture<'static, HandlerResult> {
        Box::pin(self(ctx, resource))
    }
}

// ---------------------------------------------------------------------------
// Handler registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct HandlerKey {
    pub resource_type: String,
    pub change_kind: ChangeKind,
}

impl HandlerKey {
    pub fn new(resource_type: impl Into<String>, change_kind: ChangeKind) -> Self {
        Self {
            resource_type: resource_type.into(),
            change_kind,
        }
    }

    /// Conventional handler name, e.g. `on_light_update`.
    pub fn name(&self) -> String {
        format!("on_{}_{}", self.resource_type, self.change_kind)
    }
}

/// Handlers keyed by resource type and change kind.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn EventHandler>>,
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.handlers.keys().map(HandlerKey::name).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("handlers", &names)
            .finish()
    }
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler`, replacing any previous one for the same key.
    pub fn on<F, Fut>(
        &mut self,
        resource_type: impl Into<String>,
        change_kind: ChangeKind,
        handler: F,
    ) -> &mut Self
    where
        F: Fn(EventContext, Resource) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        self.insert(resource_type, change_kind, Arc::new(handler))
    }

    /// Register an already shared handler.
    pub fn insert(
        &mut self,
        resource_type: impl Into<String>,
        change_kind: ChangeKind,
        handler: Arc<dyn EventHandler>,
    ) -> &mut Self {
        self.handlers
            .insert(HandlerKey::new(resource_type, change_kind), handler);
        self
    }

    /// Registered keys, sorted by handler name.
    pub fn keys(&self) -> Vec<&HandlerKey> {
        let mut keys: Vec<_> = self.handlers.keys().collect();
        keys.sort_by_key(|key| key.name());
        keys
    }

    pub fn get(&self, resource_type: &str, change_kind: ChangeKind) -> Option<Arc<dyn EventHandler>> {
        self.handlers
            .get(&HandlerKey::new(resource_type, change_kind))
            .cloned()
    }

    pub fn contains(&self, resource_type: &str, change_kind: ChangeKind) -> bool {
        self.handlers
            .contains_key(&HandlerKey::new(resource_type, change_kind))
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// Identity of a dispatched task. Keys increase monotonically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey(u64);

impl TaskKey {
    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// A running (or finished) handler invocation.
pub struct DispatchTask {
    key: TaskKey,
    event_id: String,
    handler: String,
    started_at: Instant,
    handle: JoinHandle<()>,
}

impl fmt::Debug for DispatchTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTask")
            .field("key", &self.key)
            .field("event_id", &self.event_id)
            .field("handler", &self.handler)
            .field("finished", &self.is_finished())
            .finish()
    }
}

impl DispatchTask {
    pub fn key(&self) -> TaskKey {
        self.key
    }

    /// Cursor of the frame that triggered the task; empty for tasks spawned
    /// from a context.
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn handler(&self) -> &str {
        &self.handler
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Abort the task at its next await point. Idempotent.
    pub fn cancel(&self) {
        self.handle.abort();
    }

    async fn join(self) {
        if let Err(err) = self.handle.await
            && err.is_panic()
        {
            warn!(handler = %self.handler, task = %self.key, "handler panicked");
        }
    }
}

/// Bounded set of dispatch tasks; eviction aborts the evicted task.
pub type TaskCache = BoundedCache<TaskKey, DispatchTask>;

/// Create a task cache holding at most `max_tasks` tasks.
pub fn task_cache(max_tasks: usize) -> TaskCache {
    BoundedCache::with_eviction(max_tasks, |key: &TaskKey, task: &DispatchTask| {
        if !task.is_finished() {
            debug!(
                task = %key,
                handler = %task.handler,
                event_id = %task.event_id,
                elapsed_ms = task.elapsed().as_millis() as u64,
                "task evicted, cancelling"
            );
        }
        task.cancel();
    })
}

/// Spawns tracked background tasks on behalf of handlers and hooks.
///
/// Spawned tasks go through the same cache as dispatched handlers, so they
/// are subject to eviction and cancelled on shutdown.
#[derive(Clone)]
pub struct TaskSpawner {
    next_key: Arc<AtomicU64>,
    tx: mpsc::UnboundedSender<DispatchTask>,
}

impl fmt::Debug for TaskSpawner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskSpawner")
            .field("next_key", &self.next_key.load(Ordering::Relaxed))
            .finish()
    }
}

impl TaskSpawner {
    fn next_key(&self) -> TaskKey {
        TaskKey(self.next_key.fetch_add(1, Ordering::Relaxed))
    }

    fn start<F>(&self, handler: String, event_id: String, future: F) -> DispatchTask
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let key = self.next_key();
        let (name, id) = (handler.clone(), event_id.clone());
        let handle = tokio::spawn(async move {
            match future.await {
                Ok(result) => debug!(handler = %name, event_id = %id, result, "handler finished"),
                Err(err) => warn!(handler = %name, event_id = %id, error = %err, "handler failed"),
            }
        });
        DispatchTask {
            key,
            event_id,
            handler,
            started_at: Instant::now(),
            handle,
        }
    }

    /// Run `future` as a tracked task named `name`.
    ///
    /// If the dispatcher is already gone the task is aborted immediately.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskKey
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        let task = self.start(name.into(), String::new(), future);
        let key = task.key;
        if let Err(mpsc::error::SendError(task)) = self.tx.send(task) {
            task.cancel();
        }
        key
    }
}

// ---------------------------------------------------------------------------
// Handler context
// ---------------------------------------------------------------------------

/// Everything a handler gets besides the decoded resource.
#[derive(Clone, Debug)]
pub struct EventContext {
    event_id: String,
    resource_type: String,
    change_kind: ChangeKind,
    client: BridgeClient,
    aliases: Arc<AliasTable>,
    spawner: TaskSpawner,
}

impl EventContext {
    pub fn event_id(&self) -> &str {
        &self.event_id
    }

    pub fn resource_type(&self) -> &str {
        &self.resource_type
    }

    pub fn change_kind(&self) -> ChangeKind {
        self.change_kind
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub fn aliases(&self) -> &Arc<AliasTable> {
        &self.aliases
    }

    /// Shortcut for `aliases().get(name)`.
    pub fn alias(&self, name: &str) -> Option<&Resource> {
        self.aliases.get(name)
    }

    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    /// Run `future` as a tracked background task.
    pub fn spawn<F>(&self, name: impl Into<String>, future: F) -> TaskKey
    where
        F: Future<Output = HandlerResult> + Send + 'static,
    {
        self.spawner.spawn(name, future)
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

/// Routes events to handlers and owns the task cache.
pub struct Dispatcher {
    registry: Arc<TypeRegistry>,
    handlers: HandlerRegistry,
    tasks: TaskCache,
    client: BridgeClient,
    aliases: Arc<AliasTable>,
    spawner: TaskSpawner,
    spawned: mpsc::UnboundedReceiver<DispatchTask>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("handlers", &self.handlers)
            .field("tasks", &self.tasks.len())
            .field("max_tasks", &self.tasks.capacity())
            .finish()
    }
}

impl Dispatcher {
    /// Create a dispatcher holding at most `max_tasks` tasks (at least one).
    pub fn new(
        client: BridgeClient,
        registry: Arc<TypeRegistry>,
        handlers: HandlerRegistry,
        max_tasks: usize,
    ) -> Self {
        let (tx, spawned) = mpsc::unbounded_channel();
        Self {
            registry,
            handlers,
            tasks: task_cache(max_tasks),
            client,
            aliases: Arc::new(AliasTable::default()),
            spawner: TaskSpawner {
                next_key: Arc::new(AtomicU64::new(0)),
                tx,
            },
            spawned,
        }
    }

    pub fn set_aliases(&mut self, aliases: Arc<AliasTable>) {
        self.aliases = aliases;
    }

    pub fn aliases(&self) -> &Arc<AliasTable> {
        &self.aliases
    }

    pub fn client(&self) -> &BridgeClient {
        &self.client
    }

    pub fn spawner(&self) -> &TaskSpawner {
        &self.spawner
    }

    pub fn tasks(&self) -> &TaskCache {
        &self.tasks
    }

    /// Dispatch one event.
    ///
    /// Returns the key of the spawned task, or `None` if the event was
    /// dropped (unknown type, undecodable payload or no handler).
    pub fn dispatch(&mut self, event: ResourceEvent) -> Option<TaskKey> {
        let resource = self
            .registry
            .decode_typed(&event.resource_type, &event.payload)?;
        let Some(handler) = self.handlers.get(&event.resource_type, event.change_kind) else {
            trace!(
                resource_type = %event.resource_type,
                change_kind = %event.change_kind,
                "no handler registered"
            );
            return None;
        };

        let name = HandlerKey::new(event.resource_type.as_str(), event.change_kind).name();
        let ctx = EventContext {
            event_id: event.event_id.clone(),
            resource_type: event.resource_type,
            change_kind: event.change_kind,
            client: self.client.clone(),
            aliases: Arc::clone(&self.aliases),
            spawner: self.spawner.clone(),
        };

        self.adopt_spawned();
        self.prune_finished();

        let task = self
            .spawner
            .start(name, event.event_id, handler.call(ctx, resource));
        let key = task.key;
        debug!(
            task = %key,
            handler = %task.handler,
            event_id = %task.event_id,
            "dispatched"
        );
        self.tasks.insert(key, task);
        Some(key)
    }

    /// Decode and dispatch every event of a frame.
    pub fn dispatch_frame(&mut self, frame: &Frame) -> Vec<TaskKey> {
        decode_frame(frame)
            .into_iter()
            .filter_map(|event| self.dispatch(event))
            .collect()
    }

    /// Wait for the next task spawned through a [`TaskSpawner`].
    pub async fn next_spawned(&mut self) -> Option<DispatchTask> {
        self.spawned.recv().await
    }

    /// Track a task spawned through a [`TaskSpawner`].
    pub fn adopt(&mut self, task: DispatchTask) {
        self.prune_finished();
        trace!(task = %task.key, handler = %task.handler, "tracking spawned task");
        self.tasks.insert(task.key, task);
    }

    fn adopt_spawned(&mut self) {
        while let Ok(task) = self.spawned.try_recv() {
            self.tasks.insert(task.key, task);
        }
    }

    /// Drop tasks that completed on their own.
    pub fn prune_finished(&mut self) {
        self.tasks.retain(|_, task| !task.is_finished());
    }

    /// Cancel every outstanding task and wait for all of them to stop.
    pub async fn shutdown(&mut self) {
        self.adopt_spawned();
        let tasks = self.tasks.drain();
        debug!(tasks = tasks.len(), "cancelling outstanding tasks");
        for (_, task) in &tasks {
            task.cancel();
        }
        for (_, task) in tasks {
            task.join().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Mutex, atomic::AtomicUsize};

    use tokio::sync::oneshot;

    use super::*;
    use crate::{client::BridgeConfig, events::decode};

    const LIGHT_FRAME: &[u8] =
        br#"[{"type":"update","data":[{"type":"light","id":"abc","on":{"on":true}}]}]"#;

    fn client() -> BridgeClient {
        BridgeClient::new(BridgeConfig::new("127.0.0.1:9", "test-key")).expect("client")
    }

    fn dispatcher(handlers: HandlerRegistry, max_tasks: usize) -> Dispatcher {
        Dispatcher::new(
            client(),
            Arc::new(TypeRegistry::builtin()),
            handlers,
            max_tasks,
        )
    }

    fn light_event(id: &str) -> ResourceEvent {
        decode(id, LIGHT_FRAME).remove(0)
    }

    #[test]
    fn test_handler_names() {
        assert_eq!(
            HandlerKey::new("light", ChangeKind::Update).name(),
            "on_light_update"
        );
        assert_eq!(
            HandlerKey::new("grouped_light", ChangeKind::Add).name(),
            "on_grouped_light_add"
        );
    }

    #[tokio::test]
    async fn test_light_update_spawns_one_task() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, move |ctx: EventContext, resource: Resource| {
            let seen = Arc::clone(&seen);
            async move {
                assert_eq!(ctx.event_id(), "1:0");
                assert_eq!(resource.id(), "abc");
                seen.fetch_add(1, Ordering::SeqCst);
                Ok(true)
            }
        });

        let mut dispatcher = dispatcher(handlers, 8);
        let frame = Frame::data("1:0", LIGHT_FRAME);
        let keys = dispatcher.dispatch_frame(&frame);
        assert_eq!(keys.len(), 1);
        assert_eq!(dispatcher.tasks().len(), 1);
        let task = dispatcher.tasks().peek(&keys[0]).expect("task");
        assert_eq!(task.handler(), "on_light_update");
        assert_eq!(task.event_id(), "1:0");

        tokio::time::timeout(Duration::from_secs(2), async {
            while calls.load(Ordering::SeqCst) == 0 {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("handler ran");
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        dispatcher.shutdown().await;
        assert!(dispatcher.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_no_handler_spawns_nothing() {
        let mut dispatcher = dispatcher(HandlerRegistry::new(), 8);
        assert!(dispatcher.dispatch(light_event("1:0")).is_none());
        assert!(dispatcher.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_type_is_dropped() {
        let mut handlers = HandlerRegistry::new();
        handlers.on("smart_scene", ChangeKind::Update, |_ctx: EventContext, _r: Resource| async {
            Ok(true)
        });
        let mut dispatcher = dispatcher(handlers, 8);
        let events = decode(
            "3:0",
            br#"[{"type":"update","data":[{"type":"smart_scene","id":"s"}]}]"#,
        );
        assert_eq!(events.len(), 1);
        assert!(dispatcher.dispatch(events[0].clone()).is_none());
    }

    struct DropSignal(Option<oneshot::Sender<()>>);

    impl Drop for DropSignal {
        fn drop(&mut self) {
            if let Some(tx) = self.0.take() {
                let _ = tx.send(());
            }
        }
    }

    #[tokio::test]
    async fn test_eviction_cancels_oldest_task() {
        let (signals, mut dropped): (Vec<_>, Vec<_>) =
            (0..3).map(|_| oneshot::channel::<()>()).unzip();
        let signals = Arc::new(Mutex::new(signals.into_iter()));

        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, move |_ctx: EventContext, _r: Resource| {
            let guard = DropSignal(signals.lock().expect("lock").next());
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
                Ok(true)
            }
        });

        let mut dispatcher = dispatcher(handlers, 2);
        let first = dispatcher.dispatch(light_event("1:0")).expect("first");
        let second = dispatcher.dispatch(light_event("2:0")).expect("second");
        let third = dispatcher.dispatch(light_event("3:0")).expect("third");

        assert_eq!(dispatcher.tasks().len(), 2);
        assert!(!dispatcher.tasks().contains_key(&first));
        assert!(dispatcher.tasks().contains_key(&second));
        assert!(dispatcher.tasks().contains_key(&third));

        tokio::time::timeout(Duration::from_secs(2), &mut dropped[0])
            .await
            .expect("first task was not cancelled")
            .expect("signal");
        assert!(dropped[1].try_recv().is_err());
        assert!(dropped[2].try_recv().is_err());
        assert!(!dispatcher.tasks().peek(&second).expect("second").is_finished());

        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_evicted_task_is_aborted() {
        let (dropped_tx, dropped_rx) = oneshot::channel::<()>();
        let slot = Arc::new(Mutex::new(Some(dropped_tx)));

        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, move |_ctx: EventContext, _r: Resource| {
            let guard = DropSignal(slot.lock().expect("lock").take());
            async move {
                let _guard = guard;
                std::future::pending::<()>().await;
                Ok(true)
            }
        });

        let mut dispatcher = dispatcher(handlers, 1);
        dispatcher.dispatch(light_event("1:0")).expect("first");
        dispatcher.dispatch(light_event("2:0")).expect("second");

        tokio::time::timeout(Duration::from_secs(2), dropped_rx)
            .await
            .expect("first task was not cancelled")
            .expect("signal");
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_errors_are_contained() {
        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, |_ctx: EventContext, _r: Resource| async {
            Err::<bool, BoxError>("bridge said no".into())
        });
        handlers.on("light", ChangeKind::Delete, |_ctx: EventContext, _r: Resource| async {
            panic!("handler bug");
        });

        let mut dispatcher = dispatcher(handlers, 4);
        dispatcher.dispatch(light_event("1:0")).expect("update");
        let mut delete = light_event("2:0");
        delete.change_kind = ChangeKind::Delete;
        dispatcher.dispatch(delete).expect("delete");

        dispatcher.shutdown().await;
        assert!(dispatcher.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_finished_tasks_are_pruned() {
        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, |_ctx: EventContext, _r: Resource| async {
            Ok(false)
        });

        let mut dispatcher = dispatcher(handlers, 4);
        let first = dispatcher.dispatch(light_event("1:0")).expect("first");
        tokio::time::timeout(Duration::from_secs(2), async {
            while !dispatcher.tasks().peek(&first).is_some_and(DispatchTask::is_finished) {
                tokio::task::yield_now().await;
            }
        })
        .await
        .expect("handler finished");

        let second = dispatcher.dispatch(light_event("2:0")).expect("second");
        assert!(!dispatcher.tasks().contains_key(&first));
        assert!(dispatcher.tasks().contains_key(&second));
        dispatcher.shutdown().await;
    }

    #[tokio::test]
    async fn test_context_spawn_is_tracked() {
        let mut handlers = HandlerRegistry::new();
        handlers.on("light", ChangeKind::Update, |ctx: EventContext, _r: Resource| async move {
            ctx.spawn("blink", async {
                std::future::pending::<()>().await;
                Ok(true)
            });
            Ok(true)
        });

        let mut dispatcher = dispatcher(handlers, 4);
        dispatcher.dispatch(light_event("1:0")).expect("dispatch");

        let spawned = tokio::time::timeout(Duration::from_secs(2), dispatcher.next_spawned())
            .await
            .expect("spawned in time")
            .expect("spawned task");
        assert_eq!(spawned.handler(), "blink");
        assert_eq!(spawned.event_id(), "");
        let key = spawned.key();
        dispatcher.adopt(spawned);
        assert!(dispatcher.tasks().contains_key(&key));

        dispatcher.shutdown().await;
        assert!(dispatcher.tasks().is_empty());
    }

    #[tokio::test]
    async fn test_spawner_after_dispatcher_dropped() {
        let dispatcher = dispatcher(HandlerRegistry::new(), 1);
        let spawner = dispatcher.spawner().clone();
        drop(dispatcher);
        let first = spawner.spawn("orphan", async { Ok(true) });
        let second = spawner.spawn("orphan", async { Ok(true) });
        assert!(second > first);
    }
}
