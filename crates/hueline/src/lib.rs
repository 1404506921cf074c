#![deny(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![doc = include_str!("../README.md")]

pub mod alias;
pub mod client;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod models;
pub mod registry;
pub mod router;

pub use hueline_transport as transport;
pub use hueline_transport::{SseConfig, sse::SseConnectionState};

pub use self::{
    alias::AliasTable,
    client::{BridgeClient, BridgeConfig},
    dispatch::{
        BoxError, DispatchTask, Dispatcher, EventContext, HandlerRegistry, HandlerResult,
        TaskCache, TaskKey,
    },
    error::{Error, Result},
    events::{ChangeKind, ResourceEvent},
    models::{BridgeResource, Light, LightUpdate, Resource, ResourceIdentifier},
    registry::TypeRegistry,
    router::{ReadyContext, Router, RouterBuilder, RouterConfig, RouterHandle},
};
