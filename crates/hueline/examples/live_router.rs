//! Live Router Example
//!
//! Connects to a bridge, names a few lights and logs every light, motion and
//! button change until Ctrl-C.
//!
//! Run with:
//!
//! ```text
//! HUE_BRIDGE=192.168.1.2 HUE_APP_KEY=... RUST_LOG=hueline=debug,info \
//!     cargo run -p hueline --example live_router
//! ```
//!
//! Optional `HUE_ALIASES` is a comma separated list of `id=name` pairs.

use hueline::{
    BridgeClient, BridgeConfig, ChangeKind, EventContext, Light, Resource, Router,
    models::Button,
};
use tokio_util::sync::CancellationToken;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_aliases(raw: &str) -> Vec<(String, String)> {
    raw.split(',')
        .filter_map(|pair| pair.split_once('='))
        .map(|(id, name)| (id.trim().to_string(), name.trim().to_string()))
        .filter(|(id, name)| !id.is_empty() && !name.is_empty())
        .collect()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let bridge = std::env::var("HUE_BRIDGE")?;
    let key = std::env::var("HUE_APP_KEY")?;
    let aliases = parse_aliases(&std::env::var("HUE_ALIASES").unwrap_or_default());

    let client = BridgeClient::new(BridgeConfig::new(bridge, key).accept_invalid_certs(true))?;
    let token = CancellationToken::new();

    let handle = Router::builder(client)
        .aliases(aliases)
        .cancellation_token(token.clone())
        .on_ready(|ctx| async move {
            for name in ctx.aliases().names() {
                info!(alias = name, "alias bound");
            }
            let lights = ctx.client().get_lights().await?;
            info!(lights = lights.len(), "bridge ready");
            Ok(())
        })
        .on("light", ChangeKind::Update, |ctx: EventContext, resource: Resource| async move {
            if let Some(light) = resource.downcast_ref::<Light>() {
                info!(
                    event_id = ctx.event_id(),
                    light = %light.id,
                    on = ?light.is_on(),
                    brightness = ?light.dimming.as_ref().map(|d| d.brightness),
                    "light changed"
                );
            }
            Ok(true)
        })
        .on("motion", ChangeKind::Update, |ctx: EventContext, resource: Resource| async move {
            info!(event_id = ctx.event_id(), sensor = resource.id(), "motion");
            Ok(true)
        })
        .on("button", ChangeKind::Update, |_ctx: EventContext, resource: Resource| async move {
            let event = resource
                .downcast_ref::<Button>()
                .and_then(Button::last_event)
                .unwrap_or("unknown");
            info!(button = resource.id(), event, "button");
            Ok(true)
        })
        .build()?
        .spawn()
        .await?;

    tokio::signal::ctrl_c().await?;
    info!("shutting down");
    token.cancel();
    handle.join().await?;
    Ok(())
}
