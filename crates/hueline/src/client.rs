//! Typed request builder for the bridge's CLIP v2 endpoints.

use std::{sync::Arc, time::Duration};

use hueline_transport::{
    HttpClient, HttpConfig, SseConfig,
    auth::{ApiKeyAuth, Authentication},
};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::{
    error::{Error, Result},
    models::{
        BridgeResource, Device, GroupedLight, Light, LightUpdate, Resource, ResourceIdentifier,
        Room, Scene, Zone,
    },
    registry::TypeRegistry,
};

const RESOURCE_PATH: &str = "/clip/v2/resource";
const EVENT_STREAM_PATH: &str = "/eventstream/clip/v2";

/// Connection settings for one bridge.
#[derive(Clone, Debug)]
pub struct BridgeConfig {
    /// Bridge address: a host (`192.168.1.2`) or a full base URL.
    pub address: String,
    /// Application key issued by the bridge's link button flow.
    pub application_key: String,
    /// Timeout of a single request.
    pub timeout: Duration,
    /// Timeout for establishing a connection.
    pub connect_timeout: Duration,
    /// Accept the bridge's self-signed certificate.
    pub accept_invalid_certs: bool,
}

impl BridgeConfig {
    #[must_use]
    pub fn new(address: impl Into<String>, application_key: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            application_key: application_key.into(),
            timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(5),
            accept_invalid_certs: false,
        }
    }

    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    /// Base URL; bare hosts get `https://`.
    pub fn base_url(&self) -> String {
        let address = self.address.trim_end_matches('/');
        if address.contains("://") {
            address.to_string()
        } else {
            format!("https://{address}")
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error message string if any field has an invalid value.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.address.trim().is_empty() {
            return Err("Bridge address cannot be empty".to_string());
        }
        if self.application_key.is_empty() {
            return Err("Application key cannot be empty".to_string());
        }
        Ok(())
    }
}

/// Client for one bridge.
///
/// Cheap to clone; handlers receive a clone through their event context.
#[derive(Clone, Debug)]
pub struct BridgeClient {
    http: HttpClient,
    registry: Arc<TypeRegistry>,
}

impl BridgeClient {
    /// Build a client decoding with the built-in type registry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] or a transport configuration error if the
    /// settings are invalid.
    pub fn new(config: BridgeConfig) -> Result<Self> {
        config.validate().map_err(Error::config)?;

        let http_config = HttpConfig::builder(config.base_url())
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .accept_invalid_certs(config.accept_invalid_certs)
            .build()?;
        let http = HttpClient::new(http_config, ApiKeyAuth::application_key(config.application_key))?;

        Ok(Self::from_parts(http, Arc::new(TypeRegistry::builtin())))
    }

    /// Assemble a client from an HTTP client and a registry.
    pub fn from_parts(http: HttpClient, registry: Arc<TypeRegistry>) -> Self {
        Self { http, registry }
    }

    /// Replace the registry used to decode untyped responses.
    #[must_use]
    pub fn with_type_registry(mut self, registry: Arc<TypeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// The authenticator shared with the event stream.
    pub fn auth(&self) -> Arc<dyn Authentication> {
        self.http.auth()
    }

    /// Settings for the bridge's event stream, sharing TLS and headers with
    /// this client.
    pub fn event_stream_config(&self) -> SseConfig {
        self.http.event_stream_config(EVENT_STREAM_PATH)
    }

    fn collection_path(resource_type: &str) -> String {
        format!("{RESOURCE_PATH}/{resource_type}")
    }

    fn item_path(resource_type: &str, id: &str) -> String {
        format!("{RESOURCE_PATH}/{resource_type}/{id}")
    }

    fn decode_all(&self, records: Vec<Value>, fallback_type: Option<&str>) -> Vec<Resource> {
        let mut resources = Vec::with_capacity(records.len());
        for record in records {
            let Value::Object(record) = record else {
                debug!("snapshot record is not an object, skipping");
                continue;
            };
            let Some(resource_type) = record
                .get("type")
                .and_then(Value::as_str)
                .or(fallback_type)
            else {
                debug!("snapshot record has no type tag, skipping");
                continue;
            };
            if let Some(resource) = self.registry.decode_typed(resource_type, &record) {
                resources.push(resource);
            }
        }
        resources
    }

    // ------------------------------------------------------------------
    // Untyped snapshots
    // ------------------------------------------------------------------

    /// Every resource of one type, decoded through the registry. Records of
    /// unknown or undecodable types are skipped.
    pub async fn fetch_snapshot(&self, resource_type: &str) -> Result<Vec<Resource>> {
        let records = self
            .http
            .get::<Value>(&Self::collection_path(resource_type))
            .await?
            .into_data();
        Ok(self.decode_all(records, Some(resource_type)))
    }

    /// Every resource on the bridge.
    pub async fn get_resources(&self) -> Result<Vec<Resource>> {
        let records = self.http.get::<Value>(RESOURCE_PATH).await?.into_data();
        Ok(self.decode_all(records, None))
    }

    // ------------------------------------------------------------------
    // Typed CRUD
    // ------------------------------------------------------------------

    pub async fn list<R: BridgeResource>(&self) -> Result<Vec<R>> {
        Ok(self
            .http
            .get::<R>(&Self::collection_path(R::TYPE))
            .await?
            .into_data())
    }

    /// One resource by id; `None` if the bridge returned an empty list.
    pub async fn get<R: BridgeResource>(&self, id: &str) -> Result<Option<R>> {
        Ok(self
            .http
            .get::<R>(&Self::item_path(R::TYPE, id))
            .await?
            .into_data()
            .into_iter()
            .next())
    }

    pub async fn update<R: BridgeResource, B: Serialize + ?Sized>(
        &self,
        id: &str,
        body: &B,
    ) -> Result<Vec<ResourceIdentifier>> {
        Ok(self
            .http
            .put(&Self::item_path(R::TYPE, id), body)
            .await?
            .into_data())
    }

    pub async fn create<R: BridgeResource, B: Serialize + ?Sized>(
        &self,
        body: &B,
    ) -> Result<Vec<ResourceIdentifier>> {
        Ok(self
            .http
            .post(&Self::collection_path(R::TYPE), body)
            .await?
            .into_data())
    }

    pub async fn delete<R: BridgeResource>(&self, id: &str) -> Result<Vec<ResourceIdentifier>> {
        Ok(self
            .http
            .delete(&Self::item_path(R::TYPE, id))
            .await?
            .into_data())
    }

    // ------------------------------------------------------------------
    // Convenience
    // ------------------------------------------------------------------

    pub async fn get_lights(&self) -> Result<Vec<Light>> {
        self.list::<Light>().await
    }

    pub async fn get_light(&self, id: &str) -> Result<Option<Light>> {
        self.get::<Light>(id).await
    }

    pub async fn set_light(&self, id: &str, update: &LightUpdate) -> Result<Vec<ResourceIdentifier>> {
        self.update::<Light, _>(id, update).await
    }

    pub async fn get_scenes(&self) -> Result<Vec<Scene>> {
        self.list::<Scene>().await
    }

    pub async fn get_rooms(&self) -> Result<Vec<Room>> {
        self.list::<Room>().await
    }

    pub async fn get_zones(&self) -> Result<Vec<Zone>> {
        self.list::<Zone>().await
    }

    pub async fn get_devices(&self) -> Result<Vec<Device>> {
        self.list::<Device>().await
    }

    pub async fn get_grouped_lights(&self) -> Result<Vec<GroupedLight>> {
        self.list::<GroupedLight>().await
    }

    pub async fn set_grouped_light(
        &self,
        id: &str,
        update: &LightUpdate,
    ) -> Result<Vec<ResourceIdentifier>> {
        self.update::<GroupedLight, _>(id, update).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_from_host_or_url() {
        assert_eq!(
            BridgeConfig::new("192.168.1.2", "k").base_url(),
            "https://192.168.1.2"
        );
        assert_eq!(
            BridgeConfig::new("http://127.0.0.1:8080/", "k").base_url(),
            "http://127.0.0.1:8080"
        );
    }

    #[test]
    fn test_config_validation() {
        assert!(BridgeConfig::new("", "key").validate().is_err());
        assert!(BridgeConfig::new("bridge.local", "").validate().is_err());
        assert!(BridgeConfig::new("bridge.local", "key").validate().is_ok());
        assert!(matches!(
            BridgeClient::new(BridgeConfig::new("bridge.local", "")),
            Err(Error::Config { .. })
        ));
    }

    #[test]
    fn test_event_stream_config() {
        let client = BridgeClient::new(
            BridgeConfig::new("bridge.local", "key").accept_invalid_certs(true),
        )
        .expect("client");
        let config = client.event_stream_config();
        assert_eq!(config.url, "https://bridge.local/eventstream/clip/v2");
        assert!(config.accept_invalid_certs);
    }

    #[test]
    fn test_paths() {
        assert_eq!(
            BridgeClient::item_path(Light::TYPE, "abc"),
            "/clip/v2/resource/light/abc"
        );
        assert_eq!(
            BridgeClient::collection_path("grouped_light"),
            "/clip/v2/resource/grouped_light"
        );
    }
}
