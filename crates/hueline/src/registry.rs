//! Resource type registry.
//!
//! Maps the bridge's `type` tags to decoders producing [`Resource`] values.
//! Built once, extended before the router starts, then shared read-only by
//! `Arc`.

use std::{collections::HashMap, fmt};

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::models::{BridgeResource, RawResource, Resource, resource::register_builtin};

#[derive(Clone, Copy)]
enum Decoder {
    Typed(fn(&Value) -> Result<Resource, serde_json::Error>),
    Raw,
}

fn decode_as<R: BridgeResource>(value: &Value) -> Result<Resource, serde_json::Error> {
    R::deserialize(value).map(R::into_resource)
}

/// Registry of resource decoders keyed by type tag.
#[derive(Clone, Default)]
pub struct TypeRegistry {
    decoders: HashMap<String, Decoder>,
}

impl fmt::Debug for TypeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<_> = self.types().collect();
        types.sort_unstable();
        f.debug_struct("TypeRegistry").field("types", &types).finish()
    }
}

impl TypeRegistry {
    /// A registry with no types.
    pub fn empty() -> Self {
        Self::default()
    }

    /// A registry with every built-in resource type.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        register_builtin(&mut registry);
        registry
    }

    /// Register `R` under [`R::TYPE`](BridgeResource::TYPE), replacing any
    /// previous decoder for that tag.
    pub fn register<R: BridgeResource>(&mut self) -> &mut Self {
        self.decoders
            .insert(R::TYPE.to_string(), Decoder::Typed(decode_as::<R>));
        self
    }

    /// Accept `resource_type` and keep its records untyped as
    /// [`Resource::Raw`].
    pub fn register_raw(&mut self, resource_type: impl Into<String>) -> &mut Self {
        self.decoders.insert(resource_type.into(), Decoder::Raw);
        self
    }

    /// Whether `resource_type` has a decoder.
    pub fn contains(&self, resource_type: &str) -> bool {
        self.decoders.contains_key(resource_type)
    }

    /// Registered type tags, in no particular order.
    pub fn types(&self) -> impl Iterator<Item = &str> {
        self.decoders.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.decoders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.decoders.is_empty()
    }

    /// Decode `payload` as `resource_type`.
    ///
    /// Returns `None` for unknown tags and for payloads that do not match the
    /// registered shape; neither is an error.
    pub fn decode_typed(
        &self,
        resource_type: &str,
        payload: &Map<String, Value>,
    ) -> Option<Resource> {
        let Some(decoder) = self.decoders.get(resource_type) else {
            debug!(resource_type, "no decoder registered, dropping");
            return None;
        };

        match decoder {
            Decoder::Typed(decode) => match decode(&Value::Object(payload.clone())) {
                Ok(resource) => Some(resource),
                Err(err) => {
                    warn!(resource_type, error = %err, "resource payload did not decode");
                    None
                }
            },
            Decoder::Raw => Some(Resource::Raw(RawResource {
                resource_type: resource_type.to_string(),
                id: payload
                    .get("id")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                data: payload.clone(),
            })),
        }
    }

    /// Decode a record that carries its own `type` tag.
    pub fn decode_value(&self, value: &Value) -> Option<Resource> {
        let record = value.as_object()?;
        let resource_type = record.get("type")?.as_str()?;
        self.decode_typed(resource_type, record)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::models::{Button, Light};

    fn object(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            other => panic!("not an object: {other}"),
        }
    }

    #[test]
    fn test_builtin_covers_every_resource_type() {
        let registry = TypeRegistry::builtin();
        for tag in [
            "light",
            "scene",
            "room",
            "zone",
            "bridge_home",
            "grouped_light",
            "device",
            "bridge",
            "device_power",
            "zigbee_connectivity",
            "zgp_connectivity",
            "motion",
            "temperature",
            "light_level",
            "button",
            "behavior_script",
            "behavior_instance",
            "geofence_client",
            "geolocation",
            "entertainment_configuration",
            "entertainment",
            "homekit",
        ] {
            assert!(registry.contains(tag), "missing {tag}");
        }
        assert_eq!(registry.len(), 22);
    }

    #[test]
    fn test_decode_known_type() {
        let registry = TypeRegistry::builtin();
        let payload = object(json!({"type": "light", "id": "abc", "on": {"on": true}}));
        let resource = registry.decode_typed("light", &payload).expect("decoded");
        let light = resource.downcast_ref::<Light>().expect("light");
        assert_eq!(light.id, "abc");
        assert_eq!(light.is_on(), Some(true));
    }

    #[test]
    fn test_unknown_type_is_none() {
        let registry = TypeRegistry::builtin();
        let payload = object(json!({"type": "smart_scene", "id": "s"}));
        assert!(registry.decode_typed("smart_scene", &payload).is_none());
        assert!(TypeRegistry::empty().decode_typed("light", &payload).is_none());
    }

    #[test]
    fn test_shape_mismatch_is_none() {
        let registry = TypeRegistry::builtin();
        let payload = object(json!({"id": "b", "button": {"last_event": 42}}));
        assert!(registry.decode_typed(Button::TYPE, &payload).is_none());
    }

    #[test]
    fn test_register_raw_and_decode_value() {
        let mut registry = TypeRegistry::empty();
        registry.register_raw("smart_scene").register::<Light>();

        let resource = registry
            .decode_value(&json!({"type": "smart_scene", "id": "s1", "state": "active"}))
            .expect("raw");
        match resource {
            Resource::Raw(raw) => {
                assert_eq!(raw.id, "s1");
                assert_eq!(raw.data["state"], "active");
            }
            other => panic!("unexpected resource: {other:?}"),
        }

        assert!(registry.decode_value(&json!({"id": "no-type"})).is_none());
        assert!(registry.decode_value(&json!(["not", "an", "object"])).is_none());
    }
}
