use serde_json::{Map, Value};

use super::*;

/// A resource of a type registered at runtime without a dedicated struct.
///
/// Produced by [`TypeRegistry::register_raw`](crate::registry::TypeRegistry::register_raw).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawResource {
    pub resource_type: String,
    pub id: String,
    pub data: Map<String, Value>,
}

macro_rules! resources {
    ($($(#[$doc:meta])* $variant:ident($ty:ty) => $tag:literal,)+) => {
        /// Any decoded resource, one variant per resource type.
        #[derive(Debug, Clone, PartialEq)]
        pub enum Resource {
            $($(#[$doc])* $variant($ty),)+
            /// A type registered with
            /// [`register_raw`](crate::registry::TypeRegistry::register_raw).
            Raw(RawResource),
        }

        impl Resource {
            /// The bridge's `type` tag for this resource.
            pub fn resource_type(&self) -> &str {
                match self {
                    $(Self::$variant(_) => $tag,)+
                    Self::Raw(raw) => &raw.resource_type,
                }
            }

            /// The resource id.
            pub fn id(&self) -> &str {
                match self {
                    $(Self::$variant(r) => &r.id,)+
                    Self::Raw(raw) => &raw.id,
                }
            }
        }

        $(
            impl BridgeResource for $ty {
                const TYPE: &'static str = $tag;

                fn id(&self) -> &str {
                    &self.id
                }

                fn into_resource(self) -> Resource {
                    Resource::$variant(self)
                }

                fn from_resource(resource: &Resource) -> Option<&Self> {
                    match resource {
                        Resource::$variant(r) => Some(r),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Resource {
                fn from(resource: $ty) -> Self {
                    Resource::$variant(resource)
                }
            }
        )+

        /// Register every built-in resource type.
        pub(crate) fn register_builtin(registry: &mut crate::registry::TypeRegistry) {
            $(registry.register::<$ty>();)+
        }
    };
}

resources! {
    Light(Light) => "light",
    Scene(Scene) => "scene",
    Room(Room) => "room",
    Zone(Zone) => "zone",
    BridgeHome(BridgeHome) => "bridge_home",
    GroupedLight(GroupedLight) => "grouped_light",
    Device(Device) => "device",
    Bridge(Bridge) => "bridge",
    DevicePower(DevicePower) => "device_power",
    ZigbeeConnectivity(ZigbeeConnectivity) => "zigbee_connectivity",
    ZgpConnectivity(ZgpConnectivity) => "zgp_connectivity",
    Motion(Motion) => "motion",
    Temperature(Temperature) => "temperature",
    LightLevel(LightLevel) => "light_level",
    Button(Button) => "button",
    BehaviorScript(BehaviorScript) => "behavior_script",
    BehaviorInstance(BehaviorInstance) => "behavior_instance",
    GeofenceClient(GeofenceClient) => "geofence_client",
    Geolocation(Geolocation) => "geolocation",
    EntertainmentConfiguration(EntertainmentConfiguration) => "entertainment_configuration",
    Entertainment(Entertainment) => "entertainment",
    Homekit(Homekit) => "homekit",
}

impl Resource {
    /// Borrow as a concrete resource type.
    pub fn downcast_ref<R: BridgeResource>(&self) -> Option<&R> {
        R::from_resource(self)
    }

    /// Display name from the resource metadata, for types that have one.
    pub fn name(&self) -> Option<&str> {
        let metadata = match self {
            Self::Light(r) => r.metadata.as_ref(),
            Self::Scene(r) => r.metadata.as_ref(),
            Self::Room(r) => r.metadata.as_ref(),
            Self::Zone(r) => r.metadata.as_ref(),
            Self::Device(r) => r.metadata.as_ref(),
            Self::GeofenceClient(r) => return r.name.as_deref(),
            Self::BehaviorInstance(r) => return r.metadata.as_ref()?.name.as_deref(),
            Self::EntertainmentConfiguration(r) => return r.metadata.as_ref()?.name.as_deref(),
            _ => None,
        };
        metadata?.name.as_deref()
    }

    /// The owning device, for service resources.
    pub fn owner(&self) -> Option<&ResourceIdentifier> {
        match self {
            Self::Light(r) => r.owner.as_ref(),
            Self::GroupedLight(r) => r.owner.as_ref(),
            Self::Bridge(r) => r.owner.as_ref(),
            Self::DevicePower(r) => r.owner.as_ref(),
            Self::ZigbeeConnectivity(r) => r.owner.as_ref(),
            Self::ZgpConnectivity(r) => r.owner.as_ref(),
            Self::Motion(r) => r.owner.as_ref(),
            Self::Temperature(r) => r.owner.as_ref(),
            Self::LightLevel(r) => r.owner.as_ref(),
            Self::Button(r) => r.owner.as_ref(),
            Self::Entertainment(r) => r.owner.as_ref(),
            _ => None,
        }
    }

    /// Reference to this resource.
    pub fn identifier(&self) -> ResourceIdentifier {
        ResourceIdentifier {
            rid: self.id().to_string(),
            rtype: self.resource_type().to_string(),
        }
    }
}
