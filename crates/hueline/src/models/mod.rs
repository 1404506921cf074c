//! Resource data model.
//!
//! One struct per CLIP v2 resource type. Every struct is lenient: all fields
//! default when absent, because update events only carry the fields that
//! changed and newer bridge firmware adds fields freely.

mod behavior;
mod device;
mod entertainment;
mod group;
mod light;
pub(crate) mod resource;
mod scene;
mod sensor;
mod system;

use std::fmt::Debug;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

pub use self::{
    behavior::{BehaviorInstance, BehaviorScript, Dependee},
    device::{
        BatteryState, Bridge, ConnectivityStatus, Device, DevicePower, PowerState, ProductData,
        TimeZone, ZgpConnectivity, ZigbeeConnectivity,
    },
    entertainment::{Entertainment, EntertainmentConfiguration, StreamProxy},
    group::{BridgeHome, GroupedLight, Room, Zone},
    light::{
        Color, ColorTemperature, Dynamics, DynamicsUpdate, Effects, Gamut, Gradient, Light,
        LightUpdate, MirekSchema, MirekUpdate,
    },
    resource::{RawResource, Resource},
    scene::{LightAction, Palette, PaletteColor, PaletteTemperature, Scene, SceneAction},
    sensor::{
        Button, ButtonMetadata, ButtonReport, LightLevel, LightLevelReport, Motion, MotionReport,
        Temperature, TemperatureReport,
    },
    system::{GeofenceClient, Geolocation, Homekit},
};

/// A resource type the bridge serves under `/clip/v2/resource/{TYPE}`.
pub trait BridgeResource:
    DeserializeOwned + Serialize + Clone + Debug + Send + Sync + 'static
{
    /// The `type` tag the bridge uses for this resource.
    const TYPE: &'static str;

    /// The resource id.
    fn id(&self) -> &str;

    /// Wrap into the [`Resource`] enum.
    fn into_resource(self) -> Resource;

    /// Borrow out of the [`Resource`] enum if the variant matches.
    fn from_resource(resource: &Resource) -> Option<&Self>;
}

/// Reference to another resource, as used in `owner`, `children` and
/// `services` lists and in mutation responses.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResourceIdentifier {
    pub rid: String,
    pub rtype: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct On {
    pub on: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Dimming {
    /// Brightness in percent.
    pub brightness: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_dim_level: Option<f64>,
}

/// CIE xy color coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Xy {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ColorPoint {
    pub xy: Xy,
}

/// Human-facing metadata shared by most resources.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Metadata {
    pub name: Option<String>,
    pub archetype: Option<Archetype>,
    pub image: Option<ResourceIdentifier>,
}

/// Metadata of resources that only carry a name.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NameMetadata {
    pub name: Option<String>,
}

/// Product shape of a light, room or device.
///
/// Archetypes this crate does not know are kept verbatim in
/// [`Archetype::Other`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Archetype {
    BridgeV2,
    UnknownArchetype,
    ClassicBulb,
    SultanBulb,
    FloodBulb,
    SpotBulb,
    CandleBulb,
    LusterBulb,
    PendantRound,
    PendantLong,
    CeilingRound,
    CeilingSquare,
    FloorShade,
    FloorLantern,
    TableShade,
    RecessedCeiling,
    RecessedFloor,
    SingleSpot,
    DoubleSpot,
    TableWash,
    WallLantern,
    WallShade,
    FlexibleLamp,
    GroundSpot,
    WallSpot,
    Plug,
    HueGo,
    HueLightstrip,
    HueIris,
    HueBloom,
    Bollard,
    WallWasher,
    HuePlay,
    VintageBulb,
    ChristmasTree,
    HueCentris,
    HueLightstripTv,
    HueTube,
    HueSigne,
    Other(String),
}

const ARCHETYPES: &[(&str, Archetype)] = &[
    ("bridge_v2", Archetype::BridgeV2),
    ("unknown_archetype", Archetype::UnknownArchetype),
    ("classic_bulb", Archetype::ClassicBulb),
    ("sultan_bulb", Archetype::SultanBulb),
    ("flood_bulb", Archetype::FloodBulb),
    ("spot_bulb", Archetype::SpotBulb),
    ("candle_bulb", Archetype::CandleBulb),
    ("luster_bulb", Archetype::LusterBulb),
    ("pendant_round", Archetype::PendantRound),
    ("pendant_long", Archetype::PendantLong),
    ("ceiling_round", Archetype::CeilingRound),
    ("ceiling_square", Archetype::CeilingSquare),
    ("floor_shade", Archetype::FloorShade),
    ("floor_lantern", Archetype::FloorLantern),
    ("table_shade", Archetype::TableShade),
    ("recessed_ceiling", Archetype::RecessedCeiling),
    ("recessed_floor", Archetype::RecessedFloor),
    ("single_spot", Archetype::SingleSpot),
    ("double_spot", Archetype::DoubleSpot),
    ("table_wash", Archetype::TableWash),
    ("wall_lantern", Archetype::WallLantern),
    ("wall_shade", Archetype::WallShade),
    ("flexible_lamp", Archetype::FlexibleLamp),
    ("ground_spot", Archetype::GroundSpot),
    ("wall_spot", Archetype::WallSpot),
    ("plug", Archetype::Plug),
    ("hue_go", Archetype::HueGo),
    ("hue_lightstrip", Archetype::HueLightstrip),
    ("hue_iris", Archetype::HueIris),
    ("hue_bloom", Archetype::HueBloom),
    ("bollard", Archetype::Bollard),
    ("wall_washer", Archetype::WallWasher),
    ("hue_play", Archetype::HuePlay),
    ("vintage_bulb", Archetype::VintageBulb),
    ("christmas_tree", Archetype::ChristmasTree),
    ("hue_centris", Archetype::HueCentris),
    ("hue_lightstrip_tv", Archetype::HueLightstripTv),
    ("hue_tube", Archetype::HueTube),
    ("hue_signe", Archetype::HueSigne),
];

impl Archetype {
    /// The wire name of the archetype.
    pub fn as_str(&self) -> &str {
        if let Self::Other(name) = self {
            return name;
        }
        ARCHETYPES
            .iter()
            .find(|(_, archetype)| archetype == self)
            .map_or("unknown_archetype", |(name, _)| *name)
    }
}

impl From<String> for Archetype {
    fn from(name: String) -> Self {
        ARCHETYPES
            .iter()
            .find(|(known, _)| *known == name)
            .map_or(Self::Other(name), |(_, archetype)| archetype.clone())
    }
}

impl From<Archetype> for String {
    fn from(archetype: Archetype) -> Self {
        archetype.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_archetype_roundtrips_known_and_unknown_names() {
        let known: Archetype = serde_json::from_value(json!("sultan_bulb")).expect("known");
        assert_eq!(known, Archetype::SultanBulb);
        assert_eq!(serde_json::to_value(&known).expect("ser"), json!("sultan_bulb"));

        let unknown: Archetype = serde_json::from_value(json!("hue_future_lamp")).expect("other");
        assert_eq!(unknown, Archetype::Other("hue_future_lamp".into()));
        assert_eq!(unknown.as_str(), "hue_future_lamp");
    }

    #[test]
    fn test_metadata_is_lenient() {
        let metadata: Metadata = serde_json::from_value(json!({"name": "Desk"})).expect("meta");
        assert_eq!(metadata.name.as_deref(), Some("Desk"));
        assert!(metadata.archetype.is_none());
    }
}
