use serde::{Deserialize, Serialize};

use super::{ColorPoint, Dimming, Metadata, MirekUpdate, On, ResourceIdentifier};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Scene {
    pub id: String,
    pub id_v1: Option<String>,
    pub metadata: Option<Metadata>,
    /// The room or zone the scene belongs to.
    pub group: Option<ResourceIdentifier>,
    pub actions: Vec<SceneAction>,
    pub palette: Option<Palette>,
    pub speed: Option<f64>,
    pub auto_dynamic: Option<bool>,
}

/// The state a scene applies to one light.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneAction {
    pub target: ResourceIdentifier,
    #[serde(default)]
    pub action: LightAction,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightAction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<On>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorPoint>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<MirekUpdate>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    pub color: Vec<PaletteColor>,
    pub dimming: Vec<Dimming>,
    pub color_temperature: Vec<PaletteTemperature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteColor {
    pub color: ColorPoint,
    pub dimming: Dimming,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaletteTemperature {
    pub color_temperature: MirekUpdate,
    pub dimming: Dimming,
}
