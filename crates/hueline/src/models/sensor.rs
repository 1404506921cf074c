use serde::{Deserialize, Serialize};

use super::ResourceIdentifier;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Motion {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub enabled: Option<bool>,
    pub motion: Option<MotionReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MotionReport {
    pub motion: Option<bool>,
    pub motion_valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Temperature {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub enabled: Option<bool>,
    pub temperature: Option<TemperatureReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TemperatureReport {
    /// Degrees Celsius.
    pub temperature: Option<f64>,
    pub temperature_valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightLevel {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub enabled: Option<bool>,
    pub light: Option<LightLevelReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LightLevelReport {
    /// `10000 * log10(lux) + 1`.
    pub light_level: Option<u32>,
    pub light_level_valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Button {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub metadata: Option<ButtonMetadata>,
    pub button: Option<ButtonReport>,
}

impl Button {
    /// The last reported event, e.g. `initial_press` or `short_release`.
    pub fn last_event(&self) -> Option<&str> {
        self.button.as_ref()?.last_event.as_deref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonMetadata {
    pub control_id: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ButtonReport {
    pub last_event: Option<String>,
}
