use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{ColorPoint, Dimming, Metadata, On, ResourceIdentifier, Xy};

/// A single light service.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Light {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub metadata: Option<Metadata>,
    pub on: Option<On>,
    pub dimming: Option<Dimming>,
    pub color_temperature: Option<ColorTemperature>,
    pub color: Option<Color>,
    pub gradient: Option<Gradient>,
    pub dynamics: Option<Dynamics>,
    pub effects: Option<Effects>,
    pub alert: Option<Value>,
    pub mode: Option<String>,
}

impl Light {
    /// Display name from the metadata, if any.
    pub fn name(&self) -> Option<&str> {
        self.metadata.as_ref()?.name.as_deref()
    }

    /// Whether the light reports being on. `None` if the record does not say.
    pub fn is_on(&self) -> Option<bool> {
        self.on.map(|on| on.on)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ColorTemperature {
    /// Color temperature in mirek; `None` when the light is in xy mode.
    pub mirek: Option<u16>,
    pub mirek_valid: Option<bool>,
    pub mirek_schema: Option<MirekSchema>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirekSchema {
    pub mirek_minimum: u16,
    pub mirek_maximum: u16,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Color {
    pub xy: Xy,
    pub gamut: Option<Gamut>,
    pub gamut_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Gamut {
    pub red: Xy,
    pub green: Xy,
    pub blue: Xy,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Dynamics {
    pub status: Option<String>,
    pub status_values: Vec<String>,
    pub speed: Option<f64>,
    pub speed_valid: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Gradient {
    pub points: Vec<ColorPoint>,
    pub points_capable: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Effects {
    pub effect: Option<String>,
    pub status: Option<String>,
    pub status_values: Vec<String>,
    pub effect_values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MirekUpdate {
    pub mirek: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct DynamicsUpdate {
    /// Transition time in milliseconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
}

/// Body of a `PUT /resource/light/{id}` (or grouped light) request.
///
/// Only the fields that are set are sent.
///
/// ```
/// use hueline::models::LightUpdate;
///
/// let update = LightUpdate::new().on(true).brightness(60.0).transition_ms(400);
/// let body = serde_json::to_value(&update).unwrap();
/// assert_eq!(body["on"]["on"], true);
/// assert!(body.get("color").is_none());
/// ```
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LightUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on: Option<On>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dimming: Option<Dimming>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color_temperature: Option<MirekUpdate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<ColorPoint>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dynamics: Option<DynamicsUpdate>,
}

impl LightUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on(mut self, on: bool) -> Self {
        self.on = Some(On { on });
        self
    }

    /// Brightness in percent.
    #[must_use]
    pub fn brightness(mut self, brightness: f64) -> Self {
        self.dimming = Some(Dimming {
            brightness,
            min_dim_level: None,
        });
        self
    }

    #[must_use]
    pub fn mirek(mut self, mirek: u16) -> Self {
        self.color_temperature = Some(MirekUpdate { mirek });
        self
    }

    #[must_use]
    pub fn xy(mut self, x: f64, y: f64) -> Self {
        self.color = Some(ColorPoint { xy: Xy { x, y } });
        self
    }

    #[must_use]
    pub fn transition_ms(mut self, duration: u32) -> Self {
        self.dynamics.get_or_insert_with(DynamicsUpdate::default).duration = Some(duration);
        self
    }
}

impl From<&Light> for LightUpdate {
    /// Capture the writable state of a light, e.g. to restore it later.
    fn from(light: &Light) -> Self {
        Self {
            on: light.on,
            dimming: light.dimming.map(|d| Dimming {
                brightness: d.brightness,
                min_dim_level: None,
            }),
            color_temperature: light
                .color_temperature
                .as_ref()
                .and_then(|ct| ct.mirek)
                .map(|mirek| MirekUpdate { mirek }),
            color: light.color.as_ref().map(|c| ColorPoint { xy: c.xy }),
            dynamics: None,
        }
    }
}
