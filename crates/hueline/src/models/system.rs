use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GeofenceClient {
    pub id: String,
    pub id_v1: Option<String>,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Geolocation {
    pub id: String,
    pub id_v1: Option<String>,
    pub is_configured: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Homekit {
    pub id: String,
    pub id_v1: Option<String>,
    pub status: Option<String>,
}
