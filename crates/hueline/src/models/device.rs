use serde::{Deserialize, Serialize};

use super::{Archetype, Metadata, ResourceIdentifier};

/// A physical device; its capabilities are exposed as separate services.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Device {
    pub id: String,
    pub id_v1: Option<String>,
    pub metadata: Option<Metadata>,
    pub product_data: Option<ProductData>,
    pub services: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductData {
    pub model_id: Option<String>,
    pub manufacturer_name: Option<String>,
    pub product_name: Option<String>,
    pub product_archetype: Option<Archetype>,
    pub certified: Option<bool>,
    pub software_version: Option<String>,
    pub hardware_platform_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Bridge {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub bridge_id: Option<String>,
    pub time_zone: Option<TimeZone>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TimeZone {
    pub time_zone: String,
}

/// Battery state of a battery-powered device.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DevicePower {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub power_state: Option<PowerState>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PowerState {
    pub battery_state: Option<BatteryState>,
    /// Charge in percent.
    pub battery_level: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatteryState {
    Normal,
    Low,
    Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectivityStatus {
    Connected,
    Disconnected,
    ConnectivityIssue,
    UnidirectionalIncoming,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZigbeeConnectivity {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub status: Option<ConnectivityStatus>,
    pub mac_address: Option<String>,
}

/// Connectivity of a Zigbee Green Power device such as a battery-less switch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ZgpConnectivity {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub status: Option<ConnectivityStatus>,
    pub source_id: Option<String>,
}
