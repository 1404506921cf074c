use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{NameMetadata, ResourceIdentifier};

/// An automation script installed on the bridge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorScript {
    pub id: String,
    pub id_v1: Option<String>,
    pub description: Option<String>,
    pub configuration_schema: Option<Value>,
    pub trigger_schema: Option<Value>,
    pub state_schema: Option<Value>,
    pub version: Option<String>,
    pub metadata: Option<Map<String, Value>>,
}

/// A configured instance of a [`BehaviorScript`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorInstance {
    pub id: String,
    pub id_v1: Option<String>,
    pub script_id: Option<String>,
    pub enabled: Option<bool>,
    pub state: Option<Value>,
    pub configuration: Option<Value>,
    pub dependees: Vec<Dependee>,
    pub status: Option<String>,
    pub last_error: Option<String>,
    pub metadata: Option<NameMetadata>,
    pub migrated_from: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dependee {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    pub target: ResourceIdentifier,
    #[serde(default)]
    pub level: Option<String>,
}
