use serde::{Deserialize, Serialize};

use super::{NameMetadata, ResourceIdentifier};

/// An entertainment area used for synced light streaming.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EntertainmentConfiguration {
    pub id: String,
    pub id_v1: Option<String>,
    pub metadata: Option<NameMetadata>,
    pub name: Option<String>,
    pub configuration_type: Option<String>,
    pub status: Option<String>,
    pub active_streamer: Option<ResourceIdentifier>,
    pub stream_proxy: Option<StreamProxy>,
    pub light_services: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamProxy {
    pub mode: Option<String>,
    pub node: Option<ResourceIdentifier>,
}

/// Entertainment capabilities of a single light.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Entertainment {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub renderer: Option<bool>,
    pub proxy: Option<bool>,
    pub max_streams: Option<u32>,
}
