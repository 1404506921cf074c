use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{Dimming, Metadata, On, ResourceIdentifier};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Room {
    pub id: String,
    pub id_v1: Option<String>,
    pub metadata: Option<Metadata>,
    pub children: Vec<ResourceIdentifier>,
    pub services: Vec<ResourceIdentifier>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Zone {
    pub id: String,
    pub id_v1: Option<String>,
    pub metadata: Option<Metadata>,
    pub children: Vec<ResourceIdentifier>,
    pub services: Vec<ResourceIdentifier>,
}

/// The implicit group holding every room and device of the bridge.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeHome {
    pub id: String,
    pub id_v1: Option<String>,
    pub children: Vec<ResourceIdentifier>,
    pub services: Vec<ResourceIdentifier>,
}

/// Combined light service of a room or zone.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupedLight {
    pub id: String,
    pub id_v1: Option<String>,
    pub owner: Option<ResourceIdentifier>,
    pub on: Option<On>,
    pub dimming: Option<Dimming>,
    pub alert: Option<Value>,
}

impl Room {
    /// Services of a given type, e.g. the room's `grouped_light`.
    pub fn services_of<'a>(&'a self, rtype: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.services
            .iter()
            .filter(move |s| s.rtype == rtype)
            .map(|s| s.rid.as_str())
    }
}

impl Zone {
    /// Services of a given type, e.g. the zone's `grouped_light`.
    pub fn services_of<'a>(&'a self, rtype: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.services
            .iter()
            .filter(move |s| s.rtype == rtype)
            .map(|s| s.rid.as_str())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_room_services_of() {
        let room: Room = serde_json::from_value(json!({
            "id": "room-1",
            "metadata": {"name": "Kitchen", "archetype": "kitchen"},
            "children": [{"rid": "dev-1", "rtype": "device"}],
            "services": [
                {"rid": "gl-1", "rtype": "grouped_light"},
                {"rid": "other", "rtype": "motion"}
            ]
        }))
        .expect("room");
        assert_eq!(room.services_of("grouped_light").collect::<Vec<_>>(), ["gl-1"]);
        assert_eq!(room.children.len(), 1);
    }
}
