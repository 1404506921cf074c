//! Decoding of event stream frames into resource events.
//!
//! A data frame carries a JSON array of bridge events, each holding a list of
//! changed resource records:
//!
//! ```json
//! [{"type": "update", "creationtime": "2023-01-01T00:00:00Z",
//!   "data": [{"type": "light", "id": "abc", "on": {"on": true}}]}]
//! ```
//!
//! [`decode`] flattens that into one [`ResourceEvent`] per record. Nothing in
//! here fails: unusable input is logged and skipped.

use std::{fmt, str::FromStr};

use hueline_transport::sse::Frame;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// What happened to a resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    Add,
    Update,
    Delete,
}

impl ChangeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "add" => Ok(Self::Add),
            "update" => Ok(Self::Update),
            "delete" => Ok(Self::Delete),
            other => Err(format!("unknown change kind {other:?}")),
        }
    }
}

/// One changed resource record, stamped with the frame it arrived in.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceEvent {
    /// Cursor of the frame, `<seq>:<sub-seq>`.
    pub event_id: String,
    pub resource_type: String,
    pub change_kind: ChangeKind,
    /// The record as sent, `type` tag included.
    pub payload: Map<String, Value>,
    /// When the bridge created the event, if it said.
    pub creationtime: Option<String>,
}

impl ResourceEvent {
    /// The `id` of the changed resource.
    pub fn resource_id(&self) -> Option<&str> {
        self.payload.get("id").and_then(Value::as_str)
    }
}

/// Decode the payload of a data frame with cursor `id`.
pub fn decode(id: &str, payload: &[u8]) -> Vec<ResourceEvent> {
    let batch: Vec<Value> = match serde_json::from_slice(payload) {
        Ok(batch) => batch,
        Err(err) => {
            warn!(event_id = id, error = %err, "frame payload is not a JSON array, dropping");
            return Vec::new();
        }
    };

    let mut events = Vec::new();
    for bridge_event in batch {
        let Value::Object(mut bridge_event) = bridge_event else {
            debug!(event_id = id, "bridge event is not an object, skipping");
            continue;
        };

        let change_kind = match bridge_event.get("type").and_then(Value::as_str) {
            Some(kind) => match kind.parse::<ChangeKind>() {
                Ok(kind) => kind,
                Err(err) => {
                    debug!(event_id = id, error = %err, "skipping bridge event");
                    continue;
                }
            },
            None => {
                debug!(event_id = id, "bridge event has no type, skipping");
                continue;
            }
        };
        let creationtime = bridge_event
            .get("creationtime")
            .and_then(Value::as_str)
            .map(str::to_string);

        let records = match bridge_event.remove("data") {
            Some(Value::Array(records)) => records,
            _ => {
                debug!(event_id = id, "bridge event has no data list, skipping");
                continue;
            }
        };

        for record in records {
            let Value::Object(record) = record else {
                debug!(event_id = id, "resource record is not an object, skipping");
                continue;
            };
            let Some(resource_type) = record.get("type").and_then(Value::as_str) else {
                debug!(event_id = id, "resource record has no type tag, skipping");
                continue;
            };
            events.push(ResourceEvent {
                event_id: id.to_string(),
                resource_type: resource_type.to_string(),
                change_kind,
                creationtime: creationtime.clone(),
                payload: record,
            });
        }
    }
    events
}

/// Decode a frame; heartbeats carry no events.
pub fn decode_frame(frame: &Frame) -> Vec<ResourceEvent> {
    match frame {
        Frame::Heartbeat => Vec::new(),
        Frame::Data { id, payload } => decode(id, payload),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIGHT_UPDATE: &[u8] =
        br#"[{"type":"update","data":[{"type":"light","id":"abc","on":{"on":true}}]}]"#;

    #[test]
    fn test_single_light_update() {
        let events = decode("1:0", LIGHT_UPDATE);
        assert_eq!(events.len(), 1);
        let event = &events[0];
        assert_eq!(event.event_id, "1:0");
        assert_eq!(event.resource_type, "light");
        assert_eq!(event.change_kind, ChangeKind::Update);
        assert_eq!(event.resource_id(), Some("abc"));
        assert!(event.creationtime.is_none());
    }

    #[test]
    fn test_flattens_batches_in_order() {
        let payload = br#"[
            {"type":"add","creationtime":"2024-05-01T10:00:00Z","data":[
                {"type":"scene","id":"s1"},
                {"type":"room","id":"r1"}
            ]},
            {"type":"delete","data":[{"type":"zone","id":"z1"}]}
        ]"#;
        let events = decode("7:1", payload);
        let summary: Vec<_> = events
            .iter()
            .map(|e| (e.resource_type.as_str(), e.change_kind))
            .collect();
        assert_eq!(
            summary,
            [
                ("scene", ChangeKind::Add),
                ("room", ChangeKind::Add),
                ("zone", ChangeKind::Delete)
            ]
        );
        assert_eq!(
            events[0].creationtime.as_deref(),
            Some("2024-05-01T10:00:00Z")
        );
        assert!(events[2].creationtime.is_none());
    }

    #[test]
    fn test_decoding_is_pure() {
        assert_eq!(decode("1:0", LIGHT_UPDATE), decode("1:0", LIGHT_UPDATE));
    }

    #[test]
    fn test_invalid_json_is_empty() {
        assert!(decode("1:0", b"{not json").is_empty());
        assert!(decode("1:0", br#"{"type":"update"}"#).is_empty());
    }

    #[test]
    fn test_unusable_parts_are_skipped_individually() {
        let payload = br#"[
            {"type":"rename","data":[{"type":"light","id":"x"}]},
            {"data":[{"type":"light","id":"y"}]},
            "junk",
            {"type":"update","data":[
                {"id":"no-tag"},
                42,
                {"type":"motion","id":"m1"}
            ]}
        ]"#;
        let events = decode("2:0", payload);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].resource_type, "motion");
    }

    #[test]
    fn test_heartbeat_decodes_to_nothing() {
        assert!(decode_frame(&Frame::Heartbeat).is_empty());
        assert_eq!(decode_frame(&Frame::data("1:0", LIGHT_UPDATE)).len(), 1);
    }

    #[test]
    fn test_change_kind_parse_and_display() {
        for kind in [ChangeKind::Add, ChangeKind::Update, ChangeKind::Delete] {
            assert_eq!(kind.to_string().parse::<ChangeKind>(), Ok(kind));
        }
        assert!("rename".parse::<ChangeKind>().is_err());
    }
}
