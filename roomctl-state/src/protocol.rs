//! Messages on the realtime channel
//!
//! ```json
//! {"type":"INITIAL_STATE","devices":[...]}
//! {"type":"DEVICE_UPDATE","device":{...}}
//! {"type":"DEVICES_UPDATE","devices":[...]}
//! ```
//!
//! A deleted device travels as `{"_id": "...", "_deleted": true}` in place of
//! a full record. Only the `_deleted` flag marks a deletion, whatever other
//! fields come with it. Unrecognized message types parse as
//! [`RealtimeMessage::Unknown`] so receivers can ignore them.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::events::StateEvent;
use crate::model::{DeviceId, DeviceView};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RealtimeMessage {
    /// Full snapshot, sent on every (re)connect
    #[serde(rename = "INITIAL_STATE")]
    InitialState { devices: Vec<DeviceView> },

    #[serde(rename = "DEVICE_UPDATE")]
    DeviceUpdate { device: DeviceUpdate },

    #[serde(rename = "DEVICES_UPDATE")]
    DevicesUpdate { devices: Vec<DeviceUpdate> },

    #[serde(other)]
    Unknown,
}

/// One changed or deleted device.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DeviceUpdate {
    Deleted(DeletedDevice),
    Changed(DeviceView),
}

/// A bare `{_id, _deleted}` record. Receivers remove the device only when
/// `deleted` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeletedDevice {
    #[serde(rename = "_id")]
    pub id: DeviceId,
    #[serde(rename = "_deleted")]
    pub deleted: bool,
}

impl<'de> Deserialize<'de> for DeviceUpdate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        let deleted = value
            .get("_deleted")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);

        if deleted {
            return DeletedDevice::deserialize(value)
                .map(DeviceUpdate::Deleted)
                .map_err(D::Error::custom);
        }
        match DeviceView::deserialize(&value) {
            Ok(view) => Ok(DeviceUpdate::Changed(view)),
            // `{_id, _deleted: false}` with no record behind it
            Err(e) => DeletedDevice::deserialize(value)
                .map(DeviceUpdate::Deleted)
                .map_err(|_| D::Error::custom(e)),
        }
    }
}

impl DeviceUpdate {
    pub fn deleted(id: DeviceId) -> Self {
        DeviceUpdate::Deleted(DeletedDevice { id, deleted: true })
    }

    pub fn id(&self) -> &DeviceId {
        match self {
            DeviceUpdate::Deleted(d) => &d.id,
            DeviceUpdate::Changed(v) => &v.id,
        }
    }
}

impl RealtimeMessage {
    /// The message observers should receive for `event`, if any.
    ///
    /// Address drift is announced through the refresh's batch update, so
    /// it has no message of its own.
    pub fn from_event(event: &StateEvent) -> Option<Self> {
        match event {
            StateEvent::DeviceChanged(view) => Some(RealtimeMessage::DeviceUpdate {
                device: DeviceUpdate::Changed(view.clone()),
            }),
            StateEvent::DevicesChanged(views) => Some(RealtimeMessage::DevicesUpdate {
                devices: views.iter().cloned().map(DeviceUpdate::Changed).collect(),
            }),
            StateEvent::DeviceDeleted(id) => Some(RealtimeMessage::DeviceUpdate {
                device: DeviceUpdate::deleted(id.clone()),
            }),
            StateEvent::AddressDrift { .. } => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn parse(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Category, DeviceState};
    use serde_json::json;
    use std::net::Ipv4Addr;

    fn view() -> DeviceView {
        DeviceView {
            id: DeviceId::new("d1"),
            device_name: "Lobby".into(),
            ip: Ipv4Addr::new(10, 0, 0, 20),
            mac: "00:1a:2b:3c:4d:5e".parse().unwrap(),
            username: String::new(),
            category: Category::Display,
            state: Some(DeviceState::On),
        }
    }

    #[test]
    fn test_initial_state_shape() {
        let msg = RealtimeMessage::InitialState {
            devices: vec![view()],
        };
        let value: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "INITIAL_STATE");
        assert_eq!(value["devices"][0]["_id"], "d1");
        assert_eq!(value["devices"][0]["state"], "ON");
    }

    #[test]
    fn test_deleted_update_shape() {
        let msg = RealtimeMessage::from_event(&StateEvent::DeviceDeleted(DeviceId::new("X")))
            .unwrap();
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(
            value,
            json!({"type": "DEVICE_UPDATE", "device": {"_id": "X", "_deleted": true}})
        );
    }

    #[test]
    fn test_parse_distinguishes_deleted_from_changed() {
        let deleted = RealtimeMessage::parse(
            r#"{"type":"DEVICE_UPDATE","device":{"_id":"X","_deleted":true}}"#,
        )
        .unwrap();
        assert!(matches!(
            deleted,
            RealtimeMessage::DeviceUpdate { device: DeviceUpdate::Deleted(ref d) } if d.id.as_str() == "X"
        ));

        let changed = RealtimeMessage::parse(
            r#"{"type":"DEVICES_UPDATE","devices":[{"_id":"d1","device_name":"Lobby","ip":"10.0.0.20","mac":"00:1a:2b:3c:4d:5e","category":"1","state":"OFF"}]}"#,
        )
        .unwrap();
        match changed {
            RealtimeMessage::DevicesUpdate { devices } => {
                assert_eq!(devices.len(), 1);
                assert!(matches!(&devices[0], DeviceUpdate::Changed(v) if v.state == Some(DeviceState::Off)));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_deleted_flag_wins_over_full_record() {
        let msg = RealtimeMessage::parse(
            r#"{"type":"DEVICE_UPDATE","device":{"_id":"X","device_name":"Lobby","ip":"10.0.0.20","mac":"00:1a:2b:3c:4d:5e","category":"1","_deleted":true}}"#,
        )
        .unwrap();
        assert!(matches!(
            msg,
            RealtimeMessage::DeviceUpdate { device: DeviceUpdate::Deleted(ref d) } if d.deleted && d.id.as_str() == "X"
        ));
    }

    #[test]
    fn test_cleared_deleted_flag_is_not_a_deletion() {
        let full = RealtimeMessage::parse(
            r#"{"type":"DEVICE_UPDATE","device":{"_id":"X","device_name":"Lobby","ip":"10.0.0.20","mac":"00:1a:2b:3c:4d:5e","category":"1","_deleted":false}}"#,
        )
        .unwrap();
        assert!(matches!(
            full,
            RealtimeMessage::DeviceUpdate { device: DeviceUpdate::Changed(_) }
        ));

        let bare = RealtimeMessage::parse(
            r#"{"type":"DEVICE_UPDATE","device":{"_id":"X","_deleted":false}}"#,
        )
        .unwrap();
        assert!(matches!(
            bare,
            RealtimeMessage::DeviceUpdate { device: DeviceUpdate::Deleted(ref d) } if !d.deleted
        ));
    }

    #[test]
    fn test_record_without_id_is_rejected() {
        assert!(RealtimeMessage::parse(r#"{"type":"DEVICE_UPDATE","device":{"_deleted":true}}"#).is_err());
    }

    #[test]
    fn test_unknown_type_is_tolerated() {
        let msg = RealtimeMessage::parse(r#"{"type":"PING","at":12}"#).unwrap();
        assert_eq!(msg, RealtimeMessage::Unknown);
    }

    #[test]
    fn test_drift_has_no_message() {
        let drift = StateEvent::AddressDrift {
            id: DeviceId::new("d1"),
            old: Ipv4Addr::new(10, 0, 0, 1),
            new: Ipv4Addr::new(10, 0, 0, 2),
        };
        assert!(RealtimeMessage::from_event(&drift).is_none());
    }
}
