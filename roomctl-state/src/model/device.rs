//! Device records and the views built from them

use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;

use roomctl_discovery::MacAddr;
use roomctl_drivers::{LightCredentials, PowerState};
use serde::{Deserialize, Deserializer, Serialize};

use super::{Category, DeviceId};

/// A device as stored by the registry.
///
/// Never carries power state; that is derived on every read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "_id")]
    pub id: DeviceId,
    pub device_name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    pub category: Category,
}

impl DeviceRecord {
    pub fn credentials(&self) -> LightCredentials {
        LightCredentials::new(self.username.clone(), self.password.clone())
    }

    /// Public view, optionally with a derived state.
    pub fn view(&self, state: Option<DeviceState>) -> DeviceView {
        DeviceView {
            id: self.id.clone(),
            device_name: self.device_name.clone(),
            ip: self.ip,
            mac: self.mac,
            username: self.username.clone(),
            category: self.category,
            state: state.filter(|_| self.category.has_live_state()),
        }
    }
}

/// What clients see of a device.
///
/// The password is never exposed, and `state` only appears for categories
/// with live state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceView {
    #[serde(rename = "_id")]
    pub id: DeviceId,
    pub device_name: String,
    pub ip: Ipv4Addr,
    pub mac: MacAddr,
    #[serde(default)]
    pub username: String,
    pub category: Category,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<DeviceState>,
}

/// Derived power state shown to clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeviceState {
    #[serde(rename = "ON")]
    On,
    #[serde(rename = "OFF")]
    Off,
    #[serde(rename = "STANDBY")]
    Standby,
    #[serde(rename = "UNKNOWN")]
    Unknown,
    /// Placeholder when the device couldn't be asked
    #[serde(rename = "Loading…", alias = "Loading...")]
    Loading,
}

impl DeviceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceState::On => "ON",
            DeviceState::Off => "OFF",
            DeviceState::Standby => "STANDBY",
            DeviceState::Unknown => "UNKNOWN",
            DeviceState::Loading => "Loading…",
        }
    }
}

impl From<PowerState> for DeviceState {
    fn from(state: PowerState) -> Self {
        match state {
            PowerState::On => DeviceState::On,
            PowerState::Off => DeviceState::Off,
            PowerState::Standby => DeviceState::Standby,
            PowerState::Unknown => DeviceState::Unknown,
        }
    }
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Input for creating a device.
///
/// At least one of `ip`/`mac` must be present; the other is resolved on
/// the network before anything is stored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct NewDevice {
    #[serde(default)]
    pub device_name: String,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub ip: Option<Ipv4Addr>,
    #[serde(default, deserialize_with = "blank_as_none")]
    pub mac: Option<MacAddr>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
}

/// Partial update. Absent fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DevicePatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_name: Option<String>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub ip: Option<Ipv4Addr>,
    #[serde(
        default,
        deserialize_with = "blank_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub mac: Option<MacAddr>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

impl DevicePatch {
    pub fn ip(ip: Ipv4Addr) -> Self {
        Self {
            ip: Some(ip),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == DevicePatch::default()
    }

    /// Apply the present fields to `record`.
    pub fn apply_to(&self, record: &mut DeviceRecord) {
        if let Some(name) = &self.device_name {
            record.device_name = name.clone();
        }
        if let Some(ip) = self.ip {
            record.ip = ip;
        }
        if let Some(mac) = self.mac {
            record.mac = mac;
        }
        if let Some(category) = self.category {
            record.category = category;
        }
        if let Some(username) = &self.username {
            record.username = username.clone();
        }
        if let Some(password) = &self.password {
            record.password = password.clone();
        }
    }
}

/// Registry query. Every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DeviceFilter {
    #[serde(default, rename = "_id")]
    pub id: Option<DeviceId>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub device_name: Option<String>,
    #[serde(default)]
    pub ip: Option<Ipv4Addr>,
    #[serde(default)]
    pub mac: Option<MacAddr>,
}

impl DeviceFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_id(id: &DeviceId) -> Self {
        Self {
            id: Some(id.clone()),
            ..Default::default()
        }
    }

    pub fn by_category(category: Category) -> Self {
        Self {
            category: Some(category),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.device_name = Some(name.into());
        self
    }

    pub fn matches(&self, record: &DeviceRecord) -> bool {
        self.id.as_ref().map_or(true, |id| *id == record.id)
            && self.category.map_or(true, |c| c == record.category)
            && self
                .device_name
                .as_deref()
                .map_or(true, |n| n == record.device_name)
            && self.ip.map_or(true, |ip| ip == record.ip)
            && self.mac.map_or(true, |mac| mac == record.mac)
    }
}

/// Form fields arrive as empty strings when left blank.
fn blank_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: fmt::Display,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(serde::de::Error::custom),
        _ => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(category: Category) -> DeviceRecord {
        DeviceRecord {
            id: DeviceId::new("d1"),
            device_name: "Lobby".into(),
            ip: Ipv4Addr::new(10, 0, 0, 20),
            mac: "00:1a:2b:3c:4d:5e".parse().unwrap(),
            username: "admin".into(),
            password: "secret".into(),
            category,
        }
    }

    #[test]
    fn test_view_hides_password_and_state_for_non_displays() {
        let view = record(Category::Light).view(Some(DeviceState::On));
        let json = serde_json::to_value(&view).unwrap();

        assert_eq!(json["_id"], "d1");
        assert_eq!(json["category"], "3");
        assert!(json.get("password").is_none());
        assert!(json.get("state").is_none());
    }

    #[test]
    fn test_view_carries_state_for_displays() {
        let view = record(Category::Display).view(Some(DeviceState::Loading));
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["state"], "Loading…");
        assert_eq!(json["mac"], "00:1a:2b:3c:4d:5e");
    }

    #[test]
    fn test_state_accepts_ascii_placeholder() {
        let state: DeviceState = serde_json::from_str("\"Loading...\"").unwrap();
        assert_eq!(state, DeviceState::Loading);
    }

    #[test]
    fn test_new_device_blank_fields() {
        let new: NewDevice = serde_json::from_value(json!({
            "device_name": "Lobby",
            "ip": "",
            "mac": "00-1A-2B-3C-4D-5E",
            "category": 1,
        }))
        .unwrap();

        assert!(new.ip.is_none());
        assert_eq!(new.mac.unwrap().to_string(), "00:1a:2b:3c:4d:5e");
        assert_eq!(new.category, Some(Category::Display));
        assert_eq!(new.username, "");
    }

    #[test]
    fn test_new_device_rejects_bad_ip() {
        let result = serde_json::from_value::<NewDevice>(json!({
            "device_name": "Lobby",
            "ip": "10.0.0.300",
        }));
        assert!(result.is_err());
    }

    #[test]
    fn test_patch_applies_present_fields_only() {
        let mut rec = record(Category::Display);
        let patch = DevicePatch {
            device_name: Some("Hall".into()),
            ip: Some(Ipv4Addr::new(10, 0, 0, 99)),
            ..Default::default()
        };
        patch.apply_to(&mut rec);

        assert_eq!(rec.device_name, "Hall");
        assert_eq!(rec.ip, Ipv4Addr::new(10, 0, 0, 99));
        assert_eq!(rec.password, "secret");
        assert!(!patch.is_empty());
        assert!(DevicePatch::default().is_empty());
    }

    #[test]
    fn test_filter_matches() {
        let rec = record(Category::Light);
        assert!(DeviceFilter::all().matches(&rec));
        assert!(DeviceFilter::by_category(Category::Light)
            .with_name("Lobby")
            .matches(&rec));
        assert!(!DeviceFilter::by_category(Category::Light)
            .with_name("lobby")
            .matches(&rec));
        assert!(!DeviceFilter::by_id(&DeviceId::new("d2")).matches(&rec));
    }
}
