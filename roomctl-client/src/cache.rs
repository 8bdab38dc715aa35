//! Client-side mirror of the server's device list.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::RwLock;
use roomctl_state::{DeviceId, DeviceUpdate, DeviceView, RealtimeMessage};
use tokio::sync::watch;

/// Devices keyed by id, kept current by applying realtime messages.
///
/// A snapshot replaces everything; an update removes or upserts one device
/// by id. Every change republishes the sorted device list on a `watch`
/// channel.
pub struct ClientCache {
    devices: RwLock<HashMap<DeviceId, DeviceView>>,
    connected: AtomicBool,
    tx: watch::Sender<Vec<DeviceView>>,
}

impl ClientCache {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            devices: RwLock::new(HashMap::new()),
            connected: AtomicBool::new(false),
            tx,
        }
    }

    /// Apply one message from the server. Returns whether anything changed.
    pub fn apply(&self, message: RealtimeMessage) -> bool {
        match message {
            RealtimeMessage::InitialState { devices } => {
                self.replace_all(devices);
                true
            }
            RealtimeMessage::DeviceUpdate { device } => {
                self.apply_updates(std::iter::once(device));
                true
            }
            RealtimeMessage::DevicesUpdate { devices } => {
                if devices.is_empty() {
                    return false;
                }
                self.apply_updates(devices);
                true
            }
            RealtimeMessage::Unknown => {
                tracing::debug!("ignoring unknown realtime message");
                false
            }
        }
    }

    /// Replace the whole cache with `devices`.
    pub fn replace_all(&self, devices: Vec<DeviceView>) {
        {
            let mut map = self.devices.write();
            map.clear();
            map.extend(devices.into_iter().map(|d| (d.id.clone(), d)));
        }
        self.publish();
    }

    fn apply_updates(&self, updates: impl IntoIterator<Item = DeviceUpdate>) {
        {
            let mut map = self.devices.write();
            for update in updates {
                match update {
                    DeviceUpdate::Deleted(gone) if gone.deleted => {
                        map.remove(&gone.id);
                    }
                    DeviceUpdate::Deleted(kept) => {
                        tracing::debug!(id = %kept.id, "update without a record, ignoring");
                    }
                    DeviceUpdate::Changed(view) => {
                        map.insert(view.id.clone(), view);
                    }
                }
            }
        }
        self.publish();
    }

    fn publish(&self) {
        let list = self.devices();
        self.tx.send_replace(list);
    }

    /// All devices, ordered by name then id.
    pub fn devices(&self) -> Vec<DeviceView> {
        let mut list: Vec<DeviceView> = self.devices.read().values().cloned().collect();
        list.sort_by(|a, b| {
            a.device_name
                .cmp(&b.device_name)
                .then_with(|| a.id.as_str().cmp(b.id.as_str()))
        });
        list
    }

    pub fn get(&self, id: &DeviceId) -> Option<DeviceView> {
        self.devices.read().get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.devices.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.read().is_empty()
    }

    /// Whether the realtime socket is currently open.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    pub(crate) fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Release);
    }

    /// Receiver that sees the device list after every change.
    pub fn watch(&self) -> watch::Receiver<Vec<DeviceView>> {
        self.tx.subscribe()
    }
}

impl Default for ClientCache {
    fn default() -> Self {
        Self::new()
    }
}
