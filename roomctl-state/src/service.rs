//! The state aggregator
//!
//! [`DeviceService`] sits between the registry, the locator and the drivers.
//! It merges stored records with live driver queries, keeps addresses in
//! step with the network, and announces every change on a broadcast channel.
//!
//! Failures of a single device never fail a batch: listings degrade that
//! device to [`DeviceState::Loading`], refreshes log and skip it.

use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use parking_lot::RwLock;
use roomctl_discovery::{AddressResolver, LocatorError, MacAddr};
use roomctl_drivers::PowerAction;
use tokio::sync::broadcast;

use crate::drivers::DriverFactory;
use crate::error::{Result, StateError};
use crate::events::StateEvent;
use crate::model::{
    Category, DeviceFilter, DeviceId, DevicePatch, DeviceRecord, DeviceState, DeviceView,
    NewDevice,
};
use crate::registry::DeviceRegistry;

/// Aggregator settings
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Deadline for one device's status query during a listing
    pub status_timeout: Duration,
    /// Capacity of the event channel
    pub event_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            status_timeout: Duration::from_secs(2),
            event_capacity: 256,
        }
    }
}

/// What a refresh did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RefreshReport {
    pub checked: usize,
    pub updated: Vec<DeviceView>,
    pub failed: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RefreshOutcome {
    Completed(RefreshReport),
    /// Another refresh was in progress; nothing was done
    AlreadyRunning,
}

/// Resets a running flag when dropped.
struct RunGuard<'a>(&'a AtomicBool);

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunGuard(flag))
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DeviceService {
    registry: Arc<dyn DeviceRegistry>,
    resolver: Arc<dyn AddressResolver>,
    drivers: Arc<dyn DriverFactory>,
    config: ServiceConfig,
    events: broadcast::Sender<StateEvent>,
    refreshing: AtomicBool,
    polling: AtomicBool,
    /// Last state seen by polling or set by a command. Never persisted.
    known_states: RwLock<HashMap<DeviceId, DeviceState>>,
}

impl DeviceService {
    pub fn new(
        registry: Arc<dyn DeviceRegistry>,
        resolver: Arc<dyn AddressResolver>,
        drivers: Arc<dyn DriverFactory>,
        config: ServiceConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            registry,
            resolver,
            drivers,
            config,
            events,
            refreshing: AtomicBool::new(false),
            polling: AtomicBool::new(false),
            known_states: RwLock::new(HashMap::new()),
        }
    }

    /// Receive every [`StateEvent`] emitted from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<StateEvent> {
        self.events.subscribe()
    }

    pub fn is_refreshing(&self) -> bool {
        self.refreshing.load(Ordering::Acquire)
    }

    fn emit(&self, event: StateEvent) {
        // No subscribers is fine
        let _ = self.events.send(event);
    }

    fn known_state(&self, id: &DeviceId) -> Option<DeviceState> {
        self.known_states.read().get(id).copied()
    }

    /// View with the last known state; displays never polled show `Loading…`.
    fn cached_view(&self, record: &DeviceRecord) -> DeviceView {
        let state = self.known_state(&record.id).unwrap_or(DeviceState::Loading);
        record.view(Some(state))
    }

    /// Records matching `filter`, with live state for displays.
    ///
    /// Status queries run concurrently, each under its own deadline.
    pub async fn list(&self, filter: &DeviceFilter) -> Result<Vec<DeviceView>> {
        let records = self.registry.find(filter).await?;
        Ok(join_all(records.iter().map(|r| self.live_view(r))).await)
    }

    /// All records with their last known state. No device is contacted.
    pub async fn snapshot(&self) -> Result<Vec<DeviceView>> {
        let records = self.registry.find(&DeviceFilter::all()).await?;
        Ok(records
            .iter()
            .map(|r| self.cached_view(r))
            .collect())
    }

    pub async fn get(&self, id: &DeviceId) -> Result<DeviceView> {
        let record = self.find_one(id).await?;
        Ok(self.live_view(&record).await)
    }

    async fn find_one(&self, id: &DeviceId) -> Result<DeviceRecord> {
        self.registry
            .find(&DeviceFilter::by_id(id))
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StateError::NotFound("Device not found".to_string()))
    }

    async fn live_view(&self, record: &DeviceRecord) -> DeviceView {
        if !record.category.has_live_state() {
            return record.view(None);
        }
        record.view(Some(self.query_state(record).await))
    }

    async fn query_state(&self, record: &DeviceRecord) -> DeviceState {
        let driver = match self.drivers.driver_for(record) {
            Ok(driver) => driver,
            Err(e) => {
                tracing::warn!(device_id = %record.id, error = %e, "no driver for device");
                return DeviceState::Loading;
            }
        };

        match tokio::time::timeout(self.config.status_timeout, driver.query_state()).await {
            Ok(Ok(state)) => state.into(),
            Ok(Err(e)) => {
                tracing::debug!(device_id = %record.id, ip = %record.ip, error = %e, "status query failed");
                DeviceState::Loading
            }
            Err(_) => {
                tracing::debug!(device_id = %record.id, ip = %record.ip, "status query timed out");
                DeviceState::Loading
            }
        }
    }

    /// Register a device, resolving whichever of ip/mac is missing.
    pub async fn create(&self, new: NewDevice) -> Result<DeviceView> {
        let name = new.device_name.trim().to_string();
        if name.is_empty() {
            return Err(StateError::Validation("device_name is required".to_string()));
        }
        let category = new.category.ok_or_else(|| {
            StateError::Validation("Category needs to be 1, 2, 3 or 4".to_string())
        })?;
        if new.ip.is_none() && new.mac.is_none() {
            return Err(StateError::Validation("IP or MAC required".to_string()));
        }

        // Cheap check before a possible subnet sweep; the registry
        // re-checks everything atomically on insert.
        let same_name = DeviceFilter::all().with_name(name.clone());
        if !self.registry.find(&same_name).await?.is_empty() {
            return Err(StateError::Conflict("Device already exists".to_string()));
        }

        let (ip, mac) = self.resolve_addresses(new.ip, new.mac).await?;
        let record = self
            .registry
            .insert(DeviceRecord {
                id: DeviceId::generate(),
                device_name: name,
                ip,
                mac,
                username: new.username,
                password: new.password,
                category,
            })
            .await?;

        tracing::info!(device_id = %record.id, %ip, %mac, "device registered");
        let view = self.cached_view(&record);
        self.emit(StateEvent::DeviceChanged(view.clone()));
        Ok(view)
    }

    async fn resolve_addresses(
        &self,
        ip: Option<Ipv4Addr>,
        mac: Option<MacAddr>,
    ) -> Result<(Ipv4Addr, MacAddr)> {
        let unresolved = || StateError::Validation("Unable to resolve IP/MAC".to_string());

        match (ip, mac) {
            (Some(ip), Some(mac)) => Ok((ip, mac)),
            (None, Some(mac)) => match self.resolver.resolve_ip(&mac).await {
                Ok(found) => Ok((found.ip, mac)),
                Err(LocatorError::NotFound { .. }) => Err(unresolved()),
                Err(e) => Err(e.into()),
            },
            (Some(ip), None) => match self.resolver.resolve_mac(ip).await? {
                Some(mac) => Ok((ip, mac)),
                None => Err(unresolved()),
            },
            (None, None) => Err(StateError::Validation("IP or MAC required".to_string())),
        }
    }

    /// Apply a partial update.
    pub async fn update(&self, id: &DeviceId, patch: DevicePatch) -> Result<DeviceView> {
        if patch
            .device_name
            .as_deref()
            .is_some_and(|name| name.trim().is_empty())
        {
            return Err(StateError::Validation("device_name cannot be empty".to_string()));
        }
        if patch.is_empty() {
            let record = self.find_one(id).await?;
            return Ok(self.cached_view(&record));
        }

        let record = self.registry.update(id, &patch).await?;
        let view = self.cached_view(&record);
        tracing::info!(device_id = %id, "device updated");
        self.emit(StateEvent::DeviceChanged(view.clone()));
        Ok(view)
    }

    pub async fn delete(&self, id: &DeviceId) -> Result<()> {
        self.registry.delete(id).await?;
        self.known_states.write().remove(id);
        tracing::info!(device_id = %id, "device deleted");
        self.emit(StateEvent::DeviceDeleted(id.clone()));
        Ok(())
    }

    /// Turn a device on or off and return the commanded state.
    ///
    /// Displays and projectors only answer once the display has
    /// acknowledged the frame. Other categories succeed or fail with
    /// their own driver.
    pub async fn power(&self, id: &DeviceId, action: PowerAction) -> Result<DeviceState> {
        let record = self.find_one(id).await?;
        let driver = self.drivers.driver_for(&record)?;
        driver.apply(action).await?;

        let state = DeviceState::from(action.target_state());
        tracing::info!(device_id = %id, %action, "power command applied");

        if record.category.has_live_state() {
            self.known_states.write().insert(record.id.clone(), state);
        }
        self.emit(StateEvent::DeviceChanged(record.view(Some(state))));
        Ok(state)
    }

    /// Switch a light, looked up by its display name.
    pub async fn light_power(&self, name: &str, action: PowerAction) -> Result<DeviceView> {
        let filter = DeviceFilter::by_category(Category::Light).with_name(name);
        let record = self
            .registry
            .find(&filter)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| StateError::NotFound("Light device not found".to_string()))?;

        let driver = self.drivers.driver_for(&record)?;
        driver.apply(action).await?;
        tracing::info!(device_id = %record.id, name, %action, "light switched");

        let view = record.view(None);
        self.emit(StateEvent::DeviceChanged(view.clone()));
        Ok(view)
    }

    /// Re-resolve every device's address by mac and store any drift.
    ///
    /// Devices are handled one at a time since each resolution is already
    /// a full subnet sweep. A device that can't be resolved is logged and
    /// skipped. Returns [`RefreshOutcome::AlreadyRunning`] instead of
    /// starting a second, overlapping refresh.
    pub async fn refresh(&self) -> Result<RefreshOutcome> {
        let Some(_guard) = RunGuard::acquire(&self.refreshing) else {
            tracing::info!("refresh already running, skipping");
            return Ok(RefreshOutcome::AlreadyRunning);
        };

        let records = self.registry.find(&DeviceFilter::all()).await?;
        let mut report = RefreshReport {
            checked: records.len(),
            ..Default::default()
        };

        for record in &records {
            match self.reconcile(record).await {
                Ok(Some(view)) => report.updated.push(view),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(device_id = %record.id, mac = %record.mac, error = %e, "address refresh failed");
                    report.failed += 1;
                }
            }
        }

        if !report.updated.is_empty() {
            self.emit(StateEvent::DevicesChanged(report.updated.clone()));
        }
        tracing::info!(
            checked = report.checked,
            updated = report.updated.len(),
            failed = report.failed,
            "refresh complete"
        );
        Ok(RefreshOutcome::Completed(report))
    }

    async fn reconcile(&self, record: &DeviceRecord) -> Result<Option<DeviceView>> {
        let found = self.resolver.resolve_ip(&record.mac).await?;
        if found.ip == record.ip {
            tracing::debug!(device_id = %record.id, ip = %record.ip, "address unchanged");
            return Ok(None);
        }

        let updated = self
            .registry
            .update(&record.id, &DevicePatch::ip(found.ip))
            .await?;

        tracing::info!(device_id = %record.id, old = %record.ip, new = %found.ip, "address drift");
        self.emit(StateEvent::AddressDrift {
            id: record.id.clone(),
            old: record.ip,
            new: found.ip,
        });
        Ok(Some(self.cached_view(&updated)))
    }

    /// Query every display and announce the ones whose state changed.
    ///
    /// Overlapping calls return immediately with nothing.
    pub async fn poll_states(&self) -> Result<Vec<DeviceView>> {
        let Some(_guard) = RunGuard::acquire(&self.polling) else {
            return Ok(Vec::new());
        };

        let records = self
            .registry
            .find(&DeviceFilter::by_category(Category::Display))
            .await?;
        let polled = join_all(
            records
                .iter()
                .map(|r| async move { (r, self.query_state(r).await) }),
        )
        .await;

        let mut changed = Vec::new();
        {
            let mut known = self.known_states.write();
            known.retain(|id, _| records.iter().any(|r| r.id == *id));
            for (record, state) in polled {
                if known.insert(record.id.clone(), state) != Some(state) {
                    changed.push(record.view(Some(state)));
                }
            }
        }

        if !changed.is_empty() {
            tracing::debug!(changed = changed.len(), "display states changed");
            self.emit(StateEvent::DevicesChanged(changed.clone()));
        }
        Ok(changed)
    }
}
