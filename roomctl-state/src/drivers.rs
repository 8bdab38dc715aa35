//! Picking a driver for a record

use std::net::SocketAddr;
use std::sync::Arc;

use roomctl_drivers::{
    ComputerDriver, DisplayDriver, DriverError, LightCredentials, LightingBackend, LightingDriver,
    MdcSettings, PowerControl, DEFAULT_WOL_TARGET,
};

use crate::model::{Category, DeviceRecord};

/// Builds a short-lived driver for one record.
pub trait DriverFactory: Send + Sync {
    fn driver_for(&self, device: &DeviceRecord) -> Result<Box<dyn PowerControl>, DriverError>;
}

/// Factory wiring each category to its concrete driver.
#[derive(Clone)]
pub struct DefaultDriverFactory {
    mdc: MdcSettings,
    lighting: Option<Arc<dyn LightingBackend>>,
    light_credentials: LightCredentials,
    wol_target: SocketAddr,
}

impl DefaultDriverFactory {
    pub fn new(mdc: MdcSettings) -> Self {
        Self {
            mdc,
            lighting: None,
            light_credentials: LightCredentials::default(),
            wol_target: DEFAULT_WOL_TARGET,
        }
    }

    /// Backend and fallback account for lights.
    pub fn with_lighting(
        mut self,
        backend: Arc<dyn LightingBackend>,
        credentials: LightCredentials,
    ) -> Self {
        self.lighting = Some(backend);
        self.light_credentials = credentials;
        self
    }

    pub fn with_wol_target(mut self, target: SocketAddr) -> Self {
        self.wol_target = target;
        self
    }
}

impl Default for DefaultDriverFactory {
    fn default() -> Self {
        Self::new(MdcSettings::default())
    }
}

impl DriverFactory for DefaultDriverFactory {
    fn driver_for(&self, device: &DeviceRecord) -> Result<Box<dyn PowerControl>, DriverError> {
        match device.category {
            Category::Display | Category::Projector => Ok(Box::new(DisplayDriver::new(
                device.ip.to_string(),
                &self.mdc,
            ))),
            Category::Light => {
                let backend = self.lighting.clone().ok_or_else(|| {
                    DriverError::InvalidConfig("no lighting backend configured".to_string())
                })?;
                let credentials = device.credentials().or(&self.light_credentials);
                Ok(Box::new(LightingDriver::new(backend, credentials, device.ip)))
            }
            Category::Computer => Ok(Box::new(ComputerDriver::new(device.mac, self.wol_target))),
        }
    }
}
