//! roomctl State
//!
//! Device model, registry contract and the state aggregator that ties the
//! registry, the network locator and the device drivers together.
//!
//! # Architecture
//!
//! ```text
//! DeviceRegistry ─┐
//! AddressResolver ├─> DeviceService ──> StateEvent ──> RealtimeMessage
//! DriverFactory ──┘        ▲
//!                          └── RefreshSchedule / StatePoller
//! ```
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use roomctl_discovery::{LocatorConfig, NetworkLocator};
//! use roomctl_state::{DefaultDriverFactory, DeviceFilter, DeviceService, MemoryRegistry, ServiceConfig};
//!
//! let service = DeviceService::new(
//!     Arc::new(MemoryRegistry::open("data/devices.json").await?),
//!     Arc::new(NetworkLocator::new(LocatorConfig::default())),
//!     Arc::new(DefaultDriverFactory::default()),
//!     ServiceConfig::default(),
//! );
//!
//! for device in service.list(&DeviceFilter::all()).await? {
//!     println!("{} {:?}", device.device_name, device.state);
//! }
//! ```

pub mod drivers;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod protocol;
pub mod registry;
pub mod scheduler;
pub mod service;

pub use drivers::{DefaultDriverFactory, DriverFactory};
pub use error::{RegistryError, Result, StateError};
pub use events::StateEvent;
pub use model::{
    Category, DeviceFilter, DeviceId, DevicePatch, DeviceRecord, DeviceState, DeviceView,
    NewDevice,
};
pub use protocol::{DeletedDevice, DeviceUpdate, RealtimeMessage};
pub use registry::{DeviceRegistry, MemoryRegistry};
pub use scheduler::{PeriodicTask, RefreshSchedule, StatePoller};
pub use service::{DeviceService, RefreshOutcome, RefreshReport, ServiceConfig};
