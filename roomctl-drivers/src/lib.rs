//! Device drivers for roomctl
//!
//! Each kind of device gets a driver implementing [`PowerControl`]:
//!
//! * [`DisplayDriver`] for displays and projectors, over MDC on port 1515
//! * [`LightingDriver`] for smart lights, through a swappable [`LightingBackend`]
//! * [`ComputerDriver`] for computers, which can only be woken
//!
//! Drivers are plain values built per operation. Nothing here keeps a
//! connection open between calls.
//!
//! ```no_run
//! use roomctl_drivers::{DisplayDriver, MdcSettings, PowerControl, PowerState};
//!
//! # async fn example() -> roomctl_drivers::Result<()> {
//! let display = DisplayDriver::new("192.168.1.40", &MdcSettings::default());
//! if display.query_state().await? != PowerState::On {
//!     display.power_on().await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod computer;
pub mod display;
pub mod error;
pub mod lighting;
pub mod power;

pub use computer::{magic_packet, ComputerDriver, DEFAULT_WOL_TARGET};
pub use display::{DisplayDriver, MdcSettings};
pub use error::{DriverError, Result};
pub use lighting::{
    BridgeBackend, LightCredentials, LightInfo, LightingBackend, LightingDriver, LightingSession,
};
pub use power::{PowerAction, PowerControl, PowerState};
