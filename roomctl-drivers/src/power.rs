//! The driver contract shared by every device kind.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{DriverError, Result};

pub use mdc::PowerState;

/// A power command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PowerAction {
    On,
    Off,
}

impl PowerAction {
    /// The state a successful command leaves the device in.
    pub fn target_state(&self) -> PowerState {
        match self {
            PowerAction::On => PowerState::On,
            PowerAction::Off => PowerState::Off,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PowerAction::On => "on",
            PowerAction::Off => "off",
        }
    }
}

impl FromStr for PowerAction {
    type Err = DriverError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "on" | "wake" => Ok(PowerAction::On),
            "off" | "shutdown" => Ok(PowerAction::Off),
            other => Err(DriverError::InvalidConfig(format!(
                "unknown power action '{other}'"
            ))),
        }
    }
}

impl fmt::Display for PowerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Power control for one device.
///
/// Implementations are cheap, short-lived values built per operation; they
/// hold addresses and credentials, never open connections.
#[async_trait]
pub trait PowerControl: Send + Sync {
    async fn power_on(&self) -> Result<()>;

    async fn power_off(&self) -> Result<()>;

    /// Current power state.
    ///
    /// An unreachable device is an error, never [`PowerState::Off`].
    async fn query_state(&self) -> Result<PowerState>;

    async fn apply(&self, action: PowerAction) -> Result<()> {
        match action {
            PowerAction::On => self.power_on().await,
            PowerAction::Off => self.power_off().await,
        }
    }
}
