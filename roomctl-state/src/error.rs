//! Error types for roomctl-state

use roomctl_discovery::LocatorError;
use roomctl_drivers::DriverError;

use crate::model::DeviceId;

/// Result type for roomctl-state operations
pub type Result<T> = std::result::Result<T, StateError>;

/// Errors surfaced by the state aggregator
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    /// A record (or a device on the network) could not be found
    #[error("{0}")]
    NotFound(String),

    /// Another record already uses this name, ip or mac
    #[error("{0}")]
    Conflict(String),

    /// The request itself is unusable
    #[error("{0}")]
    Validation(String),

    /// A driver failed
    #[error(transparent)]
    Driver(#[from] DriverError),

    /// Address resolution failed
    #[error(transparent)]
    Locator(#[from] LocatorError),

    /// The registry adapter failed
    #[error("Registry error: {0}")]
    Registry(RegistryError),
}

impl From<RegistryError> for StateError {
    fn from(error: RegistryError) -> Self {
        match error {
            RegistryError::NotFound(_) => StateError::NotFound("Device not found".to_string()),
            RegistryError::Conflict { .. } => StateError::Conflict(error.to_string()),
            RegistryError::Storage(_) => StateError::Registry(error),
        }
    }
}

/// Errors raised by [`DeviceRegistry`](crate::DeviceRegistry) adapters
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Device {0} not found")]
    NotFound(DeviceId),

    #[error("Device already exists: {field} is already registered")]
    Conflict { field: &'static str },

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<std::io::Error> for RegistryError {
    fn from(error: std::io::Error) -> Self {
        RegistryError::Storage(error.to_string())
    }
}

impl From<serde_json::Error> for RegistryError {
    fn from(error: serde_json::Error) -> Self {
        RegistryError::Storage(error.to_string())
    }
}
