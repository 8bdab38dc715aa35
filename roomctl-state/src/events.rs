//! Change notifications emitted by the aggregator

use std::net::Ipv4Addr;

use crate::model::{DeviceId, DeviceView};

/// Something observers should know about.
#[derive(Debug, Clone, PartialEq)]
pub enum StateEvent {
    /// One device was created, edited, or commanded
    DeviceChanged(DeviceView),

    /// Several devices changed together (refresh, polling)
    DevicesChanged(Vec<DeviceView>),

    DeviceDeleted(DeviceId),

    /// The locator found a device at a different address than stored.
    ///
    /// Raised before the registry is patched, so adapters that keep their
    /// own copy can reconcile.
    AddressDrift {
        id: DeviceId,
        old: Ipv4Addr,
        new: Ipv4Addr,
    },
}
