//! Model types for roomctl-state

mod category;
mod device;
mod device_id;

pub use category::Category;
pub use device::{DeviceFilter, DevicePatch, DeviceRecord, DeviceState, DeviceView, NewDevice};
pub use device_id::DeviceId;
