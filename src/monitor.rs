//! Poll engines, fleet coordination, and the canonical status record.

pub mod engine;
pub mod fleet;
pub mod record;
pub mod shutdown;

pub use fleet::MonitorFleet;
pub use record::{DeviceStatus, StatusRecord};
