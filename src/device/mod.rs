pub mod client;
pub mod protocol;

pub use client::{AttendanceDevice, DeviceError, UdpDeviceClient};
pub use protocol::PunchRecord;
