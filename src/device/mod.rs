// Device module - the remote side of the restart workflow
//
// The workflow talks to the device only through the DeviceOperations trait;
// HttpDeviceClient is the production implementation.

pub mod client;
pub mod cookie;
pub mod errors;
pub mod traits;
pub mod types;

#[cfg(test)]
pub mod mocks;

pub use client::HttpDeviceClient;
pub use cookie::parse_set_cookie;
pub use errors::DeviceError;
pub use traits::DeviceOperations;
#[cfg(any(test, feature = "testing"))]
pub use traits::MockDeviceOperations;
pub use types::{Operation, SessionToken};
