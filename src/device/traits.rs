// Device operations interface - the restart workflow only sees this trait

use crate::device::errors::DeviceError;
use crate::device::types::SessionToken;

/// The four remote calls that make up one restart cycle.
///
/// Implementations must bound their own latency (e.g. with a request timeout);
/// the workflow calls them synchronously from inside a state action.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait DeviceOperations {
    /// Load the root page and return the session cookie it sets
    fn fetch_root(&self) -> Result<SessionToken, DeviceError>;

    /// Open the session
    fn initialize_session(&self, token: &SessionToken) -> Result<(), DeviceError>;

    /// Log in
    fn authenticate(&self, token: &SessionToken) -> Result<(), DeviceError>;

    /// Post the configuration change
    fn apply_configuration(&self, token: &SessionToken) -> Result<(), DeviceError>;
}
