// Device Restarter Library - retrying restart workflow for a device web interface
// This exposes the core components for testing and integration

pub mod cli;
pub mod clock;
pub mod config;
pub mod device;
pub mod driver;
pub mod shutdown;
pub mod telemetry;
pub mod workflows;

// Re-export key types for easy access
pub use clock::{Clock, ManualClock, MonotonicClock};
pub use config::{ConfigError, RestarterConfig};
pub use device::{DeviceError, DeviceOperations, HttpDeviceClient, Operation, SessionToken};
pub use driver::{run_blocking, DriverExit, DriverOptions, DriverSummary};
pub use shutdown::{ShutdownCoordinator, StopFlag};
pub use telemetry::{create_run_span, generate_run_id, init_telemetry, shutdown_telemetry};
pub use workflows::{
    BackoffPolicy,
    Engine,
    EngineError,
    Entry,
    RestartController,
    RestartStep,
    StateId,
    StepTick,
    TickReport,
    WorkflowStatus,
};
