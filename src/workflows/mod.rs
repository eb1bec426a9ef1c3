// Workflow modules: a generic tick-driven engine and the device restart
// workflow built on it

pub mod backoff;
pub mod engine;
pub mod restart;

pub use backoff::{BackoffPolicy, RetryTimer};
pub use engine::{Engine, EngineError, Entry, StateId, TickReport};
pub use restart::{RestartController, RestartStep, StepTick, WorkflowData, WorkflowStatus};
