//! vhsmon-process: process IO boundary.
//! Spawns the external tool, merges its output streams into lines,
//! delivers cancel signals, and turns the line stream into display lines
//! and throttled telemetry on the consumer side.

pub mod error;
pub mod monitor;
pub mod sidecar;
pub mod signal;
pub mod slot;
pub mod supervisor;

pub use error::{LaunchError, SidecarError, SupervisorError};
pub use monitor::{Monitor, MonitorEvent, Pipeline, SessionReport};
pub use sidecar::discover_align_inputs;
pub use signal::CancelSignal;
pub use slot::TaskSlot;
pub use supervisor::{SessionControl, SessionHandle, start};
