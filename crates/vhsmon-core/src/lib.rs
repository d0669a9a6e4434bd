//! vhsmon-core: pure building blocks for supervising a batch decode.
//! Timecode conversion, ANSI tokenizing, line classification, telemetry
//! aggregation, and the process session state machine. No IO, no async;
//! every time value is passed in by the caller.

pub mod ansi;
pub mod classify;
pub mod lines;
pub mod session;
pub mod task;
pub mod telemetry;
pub mod timecode;

pub use ansi::{Color, StyledSegment, tokenize};
pub use classify::{ClassifiedEvent, classify, classify_export};
pub use lines::{LineSplitter, MAX_LINE_BYTES};
pub use session::{FailureReason, ProcessSession, SessionOutcome, SessionState, classify_exit};
pub use task::{TaskKind, WorkingContext, pick_sidecar, split_arguments};
pub use telemetry::{Aggregator, THROTTLE_INTERVAL_SECS, TelemetrySnapshot};
pub use timecode::{DEFAULT_FRAME_RATE, to_timecode, timecode_from_str};
