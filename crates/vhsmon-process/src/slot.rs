//! One-at-a-time launch slot per task kind.
//!
//! Decode and export each get their own slot; a slot refuses a second launch
//! while its previous session still has a live process.

use std::time::Duration;

use vhsmon_core::{SessionState, TaskKind, WorkingContext};

use crate::error::SupervisorError;
use crate::supervisor::{self, SessionControl, SessionHandle};

#[derive(Debug)]
pub struct TaskSlot {
    kind: TaskKind,
    current: Option<SessionControl>,
}

impl TaskSlot {
    pub fn new(kind: TaskKind) -> Self {
        Self {
            kind,
            current: None,
        }
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    /// A process launched from this slot has not reached a terminal state.
    pub fn is_busy(&self) -> bool {
        self.current.as_ref().is_some_and(|c| !c.state().is_terminal())
    }

    /// State of the most recent session, if any was launched.
    pub fn state(&self) -> Option<SessionState> {
        self.current.as_ref().map(SessionControl::state)
    }

    pub fn launch(
        &mut self,
        command: &str,
        arguments: Vec<String>,
        context: WorkingContext,
    ) -> Result<SessionHandle, SupervisorError> {
        if self.is_busy() {
            return Err(SupervisorError::AlreadyRunning { kind: self.kind });
        }
        let handle = supervisor::start(self.kind, command, arguments, context)?;
        self.current = Some(handle.control());
        Ok(handle)
    }

    /// Request cancellation of the current session. `false` when there is
    /// nothing to cancel.
    pub fn cancel(&self) -> bool {
        self.current.as_ref().is_some_and(SessionControl::cancel)
    }

    /// Cancel the current session and wait at most `grace` for it to end.
    ///
    /// Returns the last observed state; a non-terminal state means the
    /// process outlived the grace period and was left running.
    pub async fn shutdown(&self, grace: Duration) -> Option<SessionState> {
        let control = self.current.as_ref()?;
        if control.state().is_terminal() {
            return Some(control.state());
        }
        control.cancel();
        let state = control.wait_terminal(grace).await;
        if !state.is_terminal() {
            tracing::warn!(
                kind = %self.kind,
                pid = control.pid(),
                grace_ms = grace.as_millis() as u64,
                "process still running after shutdown grace period"
            );
        }
        Some(state)
    }
}
