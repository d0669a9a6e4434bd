//! Error types for launching and slotting supervised processes.

use std::path::PathBuf;

use thiserror::Error;
use vhsmon_core::{FailureReason, SessionOutcome, SessionState, TaskKind};

#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("'{command}' not found; ensure it is installed and on your PATH")]
    NotFound { command: String },

    #[error("failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },
}

impl LaunchError {
    /// Classify a spawn error, mapping `io::ErrorKind::NotFound` to
    /// [`LaunchError::NotFound`].
    pub fn from_io(command: &str, source: std::io::Error) -> Self {
        if source.kind() == std::io::ErrorKind::NotFound {
            Self::NotFound {
                command: command.to_owned(),
            }
        } else {
            Self::Spawn {
                command: command.to_owned(),
                source,
            }
        }
    }

    pub fn failure_reason(&self) -> FailureReason {
        match self {
            Self::NotFound { command } => FailureReason::NotFound {
                command: command.clone(),
            },
            Self::Spawn { command, source } => FailureReason::Spawn {
                command: command.clone(),
                detail: source.to_string(),
            },
        }
    }

    /// Terminal outcome for a session that never started.
    pub fn outcome(&self) -> SessionOutcome {
        SessionOutcome {
            state: SessionState::Failed,
            exit_code: None,
            failure: Some(self.failure_reason()),
        }
    }
}

/// Align needs files the decoder and a capture tool leave next to the
/// capture; they are found by pattern, not derived from the name.
#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("no {pattern} file found in {}", .dir.display())]
    Missing { pattern: &'static str, dir: PathBuf },

    #[error("invalid search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Launch(#[from] LaunchError),

    #[error("{kind} task is already running")]
    AlreadyRunning { kind: TaskKind },
}
