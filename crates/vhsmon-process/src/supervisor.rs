//! Process supervisor: spawns the external tool and owns its lifecycle.
//!
//! Per session there are two units of execution:
//!
//! 1. a blocking reader that drains the merged stdout/stderr pipe, splits it
//!    into lines and pushes them onto an unbounded channel (it never waits
//!    on the consumer);
//! 2. a waiter task that owns the [`ProcessSession`], applies cancel
//!    requests, reaps the child and delivers the outcome once.
//!
//! Consumers only see channels: the line queue, a `watch` of the session
//! state, and a `oneshot` carrying the outcome.

use std::io::Read;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::{JoinError, JoinHandle};
use vhsmon_core::{
    FailureReason, LineSplitter, ProcessSession, SessionOutcome, SessionState, TaskKind,
    WorkingContext,
};

use crate::error::LaunchError;
use crate::signal::{self, CancelSignal};

const READ_BUF_SIZE: usize = 16 * 1024; // 16 KiB

// ---------------------------------------------------------------------------
// SessionControl
// ---------------------------------------------------------------------------

/// Cloneable control side of a session: observe state, request cancel.
#[derive(Debug, Clone)]
pub struct SessionControl {
    kind: TaskKind,
    pid: Option<u32>,
    cancel_tx: mpsc::UnboundedSender<()>,
    state_rx: watch::Receiver<SessionState>,
}

impl SessionControl {
    /// Ask the process to stop. Returns `false` when the session is already
    /// terminal; repeated requests while a cancel is pending are ignored by
    /// the supervisor.
    pub fn cancel(&self) -> bool {
        if self.state().is_terminal() {
            return false;
        }
        self.cancel_tx.send(()).is_ok()
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn kind(&self) -> TaskKind {
        self.kind
    }

    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    /// Wait up to `limit` for the session to reach a terminal state.
    /// Returns the state observed when the wait ended.
    pub async fn wait_terminal(&self, limit: Duration) -> SessionState {
        let mut rx = self.state_rx.clone();
        let reached = tokio::time::timeout(limit, rx.wait_for(|s| s.is_terminal()))
            .await
            .ok()
            .and_then(|r| r.ok().map(|state| *state));
        // Timed out, or the supervisor went away without a terminal state.
        reached.unwrap_or_else(|| *rx.borrow())
    }
}

// ---------------------------------------------------------------------------
// SessionHandle
// ---------------------------------------------------------------------------

/// Consumer side of a running session.
#[derive(Debug)]
pub struct SessionHandle {
    control: SessionControl,
    command_line: String,
    started_at: DateTime<Utc>,
    lines: mpsc::UnboundedReceiver<String>,
    outcome: Option<oneshot::Receiver<SessionOutcome>>,
}

impl SessionHandle {
    /// Next raw output line in arrival order; `None` once the process has
    /// closed its output and every line has been taken.
    pub async fn next_line(&mut self) -> Option<String> {
        self.lines.recv().await
    }

    /// Wait for the terminal outcome. Yields it exactly once; later calls
    /// return `None`. Cancel-safe.
    pub async fn outcome(&mut self) -> Option<SessionOutcome> {
        let rx = self.outcome.as_mut()?;
        let received = rx.await;
        self.outcome = None;
        match received {
            Ok(outcome) => Some(outcome),
            Err(_) => Some(SessionOutcome {
                state: SessionState::Failed,
                exit_code: None,
                failure: Some(FailureReason::StreamRead {
                    detail: "supervisor stopped before reporting an outcome".into(),
                }),
            }),
        }
    }

    pub fn control(&self) -> SessionControl {
        self.control.clone()
    }

    pub fn kind(&self) -> TaskKind {
        self.control.kind
    }

    pub fn state(&self) -> SessionState {
        self.control.state()
    }

    pub fn cancel(&self) -> bool {
        self.control.cancel()
    }

    pub fn command_line(&self) -> &str {
        &self.command_line
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }
}

// ---------------------------------------------------------------------------
// start
// ---------------------------------------------------------------------------

/// Spawn `command` with `arguments` and begin supervising it.
///
/// stdout and stderr share one pipe so lines keep the order the process
/// wrote them in. On unix the child leads its own process group, so a
/// terminal Ctrl-C reaches only us and the cancel signal is the only one it
/// gets. Must be called from within a tokio runtime; returns as soon as the
/// child is spawned.
pub fn start(
    kind: TaskKind,
    command: &str,
    arguments: Vec<String>,
    context: WorkingContext,
) -> Result<SessionHandle, LaunchError> {
    let mut session = ProcessSession::new(command, arguments, context);
    let command_line = session.display_command();

    let (reader, writer) = std::io::pipe().map_err(|e| LaunchError::from_io(command, e))?;
    let stderr_writer = writer
        .try_clone()
        .map_err(|e| LaunchError::from_io(command, e))?;

    let mut cmd = Command::new(command);
    cmd.args(session.arguments())
        .stdin(Stdio::null())
        .stdout(writer)
        .stderr(stderr_writer);
    #[cfg(unix)]
    cmd.process_group(0);
    let spawned = cmd.spawn();
    // The Command still holds the write ends; the reader only sees EOF once
    // every copy outside the child is closed.
    drop(cmd);
    let child = spawned.map_err(|e| LaunchError::from_io(command, e))?;

    session.mark_running();
    let started_at = Utc::now();
    let pid = child.id();
    tracing::info!(%kind, pid, command = %command_line, "process started");

    let (line_tx, line_rx) = mpsc::unbounded_channel();
    let reader_task = tokio::task::spawn_blocking(move || pump_lines(reader, line_tx));

    let (cancel_tx, cancel_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(session.state());
    let (outcome_tx, outcome_rx) = oneshot::channel();

    tokio::spawn(supervise(
        Supervised {
            child,
            session,
            signal: CancelSignal::for_task(kind),
            reader: reader_task,
        },
        cancel_rx,
        state_tx,
        outcome_tx,
    ));

    Ok(SessionHandle {
        control: SessionControl {
            kind,
            pid,
            cancel_tx,
            state_rx,
        },
        command_line,
        started_at,
        lines: line_rx,
        outcome: Some(outcome_rx),
    })
}

// ---------------------------------------------------------------------------
// Internal
// ---------------------------------------------------------------------------

struct Supervised {
    child: Child,
    session: ProcessSession,
    signal: CancelSignal,
    reader: JoinHandle<std::io::Result<()>>,
}

async fn supervise(
    supervised: Supervised,
    mut cancel_rx: mpsc::UnboundedReceiver<()>,
    state_tx: watch::Sender<SessionState>,
    outcome_tx: oneshot::Sender<SessionOutcome>,
) {
    let Supervised {
        mut child,
        mut session,
        signal,
        reader,
    } = supervised;
    let pid = child.id();

    let status = loop {
        tokio::select! {
            status = child.wait() => break status,
            Some(()) = cancel_rx.recv() => {
                if !session.request_cancel() {
                    continue;
                }
                state_tx.send_replace(session.state());
                match signal::deliver(&mut child, signal) {
                    Ok(()) => tracing::info!(pid, signal = signal.as_str(), "cancel requested"),
                    Err(e) => tracing::warn!(pid, error = %e, "failed to signal process"),
                }
            }
        }
    };

    // Lines written before exit are still in the pipe; drain them before
    // reporting so the outcome always follows the last line.
    let read_result = reader.await;
    let outcome = settle(&mut session, status, read_result);

    match outcome.state {
        SessionState::Completed => tracing::info!(pid, "process completed"),
        SessionState::Cancelled => {
            tracing::info!(pid, exit_code = outcome.exit_code, "process cancelled")
        }
        _ => tracing::warn!(
            pid,
            exit_code = outcome.exit_code,
            detail = %outcome.error_detail().unwrap_or_default(),
            "process failed"
        ),
    }

    state_tx.send_replace(outcome.state);
    let _ = outcome_tx.send(outcome);
}

/// Fold the wait result and the reader result into the terminal outcome.
/// A failed read fails the run even when the process exited cleanly; the
/// exit code is kept when there is one.
fn settle(
    session: &mut ProcessSession,
    status: std::io::Result<ExitStatus>,
    read_result: Result<std::io::Result<()>, JoinError>,
) -> SessionOutcome {
    let status = match status {
        Ok(status) => status,
        Err(e) => {
            return session.fail(
                FailureReason::StreamRead {
                    detail: format!("waiting for process: {e}"),
                },
                None,
            );
        }
    };
    let code = signal::exit_code(status);
    let read_error = match read_result {
        Ok(Ok(())) => return session.finish(code),
        Ok(Err(e)) => e.to_string(),
        Err(e) => e.to_string(),
    };
    session.fail(FailureReason::StreamRead { detail: read_error }, Some(code))
}

/// Blocking read loop over the merged output pipe.
///
/// Keeps draining even after the consumer hangs up so the child never
/// stalls on a full pipe.
fn pump_lines(
    mut reader: std::io::PipeReader,
    tx: mpsc::UnboundedSender<String>,
) -> std::io::Result<()> {
    let mut splitter = LineSplitter::new();
    let mut buf = vec![0u8; READ_BUF_SIZE];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        };
        for line in splitter.push(&buf[..n]) {
            let _ = tx.send(line);
        }
    }

    if let Some(tail) = splitter.finish() {
        let _ = tx.send(tail);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
