//! Run one task to completion, rendering its events as they arrive.
//!
//! First Ctrl-C asks the process to stop and keeps rendering until it does.
//! A second Ctrl-C, or SIGTERM, cancels and waits at most the shutdown
//! grace period before giving up on the process.

use std::io::Write;
use std::time::Duration;

use anyhow::Context as _;
use tokio::sync::mpsc;
use vhsmon_core::SessionState;
use vhsmon_process::{Monitor, MonitorEvent, SessionReport, SupervisorError, TaskSlot};

use crate::context::TaskRequest;
use crate::render::Renderer;

/// Process exit status of `vhsmon` for a final session state.
pub fn exit_status(state: SessionState) -> i32 {
    match state {
        SessionState::Completed => 0,
        SessionState::Cancelled => 130,
        _ => 1,
    }
}

pub struct Settings {
    pub frame_rate: f64,
    pub shutdown_grace: Duration,
}

/// An operator signal aimed at `vhsmon` itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    CtrlC,
    Terminate,
}

/// Install the signal handlers once and forward every delivery in arrival
/// order. Signals that land while an event is being rendered stay queued.
pub fn listen_for_interrupts() -> anyhow::Result<mpsc::UnboundedReceiver<Interrupt>> {
    let (tx, rx) = mpsc::unbounded_channel();

    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut interrupt =
            signal(SignalKind::interrupt()).context("registering SIGINT handler")?;
        let mut terminate =
            signal(SignalKind::terminate()).context("registering SIGTERM handler")?;
        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    Some(()) = interrupt.recv() => Interrupt::CtrlC,
                    Some(()) = terminate.recv() => Interrupt::Terminate,
                    else => break,
                };
                if tx.send(received).is_err() {
                    break;
                }
            }
        });
    }
    #[cfg(not(unix))]
    {
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                if tx.send(Interrupt::CtrlC).is_err() {
                    break;
                }
            }
        });
    }

    Ok(rx)
}

pub async fn run_task<W: Write>(
    request: TaskRequest,
    settings: &Settings,
    renderer: &mut Renderer<W>,
    interrupts: &mut mpsc::UnboundedReceiver<Interrupt>,
) -> anyhow::Result<SessionState> {
    let TaskRequest {
        kind,
        command,
        arguments,
        context,
    } = request;

    let mut slot = TaskSlot::new(kind);
    let handle = match slot.launch(&command, arguments, context) {
        Ok(handle) => handle,
        Err(SupervisorError::Launch(e)) => {
            tracing::error!(%kind, error = %e, "launch failed");
            let report = SessionReport {
                kind,
                outcome: e.outcome(),
                latest_frame: 0,
                dropped_total: 0,
                skip_total: 0,
                elapsed_secs: 0.0,
                average_rate: None,
            };
            renderer.event(&MonitorEvent::Finished(report))?;
            return Ok(SessionState::Failed);
        }
        Err(e) => return Err(e.into()),
    };

    renderer
        .started(kind.as_str(), handle.command_line())
        .context("writing output")?;
    let mut monitor = Monitor::new(handle, settings.frame_rate);
    let mut ctrl_c_count = 0u32;
    let mut last_state = SessionState::Running;

    loop {
        tokio::select! {
            event = monitor.next() => {
                let Some(event) = event else { break };
                if let MonitorEvent::Finished(report) = &event {
                    last_state = report.outcome.state;
                }
                renderer.event(&event).context("writing output")?;
            }
            Some(interrupt) = interrupts.recv() => match interrupt {
                Interrupt::CtrlC => {
                    ctrl_c_count += 1;
                    if ctrl_c_count == 1 {
                        tracing::info!("received ctrl-c, cancelling {kind}");
                        monitor.control().cancel();
                    } else {
                        tracing::info!("received second ctrl-c, shutting down");
                        return shutdown(&slot, &mut monitor, renderer, settings.shutdown_grace)
                            .await;
                    }
                }
                Interrupt::Terminate => {
                    tracing::info!("received SIGTERM, shutting down");
                    return shutdown(&slot, &mut monitor, renderer, settings.shutdown_grace).await;
                }
            },
        }
    }

    Ok(last_state)
}

/// Cancel, wait up to `grace` for the process, and render whatever is left.
async fn shutdown<W: Write>(
    slot: &TaskSlot,
    monitor: &mut Monitor,
    renderer: &mut Renderer<W>,
    grace: Duration,
) -> anyhow::Result<SessionState> {
    let state = slot.shutdown(grace).await.unwrap_or(SessionState::Failed);
    if !state.is_terminal() {
        return Ok(state);
    }

    // The process is gone; flush its remaining output and report, bounded
    // in case a grandchild still holds the pipe open.
    let drain = async {
        let mut last = state;
        while let Some(event) = monitor.next().await {
            if let MonitorEvent::Finished(report) = &event {
                last = report.outcome.state;
            }
            renderer.event(&event)?;
        }
        Ok::<_, std::io::Error>(last)
    };
    match tokio::time::timeout(grace, drain).await {
        Ok(result) => result.context("writing output"),
        Err(_) => Ok(state),
    }
}
