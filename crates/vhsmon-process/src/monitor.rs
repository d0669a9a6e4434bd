//! Consumer side of a session: raw line → classified event → aggregator,
//! with display lines tokenized on the way.
//!
//! [`Pipeline`] is the synchronous routing step and takes the clock as a
//! parameter. [`Monitor`] drives it from a [`SessionHandle`] on whatever task
//! owns the display, so aggregator state is never shared across tasks.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::Serialize;
use vhsmon_core::{
    Aggregator, ClassifiedEvent, SessionOutcome, StyledSegment, TaskKind, TelemetrySnapshot,
    tokenize,
};

use crate::supervisor::{SessionControl, SessionHandle};

/// Summary delivered once, after the final snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub kind: TaskKind,
    pub outcome: SessionOutcome,
    pub latest_frame: u64,
    pub dropped_total: u64,
    pub skip_total: u64,
    pub elapsed_secs: f64,
    /// Whole-session frames per second; only for completed runs that made
    /// progress.
    pub average_rate: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// A line for the log view.
    Display(Vec<StyledSegment>),
    Snapshot(TelemetrySnapshot),
    Finished(SessionReport),
}

// ─── Pipeline ───────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Pipeline {
    kind: TaskKind,
    aggregator: Aggregator,
}

impl Pipeline {
    pub fn new(kind: TaskKind, frame_rate: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            kind,
            aggregator: Aggregator::new(frame_rate, started_at),
        }
    }

    /// Route one raw line. A display event, when there is one, precedes any
    /// snapshot the same line triggers. Lines with no visible text (blank,
    /// whitespace, bare escape sequences) produce nothing.
    pub fn route(&mut self, raw: &str, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        if vhsmon_core::ansi::strip(raw).trim().is_empty() {
            return Vec::new();
        }
        let event = self.kind.classify(raw);
        let mut out = Vec::new();

        let show = match &event {
            ClassifiedEvent::PlainLine { .. } => true,
            ClassifiedEvent::FrameProgress { .. } | ClassifiedEvent::ReportedProgress { .. } => {
                self.kind.echoes_progress()
            }
            ClassifiedEvent::DroppedField | ClassifiedEvent::TrackSkip => false,
        };
        if show {
            out.push(MonitorEvent::Display(tokenize(raw)));
        }

        if let Some(snapshot) = self.aggregator.observe(&event, now) {
            out.push(MonitorEvent::Snapshot(snapshot));
        }
        out
    }

    /// Close the session: final snapshot (if any frame was reached), then
    /// the report.
    pub fn finish(&mut self, outcome: SessionOutcome, now: DateTime<Utc>) -> Vec<MonitorEvent> {
        let mut out = Vec::with_capacity(2);
        if let Some(snapshot) = self.aggregator.finalize(now) {
            out.push(MonitorEvent::Snapshot(snapshot));
        }

        let elapsed = now - self.aggregator.started_at();
        let average_rate = if outcome.is_success() {
            self.aggregator.average_rate(now)
        } else {
            None
        };
        out.push(MonitorEvent::Finished(SessionReport {
            kind: self.kind,
            outcome,
            latest_frame: self.aggregator.latest_frame(),
            dropped_total: self.aggregator.dropped_total(),
            skip_total: self.aggregator.skip_total(),
            elapsed_secs: elapsed.num_milliseconds().max(0) as f64 / 1000.0,
            average_rate,
        }));
        out
    }

    pub fn aggregator(&self) -> &Aggregator {
        &self.aggregator
    }
}

// ─── Monitor ────────────────────────────────────────────────────────

/// Async driver for a [`Pipeline`] over a live session.
#[derive(Debug)]
pub struct Monitor {
    handle: SessionHandle,
    pipeline: Pipeline,
    queue: VecDeque<MonitorEvent>,
    finished: bool,
}

impl Monitor {
    pub fn new(handle: SessionHandle, frame_rate: f64) -> Self {
        let pipeline = Pipeline::new(handle.kind(), frame_rate, handle.started_at());
        Self {
            handle,
            pipeline,
            queue: VecDeque::new(),
            finished: false,
        }
    }

    /// Next event; `None` after [`MonitorEvent::Finished`] has been yielded.
    /// Cancel-safe: routed events wait in the queue.
    pub async fn next(&mut self) -> Option<MonitorEvent> {
        loop {
            if let Some(event) = self.queue.pop_front() {
                return Some(event);
            }
            if self.finished {
                return None;
            }
            match self.handle.next_line().await {
                Some(line) => {
                    let events = self.pipeline.route(&line, Utc::now());
                    self.queue.extend(events);
                }
                None => {
                    let outcome = self.handle.outcome().await;
                    self.finished = true;
                    if let Some(outcome) = outcome {
                        let events = self.pipeline.finish(outcome, Utc::now());
                        self.queue.extend(events);
                    }
                }
            }
        }
    }

    pub fn control(&self) -> SessionControl {
        self.handle.control()
    }

    pub fn kind(&self) -> TaskKind {
        self.handle.kind()
    }

    pub fn command_line(&self) -> &str {
        self.handle.command_line()
    }
}
