//! Terminal rendering of monitor events: styled text or NDJSON.

use std::io::Write;

use serde::Serialize;
use vhsmon_core::{Color, FailureReason, SessionState, StyledSegment, TelemetrySnapshot};
use vhsmon_process::{MonitorEvent, SessionReport};

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[2m";

/// NDJSON record, one per line.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum JsonEvent<'a> {
    Started {
        kind: &'a str,
        command: &'a str,
    },
    Display {
        text: String,
        segments: &'a [StyledSegment],
    },
    Snapshot(&'a TelemetrySnapshot),
    Finished(&'a SessionReport),
}

pub struct Renderer<W> {
    out: W,
    color: bool,
    json: bool,
}

impl<W: Write> Renderer<W> {
    pub fn new(out: W, color: bool, json: bool) -> Self {
        Self { out, color, json }
    }

    pub fn started(&mut self, kind: &str, command: &str) -> std::io::Result<()> {
        if self.json {
            return self.json_line(&JsonEvent::Started { kind, command });
        }
        let line = self.dim(&format!("$ {command}"));
        self.text_line(&line)
    }

    pub fn event(&mut self, event: &MonitorEvent) -> std::io::Result<()> {
        match (event, self.json) {
            (MonitorEvent::Display(segments), true) => self.json_line(&JsonEvent::Display {
                text: segments.iter().map(|s| s.text.as_str()).collect(),
                segments,
            }),
            (MonitorEvent::Display(segments), false) => {
                let line = format_segments(segments, self.color);
                self.text_line(&line)
            }
            (MonitorEvent::Snapshot(snapshot), true) => {
                self.json_line(&JsonEvent::Snapshot(snapshot))
            }
            (MonitorEvent::Snapshot(snapshot), false) => {
                let line = self.dim(&format_snapshot(snapshot));
                self.text_line(&line)
            }
            (MonitorEvent::Finished(report), true) => self.json_line(&JsonEvent::Finished(report)),
            (MonitorEvent::Finished(report), false) => {
                let line = paint(&format_report(report), Some(report_color(report)), self.color);
                self.text_line(&line)
            }
        }
    }

    #[cfg(test)]
    pub fn into_inner(self) -> W {
        self.out
    }

    // ------ internal ------

    fn text_line(&mut self, line: &str) -> std::io::Result<()> {
        writeln!(self.out, "{line}")?;
        self.out.flush()
    }

    fn json_line(&mut self, event: &JsonEvent<'_>) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.out, event)?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn dim(&self, text: &str) -> String {
        if self.color {
            format!("{DIM}{text}{RESET}")
        } else {
            text.to_string()
        }
    }
}

// ─── Formatting ──────────────────────────────────────────────────

/// Re-encode styled segments for a terminal. Without color only the text
/// survives.
pub fn format_segments(segments: &[StyledSegment], color: bool) -> String {
    segments
        .iter()
        .map(|segment| match segment.style {
            Some(style) => paint(&segment.text, Some(style), color),
            None => segment.text.clone(),
        })
        .collect()
}

pub fn format_snapshot(snapshot: &TelemetrySnapshot) -> String {
    format!(
        "frame {} | {} | {:.1} fps | dropped {} | skipped {}",
        snapshot.frame,
        snapshot.timecode,
        snapshot.instantaneous_rate,
        snapshot.dropped_count,
        snapshot.skipped_track_count,
    )
}

/// One-line summary of how the session ended.
pub fn format_report(report: &SessionReport) -> String {
    let kind = report.kind.as_str();
    let outcome = &report.outcome;
    match outcome.state {
        SessionState::Completed => match report.average_rate {
            Some(rate) if report.latest_frame > 0 => format!(
                "{kind} complete: {} frames in {}, average {rate:.1} fps",
                report.latest_frame,
                format_elapsed(report.elapsed_secs),
            ),
            _ => format!("{kind} complete (no frames processed)"),
        },
        SessionState::Cancelled => match outcome.exit_code {
            Some(code) => format!("{kind} cancelled (exit code {code})"),
            None => format!("{kind} cancelled"),
        },
        _ => match (&outcome.failure, outcome.exit_code) {
            (Some(FailureReason::ExitCode { code }), _) => {
                format!("{kind} failed with exit code {code}")
            }
            (Some(reason), _) => format!("{kind} failed: {reason}"),
            (None, Some(code)) => format!("{kind} failed with exit code {code}"),
            (None, None) => format!("{kind} failed"),
        },
    }
}

/// `4.2s`, `3m 07s`, `1h 02m 05s`.
pub fn format_elapsed(secs: f64) -> String {
    if secs < 60.0 {
        return format!("{secs:.1}s");
    }
    let total = secs as u64;
    let (h, m, s) = (total / 3600, (total / 60) % 60, total % 60);
    if h == 0 {
        format!("{m}m {s:02}s")
    } else {
        format!("{h}h {m:02}m {s:02}s")
    }
}

fn report_color(report: &SessionReport) -> Color {
    match report.outcome.state {
        SessionState::Completed => Color::Green,
        SessionState::Cancelled => Color::Yellow,
        _ => Color::Red,
    }
}

fn paint(text: &str, style: Option<Color>, color: bool) -> String {
    match style {
        Some(style) if color => format!("\x1b[{}m{text}{RESET}", style.sgr_code()),
        _ => text.to_string(),
    }
}
