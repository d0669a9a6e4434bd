//! Line classifier: maps one raw output line to a [`ClassifiedEvent`].
//!
//! Each rule is a small pure predicate or extractor so it can be tested on
//! its own. [`classify`] applies the decode rules in fixed precedence:
//! frame progress, dropped field, track skip, plain line.
//! [`classify_export`] applies the export tool's single progress rule.

use serde::{Deserialize, Serialize};

/// Literal preceding the frame number in decoder progress lines.
pub const FRAME_PREFIX: &str = "File Frame ";
/// Literal following the frame number in decoder progress lines.
pub const FRAME_SUFFIX: &str = ": VHS";
/// Substring marking a dropped field.
pub const DROPPED_FIELD_MARKER: &str = "dropping field";
/// Substring marking a skipped track.
pub const TRACK_SKIP_MARKER: &str = "skipped a track";
/// Literal that starts an export progress line.
pub const EXPORT_PREFIX: &str = "Info:";

// ─── Types ──────────────────────────────────────────────────────────

/// Exactly one event per input line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifiedEvent {
    /// Decoder reached `frame`.
    FrameProgress { frame: u64 },
    /// Export tool reached `frame`, reporting its own rate when parseable.
    ReportedProgress { frame: u64, rate: Option<f64> },
    DroppedField,
    TrackSkip,
    /// Anything else; destined for the display path untouched.
    PlainLine { text: String },
}

impl ClassifiedEvent {
    /// Frame carried by a progress event.
    pub fn frame(&self) -> Option<u64> {
        match self {
            Self::FrameProgress { frame } | Self::ReportedProgress { frame, .. } => Some(*frame),
            _ => None,
        }
    }

    pub fn is_progress(&self) -> bool {
        self.frame().is_some()
    }
}

// ─── Classifiers ────────────────────────────────────────────────────

/// Classify a decoder output line. First matching rule wins.
pub fn classify(line: &str) -> ClassifiedEvent {
    if let Some(frame) = extract_frame(line) {
        ClassifiedEvent::FrameProgress { frame }
    } else if is_dropped_field(line) {
        ClassifiedEvent::DroppedField
    } else if is_track_skip(line) {
        ClassifiedEvent::TrackSkip
    } else {
        ClassifiedEvent::PlainLine {
            text: line.to_owned(),
        }
    }
}

/// Classify an export tool output line.
pub fn classify_export(line: &str) -> ClassifiedEvent {
    match extract_export_progress(line) {
        Some((frame, rate)) => ClassifiedEvent::ReportedProgress { frame, rate },
        None => ClassifiedEvent::PlainLine {
            text: line.to_owned(),
        },
    }
}

// ─── Rules ──────────────────────────────────────────────────────────

/// Find `File Frame <digits>: VHS` anywhere in the line.
///
/// A digit run that overflows `u64` is not a match; the next occurrence (if
/// any) is tried instead.
pub fn extract_frame(line: &str) -> Option<u64> {
    line.match_indices(FRAME_PREFIX).find_map(|(pos, _)| {
        let mut scan = Scanner::new(&line[pos + FRAME_PREFIX.len()..]);
        let digits = scan.digits()?;
        scan.literal(FRAME_SUFFIX)?;
        digits.parse().ok()
    })
}

pub fn is_dropped_field(line: &str) -> bool {
    line.contains(DROPPED_FIELD_MARKER)
}

pub fn is_track_skip(line: &str) -> bool {
    line.contains(TRACK_SKIP_MARKER)
}

/// Find `Info: <frames> frames processed - <fps> FPS` anywhere in the line,
/// with one or more whitespace characters between tokens.
pub fn extract_export_progress(line: &str) -> Option<(u64, Option<f64>)> {
    line.match_indices(EXPORT_PREFIX).find_map(|(pos, _)| {
        let mut scan = Scanner::new(&line[pos + EXPORT_PREFIX.len()..]);
        scan.whitespace()?;
        let frames = scan.digits()?;
        scan.whitespace()?;
        scan.literal("frames processed")?;
        scan.whitespace()?;
        scan.literal("-")?;
        scan.whitespace()?;
        let rate = scan.take_while(|c| c.is_ascii_digit() || c == '.')?;
        scan.whitespace()?;
        scan.literal("FPS")?;
        let frame = frames.parse().ok()?;
        Some((frame, rate.parse::<f64>().ok()))
    })
}

// ─── Scanner ────────────────────────────────────────────────────────

/// Forward-only cursor over a string slice. Every step returns `None` when
/// it cannot consume at least one character.
struct Scanner<'a> {
    rest: &'a str,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self { rest: input }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> Option<&'a str> {
        let end = self
            .rest
            .char_indices()
            .find(|&(_, c)| !pred(c))
            .map_or(self.rest.len(), |(i, _)| i);
        if end == 0 {
            return None;
        }
        let (taken, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(taken)
    }

    fn digits(&mut self) -> Option<&'a str> {
        self.take_while(|c| c.is_ascii_digit())
    }

    fn whitespace(&mut self) -> Option<()> {
        self.take_while(char::is_whitespace).map(|_| ())
    }

    fn literal(&mut self, lit: &str) -> Option<()> {
        self.rest = self.rest.strip_prefix(lit)?;
        Some(())
    }
}
