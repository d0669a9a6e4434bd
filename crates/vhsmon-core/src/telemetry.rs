//! Telemetry aggregator: folds classified events into counters and a
//! latest frame, and throttles snapshot emission to one per
//! [`THROTTLE_INTERVAL_SECS`].
//!
//! Pure state machine. The caller passes the current time into every
//! time-dependent call; nothing here reads the system clock.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::classify::ClassifiedEvent;
use crate::timecode::to_timecode;

/// Minimum spacing between throttled snapshots.
pub const THROTTLE_INTERVAL_SECS: i64 = 5;

// ─── Snapshot ───────────────────────────────────────────────────────

/// Point-in-time progress summary for one session.
///
/// `frame`, `dropped_count` and `skipped_track_count` never decrease within
/// a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetrySnapshot {
    pub frame: u64,
    pub timecode: String,
    /// Frames per second since the previous snapshot.
    pub instantaneous_rate: f64,
    pub dropped_count: u64,
    pub skipped_track_count: u64,
    pub timestamp: DateTime<Utc>,
}

// ─── Aggregator ─────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Aggregator {
    frame_rate: f64,
    started_at: DateTime<Utc>,
    last_emitted_frame: u64,
    last_emitted_at: DateTime<Utc>,
    /// Updated on every progress event, ahead of emission.
    latest_frame: u64,
    seen_progress: bool,
    dropped_buffer: u64,
    skip_buffer: u64,
    dropped_total: u64,
    skip_total: u64,
    rate: f64,
    /// Rate reported by the supervised tool itself, if it reports one.
    reported_rate: Option<f64>,
}

impl Aggregator {
    /// Start aggregating a session that began at `started_at`. The throttle
    /// window is measured from this instant until the first emission.
    pub fn new(frame_rate: f64, started_at: DateTime<Utc>) -> Self {
        Self {
            frame_rate,
            started_at,
            last_emitted_frame: 0,
            last_emitted_at: started_at,
            latest_frame: 0,
            seen_progress: false,
            dropped_buffer: 0,
            skip_buffer: 0,
            dropped_total: 0,
            skip_total: 0,
            rate: 0.0,
            reported_rate: None,
        }
    }

    /// Fold one event into the buffered state. Plain lines are ignored.
    pub fn ingest(&mut self, event: &ClassifiedEvent) {
        match event {
            ClassifiedEvent::FrameProgress { frame } => self.record_frame(*frame),
            ClassifiedEvent::ReportedProgress { frame, rate } => {
                self.record_frame(*frame);
                if let Some(rate) = rate.filter(|r| r.is_finite() && *r >= 0.0) {
                    self.reported_rate = Some(rate);
                }
            }
            ClassifiedEvent::DroppedField => self.dropped_buffer += 1,
            ClassifiedEvent::TrackSkip => self.skip_buffer += 1,
            ClassifiedEvent::PlainLine { .. } => {}
        }
    }

    /// Ingest `event` and, if it was progress, try a throttled emission.
    pub fn observe(
        &mut self,
        event: &ClassifiedEvent,
        now: DateTime<Utc>,
    ) -> Option<TelemetrySnapshot> {
        self.ingest(event);
        if event.is_progress() {
            self.maybe_emit(now)
        } else {
            None
        }
    }

    /// Emit a snapshot if at least one progress event has been seen and the
    /// throttle interval has elapsed since the last emission.
    pub fn maybe_emit(&mut self, now: DateTime<Utc>) -> Option<TelemetrySnapshot> {
        if !self.seen_progress {
            return None;
        }
        if now - self.last_emitted_at < TimeDelta::seconds(THROTTLE_INTERVAL_SECS) {
            return None;
        }
        Some(self.emit(now))
    }

    /// Flush buffered counters and emit a final snapshot regardless of the
    /// throttle, provided any frame beyond 0 was reached.
    pub fn finalize(&mut self, now: DateTime<Utc>) -> Option<TelemetrySnapshot> {
        self.flush_buffers();
        if self.latest_frame == 0 {
            return None;
        }
        Some(self.emit(now))
    }

    /// Average frames per second over the whole session, for display after
    /// a successful run. `None` with no frames or no elapsed time.
    pub fn average_rate(&self, now: DateTime<Utc>) -> Option<f64> {
        let elapsed = seconds(now - self.started_at);
        if self.latest_frame == 0 || elapsed <= 0.0 {
            return None;
        }
        Some(self.latest_frame as f64 / elapsed)
    }

    pub fn latest_frame(&self) -> u64 {
        self.latest_frame
    }

    /// Dropped fields folded into snapshots so far.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total
    }

    /// Track skips folded into snapshots so far.
    pub fn skip_total(&self) -> u64 {
        self.skip_total
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    // ------------------------------------------------------------------
    // internal
    // ------------------------------------------------------------------

    fn record_frame(&mut self, frame: u64) {
        self.latest_frame = self.latest_frame.max(frame);
        self.seen_progress = true;
    }

    fn flush_buffers(&mut self) {
        self.dropped_total += std::mem::take(&mut self.dropped_buffer);
        self.skip_total += std::mem::take(&mut self.skip_buffer);
    }

    fn emit(&mut self, now: DateTime<Utc>) -> TelemetrySnapshot {
        self.flush_buffers();

        if let Some(reported) = self.reported_rate.take() {
            self.rate = reported;
        } else {
            let elapsed = seconds(now - self.last_emitted_at);
            if elapsed > 0.0 {
                let frames = self.latest_frame.saturating_sub(self.last_emitted_frame);
                self.rate = frames as f64 / elapsed;
            }
        }

        self.last_emitted_frame = self.latest_frame;
        self.last_emitted_at = now;

        TelemetrySnapshot {
            frame: self.latest_frame,
            timecode: to_timecode(self.latest_frame, self.frame_rate),
            instantaneous_rate: self.rate,
            dropped_count: self.dropped_total,
            skipped_track_count: self.skip_total,
            timestamp: now,
        }
    }
}

fn seconds(delta: TimeDelta) -> f64 {
    delta.num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::classify;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap()
    }

    fn at_ms(ms: i64) -> DateTime<Utc> {
        t0() + TimeDelta::milliseconds(ms)
    }

    fn frame(frame: u64) -> ClassifiedEvent {
        ClassifiedEvent::FrameProgress { frame }
    }

    // ── Buffering ───────────────────────────────────────────────

    #[test]
    fn nothing_emitted_without_progress() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&ClassifiedEvent::DroppedField);
        assert_eq!(agg.maybe_emit(at_ms(60_000)), None);
    }

    #[test]
    fn plain_lines_do_not_touch_state() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&ClassifiedEvent::PlainLine {
            text: "hello".into(),
        });
        assert_eq!(agg.latest_frame(), 0);
        assert_eq!(agg.maybe_emit(at_ms(60_000)), None);
        assert_eq!(agg.finalize(at_ms(60_000)), None);
    }

    #[test]
    fn latest_frame_updates_immediately() {
        let mut agg = Aggregator::new(25.0, t0());
        assert_eq!(agg.observe(&frame(10), at_ms(100)), None);
        assert_eq!(agg.latest_frame(), 10);
    }

    #[test]
    fn latest_frame_never_decreases() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&frame(50));
        agg.ingest(&frame(20));
        assert_eq!(agg.latest_frame(), 50);
    }

    // ── Throttling ──────────────────────────────────────────────

    #[test]
    fn emits_once_interval_elapsed() {
        let mut agg = Aggregator::new(25.0, t0());
        assert_eq!(agg.observe(&frame(100), at_ms(4_999)), None);
        let snap = agg.observe(&frame(125), at_ms(5_000)).expect("snapshot");
        assert_eq!(snap.frame, 125);
        assert_eq!(snap.timecode, "00:00:05.00");
        assert!((snap.instantaneous_rate - 25.0).abs() < 1e-9);
        assert_eq!(snap.timestamp, at_ms(5_000));
    }

    #[test]
    fn buffers_accumulate_across_throttle_gap() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.observe(&frame(1), at_ms(1_000));
        agg.observe(&ClassifiedEvent::DroppedField, at_ms(1_500));
        agg.observe(&ClassifiedEvent::DroppedField, at_ms(2_000));
        agg.observe(&ClassifiedEvent::TrackSkip, at_ms(2_500));
        assert_eq!(agg.dropped_total(), 0);

        let snap = agg.observe(&frame(150), at_ms(6_000)).expect("snapshot");
        assert_eq!(snap.dropped_count, 2);
        assert_eq!(snap.skipped_track_count, 1);

        agg.observe(&ClassifiedEvent::TrackSkip, at_ms(7_000));
        let snap = agg.observe(&frame(300), at_ms(11_000)).expect("snapshot");
        assert_eq!(snap.dropped_count, 2);
        assert_eq!(snap.skipped_track_count, 2);
    }

    #[test]
    fn rate_is_measured_between_emissions() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.observe(&frame(100), at_ms(5_000)).expect("first");
        let snap = agg.observe(&frame(400), at_ms(11_000)).expect("second");
        assert!((snap.instantaneous_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn marker_events_never_trigger_emission() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.observe(&frame(1), at_ms(100));
        assert_eq!(agg.observe(&ClassifiedEvent::DroppedField, at_ms(9_000)), None);
    }

    #[test]
    fn reported_rate_overrides_measured_rate() {
        let mut agg = Aggregator::new(25.0, t0());
        let snap = agg
            .observe(
                &ClassifiedEvent::ReportedProgress {
                    frame: 1_000,
                    rate: Some(61.5),
                },
                at_ms(5_000),
            )
            .expect("snapshot");
        assert!((snap.instantaneous_rate - 61.5).abs() < 1e-9);
    }

    #[test]
    fn unparsed_reported_rate_falls_back_to_measured() {
        let mut agg = Aggregator::new(25.0, t0());
        let snap = agg
            .observe(
                &ClassifiedEvent::ReportedProgress {
                    frame: 250,
                    rate: None,
                },
                at_ms(5_000),
            )
            .expect("snapshot");
        assert!((snap.instantaneous_rate - 50.0).abs() < 1e-9);
    }

    #[test]
    fn non_positive_elapsed_keeps_previous_rate() {
        let mut agg = Aggregator::new(25.0, t0());
        let first = agg.observe(&frame(250), at_ms(5_000)).expect("first");
        agg.ingest(&frame(300));
        // Clock did not move since the last emission.
        let last = agg.finalize(at_ms(5_000)).expect("final");
        assert_eq!(last.instantaneous_rate, first.instantaneous_rate);
        assert_eq!(last.frame, 300);
    }

    // ── Finalize ────────────────────────────────────────────────

    #[test]
    fn finalize_ignores_throttle_and_flushes() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.observe(&frame(10), at_ms(100));
        agg.observe(&ClassifiedEvent::DroppedField, at_ms(200));
        agg.observe(&ClassifiedEvent::TrackSkip, at_ms(300));
        let snap = agg.finalize(at_ms(400)).expect("final snapshot");
        assert_eq!(snap.frame, 10);
        assert_eq!(snap.dropped_count, 1);
        assert_eq!(snap.skipped_track_count, 1);
    }

    #[test]
    fn finalize_without_frames_flushes_but_emits_nothing() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&ClassifiedEvent::DroppedField);
        agg.ingest(&ClassifiedEvent::TrackSkip);
        assert_eq!(agg.finalize(at_ms(1_000)), None);
        assert_eq!(agg.dropped_total(), 1);
        assert_eq!(agg.skip_total(), 1);
    }

    #[test]
    fn average_rate_over_session() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&frame(500));
        assert_eq!(agg.average_rate(at_ms(10_000)), Some(50.0));
        assert_eq!(agg.average_rate(t0()), None);
        assert_eq!(Aggregator::new(25.0, t0()).average_rate(at_ms(10_000)), None);
    }

    // ── Scenario ────────────────────────────────────────────────

    #[test]
    fn one_hundred_twenty_frames_over_six_seconds() {
        let mut agg = Aggregator::new(25.0, t0());
        let mut emitted = Vec::new();
        for i in 0..120u64 {
            // Frames 1..=120 every 50ms: 0ms .. 5950ms.
            if let Some(snap) = agg.observe(&frame(i + 1), at_ms(i as i64 * 50)) {
                emitted.push(snap);
            }
        }
        assert_eq!(emitted.len(), 1, "exactly one mid-run snapshot");
        let last = agg.finalize(at_ms(6_000)).expect("final snapshot");
        assert_eq!(last.frame, 120);
        assert!(last.frame >= emitted[0].frame);
    }

    #[test]
    fn snapshot_serializes_with_rfc3339_timestamp() {
        let mut agg = Aggregator::new(25.0, t0());
        agg.ingest(&frame(25));
        let snap = agg.finalize(at_ms(1_000)).expect("snapshot");
        let json = serde_json::to_value(&snap).expect("serialize");
        assert_eq!(json["frame"], 25);
        assert_eq!(json["timecode"], "00:00:01.00");
        assert_eq!(json["timestamp"], "2025-03-01T12:00:01Z");
    }

    // ── Properties ──────────────────────────────────────────────

    fn line_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            (0u64..100_000).prop_map(|f| format!("File Frame {f}: VHS")),
            Just("WARNING: dropping field".to_owned()),
            Just("track jump: skipped a track".to_owned()),
            "[a-z ]{0,20}",
        ]
    }

    proptest! {
        #[test]
        fn totals_match_marker_counts(
            lines in prop::collection::vec(line_strategy(), 0..200),
            gaps in prop::collection::vec(0i64..3_000, 200),
        ) {
            let mut agg = Aggregator::new(25.0, t0());
            let mut now = t0();
            let mut last_emit: Option<DateTime<Utc>> = None;
            let mut prev: Option<TelemetrySnapshot> = None;

            for (line, gap) in lines.iter().zip(gaps.iter()) {
                now += TimeDelta::milliseconds(*gap);
                if let Some(snap) = agg.observe(&classify(line), now) {
                    if let Some(last) = last_emit {
                        prop_assert!(now - last >= TimeDelta::seconds(THROTTLE_INTERVAL_SECS));
                    }
                    if let Some(p) = &prev {
                        prop_assert!(snap.frame >= p.frame);
                        prop_assert!(snap.dropped_count >= p.dropped_count);
                        prop_assert!(snap.skipped_track_count >= p.skipped_track_count);
                    }
                    last_emit = Some(now);
                    prev = Some(snap);
                }
            }
            agg.finalize(now);

            let dropped = lines.iter().filter(|l| l.contains("dropping field")).count() as u64;
            let skipped = lines.iter().filter(|l| l.contains("skipped a track")).count() as u64;
            prop_assert_eq!(agg.dropped_total(), dropped);
            prop_assert_eq!(agg.skip_total(), skipped);
        }
    }
}
