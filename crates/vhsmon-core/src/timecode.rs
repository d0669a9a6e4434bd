//! Frame index → `HH:MM:SS.FF` timecode conversion.

/// PAL frame rate, the usual rate for VHS captures.
pub const DEFAULT_FRAME_RATE: f64 = 25.0;

/// Timecode rendered for input that cannot be converted.
pub const ZERO_TIMECODE: &str = "00:00:00.00";

/// Convert a frame index at `frame_rate` frames per second into
/// `HH:MM:SS.FF`.
///
/// Hours are not wrapped at 24. A non-finite or non-positive frame rate
/// (or one that rounds to zero) yields [`ZERO_TIMECODE`].
pub fn to_timecode(frame: u64, frame_rate: f64) -> String {
    if !frame_rate.is_finite() || frame_rate <= 0.0 {
        return ZERO_TIMECODE.to_owned();
    }
    let whole_rate = frame_rate.round() as u64;
    if whole_rate == 0 {
        return ZERO_TIMECODE.to_owned();
    }

    let total_seconds = frame as f64 / frame_rate;
    let hours = (total_seconds / 3600.0).floor() as u64;
    let minutes = (total_seconds / 60.0).floor() as u64 % 60;
    let seconds = total_seconds.floor() as u64 % 60;
    let frames = frame % whole_rate;

    format!("{hours:02}:{minutes:02}:{seconds:02}.{frames:02}")
}

/// Textual variant of [`to_timecode`] for values that arrive as strings
/// (display fields, captured groups). Anything that is not a plain
/// non-negative integer maps to [`ZERO_TIMECODE`].
pub fn timecode_from_str(input: &str, frame_rate: f64) -> String {
    match input.trim().parse::<u64>() {
        Ok(frame) => to_timecode(frame, frame_rate),
        Err(_) => ZERO_TIMECODE.to_owned(),
    }
}
