// ANSI SGR tokenizer.
//
// Turns one raw output line into styled segments:
//
// - `ESC [ <digits/;> m` (SGR) updates the active foreground color
// - any other CSI sequence (`ESC [ params intermediates final`) is stripped
// - everything else is text
//
// Style starts empty on every line; nothing carries over between lines.

use serde::{Deserialize, Serialize};

const ESC: u8 = 0x1B;

// ─── Types ──────────────────────────────────────────────────────────

/// The eight standard foreground colors (SGR 30–37).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Black,
    Red,
    Green,
    Yellow,
    Blue,
    Magenta,
    Cyan,
    White,
}

impl Color {
    pub const ALL: [Self; 8] = [
        Self::Black,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Blue,
        Self::Magenta,
        Self::Cyan,
        Self::White,
    ];

    /// Map an SGR parameter to a foreground color. Only the exact strings
    /// `"30"`..`"37"` are recognized.
    pub fn from_sgr(code: &str) -> Option<Self> {
        match code {
            "30" => Some(Self::Black),
            "31" => Some(Self::Red),
            "32" => Some(Self::Green),
            "33" => Some(Self::Yellow),
            "34" => Some(Self::Blue),
            "35" => Some(Self::Magenta),
            "36" => Some(Self::Cyan),
            "37" => Some(Self::White),
            _ => None,
        }
    }

    /// SGR parameter selecting this color.
    pub fn sgr_code(self) -> u8 {
        match self {
            Self::Black => 30,
            Self::Red => 31,
            Self::Green => 32,
            Self::Yellow => 33,
            Self::Blue => 34,
            Self::Magenta => 35,
            Self::Cyan => 36,
            Self::White => 37,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Black => "black",
            Self::Red => "red",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Blue => "blue",
            Self::Magenta => "magenta",
            Self::Cyan => "cyan",
            Self::White => "white",
        }
    }
}

/// A run of text rendered in a single style. `style: None` means the
/// display's default style.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledSegment {
    pub text: String,
    pub style: Option<Color>,
}

impl StyledSegment {
    pub fn new(text: impl Into<String>, style: Option<Color>) -> Self {
        Self {
            text: text.into(),
            style,
        }
    }

    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, None)
    }
}

// ─── Tokenizer ──────────────────────────────────────────────────────

/// Split a raw line into styled segments.
///
/// Empty fragments (including ones that only held stripped escapes) are
/// dropped, so the result may be empty.
pub fn tokenize(line: &str) -> Vec<StyledSegment> {
    let bytes = line.as_bytes();
    let mut segments = Vec::new();
    let mut active: Option<Color> = None;
    let mut text = String::new();
    let mut fragment_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != ESC || bytes.get(i + 1) != Some(&b'[') {
            i += 1;
            continue;
        }
        let Some(csi) = scan_csi(bytes, i) else {
            // Unterminated sequence: keep it as literal text.
            i += 1;
            continue;
        };

        text.push_str(&line[fragment_start..i]);
        if let Some(params) = csi.sgr_params {
            flush(&mut segments, &mut text, active);
            active = apply_sgr(active, &line[params.0..params.1]);
        }
        i = csi.end;
        fragment_start = csi.end;
    }

    text.push_str(&line[fragment_start..]);
    flush(&mut segments, &mut text, active);
    segments
}

/// Strip every CSI sequence (SGR included), leaving plain text.
pub fn strip(line: &str) -> String {
    tokenize(line).into_iter().map(|s| s.text).collect()
}

// ─── Internal helpers ───────────────────────────────────────────────

struct Csi {
    /// Byte offset just past the final byte.
    end: usize,
    /// Parameter byte range when the sequence is a well-formed SGR.
    sgr_params: Option<(usize, usize)>,
}

/// Scan a CSI sequence starting at `start` (which points at ESC).
///
/// Grammar: `ESC [` parameter bytes `0x30–0x3F`, intermediate bytes
/// `0x20–0x2F`, one final byte `0x40–0x7E`.
fn scan_csi(bytes: &[u8], start: usize) -> Option<Csi> {
    let params_start = start + 2;
    let mut i = params_start;
    while i < bytes.len() && (0x30..=0x3F).contains(&bytes[i]) {
        i += 1;
    }
    let params_end = i;
    while i < bytes.len() && (0x20..=0x2F).contains(&bytes[i]) {
        i += 1;
    }
    let intermediates = i > params_end;
    let final_byte = *bytes.get(i)?;
    if !(0x40..=0x7E).contains(&final_byte) {
        return None;
    }

    let is_sgr = final_byte == b'm'
        && !intermediates
        && bytes[params_start..params_end]
            .iter()
            .all(|b| b.is_ascii_digit() || *b == b';');

    Some(Csi {
        end: i + 1,
        sgr_params: is_sgr.then_some((params_start, params_end)),
    })
}

/// Fold SGR parameters into the active color. `0` or an empty parameter
/// resets; a later color replaces an earlier one; anything else is ignored.
fn apply_sgr(mut active: Option<Color>, params: &str) -> Option<Color> {
    for code in params.split(';') {
        if code.is_empty() || code == "0" {
            active = None;
        } else if let Some(color) = Color::from_sgr(code) {
            active = Some(color);
        }
    }
    active
}

fn flush(segments: &mut Vec<StyledSegment>, text: &mut String, style: Option<Color>) {
    if !text.is_empty() {
        segments.push(StyledSegment::new(std::mem::take(text), style));
    }
}
