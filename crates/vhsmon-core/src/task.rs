//! Task kinds and the paths each one works on.
//!
//! A decode turns a raw capture into `<stem>-Decoded.tbc` (plus sidecars);
//! an export renders that TBC into `<stem>-export.*`; analyse opens the TBC
//! in the viewer; align runs the audio alignment script on the linear audio
//! track and the TBC metadata. All paths sit next to the input file.

use std::ffi::OsString;
use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::classify::{ClassifiedEvent, classify, classify_export};

const DECODED_SUFFIX: &str = "-Decoded";
const TBC_SUFFIX: &str = "-Decoded.tbc";
const EXPORT_SUFFIX: &str = "-export";

// ─── TaskKind ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskKind {
    Decode,
    Export,
    Analyse,
    Align,
}

impl TaskKind {
    pub const ALL: [Self; 4] = [Self::Decode, Self::Export, Self::Analyse, Self::Align];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Decode => "decode",
            Self::Export => "export",
            Self::Analyse => "analyse",
            Self::Align => "align",
        }
    }

    /// Executable looked up on `$PATH` when the caller does not override it.
    pub fn default_command(self) -> &'static str {
        match self {
            Self::Decode => "vhs-decode",
            Self::Export => "tbc-video-export",
            Self::Analyse => "ld-analyse",
            Self::Align => "align.sh",
        }
    }

    /// Classify a line with the rules for this task's output format.
    pub fn classify(self, line: &str) -> ClassifiedEvent {
        match self {
            Self::Decode => classify(line),
            Self::Export => classify_export(line),
            Self::Analyse | Self::Align => ClassifiedEvent::PlainLine {
                text: line.to_owned(),
            },
        }
    }

    /// Whether progress lines are also shown in the log. The decoder's
    /// progress lines are too frequent to be useful there.
    pub fn echoes_progress(self) -> bool {
        matches!(self, Self::Export)
    }

    /// Full argument vector: user arguments first, then the task's paths.
    /// Analyse and align take their paths only.
    pub fn build_arguments(self, user_args: &[String], context: &WorkingContext) -> Vec<String> {
        let mut args = match self {
            Self::Analyse | Self::Align => Vec::new(),
            Self::Decode | Self::Export => user_args.to_vec(),
        };
        args.push(path_arg(&context.input));
        if let Some(output) = &context.output {
            args.push(path_arg(output));
        }
        args
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── WorkingContext ─────────────────────────────────────────────────

/// Resolved input and output paths for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingContext {
    pub input: PathBuf,
    /// Output prefix; tasks that only read have none. For align, the TBC
    /// metadata file passed after the audio track.
    pub output: Option<PathBuf>,
}

impl WorkingContext {
    /// Derive the paths for `kind` from the user-selected capture file.
    ///
    /// Align inputs cannot be derived from the name alone; this yields the
    /// capture itself and the caller replaces it with [`WorkingContext::align`]
    /// once the sidecar files are found.
    pub fn for_task(kind: TaskKind, capture: &Path) -> Self {
        match kind {
            TaskKind::Decode => Self {
                input: capture.to_path_buf(),
                output: Some(sibling(capture, DECODED_SUFFIX)),
            },
            TaskKind::Export => Self {
                input: sibling(capture, TBC_SUFFIX),
                output: Some(sibling(capture, EXPORT_SUFFIX)),
            },
            TaskKind::Analyse => Self {
                input: sibling(capture, TBC_SUFFIX),
                output: None,
            },
            TaskKind::Align => Self {
                input: capture.to_path_buf(),
                output: None,
            },
        }
    }

    /// Context for an align run over discovered sidecar files.
    pub fn align(linear_audio: PathBuf, tbc_json: PathBuf) -> Self {
        Self {
            input: linear_audio,
            output: Some(tbc_json),
        }
    }
}

/// Glob suffix of the linear audio track written next to a capture.
pub const LINEAR_AUDIO_PATTERN: &str = "*-linear.flac";
/// Glob suffix of the decoder's TBC metadata file.
pub const TBC_JSON_PATTERN: &str = "*Decoded.tbc.json";

/// Choose a sidecar among `candidates`: the first whose file name contains
/// the capture's stem, else the first candidate.
pub fn pick_sidecar<'a>(candidates: &'a [PathBuf], capture: &Path) -> Option<&'a PathBuf> {
    let stem = capture.file_stem().map(|s| s.to_string_lossy());
    stem.as_deref()
        .filter(|stem| !stem.is_empty())
        .and_then(|stem| {
            candidates.iter().find(|c| {
                c.file_name()
                    .is_some_and(|name| name.to_string_lossy().contains(stem))
            })
        })
        .or_else(|| candidates.first())
}

/// Split a free-form argument string on whitespace.
pub fn split_arguments(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_owned).collect()
}

/// `<dir>/<stem><suffix>`, where `<stem>` drops only the last extension.
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name: OsString = path.file_stem().map(ToOwned::to_owned).unwrap_or_default();
    name.push(suffix);
    path.with_file_name(name)
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Path derivation ─────────────────────────────────────────

    #[test]
    fn decode_paths() {
        let ctx = WorkingContext::for_task(TaskKind::Decode, Path::new("/caps/tape1.flac"));
        assert_eq!(ctx.input, PathBuf::from("/caps/tape1.flac"));
        assert_eq!(ctx.output, Some(PathBuf::from("/caps/tape1-Decoded")));
    }

    #[test]
    fn export_paths() {
        let ctx = WorkingContext::for_task(TaskKind::Export, Path::new("/caps/tape1.flac"));
        assert_eq!(ctx.input, PathBuf::from("/caps/tape1-Decoded.tbc"));
        assert_eq!(ctx.output, Some(PathBuf::from("/caps/tape1-export")));
    }

    #[test]
    fn analyse_paths() {
        let ctx = WorkingContext::for_task(TaskKind::Analyse, Path::new("/caps/tape1.u8"));
        assert_eq!(ctx.input, PathBuf::from("/caps/tape1-Decoded.tbc"));
        assert_eq!(ctx.output, None);
    }

    #[test]
    fn only_last_extension_is_dropped() {
        let ctx = WorkingContext::for_task(TaskKind::Decode, Path::new("/caps/tape.raw.flac"));
        assert_eq!(ctx.output, Some(PathBuf::from("/caps/tape.raw-Decoded")));
    }

    #[test]
    fn relative_input_without_directory() {
        let ctx = WorkingContext::for_task(TaskKind::Decode, Path::new("tape.flac"));
        assert_eq!(ctx.output, Some(PathBuf::from("tape-Decoded")));
    }

    // ── Arguments ───────────────────────────────────────────────

    #[test]
    fn split_on_any_whitespace() {
        assert_eq!(
            split_arguments("  --pal\t--cxadc  -t 4 "),
            vec!["--pal", "--cxadc", "-t", "4"]
        );
        assert!(split_arguments("   ").is_empty());
    }

    #[test]
    fn decode_argv_puts_paths_last() {
        let ctx = WorkingContext::for_task(TaskKind::Decode, Path::new("/c/t.flac"));
        let args = TaskKind::Decode.build_arguments(&split_arguments("--pal -t 4"), &ctx);
        assert_eq!(args, vec!["--pal", "-t", "4", "/c/t.flac", "/c/t-Decoded"]);
    }

    #[test]
    fn analyse_ignores_user_arguments() {
        let ctx = WorkingContext::for_task(TaskKind::Analyse, Path::new("/c/t.flac"));
        let args = TaskKind::Analyse.build_arguments(&split_arguments("--x"), &ctx);
        assert_eq!(args, vec!["/c/t-Decoded.tbc"]);
    }

    // ── Per-task behaviour ──────────────────────────────────────

    #[test]
    fn default_commands() {
        assert_eq!(TaskKind::Decode.default_command(), "vhs-decode");
        assert_eq!(TaskKind::Export.default_command(), "tbc-video-export");
        assert_eq!(TaskKind::Analyse.default_command(), "ld-analyse");
        assert_eq!(TaskKind::Align.default_command(), "align.sh");
    }

    #[test]
    fn classification_profile_per_task() {
        assert!(TaskKind::Decode.classify("File Frame 1: VHS").is_progress());
        assert!(TaskKind::Export.classify("Info: 1 frames processed - 2 FPS").is_progress());
        assert!(!TaskKind::Analyse.classify("File Frame 1: VHS").is_progress());
        assert!(!TaskKind::Align.classify("File Frame 1: VHS").is_progress());
    }

    #[test]
    fn only_export_echoes_progress() {
        assert!(TaskKind::Export.echoes_progress());
        assert!(!TaskKind::Decode.echoes_progress());
        assert!(!TaskKind::Analyse.echoes_progress());
        assert!(!TaskKind::Align.echoes_progress());
    }

    // ── Align sidecars ──────────────────────────────────────────

    #[test]
    fn align_argv_is_audio_then_metadata() {
        let ctx = WorkingContext::align(
            PathBuf::from("/c/t-linear.flac"),
            PathBuf::from("/c/t-Decoded.tbc.json"),
        );
        let args = TaskKind::Align.build_arguments(&split_arguments("--x"), &ctx);
        assert_eq!(args, vec!["/c/t-linear.flac", "/c/t-Decoded.tbc.json"]);
    }

    #[test]
    fn sidecar_matching_stem_wins() {
        let candidates = vec![
            PathBuf::from("/c/other-linear.flac"),
            PathBuf::from("/c/tape2-linear.flac"),
        ];
        let picked = pick_sidecar(&candidates, Path::new("/c/tape2.flac"));
        assert_eq!(picked, Some(&candidates[1]));
    }

    #[test]
    fn sidecar_falls_back_to_first() {
        let candidates = vec![
            PathBuf::from("/c/a-linear.flac"),
            PathBuf::from("/c/b-linear.flac"),
        ];
        let picked = pick_sidecar(&candidates, Path::new("/c/tape9.flac"));
        assert_eq!(picked, Some(&candidates[0]));
    }

    #[test]
    fn no_sidecar_candidates() {
        assert_eq!(pick_sidecar(&[], Path::new("/c/tape.flac")), None);
    }
}
