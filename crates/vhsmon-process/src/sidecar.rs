//! Locating the files an align run works on.
//!
//! The linear audio track and the decoder's TBC metadata sit in the
//! capture's directory under names that only loosely follow the capture's
//! own, so they are searched for by pattern and matched on the stem.

use std::path::{Path, PathBuf};

use vhsmon_core::task::{LINEAR_AUDIO_PATTERN, TBC_JSON_PATTERN};
use vhsmon_core::{WorkingContext, pick_sidecar};

use crate::error::SidecarError;

/// Find the linear audio and TBC metadata for `capture` in its directory.
pub fn discover_align_inputs(capture: &Path) -> Result<WorkingContext, SidecarError> {
    let dir = capture
        .parent()
        .filter(|dir| !dir.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let linear_audio = find(dir, capture, LINEAR_AUDIO_PATTERN)?;
    let tbc_json = find(dir, capture, TBC_JSON_PATTERN)?;
    tracing::debug!(
        audio = %linear_audio.display(),
        metadata = %tbc_json.display(),
        "align inputs found"
    );
    Ok(WorkingContext::align(linear_audio, tbc_json))
}

fn find(dir: &Path, capture: &Path, pattern: &'static str) -> Result<PathBuf, SidecarError> {
    let escaped = glob::Pattern::escape(&dir.to_string_lossy());
    let candidates: Vec<PathBuf> = glob::glob(&format!("{escaped}/{pattern}"))?
        .filter_map(Result::ok)
        .collect();
    pick_sidecar(&candidates, capture)
        .cloned()
        .ok_or_else(|| SidecarError::Missing {
            pattern,
            dir: dir.to_path_buf(),
        })
}
