//! Sibling utilities: still screenshots at explicit timestamps and clip
//! extraction via stream copy. Neither participates in segmentation.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::core::error::{PipelineError, Result};
use crate::core::video::source::ffmpeg_bin;

/// Grab one still per timestamp (seconds) and write JPEGs named
/// `screenshot-000.jpg`, `screenshot-001.jpg`, ... into `out_dir`.
pub fn extract_screenshots<P: AsRef<Path>>(
    path: P,
    timestamps: &[f64],
    out_dir: P,
) -> Result<Vec<PathBuf>> {
    let path = path.as_ref();
    let out_dir = out_dir.as_ref();

    if timestamps.iter().any(|t| *t < 0.0 || !t.is_finite()) {
        return Err(PipelineError::InvalidConfiguration(
            "screenshot timestamps must be non-negative".to_string(),
        ));
    }
    fs::create_dir_all(out_dir)?;

    let mut written = Vec::with_capacity(timestamps.len());
    for (i, &timestamp) in timestamps.iter().enumerate() {
        let out_path = out_dir.join(format!("screenshot-{:03}.jpg", i));
        let output = Command::new(ffmpeg_bin())
            .arg("-ss")
            .arg(format!("{}", timestamp))
            .arg("-i")
            .arg(path)
            .args(["-frames:v", "1", "-q:v", "2", "-y"])
            .arg(&out_path)
            .output()
            .map_err(|e| PipelineError::UnreadableMedia {
                path: path.to_path_buf(),
                reason: format!("failed to run ffmpeg: {}", e),
            })?;

        if !output.status.success() || !out_path.exists() {
            return Err(PipelineError::Decode {
                path: path.to_path_buf(),
                frame_index: i as u64,
                reason: format!("screenshot at {}s failed", timestamp),
            });
        }
        log::debug!("wrote {}", out_path.display());
        written.push(out_path);
    }

    log::info!("extracted {} screenshots from {}", written.len(), path.display());
    Ok(written)
}

/// Cut `[start, start + duration)` into `out_path` without re-encoding.
pub fn extract_clip<P: AsRef<Path>>(
    path: P,
    start_seconds: f64,
    duration_seconds: f64,
    out_path: P,
) -> Result<PathBuf> {
    let path = path.as_ref();
    let out_path = out_path.as_ref();

    if start_seconds < 0.0 || !start_seconds.is_finite() {
        return Err(PipelineError::InvalidConfiguration(
            "clip start must be non-negative".to_string(),
        ));
    }
    if duration_seconds <= 0.0 || !duration_seconds.is_finite() {
        return Err(PipelineError::InvalidConfiguration(
            "clip duration must be positive".to_string(),
        ));
    }
    if let Some(parent) = out_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let output = Command::new(ffmpeg_bin())
        .arg("-ss")
        .arg(format!("{}", start_seconds))
        .arg("-i")
        .arg(path)
        .arg("-t")
        .arg(format!("{}", duration_seconds))
        .args(["-c", "copy", "-y"])
        .arg(out_path)
        .output()
        .map_err(|e| PipelineError::UnreadableMedia {
            path: path.to_path_buf(),
            reason: format!("failed to run ffmpeg: {}", e),
        })?;

    if !output.status.success() {
        return Err(PipelineError::UnreadableMedia {
            path: path.to_path_buf(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    log::info!(
        "clipped {}s from {} into {}",
        duration_seconds,
        path.display(),
        out_path.display()
    );
    Ok(out_path.to_path_buf())
}
