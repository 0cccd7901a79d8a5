use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::export::OutputFormat;
use crate::core::keyframe::KeyframeMode;

/// 管线配置 - validated once before any decoding starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Sampling stride in seconds. 0.0 means every decoded frame.
    pub stride_seconds: f64,
    /// Boundary fires when a difference score exceeds
    /// `threshold * running_baseline`.
    pub threshold: f32,
    /// Minimum scene length in seconds (cooldown after a cut).
    pub min_scene_seconds: f64,
    pub keyframe_mode: KeyframeMode,
    pub output_format: OutputFormat,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            stride_seconds: 1.0,
            threshold: 3.0,
            min_scene_seconds: 2.0,
            keyframe_mode: KeyframeMode::MaxSharpness,
            output_format: OutputFormat::Markdown,
        }
    }
}

impl PipelineConfig {
    /// Fast cuts, short scenes (screen recordings, slideshows).
    pub fn for_rapid_cuts() -> Self {
        Self {
            stride_seconds: 0.5,
            threshold: 2.5,
            min_scene_seconds: 1.0,
            ..Default::default()
        }
    }

    /// Long takes with slow camera movement (lectures, demos).
    pub fn for_long_takes() -> Self {
        Self {
            stride_seconds: 2.0,
            threshold: 4.0,
            min_scene_seconds: 5.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.stride_seconds < 0.0 || !self.stride_seconds.is_finite() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "stride_seconds must be >= 0, got {}",
                self.stride_seconds
            )));
        }
        if self.threshold <= 0.0 || !self.threshold.is_finite() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "threshold must be > 0, got {}",
                self.threshold
            )));
        }
        if self.min_scene_seconds <= 0.0 || !self.min_scene_seconds.is_finite() {
            return Err(PipelineError::InvalidConfiguration(format!(
                "min_scene_seconds must be > 0, got {}",
                self.min_scene_seconds
            )));
        }
        Ok(())
    }

    /// Cooldown length in samples at the effective sampling rate.
    pub fn min_scene_samples(&self, fallback_fps: f64) -> u32 {
        let interval = if self.stride_seconds > 0.0 {
            self.stride_seconds
        } else {
            1.0 / fallback_fps.max(1.0)
        };
        (self.min_scene_seconds / interval).ceil().max(1.0) as u32
    }
}
