//! Representative frame selection per scene.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::error::{PipelineError, Result};
use crate::core::segmenter::Scene;
use crate::core::video::frame::Frame;

/// Selection strategy. All modes are deterministic for the same frames
/// and configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum KeyframeMode {
    /// First frame of the scene: cheapest, lowest latency.
    First,
    /// Highest focus/edge-energy frame, ties broken by earliest index.
    MaxSharpness,
    /// Frame nearest the scene's time midpoint.
    TemporalMidpoint,
}

#[derive(Debug, Clone)]
pub struct Keyframe {
    pub scene_id: usize,
    pub frame: Frame,
    pub reason: KeyframeMode,
}

/// Pick the representative frame for one scene. `frames` must be the
/// scene's frames in order; an empty slice means the segmenter invariants
/// were violated upstream.
pub fn select_keyframe(scene: &Scene, frames: &[Frame], mode: KeyframeMode) -> Result<Keyframe> {
    if frames.is_empty() {
        return Err(PipelineError::EmptyScene { scene_id: scene.id });
    }

    let frame = match mode {
        KeyframeMode::First => frames[0].clone(),
        KeyframeMode::MaxSharpness => sharpest(frames).clone(),
        KeyframeMode::TemporalMidpoint => nearest_midpoint(scene, frames).clone(),
    };

    Ok(Keyframe {
        scene_id: scene.id,
        frame,
        reason: mode,
    })
}

fn sharpest(frames: &[Frame]) -> &Frame {
    let scores: Vec<f32> = frames.par_iter().map(sharpness).collect();

    let mut best = 0usize;
    for (i, &score) in scores.iter().enumerate().skip(1) {
        // Strict comparison keeps the earliest frame on ties.
        if score > scores[best] {
            best = i;
        }
    }
    &frames[best]
}

fn nearest_midpoint<'a>(scene: &Scene, frames: &'a [Frame]) -> &'a Frame {
    let midpoint = (scene.start_time + scene.end_time) / 2;

    let mut best = 0usize;
    let mut best_delta = abs_delta(frames[0].timestamp, midpoint);
    for (i, frame) in frames.iter().enumerate().skip(1) {
        let delta = abs_delta(frame.timestamp, midpoint);
        if delta < best_delta {
            best = i;
            best_delta = delta;
        }
    }
    &frames[best]
}

fn abs_delta(a: std::time::Duration, b: std::time::Duration) -> std::time::Duration {
    if a > b {
        a - b
    } else {
        b - a
    }
}

/// Focus metric: mean squared gradient magnitude over the luma plane,
/// sampled every 2nd pixel. Higher is sharper.
pub fn sharpness(frame: &Frame) -> f32 {
    let gray = frame.to_gray();
    let w = frame.width as usize;
    let h = frame.height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    let mut energy = 0u64;
    let mut count = 0u64;
    for y in (1..h - 1).step_by(2) {
        for x in (1..w - 1).step_by(2) {
            let idx = y * w + x;
            let gx = gray[idx + 1] as i64 - gray[idx - 1] as i64;
            let gy = gray[idx + w] as i64 - gray[idx - w] as i64;
            energy += (gx * gx + gy * gy) as u64;
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        energy as f32 / count as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn scene(id: usize, start: u64, end: u64) -> Scene {
        Scene {
            id,
            start_frame: start,
            end_frame: end,
            start_time: Duration::from_secs(start),
            end_time: Duration::from_secs(end.saturating_sub(1)),
            boundary_score: 0.0,
        }
    }

    fn flat_frame(index: u64, value: u8) -> Frame {
        Frame::new(
            index,
            Duration::from_secs(index),
            32,
            32,
            vec![value; 32 * 32 * 3],
        )
    }

    /// Checkerboard with the given cell size; smaller cells = sharper.
    fn textured_frame(index: u64, cell: u32) -> Frame {
        let mut data = Vec::with_capacity(32 * 32 * 3);
        for y in 0..32u32 {
            for x in 0..32u32 {
                let v = if ((x / cell) + (y / cell)) % 2 == 0 {
                    255
                } else {
                    0
                };
                data.extend_from_slice(&[v, v, v]);
            }
        }
        Frame::new(index, Duration::from_secs(index), 32, 32, data)
    }

    #[test]
    fn test_first_mode() {
        let frames = vec![flat_frame(3, 10), flat_frame(4, 20), flat_frame(5, 30)];
        let kf = select_keyframe(&scene(0, 3, 6), &frames, KeyframeMode::First).unwrap();
        assert_eq!(kf.frame.index, 3);
        assert_eq!(kf.reason, KeyframeMode::First);
    }

    #[test]
    fn test_max_sharpness_picks_textured_frame() {
        let frames = vec![flat_frame(0, 128), textured_frame(1, 2), flat_frame(2, 128)];
        let kf = select_keyframe(&scene(0, 0, 3), &frames, KeyframeMode::MaxSharpness).unwrap();
        assert_eq!(kf.frame.index, 1);
    }

    #[test]
    fn test_max_sharpness_tie_breaks_earliest() {
        let frames = vec![flat_frame(0, 50), flat_frame(1, 50), flat_frame(2, 50)];
        let kf = select_keyframe(&scene(0, 0, 3), &frames, KeyframeMode::MaxSharpness).unwrap();
        assert_eq!(kf.frame.index, 0);
    }

    #[test]
    fn test_temporal_midpoint() {
        let frames: Vec<Frame> = (10..15).map(|i| flat_frame(i, 0)).collect();
        let kf = select_keyframe(&scene(1, 10, 15), &frames, KeyframeMode::TemporalMidpoint).unwrap();
        assert_eq!(kf.frame.index, 12);
        assert_eq!(kf.scene_id, 1);
    }

    #[test]
    fn test_empty_scene_is_an_error() {
        let err = select_keyframe(&scene(7, 0, 0), &[], KeyframeMode::First).unwrap_err();
        assert!(matches!(
            err,
            PipelineError::EmptyScene { scene_id: 7 }
        ));
    }

    #[test]
    fn test_selection_is_deterministic() {
        let frames = vec![textured_frame(0, 4), textured_frame(1, 2), flat_frame(2, 9)];
        let s = scene(0, 0, 3);
        let a = select_keyframe(&s, &frames, KeyframeMode::MaxSharpness).unwrap();
        let b = select_keyframe(&s, &frames, KeyframeMode::MaxSharpness).unwrap();
        assert_eq!(a.frame.index, b.frame.index);
    }

    #[test]
    fn test_sharpness_orders_by_texture() {
        assert!(sharpness(&textured_frame(0, 2)) > sharpness(&textured_frame(0, 8)));
        assert_eq!(sharpness(&flat_frame(0, 128)), 0.0);
    }
}
