//! Scene boundary detection over the difference stream.
//!
//! The detector is a state machine folded over `DifferenceSample`s in frame
//! order. The transition function is pure, so the whole thing is testable
//! with synthetic score streams and never needs a decoded video.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::diff::DifferenceSample;

/// Baseline can never sit below this, so a perfectly static run of zero
/// scores still leaves `threshold * baseline` positive.
const BASELINE_FLOOR: f32 = 1e-3;

#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterState {
    InScene { baseline: f32 },
    Cooldown { remaining: u32, baseline: f32 },
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
    /// Boundary fires when `score > threshold * baseline`.
    pub threshold: f32,
    /// Samples to ignore after a cut (minimum scene length).
    pub cooldown_samples: u32,
    /// Weight of the newest score in the exponential moving baseline.
    pub decay: f32,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            threshold: 3.0,
            cooldown_samples: 2,
            decay: 0.3,
        }
    }
}

/// A detected cut: the first frame of the new scene plus the score that
/// triggered it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundaryEvent {
    pub at_frame: u64,
    pub score: f32,
}

impl SegmenterState {
    pub fn new(first_score: f32) -> Self {
        SegmenterState::InScene {
            baseline: first_score.max(BASELINE_FLOOR),
        }
    }

    /// Pure transition: `(state, sample) -> (state, optional boundary)`.
    pub fn transition(
        &self,
        sample: &DifferenceSample,
        config: &SegmenterConfig,
    ) -> (SegmenterState, Option<BoundaryEvent>) {
        match self {
            SegmenterState::InScene { baseline } => {
                if sample.score > config.threshold * baseline {
                    let event = BoundaryEvent {
                        at_frame: sample.to_index,
                        score: sample.score,
                    };
                    (
                        SegmenterState::Cooldown {
                            remaining: config.cooldown_samples,
                            baseline: sample.score.max(BASELINE_FLOOR),
                        },
                        Some(event),
                    )
                } else {
                    (
                        SegmenterState::InScene {
                            baseline: decayed(*baseline, sample.score, config.decay),
                        },
                        None,
                    )
                }
            }

            SegmenterState::Cooldown {
                remaining,
                baseline,
            } => {
                let baseline = decayed(*baseline, sample.score, config.decay);
                let remaining = remaining.saturating_sub(1);
                if remaining == 0 {
                    (SegmenterState::InScene { baseline }, None)
                } else {
                    (
                        SegmenterState::Cooldown {
                            remaining,
                            baseline,
                        },
                        None,
                    )
                }
            }
        }
    }
}

fn decayed(baseline: f32, score: f32, decay: f32) -> f32 {
    (baseline * (1.0 - decay) + score * decay).max(BASELINE_FLOOR)
}

/// One contiguous span of the timeline. Scenes partition
/// `[0, total_frames)`: `end_frame` is exclusive and equals the next
/// scene's `start_frame`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scene {
    pub id: usize,
    pub start_frame: u64,
    pub end_frame: u64,
    pub start_time: Duration,
    pub end_time: Duration,
    /// Difference score that opened this scene; 0.0 for scene 0.
    pub boundary_score: f32,
}

impl Scene {
    pub fn frame_count(&self) -> u64 {
        self.end_frame - self.start_frame
    }

    pub fn contains_frame(&self, index: u64) -> bool {
        index >= self.start_frame && index < self.end_frame
    }
}

/// Folds the ordered difference stream and closes scenes on demand.
pub struct SceneSegmenter {
    state: Option<SegmenterState>,
    config: SegmenterConfig,
    boundaries: Vec<BoundaryEvent>,
    samples_seen: u64,
}

impl SceneSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        Self {
            state: None,
            config,
            boundaries: Vec::new(),
            samples_seen: 0,
        }
    }

    /// Feed the next sample, in frame order. Returns the boundary if this
    /// sample opened a new scene.
    pub fn push(&mut self, sample: &DifferenceSample) -> Option<BoundaryEvent> {
        self.samples_seen += 1;

        let state = match self.state.take() {
            // First sample seeds the baseline; it cannot itself be a cut.
            None => {
                self.state = Some(SegmenterState::new(sample.score));
                return None;
            }
            Some(state) => state,
        };

        let (next, event) = state.transition(sample, &self.config);
        self.state = Some(next);

        if let Some(event) = event {
            log::debug!(
                "scene boundary at frame {} (score {:.4})",
                event.at_frame,
                event.score
            );
            self.boundaries.push(event);
        }
        event
    }

    pub fn boundary_count(&self) -> usize {
        self.boundaries.len()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }

    pub fn current_state(&self) -> Option<&SegmenterState> {
        self.state.as_ref()
    }

    /// Close the stream and materialize the scene list. `frame_times`
    /// holds one timestamp per sampled frame; its length is the total
    /// frame count. An asset with frames but no boundaries yields exactly
    /// one scene spanning everything.
    pub fn finish(self, frame_times: &[Duration]) -> Vec<Scene> {
        let total = frame_times.len() as u64;
        if total == 0 {
            return Vec::new();
        }

        let mut starts: Vec<(u64, f32)> = vec![(0, 0.0)];
        starts.extend(
            self.boundaries
                .iter()
                .filter(|b| b.at_frame < total)
                .map(|b| (b.at_frame, b.score)),
        );

        let mut scenes = Vec::with_capacity(starts.len());
        for (id, window) in starts.windows(2).enumerate() {
            let (start, score) = window[0];
            let (next_start, _) = window[1];
            scenes.push(Scene {
                id,
                start_frame: start,
                end_frame: next_start,
                start_time: frame_times[start as usize],
                // End time is the timestamp of the scene's last frame.
                end_time: frame_times[(next_start - 1) as usize],
                boundary_score: score,
            });
        }

        let (last_start, last_score) = *starts.last().expect("seeded with scene 0");
        scenes.push(Scene {
            id: scenes.len(),
            start_frame: last_start,
            end_frame: total,
            start_time: frame_times[last_start as usize],
            end_time: frame_times[(total - 1) as usize],
            boundary_score: last_score,
        });

        debug_assert!(scenes_partition(&scenes, total));
        scenes
    }
}

/// Invariant check: contiguous, non-overlapping, full coverage, in order.
pub fn scenes_partition(scenes: &[Scene], total_frames: u64) -> bool {
    if scenes.is_empty() {
        return total_frames == 0;
    }
    if scenes[0].start_frame != 0 || scenes[scenes.len() - 1].end_frame != total_frames {
        return false;
    }
    scenes.windows(2).all(|w| {
        w[0].end_frame == w[1].start_frame && w[0].start_frame < w[0].end_frame
    }) && scenes.last().map(|s| s.start_frame < s.end_frame).unwrap_or(false)
}
