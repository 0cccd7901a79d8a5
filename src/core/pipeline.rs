//! Pipeline orchestration.
//!
//! One invocation = one isolated run: probe, decode, score, segment,
//! select, assemble, export. A decoder thread feeds a bounded channel so
//! decoding runs ahead of analysis; difference scores for each batch are
//! computed in a rayon fork-join and consumed in frame order by the
//! strictly sequential segmenter.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::core::config::PipelineConfig;
use crate::core::diff::{sample_pair, DifferenceSample};
use crate::core::document::{assemble, CaptionProvider, NoCaptions};
use crate::core::error::{PipelineError, Result};
use crate::core::export::{export, ExportArtifact};
use crate::core::keyframe::{select_keyframe, Keyframe, KeyframeMode};
use crate::core::segmenter::{Scene, SceneSegmenter, SegmenterConfig};
use crate::core::video::frame::Frame;
use crate::core::video::source::VideoSource;

const THUMBNAIL_WIDTH: u32 = 320;
const THUMBNAIL_JPEG_QUALITY: u8 = 70;

/// Cooperative cancellation, checked between frame reads and between
/// scene boundaries.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

/// Run summary for the preview surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub scene_count: usize,
    pub keyframe_count: usize,
    pub duration_processed: Duration,
}

/// Thumbnail-and-timestamp entry, one per detected scene.
#[derive(Debug, Clone)]
pub struct ScenePreview {
    pub scene: Scene,
    pub thumbnail_jpeg: Vec<u8>,
}

#[derive(Debug)]
pub struct PipelineOutput {
    pub artifact: ExportArtifact,
    pub summary: RunSummary,
    pub scenes: Vec<ScenePreview>,
}

#[derive(Debug)]
struct Analysis {
    scenes: Vec<Scene>,
    keyframes: Vec<Keyframe>,
    duration_processed: Duration,
}

#[derive(Debug)]
pub struct DocumentPipeline {
    config: PipelineConfig,
}

impl DocumentPipeline {
    /// Fails with `InvalidConfiguration` before anything is opened.
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Full run: decode, segment, select, assemble, export.
    pub fn run<P: AsRef<Path>>(
        &self,
        path: P,
        captions: &dyn CaptionProvider,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        let source = VideoSource::open(path)?;
        let interval = source.sample_interval(self.config.stride_seconds);
        let frames = source.sample_at(self.config.stride_seconds)?;
        let analysis = self.analyze(frames, interval, cancel)?;

        let tree = assemble(&analysis.scenes, &analysis.keyframes, captions);
        let artifact = export(&tree, self.config.output_format)?;

        let scenes = scene_previews(&analysis)?;
        let summary = RunSummary {
            scene_count: analysis.scenes.len(),
            keyframe_count: analysis.keyframes.len(),
            duration_processed: analysis.duration_processed,
        };
        log::info!(
            "pipeline done: {} scenes, {} keyframes, {:?} processed",
            summary.scene_count,
            summary.keyframe_count,
            summary.duration_processed
        );

        Ok(PipelineOutput {
            artifact,
            summary,
            scenes,
        })
    }

    /// Convenience: run with no captions.
    pub fn run_uncaptioned<P: AsRef<Path>>(
        &self,
        path: P,
        cancel: &CancellationToken,
    ) -> Result<PipelineOutput> {
        self.run(path, &NoCaptions, cancel)
    }

    /// Scene scan only: boundaries plus thumbnails, no document. For the
    /// preview surface while the user iterates on threshold and stride.
    pub fn preview<P: AsRef<Path>>(
        &self,
        path: P,
        cancel: &CancellationToken,
    ) -> Result<(RunSummary, Vec<ScenePreview>)> {
        let source = VideoSource::open(path)?;
        let interval = source.sample_interval(self.config.stride_seconds);
        let frames = source.sample_at(self.config.stride_seconds)?;
        let analysis = self.analyze(frames, interval, cancel)?;

        let summary = RunSummary {
            scene_count: analysis.scenes.len(),
            keyframe_count: analysis.keyframes.len(),
            duration_processed: analysis.duration_processed,
        };
        let previews = scene_previews(&analysis)?;
        Ok((summary, previews))
    }

    /// Stream frames through the difference metric and segmenter,
    /// closing scenes and selecting keyframes as boundaries fire. Only
    /// the current scene's frames are held in memory.
    fn analyze<I>(
        &self,
        frames: I,
        interval: Duration,
        cancel: &CancellationToken,
    ) -> Result<Analysis>
    where
        I: IntoIterator<Item = Result<Frame>> + Send,
    {
        let batch_size = num_cpus::get().max(2) * 4;
        let (tx, rx) = crossbeam_channel::bounded::<Result<Frame>>(batch_size * 2);
        let decoder_cancel = cancel.clone();

        std::thread::scope(|scope| {
            scope.spawn(move || {
                for item in frames {
                    if decoder_cancel.is_cancelled() {
                        return;
                    }
                    if tx.send(item).is_err() {
                        return;
                    }
                }
            });

            let mut state = AnalysisState::new(&self.config, interval);
            let mut batch: Vec<Frame> = Vec::with_capacity(batch_size);

            for item in rx.iter() {
                batch.push(item?);
                if batch.len() >= batch_size {
                    if cancel.is_cancelled() {
                        return Err(PipelineError::Cancelled);
                    }
                    state.process_batch(std::mem::take(&mut batch))?;
                }
            }

            if cancel.is_cancelled() {
                return Err(PipelineError::Cancelled);
            }
            if !batch.is_empty() {
                state.process_batch(batch)?;
            }
            state.finish()
        })
    }
}

/// Streaming segmentation state: the segmenter fold plus the frames of
/// the scene currently being accumulated.
struct AnalysisState {
    segmenter: SceneSegmenter,
    keyframe_mode: KeyframeMode,
    interval: Duration,
    pending: Vec<Frame>,
    scenes: Vec<Scene>,
    keyframes: Vec<Keyframe>,
    open_boundary_score: f32,
    frames_processed: u64,
}

impl AnalysisState {
    fn new(config: &PipelineConfig, interval: Duration) -> Self {
        let fallback_fps = 1.0 / interval.as_secs_f64().max(1e-6);
        let segmenter_config = SegmenterConfig {
            threshold: config.threshold,
            cooldown_samples: config.min_scene_samples(fallback_fps),
            ..Default::default()
        };
        Self {
            segmenter: SceneSegmenter::new(segmenter_config),
            keyframe_mode: config.keyframe_mode,
            interval,
            pending: Vec::new(),
            scenes: Vec::new(),
            keyframes: Vec::new(),
            open_boundary_score: 0.0,
            frames_processed: 0,
        }
    }

    fn process_batch(&mut self, batch: Vec<Frame>) -> Result<()> {
        // Fork-join: score all consecutive pairs of this batch (including
        // the seam pair against the previous batch's tail) concurrently.
        // `collect` keeps input order, so the segmenter sees samples in
        // frame order.
        let chain: Vec<&Frame> = self.pending.last().into_iter().chain(batch.iter()).collect();
        let samples: Vec<DifferenceSample> = chain
            .par_windows(2)
            .map(|pair| sample_pair(pair[0], pair[1]))
            .collect();

        let had_previous = self.pending.last().is_some();
        for (k, frame) in batch.into_iter().enumerate() {
            let sample = if had_previous {
                Some(&samples[k])
            } else {
                // Very first frame of the stream has no incoming pair.
                k.checked_sub(1).map(|i| &samples[i])
            };

            if let Some(sample) = sample {
                if let Some(event) = self.segmenter.push(sample) {
                    self.close_scene(event.score)?;
                }
            }
            self.frames_processed += 1;
            self.pending.push(frame);
        }
        Ok(())
    }

    /// Close the currently open scene; `next_score` becomes the boundary
    /// score of the scene that opens after it.
    fn close_scene(&mut self, next_score: f32) -> Result<()> {
        debug_assert!(!self.pending.is_empty(), "boundary with no open scene");
        let first = self.pending.first().expect("open scene has frames");
        let last = self.pending.last().expect("open scene has frames");

        let scene = Scene {
            id: self.scenes.len(),
            start_frame: first.index,
            end_frame: last.index + 1,
            start_time: first.timestamp,
            end_time: last.timestamp,
            boundary_score: self.open_boundary_score,
        };
        let keyframe = select_keyframe(&scene, &self.pending, self.keyframe_mode)?;
        log::debug!(
            "scene {} closed: frames {}..{}, keyframe {}",
            scene.id,
            scene.start_frame,
            scene.end_frame,
            keyframe.frame.index
        );

        self.scenes.push(scene);
        self.keyframes.push(keyframe);
        self.pending.clear();
        self.open_boundary_score = next_score;
        Ok(())
    }

    fn finish(mut self) -> Result<Analysis> {
        if !self.pending.is_empty() {
            self.close_scene(0.0)?;
        }

        let duration_processed = self.interval.mul_f64(self.frames_processed as f64);
        Ok(Analysis {
            scenes: self.scenes,
            keyframes: self.keyframes,
            duration_processed,
        })
    }
}

fn scene_previews(analysis: &Analysis) -> Result<Vec<ScenePreview>> {
    analysis
        .scenes
        .iter()
        .zip(analysis.keyframes.iter())
        .map(|(scene, keyframe)| {
            Ok(ScenePreview {
                scene: scene.clone(),
                thumbnail_jpeg: keyframe
                    .frame
                    .thumbnail_jpeg(THUMBNAIL_WIDTH, THUMBNAIL_JPEG_QUALITY)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::export::OutputFormat;
    use crate::core::segmenter::scenes_partition;

    fn solid_frame(index: u64, interval: Duration, rgb: [u8; 3]) -> Frame {
        let data: Vec<u8> = rgb.iter().copied().cycle().take(48 * 48 * 3).collect();
        Frame::new(index, interval.mul_f64(index as f64), 48, 48, data)
    }

    fn pipeline(config: PipelineConfig) -> DocumentPipeline {
        DocumentPipeline::new(config).unwrap()
    }

    fn analyze(
        pipeline: &DocumentPipeline,
        frames: Vec<Frame>,
        interval: Duration,
    ) -> Result<Analysis> {
        pipeline.analyze(
            frames.into_iter().map(Ok),
            interval,
            &CancellationToken::new(),
        )
    }

    #[test]
    fn test_blue_then_red_yields_two_scenes() {
        // 10 s asset, solid blue 0-5 s then solid red 5-10 s, 1 fps.
        let interval = Duration::from_secs(1);
        let frames: Vec<Frame> = (0..10)
            .map(|i| {
                let rgb = if i < 5 { [0, 0, 255] } else { [255, 0, 0] };
                solid_frame(i, interval, rgb)
            })
            .collect();

        let p = pipeline(PipelineConfig {
            stride_seconds: 1.0,
            threshold: 3.0,
            min_scene_seconds: 2.0,
            ..Default::default()
        });
        let analysis = analyze(&p, frames, interval).unwrap();

        assert_eq!(analysis.scenes.len(), 2);
        assert_eq!(analysis.scenes[0].start_frame, 0);
        assert_eq!(analysis.scenes[0].end_frame, 5);
        assert_eq!(analysis.scenes[1].start_frame, 5);
        assert_eq!(analysis.scenes[1].end_frame, 10);
        assert!(analysis.scenes[1].boundary_score > 0.0);
        assert!(scenes_partition(&analysis.scenes, 10));
        assert_eq!(analysis.duration_processed, Duration::from_secs(10));
    }

    #[test]
    fn test_static_video_yields_one_scene() {
        let interval = Duration::from_secs(1);
        let frames: Vec<Frame> = (0..5)
            .map(|i| solid_frame(i, interval, [90, 90, 90]))
            .collect();

        let p = pipeline(PipelineConfig::default());
        let analysis = analyze(&p, frames, interval).unwrap();

        assert_eq!(analysis.scenes.len(), 1);
        assert_eq!(analysis.scenes[0].start_frame, 0);
        assert_eq!(analysis.scenes[0].end_frame, 5);
        assert_eq!(analysis.keyframes.len(), 1);
    }

    #[test]
    fn test_every_scene_has_in_range_keyframe() {
        let interval = Duration::from_millis(500);
        let frames: Vec<Frame> = (0..30)
            .map(|i| {
                let rgb = if i < 12 {
                    [0, 0, 220]
                } else if i < 22 {
                    [220, 0, 0]
                } else {
                    [0, 220, 0]
                };
                solid_frame(i, interval, rgb)
            })
            .collect();

        let p = pipeline(PipelineConfig {
            stride_seconds: 0.5,
            threshold: 2.5,
            min_scene_seconds: 1.0,
            ..Default::default()
        });
        let analysis = analyze(&p, frames, interval).unwrap();

        assert_eq!(analysis.scenes.len(), analysis.keyframes.len());
        assert!(!analysis.scenes.is_empty());
        for (scene, keyframe) in analysis.scenes.iter().zip(analysis.keyframes.iter()) {
            assert_eq!(scene.id, keyframe.scene_id);
            assert!(scene.contains_frame(keyframe.frame.index));
        }
        assert!(scenes_partition(&analysis.scenes, 30));
    }

    #[test]
    fn test_cooldown_merges_rapid_alternation() {
        // Stable, then a 0.5 s red/blue flicker, then stable again. With
        // min_scene_seconds = 3 (6 samples at this stride) the flicker
        // must collapse into a single boundary.
        let interval = Duration::from_millis(500);
        let frames: Vec<Frame> = (0..14)
            .map(|i| {
                let rgb = if i < 4 {
                    [0, 0, 220]
                } else if i < 10 {
                    if i % 2 == 0 {
                        [220, 0, 0]
                    } else {
                        [0, 0, 220]
                    }
                } else {
                    [0, 0, 220]
                };
                solid_frame(i, interval, rgb)
            })
            .collect();

        let p = pipeline(PipelineConfig {
            stride_seconds: 0.5,
            threshold: 2.0,
            min_scene_seconds: 3.0,
            ..Default::default()
        });
        let analysis = analyze(&p, frames, interval).unwrap();

        assert_eq!(analysis.scenes.len(), 2);
        assert_eq!(analysis.scenes[1].start_frame, 4);
        assert!(scenes_partition(&analysis.scenes, 14));
    }

    #[test]
    fn test_analysis_is_idempotent() {
        let interval = Duration::from_secs(1);
        let make_frames = || -> Vec<Frame> {
            (0..12)
                .map(|i| {
                    let rgb = if i < 6 { [10, 10, 200] } else { [200, 200, 10] };
                    solid_frame(i, interval, rgb)
                })
                .collect()
        };

        let p = pipeline(PipelineConfig::default());
        let a = analyze(&p, make_frames(), interval).unwrap();
        let b = analyze(&p, make_frames(), interval).unwrap();

        assert_eq!(a.scenes.len(), b.scenes.len());
        for (x, y) in a.scenes.iter().zip(b.scenes.iter()) {
            assert_eq!(x.start_frame, y.start_frame);
            assert_eq!(x.end_frame, y.end_frame);
        }
        for (x, y) in a.keyframes.iter().zip(b.keyframes.iter()) {
            assert_eq!(x.frame.index, y.frame.index);
        }
    }

    #[test]
    fn test_cancellation_propagates() {
        let interval = Duration::from_secs(1);
        let frames: Vec<Frame> = (0..200)
            .map(|i| solid_frame(i, interval, [50, 50, 50]))
            .collect();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let p = pipeline(PipelineConfig::default());
        let err = p
            .analyze(frames.into_iter().map(Ok), interval, &cancel)
            .unwrap_err();
        assert!(matches!(err, PipelineError::Cancelled));
    }

    #[test]
    fn test_decode_error_aborts_run() {
        let interval = Duration::from_secs(1);
        let frames: Vec<Result<Frame>> = vec![
            Ok(solid_frame(0, interval, [0, 0, 0])),
            Err(PipelineError::Decode {
                path: "clip.mp4".into(),
                frame_index: 1,
                reason: "truncated frame".to_string(),
            }),
        ];

        let p = pipeline(PipelineConfig::default());
        let err = p
            .analyze(frames, interval, &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { .. }));
    }

    #[test]
    fn test_empty_stream_yields_no_scenes() {
        let p = pipeline(PipelineConfig::default());
        let analysis = analyze(&p, Vec::new(), Duration::from_secs(1)).unwrap();
        assert!(analysis.scenes.is_empty());
        assert!(analysis.keyframes.is_empty());
        assert_eq!(analysis.duration_processed, Duration::ZERO);
    }

    #[test]
    fn test_invalid_config_rejected_before_start() {
        let err = DocumentPipeline::new(PipelineConfig {
            threshold: -1.0,
            ..Default::default()
        })
        .unwrap_err();
        assert!(matches!(err, PipelineError::InvalidConfiguration(_)));
    }

    #[test]
    fn test_end_to_end_synthetic_export_is_deterministic() {
        let interval = Duration::from_secs(1);
        let make_frames = || -> Vec<Frame> {
            (0..8)
                .map(|i| {
                    let rgb = if i < 4 { [0, 0, 255] } else { [255, 0, 0] };
                    solid_frame(i, interval, rgb)
                })
                .collect()
        };

        let p = pipeline(PipelineConfig {
            keyframe_mode: KeyframeMode::TemporalMidpoint,
            output_format: OutputFormat::Docx,
            ..Default::default()
        });

        let render = || {
            let analysis = analyze(&p, make_frames(), interval).unwrap();
            let tree = assemble(&analysis.scenes, &analysis.keyframes, &NoCaptions);
            export(&tree, OutputFormat::Docx).unwrap().document
        };
        assert_eq!(render(), render());
    }
}
