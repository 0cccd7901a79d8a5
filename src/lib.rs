//! scenedoc: scene segmentation and document assembly for video assets.
//!
//! Decodes a video, detects scene boundaries from a frame-difference
//! stream, picks representative keyframes, and assembles them with
//! optional captions into an exportable document (docx, markdown, html).

pub mod api;
pub mod core;

pub use crate::api::DocumentGenerator;
pub use crate::core::config::PipelineConfig;
pub use crate::core::document::{CaptionProvider, NoCaptions, StaticCaptions};
pub use crate::core::error::PipelineError;
pub use crate::core::export::OutputFormat;
pub use crate::core::keyframe::KeyframeMode;
pub use crate::core::pipeline::{CancellationToken, DocumentPipeline, PipelineOutput, RunSummary};
