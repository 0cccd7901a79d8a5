//! Thin façade over the pipeline for embedding applications (the
//! interactive preview surface drives everything through this).

use std::path::{Path, PathBuf};

use log::info;

use crate::core::config::PipelineConfig;
use crate::core::document::{CaptionProvider, NoCaptions};
use crate::core::error::Result;
use crate::core::pipeline::{
    CancellationToken, DocumentPipeline, PipelineOutput, RunSummary, ScenePreview,
};
use crate::core::video::clip::{extract_clip, extract_screenshots};

/// One configured generator. Each call is an isolated pipeline run; the
/// preview surface reuses a generator until the user edits threshold or
/// stride, then creates a new one.
#[derive(Debug)]
pub struct DocumentGenerator {
    pipeline: DocumentPipeline,
    cancel: CancellationToken,
}

impl DocumentGenerator {
    pub fn create(config: PipelineConfig) -> Result<Self> {
        let pipeline = DocumentPipeline::new(config)?;
        info!("DocumentGenerator: created");
        Ok(Self {
            pipeline,
            cancel: CancellationToken::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        self.pipeline.config()
    }

    /// Token the embedding application can hand to a cancel button.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Full run without captions.
    pub fn generate<P: AsRef<Path>>(&self, video: P) -> Result<PipelineOutput> {
        self.pipeline.run(video, &NoCaptions, &self.cancel)
    }

    /// Full run with externally supplied captions.
    pub fn generate_with_captions<P: AsRef<Path>>(
        &self,
        video: P,
        captions: &dyn CaptionProvider,
    ) -> Result<PipelineOutput> {
        self.pipeline.run(video, captions, &self.cancel)
    }

    /// Run and write the document (plus sidecar images) under `out_dir`.
    /// Returns the document path and the run summary.
    pub fn generate_to_dir<P: AsRef<Path>>(
        &self,
        video: P,
        out_dir: &Path,
        stem: &str,
        captions: &dyn CaptionProvider,
    ) -> Result<(PathBuf, RunSummary)> {
        let output = self.pipeline.run(video, captions, &self.cancel)?;
        let doc_path = output.artifact.write_to(out_dir, stem)?;
        Ok((doc_path, output.summary))
    }

    /// Scene scan with thumbnails, no document.
    pub fn preview<P: AsRef<Path>>(&self, video: P) -> Result<(RunSummary, Vec<ScenePreview>)> {
        self.pipeline.preview(video, &self.cancel)
    }

    /// Still screenshots at explicit timestamps (seconds).
    pub fn screenshots<P: AsRef<Path>>(
        &self,
        video: P,
        timestamps: &[f64],
        out_dir: P,
    ) -> Result<Vec<PathBuf>> {
        extract_screenshots(video, timestamps, out_dir)
    }

    /// Cut a clip without re-encoding.
    pub fn clip<P: AsRef<Path>>(
        &self,
        video: P,
        start_seconds: f64,
        duration_seconds: f64,
        out_path: P,
    ) -> Result<PathBuf> {
        extract_clip(video, start_seconds, duration_seconds, out_path)
    }
}

impl Drop for DocumentGenerator {
    fn drop(&mut self) {
        info!("DocumentGenerator: released");
    }
}
