use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("unreadable media {path:?}: {reason}")]
    UnreadableMedia { path: PathBuf, reason: String },
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("scene {scene_id} has no frames")]
    EmptyScene { scene_id: usize },
    #[error("unsupported output format: {0:?}")]
    UnsupportedFormat(String),
    #[error("decode failed for {path:?} at frame {frame_index}: {reason}")]
    Decode {
        path: PathBuf,
        frame_index: u64,
        reason: String,
    },
    #[error("pipeline cancelled")]
    Cancelled,
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image encode error: {0}")]
    ImageEncode(#[from] image::ImageError),
    #[error("XML write error: {0}")]
    Xml(#[from] quick_xml::Error),
    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),
}

pub type Result<T> = std::result::Result<T, PipelineError>;
