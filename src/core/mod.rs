pub mod config;
pub mod diff;
pub mod document;
pub mod error;
pub mod export;
pub mod keyframe;
pub mod pipeline;
pub mod segmenter;
pub mod video;
