pub mod clip;
pub mod frame;
pub mod source;

pub use clip::{extract_clip, extract_screenshots};
pub use frame::{Frame, FrameInfo};
pub use source::{FrameIter, VideoMetadata, VideoSource};
