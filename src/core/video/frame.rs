use std::io::Cursor;
use std::time::Duration;

use crate::core::error::Result;

/// 帧数据结构 - packed RGB24, as piped by the decoder.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl Frame {
    pub fn new(index: u64, timestamp: Duration, width: u32, height: u32, data: Vec<u8>) -> Self {
        debug_assert_eq!(data.len(), (width * height * 3) as usize);
        Self {
            index,
            timestamp,
            width,
            height,
            data,
        }
    }

    pub fn pixel_count(&self) -> usize {
        (self.width * self.height) as usize
    }

    /// Luma plane (ITU-R BT.601 integer weights).
    pub fn to_gray(&self) -> Vec<u8> {
        self.data
            .chunks_exact(3)
            .map(|rgb| {
                ((rgb[0] as u32 * 299 + rgb[1] as u32 * 587 + rgb[2] as u32 * 114) / 1000) as u8
            })
            .collect()
    }

    pub fn resize_to(&self, target_width: u32, target_height: u32) -> Frame {
        let img = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame buffer does not match dimensions");
        let resized = image::imageops::resize(
            &img,
            target_width,
            target_height,
            image::imageops::FilterType::Triangle,
        );

        Frame {
            index: self.index,
            timestamp: self.timestamp,
            width: target_width,
            height: target_height,
            data: resized.into_raw(),
        }
    }

    /// Encode as JPEG at the given quality (1-100).
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>> {
        let img = image::RgbImage::from_raw(self.width, self.height, self.data.clone())
            .expect("frame buffer does not match dimensions");
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, image::ImageOutputFormat::Jpeg(quality))?;
        Ok(buffer.into_inner())
    }

    /// JPEG thumbnail with the width capped, aspect ratio preserved.
    pub fn thumbnail_jpeg(&self, max_width: u32, quality: u8) -> Result<Vec<u8>> {
        if self.width <= max_width {
            return self.encode_jpeg(quality);
        }
        let scale = max_width as f64 / self.width as f64;
        let height = ((self.height as f64 * scale).round() as u32).max(1);
        self.resize_to(max_width, height).encode_jpeg(quality)
    }
}

/// 帧元数据（轻量级，用于传递信息）
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub index: u64,
    pub timestamp: Duration,
    pub width: u32,
    pub height: u32,
}

impl FrameInfo {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            index: frame.index,
            timestamp: frame.timestamp,
            width: frame.width,
            height: frame.height,
        }
    }
}
