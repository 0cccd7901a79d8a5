//! Video asset access via the ffmpeg toolchain.
//!
//! `open` probes the container with ffprobe; `sample_at` spawns an ffmpeg
//! child that pipes packed RGB24 frames on stdout. The child process is
//! the decoder resource: it is killed and reaped when the iterator is
//! dropped, finished, or fails.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::time::Duration;

use once_cell::sync::Lazy;
use serde::Deserialize;

use crate::core::error::{PipelineError, Result};
use crate::core::video::frame::Frame;

static FFMPEG_BIN: Lazy<String> =
    Lazy::new(|| std::env::var("SCENEDOC_FFMPEG").unwrap_or_else(|_| "ffmpeg".to_string()));
static FFPROBE_BIN: Lazy<String> =
    Lazy::new(|| std::env::var("SCENEDOC_FFPROBE").unwrap_or_else(|_| "ffprobe".to_string()));

pub(crate) fn ffmpeg_bin() -> &'static str {
    &FFMPEG_BIN
}

/// Assumed when the container reports no usable frame rate.
const DEFAULT_FPS: f64 = 30.0;

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    streams: Option<Vec<ProbeStream>>,
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

#[derive(Debug, Clone)]
pub struct VideoMetadata {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub duration: Option<Duration>,
}

/// An opened, probed video asset.
#[derive(Debug)]
pub struct VideoSource {
    path: PathBuf,
    metadata: VideoMetadata,
}

impl VideoSource {
    /// Probe the container. Fails with `UnreadableMedia` when the probe
    /// cannot run, the container cannot be demuxed, or it has no video
    /// stream.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let output = Command::new(FFPROBE_BIN.as_str())
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_entries",
                "stream=width,height,avg_frame_rate,duration",
                "-show_entries",
                "format=duration",
                "-of",
                "json",
            ])
            .arg(&path)
            .output()
            .map_err(|e| PipelineError::UnreadableMedia {
                path: path.clone(),
                reason: format!("failed to run ffprobe: {}", e),
            })?;

        if !output.status.success() {
            return Err(PipelineError::UnreadableMedia {
                path,
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let probe: ProbeOutput =
            serde_json::from_slice(&output.stdout).map_err(|e| PipelineError::UnreadableMedia {
                path: path.clone(),
                reason: format!("unparseable probe output: {}", e),
            })?;

        let metadata = parse_metadata(&path, probe)?;
        log::info!(
            "opened {} ({}x{} @ {:.2} fps)",
            path.display(),
            metadata.width,
            metadata.height,
            metadata.fps
        );
        Ok(Self { path, metadata })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    /// Effective sampling interval for a given stride.
    pub fn sample_interval(&self, stride_seconds: f64) -> Duration {
        if stride_seconds > 0.0 {
            Duration::from_secs_f64(stride_seconds)
        } else {
            Duration::from_secs_f64(1.0 / self.metadata.fps.max(1.0))
        }
    }

    /// Spawn the decoder and return a lazy, single-pass frame iterator.
    /// A stride of 0 decodes every frame. The iterator is not restartable;
    /// call `sample_at` again to decode from the start.
    pub fn sample_at(&self, stride_seconds: f64) -> Result<FrameIter> {
        let mut command = Command::new(FFMPEG_BIN.as_str());
        command.arg("-i").arg(&self.path);
        if stride_seconds > 0.0 {
            command
                .arg("-vf")
                .arg(format!("fps=1/{}", stride_seconds));
        }
        command
            .args(["-f", "rawvideo", "-pix_fmt", "rgb24", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null());

        let mut child = command.spawn().map_err(|e| PipelineError::UnreadableMedia {
            path: self.path.clone(),
            reason: format!("failed to spawn ffmpeg: {}", e),
        })?;
        let stdout = child.stdout.take().expect("stdout was piped");

        log::debug!(
            "decoding {} at stride {}s",
            self.path.display(),
            stride_seconds
        );
        Ok(FrameIter {
            path: self.path.clone(),
            child: Some(child),
            stdout,
            width: self.metadata.width,
            height: self.metadata.height,
            interval: self.sample_interval(stride_seconds),
            next_index: 0,
            done: false,
        })
    }
}

fn parse_metadata(path: &Path, probe: ProbeOutput) -> Result<VideoMetadata> {
    let streams = probe.streams.unwrap_or_default();
    let stream = streams.first().ok_or_else(|| PipelineError::UnreadableMedia {
        path: path.to_path_buf(),
        reason: "no video stream".to_string(),
    })?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => {
            return Err(PipelineError::UnreadableMedia {
                path: path.to_path_buf(),
                reason: "video stream has no dimensions".to_string(),
            })
        }
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rational)
        .unwrap_or_else(|| {
            log::warn!("no frame rate reported, assuming {} fps", DEFAULT_FPS);
            DEFAULT_FPS
        });

    let duration = stream
        .duration
        .as_deref()
        .or(probe.format.as_ref().and_then(|f| f.duration.as_deref()))
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| *d > 0.0)
        .map(Duration::from_secs_f64);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        duration,
    })
}

/// ffprobe rates come as rationals like `30000/1001`; `0/0` means unknown.
fn parse_rational(value: &str) -> Option<f64> {
    let (num, den) = value.split_once('/')?;
    let num: f64 = num.parse().ok()?;
    let den: f64 = den.parse().ok()?;
    if num <= 0.0 || den <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Lazy frame sequence over the ffmpeg child's stdout. Finite and
/// single-pass.
pub struct FrameIter {
    path: PathBuf,
    child: Option<Child>,
    stdout: ChildStdout,
    width: u32,
    height: u32,
    interval: Duration,
    next_index: u64,
    done: bool,
}

impl FrameIter {
    fn frame_size(&self) -> usize {
        (self.width * self.height * 3) as usize
    }

    /// Read a full frame. `Ok(0)` means clean end of stream; any other
    /// short read is a truncated frame.
    fn read_frame(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let mut filled = 0;
        while filled < buf.len() {
            match self.stdout.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(filled)
    }

    fn finish(&mut self) -> Result<()> {
        self.done = true;
        if let Some(mut child) = self.child.take() {
            let status = child.wait()?;
            if !status.success() {
                return Err(PipelineError::Decode {
                    path: self.path.clone(),
                    frame_index: self.next_index,
                    reason: format!("ffmpeg exited with {}", status),
                });
            }
        }
        Ok(())
    }

    fn abort(&mut self) {
        self.done = true;
        if let Some(mut child) = self.child.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}

impl Iterator for FrameIter {
    type Item = Result<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut buf = vec![0u8; self.frame_size()];
        match self.read_frame(&mut buf) {
            Ok(0) => match self.finish() {
                Ok(()) => None,
                Err(e) => Some(Err(e)),
            },
            Ok(n) if n == buf.len() => {
                let index = self.next_index;
                self.next_index += 1;
                Some(Ok(Frame::new(
                    index,
                    self.interval.mul_f64(index as f64),
                    self.width,
                    self.height,
                    buf,
                )))
            }
            Ok(n) => {
                // Truncated frame: fatal, silently dropping it would shift
                // every downstream boundary.
                self.abort();
                Some(Err(PipelineError::Decode {
                    path: self.path.clone(),
                    frame_index: self.next_index,
                    reason: format!("truncated frame ({} of {} bytes)", n, buf.len()),
                }))
            }
            Err(e) => {
                self.abort();
                Some(Err(PipelineError::Decode {
                    path: self.path.clone(),
                    frame_index: self.next_index,
                    reason: e.to_string(),
                }))
            }
        }
    }
}

impl Drop for FrameIter {
    fn drop(&mut self) {
        self.abort();
    }
}
