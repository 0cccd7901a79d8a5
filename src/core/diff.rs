//! Frame dissimilarity scoring.
//!
//! Pure functions only: scores for independent frame pairs can be computed
//! concurrently and re-sequenced by the caller.

use crate::core::video::frame::Frame;

const GRID: usize = 8;
const HIST_BINS: usize = 64;

/// One score per consecutive (or strided) frame pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DifferenceSample {
    pub from_index: u64,
    pub to_index: u64,
    pub score: f32,
}

/// Dissimilarity between two frames, >= 0.0, 0.0 for identical content.
///
/// Combines three terms:
/// - mean absolute distance over an 8x8 luma grid (coarse layout change)
/// - 64-bin grayscale histogram intersection (global tonal change)
/// - edge-density delta, which stays small during pans where the grid
///   term alone would overreact
pub fn frame_difference(a: &Frame, b: &Frame) -> f32 {
    let gray_a = a.to_gray();
    let gray_b = b.to_gray();

    let grid_a = luma_grid(&gray_a, a.width, a.height);
    let grid_b = luma_grid(&gray_b, b.width, b.height);
    let grid_term = grid_distance(&grid_a, &grid_b);

    let hist_a = gray_histogram(&gray_a);
    let hist_b = gray_histogram(&gray_b);
    let hist_term = 1.0 - histogram_intersection(&hist_a, &hist_b);

    let edge_a = edge_density(&gray_a, a.width, a.height);
    let edge_b = edge_density(&gray_b, b.width, b.height);
    let edge_term = (edge_a - edge_b).abs();

    grid_term * 0.5 + hist_term * 0.3 + edge_term * 0.2
}

pub fn sample_pair(a: &Frame, b: &Frame) -> DifferenceSample {
    DifferenceSample {
        from_index: a.index,
        to_index: b.index,
        score: frame_difference(a, b),
    }
}

/// Block-average the luma plane down to GRID x GRID cells.
fn luma_grid(gray: &[u8], width: u32, height: u32) -> [f32; GRID * GRID] {
    let w = width as usize;
    let h = height as usize;
    let block_w = (w / GRID).max(1);
    let block_h = (h / GRID).max(1);

    let mut cells = [0.0f32; GRID * GRID];

    for by in 0..GRID {
        for bx in 0..GRID {
            let y_start = by * block_h;
            let y_end = ((by + 1) * block_h).min(h);
            let x_start = bx * block_w;
            let x_end = ((bx + 1) * block_w).min(w);

            let mut sum = 0u32;
            let mut count = 0u32;
            for y in y_start..y_end {
                let row = y * w;
                for x in x_start..x_end {
                    if let Some(&v) = gray.get(row + x) {
                        sum += v as u32;
                        count += 1;
                    }
                }
            }
            cells[by * GRID + bx] = if count > 0 {
                sum as f32 / count as f32 / 255.0
            } else {
                0.0
            };
        }
    }

    cells
}

fn grid_distance(a: &[f32; GRID * GRID], b: &[f32; GRID * GRID]) -> f32 {
    let sum: f32 = a.iter().zip(b.iter()).map(|(x, y)| (x - y).abs()).sum();
    sum / (GRID * GRID) as f32
}

fn gray_histogram(gray: &[u8]) -> [u32; HIST_BINS] {
    let mut hist = [0u32; HIST_BINS];
    for &v in gray {
        hist[(v >> 2) as usize] += 1;
    }
    hist
}

fn histogram_intersection(h1: &[u32; HIST_BINS], h2: &[u32; HIST_BINS]) -> f32 {
    let overlap: u32 = h1.iter().zip(h2.iter()).map(|(a, b)| a.min(b)).sum();
    let sum1: u32 = h1.iter().sum();
    let sum2: u32 = h2.iter().sum();

    if sum1 == 0 || sum2 == 0 {
        return 0.0;
    }
    overlap as f32 / sum1.max(sum2) as f32
}

/// Fraction of sampled pixels whose gradient magnitude clears a fixed
/// threshold. Every 2nd pixel is enough for a density estimate.
fn edge_density(gray: &[u8], width: u32, height: u32) -> f32 {
    let w = width as usize;
    let h = height as usize;
    if w < 3 || h < 3 {
        return 0.0;
    }

    const THRESHOLD_SQ: i32 = 30 * 30;
    let mut edges = 0u32;
    let mut total = 0u32;

    for y in (1..h - 1).step_by(2) {
        for x in (1..w - 1).step_by(2) {
            let idx = y * w + x;
            let gx = gray[idx + 1] as i32 - gray[idx - 1] as i32;
            let gy = gray[idx + w] as i32 - gray[idx - w] as i32;
            if gx * gx + gy * gy > THRESHOLD_SQ {
                edges += 1;
            }
            total += 1;
        }
    }

    if total == 0 {
        0.0
    } else {
        edges as f32 / total as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn solid_frame(index: u64, rgb: [u8; 3]) -> Frame {
        let data: Vec<u8> = rgb.iter().copied().cycle().take(64 * 64 * 3).collect();
        Frame::new(index, Duration::from_secs(index), 64, 64, data)
    }

    fn noisy_frame(index: u64, base: u8, amplitude: u8) -> Frame {
        let mut data = Vec::with_capacity(64 * 64 * 3);
        for i in 0..(64 * 64) {
            let v = base.wrapping_add(((i * 7) % (amplitude as usize + 1)) as u8);
            data.extend_from_slice(&[v, v, v]);
        }
        Frame::new(index, Duration::from_secs(index), 64, 64, data)
    }

    #[test]
    fn test_identical_frames_score_zero() {
        let a = solid_frame(0, [120, 80, 40]);
        let b = solid_frame(1, [120, 80, 40]);
        assert_eq!(frame_difference(&a, &b), 0.0);
    }

    #[test]
    fn test_hard_cut_scores_high() {
        let blue = solid_frame(0, [0, 0, 255]);
        let red = solid_frame(1, [255, 0, 0]);
        let score = frame_difference(&blue, &red);
        assert!(score > 0.1, "hard cut scored {}", score);
    }

    #[test]
    fn test_near_duplicate_scores_low() {
        let a = noisy_frame(0, 100, 8);
        let b = noisy_frame(1, 101, 8);
        let near = frame_difference(&a, &b);

        let c = solid_frame(2, [255, 255, 255]);
        let far = frame_difference(&a, &c);
        assert!(near < far);
        assert!(near < 0.05, "near duplicate scored {}", near);
    }

    #[test]
    fn test_score_is_symmetric_enough_for_ordering() {
        let a = noisy_frame(0, 60, 20);
        let b = solid_frame(1, [200, 200, 200]);
        let ab = frame_difference(&a, &b);
        let ba = frame_difference(&b, &a);
        assert!((ab - ba).abs() < 1e-6);
    }

    #[test]
    fn test_sample_pair_carries_indices() {
        let a = solid_frame(4, [0, 0, 0]);
        let b = solid_frame(5, [0, 0, 0]);
        let sample = sample_pair(&a, &b);
        assert_eq!(sample.from_index, 4);
        assert_eq!(sample.to_index, 5);
        assert_eq!(sample.score, 0.0);
    }
}
