//! Frame-difference motion scoring.
//!
//! Motion estimation only needs a coarse luminance-change signal, so frames
//! are downsampled to 64×36 before differencing; that keeps the sampling
//! loop cheap enough to run continuously on modest hardware.

use image::{imageops, GrayImage};

pub const MOTION_WIDTH: u32 = 64;
pub const MOTION_HEIGHT: u32 = 36;

/// Mean-luminance-difference value above which an interval counts as a
/// motion event.
pub const MOTION_EVENT_THRESHOLD: f64 = 12.0;

/// Downsamples a grayscale frame to the fixed motion-analysis resolution.
pub fn downsample(frame: &GrayImage) -> GrayImage {
    if frame.dimensions() == (MOTION_WIDTH, MOTION_HEIGHT) {
        return frame.clone();
    }
    imageops::resize(
        frame,
        MOTION_WIDTH,
        MOTION_HEIGHT,
        imageops::FilterType::Triangle,
    )
}

/// Mean absolute luminance difference between two equally sized frames,
/// in 0..=255.
pub fn mean_abs_diff(prev: &GrayImage, cur: &GrayImage) -> f64 {
    debug_assert_eq!(prev.dimensions(), cur.dimensions());
    let total: u64 = prev
        .as_raw()
        .iter()
        .zip(cur.as_raw().iter())
        .map(|(a, b)| a.abs_diff(*b) as u64)
        .sum();
    total as f64 / prev.as_raw().len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn frame(luma: u8) -> GrayImage {
        GrayImage::from_pixel(MOTION_WIDTH, MOTION_HEIGHT, image::Luma([luma]))
    }

    #[test]
    fn identical_frames_score_zero() {
        assert_eq!(mean_abs_diff(&frame(77), &frame(77)), 0.0);
    }

    #[test]
    fn opposite_frames_score_full_range() {
        assert_eq!(mean_abs_diff(&frame(0), &frame(255)), 255.0);
    }

    #[test]
    fn small_change_stays_below_event_threshold() {
        let score = mean_abs_diff(&frame(100), &frame(105));
        assert_eq!(score, 5.0);
        assert!(score < MOTION_EVENT_THRESHOLD);
    }

    #[test]
    fn downsample_normalizes_resolution() {
        let big = GrayImage::from_pixel(640, 360, image::Luma([10]));
        let small = downsample(&big);
        assert_eq!(small.dimensions(), (MOTION_WIDTH, MOTION_HEIGHT));
    }
}
