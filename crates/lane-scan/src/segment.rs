//! Closed-loop lightness segmentation.
//!
//! The lower lightness bound starts at the frame's mean lightness and is
//! raised in fixed steps while the candidate mask is larger than the
//! overexposure ceiling.

use crate::ThresholdParams;
use lane_scan_core::{ColorImage, GrayImage};
use serde::{Deserialize, Serialize};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Binary candidate mask plus the loop state that produced it.
#[derive(Clone, Debug)]
pub struct Segmentation {
    pub mask: GrayImage,
    pub stats: SegmentationStats,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentationStats {
    /// Mean lightness of the input frame (truncated).
    pub mean_lightness: u8,
    /// Lower lightness bound of the returned mask.
    pub low_lightness: u8,
    /// Overexposure steps taken.
    pub iterations: usize,
    pub foreground: usize,
    /// The ceiling could not be met within the bound range or iteration cap.
    pub degraded: bool,
}

/// Inclusive per-channel range test on an HLS frame.
pub fn in_range(frame: &ColorImage, low: [u8; 3], high: [u8; 3]) -> GrayImage {
    let data = frame
        .data
        .chunks_exact(3)
        .map(|px| {
            let inside = (0..3).all(|c| px[c] >= low[c] && px[c] <= high[c]);
            if inside {
                255
            } else {
                0
            }
        })
        .collect();
    GrayImage {
        width: frame.width,
        height: frame.height,
        data,
    }
}

/// Mean of the lightness (second) channel.
pub fn mean_lightness(frame: &ColorImage) -> f64 {
    let n = frame.width * frame.height;
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = frame.data.chunks_exact(3).map(|px| px[1] as u64).sum();
    sum as f64 / n as f64
}

/// Segment bright markings from a preprocessed (HLS) frame.
///
/// The returned mask has at most `params.max_foreground` pixels set unless
/// `stats.degraded` is true, in which case it is the smallest mask reached.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = frame.width, height = frame.height))
)]
pub fn segment(frame: &ColorImage, params: &ThresholdParams) -> Segmentation {
    let mean = mean_lightness(frame).clamp(0.0, 255.0) as u8;
    let mut low_l = mean.max(params.low_l);
    let high = [params.high_h, params.high_l, params.high_s];
    let bounds = |l: u8| [params.low_h, l, params.low_s];

    let mut mask = in_range(frame, bounds(low_l), high);
    let mut foreground = mask.count_nonzero();
    let mut iterations = 0usize;
    let mut degraded = false;

    while foreground > params.max_foreground {
        if iterations >= params.max_iterations || low_l == u8::MAX {
            degraded = true;
            break;
        }
        low_l = low_l.saturating_add(params.lightness_step);
        iterations += 1;
        mask = in_range(frame, bounds(low_l), high);
        foreground = mask.count_nonzero();
    }

    if degraded {
        log::warn!(
            "overexposed frame: {foreground} px above L={low_l} after {iterations} steps"
        );
    } else {
        log::debug!("segmented {foreground} px at L={low_l} (mean {mean}, {iterations} steps)");
    }

    Segmentation {
        mask,
        stats: SegmentationStats {
            mean_lightness: mean,
            low_lightness: low_l,
            iterations,
            foreground,
            degraded,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lightness_frame(w: usize, h: usize, f: impl Fn(usize, usize) -> u8) -> ColorImage {
        let mut img = ColorImage::new(w, h);
        for y in 0..h {
            for x in 0..w {
                img.put_pixel(x, y, [0, f(x, y), 0]);
            }
        }
        img
    }

    #[test]
    fn in_range_is_inclusive() {
        let frame = lightness_frame(3, 1, |x, _| [9, 10, 11][x]);
        let mask = in_range(&frame, [0, 10, 0], [255, 10, 255]);
        assert_eq!(mask.data, vec![0, 255, 0]);
    }

    #[test]
    fn dark_frame_with_bright_patch_needs_no_steps() {
        let frame = lightness_frame(100, 100, |x, y| {
            if (40..60).contains(&x) && (40..60).contains(&y) {
                250
            } else {
                0
            }
        });
        let seg = segment(&frame, &ThresholdParams::default());
        assert_eq!(seg.stats.iterations, 0);
        assert_eq!(seg.stats.foreground, 400);
        assert!(!seg.stats.degraded);
    }

    #[test]
    fn overexposed_gradient_converges_under_ceiling() {
        let frame = lightness_frame(640, 480, |x, _| (x * 255 / 639) as u8);
        let params = ThresholdParams::default();
        let seg = segment(&frame, &params);
        assert!(!seg.stats.degraded);
        assert!(seg.stats.iterations > 0);
        assert!(seg.stats.foreground <= params.max_foreground);
        assert!(seg.stats.low_lightness > seg.stats.mean_lightness);
        assert_eq!(seg.mask.count_nonzero(), seg.stats.foreground);
    }

    #[test]
    fn saturated_frame_is_flagged_degraded() {
        let frame = lightness_frame(640, 480, |_, _| 255);
        let params = ThresholdParams::default();
        let seg = segment(&frame, &params);
        assert!(seg.stats.degraded);
        assert!(seg.stats.iterations <= params.max_iterations);
        assert_eq!(seg.stats.low_lightness, 255);
    }

    #[test]
    fn iteration_cap_bounds_the_loop() {
        let frame = lightness_frame(200, 200, |x, _| if x < 150 { 200 } else { 0 });
        let params = ThresholdParams {
            max_foreground: 10,
            lightness_step: 0,
            max_iterations: 7,
            ..ThresholdParams::default()
        };
        let seg = segment(&frame, &params);
        assert!(seg.stats.degraded);
        assert_eq!(seg.stats.iterations, 7);
    }

    #[test]
    fn property_count_below_ceiling_or_degraded() {
        for level in [0u8, 40, 128, 200, 254, 255] {
            let frame = lightness_frame(320, 240, |x, y| level.saturating_add(((x + y) % 3) as u8));
            let params = ThresholdParams::default();
            let seg = segment(&frame, &params);
            assert!(
                seg.mask.count_nonzero() <= params.max_foreground || seg.stats.degraded,
                "level {level}"
            );
        }
    }
}
