use lane_scan_core::Interpolation;
use serde::{Deserialize, Serialize};

/// Fixed extrinsic assumptions used to derive the ground homography.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroundGeometry {
    /// Camera tilt below the horizon, degrees. Pitch is `tilt_deg - 90`.
    pub tilt_deg: f64,
    /// Rotation about the optical axis' vertical, degrees.
    pub yaw_deg: f64,
    /// Rotation about the optical axis, degrees.
    pub roll_deg: f64,
    /// Standoff along the optical axis, in focal lengths.
    pub standoff: f64,
}

impl Default for GroundGeometry {
    fn default() -> Self {
        Self {
            tilt_deg: 15.0,
            yaw_deg: 0.0,
            roll_deg: 0.0,
            standoff: 0.6,
        }
    }
}

/// Axis-aligned rectangle in normalized frame coordinates (`0..=1` on both axes).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct MaskRect {
    pub x0: f32,
    pub y0: f32,
    pub x1: f32,
    pub y1: f32,
}

impl MaskRect {
    pub const fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self { x0, y0, x1, y1 }
    }

    /// Pixel bounds `[x0, x1) x [y0, y1)` for a frame of the given size.
    pub fn to_pixels(&self, width: usize, height: usize) -> (usize, usize, usize, usize) {
        let px = |f: f32, n: usize| ((f.clamp(0.0, 1.0) * n as f32).round() as usize).min(n);
        (
            px(self.x0, width),
            px(self.y0, height),
            px(self.x1, width),
            px(self.y1, height),
        )
    }
}

/// Region stencil: pixels inside any `retain` rectangle are kept.
///
/// The default keeps everything except the bottom-center block where the
/// robot's chassis is visible: a full-width band over the top 350/480 of the
/// frame, plus the left 150/640 and right 150/640 columns of the bottom band.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionMaskParams {
    pub retain: Vec<MaskRect>,
}

impl Default for RegionMaskParams {
    fn default() -> Self {
        let horizon = 350.0 / 480.0;
        Self {
            retain: vec![
                MaskRect::new(0.0, 0.0, 1.0, horizon),
                MaskRect::new(0.0, horizon, 150.0 / 640.0, 1.0),
                MaskRect::new(490.0 / 640.0, horizon, 1.0, 1.0),
            ],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessParams {
    /// Gaussian kernel side; 3 and 5 are supported.
    pub blur_kernel: usize,
    /// Exponent of the lightness remap `255 * (v / 255)^gamma`.
    pub gamma: f64,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            blur_kernel: 5,
            gamma: 3.0,
        }
    }
}

/// Range-test bounds in HLS (OpenCV 8-bit convention, H in `0..180`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThresholdParams {
    pub low_h: u8,
    pub high_h: u8,
    /// Floor for the adaptive lightness bound; the tick starts at the frame mean.
    pub low_l: u8,
    pub high_l: u8,
    pub low_s: u8,
    pub high_s: u8,
    /// Foreground pixel count above which the frame is treated as overexposed.
    pub max_foreground: usize,
    /// Increment applied to the lightness bound per overexposure step.
    pub lightness_step: u8,
    /// Hard cap on overexposure steps for one tick.
    pub max_iterations: usize,
}

impl Default for ThresholdParams {
    fn default() -> Self {
        Self {
            low_h: 0,
            high_h: 255,
            low_l: 0,
            high_l: 255,
            low_s: 0,
            high_s: 255,
            max_foreground: 20_000,
            lightness_step: 5,
            max_iterations: 64,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContourParams {
    /// Side of the rectangular dilation element.
    pub dilation_kernel: usize,
    /// Accepted enclosed area, pixels^2, inclusive on both ends.
    pub min_area: f64,
    pub max_area: f64,
    /// Outline stroke width used when re-rendering accepted contours.
    pub stroke_width: usize,
}

impl Default for ContourParams {
    fn default() -> Self {
        Self {
            dilation_kernel: 5,
            min_area: 1500.0,
            max_area: 100_000.0,
            stroke_width: 3,
        }
    }
}

impl ContourParams {
    #[inline]
    pub fn accepts(&self, area: f64) -> bool {
        area >= self.min_area && area <= self.max_area
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuantizeParams {
    /// Palette size.
    pub num_colors: usize,
    pub max_iters: usize,
    /// Stop once no center moves by more than this (color units).
    pub epsilon: f32,
    /// Independent restarts when not warm-started; the most compact wins.
    pub attempts: usize,
    /// Seed for k-means++ seeding.
    pub seed: u64,
}

impl Default for QuantizeParams {
    fn default() -> Self {
        Self {
            num_colors: 8,
            max_iters: 10,
            epsilon: 0.5,
            attempts: 2,
            seed: 0x1a7e_5ca0,
        }
    }
}

/// Range/bearing conversion of the ground-plane mask.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanParams {
    pub num_bins: usize,
    /// Total angular span, degrees, centered straight ahead.
    pub fov_deg: f32,
    pub range_min: f32,
    pub range_max: f32,
    /// Ground distance covered by one projected pixel.
    pub meters_per_pixel: f32,
    /// Minimum ground-mask value counted as a hit.
    pub hit_threshold: u8,
}

impl Default for ScanParams {
    fn default() -> Self {
        Self {
            num_bins: 90,
            fov_deg: 120.0,
            range_min: 0.05,
            range_max: 5.0,
            meters_per_pixel: 0.01,
            hit_threshold: 128,
        }
    }
}

/// All tunables of one detector instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneScanParams {
    pub geometry: GroundGeometry,
    pub region: RegionMaskParams,
    pub preprocess: PreprocessParams,
    pub threshold: ThresholdParams,
    pub contours: ContourParams,
    pub quantize: QuantizeParams,
    pub scan: ScanParams,
    pub interpolation: Interpolation,
    /// Seconds between repeated "no frame" notices.
    pub empty_notice_period_s: f64,
}

impl Default for LaneScanParams {
    fn default() -> Self {
        Self {
            geometry: GroundGeometry::default(),
            region: RegionMaskParams::default(),
            preprocess: PreprocessParams::default(),
            threshold: ThresholdParams::default(),
            contours: ContourParams::default(),
            quantize: QuantizeParams::default(),
            scan: ScanParams::default(),
            interpolation: Interpolation::Bicubic,
            empty_notice_period_s: 2.0,
        }
    }
}
