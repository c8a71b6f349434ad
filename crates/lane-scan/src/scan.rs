//! Range/bearing conversion of the ground-plane mask.

use crate::ScanParams;
use lane_scan_core::{CameraModel, GrayImageView};
use serde::Serialize;

/// Planar range scan, one reading per angular bin.
///
/// Bin `i` looks along `angle_min + i * angle_increment` radians, zero straight
/// ahead and positive to the left. Bins with no hit hold `f32::INFINITY`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct LaserScan {
    pub frame_id: String,
    pub angle_min: f32,
    pub angle_max: f32,
    pub angle_increment: f32,
    pub range_min: f32,
    pub range_max: f32,
    pub ranges: Vec<f32>,
}

impl LaserScan {
    /// Bearing of bin `i`, radians.
    pub fn angle(&self, i: usize) -> f32 {
        self.angle_min + i as f32 * self.angle_increment
    }

    /// Number of bins with a finite reading.
    pub fn hits(&self) -> usize {
        self.ranges.iter().filter(|r| r.is_finite()).count()
    }

    /// Readings with misses as `None`, for JSON output.
    pub fn finite_ranges(&self) -> Vec<Option<f32>> {
        self.ranges
            .iter()
            .map(|&r| r.is_finite().then_some(r))
            .collect()
    }
}

/// Turns the ground-plane mask into a range scan.
pub trait ScanConverter {
    fn convert(&self, mask: &GrayImageView<'_>, camera: &CameraModel) -> LaserScan;
}

/// Ray-marches from the bottom-center of the ground mask and records the
/// nearest marking per bin.
#[derive(Clone, Debug, Default)]
pub struct GroundMaskScanConverter {
    pub params: ScanParams,
}

impl GroundMaskScanConverter {
    pub fn new(params: ScanParams) -> Self {
        Self { params }
    }

    fn march(&self, mask: &GrayImageView<'_>, angle: f32) -> f32 {
        let p = &self.params;
        let mpp = p.meters_per_pixel;
        if mpp <= 0.0 {
            return f32::INFINITY;
        }
        let (ox, oy) = (mask.width as f32 / 2.0, mask.height as f32 - 1.0);
        let (dx, dy) = (-angle.sin(), -angle.cos());
        let start = (p.range_min / mpp).ceil().max(0.0) as usize;
        let end = (p.range_max / mpp).floor() as usize;
        for step in start..=end {
            let r = step as f32;
            let x = (ox + dx * r).round();
            let y = (oy + dy * r).round();
            if x < 0.0 || y < 0.0 || x >= mask.width as f32 || y >= mask.height as f32 {
                break;
            }
            if mask.data[y as usize * mask.width + x as usize] >= p.hit_threshold {
                return r * mpp;
            }
        }
        f32::INFINITY
    }
}

impl ScanConverter for GroundMaskScanConverter {
    fn convert(&self, mask: &GrayImageView<'_>, camera: &CameraModel) -> LaserScan {
        let p = &self.params;
        let bins = p.num_bins.max(1);
        let fov = p.fov_deg.to_radians();
        let (angle_min, increment) = if bins == 1 {
            (0.0, 0.0)
        } else {
            (-fov / 2.0, fov / (bins - 1) as f32)
        };

        let ranges = if mask.width == 0 || mask.height == 0 {
            vec![f32::INFINITY; bins]
        } else {
            (0..bins)
                .map(|i| self.march(mask, angle_min + i as f32 * increment))
                .collect()
        };

        LaserScan {
            frame_id: camera.frame_id.clone(),
            angle_min,
            angle_max: angle_min + increment * (bins - 1) as f32,
            angle_increment: increment,
            range_min: p.range_min,
            range_max: p.range_max,
            ranges,
        }
    }
}
