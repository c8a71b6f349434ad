use crate::{sample_bicubic_u8, sample_bilinear_u8, GrayImage, GrayImageView};
use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};

/// A 3x3 projective transform acting on homogeneous pixel coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Homography {
    pub h: Matrix3<f64>,
}

impl Homography {
    pub fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    pub fn identity() -> Self {
        Self::new(Matrix3::identity())
    }

    pub fn from_array(rows: [[f64; 3]; 3]) -> Self {
        Self::new(Matrix3::from_row_slice(&[
            rows[0][0], rows[0][1], rows[0][2], rows[1][0], rows[1][1], rows[1][2], rows[2][0],
            rows[2][1], rows[2][2],
        ]))
    }

    pub fn to_array(&self) -> [[f64; 3]; 3] {
        [
            [self.h[(0, 0)], self.h[(0, 1)], self.h[(0, 2)]],
            [self.h[(1, 0)], self.h[(1, 1)], self.h[(1, 2)]],
            [self.h[(2, 0)], self.h[(2, 1)], self.h[(2, 2)]],
        ]
    }

    #[inline]
    pub fn apply(&self, p: Point2<f32>) -> Point2<f32> {
        let v = self.h * Vector3::new(p.x as f64, p.y as f64, 1.0);
        let w = v[2];
        Point2::new((v[0] / w) as f32, (v[1] / w) as f32)
    }

    pub fn inverse(&self) -> Option<Self> {
        self.h.try_inverse().map(Self::new)
    }

    /// True when every entry is finite.
    pub fn is_finite(&self) -> bool {
        self.h.iter().all(|v| v.is_finite())
    }

    pub fn determinant(&self) -> f64 {
        self.h.determinant()
    }
}

/// Resampling kernel for [`warp_perspective_gray`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Interpolation {
    Bilinear,
    #[default]
    Bicubic,
}

/// Inverse-mapped warp: for each dst pixel, map to src via `h_src_from_dst` and sample.
///
/// Pixels are addressed by their integer coordinates. Destination pixels that
/// map to infinity (`w == 0`) or outside the source are left at zero. The
/// overall scale of `h_src_from_dst` is irrelevant, including its sign.
pub fn warp_perspective_gray(
    src: &GrayImageView<'_>,
    h_src_from_dst: Homography,
    out_w: usize,
    out_h: usize,
    interpolation: Interpolation,
) -> GrayImage {
    let mut out = vec![0u8; out_w * out_h];
    let max_x = src.width as f64;
    let max_y = src.height as f64;

    for y in 0..out_h {
        for x in 0..out_w {
            let v = h_src_from_dst.h * Vector3::new(x as f64, y as f64, 1.0);
            if v[2].abs() < 1e-12 {
                continue;
            }
            let sx = v[0] / v[2];
            let sy = v[1] / v[2];
            if !(sx > -1.0 && sy > -1.0 && sx < max_x && sy < max_y) {
                continue;
            }
            out[y * out_w + x] = match interpolation {
                Interpolation::Bilinear => sample_bilinear_u8(src, sx as f32, sy as f32),
                Interpolation::Bicubic => sample_bicubic_u8(src, sx as f32, sy as f32),
            };
        }
    }

    GrayImage {
        width: out_w,
        height: out_h,
        data: out,
    }
}
