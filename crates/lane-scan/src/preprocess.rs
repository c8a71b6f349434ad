//! Frame preprocessing: region mask, blur, HLS conversion and gamma remap.

use crate::region_mask::RegionMask;
use crate::{LaneScanError, PreprocessParams};
use lane_scan_core::ColorImage;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Precomputed `255 * (v / 255)^gamma` table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GammaLut {
    table: [u8; 256],
}

impl GammaLut {
    pub fn new(gamma: f64) -> Self {
        let mut table = [0u8; 256];
        for (i, t) in table.iter_mut().enumerate() {
            *t = ((i as f64 / 255.0).powf(gamma) * 255.0)
                .round()
                .clamp(0.0, 255.0) as u8;
        }
        Self { table }
    }

    #[inline]
    pub fn map(&self, v: u8) -> u8 {
        self.table[v as usize]
    }

    /// Remap every sample of `img` in place (all channels).
    pub fn apply(&self, img: &mut ColorImage) {
        for v in img.data.iter_mut() {
            *v = self.table[*v as usize];
        }
    }
}

#[inline]
fn reflect101(i: isize, n: usize) -> usize {
    if n == 1 {
        return 0;
    }
    let n = n as isize;
    let period = 2 * (n - 1);
    let mut i = i.rem_euclid(period);
    if i >= n {
        i = period - i;
    }
    i as usize
}

fn binomial_kernel(size: usize) -> (&'static [u32], u32) {
    match size {
        0 | 1 => (&[1], 0),
        3 => (&[1, 2, 1], 2),
        _ => (&[1, 4, 6, 4, 1], 4),
    }
}

/// Separable Gaussian blur with a binomial kernel and mirrored borders.
///
/// `kernel` 3 and 5 are supported; 0 or 1 disables blurring and other sizes
/// fall back to 5.
pub fn gaussian_blur(src: &ColorImage, kernel: usize) -> ColorImage {
    let (weights, shift) = binomial_kernel(kernel);
    if weights.len() == 1 || src.is_empty() {
        return src.clone();
    }
    let (w, h) = (src.width, src.height);
    let r = (weights.len() / 2) as isize;

    let mut tmp = vec![0u32; w * h * 3];
    for y in 0..h {
        let row = &src.data[y * w * 3..(y + 1) * w * 3];
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0u32;
                for (k, &wk) in weights.iter().enumerate() {
                    let xx = reflect101(x as isize + k as isize - r, w);
                    acc += wk * row[xx * 3 + c] as u32;
                }
                tmp[(y * w + x) * 3 + c] = acc;
            }
        }
    }

    let total_shift = 2 * shift;
    let half = if total_shift == 0 { 0 } else { 1u32 << (total_shift - 1) };
    let mut out = ColorImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            for c in 0..3 {
                let mut acc = 0u32;
                for (k, &wk) in weights.iter().enumerate() {
                    let yy = reflect101(y as isize + k as isize - r, h);
                    acc += wk * tmp[(yy * w + x) * 3 + c];
                }
                out.data[(y * w + x) * 3 + c] = ((acc + half) >> total_shift).min(255) as u8;
            }
        }
    }
    out
}

/// Convert one RGB pixel to 8-bit HLS (H in `0..180`, L and S in `0..=255`).
pub fn rgb_to_hls_pixel(px: [u8; 3]) -> [u8; 3] {
    let r = px[0] as f32 / 255.0;
    let g = px[1] as f32 / 255.0;
    let b = px[2] as f32 / 255.0;
    let vmax = r.max(g).max(b);
    let vmin = r.min(g).min(b);
    let l = (vmax + vmin) * 0.5;
    let diff = vmax - vmin;

    let (mut h, s) = if diff > f32::EPSILON {
        let s = if l < 0.5 {
            diff / (vmax + vmin)
        } else {
            diff / (2.0 - vmax - vmin)
        };
        let h = if vmax == r {
            (g - b) * 60.0 / diff
        } else if vmax == g {
            (b - r) * 60.0 / diff + 120.0
        } else {
            (r - g) * 60.0 / diff + 240.0
        };
        (h, s)
    } else {
        (0.0, 0.0)
    };
    if h < 0.0 {
        h += 360.0;
    }

    [
        (h * 0.5).round().clamp(0.0, 179.0) as u8,
        (l * 255.0).round().clamp(0.0, 255.0) as u8,
        (s * 255.0).round().clamp(0.0, 255.0) as u8,
    ]
}

/// RGB -> HLS for a whole frame.
pub fn rgb_to_hls(src: &ColorImage) -> ColorImage {
    let mut out = src.clone();
    for px in out.data.chunks_exact_mut(3) {
        let hls = rgb_to_hls_pixel([px[0], px[1], px[2]]);
        px.copy_from_slice(&hls);
    }
    out
}

/// Full preprocessing chain for one frame; the input is left untouched.
///
/// Output channels are H, L, S after the gamma remap.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(width = frame.width, height = frame.height))
)]
pub fn preprocess(
    frame: &ColorImage,
    region: &RegionMask,
    params: &PreprocessParams,
    lut: &GammaLut,
) -> Result<ColorImage, LaneScanError> {
    if frame.is_empty() {
        return Err(LaneScanError::EmptyFrame);
    }
    let masked = region.apply(frame);
    let blurred = gaussian_blur(&masked, params.blur_kernel);
    let mut hls = rgb_to_hls(&blurred);
    lut.apply(&mut hls);
    Ok(hls)
}
