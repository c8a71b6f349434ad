//! Static stencil that hides the robot's own chassis.

use crate::RegionMaskParams;
use lane_scan_core::{ColorImage, GrayImage};

/// Binary stencil at frame resolution: 255 = keep, 0 = discard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegionMask {
    pub mask: GrayImage,
}

impl RegionMask {
    /// Rasterize the retained rectangles for a `width x height` frame.
    pub fn build(params: &RegionMaskParams, width: usize, height: usize) -> Self {
        let mut mask = GrayImage::new(width, height);
        for rect in &params.retain {
            let (x0, y0, x1, y1) = rect.to_pixels(width, height);
            if x1 <= x0 {
                continue;
            }
            for y in y0..y1 {
                mask.data[y * width + x0..y * width + x1].fill(255);
            }
        }
        Self { mask }
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.mask.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.mask.height
    }

    #[inline]
    pub fn keeps(&self, x: usize, y: usize) -> bool {
        self.mask.get(x, y).is_some_and(|v| v != 0)
    }

    /// Copy of `frame` with discarded pixels set to black.
    ///
    /// A frame whose size differs from the stencil is returned unchanged.
    pub fn apply(&self, frame: &ColorImage) -> ColorImage {
        let mut out = frame.clone();
        if frame.width != self.width() || frame.height != self.height() {
            log::warn!(
                "region mask {}x{} does not match frame {}x{}; skipping",
                self.width(),
                self.height(),
                frame.width,
                frame.height
            );
            return out;
        }
        for (px, &keep) in out.data.chunks_exact_mut(3).zip(&self.mask.data) {
            if keep == 0 {
                px.fill(0);
            }
        }
        out
    }
}
