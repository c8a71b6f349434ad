//! Debug composite for an optional preview window.

use lane_scan_core::ColorImage;

/// Receives side-by-side debug composites. Errors are logged by the caller and
/// never stop the pipeline.
pub trait DisplaySink {
    fn show(&mut self, composite: &ColorImage) -> Result<(), String>;
}

/// Nearest-neighbour resize.
pub fn resize_nearest(src: &ColorImage, width: usize, height: usize) -> ColorImage {
    let mut out = ColorImage::new(width, height);
    if src.is_empty() {
        return out;
    }
    for y in 0..height {
        let sy = y * src.height / height;
        for x in 0..width {
            let sx = x * src.width / width;
            out.put_pixel(x, y, src.pixel(sx, sy));
        }
    }
    out
}

/// `src` on the left, `processed` resized to the same size on the right.
pub fn side_by_side(src: &ColorImage, processed: &ColorImage) -> ColorImage {
    let (w, h) = (src.width, src.height);
    let right = if (processed.width, processed.height) == (w, h) {
        processed.clone()
    } else {
        resize_nearest(processed, w, h)
    };

    let mut out = ColorImage::new(2 * w, h);
    for y in 0..h {
        let dst = &mut out.data[y * 2 * w * 3..(y + 1) * 2 * w * 3];
        dst[..w * 3].copy_from_slice(&src.data[y * w * 3..(y + 1) * w * 3]);
        dst[w * 3..].copy_from_slice(&right.data[y * w * 3..(y + 1) * w * 3]);
    }
    out
}
