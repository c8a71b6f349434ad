//! Global Otsu binarization, an alternative to the adaptive HLS segmenter.

use lane_scan_core::{ColorImage, GrayImage};

/// 256-bin intensity histogram of a grayscale frame.
pub fn gray_histogram(img: &GrayImage) -> [u32; 256] {
    let mut hist = [0u32; 256];
    for &v in &img.data {
        hist[v as usize] += 1;
    }
    hist
}

/// Otsu's threshold: the level `t` maximizing the between-class variance of
/// `{v <= t}` and `{v > t}`. Ties keep the lowest level. Returns 0 when no
/// level splits the histogram into two non-empty classes.
pub fn otsu_threshold(hist: &[u32; 256]) -> u8 {
    let total: u64 = hist.iter().map(|&h| h as u64).sum();
    let weighted_total: u64 = hist
        .iter()
        .enumerate()
        .map(|(level, &h)| level as u64 * h as u64)
        .sum();

    // Integer accumulators keep empty bins from perturbing the variance.
    let mut below = 0u64;
    let mut weighted_below = 0u64;
    let mut best = (0u8, 0f64);
    for (level, &h) in hist.iter().enumerate() {
        below += h as u64;
        weighted_below += level as u64 * h as u64;
        let above = total - below;
        if below == 0 || above == 0 {
            continue;
        }
        let mean_below = weighted_below as f64 / below as f64;
        let mean_above = (weighted_total - weighted_below) as f64 / above as f64;
        let spread = mean_below - mean_above;
        let variance = (below as f64 / total as f64)
            * (above as f64 / total as f64)
            * spread
            * spread;
        if variance > best.1 {
            best = (level as u8, variance);
        }
    }
    best.0
}

/// Luma of an RGB frame (BT.601 weights).
pub fn rgb_to_gray(img: &ColorImage) -> GrayImage {
    let data = img
        .data
        .chunks_exact(3)
        .map(|px| {
            (0.299 * px[0] as f32 + 0.587 * px[1] as f32 + 0.114 * px[2] as f32)
                .round()
                .min(255.0) as u8
        })
        .collect();
    GrayImage {
        width: img.width,
        height: img.height,
        data,
    }
}

/// Gray conversion, Otsu threshold, then inversion: pixels at or below the
/// threshold become 255.
pub fn to_binary_otsu(img: &ColorImage) -> GrayImage {
    let mut gray = rgb_to_gray(img);
    let t = otsu_threshold(&gray_histogram(&gray));
    log::debug!("otsu threshold {t}");
    for v in gray.data.iter_mut() {
        *v = if *v > t { 0 } else { 255 };
    }
    gray
}
