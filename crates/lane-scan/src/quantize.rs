//! Palette reduction by k-means clustering over pixel colors.
//!
//! Clustering state is explicit: pass the previous call's [`ClusterState`] to
//! warm-start the next one and get the updated state back.

use crate::{LaneScanError, QuantizeParams};
use lane_scan_core::ColorImage;
use rand::prelude::*;

#[cfg(feature = "tracing")]
use tracing::instrument;

type Sample = [f32; 3];

/// Palette centers plus the per-pixel assignment that produced them.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClusterState {
    pub centers: Vec<Sample>,
    /// One label per pixel, row-major, indexing into `centers`.
    pub labels: Vec<u32>,
}

impl ClusterState {
    /// Whether this state can seed a clustering of `samples` pixels into `k` colors.
    pub fn fits(&self, k: usize, samples: usize) -> bool {
        self.centers.len() == k && self.labels.len() == samples
    }
}

#[derive(Clone, Debug)]
pub struct Quantized {
    pub image: ColorImage,
    pub state: ClusterState,
    /// Sum of squared distances from every pixel to its center.
    pub compactness: f64,
    /// Refinement iterations of the winning attempt.
    pub iterations: usize,
}

#[inline]
fn dist2(a: &Sample, b: &Sample) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

fn nearest(p: &Sample, centers: &[Sample]) -> (u32, f32) {
    let mut best = (0u32, f32::MAX);
    for (i, c) in centers.iter().enumerate() {
        let d = dist2(p, c);
        if d < best.1 {
            best = (i as u32, d);
        }
    }
    best
}

fn seed_plus_plus(samples: &[Sample], k: usize, rng: &mut StdRng) -> Vec<Sample> {
    let mut centers = Vec::with_capacity(k);
    centers.push(samples[rng.gen_range(0..samples.len())]);
    let mut d2: Vec<f32> = samples.iter().map(|p| dist2(p, &centers[0])).collect();

    while centers.len() < k {
        let total: f64 = d2.iter().map(|&d| d as f64).sum();
        let pick = if total <= 0.0 {
            rng.gen_range(0..samples.len())
        } else {
            let mut target = rng.gen::<f64>() * total;
            let mut idx = samples.len() - 1;
            for (i, &d) in d2.iter().enumerate() {
                target -= d as f64;
                if target <= 0.0 && d > 0.0 {
                    idx = i;
                    break;
                }
            }
            idx
        };
        let c = samples[pick];
        for (d, p) in d2.iter_mut().zip(samples) {
            *d = d.min(dist2(p, &c));
        }
        centers.push(c);
    }
    centers
}

/// Per-cluster means; empty clusters keep their `fallback` center.
fn centers_from_labels(samples: &[Sample], labels: &[u32], fallback: &[Sample]) -> Vec<Sample> {
    let k = fallback.len();
    let mut sums = vec![[0f64; 3]; k];
    let mut counts = vec![0usize; k];
    for (p, &l) in samples.iter().zip(labels) {
        let l = l as usize;
        if l >= k {
            continue;
        }
        for c in 0..3 {
            sums[l][c] += p[c] as f64;
        }
        counts[l] += 1;
    }
    (0..k)
        .map(|i| {
            if counts[i] == 0 {
                fallback[i]
            } else {
                let n = counts[i] as f64;
                [
                    (sums[i][0] / n) as f32,
                    (sums[i][1] / n) as f32,
                    (sums[i][2] / n) as f32,
                ]
            }
        })
        .collect()
}

struct Attempt {
    centers: Vec<Sample>,
    labels: Vec<u32>,
    compactness: f64,
    iterations: usize,
}

fn refine(samples: &[Sample], mut centers: Vec<Sample>, params: &QuantizeParams) -> Attempt {
    let mut labels = vec![0u32; samples.len()];
    let mut iterations = 0usize;
    let eps2 = params.epsilon * params.epsilon;

    while iterations < params.max_iters.max(1) {
        for (l, p) in labels.iter_mut().zip(samples) {
            *l = nearest(p, &centers).0;
        }
        let updated = centers_from_labels(samples, &labels, &centers);
        let shift = updated
            .iter()
            .zip(&centers)
            .map(|(a, b)| dist2(a, b))
            .fold(0f32, f32::max);
        centers = updated;
        iterations += 1;
        if shift <= eps2 {
            break;
        }
    }

    let mut compactness = 0f64;
    for (l, p) in labels.iter_mut().zip(samples) {
        let (idx, d) = nearest(p, &centers);
        *l = idx;
        compactness += d as f64;
    }
    Attempt {
        centers,
        labels,
        compactness,
        iterations,
    }
}

/// Replace every pixel by the nearest of `params.num_colors` palette colors.
///
/// With a compatible `prior` the first labeling comes from it and a single
/// attempt runs; otherwise `params.attempts` k-means++ seeded attempts run and
/// the most compact one wins. The palette size is clamped to `1..=pixels`.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip_all, fields(k = params.num_colors, warm = prior.is_some()))
)]
pub fn quantize(
    frame: &ColorImage,
    params: &QuantizeParams,
    prior: Option<&ClusterState>,
) -> Result<Quantized, LaneScanError> {
    if frame.is_empty() {
        return Err(LaneScanError::EmptyFrame);
    }
    let samples: Vec<Sample> = frame
        .pixels()
        .map(|px| [px[0] as f32, px[1] as f32, px[2] as f32])
        .collect();
    let k = params.num_colors.clamp(1, samples.len());

    let warm = prior.filter(|s| s.fits(k, samples.len()));
    if prior.is_some() && warm.is_none() {
        log::debug!("cluster state does not match {k} colors / {} px, cold start", samples.len());
    }

    let best = match warm {
        Some(state) => {
            let init = centers_from_labels(&samples, &state.labels, &state.centers);
            refine(&samples, init, params)
        }
        None => {
            let mut rng = StdRng::seed_from_u64(params.seed);
            let mut best = refine(&samples, seed_plus_plus(&samples, k, &mut rng), params);
            for _ in 1..params.attempts.max(1) {
                let attempt = refine(&samples, seed_plus_plus(&samples, k, &mut rng), params);
                if attempt.compactness < best.compactness {
                    best = attempt;
                }
            }
            best
        }
    };

    let palette: Vec<[u8; 3]> = best
        .centers
        .iter()
        .map(|c| c.map(|v| v.round().clamp(0.0, 255.0) as u8))
        .collect();
    let mut image = ColorImage::new(frame.width, frame.height);
    for (dst, &l) in image.data.chunks_exact_mut(3).zip(&best.labels) {
        dst.copy_from_slice(&palette[l as usize]);
    }
    log::debug!(
        "quantized to {k} colors in {} iterations (compactness {:.1})",
        best.iterations,
        best.compactness
    );

    Ok(Quantized {
        image,
        compactness: best.compactness,
        iterations: best.iterations,
        state: ClusterState {
            centers: best.centers,
            labels: best.labels,
        },
    })
}
