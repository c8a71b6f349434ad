//! Inverse perspective mapping of the cleaned mask onto the ground plane.

use lane_scan_core::{warp_perspective_gray, GrayImage, Homography, Interpolation};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Resample `mask` through `homography` into a ground-plane mask of the same size.
///
/// Each output pixel `p` takes the source value at `homography * p`; pixels
/// whose preimage falls outside the source stay at zero.
#[cfg_attr(feature = "tracing", instrument(level = "debug", skip_all))]
pub fn project(
    mask: &GrayImage,
    homography: &Homography,
    interpolation: Interpolation,
) -> GrayImage {
    warp_perspective_gray(
        &mask.view(),
        *homography,
        mask.width,
        mask.height,
        interpolation,
    )
}
