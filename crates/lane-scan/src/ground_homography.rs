//! Ground-plane homography derived from camera intrinsics and a fixed mount.
//!
//! The image plane is lifted into 3D centered on the frame, rotated by the
//! mount angles, pushed out along the optical axis by the standoff distance,
//! and re-projected through the intrinsics:
//!
//! `H = K * (T * (R * A))`, `R = Rx * Ry * Rz`.
//!
//! The result maps ground-view pixel coordinates to camera-image coordinates,
//! which is the direction the inverse-mapped warp in [`crate::project`] needs.

use crate::{GroundGeometry, LaneScanError};
use lane_scan_core::{CameraModel, Homography};
use nalgebra::{Matrix3x4, Matrix4, Matrix4x3};

#[cfg(feature = "tracing")]
use tracing::instrument;

fn rotation_x(a: f64) -> Matrix4<f64> {
    let (s, c) = a.sin_cos();
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, c, -s, 0.0, //
        0.0, s, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

fn rotation_y(b: f64) -> Matrix4<f64> {
    let (s, c) = b.sin_cos();
    Matrix4::new(
        c, 0.0, s, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        -s, 0.0, c, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

fn rotation_z(g: f64) -> Matrix4<f64> {
    let (s, c) = g.sin_cos();
    Matrix4::new(
        c, -s, 0.0, 0.0, //
        s, c, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Derive the ground-plane homography for a frame of `width x height` pixels.
///
/// Pure: identical inputs give bit-identical output.
#[cfg_attr(
    feature = "tracing",
    instrument(level = "debug", skip(camera, geometry), fields(width, height))
)]
pub fn compute_ground_homography(
    camera: &CameraModel,
    width: usize,
    height: usize,
    geometry: &GroundGeometry,
) -> Result<Homography, LaneScanError> {
    if width == 0 || height == 0 {
        return Err(LaneScanError::InvalidGeometry { width, height });
    }
    if !camera.is_valid() {
        return Err(LaneScanError::InvalidCamera);
    }

    let w = width as f64;
    let h = height as f64;

    // 2D -> 3D lift centered on the frame; the plane sits at z = 0.
    let lift = Matrix4x3::new(
        1.0, 0.0, -w / 2.0, //
        0.0, 1.0, -h / 2.0, //
        0.0, 0.0, 0.0, //
        0.0, 0.0, 1.0,
    );

    let pitch = (geometry.tilt_deg - 90.0).to_radians();
    let rotation = rotation_x(pitch)
        * rotation_y(geometry.yaw_deg.to_radians())
        * rotation_z(geometry.roll_deg.to_radians());

    let translation = Matrix4::new(
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, geometry.standoff * camera.fx, //
        0.0, 0.0, 0.0, 1.0,
    );

    let mut k = Matrix3x4::<f64>::zeros();
    k.fixed_view_mut::<3, 3>(0, 0).copy_from(&camera.k_for(width, height));

    let hom = Homography::new(k * (translation * (rotation * lift)));
    let scale = hom.h.norm();
    if !hom.is_finite() || hom.determinant().abs() <= 1e-12 * scale * scale * scale {
        return Err(LaneScanError::DegenerateHomography);
    }
    log::debug!(
        "ground homography for {width}x{height} (tilt {:.1} deg): {:?}",
        geometry.tilt_deg,
        hom.to_array()
    );
    Ok(hom)
}
