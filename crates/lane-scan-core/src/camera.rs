//! Pinhole camera model supplied by the frame producer.

use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

fn default_frame_id() -> String {
    "camera_sensor".to_string()
}

/// Camera intrinsics plus the metadata that travels with a camera stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraModel {
    /// Focal length in x (pixels).
    pub fx: f64,
    /// Focal length in y (pixels).
    pub fy: f64,
    /// Principal point x (pixels).
    pub cx: f64,
    /// Principal point y (pixels).
    pub cy: f64,
    /// Calibrated image size.
    pub width: u32,
    pub height: u32,
    /// Coordinate frame the camera reports in.
    #[serde(default = "default_frame_id")]
    pub frame_id: String,
    /// Distortion coefficients as published by the calibration. Frames are
    /// assumed rectified; these are kept only so camera messages round-trip.
    #[serde(default)]
    pub distortion: Vec<f64>,
}

impl CameraModel {
    /// Camera with the principal point at the image center.
    pub fn centered(fx: f64, fy: f64, width: u32, height: u32) -> Self {
        Self {
            fx,
            fy,
            cx: width as f64 / 2.0,
            cy: height as f64 / 2.0,
            width,
            height,
            frame_id: default_frame_id(),
            distortion: Vec::new(),
        }
    }

    pub fn with_frame_id(mut self, frame_id: impl Into<String>) -> Self {
        self.frame_id = frame_id.into();
        self
    }

    /// Returns `true` when focal lengths are finite and strictly positive.
    pub fn is_valid(&self) -> bool {
        self.fx.is_finite()
            && self.fy.is_finite()
            && self.cx.is_finite()
            && self.cy.is_finite()
            && self.fx > 1e-12
            && self.fy > 1e-12
    }

    /// Principal point in the pixels of a `width x height` frame.
    ///
    /// The calibration may be at a different resolution than the delivered
    /// frame; the point is rescaled in that case. Without a calibrated size
    /// the frame center is used.
    pub fn principal_point_for(&self, width: usize, height: usize) -> (f64, f64) {
        if self.width == 0 || self.height == 0 {
            return (width as f64 / 2.0, height as f64 / 2.0);
        }
        (
            self.cx * width as f64 / self.width as f64,
            self.cy * height as f64 / self.height as f64,
        )
    }

    /// 3x3 intrinsic matrix for a `width x height` frame.
    pub fn k_for(&self, width: usize, height: usize) -> Matrix3<f64> {
        let (cx, cy) = self.principal_point_for(width, height);
        Matrix3::new(
            self.fx, 0.0, cx, //
            0.0, self.fy, cy, //
            0.0, 0.0, 1.0,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn centered_camera_is_valid() {
        let cam = CameraModel::centered(600.0, 600.0, 640, 480);
        assert!(cam.is_valid());
        assert_eq!(cam.cx, 320.0);
        assert_eq!(cam.k_for(640, 480)[(1, 2)], 240.0);
        assert_eq!(cam.frame_id, "camera_sensor");
    }

    #[test]
    fn zero_focal_length_is_invalid() {
        let cam = CameraModel::centered(0.0, 600.0, 640, 480);
        assert!(!cam.is_valid());
    }

    #[test]
    fn deserializes_with_defaults() {
        let cam: CameraModel = serde_json::from_str(
            r#"{"fx": 500.0, "fy": 510.0, "cx": 320.0, "cy": 240.0, "width": 640, "height": 480}"#,
        )
        .expect("camera json");
        assert_eq!(cam.frame_id, "camera_sensor");
        assert!(cam.distortion.is_empty());
    }

    #[test]
    fn principal_point_follows_the_frame_size() {
        let mut cam = CameraModel::centered(600.0, 600.0, 640, 480);
        cam.cx = 300.0;
        assert_eq!(cam.principal_point_for(320, 240), (150.0, 120.0));
        let k = cam.k_for(1280, 960);
        assert_eq!((k[(0, 2)], k[(1, 2)]), (600.0, 480.0));
        assert_eq!(k[(0, 0)], 600.0);

        cam.width = 0;
        assert_eq!(cam.principal_point_for(100, 50), (50.0, 25.0));
    }
}
