//! JSON configuration and report helpers for batch lane scans.

use crate::{FrameResult, LaneScanError, LaneScanParams, TickOutcome};
use lane_scan_core::CameraModel;
use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
};

#[derive(thiserror::Error, Debug)]
pub enum LaneScanIoError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// Configuration for scanning a sequence of image files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneScanConfig {
    /// Frames, processed in order.
    pub images: Vec<String>,
    pub camera: CameraModel,
    #[serde(default)]
    pub params: Option<LaneScanParams>,
    /// Directory for per-frame ground-plane masks; none are written when unset.
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub report_path: Option<String>,
}

impl LaneScanConfig {
    /// Load a JSON config from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LaneScanIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this config to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LaneScanIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn params(&self) -> LaneScanParams {
        self.params.clone().unwrap_or_default()
    }

    /// Resolve the report path.
    pub fn report_path(&self) -> PathBuf {
        self.report_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("lane_scan_report.json"))
    }
}

/// Per-frame entry of a [`LaneScanReport`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FrameReport {
    pub image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<usize>,
    /// Lower lightness bound the segmenter settled on.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub low_lightness: Option<u8>,
    pub iterations: usize,
    pub degraded: bool,
    pub foreground: usize,
    pub contour_areas: Vec<f64>,
    pub rejected_contours: usize,
    pub ground_foreground: usize,
    /// Range per bin, `None` where nothing was hit.
    pub ranges: Vec<Option<f32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ground_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FrameReport {
    pub fn from_outcome(image: impl Into<String>, outcome: &TickOutcome) -> Self {
        match outcome {
            TickOutcome::Processed(r) | TickOutcome::Degraded(r) => Self::from_result(image, r),
            TickOutcome::Skipped(reason) => Self {
                image: image.into(),
                skipped: Some(format!("{reason:?}")),
                ..Self::default()
            },
        }
    }

    pub fn from_result(image: impl Into<String>, r: &FrameResult) -> Self {
        Self {
            image: image.into(),
            width: Some(r.width),
            height: Some(r.height),
            low_lightness: Some(r.segmentation.low_lightness),
            iterations: r.segmentation.iterations,
            degraded: r.segmentation.degraded,
            foreground: r.segmentation.foreground,
            contour_areas: r.contour_areas.clone(),
            rejected_contours: r.rejected_contours,
            ground_foreground: r.ground.count_nonzero(),
            ranges: r.scan.finite_ranges(),
            ..Self::default()
        }
    }

    pub fn from_error(image: impl Into<String>, err: &dyn std::fmt::Display) -> Self {
        Self {
            image: image.into(),
            error: Some(err.to_string()),
            ..Self::default()
        }
    }
}

/// Report for one batch run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LaneScanReport {
    pub camera: CameraModel,
    pub params: LaneScanParams,
    /// Row-major ground homography, once one could be derived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub homography: Option<[[f64; 3]; 3]>,
    pub frames: Vec<FrameReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl LaneScanReport {
    pub fn new(camera: CameraModel, params: LaneScanParams) -> Self {
        Self {
            camera,
            params,
            homography: None,
            frames: Vec::new(),
            error: None,
        }
    }

    /// Record a fatal error that ended the run.
    pub fn fail(&mut self, err: &LaneScanError) {
        self.error = Some(err.to_string());
    }

    /// Load a JSON report from disk.
    pub fn load_json(path: impl AsRef<Path>) -> Result<Self, LaneScanIoError> {
        let raw = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&raw)?)
    }

    /// Write this report to disk as pretty JSON.
    pub fn write_json(&self, path: impl AsRef<Path>) -> Result<(), LaneScanIoError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults_fill_in() {
        let cfg: LaneScanConfig = serde_json::from_str(
            r#"{
                "images": ["a.png"],
                "camera": {"fx": 600, "fy": 600, "cx": 320, "cy": 240, "width": 640, "height": 480}
            }"#,
        )
        .expect("config");
        assert_eq!(cfg.camera.frame_id, "camera_sensor");
        assert_eq!(cfg.params(), LaneScanParams::default());
        assert_eq!(cfg.report_path(), PathBuf::from("lane_scan_report.json"));
        assert!(cfg.output_dir.is_none());
    }

    #[test]
    fn report_round_trips_through_disk() {
        let dir = tempfile::tempdir().expect("tmp dir");
        let path = dir.path().join("report.json");

        let mut report = LaneScanReport::new(
            CameraModel::centered(600.0, 600.0, 640, 480),
            LaneScanParams::default(),
        );
        report.frames.push(FrameReport {
            image: "f.png".into(),
            ranges: vec![Some(1.5), None],
            ..FrameReport::default()
        });
        report.fail(&LaneScanError::DeviceUnavailable {
            device: "cam0".into(),
            reason: "gone".into(),
        });
        report.write_json(&path).expect("write");

        let back = LaneScanReport::load_json(&path).expect("load");
        assert_eq!(back.frames.len(), 1);
        assert_eq!(back.frames[0].ranges, vec![Some(1.5), None]);
        assert!(back.error.as_deref().is_some_and(|e| e.contains("cam0")));
    }
}
