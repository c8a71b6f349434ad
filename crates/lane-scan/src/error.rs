/// Errors returned by the lane-scan pipeline.
///
/// Only `DeviceUnavailable` is fatal to a run; everything else is contained
/// within the tick that produced it.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum LaneScanError {
    #[error("capture device {device} unavailable: {reason}")]
    DeviceUnavailable { device: String, reason: String },
    #[error("failed to decode streamed frame: {0}")]
    FrameDecodeFailure(String),
    #[error("no frame available")]
    EmptyFrame,
    #[error("invalid frame geometry (width={width}, height={height})")]
    InvalidGeometry { width: usize, height: usize },
    #[error("camera model has non-positive or non-finite focal lengths")]
    InvalidCamera,
    #[error("ground homography is singular or not finite")]
    DegenerateHomography,
}

impl LaneScanError {
    /// Whether the owning process should stop feeding this detector.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LaneScanError::DeviceUnavailable { .. })
    }
}
