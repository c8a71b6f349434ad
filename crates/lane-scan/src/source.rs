//! Where frames come from: a pollable capture device or a pushed stream.

use crate::LaneScanError;
use lane_scan_core::{CameraModel, ColorImage};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};

/// A device that can be polled for the next RGB frame.
///
/// `None` means no frame is available right now (a stalled device); the
/// caller retries on the next tick.
pub trait CaptureDevice {
    fn read(&mut self) -> Option<ColorImage>;

    /// Human-readable device identifier for log and error messages.
    fn name(&self) -> &str {
        "capture device"
    }
}

/// In-memory device replaying a fixed list of frames.
#[derive(Clone, Debug, Default)]
pub struct StaticDevice {
    frames: VecDeque<ColorImage>,
    repeat_last: bool,
}

impl StaticDevice {
    pub fn new(frames: impl IntoIterator<Item = ColorImage>) -> Self {
        Self {
            frames: frames.into_iter().collect(),
            repeat_last: false,
        }
    }

    /// Keep returning the last frame once the list is exhausted.
    pub fn repeating(mut self) -> Self {
        self.repeat_last = true;
        self
    }
}

impl CaptureDevice for StaticDevice {
    fn read(&mut self) -> Option<ColorImage> {
        if self.repeat_last && self.frames.len() == 1 {
            return self.frames.front().cloned();
        }
        self.frames.pop_front()
    }

    fn name(&self) -> &str {
        "static"
    }
}

#[derive(Debug, Default)]
struct StreamState {
    frame: Option<ColorImage>,
    camera: Option<CameraModel>,
    delivered: u64,
    decode_failures: u64,
}

/// Shared handle a stream subscriber writes `(frame, camera)` pairs into.
///
/// Clones refer to the same slot; the detector always sees the most recent
/// successfully decoded pair.
#[derive(Clone, Debug, Default)]
pub struct StreamSlot {
    inner: Arc<Mutex<StreamState>>,
}

impl StreamSlot {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, StreamState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Replace the current pair.
    pub fn deliver(&self, frame: ColorImage, camera: CameraModel) {
        let mut state = self.state();
        state.frame = Some(frame);
        state.camera = Some(camera);
        state.delivered += 1;
    }

    /// Decode a packed RGB buffer and deliver it.
    ///
    /// On failure the previous pair stays in place.
    pub fn deliver_encoded(
        &self,
        width: usize,
        height: usize,
        data: Vec<u8>,
        camera: CameraModel,
    ) -> Result<(), LaneScanError> {
        match ColorImage::from_raw(width, height, data) {
            Ok(frame) => {
                self.deliver(frame, camera);
                Ok(())
            }
            Err(err) => {
                self.state().decode_failures += 1;
                log::warn!("dropping streamed frame: {err}");
                Err(LaneScanError::FrameDecodeFailure(err.to_string()))
            }
        }
    }

    /// Most recent pair, if any has arrived.
    pub fn latest(&self) -> Option<(ColorImage, CameraModel)> {
        let state = self.state();
        match (&state.frame, &state.camera) {
            (Some(f), Some(c)) => Some((f.clone(), c.clone())),
            _ => None,
        }
    }

    pub fn delivered(&self) -> u64 {
        self.state().delivered
    }

    pub fn decode_failures(&self) -> u64 {
        self.state().decode_failures
    }
}

/// Active frame source of a detector instance.
pub enum FrameSource {
    /// Polled on every tick; the camera model is fixed at construction.
    LocalDevice(Box<dyn CaptureDevice + Send>),
    /// Pushed by a subscriber; every frame carries its own camera model.
    StreamSubscription(StreamSlot),
}

impl FrameSource {
    pub fn label(&self) -> &str {
        match self {
            FrameSource::LocalDevice(dev) => dev.name(),
            FrameSource::StreamSubscription(_) => "stream",
        }
    }
}

impl std::fmt::Debug for FrameSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FrameSource::LocalDevice(dev) => {
                f.debug_tuple("LocalDevice").field(&dev.name()).finish()
            }
            FrameSource::StreamSubscription(slot) => {
                f.debug_tuple("StreamSubscription").field(slot).finish()
            }
        }
    }
}
