//! Per-frame lane detection: read, preprocess, segment, clean up, project,
//! convert and publish.

use crate::contours::filter_lane_contours;
use crate::display::{side_by_side, DisplaySink};
use crate::ground_homography::compute_ground_homography;
use crate::preprocess::{preprocess, GammaLut};
use crate::project::project;
use crate::region_mask::RegionMask;
use crate::scan::{GroundMaskScanConverter, LaserScan, ScanConverter};
use crate::segment::{segment, SegmentationStats};
use crate::source::{CaptureDevice, FrameSource};
use crate::throttle::Throttle;
use crate::{LaneScanError, LaneScanParams};
use lane_scan_core::{CameraModel, ColorImage, GrayImage, Homography};
use std::sync::{Mutex, MutexGuard, OnceLock};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Receives every processed ground mask together with its scan.
pub trait ResultPublisher {
    fn publish(&mut self, frame: &GrayImage, scan: &LaserScan);
}

/// Everything one successful tick produced.
#[derive(Clone, Debug)]
pub struct FrameResult {
    /// Sequence number of the tick, starting at 0.
    pub tick: u64,
    pub width: usize,
    pub height: usize,
    pub segmentation: SegmentationStats,
    /// Enclosed areas of the contours kept by the area filter.
    pub contour_areas: Vec<f64>,
    pub rejected_contours: usize,
    /// Cleaned image-space mask.
    pub lane_mask: GrayImage,
    /// Bird's-eye mask.
    pub ground: GrayImage,
    pub scan: LaserScan,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    /// The source had nothing to offer this tick.
    NoFrame,
    /// The source produced a zero-sized frame.
    EmptyFrame,
}

#[derive(Clone, Debug)]
pub enum TickOutcome {
    Processed(FrameResult),
    /// Overexposure could not be brought under the foreground ceiling; the
    /// result carries the best mask reached.
    Degraded(FrameResult),
    Skipped(SkipReason),
}

impl TickOutcome {
    pub fn result(&self) -> Option<&FrameResult> {
        match self {
            TickOutcome::Processed(r) | TickOutcome::Degraded(r) => Some(r),
            TickOutcome::Skipped(_) => None,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, TickOutcome::Degraded(_))
    }
}

struct TickState {
    source: FrameSource,
    /// Frame read ahead of the first tick (device probing).
    pending: Option<ColorImage>,
    camera: CameraModel,
    ticks: u64,
}

/// Lane detector bound to one frame source.
///
/// Ticks are serialized internally, so `tick` may be driven from whichever
/// thread delivers frames. The ground homography and region mask are computed
/// from the first valid frame and kept for the detector's lifetime.
pub struct LaneDetector {
    params: LaneScanParams,
    lut: GammaLut,
    converter: Box<dyn ScanConverter + Send + Sync>,
    homography: OnceLock<Homography>,
    region: OnceLock<RegionMask>,
    state: Mutex<TickState>,
    display: Mutex<Option<Box<dyn DisplaySink + Send>>>,
    publisher: Mutex<Option<Box<dyn ResultPublisher + Send>>>,
    empty_notice: Throttle,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl LaneDetector {
    /// Create a detector. For stream sources `camera` is only used until the
    /// first frame arrives with its own model.
    pub fn new(source: FrameSource, camera: CameraModel, params: LaneScanParams) -> Self {
        let lut = GammaLut::new(params.preprocess.gamma);
        let converter = Box::new(GroundMaskScanConverter::new(params.scan.clone()));
        let empty_notice = Throttle::from_secs_f64(params.empty_notice_period_s);
        Self {
            lut,
            converter,
            homography: OnceLock::new(),
            region: OnceLock::new(),
            state: Mutex::new(TickState {
                source,
                pending: None,
                camera,
                ticks: 0,
            }),
            display: Mutex::new(None),
            publisher: Mutex::new(None),
            empty_notice,
            params,
        }
    }

    /// Open a local capture device, failing if it cannot produce a first frame.
    pub fn open_device(
        mut device: Box<dyn CaptureDevice + Send>,
        camera: CameraModel,
        params: LaneScanParams,
    ) -> Result<Self, LaneScanError> {
        let name = device.name().to_string();
        let first = device
            .read()
            .filter(|f| !f.is_empty())
            .ok_or_else(|| LaneScanError::DeviceUnavailable {
                device: name.clone(),
                reason: "no frame on open".to_string(),
            })?;
        log::info!("opened {name}: {}x{}", first.width, first.height);
        let detector = Self::new(FrameSource::LocalDevice(device), camera, params);
        lock(&detector.state).pending = Some(first);
        Ok(detector)
    }

    pub fn with_display(self, sink: Box<dyn DisplaySink + Send>) -> Self {
        *lock(&self.display) = Some(sink);
        self
    }

    pub fn with_publisher(self, publisher: Box<dyn ResultPublisher + Send>) -> Self {
        *lock(&self.publisher) = Some(publisher);
        self
    }

    /// Replace the default ground-mask scan converter.
    pub fn with_converter(mut self, converter: Box<dyn ScanConverter + Send + Sync>) -> Self {
        self.converter = converter;
        self
    }

    #[inline]
    pub fn params(&self) -> &LaneScanParams {
        &self.params
    }

    /// Ground homography, once the first valid frame has been seen.
    pub fn homography(&self) -> Option<&Homography> {
        self.homography.get()
    }

    pub fn region_mask(&self) -> Option<&RegionMask> {
        self.region.get()
    }

    fn ensure_homography(
        &self,
        camera: &CameraModel,
        width: usize,
        height: usize,
    ) -> Result<&Homography, LaneScanError> {
        if let Some(h) = self.homography.get() {
            return Ok(h);
        }
        let h = compute_ground_homography(camera, width, height, &self.params.geometry)?;
        log::info!("ground homography ready for {width}x{height}");
        Ok(self.homography.get_or_init(|| h))
    }

    fn next_frame(state: &mut TickState) -> Option<ColorImage> {
        if let Some(frame) = state.pending.take() {
            return Some(frame);
        }
        match &mut state.source {
            FrameSource::LocalDevice(dev) => dev.read(),
            FrameSource::StreamSubscription(slot) => slot.latest().map(|(frame, camera)| {
                state.camera = camera;
                frame
            }),
        }
    }

    fn skip(&self, reason: SkipReason, source: &str) -> TickOutcome {
        if self.empty_notice.ready() {
            log::info!("waiting for frames from {source} ({reason:?})");
        }
        TickOutcome::Skipped(reason)
    }

    /// Run one full pipeline pass on the next available frame.
    ///
    /// Missing or empty frames are reported as [`TickOutcome::Skipped`]; the
    /// errors returned here are all local to this tick.
    #[cfg_attr(feature = "tracing", instrument(level = "info", skip_all))]
    pub fn tick(&self) -> Result<TickOutcome, LaneScanError> {
        let mut state = lock(&self.state);
        let Some(frame) = Self::next_frame(&mut state) else {
            return Ok(self.skip(SkipReason::NoFrame, state.source.label()));
        };
        if frame.is_empty() {
            return Ok(self.skip(SkipReason::EmptyFrame, state.source.label()));
        }
        let (width, height) = (frame.width, frame.height);

        let homography = *self.ensure_homography(&state.camera, width, height)?;
        let region = self
            .region
            .get_or_init(|| RegionMask::build(&self.params.region, width, height));

        let hls = preprocess(&frame, region, &self.params.preprocess, &self.lut)?;
        let seg = segment(&hls, &self.params.threshold);
        let lanes = filter_lane_contours(&seg.mask, &self.params.contours);
        let ground = project(&lanes.mask, &homography, self.params.interpolation);
        let scan = self.converter.convert(&ground.view(), &state.camera);

        let tick = state.ticks;
        state.ticks += 1;
        drop(state);

        if let Some(sink) = lock(&self.display).as_mut() {
            let composite = side_by_side(&frame, &ColorImage::from_gray(&ground.view()));
            if let Err(err) = sink.show(&composite) {
                log::warn!("display failed: {err}");
            }
        }
        if let Some(publisher) = lock(&self.publisher).as_mut() {
            publisher.publish(&ground, &scan);
        }

        log::debug!(
            "tick {tick}: {} contours kept, {} scan hits",
            lanes.contours.len(),
            scan.hits()
        );

        let result = FrameResult {
            tick,
            width,
            height,
            segmentation: seg.stats,
            contour_areas: lanes.contours.iter().map(|c| c.area).collect(),
            rejected_contours: lanes.rejected,
            lane_mask: lanes.mask,
            ground,
            scan,
        };
        Ok(if seg.stats.degraded {
            TickOutcome::Degraded(result)
        } else {
            TickOutcome::Processed(result)
        })
    }
}
