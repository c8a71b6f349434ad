//! Per-frame lane-marking detection for a downward-tilted robot camera.
//!
//! A frame is masked, blurred, converted to HLS and gamma-remapped; bright
//! markings are segmented with a self-adjusting lightness bound; connected
//! regions of plausible size are re-rendered as outlines; the result is
//! projected onto the ground plane and turned into a range/bearing scan.
//!
//! [`LaneDetector`] runs the whole chain for one [`FrameSource`]. The stage
//! functions are public so they can be used and tested on their own.
//!
//! ```no_run
//! use lane_scan::{FrameSource, LaneDetector, LaneScanParams, StaticDevice};
//! use lane_scan_core::{CameraModel, ColorImage};
//!
//! let camera = CameraModel::centered(600.0, 600.0, 640, 480);
//! let device = StaticDevice::new([ColorImage::new(640, 480)]);
//! let detector = LaneDetector::new(
//!     FrameSource::LocalDevice(Box::new(device)),
//!     camera,
//!     LaneScanParams::default(),
//! );
//! if let Ok(outcome) = detector.tick() {
//!     if let Some(result) = outcome.result() {
//!         println!("{} scan hits", result.scan.hits());
//!     }
//! }
//! ```

mod binarize;
mod contours;
mod detector;
mod display;
mod error;
mod ground_homography;
mod io;
mod morphology;
mod params;
mod preprocess;
mod project;
mod quantize;
mod region_mask;
mod scan;
mod segment;
mod source;
mod throttle;

pub use binarize::{gray_histogram, otsu_threshold, rgb_to_gray, to_binary_otsu};
pub use contours::{
    draw_contours, extract_lane_contours, filter_lane_contours, find_external_contours,
    polygon_area, Contour, LaneContours,
};
pub use detector::{FrameResult, LaneDetector, ResultPublisher, SkipReason, TickOutcome};
pub use display::{resize_nearest, side_by_side, DisplaySink};
pub use error::LaneScanError;
pub use ground_homography::compute_ground_homography;
pub use io::{FrameReport, LaneScanConfig, LaneScanIoError, LaneScanReport};
pub use morphology::{close, dilate, erode, open, smooth_close_open, StructuringElement};
pub use params::{
    ContourParams, GroundGeometry, LaneScanParams, MaskRect, PreprocessParams, QuantizeParams,
    RegionMaskParams, ScanParams, ThresholdParams,
};
pub use preprocess::{gaussian_blur, preprocess, rgb_to_hls, rgb_to_hls_pixel, GammaLut};
pub use project::project;
pub use quantize::{quantize, ClusterState, Quantized};
pub use region_mask::RegionMask;
pub use scan::{GroundMaskScanConverter, LaserScan, ScanConverter};
pub use segment::{in_range, mean_lightness, segment, Segmentation, SegmentationStats};
pub use source::{CaptureDevice, FrameSource, StaticDevice, StreamSlot};
pub use throttle::Throttle;
