use lane_scan::{
    quantize, FrameSource, LaneDetector, LaneScanError, LaneScanParams, QuantizeParams,
    SkipReason, StaticDevice, StreamSlot, TickOutcome,
};
use lane_scan_core::{CameraModel, ColorImage, GrayImage};
use std::sync::Arc;
use std::thread;

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn camera() -> CameraModel {
    CameraModel::centered(600.0, 600.0, 640, 480)
}

/// Black 640x480 frame with a 20x200 white stripe at x = 100 in the lower half.
fn stripe_frame() -> ColorImage {
    let mut img = ColorImage::new(640, 480);
    for y in 260..460 {
        for x in 100..120 {
            img.put_pixel(x, y, [255, 255, 255]);
        }
    }
    img
}

fn device_detector(frames: impl IntoIterator<Item = ColorImage>) -> LaneDetector {
    LaneDetector::new(
        FrameSource::LocalDevice(Box::new(StaticDevice::new(frames))),
        camera(),
        LaneScanParams::default(),
    )
}

fn foreground_columns(mask: &GrayImage) -> Vec<usize> {
    let mut cols = Vec::new();
    for y in 0..mask.height {
        for x in 0..mask.width {
            if mask.data[y * mask.width + x] != 0 {
                cols.push(x);
            }
        }
    }
    cols
}

#[test]
fn stripe_lands_left_of_center_on_the_ground() {
    init_logging();
    let detector = device_detector([stripe_frame()]);
    let result = match detector.tick().expect("tick") {
        TickOutcome::Processed(result) => result,
        other => panic!("expected a processed frame, got {other:?}"),
    };

    assert_eq!(result.segmentation.iterations, 0);
    assert_eq!(result.contour_areas.len(), 1);
    assert!(result.contour_areas[0] >= 1500.0 && result.contour_areas[0] <= 100_000.0);
    assert_eq!((result.ground.width, result.ground.height), (640, 480));

    let cols = foreground_columns(&result.ground);
    assert!(cols.len() > 100, "ground mask too sparse: {}", cols.len());
    let mean = cols.iter().sum::<usize>() as f64 / cols.len() as f64;
    // Source column 100..120 maps to roughly 200..270 on the ground.
    assert!((190.0..290.0).contains(&mean), "mean column {mean}");
    assert!(cols.iter().all(|&x| x < 320));

    assert!(result.scan.hits() > 0);
    for (i, r) in result.scan.ranges.iter().enumerate() {
        if r.is_finite() {
            assert!(result.scan.angle(i) > 0.0, "hit on the right at bin {i}");
        }
    }
}

#[test]
fn full_overexposure_terminates_degraded() {
    init_logging();
    let params = LaneScanParams::default();
    let detector = device_detector([ColorImage::filled(640, 480, [255, 255, 255])]);
    let outcome = detector.tick().expect("tick");
    assert!(outcome.is_degraded());
    let result = outcome.result().expect("degraded result");
    assert!(result.segmentation.degraded);
    assert!(result.segmentation.iterations <= params.threshold.max_iterations);
    assert_eq!(result.segmentation.low_lightness, 255);
    assert!(result.segmentation.foreground > params.threshold.max_foreground);
}

#[test]
fn stalled_device_is_skipped_not_fatal() {
    init_logging();
    let detector = device_detector([]);
    for _ in 0..3 {
        let outcome = detector.tick().expect("tick");
        assert!(matches!(outcome, TickOutcome::Skipped(SkipReason::NoFrame)));
    }
    assert!(detector.homography().is_none());
}

#[test]
fn open_device_reports_unavailable() {
    let err = LaneDetector::open_device(
        Box::new(StaticDevice::new([])),
        camera(),
        LaneScanParams::default(),
    )
    .err()
    .expect("must fail");
    assert!(matches!(err, LaneScanError::DeviceUnavailable { .. }));
}

#[test]
fn stream_slot_feeds_ticks_from_another_thread() {
    init_logging();
    let slot = StreamSlot::new();
    let detector = Arc::new(LaneDetector::new(
        FrameSource::StreamSubscription(slot.clone()),
        camera(),
        LaneScanParams::default(),
    ));

    assert!(matches!(
        detector.tick().expect("tick"),
        TickOutcome::Skipped(SkipReason::NoFrame)
    ));

    let writer = slot.clone();
    thread::spawn(move || writer.deliver(stripe_frame(), camera().with_frame_id("front_cam")))
        .join()
        .expect("writer thread");

    let first = detector.tick().expect("tick");
    let first = first.result().expect("processed");
    assert_eq!(first.scan.frame_id, "front_cam");

    // A corrupt frame is rejected and the previous one stays current.
    let err = slot
        .deliver_encoded(640, 480, vec![0; 17], camera())
        .unwrap_err();
    assert!(matches!(err, LaneScanError::FrameDecodeFailure(_)));
    let second = detector.tick().expect("tick");
    let second = second.result().expect("processed");
    assert_eq!(second.tick, first.tick + 1);
    assert_eq!(second.ground, first.ground);
}

#[test]
fn concurrent_ticks_share_one_homography() {
    init_logging();
    let slot = StreamSlot::new();
    slot.deliver(stripe_frame(), camera());
    let detector = Arc::new(LaneDetector::new(
        FrameSource::StreamSubscription(slot),
        camera(),
        LaneScanParams::default(),
    ));

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let d = Arc::clone(&detector);
            thread::spawn(move || d.tick().map(|o| o.result().map(|r| r.tick)))
        })
        .collect();
    let mut ticks: Vec<u64> = handles
        .into_iter()
        .map(|h| h.join().expect("join").expect("tick").expect("processed"))
        .collect();
    ticks.sort_unstable();
    assert_eq!(ticks, vec![0, 1, 2, 3]);
    assert!(detector.homography().is_some());
}

#[test]
fn quantized_frame_still_yields_the_stripe() {
    init_logging();
    let params = QuantizeParams {
        num_colors: 2,
        ..QuantizeParams::default()
    };
    let quantized = quantize(&stripe_frame(), &params, None).expect("quantize");
    assert_eq!(quantized.image, stripe_frame());

    let detector = device_detector([quantized.image]);
    let outcome = detector.tick().expect("tick");
    let result = outcome.result().expect("processed");
    assert_eq!(result.contour_areas.len(), 1);
}
