//! lane-scan CLI: run the lane-marking pipeline over image files.

mod device;
mod error;

use clap::{Args, Parser, Subcommand};
use device::{load_rgb, save_gray, ImageSequenceDevice};
use error::{CliError, CliResult};
use lane_scan::{
    compute_ground_homography, quantize, ClusterState, FrameReport, FrameSource, LaneDetector,
    LaneScanConfig, LaneScanParams, LaneScanReport, QuantizeParams, SkipReason, StreamSlot,
    TickOutcome,
};
use lane_scan_core::{parse_level, CameraModel};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "lane-scan")]
#[command(about = "Detect lane markings and project them onto the ground plane")]
#[command(version)]
struct Cli {
    /// Log level: off, error, warn, info, debug or trace.
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit JSON log lines (only with the `tracing` feature).
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Process a list of images and write a JSON report.
    Detect(DetectArgs),

    /// Poll a directory of images like a capture device.
    Replay(ReplayArgs),

    /// Print the ground homography for a camera and frame size.
    Homography(HomographyArgs),

    /// Print the default pipeline parameters as JSON.
    Params,
}

#[derive(Debug, Clone, Args)]
struct CameraArgs {
    /// Focal length in x (pixels).
    #[arg(long, default_value_t = 600.0)]
    fx: f64,
    /// Focal length in y (pixels).
    #[arg(long, default_value_t = 600.0)]
    fy: f64,
    /// Principal point x; defaults to the image center.
    #[arg(long)]
    cx: Option<f64>,
    /// Principal point y; defaults to the image center.
    #[arg(long)]
    cy: Option<f64>,
    /// Calibrated image width.
    #[arg(long, default_value_t = 640)]
    width: u32,
    /// Calibrated image height.
    #[arg(long, default_value_t = 480)]
    height: u32,
    /// Frame id stamped on the produced scans.
    #[arg(long, default_value = "camera_sensor")]
    frame_id: String,
}

impl CameraArgs {
    fn model(&self) -> CameraModel {
        let mut camera = CameraModel::centered(self.fx, self.fy, self.width, self.height)
            .with_frame_id(&self.frame_id);
        if let Some(cx) = self.cx {
            camera.cx = cx;
        }
        if let Some(cy) = self.cy {
            camera.cy = cy;
        }
        camera
    }
}

#[derive(Debug, Clone, Args)]
struct DetectArgs {
    /// JSON config with images, camera, params and output paths.
    #[arg(long, conflicts_with = "images")]
    config: Option<PathBuf>,

    /// Input image; repeat for a sequence.
    #[arg(long = "image")]
    images: Vec<PathBuf>,

    #[command(flatten)]
    camera: CameraArgs,

    /// JSON file with pipeline parameters (missing fields keep their defaults).
    #[arg(long)]
    params: Option<PathBuf>,

    /// Directory for `<stem>_ground.png` masks.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Report path (default: lane_scan_report.json).
    #[arg(long)]
    report: Option<PathBuf>,

    /// Quantize each frame to this many colors before detection.
    #[arg(long)]
    quantize: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct ReplayArgs {
    /// Directory of frames, read in file-name order.
    #[arg(long)]
    dir: PathBuf,

    #[command(flatten)]
    camera: CameraArgs,

    #[arg(long)]
    params: Option<PathBuf>,

    /// Directory for `ground_<tick>.png` masks.
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Stop after this many processed frames.
    #[arg(long)]
    max_frames: Option<usize>,
}

#[derive(Debug, Clone, Args)]
struct HomographyArgs {
    #[command(flatten)]
    camera: CameraArgs,

    /// Frame width; defaults to the camera width.
    #[arg(long)]
    frame_width: Option<usize>,

    /// Frame height; defaults to the camera height.
    #[arg(long)]
    frame_height: Option<usize>,

    #[arg(long)]
    params: Option<PathBuf>,
}

fn load_params(path: Option<&Path>) -> CliResult<LaneScanParams> {
    match path {
        Some(p) => {
            let raw = std::fs::read_to_string(p)?;
            Ok(serde_json::from_str(&raw)?)
        }
        None => Ok(LaneScanParams::default()),
    }
}

fn init_logging(level: &str, json: bool) -> CliResult<()> {
    let level = parse_level(level)
        .ok_or_else(|| CliError::Usage(format!("unknown log level {level:?}")))?;

    #[cfg(feature = "tracing")]
    {
        let _ = tracing_log::LogTracer::init_with_filter(level);
        lane_scan_core::init_tracing(level, json);
    }

    #[cfg(not(feature = "tracing"))]
    {
        lane_scan_core::init_with_level(level).map_err(|e| CliError::Usage(e.to_string()))?;
        if json {
            log::warn!("--json-logs needs the `tracing` feature; using plain logs");
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = init_logging(&cli.log_level, cli.json_logs) {
        eprintln!("error: {err}");
        return ExitCode::from(2);
    }

    let result = match cli.command {
        Commands::Detect(args) => run_detect(&args),
        Commands::Replay(args) => run_replay(&args),
        Commands::Homography(args) => run_homography(&args),
        Commands::Params => run_params(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

// ── detect ─────────────────────────────────────────────────────────────

struct DetectPlan {
    images: Vec<String>,
    camera: CameraModel,
    params: LaneScanParams,
    out_dir: Option<PathBuf>,
    report_path: PathBuf,
}

impl DetectPlan {
    fn from_args(args: &DetectArgs) -> CliResult<Self> {
        if let Some(path) = &args.config {
            let cfg = LaneScanConfig::load_json(path)?;
            return Ok(Self {
                report_path: args.report.clone().unwrap_or_else(|| cfg.report_path()),
                out_dir: args
                    .out_dir
                    .clone()
                    .or_else(|| cfg.output_dir.as_ref().map(PathBuf::from)),
                params: cfg.params(),
                images: cfg.images,
                camera: cfg.camera,
            });
        }
        if args.images.is_empty() {
            return Err(CliError::Usage("pass --config or at least one --image".to_string()));
        }
        Ok(Self {
            images: args.images.iter().map(|p| p.display().to_string()).collect(),
            camera: args.camera.model(),
            params: load_params(args.params.as_deref())?,
            out_dir: args.out_dir.clone(),
            report_path: args
                .report
                .clone()
                .unwrap_or_else(|| PathBuf::from("lane_scan_report.json")),
        })
    }
}

fn ground_path(out_dir: &Path, image: &str) -> PathBuf {
    let stem = Path::new(image)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("frame");
    out_dir.join(format!("{stem}_ground.png"))
}

fn run_detect(args: &DetectArgs) -> CliResult<()> {
    let plan = DetectPlan::from_args(args)?;
    if let Some(dir) = &plan.out_dir {
        std::fs::create_dir_all(dir)?;
    }

    let slot = StreamSlot::new();
    let detector = LaneDetector::new(
        FrameSource::StreamSubscription(slot.clone()),
        plan.camera.clone(),
        plan.params.clone(),
    );
    let mut report = LaneScanReport::new(plan.camera.clone(), plan.params.clone());
    let quantize_params = args.quantize.map(|k| QuantizeParams {
        num_colors: k,
        ..plan.params.quantize.clone()
    });
    let mut clusters: Option<ClusterState> = None;

    for image in &plan.images {
        let frame = match load_rgb(Path::new(image)) {
            Ok(frame) => frame,
            Err(err) => {
                log::warn!("{err}");
                report.frames.push(FrameReport::from_error(image, &err));
                continue;
            }
        };
        let frame = match &quantize_params {
            Some(qp) => match quantize(&frame, qp, clusters.as_ref()) {
                Ok(q) => {
                    clusters = Some(q.state);
                    q.image
                }
                Err(err) => {
                    report.frames.push(FrameReport::from_error(image, &err));
                    continue;
                }
            },
            None => frame,
        };
        slot.deliver(frame, plan.camera.clone());

        match detector.tick() {
            Ok(outcome) => {
                let mut entry = FrameReport::from_outcome(image, &outcome);
                if let (Some(dir), Some(result)) = (&plan.out_dir, outcome.result()) {
                    let path = ground_path(dir, image);
                    match save_gray(&path, &result.ground) {
                        Ok(()) => entry.ground_path = Some(path.display().to_string()),
                        Err(err) => log::warn!("{err}"),
                    }
                }
                log::info!(
                    "{image}: {} contours, {} ground px{}",
                    entry.contour_areas.len(),
                    entry.ground_foreground,
                    if outcome.is_degraded() { " (degraded)" } else { "" }
                );
                report.frames.push(entry);
            }
            Err(err) if !err.is_fatal() => {
                log::warn!("{image}: {err}");
                report.frames.push(FrameReport::from_error(image, &err));
            }
            Err(err) => {
                report.fail(&err);
                break;
            }
        }
    }

    report.homography = detector.homography().map(|h| h.to_array());
    report.write_json(&plan.report_path)?;
    println!("wrote report JSON to {}", plan.report_path.display());
    Ok(())
}

// ── replay ─────────────────────────────────────────────────────────────

fn run_replay(args: &ReplayArgs) -> CliResult<()> {
    if let Some(dir) = &args.out_dir {
        std::fs::create_dir_all(dir)?;
    }
    let device = ImageSequenceDevice::open(&args.dir)?;
    let detector = LaneDetector::open_device(
        Box::new(device),
        args.camera.model(),
        load_params(args.params.as_deref())?,
    )?;

    let limit = args.max_frames.unwrap_or(usize::MAX);
    let mut processed = 0usize;
    while processed < limit {
        let outcome = match detector.tick() {
            Ok(TickOutcome::Skipped(SkipReason::NoFrame)) => break,
            Ok(outcome) => outcome,
            Err(err) => {
                log::warn!("tick failed: {err}");
                continue;
            }
        };
        let Some(result) = outcome.result() else {
            continue;
        };
        processed += 1;
        println!(
            "tick {}: L>={} steps={} contours={} hits={}{}",
            result.tick,
            result.segmentation.low_lightness,
            result.segmentation.iterations,
            result.contour_areas.len(),
            result.scan.hits(),
            if outcome.is_degraded() { " degraded" } else { "" }
        );
        if let Some(dir) = &args.out_dir {
            save_gray(&dir.join(format!("ground_{:04}.png", result.tick)), &result.ground)?;
        }
    }
    log::info!("replayed {processed} frames");
    Ok(())
}

// ── homography / params ────────────────────────────────────────────────

fn run_homography(args: &HomographyArgs) -> CliResult<()> {
    let camera = args.camera.model();
    let params = load_params(args.params.as_deref())?;
    let width = args.frame_width.unwrap_or(camera.width as usize);
    let height = args.frame_height.unwrap_or(camera.height as usize);
    let h = compute_ground_homography(&camera, width, height, &params.geometry)?;
    println!("{}", serde_json::to_string_pretty(&h.to_array())?);
    Ok(())
}

fn run_params() -> CliResult<()> {
    println!("{}", serde_json::to_string_pretty(&LaneScanParams::default())?);
    Ok(())
}
