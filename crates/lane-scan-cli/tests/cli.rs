use assert_cmd::Command;
use predicates::prelude::*;
use std::path::Path;
use tempfile::tempdir;

fn write_stripe_png(path: &Path) {
    let mut img = image::RgbImage::new(640, 480);
    for y in 260..460 {
        for x in 100..120 {
            img.put_pixel(x, y, image::Rgb([255, 255, 255]));
        }
    }
    img.save(path).expect("save png");
}

fn lane_scan() -> Command {
    Command::cargo_bin("lane-scan").expect("binary")
}

#[test]
fn params_prints_defaults() {
    lane_scan()
        .arg("params")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"max_foreground\": 20000"))
        .stdout(predicate::str::contains("\"tilt_deg\": 15.0"));
}

#[cfg(not(feature = "tracing"))]
#[test]
fn json_logs_without_tracing_warns_on_stderr() {
    lane_scan()
        .args(["--json-logs", "params"])
        .assert()
        .success()
        .stderr(predicate::str::contains("--json-logs needs the `tracing` feature"));
}

#[test]
fn homography_prints_a_matrix() {
    let out = lane_scan()
        .args(["homography", "--fx", "600", "--fy", "600"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let h: [[f64; 3]; 3] = serde_json::from_slice(&out).expect("matrix json");
    assert!(h.iter().flatten().all(|v| v.is_finite()));
}

#[test]
fn detect_writes_report_and_ground_mask() {
    let dir = tempdir().expect("tmp");
    let image = dir.path().join("stripe.png");
    write_stripe_png(&image);
    let missing = dir.path().join("missing.png");
    let out_dir = dir.path().join("out");
    let report = dir.path().join("report.json");

    lane_scan()
        .args(["--log-level", "warn", "detect"])
        .arg("--image")
        .arg(&image)
        .arg("--image")
        .arg(&missing)
        .arg("--out-dir")
        .arg(&out_dir)
        .arg("--report")
        .arg(&report)
        .assert()
        .success()
        .stdout(predicate::str::contains("wrote report JSON"));

    assert!(out_dir.join("stripe_ground.png").exists());
    let raw = std::fs::read_to_string(&report).expect("report");
    let json: serde_json::Value = serde_json::from_str(&raw).expect("report json");
    let frames = json["frames"].as_array().expect("frames");
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0]["contour_areas"].as_array().map(Vec::len), Some(1));
    assert!(frames[0]["ground_foreground"].as_u64().unwrap_or(0) > 0);
    assert!(frames[1]["error"].is_string());
    assert!(json["homography"].is_array());
}

#[test]
fn detect_from_config_file() {
    let dir = tempdir().expect("tmp");
    let image = dir.path().join("frame.png");
    write_stripe_png(&image);
    let report = dir.path().join("cfg_report.json");
    let config = dir.path().join("config.json");
    let cfg = serde_json::json!({
        "images": [image.display().to_string()],
        "camera": {"fx": 600.0, "fy": 600.0, "cx": 320.0, "cy": 240.0, "width": 640, "height": 480},
        "params": {"threshold": {"max_foreground": 15000}},
        "report_path": report.display().to_string(),
    });
    std::fs::write(&config, cfg.to_string()).expect("write config");

    lane_scan()
        .args(["detect", "--config"])
        .arg(&config)
        .assert()
        .success();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&report).expect("report")).expect("json");
    assert_eq!(json["params"]["threshold"]["max_foreground"], 15000);
    assert_eq!(json["frames"][0]["degraded"], false);
}

#[test]
fn replay_on_empty_directory_reports_unavailable_device() {
    let dir = tempdir().expect("tmp");
    lane_scan()
        .args(["replay", "--dir"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("unavailable"));
}

#[test]
fn replay_processes_every_frame() {
    let dir = tempdir().expect("tmp");
    write_stripe_png(&dir.path().join("a.png"));
    write_stripe_png(&dir.path().join("b.png"));
    lane_scan()
        .args(["replay", "--dir"])
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("tick 0:"))
        .stdout(predicate::str::contains("tick 1:"));
}

#[test]
fn detect_without_inputs_is_a_usage_error() {
    lane_scan()
        .arg("detect")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--image"));
}
