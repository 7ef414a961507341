mod common;

use assert_cmd::Command;
use common::synthetic_road::{blank_road, straight_road};
use lanefind::adapt::save_rgb;
use lanefind::config::LaneConfig;
use predicates::prelude::*;

#[test]
fn init_config_writes_loadable_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("lanefind.json");
    Command::cargo_bin("lanefind")
        .unwrap()
        .args(["init-config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("default configuration"));

    let cfg = LaneConfig::load_json(&path).unwrap();
    assert_eq!(cfg, LaneConfig::default());
}

#[test]
fn process_writes_frames_and_report() {
    let dir = tempfile::tempdir().unwrap();
    let frames = dir.path().join("frames");
    std::fs::create_dir(&frames).unwrap();
    save_rgb(&straight_road(), frames.join("0001.png")).unwrap();
    save_rgb(&straight_road(), frames.join("0002.png")).unwrap();
    save_rgb(&blank_road(), frames.join("0003.png")).unwrap();
    std::fs::write(frames.join("0004.png"), b"not a png").unwrap();
    let out = dir.path().join("out");

    Command::cargo_bin("lanefind")
        .unwrap()
        .arg("process")
        .arg(&frames)
        .arg("--output-dir")
        .arg(&out)
        .assert()
        .success()
        .stdout(predicate::str::contains("processed 3 frames (1 skipped)"));

    for i in 0..3 {
        assert!(out.join(format!("frame_{i:05}.png")).is_file());
    }
    let report: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(out.join("report.json")).unwrap()).unwrap();
    assert_eq!(report["processed"], 3);
    assert_eq!(report["skipped"], 1);
    assert!(report["calibration"].is_null());
    let frames = report["frames"].as_array().unwrap();
    assert_eq!(frames[0]["strategy"], "sliding_window");
    assert_eq!(frames[1]["strategy"], "local");
    assert_eq!(frames[2]["degraded"], serde_json::json!(["left", "right"]));
    assert!(frames[2]["offset_m"].as_f64().is_some());
}

#[test]
fn invalid_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    let cfg_path = dir.path().join("bad.json");
    std::fs::write(&cfg_path, r#"{ "tracker": { "window_count": 0 } }"#).unwrap();
    save_rgb(&blank_road(), dir.path().join("frame.png")).unwrap();

    Command::cargo_bin("lanefind")
        .unwrap()
        .arg("process")
        .arg(dir.path().join("frame.png"))
        .arg("--config")
        .arg(&cfg_path)
        .arg("--output-dir")
        .arg(dir.path().join("out"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("window_count"));
}

#[test]
fn calibrate_rejects_bad_pattern() {
    Command::cargo_bin("lanefind")
        .unwrap()
        .args(["calibrate", "--images", ".", "--pattern", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("COLSxROWS"));
}
