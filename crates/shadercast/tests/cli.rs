use std::fs;
use std::process::Command;

use tempfile::TempDir;

fn shadercast() -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_shadercast"));
    command.env("RUST_LOG", "warn");
    command
}

fn plan(args: &[&str]) -> serde_json::Value {
    let output = shadercast()
        .arg("plan")
        .args(args)
        .output()
        .expect("failed to run shadercast plan");
    assert!(
        output.status.success(),
        "plan failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("plan output is not JSON")
}

#[test]
fn default_plan_has_thirty_frames() {
    let report = plan(&[]);
    assert_eq!(report["job"]["width"], 180);
    assert_eq!(report["job"]["height"], 320);
    assert_eq!(report["job"]["bitrate"], 500_000);
    assert_eq!(report["job"]["codec"], "avc1.42001f");

    let frames = report["frames"].as_array().unwrap();
    assert_eq!(frames.len(), 30);
    assert_eq!(frames[0]["time"], 0.0);
    assert_eq!(frames[29]["index"], 29);
}

#[test]
fn job_file_values_are_overridden_by_flags() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.toml");
    fs::write(
        &path,
        "width = 320\nheight = 240\nfps = 10\nseconds = \"2s 500ms\"\ncodec = \"vp8\"\n",
    )
    .unwrap();

    let report = plan(&["--job", path.to_str().unwrap(), "--width", "64"]);
    assert_eq!(report["job"]["width"], 64);
    assert_eq!(report["job"]["height"], 240);
    assert_eq!(report["job"]["codec"], "vp8");
    assert_eq!(report["frames"].as_array().unwrap().len(), 25);
}

#[test]
fn invalid_field_fails_before_rendering() {
    let output = shadercast()
        .args(["plan", "--fps", "abc"])
        .output()
        .expect("failed to run shadercast plan");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fps must be a number"), "stderr: {stderr}");
}

#[test]
fn non_positive_seconds_are_rejected() {
    let output = shadercast()
        .args(["plan", "--seconds", "0"])
        .output()
        .expect("failed to run shadercast plan");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("seconds must be greater than zero"), "stderr: {stderr}");
}

#[test]
fn missing_job_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let output = shadercast()
        .args(["plan", "--job"])
        .arg(dir.path().join("absent.toml"))
        .output()
        .expect("failed to run shadercast plan");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to read job file"), "stderr: {stderr}");
}

#[test]
fn framerate_below_minimum_is_rejected() {
    let output = shadercast()
        .args(["plan", "--fps", "0.00000000000000000001"])
        .output()
        .expect("failed to run shadercast plan");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("fps must be at least 0.1"), "stderr: {stderr}");
    assert!(!stderr.contains("panicked"), "stderr: {stderr}");
}

#[test]
fn oversized_play_durations_are_rejected() {
    for args in [
        &["play", "--seconds", "1e30"][..],
        &["play", "--refresh-hz", "1e-30", "--seconds", "0.1"][..],
    ] {
        let output = shadercast()
            .args(args)
            .output()
            .expect("failed to run shadercast play");
        assert!(!output.status.success());
        let stderr = String::from_utf8_lossy(&output.stderr);
        assert!(!stderr.contains("panicked"), "stderr: {stderr}");
        assert!(
            stderr.contains("too long") || stderr.contains("too low"),
            "stderr: {stderr}"
        );
    }
}
