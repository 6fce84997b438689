//! CLI integration tests

use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

fn sentinel(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sentinel"))
        .args(args)
        .env_remove("SENTINEL_API_URL")
        .output()
        .expect("Failed to execute command")
}

fn write_series(dir: &TempDir, name: &str, content: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, content).expect("Failed to write series file");
    path
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = sentinel(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("SRE Sentinel"), "Should show app name");
    assert!(stdout.contains("detect"), "Should show detect command");
    assert!(stdout.contains("forecast"), "Should show forecast command");
    assert!(stdout.contains("status"), "Should show status command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = sentinel(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("sentinel"), "Should show binary name");
}

#[test]
fn test_detect_flags_spike() {
    let dir = TempDir::new().unwrap();
    let file = write_series(
        &dir,
        "cpu.json",
        r#"{"values": [50, 50, 50, 50, 50, 50, 50, 50, 50, 95]}"#,
    );

    let output = sentinel(&[
        "-f",
        "json",
        "detect",
        "--metric",
        "cpu",
        "--file",
        file.to_str().unwrap(),
    ]);
    assert!(
        output.status.success(),
        "detect failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let anomalies: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let anomalies = anomalies.as_array().unwrap();
    assert_eq!(anomalies.len(), 1);
    assert_eq!(anomalies[0]["metric_name"], "cpu");
    assert_eq!(anomalies[0]["value"], 95.0);
    assert_eq!(anomalies[0]["severity"], "critical");
}

#[test]
fn test_detect_short_series_is_empty() {
    let dir = TempDir::new().unwrap();
    let file = write_series(&dir, "short.json", "[1, 2, 3]");

    let output = sentinel(&[
        "--format",
        "json",
        "detect",
        "--metric",
        "memory",
        "--file",
        file.to_str().unwrap(),
    ]);

    assert!(output.status.success());
    let anomalies: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(anomalies, serde_json::json!([]));
}

#[test]
fn test_detect_missing_file_fails() {
    let output = sentinel(&["detect", "--metric", "cpu", "--file", "/nonexistent/series.json"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("series.json"), "Should name the file");
}

#[test]
fn test_forecast_default_horizon() {
    let dir = TempDir::new().unwrap();
    let values: Vec<String> = (0..60).map(|i| format!("{}", 20.0 + 0.5 * i as f64)).collect();
    let file = write_series(&dir, "disk.json", &format!("[{}]", values.join(",")));

    let output = sentinel(&[
        "-f",
        "json",
        "forecast",
        "--metric",
        "disk",
        "--file",
        file.to_str().unwrap(),
    ]);
    assert!(output.status.success());

    let predictions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let predictions = predictions.as_array().unwrap();
    assert_eq!(predictions.len(), 24);
    assert_eq!(predictions[0]["model_name"], "linear_trend");
    // Last value 49.5 plus one step of trend 0.5
    let first = predictions[0]["predicted_value"].as_f64().unwrap();
    assert!((first - 50.0).abs() < 1e-9);
}

#[test]
fn test_forecast_short_history_is_empty() {
    let dir = TempDir::new().unwrap();
    let file = write_series(&dir, "short.json", "[1, 2, 3, 4, 5]");

    let output = sentinel(&[
        "-f",
        "json",
        "forecast",
        "--metric",
        "cpu",
        "--file",
        file.to_str().unwrap(),
        "--horizon",
        "6",
    ]);

    assert!(output.status.success());
    let predictions: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(predictions, serde_json::json!([]));
}

#[test]
fn test_status_from_agent() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/status")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"models":{"statistical":{"status":"active","kind":"statistical","weight":0.2}},
                "buffer_sizes":{"cpu":42},"last_run":null,"state":"idle",
                "total_anomalies_detected":7}"#,
        )
        .create();

    let output = sentinel(&["--api-url", &server.url(), "-f", "json", "status"]);
    assert!(
        output.status.success(),
        "status failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let status: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(status["buffer_sizes"]["cpu"], 42);
    assert_eq!(status["total_anomalies_detected"], 7);
}

#[test]
fn test_status_unreachable_agent_fails() {
    let output = sentinel(&["--api-url", "http://127.0.0.1:1", "status"]);
    assert!(!output.status.success());
}
