use std::fs;
use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_beatgrid"))
}

fn temp_file(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("beatgrid_cli_{}_{}", std::process::id(), name))
}

fn write_onsets(name: &str, onsets: &[f64]) -> PathBuf {
    let path = temp_file(name);
    fs::write(&path, serde_json::to_string(onsets).expect("serialize onsets"))
        .expect("write onsets file");
    path
}

fn stdout_json(output: std::process::Output) -> Value {
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    serde_json::from_str(stdout.trim()).expect("report JSON payload")
}

#[test]
fn reconcile_steady_onsets_reports_single_point() {
    let onsets: Vec<f64> = (0..21).map(|i| i as f64 * 0.5).collect();
    let path = write_onsets("steady.json", &onsets);

    let output = cli()
        .args(["reconcile", "--onsets"])
        .arg(&path)
        .args(["--bpm", "120", "--duration", "10", "--json"])
        .output()
        .expect("failed to run beatgrid reconcile");
    let json = stdout_json(output);
    fs::remove_file(&path).ok();

    let beats = json["beats"].as_array().expect("beats array");
    assert_eq!(beats.len(), 1);
    assert_eq!(beats[0]["time"], 0.0);
    assert_eq!(beats[0]["bpm"], 120.0);
    assert!(json.get("average_bpm").is_none());
}

#[test]
fn reconcile_text_report_to_file() {
    let onsets: Vec<f64> = (0..21).map(|i| i as f64 * 0.5).collect();
    let path = write_onsets("text.json", &onsets);
    let report = temp_file("report.txt");

    let output = cli()
        .args(["reconcile", "--onsets"])
        .arg(&path)
        .args(["--bpm", "120", "--duration", "10", "--average", "-o"])
        .arg(&report)
        .output()
        .expect("failed to run beatgrid reconcile -o");
    assert!(output.status.success(), "CLI exited with {:?}", output.status.code());

    let text = fs::read_to_string(&report).expect("report file written");
    fs::remove_file(&path).ok();
    fs::remove_file(&report).ok();

    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Time (s)     |  BPM");
    assert_eq!(lines[2], "0.000s     |  120.00");
    assert!(text.contains("Average BPM (timing points): 120.00"));
    assert!(text.contains("Initial tempo seed: 120.00"));
}

#[test]
fn reconcile_rejects_invalid_timing_flags() {
    let path = write_onsets("invalid.json", &[0.0, 0.5]);

    let output = cli()
        .args(["reconcile", "--onsets"])
        .arg(&path)
        .args(["--bpm", "120", "--duration", "10", "--persist", "0"])
        .output()
        .expect("failed to run beatgrid reconcile");
    fs::remove_file(&path).ok();

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    assert!(stderr.contains("Error"), "expected error in stderr, got {stderr}");
}

#[test]
fn render_click_then_analyze() {
    let wav = temp_file("click.wav");

    let output = cli()
        .args(["render-click", "--bpm", "120", "--duration", "8", "-o"])
        .arg(&wav)
        .output()
        .expect("failed to run beatgrid render-click");
    assert!(output.status.success(), "render-click exited with {:?}", output.status.code());

    let output = cli()
        .arg("analyze")
        .arg(&wav)
        .args(["--bpm-hint", "120", "--json", "--average"])
        .output()
        .expect("failed to run beatgrid analyze");
    let json = stdout_json(output);
    fs::remove_file(&wav).ok();

    assert!(!json["beats"].as_array().expect("beats array").is_empty());
    let seed = json["tempo_seed"].as_f64().expect("tempo_seed");
    let average = json["average_bpm"].as_f64().expect("average_bpm");
    assert!((seed - 120.0).abs() < 3.0, "tempo seed {seed}");
    assert!((average - 120.0).abs() < 3.0, "average {average}");
}

#[test]
fn analyze_missing_file_fails() {
    let output = cli()
        .args(["analyze", "/definitely/not/here.wav"])
        .output()
        .expect("failed to run beatgrid analyze");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn dump_config_prints_defaults() {
    let output = cli()
        .arg("dump-config")
        .output()
        .expect("failed to run beatgrid dump-config");
    let json = stdout_json(output);

    assert_eq!(json["timing"]["persist"], 8);
    assert_eq!(json["timing"]["gap_reject_policy"], "retain");
    assert_eq!(json["onset_detection"]["hop_size"], 256);
}

#[test]
fn dump_config_reads_config_file() {
    let config = temp_file("config.json");
    fs::write(&config, r#"{"timing": {"persist": 5, "min_gap_ms": 900.0}}"#)
        .expect("write config file");

    let output = cli()
        .args(["dump-config", "--config"])
        .arg(&config)
        .output()
        .expect("failed to run beatgrid dump-config");
    let json = stdout_json(output);
    fs::remove_file(&config).ok();

    assert_eq!(json["timing"]["persist"], 5);
    assert_eq!(json["timing"]["min_gap_ms"], 900.0);
    assert_eq!(json["timing"]["decision_window"], 24);
}
