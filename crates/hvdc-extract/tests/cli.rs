//! The extractor binary's stdout carries only the report.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use serde_json::Value;

fn run_cli(dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_hvdc-extract"))
        .current_dir(dir)
        .env("RUST_LOG", "debug")
        .args(args)
        .output()
        .expect("command runs")
}

#[test]
fn report_on_stdout_logs_on_stderr() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("DSV_HVDC.csv"),
        "HVDC CODE,QTY\nHVDC-ADOPT-SCT-0001,2\n",
    )
    .unwrap();

    let output = run_cli(dir.path(), &["DSV_HVDC.csv"]);
    assert!(
        output.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&output.stderr)
    );

    let report: Value = serde_json::from_slice(&output.stdout).expect("stdout is one JSON report");
    assert_eq!(report["records"][0]["code"], "HVDC-ADOPT-SCT-0001");
    assert!(String::from_utf8_lossy(&output.stderr).contains("Starting extraction"));
}
