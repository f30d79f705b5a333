#![cfg(not(target_arch = "wasm32"))]

use std::fs;
use std::path::PathBuf;

use tempfile::{tempdir, TempDir};

fn line(step: usize) -> String {
    let pc = 0x8000 + step * 4;
    let mut fields = vec![
        format!("{step:x}"),
        format!("{pc:#x}"),
        format!("{}", step * 4),
        "\"add x1, x1, #1\"".to_string(),
    ];
    for n in 0..31 {
        // Only x1 moves between steps.
        let value = if n == 1 { step } else { n };
        fields.push(format!("{value:#x}"));
    }
    fields.push("0x7ff0".to_string());
    fields.push(format!("{pc:#x}"));
    fields.join("|")
}

fn write_trace(lines: &[String]) -> (TempDir, PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("run.trace");
    let mut text = lines.join("\n");
    text.push('\n');
    fs::write(&path, text).unwrap();
    (dir, path)
}

fn good_trace(count: usize) -> (TempDir, PathBuf) {
    let lines: Vec<String> = (0..count).map(line).collect();
    write_trace(&lines)
}

fn stdout_of(args: &[&str]) -> String {
    let output = assert_cmd::cargo::cargo_bin_cmd!("trace-inspect")
        .args(args)
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8(output.stdout).unwrap()
}

#[test]
fn info_reports_line_count() {
    let (_dir, path) = good_trace(7);
    let out = stdout_of(&["info", path.to_str().unwrap()]);
    assert!(out.contains("lines: 7"), "{out}");
}

#[test]
fn show_lists_changed_registers() {
    let (_dir, path) = good_trace(5);
    let out = stdout_of(&["show", path.to_str().unwrap(), "3"]);
    assert!(out.contains("line 3 (step 0x3)"), "{out}");
    assert!(out.contains("instruction: add x1, x1, #1"), "{out}");
    assert!(out.contains("changed: x1 0x2 -> 0x3, pc 0x8008 -> 0x800c"), "{out}");
}

#[test]
fn show_json_is_structured() {
    let (_dir, path) = good_trace(5);
    let out = stdout_of(&["show", path.to_str().unwrap(), "0", "--json"]);
    let value: serde_json::Value = serde_json::from_str(&out).unwrap();
    assert_eq!(value["line"], 0);
    assert_eq!(value["record"]["step"], 0);
    assert_eq!(value["record"]["registers"].as_array().unwrap().len(), 31);
    assert!(value["changes"].as_array().unwrap().is_empty());
}

#[test]
fn show_out_of_range_fails() {
    let (_dir, path) = good_trace(2);
    assert_cmd::cargo::cargo_bin_cmd!("trace-inspect")
        .args(["show", path.to_str().unwrap(), "2"])
        .assert()
        .failure();
}

#[test]
fn dump_walks_forward() {
    let (_dir, path) = good_trace(10);
    let out = stdout_of(&[
        "dump",
        path.to_str().unwrap(),
        "--from",
        "8",
        "--count",
        "5",
        "--prefetch-window",
        "0",
    ]);
    let lines: Vec<&str> = out.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("8|0x8020|"), "{out}");
    assert!(lines[1].starts_with("9|0x8024|"), "{out}");
}

#[test]
fn dump_json_lines() {
    let (_dir, path) = good_trace(4);
    let out = stdout_of(&["dump", path.to_str().unwrap(), "--count", "3", "--json"]);
    let steps: Vec<u64> = out
        .lines()
        .map(|l| {
            let value: serde_json::Value = serde_json::from_str(l).unwrap();
            value["record"]["step"].as_u64().unwrap()
        })
        .collect();
    assert_eq!(steps, vec![0, 1, 2]);
}

#[test]
fn check_passes_clean_trace() {
    let (_dir, path) = good_trace(6);
    let out = stdout_of(&["check", path.to_str().unwrap()]);
    assert!(out.contains("checked 6 lines, 0 malformed"), "{out}");
}

#[test]
fn check_reports_malformed_lines() {
    let mut lines: Vec<String> = (0..4).map(line).collect();
    lines[2] = lines[2].replacen("0x8008", "0xZZ", 1);
    let (_dir, path) = write_trace(&lines);

    let output = assert_cmd::cargo::cargo_bin_cmd!("trace-inspect")
        .args(["check", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("line 2: failed to parse address"), "{stdout}");
    assert!(stdout.contains("checked 4 lines, 1 malformed"), "{stdout}");
}

#[test]
fn zero_capacity_is_rejected() {
    let (_dir, path) = good_trace(2);
    let output = assert_cmd::cargo::cargo_bin_cmd!("trace-inspect")
        .args(["info", path.to_str().unwrap(), "--cache-capacity", "0"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("capacity must be > 0"), "{stderr}");
}

#[test]
fn check_reports_non_utf8_lines() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("binary.trace");
    let mut data = format!("{}\n", line(0)).into_bytes();
    data.extend_from_slice(b"\xc3\x28|junk\n");
    fs::write(&path, data).unwrap();

    let output = assert_cmd::cargo::cargo_bin_cmd!("trace-inspect")
        .args(["check", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("line 1: line is not valid UTF-8"), "{stdout}");
    assert!(stdout.contains("checked 2 lines, 1 malformed"), "{stdout}");
}
