#![allow(dead_code)]

use std::path::PathBuf;

use tempfile::TempDir;
use trace_store::REGISTER_COUNT;

/// A well-formed 37-field line for `step`; every other field is derived from it.
pub fn trace_line(step: usize) -> String {
    let pc = 0x1_0000 + step as u64 * 4;
    let mut fields = vec![
        format!("{step:x}"),
        format!("{pc:#x}"),
        format!("{}", step * 4),
        "\"sub sp, sp, #0x20\"".to_string(),
    ];
    fields.extend((0..REGISTER_COUNT).map(|n| (step * 1000 + n).to_string()));
    fields.push(format!("{:#x}", 0xffff_0000u64 - step as u64 * 0x20));
    fields.push(format!("{pc:#x}"));
    fields.join("|")
}

pub fn write_lines(lines: &[String]) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("exec.trace");
    let mut text = lines.join("\n");
    text.push('\n');
    std::fs::write(&path, text).unwrap();
    (dir, path)
}

pub fn write_steps(count: usize) -> (TempDir, PathBuf) {
    let lines: Vec<String> = (0..count).map(trace_line).collect();
    write_lines(&lines)
}
