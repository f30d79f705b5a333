use std::path::PathBuf;

use tempfile::TempDir;

use crate::record::REGISTER_COUNT;

/// A well-formed trace line whose step is `step` and whose other fields derive from it.
pub(crate) fn fixture_line(step: usize) -> String {
    let address = 0x40_0000 + step as u64 * 4;
    let mut fields = vec![
        format!("{step:x}"),
        format!("{address:#x}"),
        format!("{}", step * 4),
        format!("\"add x{}, x{}, #1\"", step % 29, step % 29),
    ];
    fields.extend((0..REGISTER_COUNT).map(|n| format!("{:#x}", step * 100 + n)));
    fields.push(format!("{:#x}", 0x7fff_0000 - step as u64 * 16));
    fields.push(format!("{address:#x}"));
    fields.join("|")
}

pub(crate) fn write_trace<I, S>(lines: I) -> (TempDir, PathBuf)
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("trace.log");
    let mut text = String::new();
    for line in lines {
        text.push_str(line.as_ref());
        text.push('\n');
    }
    std::fs::write(&path, text).unwrap();
    (dir, path)
}
