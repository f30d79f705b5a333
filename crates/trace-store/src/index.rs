//! Line number to byte offset table.

use std::fs::File;
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom};
use std::ops::Range;
use std::path::Path;

use crate::{Result, ScanError, TraceError};

const SCAN_BUFFER_SIZE: usize = 1024 * 1024; // 1 MiB

/// Byte offsets of every line in a trace file, built by one forward scan.
///
/// Offsets are exact byte counts (terminators included), so `\r\n` files index correctly. A
/// trailing line without a newline is counted; an empty trailing segment is not.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineIndex {
    offsets: Vec<u64>,
    byte_len: u64,
}

impl LineIndex {
    pub fn build(path: impl AsRef<Path>) -> Result<Self> {
        Self::build_with_progress(path, 0, |_| {})
    }

    /// Like [`LineIndex::build`], invoking `progress(lines_scanned)` every `interval` lines.
    /// An `interval` of 0 disables progress reporting.
    pub fn build_with_progress(
        path: impl AsRef<Path>,
        interval: usize,
        mut progress: impl FnMut(usize),
    ) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let reader = BufReader::with_capacity(SCAN_BUFFER_SIZE, file);

        let index = scan(reader, interval, &mut progress).map_err(|err| TraceError::Scan {
            path: path.to_path_buf(),
            line: err.line,
            source: err.source,
        })?;
        tracing::debug!(
            path = %path.display(),
            lines = index.len(),
            bytes = index.byte_len,
            "trace index built"
        );
        Ok(index)
    }

    /// Indexes an arbitrary reader.
    pub fn from_reader<R: BufRead>(reader: R) -> std::result::Result<Self, ScanError> {
        scan(reader, 0, &mut |_| {})
    }

    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// Size of the indexed file at scan time.
    pub fn byte_len(&self) -> u64 {
        self.byte_len
    }

    pub fn offsets(&self) -> &[u64] {
        &self.offsets
    }

    pub fn offset(&self, line: usize) -> Option<u64> {
        self.offsets.get(line).copied()
    }

    /// Byte range of `line`, including its terminator.
    pub fn span(&self, line: usize) -> Option<Range<u64>> {
        let start = self.offset(line)?;
        let end = self.offset(line + 1).unwrap_or(self.byte_len);
        Some(start..end)
    }

    /// Byte range covering `lines`, clipped to the index.
    pub fn span_of(&self, lines: Range<usize>) -> Option<Range<u64>> {
        let end_line = lines.end.min(self.len());
        if lines.start >= end_line {
            return None;
        }
        let start = self.offset(lines.start)?;
        let end = self.offset(end_line).unwrap_or(self.byte_len);
        Some(start..end)
    }

    /// Reads the raw text of `line` from `file` with one seek and one read.
    pub fn read_line(&self, file: &mut File, line: usize) -> io::Result<Option<String>> {
        let Some(span) = self.span(line) else {
            return Ok(None);
        };
        let bytes = read_span(file, span)?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }
}

/// Reads exactly the bytes of `span` from `file`.
pub(crate) fn read_span(file: &mut File, span: Range<u64>) -> io::Result<Vec<u8>> {
    let len = usize::try_from(span.end - span.start)
        .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "line span too large"))?;
    file.seek(SeekFrom::Start(span.start))?;
    let mut buf = vec![0u8; len];
    file.read_exact(&mut buf)?;
    Ok(buf)
}

fn scan<R: BufRead>(
    mut reader: R,
    interval: usize,
    progress: &mut dyn FnMut(usize),
) -> std::result::Result<LineIndex, ScanError> {
    let mut offsets = Vec::new();
    let mut pos = 0u64;
    let mut at_line_start = true;

    loop {
        let chunk = match reader.fill_buf() {
            Ok(chunk) => chunk,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                let line = if at_line_start {
                    offsets.len()
                } else {
                    offsets.len() - 1
                };
                return Err(ScanError { line, source: e });
            }
        };
        if chunk.is_empty() {
            break;
        }

        let mut i = 0;
        while i < chunk.len() {
            if at_line_start {
                offsets.push(pos + i as u64);
                at_line_start = false;
                if interval != 0 && offsets.len() % interval == 0 {
                    progress(offsets.len());
                }
            }
            match chunk[i..].iter().position(|&b| b == b'\n') {
                Some(nl) => {
                    i += nl + 1;
                    at_line_start = true;
                }
                None => i = chunk.len(),
            }
        }

        let len = chunk.len();
        pos += len as u64;
        reader.consume(len);
    }

    Ok(LineIndex {
        offsets,
        byte_len: pos,
    })
}
