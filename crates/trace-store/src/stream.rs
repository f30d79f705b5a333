//! Sequential, single-pass reading of a trace.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use crate::record::{parse_bytes, RecordParseError, TraceRecord};
use crate::{Result, ScanError, TraceError};

/// One line of a streamed trace and the outcome of parsing it.
#[derive(Debug)]
pub struct StreamedLine {
    /// 0-based line number.
    pub line: usize,
    pub record: std::result::Result<TraceRecord, RecordParseError>,
}

/// Parses a trace front to back without indexing it, yielding every line with its parse
/// outcome. Malformed lines are yielded, not skipped; a read failure ends the stream.
pub struct RecordStream<R> {
    reader: R,
    buf: Vec<u8>,
    lines_read: usize,
    done: bool,
}

impl RecordStream<BufReader<File>> {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| TraceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> RecordStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            buf: Vec::new(),
            lines_read: 0,
            done: false,
        }
    }

    /// Lines consumed so far, malformed ones included.
    pub fn lines_read(&self) -> usize {
        self.lines_read
    }

    /// Drains the stream, returning the malformed lines and their errors.
    pub fn malformed(mut self) -> std::result::Result<Vec<(usize, RecordParseError)>, ScanError> {
        let mut bad = Vec::new();
        for item in &mut self {
            let item = item?;
            if let Err(err) = item.record {
                bad.push((item.line, err));
            }
        }
        Ok(bad)
    }
}

impl<R: BufRead> Iterator for RecordStream<R> {
    type Item = std::result::Result<StreamedLine, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => {
                self.done = true;
                None
            }
            Ok(_) => {
                let line = self.lines_read;
                self.lines_read += 1;
                Some(Ok(StreamedLine {
                    line,
                    record: parse_bytes(&self.buf),
                }))
            }
            Err(source) => {
                self.done = true;
                Some(Err(ScanError {
                    line: self.lines_read,
                    source,
                }))
            }
        }
    }
}
