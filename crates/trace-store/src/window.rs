//! Cursor navigation over one eagerly loaded window of records.
//!
//! [`TraceWindow`] is the alternative to [`crate::PrefetchingCache`]: it parses a contiguous run
//! of lines around the cursor up front and keeps nothing else. Moving the cursor with
//! [`TraceWindow::next`] and [`TraceWindow::prev`] never leaves the window; only
//! [`TraceWindow::go_to`] replaces it.
//!
//! Records appended with [`TraceWindow::add_instruction`] extend the trace past the end of the
//! indexed file. They are kept for the lifetime of the window and merged into any window that
//! overlaps them.

use std::fs::File;
use std::io::BufRead;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::index::{read_span, LineIndex};
use crate::record::{parse_bytes, TraceRecord};
use crate::source::TraceSource;
use crate::stream::RecordStream;
use crate::{Result, ScanError, TraceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowConfig {
    /// Lines loaded per window. 0 is treated as 1.
    pub window_size: usize,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { window_size: 2000 }
    }
}

#[derive(Debug, Clone)]
struct Loaded {
    line: usize,
    record: Arc<TraceRecord>,
}

#[derive(Debug)]
struct Backing {
    path: PathBuf,
    index: LineIndex,
}

#[derive(Debug)]
pub struct TraceWindow {
    config: WindowConfig,
    backing: Option<Backing>,
    /// Lines `file_len()..total`, in order.
    appended: Vec<Arc<TraceRecord>>,
    records: Vec<Loaded>,
    current: usize,
    previous: Option<Arc<TraceRecord>>,
    loaded_range: Range<usize>,
    total: usize,
}

impl Default for TraceWindow {
    fn default() -> Self {
        Self::new(WindowConfig::default())
    }
}

impl TraceWindow {
    /// An empty window with no backing file, fed through [`TraceWindow::add_instruction`].
    pub fn new(config: WindowConfig) -> Self {
        Self {
            config,
            backing: None,
            appended: Vec::new(),
            records: Vec::new(),
            current: 0,
            previous: None,
            loaded_range: 0..0,
            total: 0,
        }
    }

    /// Indexes `path` and loads the window centered on the cursor's current line (line 0 for a
    /// fresh window). Malformed lines inside the window are skipped.
    ///
    /// The file replaces whatever the window held before, including appended records.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let index = LineIndex::build(path)?;
        let center = self
            .position()
            .unwrap_or(0)
            .min(index.len().saturating_sub(1));

        self.appended.clear();
        self.total = index.len();
        self.backing = Some(Backing {
            path: path.to_path_buf(),
            index,
        });
        self.reload_around(center)?;
        self.seek_line(center);
        Ok(())
    }

    pub fn config(&self) -> WindowConfig {
        self.config
    }

    pub fn is_file_backed(&self) -> bool {
        self.backing.is_some()
    }

    pub fn total(&self) -> usize {
        self.total
    }

    /// Global line numbers covered by the loaded window.
    pub fn loaded_range(&self) -> Range<usize> {
        self.loaded_range.clone()
    }

    /// Number of records actually held (malformed lines excluded).
    pub fn loaded_len(&self) -> usize {
        self.records.len()
    }

    pub fn current(&self) -> Option<Arc<TraceRecord>> {
        self.records.get(self.current).map(|l| Arc::clone(&l.record))
    }

    /// Record immediately behind the cursor; `None` at the first loaded record.
    pub fn previous(&self) -> Option<Arc<TraceRecord>> {
        self.previous.clone()
    }

    /// Global line number under the cursor.
    pub fn position(&self) -> Option<usize> {
        self.records.get(self.current).map(|l| l.line)
    }

    /// Record at position `i` of the loaded window.
    pub fn get_line(&self, i: usize) -> Option<Arc<TraceRecord>> {
        self.records.get(i).map(|l| Arc::clone(&l.record))
    }

    /// Record of global line `line`, if it is loaded.
    pub fn record_at(&self, line: usize) -> Option<Arc<TraceRecord>> {
        self.records
            .binary_search_by_key(&line, |l| l.line)
            .ok()
            .map(|i| Arc::clone(&self.records[i].record))
    }

    pub fn next(&mut self) -> bool {
        if self.current + 1 >= self.records.len() {
            return false;
        }
        self.previous = Some(Arc::clone(&self.records[self.current].record));
        self.current += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        self.refresh_previous();
        true
    }

    /// Moves the cursor to global line `line`.
    ///
    /// Targets outside the loaded window cause the window to be reloaded around `line` first.
    /// When `line` itself was skipped as malformed the cursor lands on the next loaded record,
    /// and if the window ends before one, it is reloaded to start at `line`. Only when no
    /// well-formed record follows within a whole window does the cursor land before `line`, on
    /// the last record loaded.
    ///
    /// Returns `false` for `line >= total()`, for a failed reload, and when the cursor ends up
    /// on no record at all.
    pub fn go_to(&mut self, line: usize) -> bool {
        if line >= self.total {
            return false;
        }
        if !self.loaded_range.contains(&line) && !self.try_reload(line, Self::reload_around) {
            return false;
        }
        self.seek_line(line);

        let landed_before = self.position().map_or(true, |pos| pos < line);
        if landed_before && self.loaded_range.end < self.total {
            if !self.try_reload(line, Self::reload_from) {
                return false;
            }
            self.seek_line(line);
        }
        self.position().is_some()
    }

    /// Appends a record as line `total()`, for sources that grow while being viewed.
    ///
    /// A window that already reaches the end of the trace grows to include the new record;
    /// otherwise the record is picked up by the next reload that covers it.
    pub fn add_instruction(&mut self, record: TraceRecord) {
        let line = self.total;
        let record = Arc::new(record);
        self.appended.push(Arc::clone(&record));
        self.total += 1;

        if self.loaded_range.end == line {
            self.records.push(Loaded { line, record });
            self.loaded_range.end = self.total;
        }
    }

    /// Parses every line of `reader` and appends the well-formed ones. Returns the number of
    /// records appended.
    pub fn extend_from_reader<R: BufRead>(
        &mut self,
        reader: R,
    ) -> std::result::Result<usize, ScanError> {
        let mut appended = 0;
        for item in RecordStream::new(reader) {
            let item = item?;
            match item.record {
                Ok(record) => {
                    self.add_instruction(record);
                    appended += 1;
                }
                Err(err) => {
                    tracing::warn!(
                        input_line = item.line,
                        error = %err,
                        "skipping malformed trace line"
                    );
                }
            }
        }
        Ok(appended)
    }

    fn file_len(&self) -> usize {
        self.backing.as_ref().map_or(0, |b| b.index.len())
    }

    fn refresh_previous(&mut self) {
        self.previous = match self.current {
            0 => None,
            n => self.records.get(n - 1).map(|l| Arc::clone(&l.record)),
        };
    }

    fn seek_line(&mut self, line: usize) {
        let idx = self.records.partition_point(|l| l.line < line);
        self.current = idx.min(self.records.len().saturating_sub(1));
        self.refresh_previous();
    }

    fn try_reload(&mut self, line: usize, reload: fn(&mut Self, usize) -> Result<()>) -> bool {
        match reload(self, line) {
            Ok(()) => true,
            Err(err) => {
                tracing::warn!(line, error = %err, "failed to reload trace window");
                false
            }
        }
    }

    fn reload_around(&mut self, center: usize) -> Result<()> {
        let size = self.config.window_size.max(1);
        let end = center
            .saturating_sub(size / 2)
            .saturating_add(size)
            .min(self.total);
        self.reload_range(end.saturating_sub(size)..end)
    }

    fn reload_from(&mut self, first: usize) -> Result<()> {
        let size = self.config.window_size.max(1);
        let end = first.saturating_add(size).min(self.total);
        self.reload_range(end.saturating_sub(size)..end)
    }

    fn reload_range(&mut self, lines: Range<usize>) -> Result<()> {
        let file_len = self.file_len();
        let mut records = match &self.backing {
            Some(backing) if lines.start < file_len => {
                read_window(backing, lines.start..lines.end.min(file_len))?
            }
            _ => Vec::new(),
        };

        let tail_start = lines.start.max(file_len);
        records.extend(
            self.appended
                .iter()
                .enumerate()
                .skip(tail_start - file_len)
                .take(lines.end.saturating_sub(tail_start))
                .map(|(n, record)| Loaded {
                    line: file_len + n,
                    record: Arc::clone(record),
                }),
        );
        tracing::debug!(
            start = lines.start,
            end = lines.end,
            loaded = records.len(),
            "trace window loaded"
        );

        self.records = records;
        self.loaded_range = lines;
        self.current = 0;
        self.previous = None;
        Ok(())
    }
}

impl TraceSource for TraceWindow {
    fn total(&self) -> usize {
        self.total
    }

    fn record(&self, line: usize) -> Option<Arc<TraceRecord>> {
        self.record_at(line)
    }
}

/// Reads `lines` with a single seek and read, then parses each line.
fn read_window(backing: &Backing, lines: Range<usize>) -> Result<Vec<Loaded>> {
    let Some(span) = backing.index.span_of(lines.clone()) else {
        return Ok(Vec::new());
    };
    let base = span.start;
    let mut file = File::open(&backing.path).map_err(|source| TraceError::Open {
        path: backing.path.clone(),
        source,
    })?;
    let bytes = read_span(&mut file, span).map_err(|source| TraceError::Scan {
        path: backing.path.clone(),
        line: lines.start,
        source,
    })?;

    let mut records = Vec::with_capacity(lines.len());
    for line in lines {
        let Some(span) = backing.index.span(line) else {
            break;
        };
        let raw = &bytes[(span.start - base) as usize..(span.end - base) as usize];
        match parse_bytes(raw) {
            Ok(record) => records.push(Loaded {
                line,
                record: Arc::new(record),
            }),
            Err(error) => {
                tracing::warn!(
                    path = %backing.path.display(),
                    line,
                    error = %error,
                    "skipping malformed trace line"
                );
            }
        }
    }
    Ok(records)
}
