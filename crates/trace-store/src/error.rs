use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TraceError>;

/// A read that failed partway through a trace stream. `line` is the 0-based line that was being
/// read.
#[derive(Debug, Error)]
#[error("read failed at line {line}: {source}")]
pub struct ScanError {
    pub line: usize,
    #[source]
    pub source: io::Error,
}

/// Failures that prevent a trace session from being created.
///
/// Malformed lines are not represented here: they surface as
/// [`crate::RecordParseError`] from the parser and as `None` from the cache and
/// the window.
#[derive(Debug, Error)]
pub enum TraceError {
    #[error("failed to open trace {}: {source}", .path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A read failed while building the line index. `line` is the 0-based line
    /// that was being scanned.
    #[error("failed to scan trace {} at line {line}: {source}", .path.display())]
    Scan {
        path: PathBuf,
        line: usize,
        #[source]
        source: io::Error,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to spawn prefetch worker: {0}")]
    Spawn(#[source] io::Error),
}
