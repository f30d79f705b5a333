use std::sync::Arc;

use crate::record::TraceRecord;

/// Random access to the parsed records of one trace.
///
/// [`crate::PrefetchingCache`] serves any line of the file; [`crate::TraceWindow`] serves only
/// the lines of its loaded window. Both return `None` for lines they cannot produce, whether the
/// line is out of range, not loaded or malformed.
pub trait TraceSource {
    /// Number of lines in the trace.
    fn total(&self) -> usize;

    fn record(&self, line: usize) -> Option<Arc<TraceRecord>>;
}
