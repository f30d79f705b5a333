//! Random-access storage for instruction execution traces.
//!
//! A trace is a text file with one `|`-delimited register snapshot per executed instruction.
//! Traces routinely run to millions of lines, so nothing here loads a whole file:
//!
//! - [`parse_line`]: one raw line to a [`TraceRecord`], all-or-nothing
//! - [`LineIndex`]: line number to byte offset table from a single forward scan
//! - [`PrefetchingCache`]: bounded, thread-safe record cache with background neighborhood warming
//! - [`TraceWindow`]: cursor over one eagerly parsed window, for sequential stepping
//! - [`TraceSession`]: cursor over a [`PrefetchingCache`]
//! - [`RecordStream`]: single-pass parse of a whole trace, for validation and live ingestion
//!
//! Malformed lines never fail a session. They are logged through `tracing` and read back as
//! `None`, the same as a line that is out of range.

mod cache;
mod error;
mod index;
mod record;
mod session;
mod source;
mod stream;
mod window;

pub use cache::{CacheConfig, CacheStats, PrefetchingCache};
pub use error::{Result, ScanError, TraceError};
pub use index::LineIndex;
pub use record::{
    parse_bytes, parse_line, parse_u64_auto, Field, NumberError, RecordParseError,
    RegisterChange, TraceRecord, FIELD_COUNT, REGISTER_COUNT,
};
pub use session::TraceSession;
pub use source::TraceSource;
pub use stream::{RecordStream, StreamedLine};
pub use window::{TraceWindow, WindowConfig};

#[cfg(test)]
mod testutil;

#[cfg(all(test, not(target_arch = "wasm32")))]
mod proptests;
