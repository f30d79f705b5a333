use std::collections::HashMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::thread::{self, JoinHandle};

use crate::index::LineIndex;
use crate::record::{parse_line, TraceRecord};
use crate::source::TraceSource;
use crate::{Result, TraceError};

/// Lines between progress log messages while indexing.
const SCAN_PROGRESS_INTERVAL: usize = 100_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheConfig {
    /// Maximum number of parsed records held at once.
    pub capacity: usize,
    /// Width of the neighborhood warmed around each touched line. 0 disables warming.
    pub prefetch_window: usize,
    /// Depth of the touched-line queue feeding the prefetch worker.
    pub queue_depth: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4096,
            prefetch_window: 200,
            queue_depth: 100,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub inserts: u64,
    pub evictions: u64,
    pub parse_failures: u64,
    pub read_failures: u64,
    pub prefetched: u64,
    pub dropped_signals: u64,
}

#[derive(Default)]
struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    inserts: AtomicU64,
    evictions: AtomicU64,
    parse_failures: AtomicU64,
    read_failures: AtomicU64,
    prefetched: AtomicU64,
    dropped_signals: AtomicU64,
}

impl CacheCounters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            inserts: self.inserts.load(Ordering::Relaxed),
            evictions: self.evictions.load(Ordering::Relaxed),
            parse_failures: self.parse_failures.load(Ordering::Relaxed),
            read_failures: self.read_failures.load(Ordering::Relaxed),
            prefetched: self.prefetched.load(Ordering::Relaxed),
            dropped_signals: self.dropped_signals.load(Ordering::Relaxed),
        }
    }
}

/// Bounded cache of parsed trace records with background neighborhood prefetch.
///
/// Records are loaded on demand by seeking to the line's indexed byte span. Every access sends
/// the touched line to a single prefetch thread, which warms the surrounding lines. The send is
/// best-effort: when the queue is full the signal is dropped and the caller never blocks.
///
/// Eviction is *not* LRU. Once the cache grows past `capacity` it is cut back to
/// `capacity / 2`, keeping the entries closest to the line whose insertion triggered eviction.
pub struct PrefetchingCache {
    shared: Arc<Shared>,
    signals: Option<SyncSender<usize>>,
    worker: Option<JoinHandle<()>>,
}

struct Shared {
    path: PathBuf,
    index: LineIndex,
    config: CacheConfig,
    entries: RwLock<HashMap<usize, Arc<TraceRecord>>>,
    counters: CacheCounters,
    stop: AtomicBool,
}

impl PrefetchingCache {
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(TraceError::InvalidConfig("capacity must be > 0"));
        }
        if config.queue_depth == 0 {
            return Err(TraceError::InvalidConfig("queue_depth must be > 0"));
        }

        let path = path.as_ref();
        let index = LineIndex::build_with_progress(path, SCAN_PROGRESS_INTERVAL, |lines| {
            tracing::info!(lines, path = %path.display(), "scanning trace");
        })?;

        let shared = Arc::new(Shared {
            path: path.to_path_buf(),
            index,
            config,
            entries: RwLock::new(HashMap::new()),
            counters: CacheCounters::default(),
            stop: AtomicBool::new(false),
        });

        let (tx, rx) = mpsc::sync_channel(config.queue_depth);
        let worker = thread::Builder::new()
            .name("trace-prefetch".to_string())
            .spawn({
                let shared = Arc::clone(&shared);
                move || run_prefetch_worker(shared, rx)
            })
            .map_err(TraceError::Spawn)?;

        let cache = Self {
            shared,
            signals: Some(tx),
            worker: Some(worker),
        };
        cache.signal(0);
        Ok(cache)
    }

    /// Returns the record at `line`, or `None` when the line is out of range, unreadable or
    /// malformed.
    pub fn get_line(&self, line: usize) -> Option<Arc<TraceRecord>> {
        if line >= self.total() {
            return None;
        }

        if let Some(record) = self.shared.cached(line) {
            CacheCounters::bump(&self.shared.counters.hits, 1);
            self.signal(line);
            return Some(record);
        }

        CacheCounters::bump(&self.shared.counters.misses, 1);
        let record = self.shared.load(line)?;
        self.shared.insert(line, Arc::clone(&record), line);
        self.signal(line);
        Some(record)
    }

    pub fn total(&self) -> usize {
        self.shared.index.len()
    }

    pub fn len(&self) -> usize {
        self.shared.read_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, line: usize) -> bool {
        self.shared.read_entries().contains_key(&line)
    }

    pub fn capacity(&self) -> usize {
        self.shared.config.capacity
    }

    pub fn config(&self) -> CacheConfig {
        self.shared.config
    }

    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    pub fn index(&self) -> &LineIndex {
        &self.shared.index
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.counters.snapshot()
    }

    pub fn clear(&self) {
        self.shared.write_entries().clear();
    }

    pub fn is_closed(&self) -> bool {
        self.worker.is_none()
    }

    /// Stops the prefetch worker and waits for it to exit. Pending signals are dropped; the
    /// worker checks the stop flag between lines, so this waits for at most one line load.
    ///
    /// The cache keeps serving on-demand loads after closing. Calling this more than once is a
    /// no-op.
    pub fn close(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        drop(self.signals.take());
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(path = %self.shared.path.display(), "prefetch worker panicked");
            }
        }
    }

    fn signal(&self, line: usize) {
        let Some(signals) = &self.signals else {
            return;
        };
        match signals.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                CacheCounters::bump(&self.shared.counters.dropped_signals, 1);
            }
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl Drop for PrefetchingCache {
    fn drop(&mut self) {
        self.close();
    }
}

impl TraceSource for PrefetchingCache {
    fn total(&self) -> usize {
        PrefetchingCache::total(self)
    }

    fn record(&self, line: usize) -> Option<Arc<TraceRecord>> {
        self.get_line(line)
    }
}

impl Shared {
    // The map only holds immutable records, so a panic while it was locked cannot leave it in a
    // torn state.
    fn read_entries(&self) -> RwLockReadGuard<'_, HashMap<usize, Arc<TraceRecord>>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_entries(&self) -> RwLockWriteGuard<'_, HashMap<usize, Arc<TraceRecord>>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    fn cached(&self, line: usize) -> Option<Arc<TraceRecord>> {
        self.read_entries().get(&line).cloned()
    }

    /// Reads and parses one line. Failures are logged and counted, never retried.
    fn load(&self, line: usize) -> Option<Arc<TraceRecord>> {
        let text =
            File::open(&self.path).and_then(|mut file| self.index.read_line(&mut file, line));
        let text = match text {
            Ok(Some(text)) => text,
            Ok(None) => return None,
            Err(err) => {
                CacheCounters::bump(&self.counters.read_failures, 1);
                tracing::warn!(
                    path = %self.path.display(),
                    line,
                    error = %err,
                    "failed to read trace line"
                );
                return None;
            }
        };

        match parse_line(&text) {
            Ok(record) => Some(Arc::new(record)),
            Err(err) => {
                CacheCounters::bump(&self.counters.parse_failures, 1);
                tracing::warn!(
                    path = %self.path.display(),
                    line,
                    error = %err,
                    "skipping malformed trace line"
                );
                None
            }
        }
    }

    fn insert(&self, line: usize, record: Arc<TraceRecord>, focus: usize) {
        let mut entries = self.write_entries();
        entries.insert(line, record);
        CacheCounters::bump(&self.counters.inserts, 1);
        if entries.len() > self.config.capacity {
            let evicted = evict_far_from(&mut entries, self.config.capacity / 2, focus);
            CacheCounters::bump(&self.counters.evictions, evicted as u64);
        }
    }

    fn prefetch_around(&self, touched: usize) {
        let window = self.config.prefetch_window;
        if window == 0 {
            return;
        }
        let half = window / 2;
        let start = touched.saturating_sub(half);
        let end = touched
            .saturating_add(window - half)
            .min(self.index.len());

        for line in start..end {
            if self.stopped() {
                return;
            }
            if self.read_entries().contains_key(&line) {
                continue;
            }
            if let Some(record) = self.load(line) {
                self.insert(line, record, touched);
                CacheCounters::bump(&self.counters.prefetched, 1);
            }
        }
    }
}

/// Shrinks `entries` to `target` by dropping the lines farthest from `focus`. Returns how many
/// entries were removed.
fn evict_far_from(
    entries: &mut HashMap<usize, Arc<TraceRecord>>,
    target: usize,
    focus: usize,
) -> usize {
    if entries.len() <= target {
        return 0;
    }
    let mut lines: Vec<usize> = entries.keys().copied().collect();
    lines.select_nth_unstable_by_key(target, |line| line.abs_diff(focus));
    for line in &lines[target..] {
        entries.remove(line);
    }
    lines.len() - target
}

fn run_prefetch_worker(shared: Arc<Shared>, signals: Receiver<usize>) {
    while let Ok(touched) = signals.recv() {
        if shared.stopped() {
            break;
        }
        shared.prefetch_around(touched);
    }
    tracing::debug!(path = %shared.path.display(), "prefetch worker stopped");
}
