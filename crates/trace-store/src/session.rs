use std::path::Path;
use std::sync::Arc;

use crate::cache::{CacheConfig, PrefetchingCache};
use crate::record::TraceRecord;
use crate::Result;

/// A cursor over a [`PrefetchingCache`]; the handle a front end holds for one open trace.
///
/// Unlike [`crate::TraceWindow`] the cursor can sit on any line of the file, and every move is
/// served by the cache.
pub struct TraceSession {
    cache: PrefetchingCache,
    position: usize,
}

impl TraceSession {
    pub fn open(path: impl AsRef<Path>, config: CacheConfig) -> Result<Self> {
        Ok(Self::from_cache(PrefetchingCache::open(path, config)?))
    }

    pub fn from_cache(cache: PrefetchingCache) -> Self {
        Self { cache, position: 0 }
    }

    pub fn cache(&self) -> &PrefetchingCache {
        &self.cache
    }

    pub fn total(&self) -> usize {
        self.cache.total()
    }

    pub fn record(&self, line: usize) -> Option<Arc<TraceRecord>> {
        self.cache.get_line(line)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn current(&self) -> Option<Arc<TraceRecord>> {
        self.cache.get_line(self.position)
    }

    /// Record of the line before the cursor, for diffing consecutive snapshots.
    pub fn previous(&self) -> Option<Arc<TraceRecord>> {
        self.position
            .checked_sub(1)
            .and_then(|line| self.cache.get_line(line))
    }

    pub fn next(&mut self) -> bool {
        if self.position + 1 >= self.total() {
            return false;
        }
        self.position += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if self.position == 0 {
            return false;
        }
        self.position -= 1;
        true
    }

    pub fn go_to(&mut self, line: usize) -> bool {
        if line >= self.total() {
            return false;
        }
        self.position = line;
        true
    }

    pub fn close(&mut self) {
        self.cache.close();
    }
}
