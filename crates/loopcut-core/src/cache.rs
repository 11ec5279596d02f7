// Bounded LRU render cache with per-entry TTL (§4.3).
//
// `get` clones the outcome's `Arc<[u8]>` video buffer before releasing the
// lock, so a concurrent eviction can never invalidate bytes already handed
// back to a caller — see the cache-eviction open question in DESIGN.md.

use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

use crate::model::{CacheEntry, RenderOutcome};

pub const DEFAULT_MAX_ENTRIES: usize = 32;
pub const DEFAULT_TTL: Duration = Duration::from_secs(15 * 60);

pub struct RenderCache {
    ttl: Duration,
    inner: Mutex<LruCache<String, CacheEntry>>,
}

impl RenderCache {
    pub fn new(max_entries: usize, ttl: Duration) -> Self {
        let capacity = std::num::NonZeroUsize::new(max_entries.max(1)).unwrap();
        RenderCache { ttl, inner: Mutex::new(LruCache::new(capacity)) }
    }

    /// Returns a live entry's outcome, marked `from_cache=true`. A `get` on a
    /// key with no entry, or an expired entry, is a miss (the expired entry
    /// is evicted on the way out).
    pub fn get(&self, key: &str) -> Option<RenderOutcome> {
        let mut guard = self.inner.lock().unwrap();
        let live = guard
            .get(key)
            .map(|entry| entry.created_at.elapsed() < self.ttl)
            .unwrap_or(false);
        if !live {
            guard.pop(key);
            return None;
        }
        let mut outcome = guard.get(key).unwrap().outcome.clone();
        outcome.from_cache = true;
        Some(outcome)
    }

    /// Unconditional overwrite; last writer wins under concurrent `set`s.
    pub fn set(&self, key: String, outcome: RenderOutcome) {
        let entry = CacheEntry { outcome, created_at: Instant::now() };
        self.inner.lock().unwrap().put(key, entry);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for RenderCache {
    fn default() -> Self {
        RenderCache::new(DEFAULT_MAX_ENTRIES, DEFAULT_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Container, RenderMetrics, RenderResult};
    use std::sync::Arc;

    fn outcome(bytes: &[u8]) -> RenderOutcome {
        RenderOutcome {
            from_cache: false,
            metrics: RenderMetrics {
                decode_time_ms: 0,
                render_time_ms: 0,
                encode_time_ms: 0,
                total_time_ms: 0,
                output_size_bytes: bytes.len() as u64,
                average_frame_processing_ms: 0.0,
            },
            result: RenderResult {
                video: Arc::from(bytes),
                container: Container::Mp4,
                mime_type: "video/mp4",
                duration_ms: 1000,
                frame_rate: 30,
                poster_frame: None,
            },
        }
    }

    #[test]
    fn miss_then_hit() {
        let cache = RenderCache::default();
        assert!(cache.get("k1").is_none());
        cache.set("k1".into(), outcome(b"hello"));
        let hit = cache.get("k1").unwrap();
        assert!(hit.from_cache);
        assert_eq!(&*hit.result.video, b"hello");
    }

    #[test]
    fn ttl_expiry_is_a_miss() {
        let cache = RenderCache::new(8, Duration::from_millis(1));
        cache.set("k1".into(), outcome(b"bytes"));
        std::thread::sleep(Duration::from_millis(5));
        assert!(cache.get("k1").is_none());
    }

    #[test]
    fn eviction_at_capacity() {
        let cache = RenderCache::new(1, DEFAULT_TTL);
        cache.set("a".into(), outcome(b"a"));
        cache.set("b".into(), outcome(b"b"));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn set_overwrites_last_writer_wins() {
        let cache = RenderCache::default();
        cache.set("k".into(), outcome(b"first"));
        cache.set("k".into(), outcome(b"second"));
        assert_eq!(&*cache.get("k").unwrap().result.video, b"second");
    }
}
