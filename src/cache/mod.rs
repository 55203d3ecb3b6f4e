//! Read-path cache for posts resolved by slug.
//!
//! The cache is owned by the read path and invalidated explicitly: the sync
//! orchestrator clears it on every store mutation. Slugs are not stable
//! (a rename changes the key while the row survives), so invalidation is a
//! full clear rather than per-key eviction.

use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;
use metrics::counter;

use crate::domain::entities::PostRecord;

pub struct PostCache {
    inner: Option<Mutex<LruCache<String, PostRecord>>>,
}

impl PostCache {
    /// A capacity of zero disables caching entirely.
    pub fn new(capacity: usize) -> Self {
        let inner = NonZeroUsize::new(capacity).map(|capacity| Mutex::new(LruCache::new(capacity)));
        Self { inner }
    }

    pub fn get(&self, slug: &str) -> Option<PostRecord> {
        let inner = self.inner.as_ref()?;
        let mut guard = inner.lock().expect("post cache lock");
        let hit = guard.get(slug).cloned();
        match hit {
            Some(record) => {
                counter!("folio_post_cache_hit_total").increment(1);
                Some(record)
            }
            None => {
                counter!("folio_post_cache_miss_total").increment(1);
                None
            }
        }
    }

    pub fn insert(&self, record: PostRecord) {
        if let Some(inner) = self.inner.as_ref() {
            let mut guard = inner.lock().expect("post cache lock");
            guard.put(record.slug.clone(), record);
        }
    }

    pub fn clear(&self) {
        if let Some(inner) = self.inner.as_ref() {
            let mut guard = inner.lock().expect("post cache lock");
            guard.clear();
        }
    }
}
