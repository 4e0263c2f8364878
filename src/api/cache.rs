//! Short-lived in-memory response cache with background revalidation.
//!
//! A fresh entry is returned as is. A stale entry is still returned, and a
//! single refresh is spawned for its key. Misses load inline. Failed loads are
//! never stored. Entries untouched for `EVICT_AFTER_TTLS` TTLs are dropped
//! on the next store.
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::error::SourceError;

const EVICT_AFTER_TTLS: u32 = 3;

struct Entry<T> {
    value: T,
    fetched_at: Instant,
    refreshing: bool,
}

pub struct ResponseCache<T> {
    ttl: Duration,
    entries: RwLock<HashMap<String, Entry<T>>>,
}

impl<T> ResponseCache<T>
where
    T: Clone + Send + Sync + 'static,
{
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub async fn get_or_load<F, Fut>(self: &Arc<Self>, key: &str, load: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<T, SourceError>> + Send + 'static,
    {
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(key) {
                if entry.fetched_at.elapsed() < self.ttl {
                    return Ok(entry.value.clone());
                }
                if !entry.refreshing {
                    entry.refreshing = true;
                    debug!(key = %key, "serving stale entry; revalidating");
                    let cache = Arc::clone(self);
                    let key = key.to_string();
                    tokio::spawn(async move { cache.refresh(key, load).await });
                }
                return Ok(entry.value.clone());
            }
        }

        let value = load().await?;
        self.store(key.to_string(), value.clone()).await;
        Ok(value)
    }

    async fn refresh<F, Fut>(&self, key: String, load: F)
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        match load().await {
            Ok(value) => self.store(key, value).await,
            Err(err) => {
                warn!(key = %key, ?err, "background revalidation failed; keeping stale entry");
                if let Some(entry) = self.entries.write().await.get_mut(&key) {
                    entry.refreshing = false;
                }
            }
        }
    }

    async fn store(&self, key: String, value: T) {
        let horizon = self.ttl.saturating_mul(EVICT_AFTER_TTLS);
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.fetched_at.elapsed() < horizon);
        if entries.len() < before {
            debug!(evicted = before - entries.len(), "dropped expired cache entries");
        }
        entries.insert(
            key,
            Entry {
                value,
                fetched_at: Instant::now(),
                refreshing: false,
            },
        );
    }
}
