//! Read-through cache of the treasury admin set

use crate::core::ChainReader;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, warn};

struct Cached {
    admins: Vec<String>,
    fetched_at: Instant,
}

/// Current admin list, refreshed from the chain at most once per TTL
///
/// Chain failures fall back to the last cached list, then to the configured
/// list. Admin and role events call `invalidate` so the next read refetches.
pub struct AdminDirectory {
    reader: Arc<dyn ChainReader>,
    ttl: Duration,
    fallback: Vec<String>,
    cache: RwLock<Option<Cached>>,
}

impl AdminDirectory {
    pub fn new(reader: Arc<dyn ChainReader>, ttl: Duration, fallback: Vec<String>) -> Self {
        Self {
            reader,
            ttl,
            fallback,
            cache: RwLock::new(None),
        }
    }

    pub async fn admins(&self) -> Vec<String> {
        if let Some(cached) = self.cache.read().await.as_ref() {
            if cached.fetched_at.elapsed() < self.ttl {
                return cached.admins.clone();
            }
        }

        match self.reader.admins().await {
            Ok(admins) => {
                debug!(count = admins.len(), "refreshed treasury admins");
                *self.cache.write().await = Some(Cached {
                    admins: admins.clone(),
                    fetched_at: Instant::now(),
                });
                admins
            }
            Err(e) => {
                warn!(error = %e, "admin list read failed, using fallback");
                match self.cache.read().await.as_ref() {
                    Some(stale) => stale.admins.clone(),
                    None => self.fallback.clone(),
                }
            }
        }
    }

    pub async fn invalidate(&self) {
        *self.cache.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ChainError, IndexerResult};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingReader {
        calls: AtomicUsize,
        failing: AtomicBool,
    }

    #[async_trait]
    impl ChainReader for CountingReader {
        async fn admins(&self) -> IndexerResult<Vec<String>> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.failing.load(Ordering::SeqCst) {
                return Err(ChainError::Request("node down".into()).into());
            }
            Ok(vec![format!("SP_ADMIN_{}", n)])
        }

        async fn approval_threshold(&self) -> IndexerResult<u64> {
            Ok(2)
        }
    }

    #[tokio::test]
    async fn test_cached_within_ttl_and_refetched_after_invalidate() {
        let reader = Arc::new(CountingReader::default());
        let directory = AdminDirectory::new(reader.clone(), Duration::from_secs(60), vec![]);

        assert_eq!(directory.admins().await, vec!["SP_ADMIN_0"]);
        assert_eq!(directory.admins().await, vec!["SP_ADMIN_0"]);
        assert_eq!(reader.calls.load(Ordering::SeqCst), 1);

        directory.invalidate().await;
        assert_eq!(directory.admins().await, vec!["SP_ADMIN_1"]);
    }

    #[tokio::test]
    async fn test_failure_uses_fallback() {
        let reader = Arc::new(CountingReader::default());
        reader.failing.store(true, Ordering::SeqCst);
        let directory = AdminDirectory::new(reader, Duration::ZERO, vec!["SP_FALLBACK".to_string()]);

        assert_eq!(directory.admins().await, vec!["SP_FALLBACK"]);
    }
}
