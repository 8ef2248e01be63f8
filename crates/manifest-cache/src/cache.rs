//! Compiled-manifest cache using moka
//!
//! Keyed by module id. Only successful compilations are stored, so a failed
//! load never blocks a later retry.

use manifest_model::CompiledManifest;
use moka::future::Cache;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Statistics for cache monitoring
#[derive(Debug, Clone, Copy, Default)]
pub struct CacheStats {
    /// Number of entries in cache
    pub entry_count: u64,
}

/// Module id → compiled manifest
#[derive(Debug, Clone)]
pub struct ManifestCache {
    inner: Cache<String, Arc<CompiledManifest>>,
}

impl ManifestCache {
    /// Create new cache with max capacity
    #[inline]
    #[must_use]
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: Cache::new(max_capacity),
        }
    }

    /// Create cache with time-based expiration
    #[inline]
    #[must_use]
    pub fn with_ttl(max_capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(ttl)
                .build(),
        }
    }

    /// Insert compiled manifest
    #[inline]
    pub async fn insert(&self, module_id: &str, compiled: Arc<CompiledManifest>) {
        self.inner.insert(module_id.to_string(), compiled).await;
    }

    /// Get compiled manifest
    #[inline]
    #[must_use]
    pub async fn get(&self, module_id: &str) -> Option<Arc<CompiledManifest>> {
        self.inner.get(module_id).await
    }

    /// Try to get or compute the compiled manifest
    ///
    /// Errors are returned to the caller and nothing is cached.
    pub async fn try_get_or_insert_with<E, F, Fut>(
        &self,
        module_id: &str,
        f: F,
    ) -> Result<Arc<CompiledManifest>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<CompiledManifest, E>>,
    {
        if let Some(cached) = self.get(module_id).await {
            return Ok(cached);
        }

        let compiled = Arc::new(f().await?);
        self.insert(module_id, Arc::clone(&compiled)).await;

        Ok(compiled)
    }

    /// Invalidate cache entry
    #[inline]
    pub async fn invalidate(&self, module_id: &str) {
        self.inner.invalidate(module_id).await;
    }

    /// Invalidate all entries
    #[inline]
    pub fn invalidate_all(&self) {
        self.inner.invalidate_all();
    }

    /// Check if module is cached
    #[inline]
    #[must_use]
    pub async fn contains(&self, module_id: &str) -> bool {
        self.inner.get(module_id).await.is_some()
    }

    /// Get cache statistics
    #[inline]
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.inner.entry_count(),
        }
    }
}

impl Default for ManifestCache {
    /// Create cache with default capacity (64 modules)
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use manifest_model::Manifest;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn compiled() -> CompiledManifest {
        CompiledManifest::compile(Manifest::default()).unwrap()
    }

    #[tokio::test]
    async fn insert_and_get() {
        let cache = ManifestCache::new(8);
        cache.insert("shop", Arc::new(compiled())).await;
        assert!(cache.get("shop").await.is_some());
        assert!(cache.get("crm").await.is_none());
    }

    #[tokio::test]
    async fn get_or_insert_computes_once() {
        let cache = ManifestCache::new(8);
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let result: Result<_, ()> = cache
                .try_get_or_insert_with("shop", || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(compiled())
                })
                .await;
            assert!(result.is_ok());
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn errors_are_not_cached() {
        let cache = ManifestCache::new(8);
        let failed: Result<_, &str> = cache
            .try_get_or_insert_with("shop", || async { Err("boom") })
            .await;
        assert!(failed.is_err());
        assert!(!cache.contains("shop").await);

        let retried: Result<_, &str> = cache
            .try_get_or_insert_with("shop", || async { Ok(compiled()) })
            .await;
        assert!(retried.is_ok());
        assert!(cache.contains("shop").await);
    }

    #[tokio::test]
    async fn invalidation() {
        let cache = ManifestCache::default();
        cache.insert("shop", Arc::new(compiled())).await;
        cache.invalidate("shop").await;
        assert!(!cache.contains("shop").await);
    }
}
