//! Time-boxed memoization keyed by namespace + key.
//!
//! The admin dashboard leans on repeated reads of slow-to-assemble values
//! (customer insight reports, Graph API list reads). This wraps a moka future
//! cache with a (namespace, key) scheme so whole namespaces can be dropped
//! when an admin mutation invalidates the underlying inputs.

use moka::future::Cache;
use serde_json::Value;
use std::time::Duration;

#[derive(Clone)]
pub struct TtlCache {
    inner: Cache<(String, String), Value>,
}

impl TtlCache {
    /// Create a cache whose entries expire `ttl` after insertion.
    pub fn new(ttl: Duration, capacity: u64) -> Self {
        let inner = Cache::builder()
            .max_capacity(capacity)
            .time_to_live(ttl)
            .support_invalidation_closures()
            .build();
        Self { inner }
    }

    pub async fn get(&self, namespace: &str, key: &str) -> Option<Value> {
        self.inner.get(&(namespace.to_string(), key.to_string())).await
    }

    pub async fn insert(&self, namespace: &str, key: &str, value: Value) {
        self.inner.insert((namespace.to_string(), key.to_string()), value).await;
    }

    /// Drop every entry in a namespace. Used when a mutation changes the
    /// inputs a namespace was computed from.
    pub async fn invalidate_namespace(&self, namespace: &str) {
        let ns = namespace.to_string();
        // invalidate_entries_if only needs the predicate; eviction is lazy
        let _ = self.inner.invalidate_entries_if(move |(entry_ns, _), _| *entry_ns == ns);
    }

    pub async fn invalidate(&self, namespace: &str, key: &str) {
        self.inner.invalidate(&(namespace.to_string(), key.to_string())).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_get_after_insert() {
        let cache = TtlCache::new(Duration::from_secs(60), 100);

        cache.insert("insights", "customer-1", json!({"score": 42})).await;

        let hit = cache.get("insights", "customer-1").await;
        assert_eq!(hit, Some(json!({"score": 42})));

        // Same key under a different namespace is a distinct entry
        assert!(cache.get("graph", "customer-1").await.is_none());
    }

    #[tokio::test]
    async fn test_expiry() {
        let cache = TtlCache::new(Duration::from_millis(20), 100);

        cache.insert("insights", "customer-1", json!(1)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(cache.get("insights", "customer-1").await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = TtlCache::new(Duration::from_secs(60), 100);

        cache.insert("insights", "customer-1", json!(1)).await;
        cache.invalidate("insights", "customer-1").await;

        assert!(cache.get("insights", "customer-1").await.is_none());
    }
}
