/*!
 * Site Configuration Consumer
 * Loads the singleton configuration document for public pages and keeps it
 * for a bounded time
 */
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::content::models::{SiteConfig, SITE_CONFIG, SITE_CONFIG_ID};
use crate::gateway::AdminGateway;
use crate::store::get_typed;

/// Where the cache is in its lifecycle.
#[derive(Debug, Clone)]
enum Phase {
    Uninitialized,
    Loading,
    Ready { config: Arc<SiteConfig>, loaded_at: Instant },
}

/// Observable state, for health output and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePhase {
    Uninitialized,
    Loading,
    Ready,
}

pub struct SiteConfigCache {
    gateway: Arc<AdminGateway>,
    ttl: Duration,
    phase: std::sync::Mutex<Phase>,
    /// Held for the duration of a load so concurrent readers share one fetch.
    load: Mutex<()>,
    /// Bumped by `invalidate`; a load started under an older generation is
    /// returned to its caller but never cached.
    generation: AtomicU64,
}

impl SiteConfigCache {
    pub fn new(gateway: Arc<AdminGateway>, ttl: Duration) -> Self {
        Self {
            gateway,
            ttl,
            phase: std::sync::Mutex::new(Phase::Uninitialized),
            load: Mutex::new(()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn phase(&self) -> CachePhase {
        match *self.lock_phase() {
            Phase::Uninitialized => CachePhase::Uninitialized,
            Phase::Loading => CachePhase::Loading,
            Phase::Ready { .. } => CachePhase::Ready,
        }
    }

    /// The current configuration. Never fails: when the store cannot be read
    /// the default (maintenance off) is returned and nothing is cached.
    pub async fn current(&self) -> Arc<SiteConfig> {
        if let Some(config) = self.fresh() {
            return config;
        }

        let _loading = self.load.lock().await;
        // Another caller may have finished loading while we waited.
        if let Some(config) = self.fresh() {
            return config;
        }

        let previous = std::mem::replace(&mut *self.lock_phase(), Phase::Loading);
        let generation = self.generation.load(Ordering::SeqCst);

        match self.fetch().await {
            Ok(config) => {
                let config = Arc::new(config);
                let mut phase = self.lock_phase();
                if self.generation.load(Ordering::SeqCst) == generation {
                    *phase = Phase::Ready {
                        config: config.clone(),
                        loaded_at: Instant::now(),
                    };
                    tracing::debug!("Site configuration loaded");
                } else {
                    *phase = Phase::Uninitialized;
                    tracing::debug!("Site configuration changed during load, not caching");
                }
                config
            }
            Err(reason) => {
                tracing::warn!("Failed to load site configuration, using defaults: {}", reason);
                let stale = self.generation.load(Ordering::SeqCst) != generation;
                *self.lock_phase() = match previous {
                    Phase::Ready { .. } if !stale => previous,
                    _ => Phase::Uninitialized,
                };
                Arc::new(SiteConfig::default())
            }
        }
    }

    /// Drop the cached value so the next read goes to the store.
    pub fn invalidate(&self) {
        let mut phase = self.lock_phase();
        self.generation.fetch_add(1, Ordering::SeqCst);
        *phase = Phase::Uninitialized;
        tracing::debug!("Site configuration cache invalidated");
    }

    fn fresh(&self) -> Option<Arc<SiteConfig>> {
        match &*self.lock_phase() {
            Phase::Ready { config, loaded_at } if loaded_at.elapsed() < self.ttl => {
                Some(config.clone())
            }
            _ => None,
        }
    }

    async fn fetch(&self) -> Result<SiteConfig, String> {
        let store = self.gateway.store().map_err(|e| e.to_string())?;
        let config = get_typed::<SiteConfig>(store.as_ref(), SITE_CONFIG, SITE_CONFIG_ID)
            .await
            .map_err(|e| e.to_string())?;
        Ok(config.unwrap_or_default())
    }

    fn lock_phase(&self) -> std::sync::MutexGuard<'_, Phase> {
        self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Connection;
    use crate::store::{Document, DocumentStore, MemoryStore, Query, StoreError, StoredDocument};
    use crate::test_support::StaticIdentity;
    use async_trait::async_trait;
    use serde_json::json;
    use tokio::sync::Notify;

    fn connected(store: Arc<dyn DocumentStore>) -> Arc<AdminGateway> {
        Arc::new(AdminGateway::with_connection(Connection::new(
            store,
            Arc::new(StaticIdentity::default()),
        )))
    }

    /// Memory store whose reads wait for `release` after signalling `entered`.
    #[derive(Default)]
    struct GatedStore {
        inner: MemoryStore,
        entered: Notify,
        release: Notify,
    }

    #[async_trait]
    impl DocumentStore for GatedStore {
        async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
            self.entered.notify_one();
            self.release.notified().await;
            self.inner.get(collection, id).await
        }

        async fn add(&self, collection: &str, data: Document) -> Result<String, StoreError> {
            self.inner.add(collection, data).await
        }

        async fn set(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
            self.inner.set(collection, id, data).await
        }

        async fn merge(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
            self.inner.merge(collection, id, data).await
        }

        async fn update(&self, collection: &str, id: &str, data: Document) -> Result<(), StoreError> {
            self.inner.update(collection, id, data).await
        }

        async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
            self.inner.delete(collection, id).await
        }

        async fn query(
            &self,
            collection: &str,
            query: &Query,
        ) -> Result<Vec<StoredDocument>, StoreError> {
            self.inner.query(collection, query).await
        }

        async fn increment(
            &self,
            collection: &str,
            id: &str,
            field: &str,
            by: i64,
        ) -> Result<(), StoreError> {
            self.inner.increment(collection, id, field, by).await
        }

        async fn ping(&self) -> Result<(), StoreError> {
            self.inner.ping().await
        }
    }

    async fn save_maintenance(store: &MemoryStore, on: bool) {
        store
            .merge(
                SITE_CONFIG,
                SITE_CONFIG_ID,
                json!({ "maintenanceMode": on }).as_object().cloned().unwrap(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_unconfigured_gateway_falls_back_without_caching() {
        let cache = SiteConfigCache::new(Arc::new(AdminGateway::new()), Duration::from_secs(60));
        let config = cache.current().await;
        assert!(!config.maintenance_mode);
        assert_eq!(cache.phase(), CachePhase::Uninitialized);
    }

    #[tokio::test]
    async fn test_missing_document_reads_as_default() {
        let cache = SiteConfigCache::new(
            connected(Arc::new(MemoryStore::new())),
            Duration::from_secs(60),
        );
        assert!(!cache.current().await.maintenance_mode);
        assert_eq!(cache.phase(), CachePhase::Ready);
    }

    #[tokio::test]
    async fn test_cached_until_invalidated() {
        let store = Arc::new(MemoryStore::new());
        save_maintenance(&store, true).await;
        let cache = SiteConfigCache::new(connected(store.clone()), Duration::from_secs(60));

        assert!(cache.current().await.maintenance_mode);

        save_maintenance(&store, false).await;
        assert!(cache.current().await.maintenance_mode, "served from cache");

        cache.invalidate();
        assert!(!cache.current().await.maintenance_mode);
    }

    #[tokio::test]
    async fn test_expired_entry_is_reloaded() {
        let store = Arc::new(MemoryStore::new());
        save_maintenance(&store, true).await;
        let cache = SiteConfigCache::new(connected(store.clone()), Duration::ZERO);

        assert!(cache.current().await.maintenance_mode);
        save_maintenance(&store, false).await;
        assert!(!cache.current().await.maintenance_mode);
    }

    #[tokio::test]
    async fn test_invalidate_during_load_is_not_overwritten() {
        let store = Arc::new(GatedStore::default());
        save_maintenance(&store.inner, false).await;
        let cache = Arc::new(SiteConfigCache::new(
            connected(store.clone()),
            Duration::from_secs(60),
        ));

        let reader = tokio::spawn({
            let cache = cache.clone();
            async move { cache.current().await }
        });
        store.entered.notified().await;
        assert_eq!(cache.phase(), CachePhase::Loading);

        save_maintenance(&store.inner, true).await;
        cache.invalidate();
        store.release.notify_one();

        // The in-flight read answers with what it saw, but does not cache it.
        assert!(!reader.await.unwrap().maintenance_mode);
        assert_eq!(cache.phase(), CachePhase::Uninitialized);

        store.release.notify_one();
        assert!(cache.current().await.maintenance_mode);
        assert_eq!(cache.phase(), CachePhase::Ready);
    }
}
