//! Read-through TTL cache for discovery lookups.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

use mcp_core::{traits::ServiceDiscovery, types::RegistryEntry, Result};

/// Cached value with the time it was fetched.
#[derive(Debug, Clone)]
struct CacheEntry<T> {
    value: T,
    fetched_at: Instant,
}

impl<T> CacheEntry<T> {
    fn new(value: T) -> Self {
        Self {
            value,
            fetched_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.fetched_at.elapsed() < ttl
    }
}

/// Discovery backend wrapper that caches catalog and health lookups.
///
/// A miss, or an entry older than the TTL, triggers a fresh fetch from the
/// inner backend. Concurrent misses on the same key each fetch independently;
/// the slot is only locked while the result is stored. Failures are never
/// cached.
pub struct CachedDiscovery {
    inner: Arc<dyn ServiceDiscovery>,
    ttl: Duration,
    catalog: RwLock<Option<CacheEntry<Vec<String>>>>,
    instances: DashMap<String, CacheEntry<Vec<RegistryEntry>>>,
}

impl CachedDiscovery {
    /// Wrap `inner` with a cache whose entries live for `ttl`.
    pub fn new(inner: Arc<dyn ServiceDiscovery>, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            catalog: RwLock::new(None),
            instances: DashMap::new(),
        }
    }

    /// Drop every cached entry.
    pub async fn invalidate(&self) {
        *self.catalog.write().await = None;
        self.instances.clear();
    }

    /// Remove expired instance entries.
    ///
    /// Lookups never serve stale slots, but without a periodic sweep the slots
    /// of services that stop being queried stay allocated.
    pub fn cleanup(&self) {
        let ttl = self.ttl;
        let before = self.instances.len();
        self.instances.retain(|_, v| v.is_fresh(ttl));
        let evicted = before.saturating_sub(self.instances.len());
        if evicted > 0 {
            tracing::debug!(evicted, "Evicted expired discovery cache entries");
        }
    }
}

#[async_trait]
impl ServiceDiscovery for CachedDiscovery {
    async fn list_services(&self) -> Result<Vec<String>> {
        if let Some(entry) = self.catalog.read().await.as_ref() {
            if entry.is_fresh(self.ttl) {
                tracing::debug!("Discovery cache hit: catalog");
                return Ok(entry.value.clone());
            }
        }

        let services = self.inner.list_services().await?;
        *self.catalog.write().await = Some(CacheEntry::new(services.clone()));
        Ok(services)
    }

    async fn healthy_instances(&self, name: &str) -> Result<Vec<RegistryEntry>> {
        if let Some(entry) = self.instances.get(name) {
            if entry.is_fresh(self.ttl) {
                tracing::debug!(service = %name, "Discovery cache hit: instances");
                return Ok(entry.value.clone());
            }
        }

        let instances = self.inner.healthy_instances(name).await?;
        self.instances
            .insert(name.to_string(), CacheEntry::new(instances.clone()));
        Ok(instances)
    }
}
