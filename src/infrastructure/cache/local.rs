use std::{collections::HashMap, sync::Arc, time::Duration};

use moka::future::Cache;

use crate::{config::CacheConfig, infrastructure::db::entities::ai_provider};

pub struct LocalCache {
    provider_cache: Cache<i32, Arc<ai_provider::Model>>,
    settings_cache: Cache<String, Arc<HashMap<String, String>>>,
    lease_cache: Cache<String, Arc<String>>,
}

impl LocalCache {
    pub fn new(cache_config: &CacheConfig, lease_ttl: Duration) -> Self {
        Self {
            provider_cache: Cache::builder()
                .max_capacity(cache_config.local_max_capacity)
                .time_to_live(cache_config.local_config_ttl)
                .build(),

            settings_cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(cache_config.local_config_ttl)
                .build(),

            lease_cache: Cache::builder()
                .max_capacity(64)
                .time_to_live(lease_ttl)
                .build(),
        }
    }

    pub async fn get_provider(&self, id: i32) -> Option<Arc<ai_provider::Model>> {
        self.provider_cache.get(&id).await
    }

    pub async fn set_provider(&self, provider: ai_provider::Model) -> Arc<ai_provider::Model> {
        let provider = Arc::new(provider);
        self.provider_cache
            .insert(provider.id, provider.clone())
            .await;
        provider
    }

    pub async fn invalidate_provider(&self, id: i32) {
        self.provider_cache.invalidate(&id).await;
    }

    pub async fn get_settings(&self, key: &str) -> Option<Arc<HashMap<String, String>>> {
        self.settings_cache.get(key).await
    }

    pub async fn set_settings(&self, key: String, settings: HashMap<String, String>) {
        self.settings_cache.insert(key, Arc::new(settings)).await;
    }

    pub async fn invalidate_settings(&self, key: &str) {
        self.settings_cache.invalidate(key).await;
    }

    /// Holds `key` for `owner` until released or expired. Returns whether `owner` got it.
    pub async fn try_acquire_lease(&self, key: &str, owner: &str) -> bool {
        let owner = owner.to_string();
        let entry = self
            .lease_cache
            .entry(key.to_string())
            .or_insert_with(async { Arc::new(owner.clone()) })
            .await;

        entry.is_fresh() || entry.value().as_str() == owner
    }

    /// Drops the lease only while `owner` still holds it.
    pub async fn release_lease(&self, key: &str, owner: &str) {
        if self
            .lease_cache
            .get(key)
            .await
            .is_some_and(|holder| holder.as_str() == owner)
        {
            self.lease_cache.invalidate(key).await;
        }
    }
}
