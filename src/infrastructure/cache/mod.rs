pub mod keys;
pub mod local;
pub mod redis;

use std::time::Duration;

use crate::config::Config;
use crate::error::Result;
use crate::infrastructure::cache::keys::CacheKey;
use crate::infrastructure::cache::local::LocalCache;
use crate::infrastructure::cache::redis::RedisCache;

pub struct Cache {
    pub local: LocalCache,
    pub redis: Option<RedisCache>,
    lease_ttl: Duration,
}

impl Cache {
    pub async fn init(config: &Config) -> Result<Self> {
        let redis = match &config.cache.redis_url {
            Some(url) => Some(RedisCache::connect(url, &config.cache).await?),
            None => None,
        };

        Ok(Self {
            local: LocalCache::new(&config.cache, config.scheduler.lease_ttl),
            redis,
            lease_ttl: config.scheduler.lease_ttl,
        })
    }

    /// Advisory lease for a scheduler concern. Shared through Redis when configured.
    pub async fn try_acquire_lease(&self, concern: &str, owner: &str) -> Result<bool> {
        let key = CacheKey::scheduler_lease(concern);

        match &self.redis {
            Some(redis) => redis.setnx_with_value(&key, owner, self.lease_ttl).await,
            None => Ok(self.local.try_acquire_lease(&key, owner).await),
        }
    }

    pub async fn release_lease(&self, concern: &str, owner: &str) -> Result<()> {
        let key = CacheKey::scheduler_lease(concern);

        match &self.redis {
            Some(redis) => {
                redis.delete_if_value(&key, owner).await?;
            }
            None => self.local.release_lease(&key, owner).await,
        }

        Ok(())
    }
}
