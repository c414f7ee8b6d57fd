use std::time::Duration;

use deadpool_redis::{Config as PoolConfig, Pool, Runtime, redis};

use crate::{
    config::CacheConfig,
    error::{AppError, Result},
};

const RELEASE_IF_HELD: &str =
    r#"if redis.call("GET", KEYS[1]) == ARGV[1] then return redis.call("DEL", KEYS[1]) else return 0 end"#;

#[derive(Clone)]
pub struct RedisCache {
    pool: Pool,
}

impl RedisCache {
    pub async fn connect(url: &str, cache_config: &CacheConfig) -> Result<Self> {
        let pool_config = PoolConfig::from_url(url);
        let pool = pool_config
            .builder()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?
            .max_size(cache_config.pool_size)
            .wait_timeout(Some(cache_config.connect_timeout))
            .runtime(Runtime::Tokio1)
            .build()
            .map_err(|e| AppError::InternalServerError(e.to_string()))?;

        let mut redis_connection = pool
            .get()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;

        let _: String = redis::cmd("PING")
            .query_async(&mut *redis_connection)
            .await?;

        Ok(Self { pool })
    }

    /// `SET key value NX EX ttl`; true when the key was written.
    pub async fn setnx_with_value(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut redis_connection = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;

        let result: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(ttl.as_secs().max(1))
            .query_async(&mut *redis_connection)
            .await?;

        Ok(result.is_some())
    }

    /// Deletes `key` only while it still holds `value`.
    pub async fn delete_if_value(&self, key: &str, value: &str) -> Result<bool> {
        let mut redis_connection = self
            .pool
            .get()
            .await
            .map_err(|e| AppError::Unavailable(e.to_string()))?;

        let deleted: i64 = redis::cmd("EVAL")
            .arg(RELEASE_IF_HELD)
            .arg(1)
            .arg(key)
            .arg(value)
            .query_async(&mut *redis_connection)
            .await?;

        Ok(deleted > 0)
    }
}
