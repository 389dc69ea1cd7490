//! Redis cache module for the Tessera platform
//!
//! This module provides the Redis connection pool used by every service and
//! the revocation cache built on top of it. The revocation cache records
//! token ids (jti) that were invalidated before their natural expiry; the
//! auth service writes entries on logout and every service reads them while
//! verifying a bearer token.
//!
//! All round-trips carry a bounded timeout so a slow or unreachable Redis
//! cannot stall request handling. Callers of `is_revoked` must fail closed:
//! an error from the cache is treated as "revoked", never as a pass-through.

use anyhow::Result;
use redis::{AsyncCommands, Client};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

/// Key prefix for revocation entries, shared by all services
const BLACKLIST_PREFIX: &str = "blacklist:";

/// Configuration for Redis connection
#[derive(Debug, Clone)]
pub struct RedisConfig {
    /// Redis connection URL (e.g., "redis://localhost:6379")
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Per-operation timeout in milliseconds
    pub op_timeout_ms: u64,
}

impl RedisConfig {
    /// Create a new RedisConfig from environment variables
    ///
    /// # Environment Variables
    /// - `REDIS_URL`: Redis connection URL (default: "redis://localhost:6379")
    /// - `REDIS_MAX_CONNECTIONS`: Maximum number of connections (default: 10)
    /// - `REDIS_OP_TIMEOUT_MS`: Per-operation timeout in ms (default: 2000)
    pub fn from_env() -> Result<Self> {
        let url =
            std::env::var("REDIS_URL").unwrap_or_else(|_| "redis://localhost:6379".to_string());
        let max_connections = std::env::var("REDIS_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "10".to_string())
            .parse()
            .unwrap_or(10);
        let op_timeout_ms = std::env::var("REDIS_OP_TIMEOUT_MS")
            .unwrap_or_else(|_| "2000".to_string())
            .parse()
            .unwrap_or(2000);

        Ok(RedisConfig {
            url,
            max_connections,
            op_timeout_ms,
        })
    }
}

/// Redis connection pool
#[derive(Clone)]
pub struct RedisPool {
    client: Client,
    op_timeout: Duration,
}

impl RedisPool {
    /// Initialize a new Redis connection pool
    pub async fn new(config: &RedisConfig) -> Result<Self> {
        let client = Client::open(config.url.clone())?;
        info!("Redis client initialized with URL: {}", config.url);
        Ok(RedisPool {
            client,
            op_timeout: Duration::from_millis(config.op_timeout_ms),
        })
    }

    /// Get a connection from the pool, bounded by the operation timeout
    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection> {
        let conn = tokio::time::timeout(
            self.op_timeout,
            self.client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timed out"))??;
        Ok(conn)
    }

    /// Set a key-value pair in Redis with optional TTL
    pub async fn set(&self, key: &str, value: &str, ttl_seconds: Option<u64>) -> Result<()> {
        let mut conn = self.get_connection().await?;

        let fut = async {
            if let Some(ttl) = ttl_seconds {
                let _: () = conn.set_ex(key, value, ttl).await?;
            } else {
                let _: () = conn.set(key, value).await?;
            }
            Ok::<(), anyhow::Error>(())
        };

        tokio::time::timeout(self.op_timeout, fut)
            .await
            .map_err(|_| anyhow::anyhow!("Redis SET timed out"))??;

        Ok(())
    }

    /// Get a value from Redis by key
    pub async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.get_connection().await?;
        let value: Option<String> = tokio::time::timeout(self.op_timeout, conn.get(key))
            .await
            .map_err(|_| anyhow::anyhow!("Redis GET timed out"))??;
        Ok(value)
    }

    /// Check if a key exists in Redis
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let exists: bool = tokio::time::timeout(self.op_timeout, conn.exists(key))
            .await
            .map_err(|_| anyhow::anyhow!("Redis EXISTS timed out"))??;
        Ok(exists)
    }

    /// Delete a key from Redis
    pub async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.get_connection().await?;
        let _: u64 = tokio::time::timeout(self.op_timeout, conn.del(key))
            .await
            .map_err(|_| anyhow::anyhow!("Redis DEL timed out"))??;
        Ok(())
    }

    /// Check if Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        let mut conn = self.get_connection().await?;
        let pong: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(pong == "PONG")
    }
}

/// Shared, TTL-based store of revoked token ids
///
/// An entry exists if and only if that token id must be rejected even though
/// its signature and expiry are still valid. Entries are written once per
/// logout and expire no later than the token's own expiry, so the cache never
/// outlives the tokens it guards.
#[derive(Clone)]
pub struct RevocationCache {
    pool: RedisPool,
}

impl RevocationCache {
    /// Create a new revocation cache on top of a Redis pool
    pub fn new(pool: RedisPool) -> Self {
        Self { pool }
    }

    /// Insert a revocation marker for a token id
    ///
    /// `ttl_seconds` should be at least the remaining lifetime of the token
    /// so the marker cannot disappear while the token is still valid.
    pub async fn revoke(&self, jti: Uuid, ttl_seconds: u64) -> Result<()> {
        // Redis rejects SETEX with a zero TTL; an already-expired token
        // still gets a short-lived marker.
        let ttl = ttl_seconds.max(1);
        let key = format!("{}{}", BLACKLIST_PREFIX, jti);
        self.pool.set(&key, "1", Some(ttl)).await?;
        info!("Revoked token id: {}", jti);
        Ok(())
    }

    /// Check whether a token id has been revoked
    ///
    /// Errors are returned to the caller, which must treat them as revoked
    /// (fail closed); skipping the check is a security regression.
    pub async fn is_revoked(&self, jti: Uuid) -> Result<bool> {
        let key = format!("{}{}", BLACKLIST_PREFIX, jti);
        self.pool.exists(&key).await
    }

    /// Check if the underlying Redis is reachable
    pub async fn health_check(&self) -> Result<bool> {
        self.pool.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> RedisConfig {
        RedisConfig {
            url: "redis://localhost:6379".to_string(),
            max_connections: 10,
            op_timeout_ms: 2000,
        }
    }

    #[tokio::test]
    #[ignore = "requires a local Redis instance"]
    async fn test_set_get_delete() -> Result<()> {
        let pool = RedisPool::new(&local_config()).await?;

        let key = "test_key";
        let value = "test_value";
        pool.set(key, value, Some(5)).await?;

        let retrieved = pool.get(key).await?;
        assert_eq!(retrieved, Some(value.to_string()));

        pool.delete(key).await?;
        let retrieved = pool.get(key).await?;
        assert_eq!(retrieved, None);

        Ok(())
    }

    #[tokio::test]
    #[ignore = "requires a local Redis instance"]
    async fn test_revoke_and_check() -> Result<()> {
        let pool = RedisPool::new(&local_config()).await?;
        let cache = RevocationCache::new(pool);

        let jti = Uuid::new_v4();
        assert!(!cache.is_revoked(jti).await?);

        cache.revoke(jti, 5).await?;
        assert!(cache.is_revoked(jti).await?);

        Ok(())
    }

    #[tokio::test]
    async fn test_unreachable_redis_is_an_error() {
        // Nothing listens on this port; the check must surface an error so
        // callers can fail closed instead of silently passing the token.
        let config = RedisConfig {
            url: "redis://127.0.0.1:1".to_string(),
            max_connections: 1,
            op_timeout_ms: 500,
        };
        let pool = RedisPool::new(&config).await.expect("client init is lazy");
        let cache = RevocationCache::new(pool);

        assert!(cache.is_revoked(Uuid::new_v4()).await.is_err());
    }
}
