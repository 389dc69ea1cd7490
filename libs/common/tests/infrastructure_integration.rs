//! Integration tests for the infrastructure components
//!
//! These tests verify that the PostgreSQL database and Redis cache are
//! properly configured and accessible. They run against local instances and
//! are ignored by default:
//!
//! ```sh
//! cargo test -p common -- --ignored
//! ```

use common::{
    cache::{RedisConfig, RedisPool, RevocationCache},
    database::{DatabaseConfig, health_check, init_pool},
};
use sqlx::Row;
use uuid::Uuid;

/// Verify that PostgreSQL and Redis are accessible and can perform basic
/// operations
#[tokio::test]
#[ignore = "requires local PostgreSQL and Redis"]
async fn test_infrastructure_integration() -> Result<(), Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    assert!(health_check(&pool).await?, "Database health check failed");

    let row = sqlx::query("SELECT 1 as result").fetch_one(&pool).await?;
    let result: i32 = row.get("result");
    assert_eq!(result, 1, "PostgreSQL simple query test failed");

    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;

    assert!(
        redis_pool.health_check().await?,
        "Redis health check failed"
    );

    let test_key = "integration_test_key";
    let test_value = "integration_test_value";

    redis_pool.set(test_key, test_value, Some(10)).await?;
    let retrieved_value = redis_pool.get(test_key).await?;
    assert_eq!(retrieved_value, Some(test_value.to_string()));

    redis_pool.delete(test_key).await?;
    let retrieved_value = redis_pool.get(test_key).await?;
    assert_eq!(retrieved_value, None, "Redis delete operation failed");

    Ok(())
}

/// Verify revocation markers expire with their TTL
#[tokio::test]
#[ignore = "requires local Redis"]
async fn test_revocation_entry_expires() -> Result<(), Box<dyn std::error::Error>> {
    let redis_config = RedisConfig::from_env()?;
    let cache = RevocationCache::new(RedisPool::new(&redis_config).await?);

    let jti = Uuid::new_v4();
    cache.revoke(jti, 1).await?;
    assert!(cache.is_revoked(jti).await?);

    tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
    assert!(!cache.is_revoked(jti).await?);

    Ok(())
}
