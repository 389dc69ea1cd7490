use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod clients;
mod issuer;
mod jwt;
mod middleware;
mod models;
mod rate_limiter;
mod repositories;
mod routes;
mod validation;

use sqlx::PgPool;

use common::cache::{RedisConfig, RedisPool, RevocationCache};
use common::database;
use common::verifier::{TokenVerifier, VerifierConfig};

use crate::clients::{UserClient, user::UserClientConfig};
use crate::issuer::TokenIssuer;
use crate::jwt::{JwtCodec, JwtConfig};
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::repositories::{CredentialRepository, SessionRepository};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub revocation_cache: RevocationCache,
    pub verifier: TokenVerifier,
    pub issuer: TokenIssuer,
    pub credential_repository: CredentialRepository,
    pub session_repository: SessionRepository,
    pub rate_limiter: RateLimiter,
    pub user_client: UserClient,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting authentication service");

    // Initialize database connection pool
    let db_config = database::DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;

    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    // Initialize Redis and the revocation cache
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    let revocation_cache = RevocationCache::new(redis_pool);

    // Initialize the JWT codec and the local verifier; the verifier only
    // ever sees the public half of the key pair.
    let jwt_config = JwtConfig::from_env()?;
    let verifier_config = VerifierConfig {
        public_key: jwt_config.public_key.clone(),
    };
    let codec = JwtCodec::new(jwt_config)?;
    let verifier = TokenVerifier::new(&verifier_config, revocation_cache.clone())?;

    let credential_repository = CredentialRepository::new(pool.clone());
    let session_repository = SessionRepository::new(pool.clone());
    let issuer = TokenIssuer::new(codec, session_repository.clone());
    let rate_limiter = RateLimiter::new(RateLimiterConfig::default());
    let user_client = UserClient::new(&UserClientConfig::from_env()?)?;

    let app_state = AppState {
        db_pool: pool,
        revocation_cache,
        verifier,
        issuer,
        credential_repository,
        session_repository,
        rate_limiter,
        user_client,
    };

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = std::env::var("APP_ADDR").unwrap_or_else(|_| "0.0.0.0:8001".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Authentication service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
