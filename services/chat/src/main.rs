use anyhow::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

mod middleware;
mod routes;

use common::cache::{RedisConfig, RedisPool, RevocationCache};
use common::verifier::{TokenVerifier, VerifierConfig};

/// Application state shared across handlers
///
/// The chat service never talks to the auth service at request time: it
/// holds only the shared public key and the revocation cache, which is all
/// local token verification needs.
#[derive(Clone)]
pub struct AppState {
    pub verifier: TokenVerifier,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting default subscriber failed");

    info!("Starting chat service");

    // Initialize Redis and the revocation cache (read side)
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    let revocation_cache = RevocationCache::new(redis_pool);

    // Initialize the local token verifier from the shared public key
    let verifier_config = VerifierConfig::from_env()?;
    let verifier = TokenVerifier::new(&verifier_config, revocation_cache)?;

    let app_state = AppState { verifier };

    // Start the web server
    let app = routes::create_router(app_state);

    let addr = std::env::var("APP_ADDR").unwrap_or_else(|_| "0.0.0.0:8003".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Chat service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
