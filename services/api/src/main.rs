use anyhow::Result;
use common::{
    cache::{RedisConfig, RedisPool},
    database::{DatabaseConfig, health_check, init_pool, run_migrations},
};
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use foodgram_api::{
    AppState, MIGRATOR,
    config::ServerConfig,
    create_router,
    jwt::{JwtConfig, JwtService},
    rate_limiter::{RateLimiter, RateLimiterConfig},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting Foodgram API service");

    let server_config = ServerConfig::load()?;

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Check database connectivity
    if health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    run_migrations(&pool, &MIGRATOR).await?;

    // Initialize JWT service
    let jwt_service = JwtService::new(JwtConfig::from_env()?);

    // Initialize Redis connection
    let redis_config = RedisConfig::from_env()?;
    let redis_pool = RedisPool::new(&redis_config).await?;
    if redis_pool.health_check().await? {
        info!("Redis connection successful");
    } else {
        anyhow::bail!("Failed to connect to Redis");
    }

    tokio::fs::create_dir_all(&server_config.media_root).await?;

    let bind_address = server_config.bind_address.clone();
    let app_state = AppState::new(
        pool,
        redis_pool,
        jwt_service,
        RateLimiter::new(RateLimiterConfig::default()),
        server_config,
    );

    // Start the web server
    let app = create_router(app_state);

    let listener = TcpListener::bind(&bind_address).await?;
    info!("Foodgram API listening on {}", bind_address);

    axum::serve(listener, app).await?;

    Ok(())
}
