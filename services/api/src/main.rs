use std::time::Duration;

use anyhow::Result;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::database::{DatabaseConfig, init_pool, run_migrations};

use api::config::ServerConfig;
use api::jwt::{JwtConfig, JwtService};
use api::password::PasswordContext;
use api::repositories::{DealRepository, UserRepository};
use api::routes;
use api::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting API service");

    // Initialize database connection pool
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;

    // Apply schema migrations
    run_migrations(&pool, &sqlx::migrate!()).await?;

    // Check database connectivity
    if common::database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let server_config = ServerConfig::from_env();
    let jwt_service = JwtService::new(JwtConfig::from_env()?);
    let password_context = PasswordContext::new();

    // Initialize repositories
    let user_repository = UserRepository::new(pool.clone());
    let deal_repository = DealRepository::new(pool.clone());

    let app_state = AppState {
        db_pool: pool,
        user_repository,
        deal_repository,
        jwt_service,
        password_context,
    };

    // Start the web server
    let app = routes::create_router(
        app_state,
        Duration::from_secs(server_config.request_timeout_secs),
    );

    let listener = tokio::net::TcpListener::bind(&server_config.bind_addr).await?;
    info!("API service listening on {}", server_config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
