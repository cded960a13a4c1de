use mailcast::bootstrap;
use mailcast::config::Config;
use mailcast::infrastructure::http::router::build_router;
use mailcast::infrastructure::observability;
use mailcast::infrastructure::persistence::Database;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::from_env()?;

    let _observability = observability::init(&config)?;
    tracing::info!("Configuration loaded");

    // Initialize database connection
    let db = Database::connect(&config.database_url).await?;

    // Run migrations
    db.run_migrations().await?;
    tracing::info!("Database migrations applied");

    // Build application state (and start background workers)
    let state = bootstrap::build_app_state(db, &config).await?;

    if let Err(e) = bootstrap::initialize_admin(&state.auth_service, &config).await {
        tracing::error!("Failed to initialize admin user: {}", e);
        return Err(e.into());
    }

    let app = build_router(state);

    let addr = config.server_address();
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
