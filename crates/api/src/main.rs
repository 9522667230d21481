//! FleetHerald API server binary entrypoint.

use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use herald_channels::ChannelSet;
use herald_common::config::HeraldConfig;
use herald_common::db::create_pool;
use herald_common::store::RecordStore;
use herald_engine::dispatcher::NotificationDispatcher;
use herald_scanner::scans::ScanService;
use herald_store::PgStore;
use herald_templates::TemplateRegistry;

use herald_api::routes::create_router;
use herald_api::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new("herald_api=debug,herald_engine=debug,tower_http=debug")
        }))
        .init();

    tracing::info!("Starting FleetHerald API server...");

    // Load configuration
    let config = HeraldConfig::from_env()?;

    // Create database connection pool
    let pool = create_pool(&config.database_url, config.db_max_connections).await?;
    tracing::info!("Database pool created");

    // Wire the dispatch engine
    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));
    let channels = Arc::new(ChannelSet::from_config(&config));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&store),
        TemplateRegistry::new(),
        Arc::clone(&channels),
    ));
    let scans = Arc::new(ScanService::new(
        Arc::clone(&store),
        Arc::clone(&dispatcher),
        &config,
    ));

    // Build application state
    let state = AppState::new(store, dispatcher, channels, scans, config);

    // Build router
    let app = create_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], 3000));
    tracing::info!("API server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
