use std::sync::Arc;

use herald_channels::ChannelSet;
use herald_common::config::HeraldConfig;
use herald_common::db;
use herald_common::store::RecordStore;
use herald_engine::dispatcher::NotificationDispatcher;
use herald_scanner::scans::ScanService;
use herald_scanner::scheduler::ScanScheduler;
use herald_store::PgStore;
use herald_templates::TemplateRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "herald_scanner=info,herald_engine=info".into()),
        )
        .json()
        .init();

    tracing::info!("FleetHerald scanner starting...");

    // Load configuration
    let config = HeraldConfig::from_env()?;

    // Connect to database
    let pool = db::create_pool(&config.database_url, config.db_max_connections).await?;

    // Run migrations
    sqlx::migrate!("../../migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    // Wire the dispatch engine and scan service
    let store: Arc<dyn RecordStore> = Arc::new(PgStore::new(pool));
    let channels = Arc::new(ChannelSet::from_config(&config));
    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::clone(&store),
        TemplateRegistry::new(),
        channels,
    ));
    let service = Arc::new(ScanService::new(store, dispatcher, &config));
    let scheduler = ScanScheduler::new(service, &config);

    // Run with graceful shutdown on Ctrl+C
    tokio::select! {
        result = scheduler.run() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "Scan scheduler exited with error");
                return Err(e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received shutdown signal, stopping gracefully...");
        }
    }

    tracing::info!("FleetHerald scanner stopped.");
    Ok(())
}
