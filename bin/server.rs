// Tirelire - Web Server
// REST API with Axum

use anyhow::{Context, Result};
use tirelire::api::{create_router, AppState};
use tirelire::{AppConfig, MoneyBoxService, SqliteStore};
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tirelire::init_tracing();

    info!("🌐 Tirelire - Web Server v{}", tirelire::VERSION);

    let config = AppConfig::from_env()?;

    // Open database (created and seeded on first run)
    let seed = config.seed_catalog()?;
    let store = SqliteStore::open(&config.db_path, &seed)
        .with_context(|| format!("Failed to open database {:?}", config.db_path))?;

    let service = MoneyBoxService::new(store)?;
    let app = create_router(AppState::new(service));

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("🚀 Server running on http://{}", addr);
    info!("   POST   /api/v1/moneyboxes/            - Create money box");
    info!("   GET    /api/v1/moneyboxes/            - List money boxes");
    info!("   GET    /api/v1/moneyboxes/:id/        - Get money box");
    info!("   GET    /api/v1/moneyboxes/:id/shake/  - Shake money box");
    info!("   POST   /api/v1/moneyboxes/:id/save/   - Save cashes");
    info!("   DELETE /api/v1/moneyboxes/:id/break/  - Break money box");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
