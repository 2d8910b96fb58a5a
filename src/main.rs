use anyhow::Context;
use tracing_subscriber::EnvFilter;

use fwt_api::config;
use fwt_api::database::DatabaseManager;
use fwt_api::server::{self, AppState};
use fwt_api::services::MemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("fwt_api=info,tower_http=info")),
        )
        .init();

    let config = config::config();
    tracing::info!("Starting fwt-api in {:?} mode", config.environment);

    let (state, db) = match config.database.url {
        Some(_) => {
            let db = DatabaseManager::open(&config.database).await.context("failed to open database")?;
            if config.database.run_migrations {
                db.migrate().await.context("failed to run migrations")?;
                tracing::info!("migrations applied");
            }
            (AppState::postgres(db.clone(), config)?, Some(db))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory store");
            (AppState::in_memory(MemoryStore::new(), config)?, None)
        }
    };

    let app = server::router(state, config);

    let bind_addr = config.server.bind_address();
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;
    tracing::info!("fwt-api listening on http://{}", bind_addr);

    server::serve(listener, app, server::shutdown_signal(), config.server.shutdown_grace()).await?;

    if let Some(db) = db {
        db.close().await;
    }
    tracing::info!("server stopped");
    Ok(())
}
