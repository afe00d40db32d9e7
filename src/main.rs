//! flashdeck server
//!
//! Usage:
//!   JWT_SECRET=... cargo run --bin flashdeck            # start server on :5000
//!   cargo run --bin load_data -- --data-dir flashdeck_data   # optional demo data
//!
//! Every flag also reads an environment variable (see `--help`); a `.env`
//! file in the working directory is loaded first.

use std::sync::Arc;
use tokio::net::TcpListener;

use flashdeck::auth::{AuthService, TokenKeys};
use flashdeck::config::ServerConfig;
use flashdeck::decks::DeckService;
use flashdeck::logging;
use flashdeck::rest::create_router;
use flashdeck::storage::Storage;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServerConfig::load();
    let _log_guard = logging::init(config.log_format, config.log_dir.as_deref());
    config.validate()?;

    let storage = Arc::new(Storage::open(&config.data_dir)?);
    tracing::info!(data_dir = %config.data_dir.display(), "storage opened");

    let keys = TokenKeys::from_secret(config.jwt_secret.as_bytes(), config.token_ttl());
    let auth = AuthService::new(Arc::clone(&storage), keys, config.bcrypt_cost)?;
    let decks = DeckService::new(Arc::clone(&storage));

    // Runs before the listener opens so no deck creation can interleave.
    if config.skip_reconcile {
        tracing::info!("reference reconciliation skipped");
    } else {
        let report = decks.reconcile()?;
        tracing::info!(
            dangling_refs_removed = report.dangling_refs_removed,
            orphaned_decks_removed = report.orphaned_decks_removed,
            "reference reconciliation finished"
        );
    }

    let app = create_router(auth, decks, config.allowed_origins()?);

    let addr = config.socket_addr();
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, origins = ?config.cors_origins, "flashdeck listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    storage.flush().await?;
    tracing::info!("shut down cleanly");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
    tracing::info!("shutdown requested");
}
