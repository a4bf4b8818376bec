use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use altus_core::config::{
    chunk_size_from_env_value, chunk_threshold_from_env_value, relink_page_size_from_env_value,
    session_idle_timeout_from_env_value, taxonomy_root_from_env_value, uploader_from_env_value,
};
use altus_core::{CoreConfig, Stores};
use altus_remote::{DropboxCredentials, DropboxStore, PostgrestConfig, PostgrestStore};
use api_rest::AppState;

/// How often idle upload sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// Builds the store pair selected by `ALTUS_BACKEND`.
///
/// `remote` (the default) talks to Dropbox and PostgREST and needs their credentials;
/// `memory` keeps everything in process for local development.
fn stores_from_env() -> anyhow::Result<Stores> {
    let backend = env("ALTUS_BACKEND").unwrap_or_else(|| "remote".into());
    match backend.trim() {
        "memory" => {
            tracing::warn!("using in-memory stores; nothing will be persisted");
            Ok(Stores::in_memory())
        }
        "remote" => {
            let credentials = DropboxCredentials::from_env_values(
                env("DROPBOX_APP_KEY"),
                env("DROPBOX_APP_SECRET"),
                env("DROPBOX_REFRESH_TOKEN"),
            )?;
            let metadata = PostgrestConfig::from_env_values(
                env("SUPABASE_URL"),
                env("SUPABASE_SERVICE_ROLE_KEY"),
            )?;
            tracing::info!(metadata_url = metadata.base_url(), "using remote stores");
            Ok(Stores::new(
                Arc::new(DropboxStore::new(credentials)?),
                Arc::new(PostgrestStore::new(metadata)?),
            ))
        }
        other => anyhow::bail!("ALTUS_BACKEND must be `remote` or `memory`, got {other:?}"),
    }
}

/// Main entry point for the Altus service
///
/// Resolves configuration from the environment (and `.env`), builds the stores, starts the
/// idle upload session sweep and serves the REST API.
///
/// # Environment Variables
/// - `ALTUS_REST_ADDR`: Server address (default: "0.0.0.0:3000")
/// - `ALTUS_BACKEND`: `remote` (default) or `memory`
/// - `ALTUS_TAXONOMY_ROOT`, `ALTUS_CHUNK_THRESHOLD`, `ALTUS_CHUNK_SIZE`,
///   `ALTUS_RELINK_PAGE_SIZE`, `ALTUS_SESSION_IDLE_TIMEOUT_SECS`, `ALTUS_UPLOADER`
/// - `DROPBOX_APP_KEY`, `DROPBOX_APP_SECRET`, `DROPBOX_REFRESH_TOKEN`
/// - `SUPABASE_URL`, `SUPABASE_SERVICE_ROLE_KEY`
///
/// # Errors
/// Returns an error if:
/// - the logging configuration cannot be initialised,
/// - any setting or credential is missing or invalid,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("altus_run=info".parse()?)
                .add_directive("altus_core=info".parse()?)
                .add_directive("altus_remote=info".parse()?)
                .add_directive("api_rest=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cfg = Arc::new(CoreConfig::new(
        &taxonomy_root_from_env_value(env("ALTUS_TAXONOMY_ROOT")),
        chunk_threshold_from_env_value(env("ALTUS_CHUNK_THRESHOLD"))?,
        chunk_size_from_env_value(env("ALTUS_CHUNK_SIZE"))?,
        relink_page_size_from_env_value(env("ALTUS_RELINK_PAGE_SIZE"))?,
        session_idle_timeout_from_env_value(env("ALTUS_SESSION_IDLE_TIMEOUT_SECS"))?,
        uploader_from_env_value(env("ALTUS_UPLOADER")),
    )?);
    tracing::info!(root = %cfg.taxonomy_root(), "taxonomy configured");

    let state = AppState::new(cfg, stores_from_env()?);

    let documents = state.documents();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(SESSION_SWEEP_INTERVAL);
        loop {
            ticker.tick().await;
            let abandoned = documents.sweep_idle(chrono::Utc::now());
            if !abandoned.is_empty() {
                tracing::info!(count = abandoned.len(), "abandoned idle upload sessions");
            }
        }
    });

    let addr = env("ALTUS_REST_ADDR").unwrap_or_else(|| "0.0.0.0:3000".into());
    tracing::info!("++ Starting Altus REST on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, api_rest::router(state))
        .with_graceful_shutdown(async {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("-- Shutting down Altus REST");
        })
        .await?;

    Ok(())
}
