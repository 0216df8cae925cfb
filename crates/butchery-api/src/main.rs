//! Butchery API Server
//!
//! REST API server for administrator and customer authentication.

use anyhow::Context;
use butchery_api::{create_router, state::AppState};
use butchery_core::{AppConfig, LoggingConfig, PgStore};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "butchery-api", version, about = "Butchery authentication API server")]
struct Args {
    /// TOML configuration file; environment variables override its values
    #[arg(short, long, env = "BUTCHERY_CONFIG")]
    config: Option<PathBuf>,

    /// Keep all data in memory instead of PostgreSQL
    #[arg(long)]
    in_memory: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = match &args.config {
        Some(path) => AppConfig::from_file(path.clone())?.with_env_override()?,
        None => AppConfig::from_env()?,
    };

    init_tracing(&config.logging);
    config.validate().context("invalid configuration")?;

    let state = if args.in_memory {
        tracing::warn!("Running with the in-memory store; data is lost on exit");
        AppState::in_memory(config)
    } else {
        let store = PgStore::connect(
            &config.database.postgres_url,
            config.database.postgres_pool_size,
        )
        .await
        .context("failed to connect to PostgreSQL")?;
        store.migrate().await.context("failed to run migrations")?;
        tracing::info!("Database migrations applied");

        AppState::new(config, Arc::new(store))
    };

    let addr = format!("{}:{}", state.config.server.host, state.config.server.port);
    let app = create_router(Arc::new(state));

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    tracing::info!("Butchery API Server starting on http://{}", addr);
    tracing::info!("Swagger UI available at http://{}/swagger-ui/", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "{level},butchery_api={level},audit=info,tower_http=info",
            level = logging.level
        ))
    });

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_file(logging.include_location)
        .with_line_number(logging.include_location);

    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
