//! Servicebook Server
//!
//! Runs the booking and escrow REST API together with the background
//! reconciler that sends confirmation warnings, auto-confirms completed
//! bookings and resolves stale disputes.
//!
//! # Usage
//!
//! ```bash
//! # Start with default settings
//! servicebook-server
//!
//! # Start with custom config
//! servicebook-server --config /path/to/config.toml
//!
//! # Start with environment overrides
//! SERVICEBOOK__SERVER__PORT=8080 servicebook-server
//! ```

mod config;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use servicebook_api::{create_router, AppState, JwtVerifier};
use servicebook_core::{notifier_from_config, Engine, SchemaResolver};
use servicebook_db::Database;

use crate::config::ServerConfig;

/// Secrets shorter than this are refused outside development mode
const MIN_SECRET_LEN: usize = 32;

// =============================================================================
// CLI Arguments
// =============================================================================

/// Servicebook server - bookings, escrowed payments and disputes
#[derive(Parser, Debug)]
#[command(name = "servicebook-server")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (TOML, JSON, or YAML)
    #[arg(short, long, env = "SERVICEBOOK_CONFIG")]
    config: Option<String>,

    /// Host to bind to
    #[arg(long, env = "SERVICEBOOK_HOST")]
    host: Option<String>,

    /// Port to listen on
    #[arg(short, long, env = "SERVICEBOOK_PORT")]
    port: Option<u16>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "SERVICEBOOK_LOG_LEVEL")]
    log_level: Option<String>,

    /// Log format (json, pretty)
    #[arg(long, env = "SERVICEBOOK_LOG_FORMAT")]
    log_format: Option<String>,

    /// PostgreSQL connection URL
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,

    /// JWT secret key
    #[arg(long, env = "JWT_SECRET")]
    jwt_secret: Option<String>,

    /// Disable the background reconciler
    #[arg(long)]
    no_reconciler: bool,

    /// Enable development mode (built-in secrets, relaxed checks)
    #[arg(long, env = "SERVICEBOOK_DEV_MODE")]
    dev_mode: bool,
}

// =============================================================================
// Main Entry Point
// =============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    let mut server_config = if args.dev_mode && args.config.is_none() {
        ServerConfig::development()
    } else {
        ServerConfig::load(args.config.as_deref())?
    };
    apply_overrides(&mut server_config, &args);

    init_logging(&server_config.logging)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        dev_mode = args.dev_mode,
        "Starting servicebook server"
    );

    validate_config(&server_config, args.dev_mode)?;

    let db = init_database(&server_config).await?;

    let resolver = SchemaResolver::detect(&db, server_config.schema.identity_mode)
        .await
        .context("failed to detect identity mapping")?;
    tracing::info!(identity_mode = resolver.mapping().as_str(), "Identity mapping resolved");

    let notifier = notifier_from_config(&server_config.notifications)?;
    let engine = Engine::with_defaults(db, server_config.engine_config(), resolver, notifier)?;

    if server_config.metrics.enabled {
        start_metrics_exporter(&server_config.metrics)?;
    }

    let cancel = CancellationToken::new();

    let reconciler = if server_config.reconciler.enabled {
        let every = Duration::from_secs(server_config.reconciler.interval_secs.max(1));
        Some(tokio::spawn(engine.reconciler.clone().run(every, cancel.clone())))
    } else {
        tracing::info!("Reconciler disabled");
        None
    };

    let jwt = JwtVerifier::new(&server_config.auth);
    let state = Arc::new(AppState::new(engine, jwt));
    let app = create_router(state, server_config.api.clone());

    let addr = server_config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    tracing::info!(%addr, "Server listening");

    let server_cancel = cancel.clone();
    let mut server = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move { server_cancel.cancelled().await })
            .await
    });

    tokio::select! {
        result = &mut server => {
            cancel.cancel();
            result??;
        }
        _ = shutdown_signal() => {
            cancel.cancel();
            let timeout = server_config.server.shutdown_timeout();
            tracing::info!(
                timeout_secs = timeout.as_secs(),
                "Waiting for in-flight requests to complete..."
            );
            match tokio::time::timeout(timeout, &mut server).await {
                Ok(result) => result??,
                Err(_) => {
                    tracing::warn!("Shutdown timeout elapsed, dropping remaining connections");
                    server.abort();
                }
            }
        }
    }

    if let Some(handle) = reconciler {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Reconciler task failed");
        }
    }

    tracing::info!("Server shutdown complete");

    Ok(())
}

// =============================================================================
// Initialization Functions
// =============================================================================

fn apply_overrides(config: &mut ServerConfig, args: &Args) {
    if let Some(host) = &args.host {
        config.server.host = host.clone();
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(url) = &args.database_url {
        config.database.url = url.clone();
    }
    if let Some(secret) = &args.jwt_secret {
        config.auth.jwt_secret = secret.clone();
    }
    if let Some(level) = &args.log_level {
        config.logging.level = level.clone();
    }
    if let Some(format) = &args.log_format {
        config.logging.format = format.clone();
    }
    if args.no_reconciler {
        config.reconciler.enabled = false;
    }
}

/// Initialize tracing/logging
fn init_logging(config: &config::LoggingConfig) -> anyhow::Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    let subscriber = tracing_subscriber::registry().with(env_filter);

    match config.format.as_str() {
        "json" => subscriber
            .with(fmt::layer().json().with_target(true))
            .try_init()?,
        _ => subscriber
            .with(fmt::layer().pretty().with_target(true))
            .try_init()?,
    }

    Ok(())
}

/// Refuse to start production with missing or weak secrets
fn validate_config(config: &ServerConfig, dev_mode: bool) -> anyhow::Result<()> {
    if dev_mode {
        if config.payments.webhook_secret.is_empty() {
            tracing::warn!("Webhook secret is empty; every webhook will be rejected");
        }
        return Ok(());
    }

    if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
        anyhow::bail!(
            "JWT secret must be at least {} bytes. Set JWT_SECRET or SERVICEBOOK__AUTH__JWT_SECRET.",
            MIN_SECRET_LEN
        );
    }

    if config.payments.webhook_secret.is_empty() {
        anyhow::bail!("payments.webhook_secret must be set. Set SERVICEBOOK__PAYMENTS__WEBHOOK_SECRET.");
    }

    if config.payments.api_key.is_empty() {
        tracing::warn!("payments.api_key is empty; gateway calls will be unauthenticated");
    }

    if config.payments.webhook_tolerance_secs == 0 {
        tracing::warn!("Webhook timestamp tolerance is disabled");
    }

    Ok(())
}

/// Connect to Postgres and apply migrations
async fn init_database(config: &ServerConfig) -> anyhow::Result<Database> {
    tracing::info!(url = %config.database.url_masked(), "Connecting to database...");

    let db = Database::connect(&config.database)
        .await
        .context("failed to connect to database")?;

    if config.database.run_migrations {
        db.migrate().await.context("failed to run migrations")?;
        tracing::info!("Migrations applied");
    }

    let health = db.health_check().await;
    if !health.healthy {
        anyhow::bail!("Database health check failed");
    }

    tracing::info!(postgres = health.postgres, "Database health check passed");

    Ok(db)
}

/// Start the Prometheus exporter on its own listener
fn start_metrics_exporter(config: &config::MetricsConfig) -> anyhow::Result<()> {
    let Some(port) = config.port else {
        tracing::info!("Metrics enabled without a port; exporter not started");
        return Ok(());
    };

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    metrics_exporter_prometheus::PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .context("failed to install Prometheus exporter")?;
    servicebook_core::metrics::register_metrics();

    tracing::info!(port, "Metrics exporter started");

    Ok(())
}

// =============================================================================
// Graceful Shutdown
// =============================================================================

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let args = Args::parse_from(["servicebook-server", "--port", "8080", "--no-reconciler"]);
        assert_eq!(args.port, Some(8080));
        assert!(args.no_reconciler);
        assert!(!args.dev_mode);
    }

    #[test]
    fn test_overrides_win_over_config() {
        let args = Args::parse_from([
            "servicebook-server",
            "--host",
            "127.0.0.1",
            "--database-url",
            "postgresql://db.internal/servicebook",
            "--log-format",
            "json",
            "--no-reconciler",
        ]);
        let mut config = ServerConfig::development();
        apply_overrides(&mut config, &args);

        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.database.url, "postgresql://db.internal/servicebook");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.level, "debug");
        assert!(!config.reconciler.enabled);
    }

    #[test]
    fn test_development_config() {
        let config = ServerConfig::development();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.logging.level, "debug");
        assert!(validate_config(&config, true).is_ok());
    }

    #[test]
    fn test_production_requires_secrets() {
        let mut config = ServerConfig::default();
        assert!(validate_config(&config, false).is_err());

        config.auth.jwt_secret = "x".repeat(MIN_SECRET_LEN);
        assert!(validate_config(&config, false).is_err());

        config.payments.webhook_secret = "whsec_live".to_string();
        assert!(validate_config(&config, false).is_ok());

        config.auth.jwt_secret = "short".to_string();
        assert!(validate_config(&config, false).is_err());
    }
}
