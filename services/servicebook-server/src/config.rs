//! Server Configuration
//!
//! Layered configuration for the servicebook server: an optional explicit
//! file, `config/default`, `config/local`, then `SERVICEBOOK__*` environment
//! variables, with CLI flags applied last in `main`.

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

use servicebook_api::{ApiConfig, AuthConfig};
use servicebook_core::{
    BookingConfig, EngineConfig, NotificationsConfig, PaymentsConfig, ReconcilerConfig,
    SchemaConfig,
};
use servicebook_db::DatabaseConfig;

/// Server configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Server binding configuration
    #[serde(default)]
    pub server: ServerSettings,

    #[serde(default)]
    pub database: DatabaseConfig,

    /// JWT verification
    #[serde(default)]
    pub auth: AuthConfig,

    #[serde(default)]
    pub api: ApiConfig,

    /// Commission, timeouts and reschedule limits
    #[serde(default)]
    pub booking: BookingConfig,

    /// Payment gateway and webhook verification
    #[serde(default)]
    pub payments: PaymentsConfig,

    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Background reconciler schedule
    #[serde(default)]
    pub reconciler: ReconcilerConfig,

    #[serde(default)]
    pub schema: SchemaConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Server binding settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds to wait for in-flight requests after a shutdown signal
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl ServerSettings {
    /// Get the socket address to bind to
    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .with_context(|| format!("invalid bind address {}:{}", self.host, self.port))
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Prometheus exporter configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Port for the exporter's own HTTP listener
    #[serde(default = "default_metrics_port")]
    pub port: Option<u16>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: default_metrics_port(),
        }
    }
}

// =============================================================================
// Default Value Functions
// =============================================================================

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_shutdown_timeout() -> u64 {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_metrics_port() -> Option<u16> {
    Some(9090)
}

fn default_true() -> bool {
    true
}

// =============================================================================
// Configuration Loading
// =============================================================================

impl ServerConfig {
    /// Load configuration from config files and the environment
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut builder = config::Config::builder();

        if let Some(path) = config_path {
            builder = builder.add_source(config::File::with_name(path).required(true));
        }

        builder = builder
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name("config/local").required(false));

        // SERVICEBOOK__SECTION__KEY
        builder = builder.add_source(
            config::Environment::with_prefix("SERVICEBOOK")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build().context("failed to read configuration")?;

        config
            .try_deserialize()
            .context("invalid configuration")
    }

    /// Create a configuration for local development
    pub fn development() -> Self {
        Self {
            auth: AuthConfig {
                jwt_secret: "servicebook-development-secret-do-not-deploy".to_string(),
                ..Default::default()
            },
            payments: PaymentsConfig {
                webhook_secret: "whsec_development".to_string(),
                webhook_tolerance_secs: 0,
                ..Default::default()
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                format: "pretty".to_string(),
            },
            metrics: MetricsConfig {
                enabled: false,
                port: None,
            },
            ..Default::default()
        }
    }

    /// The engine's slice of the configuration
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            booking: self.booking.clone(),
            payments: self.payments.clone(),
            reconciler: self.reconciler.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.shutdown_timeout(), Duration::from_secs(10));
        assert_eq!(config.metrics.port, Some(9090));
        assert!(config.reconciler.enabled);
        assert!(config.auth.jwt_secret.is_empty());
    }

    #[test]
    fn test_socket_addr() {
        let settings = ServerSettings {
            host: "127.0.0.1".to_string(),
            port: 8081,
            ..Default::default()
        };
        assert_eq!(settings.socket_addr().unwrap().port(), 8081);

        let bad = ServerSettings {
            host: "not a host".to_string(),
            ..Default::default()
        };
        assert!(bad.socket_addr().is_err());
    }

    #[test]
    fn test_partial_toml_keeps_section_defaults() {
        let config: ServerConfig = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                port = 4000

                [booking]
                max_reschedules = 5

                [reconciler]
                interval_secs = 60
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 4000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.booking.max_reschedules, 5);
        assert_eq!(config.booking.auto_confirm_hours, 48);
        assert_eq!(config.reconciler.interval_secs, 60);
        assert_eq!(config.reconciler.batch_size, 100);
    }

    #[test]
    fn test_engine_config_slice() {
        let mut config = ServerConfig::development();
        config.booking.dispute_timeout_days = 3;
        let engine = config.engine_config();
        assert_eq!(engine.booking.dispute_timeout_days, 3);
        assert_eq!(engine.payments.webhook_secret, "whsec_development");
    }
}
