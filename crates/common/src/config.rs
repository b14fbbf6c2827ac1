//! Application configuration.

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use chrono_tz::Tz;
use serde::Deserialize;

use crate::AppError;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Server configuration.
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Report lifecycle settings.
    #[serde(default)]
    pub lifecycle: LifecycleConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Authentication settings.
    #[serde(default)]
    pub auth: AuthConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this instance.
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Upper bound for a single store round-trip, in milliseconds.
    #[serde(default = "default_operation_timeout_ms")]
    pub operation_timeout_ms: u64,
}

impl DatabaseConfig {
    /// Store operation timeout as a [`Duration`].
    #[must_use]
    pub const fn operation_timeout(&self) -> Duration {
        Duration::from_millis(self.operation_timeout_ms)
    }
}

/// Report lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LifecycleConfig {
    /// Days the creator has to confirm a resolved report.
    #[serde(default = "default_confirmation_window_days")]
    pub confirmation_window_days: i64,
    /// IANA time zone that decides the calendar day of a protocol number.
    #[serde(default = "default_timezone")]
    pub timezone: String,
}

impl LifecycleConfig {
    /// Parse the configured time zone.
    pub fn tz(&self) -> Result<Tz, AppError> {
        Tz::from_str(&self.timezone)
            .map_err(|e| AppError::Config(format!("invalid lifecycle.timezone: {e}")))
    }
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            confirmation_window_days: default_confirmation_window_days(),
            timezone: default_timezone(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

/// Authentication settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// E-mail of the admin created at startup when absent.
    pub bootstrap_admin_email: Option<String>,
    /// Bearer token issued to that admin.
    pub bootstrap_admin_token: Option<String>,
}

impl AuthConfig {
    /// The bootstrap admin credentials, when both are configured.
    #[must_use]
    pub fn bootstrap_admin(&self) -> Option<(&str, &str)> {
        match (&self.bootstrap_admin_email, &self.bootstrap_admin_token) {
            (Some(email), Some(token)) if !email.is_empty() && !token.is_empty() => {
                Some((email.as_str(), token.as_str()))
            }
            _ => None,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_operation_timeout_ms() -> u64 {
    5000
}

const fn default_confirmation_window_days() -> i64 {
    7
}

fn default_timezone() -> String {
    "UTC".to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `ANISEG_ENV`)
    /// 4. Environment variables with `ANISEG_` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("ANISEG_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("ANISEG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("ANISEG")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_optional_sections() {
        let config: Config = config::Config::builder()
            .add_source(config::File::from_str(
                r#"
                [server]
                url = "http://localhost:3000"

                [database]
                url = "postgres://localhost/aniseg"
                "#,
                config::FileFormat::Toml,
            ))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.database.operation_timeout(), Duration::from_secs(5));
        assert_eq!(config.lifecycle.confirmation_window_days, 7);
        assert_eq!(config.logging.format, LogFormat::Pretty);
        assert_eq!(config.lifecycle.tz().unwrap(), Tz::UTC);
        assert!(config.auth.bootstrap_admin().is_none());
    }

    #[test]
    fn test_bootstrap_admin_needs_both_fields() {
        let auth = AuthConfig {
            bootstrap_admin_email: Some("admin@example.com".to_string()),
            bootstrap_admin_token: None,
        };
        assert!(auth.bootstrap_admin().is_none());

        let auth = AuthConfig {
            bootstrap_admin_token: Some("s3cret".to_string()),
            ..auth
        };
        assert_eq!(
            auth.bootstrap_admin(),
            Some(("admin@example.com", "s3cret"))
        );
    }

    #[test]
    fn test_invalid_timezone_is_config_error() {
        let lifecycle = LifecycleConfig {
            timezone: "Mars/Olympus_Mons".to_string(),
            ..LifecycleConfig::default()
        };
        assert!(matches!(lifecycle.tz(), Err(AppError::Config(_))));
    }
}
