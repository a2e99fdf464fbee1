//! Application settings and configuration structures.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Driver name of the PostgreSQL dialect.
pub const DRIVER_POSTGRES: &str = "postgres";

/// Driver name of the MySQL dialect.
pub const DRIVER_MYSQL: &str = "mysql";

/// Root configuration structure containing all application settings.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// SQL store configuration
    pub sql: SqlSettings,

    /// Log output format ("text" or "json")
    pub log_format: String,

    /// Current environment (development, staging, production)
    pub environment: String,
}

/// SQL store configuration.
///
/// Field names follow the recognised option names of the store
/// (`DriverName`, `DataSource`, ...) in snake case.
#[derive(Debug, Clone, Deserialize)]
pub struct SqlSettings {
    /// "postgres" or "mysql"
    pub driver_name: String,

    /// Primary connection URL
    pub data_source: String,

    /// Read replica connection URLs
    #[serde(default)]
    pub data_source_replicas: Vec<String>,

    /// Search replica connection URLs
    #[serde(default)]
    pub data_source_search_replicas: Vec<String>,

    /// Connections kept open while idle
    pub max_idle_conns: u32,

    /// Maximum number of connections in each pool
    pub max_open_conns: u32,

    /// Maximum lifetime of a connection in milliseconds
    pub conn_max_lifetime_milliseconds: u64,

    /// Maximum idle time of a connection in milliseconds
    pub conn_max_idle_time_milliseconds: u64,

    /// Per-query timeout in seconds
    pub query_timeout: u64,

    /// Log every statement at debug level
    pub trace: bool,

    /// Replica lag probes
    #[serde(default)]
    pub replica_lag_settings: Vec<ReplicaLagSettings>,

    /// Key for data at rest, consumed outside the store
    #[serde(default)]
    pub at_rest_encrypt_key: String,

    /// Interval between replica lag probes in seconds
    pub replica_monitor_interval_seconds: u64,

    /// Run the integrity checker once after startup
    pub run_integrity_check_on_start: bool,
}

/// Replica lag probe configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReplicaLagSettings {
    /// Connection URL the probe queries run against
    #[serde(default)]
    pub data_source: Option<String>,

    /// Query returning `(node, lag)` measured in bytes or transactions
    #[serde(default)]
    pub query_absolute_lag: Option<String>,

    /// Query returning `(node, lag)` measured in milliseconds
    #[serde(default)]
    pub query_time_lag: Option<String>,
}

impl Settings {
    /// Load settings from environment variables and configuration files.
    ///
    /// The loading order is:
    /// 1. config/default.toml (base configuration)
    /// 2. config/{RUN_ENV}.toml (environment-specific overrides)
    /// 3. Environment variables (highest priority)
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if configuration cannot be loaded or parsed,
    /// or if the SQL settings are inconsistent.
    pub fn load() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let environment = std::env::var("RUN_ENV").unwrap_or_else(|_| "development".into());

        Config::builder()
            .set_default("environment", environment.clone())?
            .set_default("log_format", "text")?
            .set_default("sql.driver_name", DRIVER_POSTGRES)?
            .set_default("sql.data_source", "")?
            .set_default("sql.max_idle_conns", 20)?
            .set_default("sql.max_open_conns", 300)?
            .set_default("sql.conn_max_lifetime_milliseconds", 3_600_000_i64)?
            .set_default("sql.conn_max_idle_time_milliseconds", 300_000_i64)?
            .set_default("sql.query_timeout", 30)?
            .set_default("sql.trace", false)?
            .set_default("sql.replica_monitor_interval_seconds", 5)?
            .set_default("sql.run_integrity_check_on_start", false)?
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // APP__SQL__QUERY_TIMEOUT=10 -> sql.query_timeout = 10
            .add_source(
                Environment::default()
                    .prefix("APP")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sql.data_source_replicas")
                    .with_list_parse_key("sql.data_source_search_replicas")
                    .try_parsing(true),
            )
            .set_override_option("sql.data_source", std::env::var("DATABASE_URL").ok())?
            .set_override_option("sql.driver_name", std::env::var("DATABASE_DRIVER").ok())?
            .build()?
            .try_deserialize()
            .and_then(|settings: Self| {
                settings.sql.validate()?;
                Ok(settings)
            })
    }
}

impl SqlSettings {
    /// Settings for a single primary with library defaults.
    pub fn new(driver_name: &str, data_source: &str) -> Self {
        Self {
            driver_name: driver_name.to_string(),
            data_source: data_source.to_string(),
            data_source_replicas: Vec::new(),
            data_source_search_replicas: Vec::new(),
            max_idle_conns: 2,
            max_open_conns: 10,
            conn_max_lifetime_milliseconds: 3_600_000,
            conn_max_idle_time_milliseconds: 300_000,
            query_timeout: 30,
            trace: false,
            replica_lag_settings: Vec::new(),
            at_rest_encrypt_key: String::new(),
            replica_monitor_interval_seconds: 5,
            run_integrity_check_on_start: false,
        }
    }

    /// Check the settings for consistency.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.driver_name != DRIVER_POSTGRES && self.driver_name != DRIVER_MYSQL {
            return Err(ConfigError::Message(format!(
                "unknown sql.driver_name {:?}, expected {:?} or {:?}",
                self.driver_name, DRIVER_POSTGRES, DRIVER_MYSQL
            )));
        }
        if self.data_source.trim().is_empty() {
            return Err(ConfigError::Message("sql.data_source must be set".into()));
        }
        if self.max_open_conns == 0 {
            return Err(ConfigError::Message("sql.max_open_conns must be positive".into()));
        }
        if self.max_idle_conns > self.max_open_conns {
            return Err(ConfigError::Message(format!(
                "sql.max_idle_conns ({}) must not exceed sql.max_open_conns ({})",
                self.max_idle_conns, self.max_open_conns
            )));
        }
        if self.query_timeout == 0 {
            return Err(ConfigError::Message("sql.query_timeout must be positive".into()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_settings_are_valid() {
        let settings = SqlSettings::new(DRIVER_POSTGRES, "postgres://localhost/chat");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_unknown_driver_rejected() {
        let settings = SqlSettings::new("sqlite", "sqlite://chat.db");
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("unknown sql.driver_name"));
    }

    #[test]
    fn test_empty_data_source_rejected() {
        let settings = SqlSettings::new(DRIVER_MYSQL, "  ");
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_idle_above_open_rejected() {
        let mut settings = SqlSettings::new(DRIVER_MYSQL, "mysql://localhost/chat");
        settings.max_idle_conns = 50;
        settings.max_open_conns = 10;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_zero_query_timeout_rejected() {
        let mut settings = SqlSettings::new(DRIVER_POSTGRES, "postgres://localhost/chat");
        settings.query_timeout = 0;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_replica_lag_settings_deserialize() {
        let json = r#"{"data_source":"postgres://r1/chat","query_time_lag":"SELECT 'r1', 5"}"#;
        let lag: ReplicaLagSettings = serde_json::from_str(json).unwrap();
        assert_eq!(lag.data_source.as_deref(), Some("postgres://r1/chat"));
        assert!(lag.query_absolute_lag.is_none());
        assert!(lag.query_time_lag.is_some());
    }
}
