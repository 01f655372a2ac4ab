use crate::shared::error::ConfigError;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Loads `KEY=value` lines from `path` into the process environment.
/// Variables that are already set are left alone. Returns `false` when the
/// file does not exist.
pub fn load_env_file(path: &Path) -> Result<bool, dotenvy::Error> {
    match dotenvy::from_path(path) {
        Ok(()) => Ok(true),
        Err(e) if e.not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

/// Process configuration, read once at startup from the environment (or the
/// equivalent flags).
#[derive(Parser, Debug, Clone)]
#[command(author, version, about = "Samples host CPU and memory usage and serves the history over HTTP", long_about = None)]
pub struct Config {
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub db_host: String,

    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub db_user: String,

    #[arg(long, env = "DB_PASS", default_value = "", hide_env_values = true)]
    pub db_pass: String,

    #[arg(long, env = "DB_NAME", default_value = "metrics")]
    pub db_name: String,

    #[arg(long, env = "DB_PORT", default_value_t = 5432)]
    pub db_port: u16,

    /// Use a SQLite database at this path (or `:memory:`) instead of Postgres.
    #[arg(long = "sqlite-path", env = "DB_SQLITE_PATH")]
    pub sqlite_path: Option<PathBuf>,

    /// HTTP listen port.
    #[arg(long, env = "PORT", default_value_t = 8080)]
    pub port: u16,

    /// Seconds between samples.
    #[arg(long = "interval", env = "METRICS_INTERVAL_SECONDS", default_value_t = 5)]
    pub interval_secs: u64,

    /// Seconds to wait for in-flight samples on shutdown.
    #[arg(long = "grace-period", env = "SHUTDOWN_GRACE_SECONDS", default_value_t = 1)]
    pub grace_period_secs: u64,

    /// Seconds allowed for closing the HTTP server and the database.
    #[arg(long = "shutdown-timeout", env = "SHUTDOWN_TIMEOUT_SECONDS", default_value_t = 2)]
    pub shutdown_timeout_secs: u64,
}

/// Where samples are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseTarget {
    Postgres {
        host: String,
        port: u16,
        user: String,
        password: String,
        database: String,
    },
    Sqlite(PathBuf),
}

impl Config {
    pub fn database(&self) -> DatabaseTarget {
        match &self.sqlite_path {
            Some(path) => DatabaseTarget::Sqlite(path.clone()),
            None => DatabaseTarget::Postgres {
                host: self.db_host.clone(),
                port: self.db_port,
                user: self.db_user.clone(),
                password: self.db_pass.clone(),
                database: self.db_name.clone(),
            },
        }
    }

    pub fn listen_addr(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    pub fn collector(&self) -> Result<CollectorConfig, ConfigError> {
        CollectorConfig::new(Duration::from_secs(self.interval_secs))
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Fixed for the lifetime of a collector loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectorConfig {
    interval: Duration,
}

impl CollectorConfig {
    pub fn new(interval: Duration) -> Result<Self, ConfigError> {
        if interval.is_zero() {
            return Err(ConfigError::InvalidInterval);
        }
        Ok(Self { interval })
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_interval_is_rejected() {
        assert!(matches!(
            CollectorConfig::new(Duration::ZERO),
            Err(ConfigError::InvalidInterval)
        ));
        assert_eq!(
            CollectorConfig::new(Duration::from_millis(250)).unwrap().interval(),
            Duration::from_millis(250)
        );
    }

    #[test]
    fn flags_override_defaults() {
        let config = Config::try_parse_from([
            "metrics-monitor",
            "--db-host",
            "db.internal",
            "--db-port",
            "6543",
            "--port",
            "9090",
            "--interval",
            "30",
        ])
        .unwrap();

        assert_eq!(config.listen_addr().port(), 9090);
        assert_eq!(config.collector().unwrap().interval(), Duration::from_secs(30));
        match config.database() {
            DatabaseTarget::Postgres { host, port, .. } => {
                assert_eq!(host, "db.internal");
                assert_eq!(port, 6543);
            }
            other => panic!("unexpected target {:?}", other),
        }
    }

    #[test]
    fn sqlite_path_selects_sqlite() {
        let config =
            Config::try_parse_from(["metrics-monitor", "--sqlite-path", ":memory:"]).unwrap();
        assert_eq!(config.database(), DatabaseTarget::Sqlite(PathBuf::from(":memory:")));
    }

    #[test]
    fn zero_interval_flag_fails_validation() {
        let config = Config::try_parse_from(["metrics-monitor", "--interval", "0"]).unwrap();
        assert!(config.collector().is_err());
    }
}
