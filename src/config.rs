//! Configuration manager for userpages.

use std::fs::File;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::FromRef;
use serde::{Deserialize, Serialize};

use crate::AppState;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";
const DEFAULT_NAME: &str = "userpages";
const DEFAULT_PORT: u16 = 5001;
const DEFAULT_TIMEOUT_SECS: u64 = 10;
const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_MONGODB_URI: &str = "mongodb://localhost:27017";
pub const DEFAULT_DATABASE_NAME: &str = "userpages";
pub const DEFAULT_COLLECTION_NAME: &str = "users";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Instance name.
    pub name: String,
    /// Interface to bind.
    pub address: IpAddr,
    /// Port to listen on. Overridden by `PORT`.
    pub port: u16,
    /// Seconds before an unfinished request is answered with `408`.
    pub timeout: u64,
    #[serde(skip_deserializing)]
    pub version: String,
    #[serde(skip)]
    path: PathBuf,
    /// Related to MongoDB configuration.
    #[serde(skip_serializing)]
    pub mongodb: MongoDb,
    /// Related to logs, traces and metrics.
    #[serde(skip_serializing)]
    pub telemetry: Telemetry,
}

/// MongoDB configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MongoDb {
    /// Connection string. Overridden by `MONGODB_URI`.
    pub uri: String,
    /// Database name. Overridden by `MONGODB_DATABASE`.
    pub database: String,
    /// Collection holding user documents.
    pub collection: String,
    /// Maximum pool connections.
    pub pool_size: Option<u32>,
}

impl Default for MongoDb {
    fn default() -> Self {
        Self {
            uri: DEFAULT_MONGODB_URI.into(),
            database: DEFAULT_DATABASE_NAME.into(),
            collection: DEFAULT_COLLECTION_NAME.into(),
            pool_size: None,
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Telemetry {
    /// OTLP collector (gRPC) receiving traces and logs. Disabled if unset.
    pub otlp_endpoint: Option<String>,
    /// Expose Prometheus metrics on `/metrics`.
    pub metrics: bool,
}

impl Default for Telemetry {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            metrics: true,
        }
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: DEFAULT_NAME.into(),
            address: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT_SECS,
            version: VERSION.to_owned(),
            path: PathBuf::default(),
            mongodb: MongoDb::default(),
            telemetry: Telemetry::default(),
        }
    }
}

impl FromRef<AppState> for Arc<Configuration> {
    fn from_ref(state: &AppState) -> Arc<Configuration> {
        Arc::clone(&state.config)
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    /// Socket address to bind.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.address, self.port)
    }

    /// Request timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location, then applies environment overrides.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            self.path.clone()
        } else {
            Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        let config = match File::open(&file_path) {
            Ok(file) => match serde_yaml::from_reader::<_, Configuration>(file) {
                Ok(config) => config,
                Err(err) => self.error(err),
            },
            Err(err) => self.error(err),
        };

        Arc::new(config.with_env(|key| std::env::var(key).ok()))
    }

    /// Apply `PORT`, `MONGODB_URI` and `MONGODB_DATABASE` overrides.
    fn with_env(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(port) = var("PORT") {
            match port.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(%port, "ignoring invalid `PORT`"),
            }
        }
        if let Some(uri) = var("MONGODB_URI").filter(|uri| !uri.is_empty()) {
            self.mongodb.uri = uri;
        }
        if let Some(db) = var("MONGODB_DATABASE").filter(|db| !db.is_empty()) {
            self.mongodb.database = db;
        }

        self.version = VERSION.to_owned();
        self
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(error = %err, "`config.yaml` cannot be read, using defaults");
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config: Configuration = serde_yaml::from_str(
            "name: staging\nmongodb:\n  uri: mongodb://db:27017\n  pool_size: 4\n",
        )
        .unwrap();

        assert_eq!(config.name, "staging");
        assert_eq!(config.port, DEFAULT_PORT);
        assert_eq!(config.mongodb.uri, "mongodb://db:27017");
        assert_eq!(config.mongodb.database, DEFAULT_DATABASE_NAME);
        assert_eq!(config.mongodb.collection, DEFAULT_COLLECTION_NAME);
        assert_eq!(config.mongodb.pool_size, Some(4));
        assert!(config.telemetry.metrics);
    }

    #[test]
    fn test_env_overrides() {
        let env = HashMap::from([
            ("PORT", "8080"),
            ("MONGODB_URI", "mongodb://other:27017"),
            ("MONGODB_DATABASE", ""),
        ]);
        let config = Configuration::default()
            .with_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.port, 8080);
        assert_eq!(config.mongodb.uri, "mongodb://other:27017");
        assert_eq!(config.mongodb.database, DEFAULT_DATABASE_NAME);
    }

    #[test]
    fn test_invalid_port_is_ignored() {
        let config = Configuration::default()
            .with_env(|key| (key == "PORT").then(|| "http".to_string()));
        assert_eq!(config.port, DEFAULT_PORT);
    }

    #[test]
    fn test_missing_file_falls_back() {
        let config = Configuration::default()
            .path(PathBuf::from("does/not/exist.yaml"))
            .read();
        assert_eq!(config.version, VERSION);
        assert_eq!(config.timeout(), Duration::from_secs(DEFAULT_TIMEOUT_SECS));
    }
}
