//! Configuration management for formrelay.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Directory name used under the platform config dir.
const APP_DIR_NAME: &str = "formrelay";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `FORMRELAY_`)
/// 2. TOML config file at `~/.config/formrelay/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP front-end configuration.
    pub http: HttpConfig,
    /// Datagram relay configuration.
    pub relay: RelayConfig,
    /// Collector configuration.
    pub collector: CollectorConfig,
    /// Persisted log configuration.
    pub storage: StorageConfig,
    /// Process log configuration.
    pub logging: LoggingConfig,
}

/// HTTP front-end configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Port the front-end listens on (all interfaces).
    pub port: u16,
    /// Directory served as the site root.
    pub root: PathBuf,
}

/// Relay destination, which is also where the collector listens.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// IP address of the collector.
    pub host: String,
    /// UDP port of the collector.
    pub port: u16,
}

/// Collector behaviour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Send every received datagram back to its sender.
    pub echo: bool,
}

/// Persisted log location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding the persisted log; created on demand.
    pub dir: PathBuf,
    /// File name of the persisted log inside `dir`.
    pub file: String,
}

/// Process log location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// File the diagnostic log is appended to.
    pub file: PathBuf,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            root: PathBuf::from("."),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
        }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self { echo: true }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("storage"),
            file: "data.json".to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file: PathBuf::from("server.log"),
        }
    }
}

impl Config {
    /// Load configuration from all sources, with an optional custom config
    /// path in place of the default one.
    ///
    /// A missing config file is not an error; defaults and the environment
    /// still apply.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("FORMRELAY_").split("_"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(APP_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.relay.host.parse::<IpAddr>().is_err() {
            return Err(Error::config(format!(
                "relay.host must be an IP address, got {:?}",
                self.relay.host
            )));
        }

        if self.relay.port == 0 {
            return Err(Error::config("relay.port must be greater than 0"));
        }

        let file = Path::new(&self.storage.file);
        if self.storage.file.is_empty() || file.file_name() != Some(file.as_os_str()) {
            return Err(Error::config(format!(
                "storage.file must be a plain file name, got {:?}",
                self.storage.file
            )));
        }

        if self.logging.file.as_os_str().is_empty() {
            return Err(Error::config("logging.file must not be empty"));
        }

        Ok(())
    }

    /// Address the HTTP front-end binds to.
    #[must_use]
    pub fn http_addr(&self) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), self.http.port)
    }

    /// Address datagrams are relayed to and the collector listens on.
    ///
    /// # Errors
    ///
    /// Returns an error if `relay.host` is not an IP address.
    pub fn relay_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self
            .relay
            .host
            .parse()
            .map_err(|_| Error::config(format!("invalid relay.host {:?}", self.relay.host)))?;
        Ok(SocketAddr::new(ip, self.relay.port))
    }

    /// Full path of the persisted log.
    #[must_use]
    pub fn storage_path(&self) -> PathBuf {
        self.storage.dir.join(&self.storage.file)
    }

    /// Path of the process log file.
    #[must_use]
    pub fn log_path(&self) -> &Path {
        &self.logging.file
    }
}
