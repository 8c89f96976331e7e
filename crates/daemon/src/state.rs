use std::time::Duration;
use std::{fs, path::PathBuf};

use common::driver::{DriverConfig, Mode};
use serde::{Deserialize, Serialize};
use url::Url;

pub const APP_NAME: &str = "relaycheck";
pub const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Host the hubs listen on
    #[serde(default = "default_host")]
    pub host: String,
    /// Port of the first hub
    #[serde(default = "default_port")]
    pub port: u16,
    /// Port of the second hub, only used by bridged passes
    #[serde(default = "default_second_port")]
    pub second_port: u16,
    /// Fixed wait before pulling replicas back and before enumeration
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    #[serde(default = "default_bulk_count")]
    pub bulk_count: usize,
    /// Skip the direct pass
    #[serde(default)]
    pub start_bridged: bool,
    /// Relay every hub locator is provisioned through
    #[serde(default = "default_relay_url")]
    pub relay_url: Url,
    /// Host endpoint that receives log lines and the verdict,
    ///  if not set they only go to the console
    #[serde(default)]
    pub report_url: Option<Url>,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    /// Hub that requests outside of `/hub/{host}/{port}/` go to
    #[serde(default = "default_hub_url")]
    pub hub_url: Url,
    /// Served to local clients from `/relayutility/localhttpkey`
    #[serde(default)]
    pub http_key: Option<String>,
}

fn default_host() -> String {
    common::driver::DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    common::driver::DEFAULT_PORT
}

fn default_second_port() -> u16 {
    common::driver::DEFAULT_SECOND_PORT
}

fn default_settle_ms() -> u64 {
    common::driver::DEFAULT_SETTLE.as_millis() as u64
}

fn default_bulk_count() -> usize {
    common::driver::DEFAULT_BULK_COUNT
}

fn default_relay_url() -> Url {
    Url::parse("http://localhost:58000/").expect("hardcoded URL must parse")
}

fn default_listen_port() -> u16 {
    58000
}

fn default_hub_url() -> Url {
    Url::parse("http://localhost:9898/").expect("hardcoded URL must parse")
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            second_port: default_second_port(),
            settle_ms: default_settle_ms(),
            bulk_count: default_bulk_count(),
            start_bridged: false,
            relay_url: default_relay_url(),
            report_url: None,
            relay: RelayConfig::default(),
        }
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_port: default_listen_port(),
            hub_url: default_hub_url(),
            http_key: None,
        }
    }
}

impl AppConfig {
    pub fn driver_config(&self) -> DriverConfig {
        DriverConfig {
            host: self.host.clone(),
            port: self.port,
            second_port: self.second_port,
            settle: Duration::from_millis(self.settle_ms),
            bulk_count: self.bulk_count,
            start_mode: if self.start_bridged {
                Mode::Bridged
            } else {
                Mode::Direct
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppState {
    /// Path to the relaycheck directory (~/.relaycheck)
    pub config_dir: PathBuf,
    /// Path to the config file
    pub config_path: PathBuf,
    /// Loaded configuration
    pub config: AppConfig,
}

impl AppState {
    /// Get the config directory path (custom or default ~/.relaycheck)
    pub fn config_dir(custom_path: Option<PathBuf>) -> Result<PathBuf, StateError> {
        if let Some(path) = custom_path {
            return Ok(path);
        }

        let home = dirs::home_dir().ok_or(StateError::NoHomeDirectory)?;
        Ok(home.join(format!(".{}", APP_NAME)))
    }

    /// Initialize a new config directory
    pub fn init(
        custom_path: Option<PathBuf>,
        config: Option<AppConfig>,
    ) -> Result<Self, StateError> {
        let config_dir = Self::config_dir(custom_path)?;

        if config_dir.exists() {
            return Err(StateError::AlreadyInitialized);
        }

        fs::create_dir_all(&config_dir)?;

        let config = config.unwrap_or_default();
        let config_path = config_dir.join(CONFIG_FILE_NAME);
        let config_toml = toml::to_string_pretty(&config)?;
        fs::write(&config_path, config_toml)?;

        Ok(Self {
            config_dir,
            config_path,
            config,
        })
    }

    /// Load existing state from the config directory
    pub fn load(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        let config_dir = Self::config_dir(custom_path)?;

        if !config_dir.exists() {
            return Err(StateError::NotInitialized);
        }

        let config_path = config_dir.join(CONFIG_FILE_NAME);
        if !config_path.exists() {
            return Err(StateError::MissingFile(CONFIG_FILE_NAME.to_string()));
        }

        let config_toml = fs::read_to_string(&config_path)?;
        let config: AppConfig = toml::from_str(&config_toml)?;

        Ok(Self {
            config_dir,
            config_path,
            config,
        })
    }

    /// Load the config directory, or fall back to the defaults if it was never initialized
    pub fn load_or_default(custom_path: Option<PathBuf>) -> Result<Self, StateError> {
        match Self::load(custom_path.clone()) {
            Err(StateError::NotInitialized) => {
                let config_dir = Self::config_dir(custom_path)?;
                tracing::debug!(dir = %config_dir.display(), "no config directory, using defaults");
                Ok(Self {
                    config_path: config_dir.join(CONFIG_FILE_NAME),
                    config_dir,
                    config: AppConfig::default(),
                })
            }
            other => other,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("relaycheck directory not initialized. Run 'relaycheck init' first")]
    NotInitialized,

    #[error("relaycheck directory already initialized")]
    AlreadyInitialized,

    #[error("no home directory found")]
    NoHomeDirectory,

    #[error("missing required file: {0}")]
    MissingFile(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state");

        let config = AppConfig {
            port: 7000,
            start_bridged: true,
            ..AppConfig::default()
        };
        let state = AppState::init(Some(path.clone()), Some(config.clone())).unwrap();
        assert!(state.config_path.exists());

        let loaded = AppState::load(Some(path.clone())).unwrap();
        assert_eq!(loaded.config, config);

        assert!(matches!(
            AppState::init(Some(path), None),
            Err(StateError::AlreadyInitialized)
        ));
    }

    #[test]
    fn test_load_uninitialized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing");

        assert!(matches!(
            AppState::load(Some(path.clone())),
            Err(StateError::NotInitialized)
        ));

        let state = AppState::load_or_default(Some(path)).unwrap();
        assert_eq!(state.config, AppConfig::default());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE_NAME),
            "settle_ms = 50\n\n[relay]\nhttp_key = \"secret\"\n",
        )
        .unwrap();

        let state = AppState::load(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(state.config.settle_ms, 50);
        assert_eq!(state.config.port, 9898);
        assert_eq!(state.config.relay.listen_port, 58000);
        assert_eq!(state.config.relay.http_key.as_deref(), Some("secret"));
    }

    #[test]
    fn test_driver_config_from_app_config() {
        let config = AppConfig {
            settle_ms: 10,
            start_bridged: true,
            ..AppConfig::default()
        };
        let driver = config.driver_config();
        assert_eq!(driver.settle, Duration::from_millis(10));
        assert_eq!(driver.start_mode, Mode::Bridged);
        assert_eq!(driver.second_port, 9899);
    }
}
