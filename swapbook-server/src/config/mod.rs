//! Configuration module for swapbook-server.
//!
//! Resolves the data directory, reads the optional TOML file, applies CLI
//! overrides and validates the result.

pub mod file;

use crate::config::file::FileConfig;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use swapbook_core::config::NodeConfig;
use swapbook_core::net::PeerInfo;
use thiserror::Error;

/// Name of the config file looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "swapbook.toml";

/// Errors that can occur during configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("validation error: {0}")]
    ValidationError(String),
}

/// Fully resolved settings for one server process.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub node: NodeConfig,
    pub api_listen: SocketAddr,
    pub p2p_listen: SocketAddr,
}

/// Values taken from the command line.
#[derive(Debug, Clone)]
pub struct CliOverrides {
    pub port: u16,
    pub api_port: u16,
    pub config_path: Option<PathBuf>,
}

/// Configuration loader that handles the complete loading process.
pub struct ConfigLoader {
    data_dir: PathBuf,
    overrides: CliOverrides,
}

impl ConfigLoader {
    pub fn new(data_dir: impl AsRef<Path>, overrides: CliOverrides) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            overrides,
        }
    }

    /// Where the config file is read from.
    pub fn config_path(&self) -> PathBuf {
        self.overrides
            .config_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(CONFIG_FILE_NAME))
    }

    /// Load and process the configuration.
    ///
    /// An explicit `--config` must exist; the default location is optional.
    pub fn load(&self) -> Result<LoadedConfig, ConfigError> {
        let path = self.config_path();
        let file_config = if self.overrides.config_path.is_some() || path.exists() {
            let content = std::fs::read_to_string(&path)?;
            tracing::info!(path = %path.display(), "Configuration file loaded");
            toml::from_str(&content)?
        } else {
            FileConfig::default()
        };
        self.build(file_config)
    }

    fn build(&self, file: FileConfig) -> Result<LoadedConfig, ConfigError> {
        validate_port(self.overrides.port)?;
        validate_port(self.overrides.api_port)?;
        if self.overrides.port == self.overrides.api_port {
            return Err(ConfigError::ValidationError(
                "--port and --api-port must differ".to_string(),
            ));
        }

        let node = &file.node;
        let positive = [
            ("dial_timeout_secs", node.dial_timeout_secs),
            ("reconnect_interval_secs", node.reconnect_interval_secs),
            ("resubscribe_interval_secs", node.resubscribe_interval_secs),
            ("gc_interval_secs", node.gc_interval_secs),
            ("order_ttl_days", node.order_ttl_days),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ValidationError(format!(
                "node.{name} must be greater than zero"
            )));
        }
        if node.event_buffer == 0 {
            return Err(ConfigError::ValidationError(
                "node.event_buffer must be greater than zero".to_string(),
            ));
        }

        let bootstrap_peers = file
            .network
            .bootstrap_peers
            .iter()
            .map(|addr| PeerInfo::parse(addr))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| ConfigError::ValidationError(format!("network.bootstrap_peers: {e}")))?;

        let node_config = NodeConfig {
            min_subscribers: node.min_subscribers,
            provider_query_limit: node.provider_query_limit,
            dial_timeout: Duration::from_secs(node.dial_timeout_secs),
            reconnect_interval: Duration::from_secs(node.reconnect_interval_secs),
            resubscribe_interval: Duration::from_secs(node.resubscribe_interval_secs),
            gc_interval: Duration::from_secs(node.gc_interval_secs),
            order_ttl: Duration::from_secs(node.order_ttl_days.saturating_mul(24 * 60 * 60)),
            request_snapshot_on_connect: node.request_snapshot_on_connect,
            event_buffer: node.event_buffer,
            bootstrap_peers,
            ..NodeConfig::default()
        };

        Ok(LoadedConfig {
            node: node_config,
            api_listen: SocketAddr::new(file.api.host, self.overrides.api_port),
            p2p_listen: SocketAddr::new(file.network.host, self.overrides.port),
        })
    }
}

fn validate_port(port: u16) -> Result<(), ConfigError> {
    if port == 0 {
        return Err(ConfigError::ValidationError(
            "You must specify a port".to_string(),
        ));
    }
    Ok(())
}
