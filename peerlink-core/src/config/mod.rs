//! Configuration management for Peerlink
//!
//! This module provides environment-based configuration management with
//! support for TOML files, defaults, and validation.

use serde::{Deserialize, Serialize};
use std::env;
use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

mod error;

pub use error::ConfigError;

/// Default overlay protocol identifier, kept wire-compatible with existing
/// deployments of the chat example protocol.
pub const DEFAULT_PROTOCOL: &str = "/libp2p/examples/chat/1.0.0";

/// Default bootstrap relay address.
pub const DEFAULT_RELAY_ADDRESS: &str =
    "/ip4/45.32.115.124/tcp/9090/ws/p2p/12D3KooWEm7y24CfhEUAvNcQH1osnwhHt3ibGYZdKdLpezQt1r4Y";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Overlay node configuration
    pub node: NodeConfig,

    /// gRPC facade configuration
    pub grpc: GrpcConfig,

    /// Logging configuration
    pub logging: LoggingConfig,

    /// Metrics configuration
    pub metrics: MetricsConfig,
}

/// Overlay node configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Human-readable node name carried in outbound query bodies
    pub name: String,

    /// Bootstrap relay multiaddress
    pub relay_address: String,

    /// Application protocol identifier for the one-shot RPC streams
    pub protocol: String,

    /// Transport listen addresses
    pub listen_addresses: Vec<String>,

    /// Identity key file; `None` means an ephemeral identity for this run
    pub identity_path: Option<PathBuf>,

    /// Timeout applied to each dial or reachability probe
    #[serde(with = "humantime_serde")]
    pub dial_timeout: Duration,

    /// Deadline for a full outbound call (dial + exchange)
    #[serde(with = "humantime_serde")]
    pub call_timeout: Duration,

    /// Deadline for serving one inbound request
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Idle connection timeout handed to the swarm
    #[serde(with = "humantime_serde")]
    pub idle_connection_timeout: Duration,
}

/// gRPC facade configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GrpcConfig {
    /// Facade bind address
    pub bind_address: IpAddr,

    /// Facade listen port (required at startup, no useful default)
    pub port: u16,

    /// Loopback address of the local agent service
    pub agent_address: IpAddr,

    /// Port of the local agent service
    pub agent_port: u16,

    /// Deadline for one agent call; must stay below `request_timeout` so a
    /// hung agent yields a structured error to the remote caller instead of
    /// a dropped stream
    #[serde(with = "humantime_serde")]
    pub agent_timeout: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Enable JSON formatting
    pub json_format: bool,

    /// Include target module
    pub with_target: bool,

    /// Include timestamps
    pub with_timestamp: bool,
}

/// Metrics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Enable the Prometheus exporter
    pub enabled: bool,

    /// Exporter bind address
    pub bind_address: IpAddr,

    /// Exporter port
    pub port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            node: NodeConfig::default(),
            grpc: GrpcConfig::default(),
            logging: LoggingConfig::default(),
            metrics: MetricsConfig::default(),
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            name: "peerlink-node".to_string(),
            relay_address: DEFAULT_RELAY_ADDRESS.to_string(),
            protocol: DEFAULT_PROTOCOL.to_string(),
            listen_addresses: vec!["/ip4/0.0.0.0/tcp/0".to_string()],
            identity_path: None,
            dial_timeout: Duration::from_secs(5),
            call_timeout: Duration::from_secs(30),
            request_timeout: Duration::from_secs(30),
            idle_connection_timeout: Duration::from_secs(60),
        }
    }
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0".parse().unwrap(),
            port: 0,
            agent_address: "127.0.0.1".parse().unwrap(),
            agent_port: 0,
            agent_timeout: Duration::from_secs(25),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
            with_target: true,
            with_timestamp: true,
        }
    }
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bind_address: "127.0.0.1".parse().unwrap(),
            port: 9100,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    ///
    /// Environment variables follow the pattern: PEERLINK_<SECTION>_<KEY>
    /// Example: PEERLINK_NODE_RELAY_ADDRESS=/ip4/127.0.0.1/tcp/9090/ws/p2p/...
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<std::path::Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Self = toml::from_str(&contents)?;

        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<(), ConfigError> {
        // Node config
        if let Ok(name) = env::var("PEERLINK_NODE_NAME") {
            self.node.name = name;
        }
        if let Ok(relay) = env::var("PEERLINK_NODE_RELAY_ADDRESS") {
            self.node.relay_address = relay;
        }
        if let Ok(protocol) = env::var("PEERLINK_NODE_PROTOCOL") {
            self.node.protocol = protocol;
        }
        if let Ok(path) = env::var("PEERLINK_NODE_IDENTITY_PATH") {
            self.node.identity_path = Some(PathBuf::from(path));
        }

        // Grpc config
        if let Ok(port) = env::var("PEERLINK_GRPC_PORT") {
            self.grpc.port = port
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid gRPC port: {}", e)))?;
        }
        if let Ok(port) = env::var("PEERLINK_GRPC_AGENT_PORT") {
            self.grpc.agent_port = port
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid agent port: {}", e)))?;
        }

        // Logging config
        if let Ok(level) = env::var("PEERLINK_LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(json) = env::var("PEERLINK_LOG_JSON") {
            self.logging.json_format = json
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid JSON flag: {}", e)))?;
        }

        // Metrics config
        if let Ok(enabled) = env::var("PEERLINK_METRICS_ENABLED") {
            self.metrics.enabled = enabled
                .parse()
                .map_err(|e| ConfigError::InvalidValue(format!("Invalid metrics flag: {}", e)))?;
        }

        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.node.relay_address.parse::<libp2p::Multiaddr>().is_err() {
            return Err(ConfigError::ValidationFailed(format!(
                "relay_address is not a valid multiaddress: {}",
                self.node.relay_address
            )));
        }

        for addr in &self.node.listen_addresses {
            if addr.parse::<libp2p::Multiaddr>().is_err() {
                return Err(ConfigError::ValidationFailed(format!(
                    "listen address is not a valid multiaddress: {}",
                    addr
                )));
            }
        }

        if !self.node.protocol.starts_with('/') {
            return Err(ConfigError::ValidationFailed(format!(
                "protocol identifier must start with '/': {}",
                self.node.protocol
            )));
        }

        if self.node.dial_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "dial_timeout must be greater than 0".to_string(),
            ));
        }

        if self.node.call_timeout.is_zero() || self.node.request_timeout.is_zero() {
            return Err(ConfigError::ValidationFailed(
                "call_timeout and request_timeout must be greater than 0".to_string(),
            ));
        }

        if self.grpc.agent_timeout.is_zero() || self.grpc.agent_timeout >= self.node.request_timeout
        {
            return Err(ConfigError::ValidationFailed(format!(
                "agent_timeout ({:?}) must be greater than 0 and below request_timeout ({:?})",
                self.grpc.agent_timeout, self.node.request_timeout
            )));
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationFailed(format!(
                "Invalid log level: {}",
                self.logging.level
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.node.protocol, DEFAULT_PROTOCOL);
        assert_eq!(config.node.dial_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();

        config.node.relay_address = "not-a-multiaddr".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.node.protocol = "no-leading-slash".to_string();
        assert!(config.validate().is_err());

        config = Config::default();
        config.node.dial_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_agent_timeout_must_undercut_request_timeout() {
        let mut config = Config::default();
        assert!(config.grpc.agent_timeout < config.node.request_timeout);
        assert!(config.validate().is_ok());

        config.grpc.agent_timeout = config.node.request_timeout;
        assert!(config.validate().is_err());

        config.grpc.agent_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_log_level_validation() {
        let mut config = Config::default();

        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());

        config.logging.level = "debug".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = Config::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&text).unwrap();
        assert_eq!(parsed.node.relay_address, config.node.relay_address);
        assert_eq!(parsed.node.call_timeout, config.node.call_timeout);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let parsed: Config = toml::from_str("[node]\nname = \"alpha\"\n").unwrap();
        assert_eq!(parsed.node.name, "alpha");
        assert_eq!(parsed.node.protocol, DEFAULT_PROTOCOL);
        assert_eq!(parsed.metrics.port, 9100);
    }

    #[test]
    fn test_from_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("peerlink.toml");
        std::fs::write(&path, "[node]\nname = \"alpha\"\ndial_timeout = \"2s\"\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.node.name, "alpha");
        assert_eq!(config.node.dial_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_from_file_error_kinds() {
        assert!(matches!(
            Config::from_file("/nonexistent/peerlink.toml"),
            Err(ConfigError::Io(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.toml");
        std::fs::write(&path, "[node\nname = ").unwrap();
        assert!(matches!(
            Config::from_file(&path),
            Err(ConfigError::Parse(_))
        ));
    }
}
