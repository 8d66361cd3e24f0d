//! Link configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via LINKFRAME_CONFIG or --config)
//! 3. Environment variables

use linkframe_codec::{
    chunk_bits, Address, InvalidFramePolicy, Scheme, DEFAULT_FRAME_SIZE, DEFAULT_PORT,
};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Link configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Addresses written into frame headers.
    pub addressing: AddressingConfig,
    /// Transport endpoints and timeouts.
    pub network: NetworkConfig,
    /// Frame size and redundancy scheme.
    pub framing: FramingConfig,
    /// Receiver behaviour.
    pub receiver: ReceiverConfig,
}

impl Config {
    /// Loads configuration from file, then applies environment variable overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Ok(path) = std::env::var("LINKFRAME_CONFIG") {
            config = Self::from_file(&path)?;
        }

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Loads `path` if given, otherwise behaves like [`Config::load`].
    pub fn load_from(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                let mut config = Self::from_file(path)?;
                config.apply_env_overrides();
                config.validate()?;
                Ok(config)
            }
            None => Self::load(),
        }
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        self.addressing.apply_env_overrides();
        self.network.apply_env_overrides();
        self.framing.apply_env_overrides();
        self.receiver.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.framing.validate()
    }

    /// Saves configuration to a YAML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let content = serde_yaml::to_string(self)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        std::fs::write(path, content).map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        Ok(())
    }
}

/// Header addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressingConfig {
    pub sender: Address,
    pub receiver: Address,
}

impl Default for AddressingConfig {
    fn default() -> Self {
        Self {
            sender: Address::new(Ipv4Addr::LOCALHOST, 0),
            receiver: Address::new(Ipv4Addr::LOCALHOST, DEFAULT_PORT),
        }
    }
}

impl AddressingConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(ip) = std::env::var("LINKFRAME_SENDER_IP") {
            if let Ok(parsed) = ip.trim().parse() {
                self.sender.ip = parsed;
            }
        }
        if let Ok(port) = std::env::var("LINKFRAME_SENDER_PORT") {
            if let Ok(parsed) = port.trim().parse() {
                self.sender.port = parsed;
            }
        }
        if let Ok(ip) = std::env::var("LINKFRAME_RECEIVER_IP") {
            if let Ok(parsed) = ip.trim().parse() {
                self.receiver.ip = parsed;
            }
        }
        if let Ok(port) = std::env::var("LINKFRAME_RECEIVER_PORT") {
            if let Ok(parsed) = port.trim().parse() {
                self.receiver.port = parsed;
            }
        }
    }
}

/// Transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// Address the sender connects to.
    #[serde(with = "socket_addr_serde")]
    pub peer_addr: SocketAddr,
    /// Address the receiver listens on.
    #[serde(with = "socket_addr_serde")]
    pub bind_addr: SocketAddr,
    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Receiver idle timeout in seconds (0 = wait forever).
    pub idle_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        let local = SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT));
        Self {
            peer_addr: local,
            bind_addr: local,
            connect_timeout_secs: 10,
            idle_timeout_secs: 0,
        }
    }
}

impl NetworkConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(addr) = std::env::var("LINKFRAME_PEER") {
            if let Ok(parsed) = addr.parse() {
                self.peer_addr = parsed;
            }
        }

        if let Ok(addr) = std::env::var("LINKFRAME_BIND") {
            if let Ok(parsed) = addr.parse() {
                self.bind_addr = parsed;
            }
        }

        if let Ok(timeout) = std::env::var("LINKFRAME_CONNECT_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.connect_timeout_secs = secs;
            }
        }

        if let Ok(timeout) = std::env::var("LINKFRAME_IDLE_TIMEOUT") {
            if let Ok(secs) = timeout.parse() {
                self.idle_timeout_secs = secs;
            }
        }
    }

    /// Returns connect timeout as Duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the idle timeout, if one is set.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_secs > 0).then(|| Duration::from_secs(self.idle_timeout_secs))
    }
}

/// Framing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FramingConfig {
    pub scheme: Scheme,
    /// Serialized frame size in bytes.
    pub frame_size_bytes: usize,
}

impl Default for FramingConfig {
    fn default() -> Self {
        Self {
            scheme: Scheme::Crc16,
            frame_size_bytes: DEFAULT_FRAME_SIZE,
        }
    }
}

impl FramingConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(scheme) = std::env::var("LINKFRAME_SCHEME") {
            if let Ok(parsed) = scheme.parse() {
                self.scheme = parsed;
            }
        }

        if let Ok(size) = std::env::var("LINKFRAME_FRAME_SIZE") {
            if let Ok(bytes) = size.parse() {
                self.frame_size_bytes = bytes;
            }
        }
    }

    /// Checks that the frame size leaves room for payload.
    pub fn validate(&self) -> Result<(), ConfigError> {
        chunk_bits(self.frame_size_bytes, self.scheme)
            .map(|_| ())
            .map_err(|e| ConfigError::ValidationError(e.to_string()))
    }
}

/// Receiver configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ReceiverConfig {
    /// What to do with frames that fail validation.
    pub invalid_policy: InvalidFramePolicy,
    /// Where to write the reassembled payload.
    pub output: Option<PathBuf>,
}

impl ReceiverConfig {
    fn apply_env_overrides(&mut self) {
        if let Ok(policy) = std::env::var("LINKFRAME_INVALID_POLICY") {
            if let Ok(parsed) = policy.parse() {
                self.invalid_policy = parsed;
            }
        }
    }
}

/// Configuration error.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{}': {1}", .0.display())]
    IoError(PathBuf, std::io::Error),

    #[error("failed to parse config file '{}': {1}", .0.display())]
    ParseError(PathBuf, String),

    #[error("configuration validation failed: {0}")]
    ValidationError(String),
}

/// Custom serde module for SocketAddr (to handle as string in YAML).
mod socket_addr_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::net::SocketAddr;

    pub fn serialize<S>(addr: &SocketAddr, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&addr.to_string())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<SocketAddr, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.network.bind_addr.port(), 12345);
        assert_eq!(config.network.peer_addr, config.network.bind_addr);
        assert_eq!(config.framing.scheme, Scheme::Crc16);
        assert_eq!(config.framing.frame_size_bytes, 64);
        assert_eq!(config.receiver.invalid_policy, InvalidFramePolicy::Drop);
        assert_eq!(config.network.idle_timeout(), None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.framing.scheme = Scheme::Crc32;
        config.addressing.sender = "10.1.2.3:4000".parse().unwrap();

        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed.network.bind_addr, config.network.bind_addr);
        assert_eq!(parsed.framing.scheme, Scheme::Crc32);
        assert_eq!(parsed.addressing.sender, config.addressing.sender);
    }

    #[test]
    fn test_partial_yaml_uses_defaults() {
        let yaml = "framing:\n  scheme: crc-8\nreceiver:\n  invalid_policy: append\n";
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.framing.scheme, Scheme::Crc8);
        assert_eq!(config.framing.frame_size_bytes, 64);
        assert_eq!(config.receiver.invalid_policy, InvalidFramePolicy::Append);
        assert_eq!(config.network.connect_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "network:\n  idle_timeout_secs: 5\n  bind_addr: \"0.0.0.0:9000\"").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.network.idle_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(config.network.bind_addr.port(), 9000);
    }

    #[test]
    fn test_from_file_errors() {
        let err = Config::from_file("/nonexistent/linkframe.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "framing:\n  scheme: parity").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
    }

    #[test]
    fn test_validate_rejects_small_frames() {
        let mut config = Config::default();
        config.framing.frame_size_bytes = 16;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("16 bytes"));
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.yaml");

        let mut config = Config::default();
        config.framing.frame_size_bytes = 128;
        config.save(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.framing.frame_size_bytes, 128);
    }
}
