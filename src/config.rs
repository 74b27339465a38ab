/// Configuration management for the registry core.
///
/// Mirrors the teacher's layering: defaults, optional TOML file, then
/// environment variable overrides, with validation before use.
use crate::compatibility::CompatibilityPolicy;
use crate::error::{RegistryError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub log: LogConfig,
    pub registry: RegistryConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            log: LogConfig::default(),
            registry: RegistryConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            request_timeout_secs: 30,
        }
    }
}

/// Durable command log configuration (the in-scope stand-in for the
/// external append-only log collaborator named in spec.md §1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub dir: PathBuf,
    pub max_segment_bytes: usize,
    pub sync_on_write: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./registry-log"),
            max_segment_bytes: 64 * 1024 * 1024,
            sync_on_write: true,
        }
    }
}

/// Registry-wide defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Global default compatibility policy. Must default to NONE per spec.
    pub default_compatibility: CompatibilityPolicy,
    /// Whether this node starts as primary (single-node bootstrap) or replica.
    pub start_as_primary: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            default_compatibility: CompatibilityPolicy::None,
            start_as_primary: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Pretty,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref())
            .map_err(|e| RegistryError::Fatal(format!("failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| RegistryError::InvalidSchema(format!("invalid config format: {}", e)))
    }

    /// Load overrides from REGISTRY_-prefixed environment variables.
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();

        if let Ok(host) = std::env::var("REGISTRY_HOST") {
            config.server.host = host;
        }
        if let Ok(port) = std::env::var("REGISTRY_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| RegistryError::InvalidSchema("invalid REGISTRY_PORT".to_string()))?;
        }
        if let Ok(dir) = std::env::var("REGISTRY_LOG_DIR") {
            config.log.dir = PathBuf::from(dir);
        }
        if let Ok(policy) = std::env::var("REGISTRY_COMPATIBILITY") {
            config.registry.default_compatibility = policy
                .parse()
                .map_err(|_| RegistryError::InvalidSchema("invalid REGISTRY_COMPATIBILITY".to_string()))?;
        }

        Ok(config)
    }

    /// Load with fallback priority: file, then env overrides, then defaults.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut config = if let Some(path) = config_path {
            if path.exists() {
                tracing::info!("loading config from: {}", path.display());
                Self::from_file(path)?
            } else {
                tracing::warn!("config file not found: {}, using defaults", path.display());
                Config::default()
            }
        } else {
            Config::default()
        };

        if let Ok(env_config) = Self::from_env() {
            config.merge_env(env_config);
        }

        config.validate()?;

        Ok(config)
    }

    fn merge_env(&mut self, env_config: Config) {
        if env_config.server.host != ServerConfig::default().host {
            self.server.host = env_config.server.host;
        }
        if env_config.server.port != ServerConfig::default().port {
            self.server.port = env_config.server.port;
        }
        if env_config.log.dir != LogConfig::default().dir {
            self.log.dir = env_config.log.dir;
        }
        if env_config.registry.default_compatibility != RegistryConfig::default().default_compatibility {
            self.registry.default_compatibility = env_config.registry.default_compatibility;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            return Err(RegistryError::InvalidSchema("server port cannot be 0".to_string()));
        }
        if self.log.dir.as_os_str().is_empty() {
            return Err(RegistryError::InvalidSchema("log directory path cannot be empty".to_string()));
        }
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml = toml::to_string_pretty(self)
            .map_err(|e| RegistryError::InvalidSchema(format!("failed to serialize config: {}", e)))?;
        fs::write(path.as_ref(), toml)
            .map_err(|e| RegistryError::Fatal(format!("failed to write config file: {}", e)))?;
        Ok(())
    }

    pub fn example() -> String {
        toml::to_string_pretty(&Config::default()).unwrap_or_else(|_| String::from("# failed to generate example config"))
    }
}
