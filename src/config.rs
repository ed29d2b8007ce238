//! Configuration module for echo-storm.
//!
//! Supports both command-line arguments and TOML configuration file.
//! CLI arguments take precedence over config file values.

use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

/// Command-line arguments for the load client
#[derive(Parser, Debug)]
#[command(name = "echo-storm")]
#[command(author = "echo-storm authors")]
#[command(version = "0.1.0")]
#[command(about = "A concurrent load generator for TCP echo servers", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Number of concurrent echo clients to launch
    #[arg(short = 'c', long)]
    pub clients: Option<usize>,

    /// Echo server host
    #[arg(short = 's', long)]
    pub server: Option<String>,

    /// Echo server port
    #[arg(short = 'p', long)]
    pub port: Option<String>,

    /// Number of runtime worker threads (defaults to number of CPU cores)
    #[arg(short = 'w', long)]
    pub workers: Option<usize>,

    /// Log level (trace, debug, info, warn, error) [default: info]
    #[arg(long)]
    pub log_level: Option<String>,

    /// Run the fixed-packet echo server on host:port instead of the client
    #[arg(long)]
    pub serve: bool,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub client: ClientConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Load-generation settings
#[derive(Debug, Deserialize)]
pub struct ClientConfig {
    /// Number of concurrent clients
    #[serde(default = "default_clients")]
    pub clients: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            clients: default_clients(),
        }
    }
}

/// Target server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Async runtime settings
#[derive(Debug, Deserialize, Default)]
pub struct RuntimeConfig {
    /// Number of worker threads
    pub workers: Option<usize>,
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_clients() -> usize {
    20000
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> String {
    "7788".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub clients: usize,
    pub host: String,
    pub port: String,
    pub workers: Option<usize>,
    pub log_level: String,
    pub serve: bool,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_args(CliArgs::parse())
    }

    /// Merge parsed CLI args with the TOML file they point at, if any.
    /// CLI arguments take precedence over TOML file values.
    pub fn from_args(cli: CliArgs) -> Result<Self, ConfigError> {
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Ok(Config {
            clients: cli.clients.unwrap_or(toml_config.client.clients),
            host: cli.server.unwrap_or(toml_config.server.host),
            port: cli.port.unwrap_or(toml_config.server.port),
            workers: cli.workers.or(toml_config.runtime.workers),
            log_level: cli.log_level.unwrap_or(toml_config.logging.level),
            serve: cli.serve,
        })
    }

    /// Runtime worker threads to request, `None` for one per CPU core.
    /// Zero is treated the same as unset.
    pub fn worker_threads(&self) -> Option<usize> {
        self.workers.filter(|&w| w > 0)
    }

    /// Target address in `host:port` form.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            clients: default_clients(),
            host: default_host(),
            port: default_port(),
            workers: None,
            log_level: default_log_level(),
            serve: false,
        }
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
        }
    }
}

impl std::error::Error for ConfigError {}
