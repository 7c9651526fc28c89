use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{Parser, ValueEnum};
use serde::Deserialize;
use thiserror::Error;
use tracing::info;

use tokio::sync::Semaphore;

use crate::store::StoreOptions;
use crate::store::client::DEFAULT_MAX_ACTIVE;

/// Store host used when neither environment nor config file name one
pub const DEFAULT_HOST: &str = "localhost";
/// Store port used when neither environment nor config file name one
pub const DEFAULT_PORT: u16 = 6379;
/// HTTP listening address
pub const DEFAULT_LISTEN_ADDR: &str = "0.0.0.0:3000";

/// Storage layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
  /// One key per username, raw message as value
  Keyed,
  /// One JSON array of messages under a fixed key, primary/replica split
  List,
}

/// Command line arguments
#[derive(Debug, Clone, Parser)]
#[command(name = "msgboard", version, about = "Message board over a Redis-compatible store")]
pub struct Args {
  /// Storage layout
  #[arg(long, value_enum, default_value_t = Mode::Keyed)]
  pub mode: Mode,

  /// JSON config file with `RedisHost`/`RedisPort` (keyed mode)
  #[arg(long, default_value = "config.json")]
  pub config: PathBuf,

  /// HTTP listening address
  #[arg(long, default_value = DEFAULT_LISTEN_ADDR)]
  pub listen: String,

  /// Answer malformed bodies with 400 and store failures with 503
  #[arg(long)]
  pub strict: bool,

  /// Bound on dialing the store and on each command, in milliseconds
  #[arg(long, default_value_t = 5000)]
  pub store_timeout_ms: u64,

  /// Store commands in flight at once per endpoint
  #[arg(long, default_value_t = DEFAULT_MAX_ACTIVE)]
  pub max_active: usize,

  /// Largest accepted request body in bytes; unlimited when unset
  #[arg(long)]
  pub max_body_bytes: Option<usize>,

  /// Log level when RUST_LOG is not set
  #[arg(long, default_value = "info")]
  pub log_level: String,
}

impl Args {
  fn store_options(&self) -> Result<StoreOptions, ConfigError> {
    if self.store_timeout_ms == 0 {
      return Err(ConfigError::OutOfRange {
        option: "--store-timeout-ms",
        value: 0,
        range: "at least 1".to_string(),
      });
    }

    if self.max_active == 0 || self.max_active > Semaphore::MAX_PERMITS {
      return Err(ConfigError::OutOfRange {
        option: "--max-active",
        value: self.max_active as u64,
        range: format!("1..={}", Semaphore::MAX_PERMITS),
      });
    }

    Ok(StoreOptions {
      max_active: self.max_active,
      timeout: Duration::from_millis(self.store_timeout_ms),
    })
  }
}

/// Host and port of a store endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEndpoint {
  pub host: String,
  pub port: u16,
}

impl StoreEndpoint {
  pub fn new(host: impl Into<String>, port: u16) -> Self {
    Self {
      host: host.into(),
      port,
    }
  }
}

impl fmt::Display for StoreEndpoint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}:{}", self.host, self.port)
  }
}

/// Resolved store settings. In keyed mode primary and replica are the
/// same endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct StoreConfig {
  pub primary: StoreEndpoint,
  pub replica: StoreEndpoint,
  pub password: String,
  pub options: StoreOptions,
}

/// Contents of the JSON config file
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct FileConfig {
  pub redis_host: Option<String>,
  pub redis_port: Option<String>,
}

impl FileConfig {
  /// Load configuration from a JSON file
  pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;

    serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }
}

/// Application configuration, built once at startup
#[derive(Debug, Clone)]
pub struct Config {
  pub mode: Mode,
  pub listen_addr: String,
  pub strict: bool,
  pub max_body_bytes: Option<usize>,
  pub store: StoreConfig,
}

impl Config {
  /// Build configuration from arguments, the process environment and, in
  /// keyed mode, the config file. A missing or unparsable file is an error.
  pub fn load(args: &Args) -> Result<Self, ConfigError> {
    let options = args.store_options()?;
    let file = match args.mode {
      Mode::Keyed => FileConfig::from_file(&args.config)?,
      Mode::List => FileConfig::default(),
    };

    let store = resolve_store(
      args.mode,
      &file,
      &|key| std::env::var(key).ok(),
      options,
    )?;

    info!(
      "Store primary {}, replica {}, password {}",
      store.primary,
      store.replica,
      if store.password.is_empty() { "unset" } else { "set" }
    );

    Ok(Self {
      mode: args.mode,
      listen_addr: args.listen.clone(),
      strict: args.strict,
      max_body_bytes: args.max_body_bytes,
      store,
    })
  }
}

/// Resolve store settings: environment first, then the config file, then
/// built-in defaults. Empty values count as unset.
pub fn resolve_store(
  mode: Mode,
  file: &FileConfig,
  env: &dyn Fn(&str) -> Option<String>,
  options: StoreOptions,
) -> Result<StoreConfig, ConfigError> {
  let lookup = |key: &str| env(key).filter(|v| !v.is_empty());
  let from_file = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

  let port = match lookup("REDIS_PORT").or_else(|| from_file(&file.redis_port)) {
    Some(raw) => parse_port(&raw)?,
    None => DEFAULT_PORT,
  };
  let password = lookup("REDIS_PASSWORD").unwrap_or_default();

  let (primary, replica) = match mode {
    Mode::Keyed => {
      let host = lookup("REDIS_HOST")
        .or_else(|| from_file(&file.redis_host))
        .unwrap_or_else(|| DEFAULT_HOST.to_string());
      (host.clone(), host)
    }
    Mode::List => (
      lookup("REDIS_MASTER_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
      lookup("REDIS_SLAVE_HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
    ),
  };

  Ok(StoreConfig {
    primary: StoreEndpoint::new(primary, port),
    replica: StoreEndpoint::new(replica, port),
    password,
    options,
  })
}

fn parse_port(raw: &str) -> Result<u16, ConfigError> {
  raw.trim().parse().map_err(|source| ConfigError::InvalidPort {
    value: raw.to_string(),
    source,
  })
}

/// Startup configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
  #[error("failed to read config file '{}': {source}", .path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse config file '{}': {source}", .path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid store port '{value}': {source}")]
  InvalidPort {
    value: String,
    #[source]
    source: std::num::ParseIntError,
  },

  #[error("{option} must be {range}, got {value}")]
  OutOfRange {
    option: &'static str,
    value: u64,
    range: String,
  },
}
