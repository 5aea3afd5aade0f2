//! Configuration loading and typed config structures for the Lifesync
//! server.
//!
//! The canonical configuration lives in `lifesync-config.yaml` next to the
//! binary's working directory. Every field has a default, so an empty or
//! missing file yields a runnable server (200 x 200 torus, 100 ms ticks,
//! port 8080, patterns under `patterns/`).

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::engine::Boundary;

/// Smallest accepted tick interval in milliseconds.
pub const MIN_TICK_INTERVAL_MS: u64 = 10;

/// Smallest per-session outbox: a new session is handed a `grid` and a
/// `status` frame before anything else.
pub const MIN_CLIENT_BUFFER: usize = 2;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The file parsed but a value is out of range.
    #[error("invalid configuration: {reason}")]
    Invalid {
        /// Explanation of what is wrong with the configuration.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
///
/// Mirrors the structure of `lifesync-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct LifesyncConfig {
    /// Grid dimensions, boundary policy, and randomization.
    #[serde(default)]
    pub grid: GridConfig,

    /// Tick cadence.
    #[serde(default)]
    pub simulation: SimulationConfig,

    /// Listener and per-client delivery settings.
    #[serde(default)]
    pub server: ServerSettings,

    /// Pattern persistence.
    #[serde(default)]
    pub archive: ArchiveConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl LifesyncConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// Environment variables override YAML values:
    /// - `LIFESYNC_PORT` overrides `server.port`
    /// - `LIFESYNC_PATTERN_DIR` overrides `archive.directory`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Parse configuration from a YAML string, apply environment
    /// overrides, and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_yml::from_str(yaml)?;
        config.apply_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Override selected values with environment variables when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `LIFESYNC_PORT` is not a port
    /// number.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(val) = std::env::var("LIFESYNC_PORT") {
            self.server.port = val.parse().map_err(|e| ConfigError::Invalid {
                reason: format!("LIFESYNC_PORT={val}: {e}"),
            })?;
        }
        if let Ok(val) = std::env::var("LIFESYNC_PATTERN_DIR") {
            self.archive.directory = PathBuf::from(val);
        }
        Ok(())
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first bad value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.grid.rows == 0 || self.grid.cols == 0 {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "grid must be at least 1x1, got {}x{}",
                    self.grid.rows, self.grid.cols
                ),
            });
        }
        if !(0.0..=1.0).contains(&self.grid.random_density) {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "grid.random_density {} is outside [0, 1]",
                    self.grid.random_density
                ),
            });
        }
        if self.simulation.tick_interval_ms < MIN_TICK_INTERVAL_MS {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "simulation.tick_interval_ms must be at least {MIN_TICK_INTERVAL_MS}, got {}",
                    self.simulation.tick_interval_ms
                ),
            });
        }
        if self.server.client_buffer < MIN_CLIENT_BUFFER {
            return Err(ConfigError::Invalid {
                reason: format!(
                    "server.client_buffer must be at least {MIN_CLIENT_BUFFER}, got {}",
                    self.server.client_buffer
                ),
            });
        }
        Ok(())
    }
}

/// Grid configuration.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GridConfig {
    /// Number of rows (the `y` extent).
    #[serde(default = "default_rows")]
    pub rows: usize,

    /// Number of columns (the `x` extent).
    #[serde(default = "default_cols")]
    pub cols: usize,

    /// Neighbor policy at the edges.
    #[serde(default)]
    pub boundary: Boundary,

    /// Probability that a cell is alive after `random` without a density.
    #[serde(default = "default_random_density")]
    pub random_density: f64,

    /// Seed for the randomization RNG. `None` seeds from the OS.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            rows: default_rows(),
            cols: default_cols(),
            boundary: Boundary::default(),
            random_density: default_random_density(),
            seed: None,
        }
    }
}

/// Tick cadence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct SimulationConfig {
    /// Real-time milliseconds between generations while running.
    #[serde(default = "default_tick_interval_ms")]
    pub tick_interval_ms: u64,

    /// Whether the engine starts in the running state.
    #[serde(default)]
    pub start_running: bool,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: default_tick_interval_ms(),
            start_running: false,
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerSettings {
    /// Address to bind to.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Frames buffered per client before it is considered too slow and
    /// dropped.
    #[serde(default = "default_client_buffer")]
    pub client_buffer: usize,

    /// Directory of static frontend files served at `/`.
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            client_buffer: default_client_buffer(),
            static_dir: default_static_dir(),
        }
    }
}

/// Where patterns are kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveBackend {
    /// One JSON file per pattern under [`ArchiveConfig::directory`].
    #[default]
    File,
    /// Process memory only; patterns vanish on restart.
    Memory,
}

/// Pattern persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ArchiveConfig {
    /// Storage backend.
    #[serde(default)]
    pub backend: ArchiveBackend,

    /// Directory for the file backend.
    #[serde(default = "default_pattern_dir")]
    pub directory: PathBuf,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            backend: ArchiveBackend::default(),
            directory: default_pattern_dir(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn,
    /// error, or a full `EnvFilter` directive).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Default value functions (serde default requires named functions)
// ---------------------------------------------------------------------------

const fn default_rows() -> usize {
    200
}

const fn default_cols() -> usize {
    200
}

const fn default_random_density() -> f64 {
    0.5
}

const fn default_tick_interval_ms() -> u64 {
    100
}

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_client_buffer() -> usize {
    64
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("frontend")
}

fn default_pattern_dir() -> PathBuf {
    PathBuf::from("patterns")
}

fn default_log_level() -> String {
    "info".to_owned()
}
