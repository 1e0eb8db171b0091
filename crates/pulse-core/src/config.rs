//! Configuration loading and typed config structures for Pulse.
//!
//! The configuration lives in `pulse-config.yaml` at the project root. Every
//! section and field is optional; anything left out takes the default shown
//! in the shipped file. A missing file means all defaults.

use std::path::Path;
use std::time::Duration;

use pulse_events::ChatSettings;
use pulse_ledger::LedgerOptions;
use pulse_sim::{GridLayout, SimulationParams, Viewport};
use pulse_store::{DEFAULT_MAX_ATTEMPTS, MemoryStore};
use serde::Deserialize;

use crate::presentation::PresentationOptions;

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

    /// A value parsed but is unusable.
    #[error("invalid config value for {field}: {reason}")]
    Invalid {
        /// Dotted path of the field.
        field: &'static str,
        /// What is wrong with it.
        reason: String,
    },
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level configuration, mirroring `pulse-config.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct PulseConfig {
    /// HTTP listener.
    #[serde(default)]
    pub server: ServerConfig,

    /// Store behaviour.
    #[serde(default)]
    pub store: StoreConfig,

    /// Vote ledger and chat limits.
    #[serde(default)]
    pub ledger: LedgerConfig,

    /// Particle physics.
    #[serde(default)]
    pub simulation: SimulationParams,

    /// Presentation loop.
    #[serde(default)]
    pub presentation: PresentationConfig,

    /// Logging.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PulseConfig {
    /// Load configuration from a YAML file at the given path.
    ///
    /// `PULSE_HOST` and `PULSE_PORT` override `server.host` and
    /// `server.port` when set.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if the content is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::parse(&contents)?;
        config.server.apply_env_overrides();
        Ok(config)
    }

    /// Like [`from_file`](Self::from_file), but a missing file yields the
    /// defaults (with environment overrides applied).
    ///
    /// # Errors
    ///
    /// As [`from_file`](Self::from_file), except for a missing file.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match Self::from_file(path) {
            Err(ConfigError::Io { source }) if source.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                let mut config = Self::default();
                config.server.apply_env_overrides();
                Ok(config)
            }
            other => other,
        }
    }

    /// Parse configuration from a YAML string. No environment overrides are
    /// applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML, or
    /// [`ConfigError::Invalid`] if a value is out of range.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.simulation
            .validate()
            .map_err(|e| ConfigError::Invalid {
                field: "simulation",
                reason: e.to_string(),
            })?;
        self.presentation
            .viewport
            .validate()
            .map_err(|e| ConfigError::Invalid {
                field: "presentation.viewport",
                reason: e.to_string(),
            })?;
        if self.presentation.frame_interval_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "presentation.frame_interval_ms",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.ledger.chat_history_limit == 0 {
            return Err(ConfigError::Invalid {
                field: "ledger.chat_history_limit",
                reason: "must be at least 1".to_owned(),
            });
        }
        if self.ledger.max_message_len == 0 {
            return Err(ConfigError::Invalid {
                field: "ledger.max_message_len",
                reason: "must be at least 1".to_owned(),
            });
        }
        Ok(())
    }

    /// A fresh in-process store honoring `store.max_transaction_attempts`.
    pub fn build_store(&self) -> MemoryStore {
        MemoryStore::with_max_attempts(self.store.max_transaction_attempts)
    }

    /// Ledger switches from the `ledger` section.
    pub const fn ledger_options(&self) -> LedgerOptions {
        LedgerOptions {
            purge_on_reset: self.ledger.purge_on_reset,
        }
    }

    /// Chat limits from the `ledger` section.
    pub const fn chat_settings(&self) -> ChatSettings {
        ChatSettings {
            history_limit: self.ledger.chat_history_limit,
            max_message_len: self.ledger.max_message_len,
        }
    }

    /// Physics for a new presenter view.
    pub fn simulation_params(&self) -> SimulationParams {
        self.simulation.clone()
    }

    /// Viewport a presenter view starts with, before the host reports a
    /// resize.
    pub const fn viewport(&self) -> Viewport {
        self.presentation.viewport
    }

    /// Loop settings from the `presentation` section.
    pub fn presentation_options(&self) -> PresentationOptions {
        PresentationOptions {
            frame_interval: Duration::from_millis(self.presentation.frame_interval_ms),
            layout: Some(GridLayout::default()),
        }
    }
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Bind address.
    #[serde(default = "default_host")]
    pub host: String,

    /// Bind port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl ServerConfig {
    /// Override host and port from `PULSE_HOST` / `PULSE_PORT` when set.
    /// An unparsable port is ignored with a warning.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("PULSE_HOST") {
            self.host = val;
        }
        if let Ok(val) = std::env::var("PULSE_PORT") {
            match val.parse() {
                Ok(port) => self.port = port,
                Err(e) => tracing::warn!(value = %val, error = %e, "ignoring invalid PULSE_PORT"),
            }
        }
    }

    /// `host:port`.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Store settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
    /// Attempts a transaction makes before reporting contention.
    #[serde(default = "default_max_transaction_attempts")]
    pub max_transaction_attempts: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_transaction_attempts: default_max_transaction_attempts(),
        }
    }
}

/// Ledger and chat settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LedgerConfig {
    /// Delete older-epoch votes and events after a reset.
    #[serde(default = "default_true")]
    pub purge_on_reset: bool,

    /// Messages shown to chat readers.
    #[serde(default = "default_chat_history_limit")]
    pub chat_history_limit: usize,

    /// Longest accepted chat message, in characters.
    #[serde(default = "default_max_message_len")]
    pub max_message_len: usize,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            purge_on_reset: true,
            chat_history_limit: default_chat_history_limit(),
            max_message_len: default_max_message_len(),
        }
    }
}

/// Presentation loop settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PresentationConfig {
    /// Milliseconds between frames.
    #[serde(default = "default_frame_interval_ms")]
    pub frame_interval_ms: u64,

    /// Initial viewport size.
    #[serde(default)]
    pub viewport: Viewport,
}

impl Default for PresentationConfig {
    fn default() -> Self {
        Self {
            frame_interval_ms: default_frame_interval_ms(),
            viewport: Viewport::default(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable lines.
    #[default]
    Text,
    /// One JSON object per line.
    Json,
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn,
    /// error, or a full filter directive).
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
// Defaults
// ---------------------------------------------------------------------------

fn default_host() -> String {
    "0.0.0.0".to_owned()
}

const fn default_port() -> u16 {
    8080
}

const fn default_max_transaction_attempts() -> u32 {
    DEFAULT_MAX_ATTEMPTS
}

const fn default_chat_history_limit() -> usize {
    pulse_events::chat::DEFAULT_HISTORY_LIMIT
}

const fn default_max_message_len() -> usize {
    pulse_events::chat::DEFAULT_MAX_MESSAGE_LEN
}

const fn default_frame_interval_ms() -> u64 {
    16
}

fn default_log_level() -> String {
    "info".to_owned()
}

const fn default_true() -> bool {
    true
}
