//! Bridge configuration
//!
//! Built once at startup from an optional TOML file plus command-line
//! overrides, then passed into the bridge by value.
//!
//! ```toml
//! format = "xml"
//! routing_key = "ingest.files"
//!
//! [broker]
//! host = "rabbit.internal"
//! exchange = "ingest"
//! queue = "ingest-files"
//!
//! [watch]
//! path = "/srv/incoming"
//! max_events_per_cycle = 0
//! ```

use crate::retry::RetryPolicy;
use folderwatch_protocol::defaults::*;
use folderwatch_protocol::Format;
use folderwatch_watcher::{CoalescePolicy, WatchConfig};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Failed to write config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

// ============================================================================
// Sections
// ============================================================================

/// How the publisher uses AMQP channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelMode {
    /// Open a channel for each message and close it afterwards
    #[default]
    PerPublish,
    /// Reuse one channel until a publish on it fails
    Shared,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrokerConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    pub vhost: String,
    pub exchange: String,
    /// direct, fanout, topic or headers
    pub exchange_kind: String,
    /// Queue declared and bound to the exchange at startup, if any
    pub queue: Option<String>,
    pub channel_mode: ChannelMode,
    /// Wait for broker confirms; a nack fails the publish
    pub confirm: bool,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_BROKER_HOST.to_string(),
            port: DEFAULT_BROKER_PORT,
            user: DEFAULT_BROKER_USER.to_string(),
            password: DEFAULT_BROKER_PASSWORD.to_string(),
            vhost: DEFAULT_VHOST.to_string(),
            exchange: DEFAULT_EXCHANGE.to_string(),
            exchange_kind: DEFAULT_EXCHANGE_KIND.to_string(),
            queue: None,
            channel_mode: ChannelMode::default(),
            confirm: false,
        }
    }
}

impl BrokerConfig {
    /// Connection target for logs and errors. Never includes the password.
    pub fn target(&self) -> String {
        format!("{}@{}:{}{}", self.user, self.host, self.port, self.vhost_suffix())
    }

    fn vhost_suffix(&self) -> String {
        if self.vhost == DEFAULT_VHOST {
            String::new()
        } else {
            format!("/{}", self.vhost)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSettings {
    /// Root directory to watch
    pub path: PathBuf,
    pub recursive: bool,
    pub include_hidden: bool,
    pub interval_ms: u64,
    /// Events forwarded per scan cycle; 0 forwards every event
    pub max_events_per_cycle: usize,
    pub exclude_dir_names: Vec<String>,
}

impl Default for WatchSettings {
    fn default() -> Self {
        Self {
            path: PathBuf::new(),
            recursive: true,
            include_hidden: false,
            interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_events_per_cycle: DEFAULT_MAX_EVENTS_PER_CYCLE,
            exclude_dir_names: Vec::new(),
        }
    }
}

impl WatchSettings {
    pub fn watch_config(&self) -> WatchConfig {
        WatchConfig {
            interval: Duration::from_millis(self.interval_ms),
            recursive: self.recursive,
            include_hidden: self.include_hidden,
            coalesce: CoalescePolicy::from_max_events(self.max_events_per_cycle),
            exclude_dir_names: self.exclude_dir_names.clone(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Top level
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub broker: BrokerConfig,

    #[serde(default)]
    pub watch: WatchSettings,

    /// Message body encoding
    #[serde(default)]
    pub format: Format,

    #[serde(default = "default_routing_key")]
    pub routing_key: String,

    /// Retry policy for broker connects and publishes
    #[serde(default)]
    pub retry: RetryPolicy,
}

fn default_routing_key() -> String {
    DEFAULT_ROUTING_KEY.to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            broker: BrokerConfig::default(),
            watch: WatchSettings::default(),
            format: Format::default(),
            routing_key: default_routing_key(),
            retry: RetryPolicy::default(),
        }
    }
}

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply command-line values on top of file values.
    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            host,
            port,
            user,
            password,
            exchange,
            queue,
            routing_key,
            watch_path,
            recursive,
            include_hidden,
            interval_ms,
            max_events_per_cycle,
            format,
        } = overrides;

        set_if(&mut self.broker.host, host);
        set_if(&mut self.broker.port, port);
        set_if(&mut self.broker.user, user);
        set_if(&mut self.broker.password, password);
        set_if(&mut self.broker.exchange, exchange);
        if queue.is_some() {
            self.broker.queue = queue;
        }
        set_if(&mut self.routing_key, routing_key);
        set_if(&mut self.watch.path, watch_path);
        set_if(&mut self.watch.recursive, recursive);
        set_if(&mut self.watch.include_hidden, include_hidden);
        set_if(&mut self.watch.interval_ms, interval_ms);
        set_if(&mut self.watch.max_events_per_cycle, max_events_per_cycle);
        set_if(&mut self.format, format);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.watch.path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "watch path is required (--watch-folder-path or [watch] path)".to_string(),
            ));
        }
        if self.broker.exchange.trim().is_empty() {
            return Err(ConfigError::Invalid("exchange name is empty".to_string()));
        }
        if self.watch.interval_ms == 0 {
            return Err(ConfigError::Invalid(
                "polling interval must be at least 1 ms".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "retry.max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

fn set_if<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

/// Values given explicitly on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub exchange: Option<String>,
    pub queue: Option<String>,
    pub routing_key: Option<String>,
    pub watch_path: Option<PathBuf>,
    pub recursive: Option<bool>,
    pub include_hidden: Option<bool>,
    pub interval_ms: Option<u64>,
    pub max_events_per_cycle: Option<usize>,
    pub format: Option<Format>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BridgeConfig::default();
        assert_eq!(config.broker.host, "localhost");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.user, "rabbitmq");
        assert_eq!(config.broker.channel_mode, ChannelMode::PerPublish);
        assert_eq!(config.format, Format::Json);
        assert_eq!(config.watch.interval_ms, 100);
        assert_eq!(
            config.watch.watch_config().coalesce,
            CoalescePolicy::FirstPerCycle(1)
        );
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BridgeConfig = toml::from_str(
            r#"
            format = "xml"

            [broker]
            host = "rabbit.internal"
            channel_mode = "shared"

            [watch]
            path = "/srv/incoming"
            max_events_per_cycle = 0
            "#,
        )
        .unwrap();

        assert_eq!(config.format, Format::Xml);
        assert_eq!(config.broker.host, "rabbit.internal");
        assert_eq!(config.broker.port, 5672);
        assert_eq!(config.broker.channel_mode, ChannelMode::Shared);
        assert_eq!(config.routing_key, "folderwatch.events");
        assert_eq!(config.watch.path, PathBuf::from("/srv/incoming"));
        assert!(config.watch.recursive);
        assert_eq!(config.watch.watch_config().coalesce, CoalescePolicy::All);
    }

    #[test]
    fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("folderwatch.toml");

        let mut config = BridgeConfig::default();
        config.watch.path = PathBuf::from("/data");
        config.broker.queue = Some("files".to_string());
        config.save(&path).unwrap();

        let loaded = BridgeConfig::load(&path).unwrap();
        assert_eq!(loaded.watch.path, PathBuf::from("/data"));
        assert_eq!(loaded.broker.queue.as_deref(), Some("files"));
    }

    #[test]
    fn test_load_reports_path() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("bad.toml");
        std::fs::write(&path, "[broker\nhost = 1").unwrap();

        let err = BridgeConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn test_overrides_win_over_file_values() {
        let mut config = BridgeConfig::default();
        config.broker.host = "from-file".to_string();
        config.watch.recursive = true;

        config.apply(ConfigOverrides {
            host: Some("from-cli".to_string()),
            recursive: Some(false),
            watch_path: Some(PathBuf::from("/data")),
            ..Default::default()
        });

        assert_eq!(config.broker.host, "from-cli");
        assert!(!config.watch.recursive);
        assert_eq!(config.watch.path, PathBuf::from("/data"));
        // Untouched values survive
        assert_eq!(config.broker.port, 5672);
    }

    #[test]
    fn test_validate() {
        let mut config = BridgeConfig::default();
        assert!(config.validate().is_err(), "watch path is required");

        config.watch.path = PathBuf::from("/data");
        assert!(config.validate().is_ok());

        config.watch.interval_ms = 0;
        assert!(config.validate().is_err());
        config.watch.interval_ms = 100;

        config.broker.exchange = " ".to_string();
        assert!(config.validate().is_err());
        config.broker.exchange = "folderwatch".to_string();

        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_target_hides_password() {
        let mut broker = BrokerConfig::default();
        broker.password = "s3cret".to_string();
        assert_eq!(broker.target(), "rabbitmq@localhost:5672");
        broker.vhost = "ingest".to_string();
        assert_eq!(broker.target(), "rabbitmq@localhost:5672/ingest");
        assert!(!broker.target().contains("s3cret"));
    }
}
