//! Configuration System
//!
//! Handles loading configuration from files and environment variables.
//! Supports TOML config files and environment variable overrides; the
//! environment variable names match the original container deployment
//! (`GO2RTC_API_URL`, `MQTT_BROKER`, ...).

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub go2rtc: Go2rtcConfig,

    #[serde(default)]
    pub mqtt: MqttConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// go2rtc status source configuration
#[derive(Debug, Clone, Deserialize)]
pub struct Go2rtcConfig {
    /// URL of the go2rtc streams API
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// HTTP request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://127.0.0.1:1984/api/streams".to_string()
}

fn default_timeout() -> u64 {
    10
}

impl Default for Go2rtcConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            timeout_secs: default_timeout(),
        }
    }
}

/// MQTT broker and topic configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MqttConfig {
    /// Broker hostname or IP
    #[serde(default = "default_broker")]
    pub broker: String,

    /// Broker port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Username; credentials are only applied when both username and
    /// password are non-empty
    #[serde(default)]
    pub username: String,

    /// Password
    #[serde(default)]
    pub password: String,

    /// MQTT client identifier
    #[serde(default = "default_client_id")]
    pub client_id: String,

    /// Root of all state topics
    #[serde(default = "default_topic_root")]
    pub topic_root: String,

    /// Home Assistant discovery prefix
    #[serde(default = "default_discovery_prefix")]
    pub discovery_prefix: String,
}

fn default_broker() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    1883
}

fn default_client_id() -> String {
    "go2rtc-mqtt-bridge".to_string()
}

fn default_topic_root() -> String {
    "go2rtc/streams".to_string()
}

fn default_discovery_prefix() -> String {
    "homeassistant".to_string()
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            broker: default_broker(),
            port: default_port(),
            username: String::new(),
            password: String::new(),
            client_id: default_client_id(),
            topic_root: default_topic_root(),
            discovery_prefix: default_discovery_prefix(),
        }
    }
}

/// Poll loop configuration
#[derive(Debug, Clone, Deserialize)]
pub struct BridgeConfig {
    /// Seconds between polls of the status API
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Streams are bridged only when their name ends with this suffix
    #[serde(default = "default_stream_suffix")]
    pub stream_suffix: String,

    /// Also mirror every raw producer/consumer record to per-stream topics
    #[serde(default)]
    pub publish_raw: bool,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_stream_suffix() -> String {
    "_tablet".to_string()
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            stream_suffix: default_stream_suffix(),
            publish_raw: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        Ok(config)
    }

    /// Load configuration from environment variables only
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env_overrides();
        config
    }

    /// Load configuration with environment variable overrides
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load from `BRIDGE_CONFIG`, the default locations, or environment.
    ///
    /// A file named via `BRIDGE_CONFIG` must load, and so must any default
    /// candidate that exists; a present-but-unreadable config file is an
    /// error, never a silent fall-through to defaults. When no file is
    /// found, environment variables and defaults apply. Returns the config
    /// together with the path it was loaded from, if any.
    pub fn load_default() -> Result<(Self, Option<PathBuf>), ConfigError> {
        let explicit = std::env::var("BRIDGE_CONFIG")
            .ok()
            .filter(|p| !p.is_empty());
        if let Some(path) = explicit {
            let path = PathBuf::from(path);
            let config = Self::load_with_env(&path)?;
            return Ok((config, Some(path)));
        }

        let candidates = [
            dirs::config_dir().map(|p| p.join("go2rtc-mqtt-bridge").join("config.toml")),
            Some(PathBuf::from("/etc/go2rtc-mqtt-bridge/config.toml")),
            Some(PathBuf::from("./config.toml")),
        ];

        for path in candidates.into_iter().flatten() {
            if path.exists() {
                let config = Self::load_with_env(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((Self::from_env(), None))
    }

    /// Reject values the poll loop cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bridge.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "bridge.poll_interval_secs must be positive".into(),
            ));
        }
        if self.go2rtc.timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "go2rtc.timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Apply environment variable overrides to an existing config
    fn apply_env_overrides(&mut self) {
        // go2rtc overrides
        if let Ok(url) = std::env::var("GO2RTC_API_URL") {
            self.go2rtc.api_url = url;
        }
        if let Ok(timeout) = std::env::var("GO2RTC_TIMEOUT") {
            if let Ok(t) = timeout.parse() {
                self.go2rtc.timeout_secs = t;
            }
        }

        // MQTT overrides
        if let Ok(broker) = std::env::var("MQTT_BROKER") {
            self.mqtt.broker = broker;
        }
        if let Ok(port) = std::env::var("MQTT_PORT") {
            if let Ok(p) = port.parse() {
                self.mqtt.port = p;
            }
        }
        if let Ok(user) = std::env::var("MQTT_USER") {
            self.mqtt.username = user;
        }
        if let Ok(pass) = std::env::var("MQTT_PASS") {
            self.mqtt.password = pass;
        }
        if let Ok(client_id) = std::env::var("MQTT_CLIENT_ID") {
            self.mqtt.client_id = client_id;
        }
        if let Ok(topic) = std::env::var("MQTT_TOPIC") {
            self.mqtt.topic_root = topic;
        }
        if let Ok(prefix) = std::env::var("MQTT_DISCOVERY_PREFIX") {
            self.mqtt.discovery_prefix = prefix;
        }

        // Bridge overrides
        if let Ok(interval) = std::env::var("POLL_INTERVAL") {
            if let Ok(i) = interval.parse() {
                self.bridge.poll_interval_secs = i;
            }
        }
        if let Ok(suffix) = std::env::var("STREAM_SUFFIX") {
            self.bridge.stream_suffix = suffix;
        }
        if let Ok(raw) = std::env::var("PUBLISH_RAW") {
            self.bridge.publish_raw = matches!(raw.to_lowercase().as_str(), "1" | "true" | "yes");
        }

        // Logging overrides
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Ok(format) = std::env::var("LOG_FORMAT") {
            self.logging.format = format;
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            go2rtc: Go2rtcConfig::default(),
            mqtt: MqttConfig::default(),
            bridge: BridgeConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {error}")]
    Io { path: PathBuf, error: String },

    #[error("Failed to parse config file {path:?}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Generate a default config file content
pub fn generate_default_config() -> String {
    r#"# go2rtc MQTT bridge configuration
#
# Environment variables override these settings:
# - GO2RTC_API_URL, GO2RTC_TIMEOUT
# - MQTT_BROKER, MQTT_PORT, MQTT_USER, MQTT_PASS, MQTT_CLIENT_ID
# - MQTT_TOPIC, MQTT_DISCOVERY_PREFIX
# - POLL_INTERVAL, STREAM_SUFFIX, PUBLISH_RAW
# - LOG_LEVEL, LOG_FORMAT

[go2rtc]
# go2rtc streams API URL
api_url = "http://127.0.0.1:1984/api/streams"

# HTTP request timeout (seconds)
timeout_secs = 10

[mqtt]
# Broker hostname or IP
broker = "localhost"

# Broker port
port = 1883

# Credentials (both must be set to take effect)
username = ""
password = ""

# MQTT client identifier
client_id = "go2rtc-mqtt-bridge"

# Root of all state topics
topic_root = "go2rtc/streams"

# Home Assistant discovery prefix
discovery_prefix = "homeassistant"

[bridge]
# Seconds between polls of the status API
poll_interval_secs = 30

# Only streams whose name ends with this suffix are bridged
stream_suffix = "_tablet"

# Also mirror raw producer/consumer records to per-stream topics
publish_raw = false

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log format: pretty (for development) or json (for production)
format = "pretty"
"#
    .to_string()
}
