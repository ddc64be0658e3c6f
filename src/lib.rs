//! # go2rtc MQTT Bridge
//!
//! Bridges a go2rtc media server into Home Assistant over MQTT: polls the
//! stream-status API, derives a per-tablet view of who is watching what at
//! which bandwidth, and publishes it as auto-discovered sensors.
//!
//! ## Features
//!
//! - **Tablet view**: per-client aggregation of suffixed streams
//! - **Bandwidth rates**: Mbps derived from cumulative byte counters
//! - **MQTT discovery**: sensors appear in Home Assistant automatically,
//!   announced exactly once per process lifetime
//! - **Raw mirroring**: optional verbatim republish of producer/consumer
//!   records
//!
//! ## Modules
//!
//! - [`go2rtc`]: status source client and snapshot extraction
//! - [`mqtt`]: broker client and discovery payloads
//! - [`bridge`]: rate tracking, publishing, and the poll loop
//!
//! ## Quick Start
//!
//! ```rust
//! use go2rtc_mqtt_bridge::bridge::BitrateTracker;
//! use go2rtc_mqtt_bridge::go2rtc::extract_tablets;
//! use serde_json::json;
//!
//! let payload = json!({
//!     "cam1_tablet": {
//!         "producers": [{"source": "rtsp://cam1"}],
//!         "consumers": [{
//!             "remote_addr": "192.168.50.67:54321",
//!             "user_agent": "TabletUA",
//!             "bytes_send": 1_000_000u64
//!         }]
//!     }
//! });
//!
//! let tablets = extract_tablets(&payload, "_tablet").unwrap();
//! assert_eq!(tablets["192.168.50.67"].streams["cam1_tablet"].bytes_sent, 1_000_000);
//!
//! let mut tracker = BitrateTracker::new();
//! assert_eq!(tracker.sample("192.168.50.67", "cam1_tablet", 1_000_000, 30), 0.0);
//! assert_eq!(tracker.sample("192.168.50.67", "cam1_tablet", 1_300_000, 30), 0.08);
//! ```

pub mod bridge;
pub mod config;
pub mod go2rtc;
pub mod mqtt;

// Re-export top-level types for convenience
pub use bridge::{BitrateTracker, Bridge, TabletPublisher};

pub use go2rtc::{extract_tablets, Go2rtcClient, Go2rtcError, SnapshotError, StreamMetric, Tablet};

pub use mqtt::{
    config_topic, Device, DiscoveryCache, MqttError, MqttPublisher, PublishError, PublishSink,
    SensorConfig,
};

pub use config::{
    generate_default_config, BridgeConfig, Config, ConfigError, Go2rtcConfig, LoggingConfig,
    MqttConfig,
};
