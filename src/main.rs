//! go2rtc MQTT Bridge Service
//!
//! Polls a go2rtc server's stream-status API and publishes a per-tablet
//! view of it to MQTT with Home Assistant discovery.
//!
//! # Configuration
//!
//! Loaded from `BRIDGE_CONFIG` (or the default config file locations),
//! then overridden by environment variables:
//! - `GO2RTC_API_URL`: streams API URL (default: http://127.0.0.1:1984/api/streams)
//! - `GO2RTC_TIMEOUT`: fetch timeout in seconds (default: 10)
//! - `MQTT_BROKER` / `MQTT_PORT`: broker address (default: localhost:1883)
//! - `MQTT_USER` / `MQTT_PASS`: credentials, both required to take effect
//! - `MQTT_TOPIC`: state topic root (default: go2rtc/streams)
//! - `MQTT_DISCOVERY_PREFIX`: discovery prefix (default: homeassistant)
//! - `POLL_INTERVAL`: seconds between polls (default: 30)
//! - `STREAM_SUFFIX`: bridged stream name suffix (default: _tablet)
//! - `PUBLISH_RAW`: also mirror raw records (default: false)
//! - `RUST_LOG`: tracing filter, overrides the logging config

use anyhow::Context;
use go2rtc_mqtt_bridge::bridge::Bridge;
use go2rtc_mqtt_bridge::config::Config;
use go2rtc_mqtt_bridge::mqtt::MqttPublisher;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_source) =
        Config::load_default().context("Failed to load configuration")?;

    init_tracing(&config);

    tracing::info!("Starting go2rtc MQTT bridge v{}", env!("CARGO_PKG_VERSION"));
    match &config_source {
        Some(path) => tracing::info!("Loaded config from {:?}", path),
        None => tracing::info!("No config file found, using environment and defaults"),
    }

    config.validate().context("Invalid configuration")?;

    let publisher = MqttPublisher::connect(&config.mqtt)
        .await
        .context("Failed to connect to MQTT broker")?;

    Bridge::new(config, publisher).run().await;

    Ok(())
}

/// Initialize tracing from the logging config; `RUST_LOG` wins when set
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("go2rtc_mqtt_bridge={}", config.logging.level))
    });

    let registry = tracing_subscriber::registry().with(filter);

    if config.logging.format == "json" {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }
}
