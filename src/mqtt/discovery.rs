//! Home Assistant MQTT Discovery
//!
//! Builds the retained `config` payloads that make sensors appear in
//! Home Assistant without manual configuration, and tracks which of them
//! were already announced so each goes out exactly once per process
//! lifetime. State publishes never touch this cache.

use crate::mqtt::{PublishError, PublishSink};
use serde::Serialize;
use std::collections::HashSet;

/// Device block shared by every sensor of one tablet
///
/// Home Assistant groups sensors by this block, so it must serialize
/// identically across all of a tablet's discovery configs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Device {
    pub identifiers: Vec<String>,
    pub name: String,
    pub manufacturer: String,
    pub model: String,
}

impl Device {
    /// Build the device block for one tablet IP
    pub fn for_tablet(device_id: &str, ip: &str) -> Self {
        Self {
            identifiers: vec![format!("go2rtc_tablet_{}", device_id)],
            name: format!("Tablet {}", ip),
            manufacturer: "go2rtc".to_string(),
            model: "Tablet Stream".to_string(),
        }
    }
}

/// Discovery config payload for one sensor
#[derive(Debug, Clone, Serialize)]
pub struct SensorConfig {
    pub name: String,
    pub unique_id: String,
    pub state_topic: String,
    pub device: Device,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit_of_measurement: Option<String>,
}

/// Topic a sensor's discovery config is published to
pub fn config_topic(discovery_prefix: &str, device_id: &str, entity_id: &str) -> String {
    format!(
        "{}/sensor/go2rtc_{}/{}/config",
        discovery_prefix, device_id, entity_id
    )
}

/// Tracks which sensors were announced this process lifetime
///
/// Entries are never removed; a restart re-announces everything.
#[derive(Debug, Default)]
pub struct DiscoveryCache {
    announced: HashSet<(String, String)>,
}

impl DiscoveryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of sensors announced so far
    pub fn len(&self) -> usize {
        self.announced.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announced.is_empty()
    }

    /// Publish the sensor's discovery config unless it already went out.
    ///
    /// The builder runs only when an announcement is actually needed.
    /// Returns `Ok(true)` when a config was published this call. A failed
    /// publish leaves the sensor unannounced so the next cycle retries it.
    pub async fn announce_once<F>(
        &mut self,
        discovery_prefix: &str,
        device_id: &str,
        entity_id: &str,
        build: F,
        sink: &dyn PublishSink,
    ) -> Result<bool, PublishError>
    where
        F: FnOnce() -> SensorConfig,
    {
        let key = (device_id.to_string(), entity_id.to_string());
        if self.announced.contains(&key) {
            return Ok(false);
        }

        let config = build();
        let payload = serde_json::to_string(&config)?;
        sink.publish(
            &config_topic(discovery_prefix, device_id, entity_id),
            &payload,
        )
        .await?;

        self.announced.insert(key);
        Ok(true)
    }
}
