//! Per-Cycle Tablet Publishing
//!
//! Turns one extracted tablet view into MQTT messages: a discovery config
//! the first time each sensor is seen, then a fresh state value for every
//! sensor on every cycle. Owns the rate baselines and the announce cache,
//! both living for the process lifetime.

use crate::bridge::rate::BitrateTracker;
use crate::go2rtc::Tablet;
use crate::mqtt::{Device, DiscoveryCache, PublishSink, SensorConfig};
use std::collections::HashMap;

/// Publishes a tablet view as Home Assistant sensors
pub struct TabletPublisher {
    topic_root: String,
    discovery_prefix: String,
    poll_interval_secs: u64,
    tracker: BitrateTracker,
    discovery: DiscoveryCache,
}

/// Per-tablet identity shared by all of its sensors
struct TabletDevice {
    id: String,
    ip: String,
    device: Device,
}

impl TabletDevice {
    fn new(ip: &str) -> Self {
        let id = device_id(ip);
        Self {
            device: Device::for_tablet(&id, ip),
            id,
            ip: ip.to_string(),
        }
    }
}

impl TabletPublisher {
    pub fn new(topic_root: &str, discovery_prefix: &str, poll_interval_secs: u64) -> Self {
        Self {
            topic_root: topic_root.to_string(),
            discovery_prefix: discovery_prefix.to_string(),
            poll_interval_secs,
            tracker: BitrateTracker::new(),
            discovery: DiscoveryCache::new(),
        }
    }

    /// Publish every sensor of every tablet in the view.
    ///
    /// Returns the number of messages that reached the sink. Individual
    /// publish failures are logged and skipped so one bad message never
    /// takes down the rest of the cycle.
    pub async fn publish_cycle(
        &mut self,
        tablets: &HashMap<String, Tablet>,
        sink: &dyn PublishSink,
    ) -> usize {
        let mut published = 0;

        for (ip, tablet) in tablets {
            published += self.publish_tablet(ip, tablet, sink).await;
        }

        if !tablets.is_empty() {
            tracing::info!(
                tablets = tablets.len(),
                messages = published,
                "Published tablet sensors"
            );
        }

        published
    }

    /// Publish one tablet: the user_agent sensor plus four sensors per stream
    async fn publish_tablet(&mut self, ip: &str, tablet: &Tablet, sink: &dyn PublishSink) -> usize {
        let device = TabletDevice::new(ip);
        let mut published = 0;

        let topic = format!("{}/{}/user_agent", self.topic_root, device.id);
        published += self
            .publish_sensor(&device, "user_agent", &topic, None, &tablet.user_agent, sink)
            .await;

        for (stream, metric) in &tablet.streams {
            let base = format!("{}/{}/{}", self.topic_root, device.id, stream);

            published += self
                .publish_sensor(
                    &device,
                    &format!("{}_source", stream),
                    &format!("{}/source", base),
                    None,
                    &metric.source,
                    sink,
                )
                .await;
            published += self
                .publish_sensor(
                    &device,
                    &format!("{}_format_name", stream),
                    &format!("{}/format_name", base),
                    None,
                    &metric.format_name,
                    sink,
                )
                .await;
            published += self
                .publish_sensor(
                    &device,
                    &format!("{}_bytes_sent", stream),
                    &format!("{}/bytes_sent", base),
                    None,
                    &metric.bytes_sent.to_string(),
                    sink,
                )
                .await;

            let mbps = self
                .tracker
                .sample(ip, stream, metric.bytes_sent, self.poll_interval_secs);
            published += self
                .publish_sensor(
                    &device,
                    &format!("{}_mbps", stream),
                    &format!("{}/mbps", base),
                    Some("Mbit/s"),
                    &format!("{:.2}", mbps),
                    sink,
                )
                .await;
        }

        published
    }

    /// Announce one sensor if new, then publish its state value
    async fn publish_sensor(
        &mut self,
        device: &TabletDevice,
        entity_id: &str,
        state_topic: &str,
        unit: Option<&str>,
        value: &str,
        sink: &dyn PublishSink,
    ) -> usize {
        let mut published = 0;

        let build = || SensorConfig {
            name: format!("Tablet {} {}", device.ip, entity_id),
            unique_id: format!("go2rtc_{}_{}", device.id, entity_id),
            state_topic: state_topic.to_string(),
            device: device.device.clone(),
            unit_of_measurement: unit.map(str::to_string),
        };

        match self
            .discovery
            .announce_once(&self.discovery_prefix, &device.id, entity_id, build, sink)
            .await
        {
            Ok(true) => published += 1,
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(entity = entity_id, error = %e, "Failed to publish discovery config");
            }
        }

        match sink.publish(state_topic, value).await {
            Ok(()) => published += 1,
            Err(e) => {
                tracing::warn!(topic = state_topic, error = %e, "Failed to publish state");
            }
        }

        published
    }
}

/// MQTT-safe device id for a client IP
fn device_id(ip: &str) -> String {
    ip.replace(['.', ':'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::go2rtc::extract_tablets;
    use crate::mqtt::PublishError;
    use async_trait::async_trait;
    use serde_json::{json, Value};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn topics(&self) -> Vec<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .map(|(topic, _)| topic.clone())
                .collect()
        }

        fn payload(&self, topic: &str) -> Option<String> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .rev()
                .find(|(t, _)| t == topic)
                .map(|(_, payload)| payload.clone())
        }

        fn config_payloads(&self) -> Vec<Value> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .filter(|(topic, _)| topic.ends_with("/config"))
                .map(|(_, payload)| serde_json::from_str(payload).unwrap())
                .collect()
        }

        fn clear(&self) {
            self.messages.lock().unwrap().clear();
        }
    }

    #[async_trait]
    impl PublishSink for RecordingSink {
        async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
            self.messages
                .lock()
                .unwrap()
                .push((topic.to_string(), payload.to_string()));
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait]
    impl PublishSink for FailingSink {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
            Err(PublishError::Disconnected("broker gone".to_string()))
        }
    }

    fn publisher() -> TabletPublisher {
        TabletPublisher::new("go2rtc/streams", "homeassistant", 30)
    }

    fn cam1_payload(bytes: u64) -> Value {
        json!({
            "cam1_tablet": {
                "producers": [{"source": "rtsp://cam1"}],
                "consumers": [{
                    "remote_addr": "192.168.50.67:54321",
                    "user_agent": "TabletUA",
                    "format_name": "mse",
                    "bytes_send": bytes
                }]
            }
        })
    }

    #[test]
    fn test_device_id_replaces_separators() {
        assert_eq!(device_id("192.168.50.67"), "192_168_50_67");
        assert_eq!(device_id("fe80::1"), "fe80__1");
    }

    #[tokio::test]
    async fn test_first_cycle_announces_and_publishes_state() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();
        let tablets = extract_tablets(&cam1_payload(1_000_000), "_tablet").unwrap();

        let published = publisher.publish_cycle(&tablets, &sink).await;

        // 5 sensors, each a discovery config plus a state value
        assert_eq!(published, 10);

        let topics = sink.topics();
        assert!(topics
            .contains(&"homeassistant/sensor/go2rtc_192_168_50_67/user_agent/config".to_string()));
        assert!(topics.contains(
            &"homeassistant/sensor/go2rtc_192_168_50_67/cam1_tablet_mbps/config".to_string()
        ));

        let root = "go2rtc/streams/192_168_50_67";
        assert_eq!(
            sink.payload(&format!("{}/user_agent", root)).as_deref(),
            Some("TabletUA")
        );
        assert_eq!(
            sink.payload(&format!("{}/cam1_tablet/source", root)).as_deref(),
            Some("rtsp://cam1")
        );
        assert_eq!(
            sink.payload(&format!("{}/cam1_tablet/format_name", root)).as_deref(),
            Some("mse")
        );
        assert_eq!(
            sink.payload(&format!("{}/cam1_tablet/bytes_sent", root)).as_deref(),
            Some("1000000")
        );
        // First observation only seeds the baseline
        assert_eq!(
            sink.payload(&format!("{}/cam1_tablet/mbps", root)).as_deref(),
            Some("0.00")
        );
    }

    #[tokio::test]
    async fn test_second_cycle_publishes_rates_without_reannouncing() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();

        let first = extract_tablets(&cam1_payload(1_000_000), "_tablet").unwrap();
        publisher.publish_cycle(&first, &sink).await;
        sink.clear();

        let second = extract_tablets(&cam1_payload(1_300_000), "_tablet").unwrap();
        let published = publisher.publish_cycle(&second, &sink).await;

        // State values only this time
        assert_eq!(published, 5);
        assert!(sink.topics().iter().all(|t| !t.ends_with("/config")));
        assert_eq!(
            sink.payload("go2rtc/streams/192_168_50_67/cam1_tablet/mbps")
                .as_deref(),
            Some("0.08")
        );
    }

    #[tokio::test]
    async fn test_device_block_identical_across_sensors() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();
        let tablets = extract_tablets(&cam1_payload(1_000_000), "_tablet").unwrap();

        publisher.publish_cycle(&tablets, &sink).await;

        let configs = sink.config_payloads();
        assert_eq!(configs.len(), 5);

        let device = &configs[0]["device"];
        assert!(configs.iter().all(|c| &c["device"] == device));
        assert_eq!(device["identifiers"], json!(["go2rtc_tablet_192_168_50_67"]));
        assert_eq!(device["name"], json!("Tablet 192.168.50.67"));
        assert_eq!(device["manufacturer"], json!("go2rtc"));
        assert_eq!(device["model"], json!("Tablet Stream"));
    }

    #[tokio::test]
    async fn test_unit_only_on_rate_sensor() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();
        let tablets = extract_tablets(&cam1_payload(1_000_000), "_tablet").unwrap();

        publisher.publish_cycle(&tablets, &sink).await;

        for config in sink.config_payloads() {
            let unique_id = config["unique_id"].as_str().unwrap();
            if unique_id.ends_with("_mbps") {
                assert_eq!(config["unit_of_measurement"], json!("Mbit/s"));
            } else {
                assert!(config.get("unit_of_measurement").is_none());
            }
        }
    }

    #[tokio::test]
    async fn test_failed_publishes_skip_and_retry_later() {
        let mut publisher = publisher();
        let tablets = extract_tablets(&cam1_payload(1_000_000), "_tablet").unwrap();

        let published = publisher.publish_cycle(&tablets, &FailingSink).await;
        assert_eq!(published, 0);

        // Nothing was cached, so a healthy sink gets the full announcement
        let sink = RecordingSink::default();
        let published = publisher.publish_cycle(&tablets, &sink).await;
        assert_eq!(published, 10);
        assert_eq!(sink.config_payloads().len(), 5);
    }

    #[tokio::test]
    async fn test_empty_view_publishes_nothing() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();

        let published = publisher.publish_cycle(&HashMap::new(), &sink).await;

        assert_eq!(published, 0);
        assert!(sink.topics().is_empty());
    }

    #[tokio::test]
    async fn test_two_tablets_get_separate_devices() {
        let sink = RecordingSink::default();
        let mut publisher = publisher();
        let payload = json!({
            "cam1_tablet": {
                "producers": [{"source": "rtsp://cam1"}],
                "consumers": [
                    {"remote_addr": "10.0.0.5:1", "bytes_send": 100},
                    {"remote_addr": "10.0.0.6:1", "bytes_send": 200}
                ]
            }
        });
        let tablets = extract_tablets(&payload, "_tablet").unwrap();

        let published = publisher.publish_cycle(&tablets, &sink).await;

        // 2 tablets x 5 sensors x (config + state)
        assert_eq!(published, 20);
        assert_eq!(
            sink.payload("go2rtc/streams/10_0_0_5/cam1_tablet/bytes_sent")
                .as_deref(),
            Some("100")
        );
        assert_eq!(
            sink.payload("go2rtc/streams/10_0_0_6/cam1_tablet/bytes_sent")
                .as_deref(),
            Some("200")
        );
    }
}
