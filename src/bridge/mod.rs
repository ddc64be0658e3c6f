//! Bridge Service Loop
//!
//! This module provides the polling pipeline between go2rtc and MQTT:
//! - Bandwidth rate derivation from cumulative counters
//! - Per-cycle sensor publishing with discovery announcements
//! - Optional raw record mirroring
//! - The outer fetch → extract → publish loop

mod publisher;
mod rate;
mod raw;

pub use publisher::TabletPublisher;
pub use rate::BitrateTracker;
pub use raw::mirror_streams;

use crate::config::Config;
use crate::go2rtc::{extract_tablets, Go2rtcClient};
use crate::mqtt::PublishSink;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::{Interval, MissedTickBehavior};

/// The polling bridge service
///
/// Owns the status client, the publish state, and the sink. One cycle at
/// a time; a failed fetch or a bad payload costs that cycle, never the
/// process.
pub struct Bridge<S: PublishSink> {
    config: Config,
    go2rtc: Go2rtcClient,
    publisher: TabletPublisher,
    sink: S,
}

impl<S: PublishSink> Bridge<S> {
    pub fn new(config: Config, sink: S) -> Self {
        let go2rtc = Go2rtcClient::new(&config.go2rtc);
        let publisher = TabletPublisher::new(
            &config.mqtt.topic_root,
            &config.mqtt.discovery_prefix,
            config.bridge.poll_interval_secs,
        );

        Self {
            config,
            go2rtc,
            publisher,
            sink,
        }
    }

    /// Run the poll loop forever.
    ///
    /// The first cycle runs immediately; after that one cycle per poll
    /// interval. Never returns.
    pub async fn run(mut self) {
        tracing::info!(
            interval_secs = self.config.bridge.poll_interval_secs,
            api_url = %self.config.go2rtc.api_url,
            "Starting bridge"
        );

        let mut ticker = poll_ticker(self.config.bridge.poll_interval_secs);

        loop {
            ticker.tick().await;
            self.run_cycle().await;
        }
    }

    /// One fetch → extract → publish pass
    async fn run_cycle(&mut self) -> usize {
        let payload = match self.go2rtc.fetch_streams().await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch stream status");
                return 0;
            }
        };

        let tablets = match extract_tablets(&payload, &self.config.bridge.stream_suffix) {
            Ok(tablets) => tablets,
            Err(e) => {
                tracing::error!(error = %e, "Failed to extract tablet view");
                HashMap::new()
            }
        };

        let mut published = self.publisher.publish_cycle(&tablets, &self.sink).await;

        if self.config.bridge.publish_raw {
            published += mirror_streams(&payload, &self.config.mqtt.topic_root, &self.sink).await;
        }

        published
    }
}

/// Ticker for the poll loop. A cycle that overruns the interval delays
/// the next tick instead of bursting to catch up.
fn poll_ticker(interval_secs: u64) -> Interval {
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    ticker
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::PublishError;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl PublishSink for NullSink {
        async fn publish(&self, _topic: &str, _payload: &str) -> Result<(), PublishError> {
            Ok(())
        }
    }

    #[test]
    fn test_bridge_constructs_from_default_config() {
        let bridge = Bridge::new(Config::default(), NullSink);
        assert_eq!(bridge.config.bridge.poll_interval_secs, 30);
        assert!(!bridge.config.bridge.publish_raw);
    }

    #[tokio::test]
    async fn test_poll_ticker_delays_missed_ticks() {
        let ticker = poll_ticker(30);
        assert_eq!(ticker.period(), Duration::from_secs(30));
        assert_eq!(ticker.missed_tick_behavior(), MissedTickBehavior::Delay);
    }
}
