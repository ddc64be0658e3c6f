//! MQTT Publishing
//!
//! This module provides the broker connection and Home Assistant
//! integration surface:
//! - Async broker client (connect, background event loop, publish)
//! - Discovery config announcement (once per entity per process)

mod client;
mod discovery;

pub use client::{MqttError, MqttPublisher};
pub use discovery::{config_topic, Device, DiscoveryCache, SensorConfig};

use async_trait::async_trait;

/// Common trait for anything that can publish retained messages
#[async_trait]
pub trait PublishSink: Send + Sync {
    /// Publish a retained message at QoS 1
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError>;
}

/// Errors that can occur while publishing
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Broker connection lost: {0}")]
    Disconnected(String),

    #[error("Payload serialization failed: {0}")]
    Payload(#[from] serde_json::Error),
}
