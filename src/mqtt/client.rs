//! MQTT Broker Client
//!
//! Async rumqttc wrapper. Connecting blocks until the broker acknowledges
//! the session, then the event loop moves to a background task that keeps
//! the connection alive and drains acknowledgements.

use crate::config::MqttConfig;
use crate::mqtt::{PublishError, PublishSink};
use async_trait::async_trait;
use rumqttc::{AsyncClient, ConnectReturnCode, Event, MqttOptions, Packet, QoS};
use std::time::Duration;
use thiserror::Error;

/// Publishes retained messages to an MQTT broker
pub struct MqttPublisher {
    client: AsyncClient,
}

/// Errors that can occur while establishing the broker session
#[derive(Error, Debug)]
pub enum MqttError {
    #[error("Failed to connect to MQTT broker: {0}")]
    Connect(String),

    #[error("MQTT broker refused connection: {0:?}")]
    Refused(ConnectReturnCode),
}

impl MqttPublisher {
    /// Connect to the broker and spawn the background event loop.
    ///
    /// Credentials are sent only when both username and password are set.
    /// Any failure before the broker acknowledges the session is returned
    /// to the caller; the process cannot do useful work without a broker.
    pub async fn connect(config: &MqttConfig) -> Result<Self, MqttError> {
        let mut options =
            MqttOptions::new(config.client_id.clone(), config.broker.clone(), config.port);
        options.set_keep_alive(Duration::from_secs(30));

        if !config.username.is_empty() && !config.password.is_empty() {
            options.set_credentials(config.username.clone(), config.password.clone());
        }

        let (client, mut eventloop) = AsyncClient::new(options, 64);

        // Drive the event loop by hand until the ConnAck arrives
        loop {
            match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    if ack.code == ConnectReturnCode::Success {
                        break;
                    }
                    return Err(MqttError::Refused(ack.code));
                }
                Ok(_) => {}
                Err(e) => return Err(MqttError::Connect(e.to_string())),
            }
        }

        tracing::info!(
            broker = %config.broker,
            port = config.port,
            "Connected to MQTT broker"
        );

        // Publishes stall unless the loop keeps polling. After startup a
        // broken connection is retried here instead of killing the process.
        tokio::spawn(async move {
            loop {
                if let Err(e) = eventloop.poll().await {
                    tracing::warn!(error = %e, "MQTT connection error, retrying");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
            }
        });

        Ok(Self { client })
    }
}

#[async_trait]
impl PublishSink for MqttPublisher {
    async fn publish(&self, topic: &str, payload: &str) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, true, payload.to_owned())
            .await
            .map_err(|e| PublishError::Disconnected(e.to_string()))
    }
}
