//! Raw Stream Mirroring
//!
//! Optionally republishes every producer and consumer record from the
//! status payload as retained JSON, one topic per record. This covers ALL
//! streams, not just the suffixed ones, so other consumers of the broker
//! can see the full go2rtc state.

use crate::mqtt::PublishSink;
use serde_json::Value;

/// Mirror every producer and consumer record under the topic root.
///
/// Producer topics are indexed; consumer topics use the consumer `url`
/// with `://`, `/` and `:` collapsed to `_`, falling back to the list
/// index when there is no url. Returns the number of messages published;
/// failures are logged and skipped.
pub async fn mirror_streams(payload: &Value, topic_root: &str, sink: &dyn PublishSink) -> usize {
    let Some(streams) = payload.as_object() else {
        return 0;
    };

    let mut published = 0;

    for (name, record) in streams {
        let base = format!("{}/{}", topic_root, name);

        if let Some(producers) = record.get("producers").and_then(Value::as_array) {
            for (idx, producer) in producers.iter().enumerate() {
                let topic = format!("{}/producers/{}", base, idx);
                published += publish_record(sink, &topic, producer).await;
            }
        }

        if let Some(consumers) = record.get("consumers").and_then(Value::as_array) {
            for (idx, consumer) in consumers.iter().enumerate() {
                let suffix = consumer
                    .get("url")
                    .and_then(Value::as_str)
                    .filter(|url| !url.is_empty())
                    .map(|url| url.replace("://", "_").replace(['/', ':'], "_"))
                    .unwrap_or_else(|| idx.to_string());
                let topic = format!("{}/consumers/{}", base, suffix);
                published += publish_record(sink, &topic, consumer).await;
            }
        }
    }

    if published > 0 {
        tracing::debug!(messages = published, "Mirrored raw stream records");
    }

    published
}

async fn publish_record(sink: &dyn PublishSink, topic: &str, record: &Value) -> usize {
    match sink.publish(topic, &record.to_string()).await {
        Ok(()) => 1,
        Err(e) => {
            tracing::warn!(topic = topic, error = %e, "Failed to mirror stream record");
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mqtt::PublishError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl RecordingSink {
        fn payload(&self, topic: &str) -> Option<Value> {
            self.messages
                .lock()
                .unwrap()
                .iter()
                .find(|(t, _)| t == topic)
                .map(|(_, payload)| serde_json::from_str(payload).unwrap())
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

    #[tokio::test]
    async fn test_mirrors_producers_and_consumers() {
        let sink = RecordingSink::default();
        let payload = json!({
            "frontdoor": {
                "producers": [
                    {"source": "rtsp://door"},
                    {"source": "rtsp://door-sub"}
                ],
                "consumers": [
                    {"url": "webrtc://10.0.0.5:8555/door", "bytes_send": 42},
                    {"format_name": "mse"}
                ]
            }
        });

        let published = mirror_streams(&payload, "go2rtc/streams", &sink).await;

        assert_eq!(published, 4);
        assert_eq!(
            sink.payload("go2rtc/streams/frontdoor/producers/0"),
            Some(json!({"source": "rtsp://door"}))
        );
        assert_eq!(
            sink.payload("go2rtc/streams/frontdoor/producers/1"),
            Some(json!({"source": "rtsp://door-sub"}))
        );
        // url-derived suffix when the consumer has one, index otherwise
        assert_eq!(
            sink.payload("go2rtc/streams/frontdoor/consumers/webrtc_10.0.0.5_8555_door"),
            Some(json!({"url": "webrtc://10.0.0.5:8555/door", "bytes_send": 42}))
        );
        assert_eq!(
            sink.payload("go2rtc/streams/frontdoor/consumers/1"),
            Some(json!({"format_name": "mse"}))
        );
    }

    #[tokio::test]
    async fn test_mirrors_all_streams_regardless_of_suffix() {
        let sink = RecordingSink::default();
        let payload = json!({
            "frontdoor": {"producers": [{"source": "rtsp://door"}]},
            "cam1_tablet": {"producers": [{"source": "rtsp://cam1"}]}
        });

        let published = mirror_streams(&payload, "go2rtc/streams", &sink).await;

        assert_eq!(published, 2);
        assert!(sink.payload("go2rtc/streams/frontdoor/producers/0").is_some());
        assert!(sink.payload("go2rtc/streams/cam1_tablet/producers/0").is_some());
    }

    #[tokio::test]
    async fn test_non_object_payload_mirrors_nothing() {
        let sink = RecordingSink::default();
        assert_eq!(mirror_streams(&json!(null), "go2rtc/streams", &sink).await, 0);
        assert_eq!(mirror_streams(&json!([1]), "go2rtc/streams", &sink).await, 0);
        assert!(sink.messages.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_lists_are_skipped() {
        let sink = RecordingSink::default();
        let payload = json!({"idle": {}});

        assert_eq!(mirror_streams(&payload, "go2rtc/streams", &sink).await, 0);
    }
}
