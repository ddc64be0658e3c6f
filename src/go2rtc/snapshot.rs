//! Tablet Snapshot Extraction
//!
//! Pure transformation of one raw stream-status payload into a per-client
//! aggregate view. Only streams whose name carries the tablet suffix are
//! considered; everything else in the payload is ignored. Missing or
//! malformed fields default to empty text or zero rather than failing the
//! cycle.

use serde_json::Value;
use std::collections::HashMap;
use thiserror::Error;

/// Aggregate view of all suffixed streams consumed by one client IP
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Tablet {
    /// User agent reported by the first consumer seen for this IP
    pub user_agent: String,
    /// Stream name to the most recent metric observed for this IP
    pub streams: HashMap<String, StreamMetric>,
}

/// Point-in-time snapshot of one stream as observed by one consumer
#[derive(Debug, Clone, PartialEq)]
pub struct StreamMetric {
    /// Producer source URL (first producer wins)
    pub source: String,
    /// Media format reported by the consumer
    pub format_name: String,
    /// Cumulative bytes sent to the consumer
    pub bytes_sent: u64,
}

/// Errors from snapshot extraction
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The status payload was not a JSON object
    #[error("Status payload is not a JSON object")]
    InvalidPayload,
}

/// Extract the per-tablet view from a raw stream-status payload.
///
/// Streams are keyed into the result by the consumer's IP (the part of
/// `remote_addr` before the first colon); consumers without one are skipped.
/// When the same IP shows up twice for one stream, the later record wins.
pub fn extract_tablets(
    payload: &Value,
    suffix: &str,
) -> Result<HashMap<String, Tablet>, SnapshotError> {
    let streams = payload.as_object().ok_or(SnapshotError::InvalidPayload)?;
    let mut tablets: HashMap<String, Tablet> = HashMap::new();

    for (name, record) in streams {
        if !name.ends_with(suffix) {
            continue;
        }

        let producers = record.get("producers").and_then(Value::as_array);
        let consumers = record.get("consumers").and_then(Value::as_array);

        let source = producers
            .and_then(|p| p.first())
            .map(producer_source)
            .unwrap_or_default();

        for consumer in consumers.into_iter().flatten() {
            let remote_addr = text_field(consumer, "remote_addr");
            let Some(ip) = client_ip(remote_addr) else {
                continue;
            };

            let tablet = tablets.entry(ip.to_string()).or_insert_with(|| Tablet {
                user_agent: text_field(consumer, "user_agent").to_string(),
                streams: HashMap::new(),
            });

            tablet.streams.insert(
                name.clone(),
                StreamMetric {
                    source: source.clone(),
                    format_name: text_field(consumer, "format_name").to_string(),
                    bytes_sent: consumer
                        .get("bytes_send")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                },
            );
        }
    }

    Ok(tablets)
}

/// First non-empty of the producer's `source` and `url` fields
fn producer_source(producer: &Value) -> String {
    let source = text_field(producer, "source");
    if !source.is_empty() {
        return source.to_string();
    }
    text_field(producer, "url").to_string()
}

/// String field lookup defaulting to empty text
fn text_field<'a>(record: &'a Value, key: &str) -> &'a str {
    record.get(key).and_then(Value::as_str).unwrap_or("")
}

/// The part of `remote_addr` before the first colon; `None` when empty
fn client_ip(remote_addr: &str) -> Option<&str> {
    let ip = remote_addr.split(':').next().unwrap_or("");
    if ip.is_empty() {
        None
    } else {
        Some(ip)
    }
}
