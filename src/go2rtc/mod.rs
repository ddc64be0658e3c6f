//! go2rtc Status Source
//!
//! Talks to a go2rtc server's streams API and turns its loosely-structured
//! payload into a typed per-tablet view.
//!
//! - **Client**: HTTP client for `/api/streams`
//! - **Snapshot**: pure extraction of the per-IP aggregate view

mod client;
mod snapshot;

pub use client::{Go2rtcClient, Go2rtcError};
pub use snapshot::{extract_tablets, SnapshotError, StreamMetric, Tablet};
