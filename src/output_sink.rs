//! `OutputSink` (§4.8 of SPEC_FULL.md): emit one message per enriched item,
//! message key = upstream `md5`. The concrete message-queue broker is out of
//! scope (§1); this module provides the trait seam plus a channel-backed
//! implementation used by tests and by any in-process consumer.

use crate::error::ClusterError;
use crate::news::EnrichedNews;
use tokio::sync::mpsc;

#[async_trait::async_trait]
pub trait OutputSink: Send + Sync {
    /// At-least-once; consumers deduplicate on `key` (§4.8, §8 property 7).
    async fn emit(&self, key: &str, item: &EnrichedNews) -> Result<(), ClusterError>;
}

/// Emits `(key, json)` pairs over an in-process channel. A real deployment
/// swaps this for a broker producer without touching the Clusterer or
/// Dispatcher.
pub struct ChannelOutputSink {
    sender: mpsc::Sender<(String, String)>,
}

impl ChannelOutputSink {
    #[must_use]
    pub fn new(sender: mpsc::Sender<(String, String)>) -> Self {
        Self { sender }
    }
}

#[async_trait::async_trait]
impl OutputSink for ChannelOutputSink {
    async fn emit(&self, key: &str, item: &EnrichedNews) -> Result<(), ClusterError> {
        let payload = serde_json::to_string(item)
            .map_err(|e| ClusterError::InvariantViolation(format!("failed to encode item: {e}")))?;
        self.sender
            .send((key.to_string(), payload))
            .await
            .map_err(|e| ClusterError::TransientRemote(format!("output channel closed: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector::Vector;
    use chrono::Utc;

    fn sample_item() -> EnrichedNews {
        let news = crate::news::NewsItem {
            id: 1,
            title: "T".to_string(),
            pub_date: Utc::now(),
            description: "D".to_string(),
            full_text: "F".to_string(),
            name: "src".to_string(),
            link: "http://example.com".to_string(),
            md5: "abc".to_string(),
            enclosure: String::new(),
            category: String::new(),
            changed: false,
        };
        EnrichedNews::new(&news, 42, &Vector::new(vec![1.0, 0.0]), false)
    }

    #[tokio::test]
    async fn emit_sends_key_and_json_payload() {
        let (tx, mut rx) = mpsc::channel(1);
        let sink = ChannelOutputSink::new(tx);
        let item = sample_item();
        sink.emit("abc", &item).await.unwrap();

        let (key, payload) = rx.recv().await.unwrap();
        assert_eq!(key, "abc");
        assert!(payload.contains("\"cluster_id\":42"));
    }

    #[tokio::test]
    async fn emit_fails_when_receiver_dropped() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sink = ChannelOutputSink::new(tx);
        let item = sample_item();
        assert!(sink.emit("abc", &item).await.is_err());
    }
}
