use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::EventSource;
use crate::event::FeedRecord;

/// In-process feed for embedding the daemon behind another bridge
pub struct ChannelSource {
    rx: mpsc::Receiver<FeedRecord>,
}

impl ChannelSource {
    /// Sender half plus the source; the feed ends when every sender is dropped
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<FeedRecord>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl EventSource for ChannelSource {
    async fn next_record(&mut self) -> Result<Option<FeedRecord>> {
        Ok(self.rx.recv().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::ForegroundChangeEvent;
    use chrono::Utc;

    #[tokio::test]
    async fn test_channel_ends_when_sender_dropped() {
        let (tx, mut source) = ChannelSource::channel(4);
        tx.send(ForegroundChangeEvent::window_changed("com.x", Utc::now()).into())
            .await
            .unwrap();
        drop(tx);

        assert!(source.next_record().await.unwrap().is_some());
        assert!(source.next_record().await.unwrap().is_none());
    }
}
