use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;

use crate::event::FeedRecord;

pub mod channel;
pub mod lines;

pub use channel::ChannelSource;
pub use lines::JsonLinesSource;

/// Ordered feed of foreground events from the OS bridge
#[async_trait]
pub trait EventSource: Send {
    /// Next record, or `Ok(None)` once the feed has ended
    async fn next_record(&mut self) -> Result<Option<FeedRecord>>;
}

/// Create the feed for the daemon: a file or fifo when given, stdin otherwise
///
/// # Errors
///
/// Returns an error if the input file cannot be opened
pub async fn create_source(input: Option<&Path>) -> Result<Box<dyn EventSource>> {
    match input {
        Some(path) => Ok(Box::new(JsonLinesSource::open(path).await?)),
        None => Ok(Box::new(JsonLinesSource::stdin())),
    }
}
