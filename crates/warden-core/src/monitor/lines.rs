use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines, Stdin};

use super::EventSource;
use crate::event::FeedRecord;

/// Reads one JSON `FeedRecord` per line
///
/// Malformed lines are logged and skipped; they never end the feed.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: u64,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl JsonLinesSource<BufReader<Stdin>> {
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()))
    }
}

impl JsonLinesSource<BufReader<File>> {
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened
    pub async fn open(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .await
            .with_context(|| format!("Failed to open event feed {}", path.display()))?;
        log::info!("Reading events from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> EventSource for JsonLinesSource<R> {
    async fn next_record(&mut self) -> Result<Option<FeedRecord>> {
        while let Some(line) = self.lines.next_line().await? {
            self.line_no += 1;
            match FeedRecord::parse_line(&line) {
                Ok(Some(record)) => return Ok(Some(record)),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping feed line {}: {e}", self.line_no),
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reads_records_and_skips_garbage() {
        let input = concat!(
            "{\"type\":\"foreground\",\"package\":\"com.x\",\"kind\":\"window_changed\",\"timestamp\":\"2024-01-01T10:00:00Z\"}\n",
            "\n",
            "not json at all\n",
            "{\"type\":\"overlay_dismissed\",\"timestamp\":\"2024-01-01T10:00:05Z\"}\n",
        );
        let mut source = JsonLinesSource::new(input.as_bytes());

        let first = source.next_record().await.unwrap().unwrap();
        assert!(matches!(first, FeedRecord::Foreground(_)));

        let second = source.next_record().await.unwrap().unwrap();
        assert!(matches!(second, FeedRecord::OverlayDismissed { .. }));

        assert!(source.next_record().await.unwrap().is_none());
        assert_eq!(source.line_no, 4);
    }

    #[tokio::test]
    async fn test_open_missing_file_fails() {
        let result = JsonLinesSource::open(Path::new("/nonexistent/feed.jsonl")).await;
        assert!(result.is_err());
    }
}
