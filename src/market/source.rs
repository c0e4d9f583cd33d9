//! Quote sources feeding the detector.
//!
//! A source either answers polls with a fresh snapshot (pull) or is turned
//! into a stream of snapshots with [`quote_stream`] (push).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::Stream;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::types::{MarketQuote, RawQuote};
use crate::error::{Result, ValidationError};

/// One polled snapshot: well-formed quotes and the ones that failed validation.
#[derive(Debug, Clone, Default)]
pub struct QuoteSnapshot {
    /// Validated quotes, in feed order.
    pub quotes: Vec<MarketQuote>,
    /// Quotes that could not be validated.
    pub rejected: Vec<ValidationError>,
}

/// Supplier of market quotes.
///
/// Implementations must keep `as_of` non-decreasing per market and must
/// observe both prices of a quote at the same instant.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// Take a snapshot of current quotes.
    async fn poll(&self) -> Result<QuoteSnapshot>;
}

/// Reads a JSON array of quotes from disk on every poll.
///
/// Entries without `as_of` are stamped with the read time.
#[derive(Debug, Clone)]
pub struct FileQuoteSource {
    path: PathBuf,
}

impl FileQuoteSource {
    /// Create a source for the given file.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuoteSource for FileQuoteSource {
    async fn poll(&self) -> Result<QuoteSnapshot> {
        let contents = tokio::fs::read_to_string(&self.path).await?;
        let raw: Vec<RawQuote> = serde_json::from_str(&contents)?;
        let read_at = OffsetDateTime::now_utc();

        let mut snapshot = QuoteSnapshot::default();
        for mut entry in raw {
            entry.as_of.get_or_insert(read_at);
            match MarketQuote::try_from(entry) {
                Ok(quote) => snapshot.quotes.push(quote),
                Err(e) => snapshot.rejected.push(e),
            }
        }

        debug!(
            path = %self.path.display(),
            quotes = snapshot.quotes.len(),
            rejected = snapshot.rejected.len(),
            "Loaded quote file"
        );

        Ok(snapshot)
    }
}

/// Serves queued snapshots in order, then empty snapshots.
#[derive(Debug, Clone, Default)]
pub struct StaticQuoteSource {
    snapshots: Arc<Mutex<Vec<Vec<MarketQuote>>>>,
}

impl StaticQuoteSource {
    /// Create a source that replays the given snapshots.
    pub fn new(snapshots: Vec<Vec<MarketQuote>>) -> Self {
        let mut snapshots = snapshots;
        snapshots.reverse();
        Self {
            snapshots: Arc::new(Mutex::new(snapshots)),
        }
    }
}

#[async_trait]
impl QuoteSource for StaticQuoteSource {
    async fn poll(&self) -> Result<QuoteSnapshot> {
        let quotes = self.snapshots.lock().await.pop().unwrap_or_default();
        Ok(QuoteSnapshot {
            quotes,
            rejected: Vec::new(),
        })
    }
}

/// Turn a polled source into a stream of snapshots, one per `interval`.
///
/// Poll errors are logged and skipped; the stream never ends on its own.
pub fn quote_stream<S>(source: Arc<S>, interval: Duration) -> impl Stream<Item = QuoteSnapshot>
where
    S: QuoteSource + ?Sized + 'static,
{
    async_stream::stream! {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match source.poll().await {
                Ok(snapshot) => yield snapshot,
                Err(e) => warn!(error = %e, "Quote poll failed"),
            }
        }
    }
}
