//! Destinations for finalized positions.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{error, info, warn};

use super::position::{Position, PositionStatus};
use crate::error::Result;

/// Receives every finalized [`Position`], including stale rejections.
///
/// Called from the task that settles an execution, which may outlive the
/// caller of `execute`. Implementations must not block for long.
pub trait SettlementSink: Send + Sync {
    /// Accept a finalized position.
    fn settle(&self, position: &Position);
}

/// Reports positions through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl SettlementSink for LogSink {
    fn settle(&self, position: &Position) {
        match position.status {
            PositionStatus::FilledBoth => match position.unhedged {
                None => info!(
                    market = %position.market_id,
                    yes_filled = %position.yes_filled,
                    no_filled = %position.no_filled,
                    profit = ?position.realized_profit_estimate,
                    "Position settled: both legs filled"
                ),
                Some(excess) => error!(
                    market = %position.market_id,
                    yes_filled = %position.yes_filled,
                    no_filled = %position.no_filled,
                    outcome = %excess.outcome,
                    quantity = %excess.quantity,
                    price = %excess.price,
                    "Position settled with unpaired shares"
                ),
            },
            PositionStatus::FilledYesOnly | PositionStatus::FilledNoOnly => {
                if let Some(leg) = position.unhedged {
                    error!(
                        market = %position.market_id,
                        status = %position.status,
                        outcome = %leg.outcome,
                        quantity = %leg.quantity,
                        price = %leg.price,
                        "Position settled with directional exposure"
                    );
                }
            }
            PositionStatus::FilledNeither => warn!(
                market = %position.market_id,
                unconfirmed = ?position.unconfirmed_legs,
                "Position settled: neither leg filled"
            ),
            PositionStatus::RejectedStale => info!(
                market = %position.market_id,
                quote_as_of = %position.quote_as_of,
                "Execution refused: stale quote"
            ),
        }
    }
}

/// Appends each position as one JSON line.
#[derive(Debug)]
pub struct JsonLinesSink {
    path: PathBuf,
    file: Mutex<File>,
}

impl JsonLinesSink {
    /// Open (or create) the log file for appending.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        info!(path = %path.display(), "Trade log opened");
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Write one position.
    pub fn append(&self, position: &Position) -> Result<()> {
        let mut line = serde_json::to_vec(position)?;
        line.push(b'\n');

        let mut file = self.file.lock().unwrap_or_else(PoisonError::into_inner);
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

impl SettlementSink for JsonLinesSink {
    fn settle(&self, position: &Position) {
        if let Err(e) = self.append(position) {
            error!(path = %self.path.display(), error = %e, "Failed to write trade log");
        }
    }
}

/// Keeps positions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    positions: Mutex<Vec<Position>>,
}

impl MemorySink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions received so far, oldest first.
    pub fn positions(&self) -> Vec<Position> {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of positions received.
    pub fn len(&self) -> usize {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether nothing has been received.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SettlementSink for MemorySink {
    fn settle(&self, position: &Position) {
        self.positions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(position.clone());
    }
}

/// Forwards every position to each inner sink in order.
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn SettlementSink>>,
}

impl FanoutSink {
    /// Create an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a sink.
    pub fn with(mut self, sink: Arc<dyn SettlementSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl SettlementSink for FanoutSink {
    fn settle(&self, position: &Position) {
        for sink in &self.sinks {
            sink.settle(position);
        }
    }
}
