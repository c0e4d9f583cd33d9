//! Trading module: the order boundary and what happens on each side of it.
//!
//! This module handles:
//! - Order types and the `OrderPlacementService` trait
//! - Single-leg dispatch with timeout and fill reconciliation
//! - Position sizing
//! - Settlement records and sinks
//! - A paper venue for dry runs and tests

pub mod execution;
pub mod order;
pub mod paper;
pub mod position;
pub mod sink;
pub mod sizing;

pub use execution::{reconcile_leg, run_leg, LegReport};
pub use order::{FillResult, OrderPlacementService, OrderRequest};
pub use paper::{PaperBook, PaperOrderService, PaperStats};
pub use position::{FilledLeg, Position, PositionStatus};
pub use sink::{FanoutSink, JsonLinesSink, LogSink, MemorySink, SettlementSink};
pub use sizing::{planned_investment, size_position, SizingParams};
