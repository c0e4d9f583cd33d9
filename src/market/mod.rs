//! Market module for binary prediction markets.
//!
//! This module handles:
//! - Market identifiers, outcomes and two-sided quotes
//! - Quote sources (polled snapshots and snapshot streams)

pub mod source;
pub mod types;

pub use source::{quote_stream, FileQuoteSource, QuoteSnapshot, QuoteSource, StaticQuoteSource};
pub use types::{MarketId, MarketQuote, Outcome, RawQuote};
