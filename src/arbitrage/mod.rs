//! Arbitrage module for detecting and executing opportunities.
//!
//! This module handles:
//! - Opportunity detection from binary market quotes
//! - Profit/cost calculations
//! - Dual-leg execution with fill reconciliation

pub mod calculator;
pub mod detector;
pub mod executor;

pub use calculator::{cost_with_fees, pair_profit, profit_margin, ArbitrageOpportunity};
pub use detector::{diagnose, evaluate, rank, scan, QuoteDiagnosis, Scan};
pub use executor::{client_order_id, limit_price, ArbitrageExecutor, ExecutionParams};
