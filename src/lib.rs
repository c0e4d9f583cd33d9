//! Risk-free arbitrage on binary prediction markets.
//!
//! A binary market settles one share of either YES or NO at $1.00. Buying
//! one of each for less than $1.00 (after fees) therefore locks in a profit
//! whatever the outcome:
//!
//! ```text
//! YES price:        $0.45
//! NO price:         $0.45
//! ─────────────────────────
//! Total:            $0.90
//! With 2% fees:     $0.918 < $1.00
//! Margin:           8.2% per pair
//! ```
//!
//! The crate detects such quotes, sizes a position, buys both legs as close
//! to simultaneously as the venue allows, and reports exactly what filled.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`market`]: Quote types and quote sources
//! - [`arbitrage`]: Opportunity detection and dual-leg execution
//! - [`trading`]: Order boundary, sizing, positions, settlement sinks, paper venue
//! - [`bot`]: The scan loop and its statistics
//! - [`api`]: HTTP API for health/status/metrics
//! - [`metrics`]: Prometheus metrics
//! - [`utils`]: Utility functions

pub mod api;
pub mod arbitrage;
pub mod bot;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use error::{ArbError, Result};
