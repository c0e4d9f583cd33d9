//! Unified error types for the arbitrage core.

use rust_decimal::Decimal;
use thiserror::Error;

/// Unified error type for the arbitrage bot.
#[derive(Error, Debug)]
pub enum ArbError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Local validation failure (bad quote, bad parameters, no capital).
    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Order placement service failure.
    #[error("order error: {0}")]
    Order(#[from] OrderError),

    /// JSON parsing error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Caller-caused failures detected before anything is dispatched.
///
/// These are returned synchronously and are never retried by the core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// Quote is malformed: a price outside (0, 1) or a missing field.
    #[error("invalid quote for market {market_id}: {reason}")]
    InvalidQuote {
        /// Market the quote claims to describe (may be empty when missing).
        market_id: String,
        /// What was wrong with it.
        reason: String,
    },

    /// No capital to size a position against.
    #[error("insufficient capital: {available} available")]
    InsufficientCapital {
        /// Capital the caller reported as available.
        available: Decimal,
    },

    /// A numeric parameter is outside its allowed range.
    #[error("invalid parameter {name}: {value}")]
    InvalidParameter {
        /// Parameter name.
        name: &'static str,
        /// Offending value.
        value: Decimal,
    },
}

impl ValidationError {
    /// Build an `InvalidQuote` error.
    pub fn invalid_quote(market_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidQuote {
            market_id: market_id.into(),
            reason: reason.into(),
        }
    }
}

/// Failures reported by an order placement service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrderError {
    /// The venue refused the order outright.
    #[error("order rejected: {reason}")]
    Rejected {
        /// Rejection reason from the venue.
        reason: String,
    },

    /// Not enough funds to cover the order.
    #[error("insufficient funds: need {required}, have {available}")]
    InsufficientFunds {
        /// Required amount.
        required: Decimal,
        /// Available amount.
        available: Decimal,
    },

    /// Transport-level failure; the order may or may not have reached the venue.
    #[error("transport error: {0}")]
    Transport(String),

    /// No response within the allotted time.
    #[error("no response within {after_ms}ms")]
    Timeout {
        /// Milliseconds waited.
        after_ms: u64,
    },

    /// The venue has no record of the order.
    #[error("order {client_order_id} not found")]
    NotFound {
        /// Client order id that was looked up.
        client_order_id: String,
    },
}

impl OrderError {
    /// Whether the order might still have filled despite this error.
    ///
    /// Ambiguous failures require a status query before the leg can be
    /// reported as unfilled.
    pub fn is_ambiguous(&self) -> bool {
        matches!(self, OrderError::Transport(_) | OrderError::Timeout { .. })
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, ArbError>;
