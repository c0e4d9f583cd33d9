//! Application configuration loaded from environment variables.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;

use crate::arbitrage::executor::ExecutionParams;
use crate::trading::sizing::SizingParams;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Detection ===
    /// Proportional fee charged on the cost basis (e.g., 0.02).
    #[serde(default = "default_fee_rate")]
    pub fee_rate: Decimal,

    /// Minimum post-fee margin to act on (e.g., 0.01 = 1%).
    #[serde(default = "default_min_profit_margin")]
    pub min_profit_margin: Decimal,

    // === Sizing ===
    /// Base investment per opportunity, in USD.
    #[serde(default = "default_base_size")]
    pub base_size: Decimal,

    /// Maximum investment per opportunity, in USD.
    #[serde(default = "default_max_size")]
    pub max_size: Decimal,

    // === Execution ===
    /// Allowed price slippage applied to each leg's limit (0.02 = 2%).
    #[serde(default = "default_max_slippage")]
    pub max_slippage: Decimal,

    /// Per-leg response timeout in milliseconds.
    #[serde(default = "default_execution_timeout_ms")]
    pub execution_timeout_ms: u64,

    /// Maximum quote age at execution time, in milliseconds.
    #[serde(default = "default_max_quote_age_ms")]
    pub max_quote_age_ms: u64,

    /// Status queries attempted for a leg whose placement went unanswered.
    #[serde(default = "default_fill_query_attempts")]
    pub fill_query_attempts: u32,

    // === Bot loop ===
    /// Pause between scan cycles in milliseconds.
    #[serde(default = "default_scan_interval_ms")]
    pub scan_interval_ms: u64,

    /// JSON file of quotes polled by the paper bot.
    #[serde(default)]
    pub quotes_file: Option<String>,

    /// Starting cash for the paper order service.
    #[serde(default = "default_paper_balance")]
    pub paper_balance: Decimal,

    /// Optional JSON-lines file receiving settled positions.
    #[serde(default)]
    pub trades_log: Option<String>,

    // === Server Configuration ===
    /// HTTP server port for health/metrics endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Enable verbose logging.
    #[serde(default)]
    pub verbose: bool,
}

fn default_fee_rate() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_min_profit_margin() -> Decimal {
    Decimal::new(1, 2) // 0.01
}

fn default_base_size() -> Decimal {
    Decimal::new(100, 0) // $100
}

fn default_max_size() -> Decimal {
    Decimal::new(1000, 0) // $1000
}

fn default_max_slippage() -> Decimal {
    Decimal::new(2, 2) // 0.02
}

fn default_execution_timeout_ms() -> u64 {
    500
}

fn default_max_quote_age_ms() -> u64 {
    1000
}

fn default_fill_query_attempts() -> u32 {
    3
}

fn default_scan_interval_ms() -> u64 {
    100
}

fn default_paper_balance() -> Decimal {
    Decimal::new(10_000, 0) // $10,000
}

fn default_port() -> u16 {
    8080
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fee_rate: default_fee_rate(),
            min_profit_margin: default_min_profit_margin(),
            base_size: default_base_size(),
            max_size: default_max_size(),
            max_slippage: default_max_slippage(),
            execution_timeout_ms: default_execution_timeout_ms(),
            max_quote_age_ms: default_max_quote_age_ms(),
            fill_query_attempts: default_fill_query_attempts(),
            scan_interval_ms: default_scan_interval_ms(),
            quotes_file: None,
            paper_balance: default_paper_balance(),
            trades_log: None,
            port: default_port(),
            rust_log: default_log_level(),
            verbose: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.fee_rate < Decimal::ZERO || self.fee_rate >= Decimal::ONE {
            return Err("FEE_RATE must be in [0, 1)".to_string());
        }

        if self.min_profit_margin < Decimal::ZERO || self.min_profit_margin >= Decimal::ONE {
            return Err("MIN_PROFIT_MARGIN must be in [0, 1)".to_string());
        }

        if self.base_size <= Decimal::ZERO {
            return Err("BASE_SIZE must be positive".to_string());
        }

        if self.max_size < self.base_size {
            return Err("MAX_SIZE must be at least BASE_SIZE".to_string());
        }

        if self.max_slippage < Decimal::ZERO {
            return Err("MAX_SLIPPAGE must not be negative".to_string());
        }

        if self.execution_timeout_ms == 0 {
            return Err("EXECUTION_TIMEOUT_MS must be non-zero".to_string());
        }

        if self.max_quote_age_ms == 0 {
            return Err("MAX_QUOTE_AGE_MS must be non-zero".to_string());
        }

        Ok(())
    }

    /// Parameters handed to the executor.
    pub fn execution_params(&self) -> ExecutionParams {
        ExecutionParams {
            max_quote_age: Duration::from_millis(self.max_quote_age_ms),
            leg_timeout: Duration::from_millis(self.execution_timeout_ms),
            fill_query_attempts: self.fill_query_attempts,
            max_slippage: self.max_slippage,
        }
    }

    /// Parameters handed to position sizing.
    pub fn sizing_params(&self) -> SizingParams {
        SizingParams {
            base_size: self.base_size,
            max_size: self.max_size,
        }
    }

    /// Pause between scan cycles.
    pub fn scan_interval(&self) -> Duration {
        Duration::from_millis(self.scan_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn default_values_are_sensible() {
        assert_eq!(default_fee_rate(), dec!(0.02));
        assert_eq!(default_min_profit_margin(), dec!(0.01));
        assert_eq!(default_execution_timeout_ms(), 500);
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn validate_rejects_fee_rate_of_one() {
        let config = Config {
            fee_rate: dec!(1),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_max_below_base() {
        let config = Config {
            base_size: dec!(500),
            max_size: dec!(100),
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_zero_timeout() {
        let config = Config {
            execution_timeout_ms: 0,
            ..Config::default()
        };

        assert!(config.validate().is_err());
    }

    #[test]
    fn execution_params_carry_durations() {
        let config = Config {
            execution_timeout_ms: 250,
            max_quote_age_ms: 2000,
            ..Config::default()
        };

        let params = config.execution_params();
        assert_eq!(params.leg_timeout, Duration::from_millis(250));
        assert_eq!(params.max_quote_age, Duration::from_secs(2));
        assert_eq!(params.max_slippage, dec!(0.02));
    }
}
