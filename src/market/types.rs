//! Market-related types for binary prediction markets.

use std::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use crate::error::ValidationError;

/// Opaque market identifier, stable for the life of the market.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MarketId(String);

impl MarketId {
    /// Create a market id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the underlying identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MarketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MarketId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for MarketId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// One side of a binary market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Outcome {
    /// The YES leg.
    #[strum(to_string = "YES", serialize = "yes")]
    #[default]
    Yes,
    /// The NO leg.
    #[strum(to_string = "NO", serialize = "no")]
    No,
}

/// Two-sided price snapshot of a single binary market.
///
/// `yes_price` and `no_price` must be simultaneous as of `as_of`. Nothing in
/// this crate mutates a quote after construction; use [`MarketQuote::new`] to
/// get a validated one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawQuote")]
pub struct MarketQuote {
    /// Market this quote belongs to.
    pub market_id: MarketId,
    /// Cost per share of the YES outcome, in (0, 1).
    pub yes_price: Decimal,
    /// Cost per share of the NO outcome, in (0, 1).
    pub no_price: Decimal,
    /// When the quote was observed.
    #[serde(with = "time::serde::rfc3339")]
    pub as_of: OffsetDateTime,
}

impl MarketQuote {
    /// Create a validated quote.
    pub fn new(
        market_id: impl Into<MarketId>,
        yes_price: Decimal,
        no_price: Decimal,
        as_of: OffsetDateTime,
    ) -> Result<Self, ValidationError> {
        let quote = Self {
            market_id: market_id.into(),
            yes_price,
            no_price,
            as_of,
        };
        quote.validate()?;
        Ok(quote)
    }

    /// Check the price and identifier invariants.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.market_id.as_str().is_empty() {
            return Err(ValidationError::invalid_quote("", "market_id is empty"));
        }
        check_price(&self.market_id, "yes_price", self.yes_price)?;
        check_price(&self.market_id, "no_price", self.no_price)?;
        Ok(())
    }

    /// Price of the given leg.
    pub fn price(&self, outcome: Outcome) -> Decimal {
        match outcome {
            Outcome::Yes => self.yes_price,
            Outcome::No => self.no_price,
        }
    }

    /// Combined cost of owning one share of each outcome.
    pub fn total_cost(&self) -> Decimal {
        self.yes_price + self.no_price
    }

    /// Age of the quote at `now`. Negative when `as_of` is in the future.
    pub fn age_at(&self, now: OffsetDateTime) -> time::Duration {
        now - self.as_of
    }
}

fn check_price(market_id: &MarketId, field: &str, price: Decimal) -> Result<(), ValidationError> {
    if price <= Decimal::ZERO || price >= Decimal::ONE {
        return Err(ValidationError::invalid_quote(
            market_id.as_str(),
            format!("{field} {price} is outside (0, 1)"),
        ));
    }
    Ok(())
}

/// Quote as received from a feed, before required fields are checked.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawQuote {
    /// Market id (also accepted as `id`).
    #[serde(default, alias = "id")]
    pub market_id: Option<String>,
    /// YES price.
    #[serde(default)]
    pub yes_price: Option<Decimal>,
    /// NO price.
    #[serde(default)]
    pub no_price: Option<Decimal>,
    /// Observation time.
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub as_of: Option<OffsetDateTime>,
}

impl TryFrom<RawQuote> for MarketQuote {
    type Error = ValidationError;

    fn try_from(raw: RawQuote) -> Result<Self, Self::Error> {
        let market_id = raw
            .market_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ValidationError::invalid_quote("", "missing market_id"))?;
        let yes_price = raw
            .yes_price
            .ok_or_else(|| {
                ValidationError::invalid_quote(market_id.as_str(), "missing yes_price")
            })?;
        let no_price = raw
            .no_price
            .ok_or_else(|| ValidationError::invalid_quote(market_id.as_str(), "missing no_price"))?;
        let as_of = raw
            .as_of
            .ok_or_else(|| ValidationError::invalid_quote(market_id.as_str(), "missing as_of"))?;

        MarketQuote::new(market_id, yes_price, no_price, as_of)
    }
}
