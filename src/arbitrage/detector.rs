//! Arbitrage opportunity detection.
//!
//! Everything here is pure: no I/O, no shared state, and quotes are only
//! read. Independent quotes may be evaluated from any number of threads.

use std::fmt;

use rust_decimal::Decimal;
use tracing::{debug, instrument};

use super::calculator::{cost_with_fees, profit_margin, ArbitrageOpportunity};
use crate::error::ValidationError;
use crate::market::MarketQuote;

/// Evaluate one quote.
///
/// Returns `Ok(None)` when the post-fee margin is below `min_profit_margin`.
/// The threshold is inclusive: a margin exactly equal to it qualifies.
/// The no-opportunity path does not allocate.
#[instrument(level = "trace", skip(quote), fields(market = %quote.market_id))]
pub fn evaluate(
    quote: &MarketQuote,
    fee_rate: Decimal,
    min_profit_margin: Decimal,
) -> Result<Option<ArbitrageOpportunity>, ValidationError> {
    let margin = qualifying_margin(quote, fee_rate, min_profit_margin)?;
    Ok(margin.map(|m| ArbitrageOpportunity::from_quote(quote.clone(), fee_rate, m)))
}

/// Lazily evaluate a sequence of quotes.
///
/// Yields one `Ok` per qualifying quote in input order and one `Err` per
/// malformed quote. Quotes are consumed; a qualifying quote is moved into its
/// opportunity and nothing else is kept.
pub fn scan<I>(quotes: I, fee_rate: Decimal, min_profit_margin: Decimal) -> Scan<I::IntoIter>
where
    I: IntoIterator<Item = MarketQuote>,
{
    Scan {
        quotes: quotes.into_iter(),
        fee_rate,
        min_profit_margin,
    }
}

/// Iterator returned by [`scan`].
#[derive(Debug, Clone)]
pub struct Scan<I> {
    quotes: I,
    fee_rate: Decimal,
    min_profit_margin: Decimal,
}

impl<I> Iterator for Scan<I>
where
    I: Iterator<Item = MarketQuote>,
{
    type Item = Result<ArbitrageOpportunity, ValidationError>;

    fn next(&mut self) -> Option<Self::Item> {
        for quote in self.quotes.by_ref() {
            match qualifying_margin(&quote, self.fee_rate, self.min_profit_margin) {
                Ok(Some(margin)) => {
                    return Some(Ok(ArbitrageOpportunity::from_quote(
                        quote,
                        self.fee_rate,
                        margin,
                    )))
                }
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
        None
    }
}

/// Sort opportunities best first (highest margin). Ties keep input order.
pub fn rank(mut opportunities: Vec<ArbitrageOpportunity>) -> Vec<ArbitrageOpportunity> {
    opportunities.sort_by(|a, b| b.profit_margin.cmp(&a.profit_margin));
    opportunities
}

/// Explain how a quote fares against the threshold.
pub fn diagnose(
    quote: &MarketQuote,
    fee_rate: Decimal,
    min_profit_margin: Decimal,
) -> Result<QuoteDiagnosis, ValidationError> {
    check_parameters(fee_rate, min_profit_margin)?;
    quote.validate()?;

    let total_cost = quote.total_cost();
    let margin = profit_margin(total_cost, fee_rate);

    Ok(QuoteDiagnosis {
        yes_price: quote.yes_price,
        no_price: quote.no_price,
        total_cost,
        total_cost_with_fees: cost_with_fees(total_cost, fee_rate),
        profit_margin: margin,
        min_profit_margin,
        qualifies: total_cost < Decimal::ONE && margin >= min_profit_margin,
    })
}

/// Diagnostic breakdown of one quote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuoteDiagnosis {
    /// YES price.
    pub yes_price: Decimal,
    /// NO price.
    pub no_price: Decimal,
    /// Sum of both prices.
    pub total_cost: Decimal,
    /// Sum including proportional fees.
    pub total_cost_with_fees: Decimal,
    /// Post-fee margin.
    pub profit_margin: Decimal,
    /// Threshold the margin was compared against.
    pub min_profit_margin: Decimal,
    /// Whether the quote qualifies.
    pub qualifies: bool,
}

impl QuoteDiagnosis {
    /// How far the margin falls short of the threshold (zero when it qualifies).
    pub fn shortfall(&self) -> Decimal {
        (self.min_profit_margin - self.profit_margin).max(Decimal::ZERO)
    }
}

impl fmt::Display for QuoteDiagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "YES=${} + NO=${} = ${} (with fees ${}) | margin={} (min={}, shortfall={})",
            self.yes_price,
            self.no_price,
            self.total_cost,
            self.total_cost_with_fees,
            self.profit_margin,
            self.min_profit_margin,
            self.shortfall(),
        )
    }
}

fn check_parameters(fee_rate: Decimal, min_profit_margin: Decimal) -> Result<(), ValidationError> {
    if fee_rate < Decimal::ZERO || fee_rate >= Decimal::ONE {
        return Err(ValidationError::InvalidParameter {
            name: "fee_rate",
            value: fee_rate,
        });
    }
    if min_profit_margin < Decimal::ZERO || min_profit_margin >= Decimal::ONE {
        return Err(ValidationError::InvalidParameter {
            name: "min_profit_margin",
            value: min_profit_margin,
        });
    }
    Ok(())
}

fn qualifying_margin(
    quote: &MarketQuote,
    fee_rate: Decimal,
    min_profit_margin: Decimal,
) -> Result<Option<Decimal>, ValidationError> {
    check_parameters(fee_rate, min_profit_margin)?;
    quote.validate()?;

    let total_cost = quote.total_cost();
    // Fees are non-negative, so a pair costing $1 or more can never pay.
    if total_cost >= Decimal::ONE {
        return Ok(None);
    }

    let margin = profit_margin(total_cost, fee_rate);
    if margin >= min_profit_margin {
        Ok(Some(margin))
    } else {
        debug!(
            market = %quote.market_id,
            total_cost = %total_cost,
            margin = %margin,
            "No arbitrage opportunity"
        );
        Ok(None)
    }
}
