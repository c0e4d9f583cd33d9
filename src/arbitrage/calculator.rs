//! Profit and cost calculations for arbitrage opportunities.

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;

use crate::market::{MarketId, MarketQuote};

/// Detected arbitrage opportunity.
///
/// Holds its own copy of the quote that produced it, so later quote updates
/// cannot change an evaluation already in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArbitrageOpportunity {
    /// Market being traded.
    pub market_id: MarketId,
    /// Cost of one YES share plus one NO share.
    pub total_cost: Decimal,
    /// Fee rate applied to the cost basis at detection time.
    pub fee_rate: Decimal,
    /// Post-fee margin per $1 of payout.
    pub profit_margin: Decimal,
    /// The quote this opportunity was computed from.
    pub quote_snapshot: MarketQuote,
    /// When the opportunity was detected.
    #[serde(with = "time::serde::rfc3339")]
    pub detected_at: OffsetDateTime,
}

impl ArbitrageOpportunity {
    /// Build an opportunity from a quote, moving the quote in.
    pub(crate) fn from_quote(
        quote: MarketQuote,
        fee_rate: Decimal,
        profit_margin: Decimal,
    ) -> Self {
        Self {
            market_id: quote.market_id.clone(),
            total_cost: quote.total_cost(),
            fee_rate,
            profit_margin,
            quote_snapshot: quote,
            detected_at: OffsetDateTime::now_utc(),
        }
    }

    /// Quoted YES price.
    pub fn yes_price(&self) -> Decimal {
        self.quote_snapshot.yes_price
    }

    /// Quoted NO price.
    pub fn no_price(&self) -> Decimal {
        self.quote_snapshot.no_price
    }

    /// Cost of one pair including proportional fees.
    pub fn total_cost_with_fees(&self) -> Decimal {
        cost_with_fees(self.total_cost, self.fee_rate)
    }

    /// Margin as a percentage.
    pub fn profit_pct(&self) -> Decimal {
        self.profit_margin * Decimal::ONE_HUNDRED
    }

    /// Expected profit for buying `shares` of each leg at the quoted prices.
    pub fn expected_profit(&self, shares: Decimal) -> Decimal {
        shares * self.profit_margin
    }
}

/// Cost of one YES/NO pair with the fee charged on the cost basis.
pub fn cost_with_fees(total_cost: Decimal, fee_rate: Decimal) -> Decimal {
    total_cost * (Decimal::ONE + fee_rate)
}

/// Post-fee margin per $1 payout: `1 - total_cost * (1 + fee_rate)`.
pub fn profit_margin(total_cost: Decimal, fee_rate: Decimal) -> Decimal {
    Decimal::ONE - cost_with_fees(total_cost, fee_rate)
}

/// Profit from holding `matched` complete pairs bought at the given prices.
///
/// Each pair pays exactly $1 at resolution; fees are charged on the cost basis.
pub fn pair_profit(
    matched: Decimal,
    yes_price: Decimal,
    no_price: Decimal,
    fee_rate: Decimal,
) -> Decimal {
    let cost = matched * yes_price + matched * no_price;
    matched - cost_with_fees(cost, fee_rate)
}
