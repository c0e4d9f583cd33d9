//! Deterministic position sizing.

use rust_decimal::Decimal;
use tracing::debug;

use crate::arbitrage::ArbitrageOpportunity;
use crate::error::ValidationError;

/// Investment grows by this factor per unit of margin.
const EDGE_SCALE: Decimal = Decimal::TEN;

/// Configured sizing bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizingParams {
    /// Investment at zero margin.
    pub base_size: Decimal,
    /// Hard cap on investment.
    pub max_size: Decimal,
}

/// Dollar amount to commit: `min(base * (1 + margin * 10), max)`, clamped to capital.
pub fn planned_investment(
    opportunity: &ArbitrageOpportunity,
    capital_available: Decimal,
    base_size: Decimal,
    max_size: Decimal,
) -> Result<Decimal, ValidationError> {
    if capital_available <= Decimal::ZERO {
        return Err(ValidationError::InsufficientCapital {
            available: capital_available,
        });
    }
    if base_size <= Decimal::ZERO {
        return Err(ValidationError::InvalidParameter {
            name: "base_size",
            value: base_size,
        });
    }
    if max_size <= Decimal::ZERO {
        return Err(ValidationError::InvalidParameter {
            name: "max_size",
            value: max_size,
        });
    }

    let scaled = base_size * (Decimal::ONE + opportunity.profit_margin * EDGE_SCALE);
    Ok(scaled.min(max_size).min(capital_available))
}

/// Shares to buy on each leg.
pub fn size_position(
    opportunity: &ArbitrageOpportunity,
    capital_available: Decimal,
    base_size: Decimal,
    max_size: Decimal,
) -> Result<Decimal, ValidationError> {
    let investment = planned_investment(opportunity, capital_available, base_size, max_size)?;
    let shares = investment / opportunity.total_cost;

    debug!(
        market = %opportunity.market_id,
        investment = %investment,
        shares = %shares,
        "Sized position"
    );

    Ok(shares)
}

impl SizingParams {
    /// [`size_position`] with these bounds.
    pub fn size(
        &self,
        opportunity: &ArbitrageOpportunity,
        capital_available: Decimal,
    ) -> Result<Decimal, ValidationError> {
        size_position(opportunity, capital_available, self.base_size, self.max_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketQuote;
    use rust_decimal_macros::dec;
    use time::OffsetDateTime;

    fn opportunity(yes: Decimal, no: Decimal) -> ArbitrageOpportunity {
        let quote = MarketQuote::new("m", yes, no, OffsetDateTime::now_utc()).unwrap();
        crate::arbitrage::evaluate(&quote, dec!(0.02), dec!(0)).unwrap().unwrap()
    }

    #[test]
    fn scales_with_margin() {
        let opp = opportunity(dec!(0.45), dec!(0.45));
        assert_eq!(opp.profit_margin, dec!(0.082));

        let investment = planned_investment(&opp, dec!(100000), dec!(1000), dec!(5000)).unwrap();
        assert_eq!(investment, dec!(1820));

        let shares = size_position(&opp, dec!(100000), dec!(1000), dec!(5000)).unwrap();
        assert_eq!(shares.round_dp(2), dec!(2022.22));
    }

    #[test]
    fn capped_at_max_size() {
        let opp = opportunity(dec!(0.20), dec!(0.20));
        let investment = planned_investment(&opp, dec!(100000), dec!(1000), dec!(1500)).unwrap();
        assert_eq!(investment, dec!(1500));
    }

    #[test]
    fn clamped_to_capital() {
        let opp = opportunity(dec!(0.45), dec!(0.45));
        let investment = planned_investment(&opp, dec!(300), dec!(1000), dec!(5000)).unwrap();
        assert_eq!(investment, dec!(300));

        let shares = size_position(&opp, dec!(300), dec!(1000), dec!(5000)).unwrap();
        assert!(shares * opp.total_cost <= dec!(300));
    }

    #[test]
    fn no_capital_is_refused() {
        let opp = opportunity(dec!(0.45), dec!(0.45));
        for capital in [dec!(0), dec!(-5)] {
            assert_eq!(
                size_position(&opp, capital, dec!(1000), dec!(5000)),
                Err(ValidationError::InsufficientCapital { available: capital })
            );
        }
    }

    #[test]
    fn sizing_is_deterministic() {
        let opp = opportunity(dec!(0.41), dec!(0.47));
        let params = SizingParams {
            base_size: dec!(250),
            max_size: dec!(900),
        };

        let first = params.size(&opp, dec!(10000)).unwrap();
        let second = params.size(&opp, dec!(10000)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn non_positive_bounds_are_rejected() {
        let opp = opportunity(dec!(0.45), dec!(0.45));
        assert!(matches!(
            size_position(&opp, dec!(100), dec!(0), dec!(10)),
            Err(ValidationError::InvalidParameter { name: "base_size", .. })
        ));
    }
}
