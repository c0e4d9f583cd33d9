//! Settlement records produced by execution attempts.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use time::OffsetDateTime;

use super::execution::LegReport;
use crate::arbitrage::calculator::pair_profit;
use crate::arbitrage::ArbitrageOpportunity;
use crate::market::{MarketId, Outcome};

/// How an execution attempt ended.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum PositionStatus {
    /// Both legs filled: hedged, risk-free position.
    FilledBoth,
    /// Only YES filled: directional exposure.
    FilledYesOnly,
    /// Only NO filled: directional exposure.
    FilledNoOnly,
    /// Nothing filled, no capital committed.
    FilledNeither,
    /// Quote was too old; no orders were sent.
    RejectedStale,
}

impl PositionStatus {
    /// Derive the status from which legs filled.
    pub fn from_fills(yes_filled: bool, no_filled: bool) -> Self {
        match (yes_filled, no_filled) {
            (true, true) => PositionStatus::FilledBoth,
            (true, false) => PositionStatus::FilledYesOnly,
            (false, true) => PositionStatus::FilledNoOnly,
            (false, false) => PositionStatus::FilledNeither,
        }
    }

    /// Label used for metrics and logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            PositionStatus::FilledBoth => "filled_both",
            PositionStatus::FilledYesOnly => "filled_yes_only",
            PositionStatus::FilledNoOnly => "filled_no_only",
            PositionStatus::FilledNeither => "filled_neither",
            PositionStatus::RejectedStale => "rejected_stale",
        }
    }
}

/// Shares held on one side without a matching share on the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FilledLeg {
    /// Which side filled.
    pub outcome: Outcome,
    /// Shares held.
    pub quantity: Decimal,
    /// Price paid per share.
    pub price: Decimal,
}

/// Outcome of one execution attempt.
///
/// Not retained by the executor; it goes to the caller and the settlement sink.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Position {
    /// Market traded.
    pub market_id: MarketId,
    /// Shares requested on each leg.
    pub shares: Decimal,
    /// YES shares actually bought.
    pub yes_filled: Decimal,
    /// Average YES fill price.
    pub yes_fill_price: Option<Decimal>,
    /// NO shares actually bought.
    pub no_filled: Decimal,
    /// Average NO fill price.
    pub no_fill_price: Option<Decimal>,
    /// Final status.
    pub status: PositionStatus,
    /// Profit locked in by the hedged pairs, net of fees. Set only for `FILLED_BOTH`.
    pub realized_profit_estimate: Option<Decimal>,
    /// Exposure left unpaired: the lone leg of a single-leg fill, or the
    /// excess of the larger leg when both filled unequally.
    pub unhedged: Option<FilledLeg>,
    /// Legs whose fill state could not be confirmed with the venue.
    pub unconfirmed_legs: Vec<Outcome>,
    /// Timestamp of the quote that triggered the attempt.
    #[serde(with = "time::serde::rfc3339")]
    pub quote_as_of: OffsetDateTime,
    /// When the attempt was finalized.
    #[serde(with = "time::serde::rfc3339")]
    pub settled_at: OffsetDateTime,
}

impl Position {
    /// Record for an attempt refused because its quote was stale.
    pub fn rejected_stale(opportunity: &ArbitrageOpportunity, shares: Decimal) -> Self {
        Self {
            market_id: opportunity.market_id.clone(),
            shares,
            yes_filled: Decimal::ZERO,
            yes_fill_price: None,
            no_filled: Decimal::ZERO,
            no_fill_price: None,
            status: PositionStatus::RejectedStale,
            realized_profit_estimate: None,
            unhedged: None,
            unconfirmed_legs: Vec::new(),
            quote_as_of: opportunity.quote_snapshot.as_of,
            settled_at: OffsetDateTime::now_utc(),
        }
    }

    /// Build the record once both legs are resolved.
    pub fn from_legs(
        opportunity: &ArbitrageOpportunity,
        shares: Decimal,
        yes: &LegReport,
        no: &LegReport,
    ) -> Self {
        let status = PositionStatus::from_fills(yes.fill.is_filled(), no.fill.is_filled());

        let realized_profit_estimate = match (status, yes.fill.avg_price, no.fill.avg_price) {
            (PositionStatus::FilledBoth, Some(yes_price), Some(no_price)) => {
                let matched = yes.fill.filled_quantity.min(no.fill.filled_quantity);
                Some(pair_profit(matched, yes_price, no_price, opportunity.fee_rate))
            }
            _ => None,
        };

        let excess = yes.fill.filled_quantity - no.fill.filled_quantity;
        let unhedged = if excess > Decimal::ZERO {
            Some(FilledLeg {
                outcome: Outcome::Yes,
                quantity: excess,
                price: yes.fill.avg_price.unwrap_or_default(),
            })
        } else if excess < Decimal::ZERO {
            Some(FilledLeg {
                outcome: Outcome::No,
                quantity: -excess,
                price: no.fill.avg_price.unwrap_or_default(),
            })
        } else {
            None
        };

        let unconfirmed_legs = [yes, no]
            .into_iter()
            .filter(|leg| !leg.confirmed)
            .map(|leg| leg.request.outcome)
            .collect();

        Self {
            market_id: opportunity.market_id.clone(),
            shares,
            yes_filled: yes.fill.filled_quantity,
            yes_fill_price: yes.fill.avg_price,
            no_filled: no.fill.filled_quantity,
            no_fill_price: no.fill.avg_price,
            status,
            realized_profit_estimate,
            unhedged,
            unconfirmed_legs,
            quote_as_of: opportunity.quote_snapshot.as_of,
            settled_at: OffsetDateTime::now_utc(),
        }
    }

    /// The leg holding directional exposure, for single-leg outcomes.
    pub fn filled_leg(&self) -> Option<FilledLeg> {
        match self.status {
            PositionStatus::FilledYesOnly => Some(FilledLeg {
                outcome: Outcome::Yes,
                quantity: self.yes_filled,
                price: self.yes_fill_price.unwrap_or_default(),
            }),
            PositionStatus::FilledNoOnly => Some(FilledLeg {
                outcome: Outcome::No,
                quantity: self.no_filled,
                price: self.no_fill_price.unwrap_or_default(),
            }),
            _ => None,
        }
    }

    /// Shares on one side not matched by the other (positive = more YES).
    pub fn imbalance(&self) -> Decimal {
        self.yes_filled - self.no_filled
    }

    /// Whether the holdings are fully paired.
    pub fn is_hedged(&self) -> bool {
        self.unhedged.is_none()
    }

    /// Total cash spent on both legs, before fees.
    pub fn cost_basis(&self) -> Decimal {
        self.yes_filled * self.yes_fill_price.unwrap_or_default()
            + self.no_filled * self.no_fill_price.unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::MarketQuote;
    use crate::trading::order::{FillResult, OrderRequest};
    use rust_decimal_macros::dec;

    fn opportunity() -> ArbitrageOpportunity {
        let quote =
            MarketQuote::new("m", dec!(0.45), dec!(0.45), OffsetDateTime::now_utc()).unwrap();
        crate::arbitrage::evaluate(&quote, dec!(0.02), dec!(0.01))
            .unwrap()
            .unwrap()
    }

    fn leg(outcome: Outcome, fill: FillResult, confirmed: bool) -> LegReport {
        LegReport {
            request: OrderRequest::buy("id", "m".into(), outcome, dec!(100), dec!(0.45)),
            fill,
            confirmed,
            error: None,
        }
    }

    #[test]
    fn status_from_fills() {
        assert_eq!(PositionStatus::from_fills(true, true), PositionStatus::FilledBoth);
        assert_eq!(PositionStatus::from_fills(true, false), PositionStatus::FilledYesOnly);
        assert_eq!(PositionStatus::from_fills(false, true), PositionStatus::FilledNoOnly);
        assert_eq!(PositionStatus::from_fills(false, false), PositionStatus::FilledNeither);
    }

    #[test]
    fn status_display_matches_wire_names() {
        assert_eq!(PositionStatus::FilledYesOnly.to_string(), "FILLED_YES_ONLY");
        assert_eq!(
            serde_json::to_string(&PositionStatus::RejectedStale).unwrap(),
            "\"REJECTED_STALE\""
        );
    }

    #[test]
    fn both_filled_carries_profit() {
        let opp = opportunity();
        let fill = FillResult::filled(dec!(100), dec!(0.45));
        let position = Position::from_legs(
            &opp,
            dec!(100),
            &leg(Outcome::Yes, fill, true),
            &leg(Outcome::No, fill, true),
        );

        assert_eq!(position.status, PositionStatus::FilledBoth);
        assert_eq!(position.realized_profit_estimate, Some(dec!(8.2)));
        assert!(position.is_hedged());
        assert!(position.filled_leg().is_none());
        assert!(position.unconfirmed_legs.is_empty());
    }

    #[test]
    fn single_leg_surfaces_exposure() {
        let opp = opportunity();
        let position = Position::from_legs(
            &opp,
            dec!(100),
            &leg(Outcome::Yes, FillResult::NONE, true),
            &leg(Outcome::No, FillResult::filled(dec!(100), dec!(0.45)), true),
        );

        assert_eq!(position.status, PositionStatus::FilledNoOnly);
        assert_eq!(position.realized_profit_estimate, None);
        assert_eq!(
            position.filled_leg(),
            Some(FilledLeg {
                outcome: Outcome::No,
                quantity: dec!(100),
                price: dec!(0.45),
            })
        );
        assert_eq!(position.imbalance(), dec!(-100));
        assert_eq!(position.unhedged, position.filled_leg());
        assert!(!position.is_hedged());
    }

    #[test]
    fn unequal_fills_count_only_matched_pairs() {
        let opp = opportunity();
        let position = Position::from_legs(
            &opp,
            dec!(100),
            &leg(Outcome::Yes, FillResult::filled(dec!(100), dec!(0.45)), true),
            &leg(Outcome::No, FillResult::filled(dec!(50), dec!(0.45)), false),
        );

        assert_eq!(position.status, PositionStatus::FilledBoth);
        assert_eq!(position.realized_profit_estimate, Some(dec!(4.1)));
        assert_eq!(position.imbalance(), dec!(50));
        assert_eq!(position.unconfirmed_legs, vec![Outcome::No]);
        assert_eq!(
            position.unhedged,
            Some(FilledLeg {
                outcome: Outcome::Yes,
                quantity: dec!(50),
                price: dec!(0.45),
            })
        );
        assert!(!position.is_hedged());
    }

    #[test]
    fn unhedged_excess_is_serialized() {
        let opp = opportunity();
        let position = Position::from_legs(
            &opp,
            dec!(100),
            &leg(Outcome::Yes, FillResult::filled(dec!(40), dec!(0.45)), true),
            &leg(Outcome::No, FillResult::filled(dec!(100), dec!(0.46)), true),
        );

        let json = serde_json::to_value(&position).unwrap();
        assert_eq!(json["status"], "FILLED_BOTH");
        assert_eq!(json["unhedged"]["outcome"], "NO");
        assert_eq!(json["unhedged"]["quantity"], "60");
        assert_eq!(json["unhedged"]["price"], "0.46");
    }

    #[test]
    fn stale_record_has_no_fills() {
        let position = Position::rejected_stale(&opportunity(), dec!(10));
        assert_eq!(position.status, PositionStatus::RejectedStale);
        assert_eq!(position.cost_basis(), dec!(0));
        assert!(position.realized_profit_estimate.is_none());
    }
}
