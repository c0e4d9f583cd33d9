//! Order types and the order placement boundary.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::OrderError;
use crate::market::{MarketId, Outcome};

/// Buy order for one leg of a binary market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderRequest {
    /// Client-assigned id, unique per leg of an execution attempt.
    pub client_order_id: String,
    /// Market to trade.
    pub market_id: MarketId,
    /// Which leg.
    pub outcome: Outcome,
    /// Shares to buy.
    pub quantity: Decimal,
    /// Highest acceptable price per share.
    pub limit_price: Decimal,
}

impl OrderRequest {
    /// Create a buy order.
    pub fn buy(
        client_order_id: impl Into<String>,
        market_id: MarketId,
        outcome: Outcome,
        quantity: Decimal,
        limit_price: Decimal,
    ) -> Self {
        Self {
            client_order_id: client_order_id.into(),
            market_id,
            outcome,
            quantity,
            limit_price,
        }
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.client_order_id.is_empty() {
            return Err("client_order_id is required".to_string());
        }
        if self.limit_price <= Decimal::ZERO || self.limit_price > Decimal::ONE {
            return Err("limit_price must be in (0, 1]".to_string());
        }
        if self.quantity <= Decimal::ZERO {
            return Err("quantity must be positive".to_string());
        }
        Ok(())
    }
}

/// What an order achieved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FillResult {
    /// Shares filled (zero when nothing executed).
    pub filled_quantity: Decimal,
    /// Average price paid per filled share.
    pub avg_price: Option<Decimal>,
}

impl FillResult {
    /// Nothing filled.
    pub const NONE: FillResult = FillResult {
        filled_quantity: Decimal::ZERO,
        avg_price: None,
    };

    /// A fill of `quantity` shares at `price`.
    pub fn filled(quantity: Decimal, price: Decimal) -> Self {
        if quantity <= Decimal::ZERO {
            return Self::NONE;
        }
        Self {
            filled_quantity: quantity,
            avg_price: Some(price),
        }
    }

    /// Whether any shares were bought.
    pub fn is_filled(&self) -> bool {
        self.filled_quantity > Decimal::ZERO
    }

    /// Whether fewer shares than requested were bought.
    pub fn is_partial(&self, requested: Decimal) -> bool {
        self.is_filled() && self.filled_quantity < requested
    }

    /// Cash spent on the fill.
    pub fn cost(&self) -> Decimal {
        self.avg_price
            .map(|p| p * self.filled_quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// The side-effecting boundary of the core: something that can buy shares.
#[async_trait]
pub trait OrderPlacementService: Send + Sync {
    /// Submit an order and report what filled.
    ///
    /// A successful return with zero filled quantity means the order was
    /// accepted but nothing executed.
    async fn place_order(&self, request: &OrderRequest) -> Result<FillResult, OrderError>;

    /// Look up the final fill of a previously submitted order.
    async fn query_fill(&self, request: &OrderRequest) -> Result<FillResult, OrderError>;

    /// Cash available for new positions.
    async fn available_capital(&self) -> Result<Decimal, OrderError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn order_request_validation() {
        let valid = OrderRequest::buy("c1", "m".into(), Outcome::Yes, dec!(10), dec!(0.45));
        assert!(valid.validate().is_ok());

        let no_id = OrderRequest::buy("", "m".into(), Outcome::Yes, dec!(10), dec!(0.45));
        assert!(no_id.validate().is_err());

        let zero_price = OrderRequest::buy("c1", "m".into(), Outcome::No, dec!(10), dec!(0));
        assert!(zero_price.validate().is_err());

        let negative_size = OrderRequest::buy("c1", "m".into(), Outcome::No, dec!(-1), dec!(0.4));
        assert!(negative_size.validate().is_err());
    }

    #[test]
    fn fill_result_helpers() {
        let fill = FillResult::filled(dec!(5), dec!(0.4));
        assert!(fill.is_filled());
        assert!(fill.is_partial(dec!(10)));
        assert!(!fill.is_partial(dec!(5)));
        assert_eq!(fill.cost(), dec!(2));

        assert!(!FillResult::NONE.is_filled());
        assert_eq!(FillResult::filled(dec!(0), dec!(0.4)), FillResult::NONE);
        assert_eq!(FillResult::NONE.cost(), dec!(0));
    }
}
