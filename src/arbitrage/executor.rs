//! Dual-leg arbitrage execution.

use std::sync::Arc;
use std::time::{Duration, Instant};

use rust_decimal::{Decimal, RoundingStrategy};
use time::OffsetDateTime;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument, warn};

use super::calculator::ArbitrageOpportunity;
use crate::error::OrderError;
use crate::market::Outcome;
use crate::metrics;
use crate::trading::execution::{reconcile_leg, run_leg, LegReport};
use crate::trading::order::{OrderPlacementService, OrderRequest};
use crate::trading::position::{Position, PositionStatus};
use crate::trading::sink::SettlementSink;

/// Decimal places kept when capping share counts.
const SHARE_DP: u32 = 8;

/// Execution settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionParams {
    /// Oldest quote the executor will act on.
    pub max_quote_age: Duration,
    /// Bound on each placement call and each status query.
    pub leg_timeout: Duration,
    /// Status queries per unanswered leg.
    pub fill_query_attempts: u32,
    /// Fraction above the quoted price each leg may pay.
    pub max_slippage: Decimal,
}

impl Default for ExecutionParams {
    fn default() -> Self {
        Self {
            max_quote_age: Duration::from_millis(1000),
            leg_timeout: Duration::from_millis(500),
            fill_query_attempts: 3,
            max_slippage: Decimal::new(2, 2),
        }
    }
}

/// Limit price for a leg: the quote plus allowed slippage, never above 1.
pub fn limit_price(quoted: Decimal, max_slippage: Decimal) -> Decimal {
    (quoted * (Decimal::ONE + max_slippage)).min(Decimal::ONE)
}

/// Client order id for one leg of an attempt.
///
/// Deterministic in the quote, so resubmitting the same attempt is
/// recognized by the venue as the same order.
pub fn client_order_id(opportunity: &ArbitrageOpportunity, outcome: Outcome) -> String {
    format!(
        "{}-{}-{}",
        opportunity.market_id,
        outcome,
        opportunity.quote_snapshot.as_of.unix_timestamp_nanos()
    )
}

/// Places both legs of an opportunity and reports the resulting [`Position`].
///
/// Holds no state between calls. Every finalized position, including stale
/// rejections, is handed to the settlement sink.
#[derive(Clone)]
pub struct ArbitrageExecutor {
    service: Arc<dyn OrderPlacementService>,
    sink: Arc<dyn SettlementSink>,
    params: ExecutionParams,
}

impl ArbitrageExecutor {
    /// Create an executor.
    pub fn new(
        service: Arc<dyn OrderPlacementService>,
        sink: Arc<dyn SettlementSink>,
        params: ExecutionParams,
    ) -> Self {
        Self {
            service,
            sink,
            params,
        }
    }

    /// Execution settings in use.
    pub fn params(&self) -> &ExecutionParams {
        &self.params
    }

    /// Whether the opportunity's quote is older than allowed at `now`.
    ///
    /// A quote stamped in the future is never stale.
    pub fn is_stale(&self, opportunity: &ArbitrageOpportunity, now: OffsetDateTime) -> bool {
        let max_age =
            time::Duration::try_from(self.params.max_quote_age).unwrap_or(time::Duration::MAX);
        opportunity.quote_snapshot.age_at(now) > max_age
    }

    /// Most shares per leg that `capital` covers if both legs fill at their limits.
    ///
    /// Rounded down so the worst-case cost never exceeds `capital`.
    pub fn affordable_shares(
        &self,
        opportunity: &ArbitrageOpportunity,
        capital: Decimal,
    ) -> Decimal {
        let pair_limit = [Outcome::Yes, Outcome::No]
            .into_iter()
            .map(|outcome| {
                limit_price(opportunity.quote_snapshot.price(outcome), self.params.max_slippage)
            })
            .sum::<Decimal>();
        if capital <= Decimal::ZERO || pair_limit <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        (capital / pair_limit).round_dp_with_strategy(SHARE_DP, RoundingStrategy::ToZero)
    }

    /// Build the buy order for one leg.
    pub fn leg_request(
        &self,
        opportunity: &ArbitrageOpportunity,
        outcome: Outcome,
        shares: Decimal,
    ) -> OrderRequest {
        OrderRequest::buy(
            client_order_id(opportunity, outcome),
            opportunity.market_id.clone(),
            outcome,
            shares,
            limit_price(opportunity.quote_snapshot.price(outcome), self.params.max_slippage),
        )
    }

    /// Attempt to buy `shares` of both YES and NO.
    ///
    /// A stale quote is refused before the order service is touched. Otherwise
    /// both legs are dispatched before either is awaited. Leg failures show up
    /// in the returned status, never as an error, and nothing is retried.
    ///
    /// Dispatched legs run on their own tasks: dropping the returned future
    /// does not cancel them, and the settled position still reaches the sink.
    #[instrument(
        skip(self, opportunity),
        fields(market = %opportunity.market_id, margin = %opportunity.profit_margin)
    )]
    pub async fn execute(&self, opportunity: &ArbitrageOpportunity, shares: Decimal) -> Position {
        let start = Instant::now();

        if self.is_stale(opportunity, OffsetDateTime::now_utc()) {
            let max_age_ms =
                u64::try_from(self.params.max_quote_age.as_millis()).unwrap_or(u64::MAX);
            warn!(
                quote_as_of = %opportunity.quote_snapshot.as_of,
                max_age_ms,
                "Quote is stale, refusing to execute"
            );
            let position = Position::rejected_stale(opportunity, shares);
            metrics::inc_positions(position.status);
            self.sink.settle(&position);
            return position;
        }

        let yes_request = self.leg_request(opportunity, Outcome::Yes, shares);
        let no_request = self.leg_request(opportunity, Outcome::No, shares);

        info!(
            shares = %shares,
            yes_limit = %yes_request.limit_price,
            no_limit = %no_request.limit_price,
            "Dispatching both legs"
        );

        let yes_leg = tokio::spawn(run_leg(
            self.service.clone(),
            yes_request.clone(),
            self.params.leg_timeout,
            self.params.fill_query_attempts,
        ));
        let no_leg = tokio::spawn(run_leg(
            self.service.clone(),
            no_request.clone(),
            self.params.leg_timeout,
            self.params.fill_query_attempts,
        ));

        let settlement = tokio::spawn(settle(
            self.clone(),
            opportunity.clone(),
            shares,
            (yes_request.clone(), yes_leg),
            (no_request.clone(), no_leg),
            start,
        ));

        match settlement.await {
            Ok(position) => position,
            Err(e) => {
                error!(error = %e, "Settlement task failed, recovering leg state");
                let cause = OrderError::Transport(format!("settlement task failed: {e}"));
                let (yes, no) = tokio::join!(
                    self.recover(yes_request, cause.clone()),
                    self.recover(no_request, cause),
                );
                self.finalize(opportunity, shares, &yes, &no, start)
            }
        }
    }

    async fn recover(&self, request: OrderRequest, cause: OrderError) -> LegReport {
        reconcile_leg(
            self.service.as_ref(),
            request,
            self.params.leg_timeout,
            self.params.fill_query_attempts,
            cause,
        )
        .await
    }

    async fn join_leg(&self, request: OrderRequest, handle: JoinHandle<LegReport>) -> LegReport {
        match handle.await {
            Ok(report) => report,
            Err(e) => {
                error!(outcome = %request.outcome, error = %e, "Leg task failed");
                self.recover(request, OrderError::Transport(format!("leg task failed: {e}")))
                    .await
            }
        }
    }

    fn finalize(
        &self,
        opportunity: &ArbitrageOpportunity,
        shares: Decimal,
        yes: &LegReport,
        no: &LegReport,
        start: Instant,
    ) -> Position {
        let position = Position::from_legs(opportunity, shares, yes, no);

        match (position.status, position.unhedged) {
            (PositionStatus::FilledBoth, None) => info!(
                yes_filled = %position.yes_filled,
                no_filled = %position.no_filled,
                profit = ?position.realized_profit_estimate,
                "ARBITRAGE EXECUTED: both legs filled"
            ),
            (PositionStatus::FilledBoth, Some(excess)) => error!(
                yes_filled = %position.yes_filled,
                no_filled = %position.no_filled,
                unhedged_outcome = %excess.outcome,
                unhedged_quantity = %excess.quantity,
                profit = ?position.realized_profit_estimate,
                "Both legs filled unequally: position partly unhedged"
            ),
            (PositionStatus::FilledYesOnly | PositionStatus::FilledNoOnly, _) => error!(
                status = %position.status,
                yes_filled = %position.yes_filled,
                no_filled = %position.no_filled,
                "Partial fill: only one leg filled"
            ),
            (PositionStatus::FilledNeither | PositionStatus::RejectedStale, _) => {
                warn!(status = %position.status, "Neither leg filled")
            }
        }
        if let Some(excess) = position.unhedged {
            metrics::inc_unhedged_positions(excess.outcome);
        }
        if !position.unconfirmed_legs.is_empty() {
            warn!(legs = ?position.unconfirmed_legs, "Leg fill state unconfirmed");
        }

        metrics::inc_positions(position.status);
        metrics::record_execution_latency(start);
        self.sink.settle(&position);
        position
    }
}

/// Wait for both legs and finalize the attempt. Runs detached from `execute`.
async fn settle(
    executor: ArbitrageExecutor,
    opportunity: ArbitrageOpportunity,
    shares: Decimal,
    yes: (OrderRequest, JoinHandle<LegReport>),
    no: (OrderRequest, JoinHandle<LegReport>),
    start: Instant,
) -> Position {
    let (yes, no) = tokio::join!(
        executor.join_leg(yes.0, yes.1),
        executor.join_leg(no.0, no.1),
    );
    executor.finalize(&opportunity, shares, &yes, &no, start)
}
