//! Single-leg order dispatch and fill reconciliation.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, info, instrument, warn};

use super::order::{FillResult, OrderPlacementService, OrderRequest};
use crate::error::OrderError;
use crate::metrics;

/// Pause between status queries of an unanswered leg.
pub const DEFAULT_QUERY_INTERVAL: Duration = Duration::from_millis(50);

/// Final state of one leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LegReport {
    /// The order as dispatched.
    pub request: OrderRequest,
    /// What filled.
    pub fill: FillResult,
    /// Whether `fill` came from the venue rather than an exhausted lookup.
    pub confirmed: bool,
    /// Last error seen for this leg, if any.
    #[serde(skip)]
    pub error: Option<OrderError>,
}

impl LegReport {
    fn confirmed(request: OrderRequest, fill: FillResult) -> Self {
        Self {
            request,
            fill,
            confirmed: true,
            error: None,
        }
    }

    fn refused(request: OrderRequest, error: OrderError) -> Self {
        Self {
            request,
            fill: FillResult::NONE,
            confirmed: true,
            error: Some(error),
        }
    }
}

/// Place one leg and resolve its final fill.
///
/// The placement is bounded by `leg_timeout`. When the response is missing
/// or ambiguous the order may still have executed, so the venue is queried
/// (up to `query_attempts` times) before the leg is reported.
#[instrument(
    skip(service, request, leg_timeout),
    fields(
        market = %request.market_id,
        outcome = %request.outcome,
        client_order_id = %request.client_order_id
    )
)]
pub async fn run_leg(
    service: Arc<dyn OrderPlacementService>,
    request: OrderRequest,
    leg_timeout: Duration,
    query_attempts: u32,
) -> LegReport {
    if let Err(reason) = request.validate() {
        warn!(reason = %reason, "Leg not dispatched: invalid order");
        return LegReport::refused(request, OrderError::Rejected { reason });
    }

    debug!(
        quantity = %request.quantity,
        limit_price = %request.limit_price,
        "Dispatching leg"
    );
    metrics::inc_orders_dispatched();
    let start = Instant::now();

    let response = timeout(leg_timeout, service.place_order(&request)).await;
    metrics::record_order_latency(start);

    match response {
        Ok(Ok(fill)) => {
            if fill.is_partial(request.quantity) {
                metrics::inc_orders_filled();
                warn!(
                    requested = %request.quantity,
                    filled = %fill.filled_quantity,
                    price = ?fill.avg_price,
                    "Leg partially filled"
                );
            } else if fill.is_filled() {
                metrics::inc_orders_filled();
                info!(
                    filled = %fill.filled_quantity,
                    price = ?fill.avg_price,
                    "Leg filled"
                );
            } else {
                info!("Leg accepted but not filled");
            }
            LegReport::confirmed(request, fill)
        }
        Ok(Err(e)) if !e.is_ambiguous() => {
            metrics::inc_orders_failed();
            warn!(error = %e, "Leg refused");
            LegReport::refused(request, e)
        }
        Ok(Err(e)) => {
            warn!(error = %e, "Leg response ambiguous, querying final state");
            reconcile_leg(service.as_ref(), request, leg_timeout, query_attempts, e).await
        }
        Err(_) => {
            metrics::inc_leg_timeouts();
            let after_ms = u64::try_from(leg_timeout.as_millis()).unwrap_or(u64::MAX);
            warn!(after_ms, "Leg timed out, querying final state");
            reconcile_leg(
                service.as_ref(),
                request,
                leg_timeout,
                query_attempts,
                OrderError::Timeout { after_ms },
            )
            .await
        }
    }
}

/// Ask the venue what became of an order whose placement went unanswered.
///
/// `NotFound` means the venue never saw the order. If every query fails the
/// leg is reported unfilled but unconfirmed, carrying `cause`.
pub async fn reconcile_leg(
    service: &dyn OrderPlacementService,
    request: OrderRequest,
    query_timeout: Duration,
    query_attempts: u32,
    cause: OrderError,
) -> LegReport {
    let attempts = query_attempts.max(1);

    for attempt in 1..=attempts {
        match timeout(query_timeout, service.query_fill(&request)).await {
            Ok(Ok(fill)) => {
                info!(
                    attempt,
                    filled = %fill.filled_quantity,
                    "Leg state recovered by query"
                );
                if fill.is_filled() {
                    metrics::inc_orders_filled();
                }
                return LegReport {
                    request,
                    fill,
                    confirmed: true,
                    error: Some(cause),
                };
            }
            Ok(Err(OrderError::NotFound { .. })) => {
                info!(attempt, "Venue has no record of leg");
                return LegReport::refused(request, cause);
            }
            Ok(Err(e)) => warn!(attempt, error = %e, "Leg status query failed"),
            Err(_) => warn!(attempt, "Leg status query timed out"),
        }

        if attempt < attempts {
            sleep(DEFAULT_QUERY_INTERVAL).await;
        }
    }

    metrics::inc_orders_failed();
    error!(
        client_order_id = %request.client_order_id,
        "Leg fill state could not be confirmed"
    );
    LegReport {
        request,
        fill: FillResult::NONE,
        confirmed: false,
        error: Some(cause),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::Outcome;
    use crate::trading::paper::PaperOrderService;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Venue that never answers placements and fails every status query.
    #[derive(Default)]
    struct UnreachableVenue {
        queries: AtomicUsize,
    }

    #[async_trait]
    impl OrderPlacementService for UnreachableVenue {
        async fn place_order(&self, _request: &OrderRequest) -> Result<FillResult, OrderError> {
            std::future::pending().await
        }

        async fn query_fill(&self, _request: &OrderRequest) -> Result<FillResult, OrderError> {
            self.queries.fetch_add(1, Ordering::SeqCst);
            Err(OrderError::Transport("connection reset".to_string()))
        }

        async fn available_capital(&self) -> Result<Decimal, OrderError> {
            Ok(Decimal::ZERO)
        }
    }

    fn request(outcome: Outcome) -> OrderRequest {
        OrderRequest::buy("m-1", "m".into(), outcome, dec!(10), dec!(0.45))
    }

    #[tokio::test]
    async fn filled_leg_is_confirmed() {
        let paper = Arc::new(PaperOrderService::new(dec!(100)));
        let report =
            run_leg(paper.clone(), request(Outcome::Yes), Duration::from_millis(200), 3).await;

        assert!(report.confirmed);
        assert_eq!(report.fill, FillResult::filled(dec!(10), dec!(0.45)));
        assert_eq!(paper.place_calls(), 1);
    }

    #[tokio::test]
    async fn rejected_leg_is_not_filled() {
        let paper = Arc::new(PaperOrderService::new(dec!(100)));
        paper.reject(Outcome::No);

        let report = run_leg(paper, request(Outcome::No), Duration::from_millis(200), 3).await;

        assert!(report.confirmed);
        assert!(!report.fill.is_filled());
        assert!(matches!(report.error, Some(OrderError::Rejected { .. })));
    }

    #[tokio::test]
    async fn timed_out_leg_is_recovered_by_query() {
        let paper = Arc::new(PaperOrderService::new(dec!(100)));
        paper.set_latency(Outcome::Yes, Duration::from_millis(300));

        let report =
            run_leg(paper.clone(), request(Outcome::Yes), Duration::from_millis(30), 3).await;

        assert!(report.confirmed);
        assert!(report.fill.is_filled());
        assert!(matches!(report.error, Some(OrderError::Timeout { .. })));
        assert_eq!(paper.query_calls(), 1);
    }

    #[tokio::test]
    async fn invalid_order_is_never_dispatched() {
        let paper = Arc::new(PaperOrderService::new(dec!(100)));
        let bad = OrderRequest::buy("m-1", "m".into(), Outcome::Yes, dec!(0), dec!(0.45));

        let report = run_leg(paper.clone(), bad, Duration::from_millis(50), 3).await;

        assert!(!report.fill.is_filled());
        assert_eq!(paper.place_calls(), 0);
    }

    #[tokio::test]
    async fn unknown_order_reconciles_as_unfilled() {
        let paper = PaperOrderService::new(dec!(100));
        let report = reconcile_leg(
            &paper,
            request(Outcome::Yes),
            Duration::from_millis(50),
            2,
            OrderError::Transport("reset".to_string()),
        )
        .await;

        assert!(report.confirmed);
        assert!(!report.fill.is_filled());
    }

    #[tokio::test]
    async fn partial_fill_is_confirmed_with_filled_quantity() {
        let paper = Arc::new(PaperOrderService::new(dec!(100)));
        paper.set_liquidity("m", Outcome::Yes, dec!(0.45), dec!(4));

        let report =
            run_leg(paper, request(Outcome::Yes), Duration::from_millis(200), 3).await;

        assert!(report.confirmed);
        assert!(report.fill.is_partial(dec!(10)));
        assert_eq!(report.fill, FillResult::filled(dec!(4), dec!(0.45)));
    }

    #[tokio::test]
    async fn unanswerable_leg_is_reported_unconfirmed_after_every_query() {
        let venue = Arc::new(UnreachableVenue::default());

        let report =
            run_leg(venue.clone(), request(Outcome::No), Duration::from_millis(20), 3).await;

        assert!(!report.confirmed);
        assert_eq!(report.fill, FillResult::NONE);
        assert_eq!(venue.queries.load(Ordering::SeqCst), 3);
        assert!(matches!(report.error, Some(OrderError::Timeout { after_ms: 20 })));
    }

    #[tokio::test]
    async fn reconcile_makes_at_least_one_query() {
        let venue = UnreachableVenue::default();

        let report = reconcile_leg(
            &venue,
            request(Outcome::Yes),
            Duration::from_millis(20),
            0,
            OrderError::Transport("reset".to_string()),
        )
        .await;

        assert!(!report.confirmed);
        assert_eq!(venue.queries.load(Ordering::SeqCst), 1);
        assert_eq!(report.error, Some(OrderError::Transport("reset".to_string())));
    }
}
