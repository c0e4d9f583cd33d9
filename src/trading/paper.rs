//! Paper trading order service.
//!
//! Fills orders against an in-memory book and cash balance without talking
//! to any venue. Held shares pay out when a market is resolved, which feeds
//! the session's realized profit and ROI. Used by the `run` command and as
//! the test double for the executor.

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::{DashMap, DashSet};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::order::{FillResult, OrderPlacementService, OrderRequest};
use crate::error::OrderError;
use crate::market::{MarketId, Outcome};

/// Resting ask liquidity for one leg of one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaperBook {
    /// Best ask price.
    pub ask_price: Decimal,
    /// Shares available at that price.
    pub depth: Decimal,
}

/// Shares and cash spent for one leg of one market.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Holding {
    shares: Decimal,
    cost: Decimal,
}

#[derive(Debug, Default)]
struct Ledger {
    balance: Decimal,
    orders_filled: u64,
    total_invested: Decimal,
    resolved_cost: Decimal,
    total_payout: Decimal,
    resolved_markets: u64,
}

/// Session totals for the paper venue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaperStats {
    /// Cash at start.
    pub starting_balance: Decimal,
    /// Cash now.
    pub balance: Decimal,
    /// Orders that bought at least one share.
    pub orders_filled: u64,
    /// Markets still holding shares.
    pub open_markets: usize,
    /// Markets settled through [`PaperOrderService::resolve`].
    pub resolved_markets: u64,
    /// Cash spent on all fills.
    pub total_invested: Decimal,
    /// Cash paid out by resolved markets.
    pub total_payout: Decimal,
    /// Payout minus the cost of the shares it settled.
    pub realized_profit: Decimal,
    /// `realized_profit` over the cost of resolved shares; `None` until a
    /// resolution has settled some cost.
    pub roi: Option<Decimal>,
}

/// Simulated order service.
///
/// Orders fill at the moment they are received; configured latency only
/// delays the response. A caller that times out can therefore still find
/// the fill with [`OrderPlacementService::query_fill`].
#[derive(Debug)]
pub struct PaperOrderService {
    starting_balance: Decimal,
    ledger: Mutex<Ledger>,
    holdings: DashMap<(MarketId, Outcome), Holding>,
    books: DashMap<(MarketId, Outcome), PaperBook>,
    fills: DashMap<String, FillResult>,
    rejected: DashSet<Outcome>,
    latency: DashMap<Outcome, Duration>,
    place_calls: AtomicUsize,
    query_calls: AtomicUsize,
}

impl PaperOrderService {
    /// Create a paper venue with the given starting cash.
    pub fn new(initial_balance: Decimal) -> Self {
        info!(balance = %initial_balance, "Paper trading initialized");
        Self {
            starting_balance: initial_balance,
            ledger: Mutex::new(Ledger {
                balance: initial_balance,
                ..Ledger::default()
            }),
            holdings: DashMap::new(),
            books: DashMap::new(),
            fills: DashMap::new(),
            rejected: DashSet::new(),
            latency: DashMap::new(),
            place_calls: AtomicUsize::new(0),
            query_calls: AtomicUsize::new(0),
        }
    }

    /// Set ask liquidity for a leg. Legs without a book fill in full at the limit price.
    pub fn set_liquidity(
        &self,
        market_id: impl Into<MarketId>,
        outcome: Outcome,
        ask_price: Decimal,
        depth: Decimal,
    ) {
        self.books
            .insert((market_id.into(), outcome), PaperBook { ask_price, depth });
    }

    /// Reject every order for the given leg.
    pub fn reject(&self, outcome: Outcome) {
        self.rejected.insert(outcome);
    }

    /// Delay responses for the given leg.
    pub fn set_latency(&self, outcome: Outcome, latency: Duration) {
        self.latency.insert(outcome, latency);
    }

    /// Current cash balance.
    pub fn balance(&self) -> Decimal {
        self.ledger().balance
    }

    /// Shares held on one leg of a market.
    pub fn holding(&self, market_id: &MarketId, outcome: Outcome) -> Decimal {
        self.holdings
            .get(&(market_id.clone(), outcome))
            .map(|h| h.shares)
            .unwrap_or_default()
    }

    /// Settle a market: each `winner` share pays 1, losing shares pay nothing.
    ///
    /// Both legs' holdings are closed. Returns the payout credited to the
    /// balance, zero when nothing was held.
    pub fn resolve(&self, market_id: &MarketId, winner: Outcome) -> Decimal {
        let mut payout = Decimal::ZERO;
        let mut cost = Decimal::ZERO;
        let mut held = false;
        for outcome in [Outcome::Yes, Outcome::No] {
            if let Some((_, holding)) = self.holdings.remove(&(market_id.clone(), outcome)) {
                held = true;
                cost += holding.cost;
                if outcome == winner {
                    payout += holding.shares;
                }
            }
        }

        if !held {
            debug!(market = %market_id, "PAPER: nothing held, resolution ignored");
            return Decimal::ZERO;
        }

        {
            let mut ledger = self.ledger();
            ledger.balance += payout;
            ledger.total_payout += payout;
            ledger.resolved_cost += cost;
            ledger.resolved_markets += 1;
        }

        info!(
            market = %market_id,
            winner = %winner,
            payout = %payout,
            profit = %(payout - cost),
            "PAPER: market resolved"
        );
        payout
    }

    /// Session totals.
    pub fn statistics(&self) -> PaperStats {
        let open_markets = self
            .holdings
            .iter()
            .map(|h| h.key().0.clone())
            .collect::<HashSet<_>>()
            .len();

        let ledger = self.ledger();
        let realized_profit = ledger.total_payout - ledger.resolved_cost;
        let roi = (ledger.resolved_cost > Decimal::ZERO)
            .then(|| realized_profit / ledger.resolved_cost);

        PaperStats {
            starting_balance: self.starting_balance,
            balance: ledger.balance,
            orders_filled: ledger.orders_filled,
            open_markets,
            resolved_markets: ledger.resolved_markets,
            total_invested: ledger.total_invested,
            total_payout: ledger.total_payout,
            realized_profit,
            roi,
        }
    }

    fn ledger(&self) -> MutexGuard<'_, Ledger> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of `place_order` calls received.
    pub fn place_calls(&self) -> usize {
        self.place_calls.load(Ordering::SeqCst)
    }

    /// Number of `query_fill` calls received.
    pub fn query_calls(&self) -> usize {
        self.query_calls.load(Ordering::SeqCst)
    }

    /// Recorded fill for a client order id.
    pub fn fill_for(&self, client_order_id: &str) -> Option<FillResult> {
        self.fills.get(client_order_id).map(|f| *f)
    }

    fn fill_now(&self, request: &OrderRequest) -> Result<FillResult, OrderError> {
        if let Some(existing) = self.fill_for(&request.client_order_id) {
            return Ok(existing);
        }

        if self.rejected.contains(&request.outcome) {
            warn!(
                market = %request.market_id,
                outcome = %request.outcome,
                "PAPER: order rejected"
            );
            return Err(OrderError::Rejected {
                reason: format!("paper venue rejects {} orders", request.outcome),
            });
        }

        let key = (request.market_id.clone(), request.outcome);
        let (quantity, price) = match self.books.get(&key).map(|b| *b) {
            Some(book) if book.ask_price > request.limit_price => (Decimal::ZERO, book.ask_price),
            Some(book) => (request.quantity.min(book.depth), book.ask_price),
            None => (request.quantity, request.limit_price),
        };

        let fill = FillResult::filled(quantity, price);
        let cost = fill.cost();

        {
            let mut ledger = self.ledger();
            if cost > ledger.balance {
                warn!(
                    required = %cost,
                    available = %ledger.balance,
                    "PAPER: insufficient balance"
                );
                return Err(OrderError::InsufficientFunds {
                    required: cost,
                    available: ledger.balance,
                });
            }
            ledger.balance -= cost;
            if fill.is_filled() {
                ledger.orders_filled += 1;
                ledger.total_invested += cost;
            }
        }

        if let Some(mut book) = self.books.get_mut(&key) {
            book.depth -= fill.filled_quantity;
        }
        if fill.is_filled() {
            let mut holding = self.holdings.entry(key).or_default();
            holding.shares += fill.filled_quantity;
            holding.cost += cost;
        }
        self.fills.insert(request.client_order_id.clone(), fill);

        info!(
            market = %request.market_id,
            outcome = %request.outcome,
            filled = %fill.filled_quantity,
            price = %price,
            cost = %cost,
            "PAPER: order processed"
        );

        Ok(fill)
    }
}

#[async_trait]
impl OrderPlacementService for PaperOrderService {
    async fn place_order(&self, request: &OrderRequest) -> Result<FillResult, OrderError> {
        self.place_calls.fetch_add(1, Ordering::SeqCst);
        let result = self.fill_now(request);

        let delay = self.latency.get(&request.outcome).map(|d| *d);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        result
    }

    async fn query_fill(&self, request: &OrderRequest) -> Result<FillResult, OrderError> {
        self.query_calls.fetch_add(1, Ordering::SeqCst);
        self.fill_for(&request.client_order_id)
            .ok_or_else(|| OrderError::NotFound {
                client_order_id: request.client_order_id.clone(),
            })
    }

    async fn available_capital(&self) -> Result<Decimal, OrderError> {
        Ok(self.balance())
    }
}
