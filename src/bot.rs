//! The scan-size-execute loop.
//!
//! Pulls snapshots from a [`QuoteSource`], evaluates every quote, executes
//! the best opportunity of each cycle and keeps running statistics.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::arbitrage::{diagnose, rank, scan, ArbitrageExecutor, ArbitrageOpportunity};
use crate::config::Config;
use crate::market::{quote_stream, MarketId, QuoteSnapshot, QuoteSource};
use crate::metrics;
use crate::trading::{
    OrderPlacementService, PaperOrderService, Position, PositionStatus, SettlementSink,
    SizingParams,
};
use crate::utils::{format_currency, format_percentage};

/// Scan cycles between periodic summaries.
pub const SUMMARY_EVERY_SCANS: u64 = 100;

/// Running totals for the bot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BotStats {
    /// Scan cycles completed.
    pub scans: u64,
    /// Quotes evaluated.
    pub quotes_evaluated: u64,
    /// Quotes rejected as malformed.
    pub invalid_quotes: u64,
    /// Opportunities detected.
    pub opportunities_found: u64,
    /// Opportunities skipped because their quote was already executed.
    pub duplicates_skipped: u64,
    /// Opportunities that could not be sized.
    pub sizing_failures: u64,
    /// Execution attempts.
    pub executions: u64,
    /// Attempts ending `FILLED_BOTH`.
    pub filled_both: u64,
    /// Attempts ending `FILLED_YES_ONLY`.
    pub filled_yes_only: u64,
    /// Attempts ending `FILLED_NO_ONLY`.
    pub filled_no_only: u64,
    /// Attempts ending `FILLED_NEITHER`.
    pub filled_neither: u64,
    /// Attempts ending `REJECTED_STALE`.
    pub rejected_stale: u64,
    /// Attempts that left unpaired shares, including unequal `FILLED_BOTH`.
    pub unhedged_positions: u64,
    /// Cash spent on fills, before fees.
    pub total_invested: Decimal,
    /// Sum of profit estimates over hedged positions.
    pub expected_profit: Decimal,
    /// When the last cycle finished.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_scan_at: Option<OffsetDateTime>,
}

impl BotStats {
    /// Fold a finalized position into the totals.
    pub fn record_position(&mut self, position: &Position) {
        self.executions += 1;
        self.total_invested += position.cost_basis();
        match position.status {
            PositionStatus::FilledBoth => {
                self.filled_both += 1;
                self.expected_profit += position.realized_profit_estimate.unwrap_or_default();
            }
            PositionStatus::FilledYesOnly => self.filled_yes_only += 1,
            PositionStatus::FilledNoOnly => self.filled_no_only += 1,
            PositionStatus::FilledNeither => self.filled_neither += 1,
            PositionStatus::RejectedStale => self.rejected_stale += 1,
        }
        if !position.is_hedged() {
            self.unhedged_positions += 1;
        }
    }

    /// Attempts that left directional exposure.
    pub fn single_leg_fills(&self) -> u64 {
        self.filled_yes_only + self.filled_no_only
    }
}

/// Scan loop over a quote source and an order service.
pub struct ArbitrageBot {
    source: Arc<dyn QuoteSource>,
    service: Arc<dyn OrderPlacementService>,
    executor: ArbitrageExecutor,
    fee_rate: Decimal,
    min_profit_margin: Decimal,
    sizing: SizingParams,
    scan_interval: Duration,
    last_executed: HashMap<MarketId, OffsetDateTime>,
    stats: Arc<RwLock<BotStats>>,
    ready: Arc<AtomicBool>,
    paper: Option<Arc<PaperOrderService>>,
}

impl ArbitrageBot {
    /// Create a bot from configuration.
    pub fn new(
        config: &Config,
        source: Arc<dyn QuoteSource>,
        service: Arc<dyn OrderPlacementService>,
        sink: Arc<dyn SettlementSink>,
    ) -> Self {
        let executor = ArbitrageExecutor::new(service.clone(), sink, config.execution_params());
        Self {
            source,
            service,
            executor,
            fee_rate: config.fee_rate,
            min_profit_margin: config.min_profit_margin,
            sizing: config.sizing_params(),
            scan_interval: config.scan_interval(),
            last_executed: HashMap::new(),
            stats: Arc::new(RwLock::new(BotStats::default())),
            ready: Arc::new(AtomicBool::new(false)),
            paper: None,
        }
    }

    /// Report this paper venue's balance and ROI in summaries.
    pub fn with_paper_venue(mut self, paper: Arc<PaperOrderService>) -> Self {
        self.paper = Some(paper);
        self
    }

    /// Shared handle to the running statistics.
    pub fn stats_handle(&self) -> Arc<RwLock<BotStats>> {
        self.stats.clone()
    }

    /// Flag set once the first cycle has completed.
    pub fn ready_handle(&self) -> Arc<AtomicBool> {
        self.ready.clone()
    }

    /// Copy of the current statistics.
    pub async fn stats(&self) -> BotStats {
        self.stats.read().await.clone()
    }

    /// Poll the source once and process the snapshot.
    pub async fn run_cycle(&mut self) -> Option<Position> {
        match self.source.poll().await {
            Ok(snapshot) => self.process_snapshot(snapshot).await,
            Err(e) => {
                warn!(error = %e, "Quote poll failed");
                None
            }
        }
    }

    /// Evaluate a snapshot and execute its best fresh opportunity.
    ///
    /// Returns the position when an execution was attempted.
    pub async fn process_snapshot(&mut self, snapshot: QuoteSnapshot) -> Option<Position> {
        let _timer = metrics::timer_scan();

        let QuoteSnapshot { quotes, rejected } = snapshot;
        for e in &rejected {
            warn!(error = %e, "Quote rejected");
        }

        let evaluated = quotes.len() as u64;
        let mut invalid = rejected.len() as u64;
        let closest = quotes.iter().min_by_key(|q| q.total_cost()).cloned();

        let mut found = Vec::new();
        for result in scan(quotes, self.fee_rate, self.min_profit_margin) {
            match result {
                Ok(opportunity) => found.push(opportunity),
                Err(e) => {
                    invalid += 1;
                    warn!(error = %e, "Quote rejected");
                }
            }
        }

        metrics::add_quotes_evaluated(evaluated);
        metrics::add_quotes_invalid(invalid);
        metrics::add_opportunities_detected(found.len() as u64);

        let detected = found.len() as u64;
        let mut duplicates = 0u64;
        let best = rank(found).into_iter().find(|opportunity| {
            let fresh = !self.already_executed(opportunity);
            if !fresh {
                duplicates += 1;
            }
            fresh
        });

        let scans = {
            let mut stats = self.stats.write().await;
            stats.scans += 1;
            stats.quotes_evaluated += evaluated;
            stats.invalid_quotes += invalid;
            stats.opportunities_found += detected;
            stats.duplicates_skipped += duplicates;
            stats.last_scan_at = Some(OffsetDateTime::now_utc());
            stats.scans
        };
        self.ready.store(true, Ordering::SeqCst);
        if scans % SUMMARY_EVERY_SCANS == 0 {
            self.log_summary().await;
        }

        let Some(best) = best else {
            if let Some(quote) = closest {
                if let Ok(diagnosis) = diagnose(&quote, self.fee_rate, self.min_profit_margin) {
                    debug!(market = %quote.market_id, "No opportunity: {}", diagnosis);
                }
            }
            return None;
        };

        self.execute(best).await
    }

    fn already_executed(&self, opportunity: &ArbitrageOpportunity) -> bool {
        self.last_executed
            .get(&opportunity.market_id)
            .is_some_and(|as_of| *as_of >= opportunity.quote_snapshot.as_of)
    }

    async fn execute(&mut self, opportunity: ArbitrageOpportunity) -> Option<Position> {
        info!(
            market = %opportunity.market_id,
            yes = %opportunity.yes_price(),
            no = %opportunity.no_price(),
            margin = %opportunity.profit_margin,
            "Opportunity selected"
        );

        let capital = match self.service.available_capital().await {
            Ok(capital) => capital,
            Err(e) => {
                warn!(error = %e, "Could not read available capital");
                return None;
            }
        };

        // Legs may fill at their slippage limits, so cap shares to what that costs.
        let shares = match self.sizing.size(&opportunity, capital) {
            Ok(shares) => shares.min(self.executor.affordable_shares(&opportunity, capital)),
            Err(e) => {
                warn!(error = %e, "Opportunity not sized");
                self.stats.write().await.sizing_failures += 1;
                return None;
            }
        };

        let position = self.executor.execute(&opportunity, shares).await;
        self.last_executed.insert(
            opportunity.market_id.clone(),
            opportunity.quote_snapshot.as_of,
        );
        self.stats.write().await.record_position(&position);
        Some(position)
    }

    /// Poll the source every scan interval until `shutdown` resolves.
    pub async fn run<F>(&mut self, shutdown: F) -> BotStats
    where
        F: Future<Output = ()>,
    {
        let snapshots = quote_stream(self.source.clone(), self.scan_interval);
        self.run_stream(snapshots, shutdown).await
    }

    /// Process pushed snapshots until the stream ends or `shutdown` resolves.
    ///
    /// A cycle already executing is finished before shutdown takes effect.
    pub async fn run_stream<S, F>(&mut self, snapshots: S, shutdown: F) -> BotStats
    where
        S: Stream<Item = QuoteSnapshot>,
        F: Future<Output = ()>,
    {
        futures::pin_mut!(snapshots);
        futures::pin_mut!(shutdown);

        info!(
            fee_rate = %self.fee_rate,
            min_profit_margin = %self.min_profit_margin,
            "Arbitrage bot started"
        );

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested, stopping bot");
                    break;
                }
                next = snapshots.next() => match next {
                    Some(snapshot) => {
                        self.process_snapshot(snapshot).await;
                    }
                    None => {
                        info!("Quote stream ended");
                        break;
                    }
                },
            }
        }

        self.log_summary().await;
        self.stats().await
    }

    /// Log running totals, with the paper venue's results when attached.
    pub async fn log_summary(&self) {
        let stats = self.stats().await;
        log_stats(&stats);
        if let Some(paper) = &self.paper {
            let paper = paper.statistics();
            info!("Balance:              {}", format_currency(paper.balance));
            info!("Resolved markets:     {}", paper.resolved_markets);
            info!("Realized profit:      {}", format_currency(paper.realized_profit));
            if let Some(roi) = paper.roi {
                info!("ROI:                  {}", format_percentage(roi));
            }
        }
        info!("========================================");
    }
}

fn log_stats(stats: &BotStats) {
    info!("========================================");
    info!("SESSION SUMMARY");
    info!("========================================");
    info!("Scans:                {}", stats.scans);
    info!("Quotes evaluated:     {}", stats.quotes_evaluated);
    info!("Opportunities found:  {}", stats.opportunities_found);
    info!("Executions:           {}", stats.executions);
    info!("  both filled:        {}", stats.filled_both);
    info!("  single leg:         {}", stats.single_leg_fills());
    info!("  neither filled:     {}", stats.filled_neither);
    info!("  stale:              {}", stats.rejected_stale);
    info!("  unhedged:           {}", stats.unhedged_positions);
    info!("Total invested:       {}", format_currency(stats.total_invested));
    info!("Expected profit:      {}", format_currency(stats.expected_profit));
}
