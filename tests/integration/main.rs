//! End-to-end tests: detection, sizing and execution against the paper venue.

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use time::OffsetDateTime;

use binary_arb::arbitrage::{evaluate, ArbitrageExecutor, ArbitrageOpportunity, ExecutionParams};
use binary_arb::bot::ArbitrageBot;
use binary_arb::config::Config;
use binary_arb::market::{FileQuoteSource, MarketQuote, Outcome};
use binary_arb::trading::{
    size_position, JsonLinesSink, MemorySink, PaperOrderService, PositionStatus, SettlementSink,
};

fn params() -> ExecutionParams {
    ExecutionParams {
        max_quote_age: Duration::from_secs(1),
        leg_timeout: Duration::from_millis(200),
        fill_query_attempts: 3,
        max_slippage: dec!(0.02),
    }
}

fn opportunity(yes: Decimal, no: Decimal, as_of: OffsetDateTime) -> ArbitrageOpportunity {
    let quote = MarketQuote::new("btc-15m", yes, no, as_of).unwrap();
    evaluate(&quote, dec!(0.02), dec!(0.01)).unwrap().unwrap()
}

fn venue_at_quote(paper: &PaperOrderService, yes_depth: Decimal, no_depth: Decimal) {
    paper.set_liquidity("btc-15m", Outcome::Yes, dec!(0.45), yes_depth);
    paper.set_liquidity("btc-15m", Outcome::No, dec!(0.45), no_depth);
}

#[test]
fn quote_below_threshold_is_not_an_opportunity() {
    let quote = MarketQuote::new("m", dec!(0.52), dec!(0.46), OffsetDateTime::now_utc()).unwrap();
    assert_eq!(evaluate(&quote, dec!(0.02), dec!(0.01)).unwrap(), None);
}

#[tokio::test]
async fn sized_opportunity_fills_both_legs() {
    let opp = opportunity(dec!(0.45), dec!(0.45), OffsetDateTime::now_utc());
    assert_eq!(opp.profit_margin, dec!(0.082));

    let shares = size_position(&opp, dec!(10000), dec!(1000), dec!(5000)).unwrap();
    assert_eq!(shares.round_dp(2), dec!(2022.22));

    let paper = Arc::new(PaperOrderService::new(dec!(10000)));
    venue_at_quote(&paper, dec!(5000), dec!(5000));
    let sink = Arc::new(MemorySink::new());
    let executor = ArbitrageExecutor::new(paper.clone(), sink.clone(), params());

    let position = executor.execute(&opp, shares).await;

    assert_eq!(position.status, PositionStatus::FilledBoth);
    assert_eq!(position.yes_fill_price, Some(dec!(0.45)));
    assert_eq!(position.no_fill_price, Some(dec!(0.45)));

    let profit = position.realized_profit_estimate.unwrap();
    let expected = shares * opp.profit_margin;
    assert!((profit - expected).abs() < dec!(0.000001));

    let spent = dec!(10000) - paper.balance();
    assert!((spent - position.cost_basis()).abs() < dec!(0.000001));
    assert_eq!(sink.positions(), vec![position]);
}

#[tokio::test]
async fn vanished_no_liquidity_leaves_yes_only() {
    let opp = opportunity(dec!(0.45), dec!(0.45), OffsetDateTime::now_utc());
    let paper = Arc::new(PaperOrderService::new(dec!(10000)));
    venue_at_quote(&paper, dec!(5000), dec!(0));
    let executor = ArbitrageExecutor::new(paper, Arc::new(MemorySink::new()), params());

    let position = executor.execute(&opp, dec!(2022.22)).await;

    assert_eq!(position.status, PositionStatus::FilledYesOnly);
    assert_eq!(position.yes_filled, dec!(2022.22));
    assert_eq!(position.realized_profit_estimate, None);
    let leg = position.filled_leg().unwrap();
    assert_eq!(leg.outcome, Outcome::Yes);
    assert_eq!(leg.price, dec!(0.45));
}

#[tokio::test]
async fn vanished_yes_liquidity_leaves_no_only() {
    let opp = opportunity(dec!(0.45), dec!(0.45), OffsetDateTime::now_utc());
    let paper = Arc::new(PaperOrderService::new(dec!(10000)));
    venue_at_quote(&paper, dec!(0), dec!(5000));
    let executor = ArbitrageExecutor::new(paper, Arc::new(MemorySink::new()), params());

    let position = executor.execute(&opp, dec!(2022.22)).await;

    assert_eq!(position.status, PositionStatus::FilledNoOnly);
    assert_eq!(position.no_filled, dec!(2022.22));
    assert_eq!(position.realized_profit_estimate, None);
}

#[tokio::test]
async fn five_second_old_quote_is_refused() {
    let opp = opportunity(
        dec!(0.45),
        dec!(0.45),
        OffsetDateTime::now_utc() - time::Duration::seconds(5),
    );
    let paper = Arc::new(PaperOrderService::new(dec!(10000)));
    let executor = ArbitrageExecutor::new(paper.clone(), Arc::new(MemorySink::new()), params());

    let position = executor.execute(&opp, dec!(100)).await;

    assert_eq!(position.status, PositionStatus::RejectedStale);
    assert_eq!(paper.place_calls(), 0);
    assert_eq!(paper.query_calls(), 0);
    assert_eq!(paper.balance(), dec!(10000));
}

#[tokio::test]
async fn bot_trades_from_quote_file_and_logs_positions() {
    let dir = tempfile::tempdir().unwrap();
    let quotes_path = dir.path().join("quotes.json");
    let log_path = dir.path().join("trades.jsonl");

    let mut file = std::fs::File::create(&quotes_path).unwrap();
    write!(
        file,
        r#"[
            {{"market_id": "a", "yes_price": "0.45", "no_price": "0.45"}},
            {{"market_id": "b", "yes_price": "0.52", "no_price": "0.46"}},
            {{"market_id": "c", "yes_price": "1.50", "no_price": "0.10"}}
        ]"#
    )
    .unwrap();

    let config = Config {
        base_size: dec!(100),
        max_size: dec!(500),
        ..Config::default()
    };
    let paper = Arc::new(PaperOrderService::new(dec!(1000)));
    let sink: Arc<dyn SettlementSink> = Arc::new(JsonLinesSink::open(&log_path).unwrap());
    let mut bot = ArbitrageBot::new(
        &config,
        Arc::new(FileQuoteSource::new(&quotes_path)),
        paper.clone(),
        sink,
    );

    let position = bot.run_cycle().await.unwrap();
    assert_eq!(position.market_id.as_str(), "a");
    assert_eq!(position.status, PositionStatus::FilledBoth);

    let stats = bot.stats().await;
    assert_eq!(stats.quotes_evaluated, 2);
    assert_eq!(stats.invalid_quotes, 1);
    assert_eq!(stats.opportunities_found, 1);
    assert_eq!(stats.filled_both, 1);

    let log = std::fs::read_to_string(&log_path).unwrap();
    let entry: serde_json::Value = serde_json::from_str(log.lines().next().unwrap()).unwrap();
    assert_eq!(entry["market_id"], "a");
    assert_eq!(entry["status"], "FILLED_BOTH");
    assert!(paper.balance() < dec!(1000));
}

#[tokio::test]
async fn hedged_position_pays_out_on_either_resolution() {
    let opp = opportunity(dec!(0.45), dec!(0.45), OffsetDateTime::now_utc());
    let paper = Arc::new(PaperOrderService::new(dec!(1000)));
    venue_at_quote(&paper, dec!(5000), dec!(5000));
    let executor = ArbitrageExecutor::new(paper.clone(), Arc::new(MemorySink::new()), params());

    let position = executor.execute(&opp, dec!(100)).await;
    assert_eq!(position.status, PositionStatus::FilledBoth);
    assert!(position.is_hedged());

    let payout = paper.resolve(&position.market_id, Outcome::No);

    assert_eq!(payout, dec!(100));
    let stats = paper.statistics();
    assert_eq!(stats.balance, dec!(1010));
    assert_eq!(stats.realized_profit, dec!(10));
    assert_eq!(stats.roi.map(|r| r.round_dp(4)), Some(dec!(0.1111)));
}
