//! Binary-market arbitrage bot entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use time::OffsetDateTime;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use binary_arb::api::{create_router, AppState};
use binary_arb::arbitrage::{diagnose, evaluate};
use binary_arb::bot::ArbitrageBot;
use binary_arb::config::Config;
use binary_arb::market::{FileQuoteSource, MarketQuote};
use binary_arb::metrics;
use binary_arb::trading::{
    planned_investment, FanoutSink, JsonLinesSink, LogSink, PaperOrderService, SettlementSink,
};
use binary_arb::utils::{format_currency, format_percentage, shutdown_signal};

/// Binary-market arbitrage bot.
#[derive(Parser, Debug)]
#[command(name = "binary-arb")]
#[command(about = "Detects and executes risk-free YES/NO arbitrage on binary markets")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the paper-trading bot loop (default).
    Run {
        /// HTTP server port for health/metrics (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,

        /// JSON quotes file to poll (overrides QUOTES_FILE).
        #[arg(long)]
        quotes_file: Option<String>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Evaluate a single quote and show how it would be sized.
    Evaluate {
        /// YES price.
        #[arg(long)]
        yes: Decimal,

        /// NO price.
        #[arg(long)]
        no: Decimal,

        /// Fee rate (overrides FEE_RATE).
        #[arg(long)]
        fee_rate: Option<Decimal>,

        /// Minimum margin (overrides MIN_PROFIT_MARGIN).
        #[arg(long)]
        min_margin: Option<Decimal>,

        /// Capital to size against (defaults to PAPER_BALANCE).
        #[arg(long)]
        capital: Option<Decimal>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("binary_arb=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let (json_layer, text_layer) = if args.json_logs {
        (Some(fmt::layer().json()), None)
    } else {
        (None, Some(fmt::layer()))
    };

    tracing_subscriber::registry()
        .with(json_layer)
        .with(text_layer)
        .with(filter)
        .init();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(),
        Some(Command::Evaluate {
            yes,
            no,
            fee_rate,
            min_margin,
            capital,
        }) => cmd_evaluate(yes, no, fee_rate, min_margin, capital),
        Some(Command::Run { port, quotes_file }) => cmd_run(port, quotes_file).await,
        None => cmd_run(None, None).await,
    }
}

/// Check configuration validity.
fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BINARY ARB BOT - CONFIGURATION CHECK");
    println!("======================================================================");

    print!("Loading configuration... ");
    let config = match Config::load() {
        Ok(c) => {
            println!("OK");
            c
        }
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration load failed"));
        }
    };

    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Fee Rate: {}", format_percentage(config.fee_rate));
    println!("  Min Profit Margin: {}", format_percentage(config.min_profit_margin));
    println!(
        "  Sizing: base {} / max {}",
        format_currency(config.base_size),
        format_currency(config.max_size)
    );
    println!("  Max Slippage: {}", format_percentage(config.max_slippage));
    println!("  Leg Timeout: {}ms", config.execution_timeout_ms);
    println!("  Max Quote Age: {}ms", config.max_quote_age_ms);
    println!("  Fill Queries: {}", config.fill_query_attempts);
    println!("  Scan Interval: {}ms", config.scan_interval_ms);
    match &config.quotes_file {
        Some(path) => println!("  Quotes File: {}", path),
        None => println!("  WARNING: QUOTES_FILE is not set; `run` needs one"),
    }
    println!("  Paper Balance: {}", format_currency(config.paper_balance));
    println!(
        "  Trade Log: {}",
        config.trades_log.as_deref().unwrap_or("disabled")
    );
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Evaluate a single quote from the command line.
fn cmd_evaluate(
    yes: Decimal,
    no: Decimal,
    fee_rate: Option<Decimal>,
    min_margin: Option<Decimal>,
    capital: Option<Decimal>,
) -> anyhow::Result<()> {
    let config = Config::load()?;
    let fee_rate = fee_rate.unwrap_or(config.fee_rate);
    let min_margin = min_margin.unwrap_or(config.min_profit_margin);
    let capital = capital.unwrap_or(config.paper_balance);

    let quote = MarketQuote::new("cli", yes, no, OffsetDateTime::now_utc())?;
    let diagnosis = diagnose(&quote, fee_rate, min_margin)?;

    println!("======================================================================");
    println!("BINARY ARB BOT - QUOTE EVALUATION");
    println!("======================================================================");
    println!("YES price:            ${}", diagnosis.yes_price);
    println!("NO price:             ${}", diagnosis.no_price);
    println!("Total cost:           ${}", diagnosis.total_cost);
    println!("Total with fees:      ${}", diagnosis.total_cost_with_fees);
    println!("Margin:               {}", format_percentage(diagnosis.profit_margin));
    println!("Minimum margin:       {}", format_percentage(diagnosis.min_profit_margin));
    println!("----------------------------------------------------------------------");

    match evaluate(&quote, fee_rate, min_margin)? {
        Some(opportunity) => {
            let sizing = config.sizing_params();
            let investment =
                planned_investment(&opportunity, capital, sizing.base_size, sizing.max_size)?;
            let shares = sizing.size(&opportunity, capital)?;

            println!("OPPORTUNITY");
            println!("Investment:           {}", format_currency(investment));
            println!("Shares per leg:       {}", shares.round_dp(4));
            println!(
                "Expected profit:      {}",
                format_currency(opportunity.expected_profit(shares))
            );
        }
        None => {
            println!("NO OPPORTUNITY");
            println!("Shortfall:            {}", format_percentage(diagnosis.shortfall()));
        }
    }
    println!("======================================================================");

    Ok(())
}

/// Run the paper-trading bot loop.
async fn cmd_run(
    port_override: Option<u16>,
    quotes_file_override: Option<String>,
) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    // Override with CLI args if provided
    if let Some(port) = port_override {
        config.port = port;
    }
    if quotes_file_override.is_some() {
        config.quotes_file = quotes_file_override;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    let Some(quotes_file) = config.quotes_file.clone() else {
        return Err(anyhow::anyhow!("QUOTES_FILE (or --quotes-file) is required"));
    };

    info!("Configuration loaded successfully");
    info!("Mode: PAPER TRADING");
    info!("Quotes file: {}", quotes_file);
    info!("Fee rate: {}", format_percentage(config.fee_rate));
    info!("Min profit margin: {}", format_percentage(config.min_profit_margin));

    let prometheus = metrics::install_recorder()?;

    // Settlement sinks
    let mut sink = FanoutSink::new().with(Arc::new(LogSink));
    if let Some(path) = &config.trades_log {
        sink = sink.with(Arc::new(JsonLinesSink::open(path)?));
    }
    let sink: Arc<dyn SettlementSink> = Arc::new(sink);

    let paper = Arc::new(PaperOrderService::new(config.paper_balance));
    let source = Arc::new(FileQuoteSource::new(quotes_file));
    let mut bot =
        ArbitrageBot::new(&config, source, paper.clone(), sink).with_paper_venue(paper.clone());

    // Start HTTP server
    let app_state = AppState::with_bot(bot.ready_handle(), bot.stats_handle())
        .with_metrics(prometheus)
        .with_paper_venue(paper);
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state);
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    // Main bot loop
    info!("Starting arbitrage bot...");
    bot.run(shutdown_signal()).await;

    match server_handle.await {
        Ok(Ok(())) => info!("HTTP server stopped"),
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    Ok(())
}
