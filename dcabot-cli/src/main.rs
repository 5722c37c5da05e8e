//! dcabot CLI: run the bot, validate config, inspect state and signals.
//!
//! Commands:
//! - `run`: poll every configured symbol (paper fills unless `--live`)
//! - `check-config`: load and validate the config, print its fingerprint
//! - `status`: open positions from the state file plus the fill journal tail
//! - `signal`: fetch bars once and print indicator readings and signals

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

use dcabot_core::config::BotConfig;
use dcabot_core::data::PriceSource;
use dcabot_core::domain::PriceWindow;
use dcabot_core::execution::PaperGateway;
use dcabot_core::signals::{evaluate, IndicatorSuite};
use dcabot_runner::exchange::{BinanceClient, CircuitBreaker, BINANCE_BASE_URL, BINANCE_TESTNET_URL};
use dcabot_runner::journal::TradeJournal;
use dcabot_runner::store::PositionStore;
use dcabot_runner::Bot;

#[derive(Parser)]
#[command(name = "dcabot", about = "dcabot: RSI-entry DCA trading bot for Binance spot", version)]
struct Cli {
    /// Path to the bot config (TOML, or JSON when it ends in .json).
    #[arg(long, global = true, default_value = "dcabot.toml")]
    config: PathBuf,

    /// Log filter when DCABOT_LOG is unset (e.g. info, dcabot_runner=debug).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Emit logs as JSON lines.
    #[arg(long, global = true, default_value_t = false)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll the configured symbols and trade.
    Run {
        /// Send real orders to Binance (requires API credentials).
        #[arg(long, default_value_t = false)]
        live: bool,

        /// Use the Binance spot testnet endpoints.
        #[arg(long, default_value_t = false)]
        testnet: bool,

        /// Run a single pass and exit.
        #[arg(long, default_value_t = false, conflicts_with = "passes")]
        once: bool,

        /// Stop after this many passes.
        #[arg(long)]
        passes: Option<u64>,

        /// Starting quote balance for paper trading.
        #[arg(long, default_value_t = 1_000.0)]
        balance: f64,

        /// Paper fill slippage in basis points.
        #[arg(long, default_value_t = 0.0)]
        slippage_bps: f64,
    },
    /// Load and validate the config without trading.
    CheckConfig,
    /// Show persisted positions and the most recent fills.
    Status {
        /// Number of journal rows to show.
        #[arg(long, default_value_t = 10)]
        tail: usize,

        /// Show the paper-session state file instead of the live one.
        #[arg(long, default_value_t = false)]
        paper: bool,
    },
    /// Fetch bars and print indicator readings and signals per symbol.
    Signal {
        /// Use the Binance spot testnet endpoints.
        #[arg(long, default_value_t = false)]
        testnet: bool,

        /// Print one JSON object per symbol.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level, cli.log_json)?;

    match cli.command {
        Commands::Run {
            live,
            testnet,
            once,
            passes,
            balance,
            slippage_bps,
        } => {
            let config = load_config(&cli.config)?;
            let max_passes = if once { Some(1) } else { passes };
            run_bot(&config, live, testnet, max_passes, balance, slippage_bps)
        }
        Commands::CheckConfig => run_check_config(&cli.config),
        Commands::Status { tail, paper } => {
            let config = load_config(&cli.config)?;
            run_status(&session_config(&config, !paper), tail)
        }
        Commands::Signal { testnet, json } => {
            let config = load_config(&cli.config)?;
            run_signal(&config, testnet, json)
        }
    }
}

fn init_tracing(log_level: &str, json: bool) -> Result<()> {
    let filter = std::env::var("DCABOT_LOG").unwrap_or_else(|_| log_level.to_string());
    let env_filter = tracing_subscriber::EnvFilter::try_new(filter).context("invalid log filter")?;

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }
    Ok(())
}

fn load_config(path: &Path) -> Result<BotConfig> {
    let config = BotConfig::from_file(path)?;
    info!(
        path = %path.display(),
        symbols = ?config.symbols,
        fingerprint = %config.fingerprint(),
        "config loaded"
    );
    Ok(config)
}

fn base_url(testnet: bool) -> &'static str {
    if testnet {
        BINANCE_TESTNET_URL
    } else {
        BINANCE_BASE_URL
    }
}

fn run_bot(
    config: &BotConfig,
    live: bool,
    testnet: bool,
    max_passes: Option<u64>,
    balance: f64,
    slippage_bps: f64,
) -> Result<()> {
    let breaker = Arc::new(CircuitBreaker::default_exchange());
    let source = BinanceClient::new(base_url(testnet), Arc::clone(&breaker))
        .context("building HTTP client")?;

    if live {
        let credentials = config.credentials()?;
        let gateway = BinanceClient::new(base_url(testnet), breaker)
            .context("building HTTP client")?
            .with_credentials(credentials)
            .with_quantity_precision(config.quantity_precision);
        warn!(testnet, "live trading: orders will be sent to the exchange");
        let mut bot = Bot::new(config, source, gateway)?;
        bot.run(max_passes)?;
        return Ok(());
    }

    if balance <= 0.0 {
        bail!("--balance must be positive, got {balance}");
    }
    let config = session_config(config, false);
    info!(state_file = %config.state_file.display(), "paper session");
    let gateway = PaperGateway::new(config.base_currency.as_str(), balance, config.fee_rate)
        .with_slippage_bps(slippage_bps);
    let mut bot = Bot::new(&config, source, gateway)?;
    bot.run(max_passes)?;

    let paper = bot.gateway();
    println!(
        "Paper session: {} trades, {} {:.2} balance, {:.4} fees paid",
        paper.trades().len(),
        config.base_currency,
        paper.balance(),
        paper.fees_paid()
    );
    for (asset, qty) in paper.holdings() {
        println!("  holding {asset}: {qty}");
    }
    Ok(())
}

/// Paper sessions keep their positions apart from the live state file.
fn session_config(config: &BotConfig, live: bool) -> BotConfig {
    let mut session = config.clone();
    if !live {
        session.state_file = config.paper_state_file();
    }
    session
}

fn run_check_config(path: &Path) -> Result<()> {
    let config = BotConfig::from_file(path)?;
    let ctx = config.strategy_context();

    println!("Config OK: {}", path.display());
    println!("  fingerprint:     {}", config.fingerprint());
    println!("  symbols:         {}", config.symbols.join(", "));
    println!("  interval:        {}", config.interval);
    println!(
        "  entry:           RSI({}) < {}",
        config.rsi_period, config.rsi_threshold
    );
    println!(
        "  sizing:          {} {} base, x{} per level, {} levels",
        config.base_investment,
        config.base_currency,
        config.dca_size_multiplier,
        config.max_dca_levels
    );
    println!(
        "  exits:           take profit {:.2}%, trailing {:.2}%, DCA every {:.2}%",
        ctx.take_profit * 100.0,
        ctx.trailing_stop * 100.0,
        ctx.dca_drop_trigger * 100.0
    );
    println!(
        "  gates:           macd={} alligator={}",
        describe_gate(config.macd.enabled, config.macd.for_entry, config.macd.for_exit),
        describe_gate(
            config.alligator.enabled,
            config.alligator.for_entry,
            config.alligator.for_exit
        )
    );
    println!(
        "  credentials:     {}",
        if config.credentials().is_ok() {
            "present"
        } else {
            "missing (paper only)"
        }
    );
    Ok(())
}

fn describe_gate(enabled: bool, for_entry: bool, for_exit: bool) -> &'static str {
    match (enabled, for_entry, for_exit) {
        (false, _, _) => "off",
        (true, true, true) => "entry+exit",
        (true, true, false) => "entry",
        (true, false, true) => "exit",
        (true, false, false) => "computed only",
    }
}

fn run_status(config: &BotConfig, tail: usize) -> Result<()> {
    let store = PositionStore::new(config.state_file.clone());
    let book = store.load()?;
    let ctx = config.strategy_context();

    println!("State file: {}", store.path().display());
    if book.is_empty() {
        println!("  no open positions");
    }
    for (symbol, pos) in book.iter() {
        println!(
            "  {symbol:<12} {:?} qty={} entry={:.6} level={}/{} next DCA at {:.6}, take profit at {:.6}",
            pos.status,
            pos.quantity,
            pos.entry_price,
            pos.dca_level,
            ctx.max_dca_levels,
            ctx.dca_trigger_price(pos.anchor_price, pos.dca_level),
            ctx.take_profit_price(pos.entry_price),
        );
    }

    let Some(path) = &config.journal_file else {
        println!("Journal: disabled");
        return Ok(());
    };
    let rows = TradeJournal::new(path.clone()).read_all()?;
    println!("Journal: {} ({} fills)", path.display(), rows.len());
    let now = Utc::now();
    for row in rows.iter().rev().take(tail).rev() {
        let age = now.signed_duration_since(row.timestamp);
        println!(
            "  {} ({}h ago) [{}] {} {} {} @ {:.6} fee {:.6} {}",
            row.timestamp.format("%Y-%m-%d %H:%M:%S"),
            age.num_hours(),
            row.mode,
            row.symbol,
            row.side,
            row.quantity,
            row.price,
            row.fee,
            row.reason
        );
    }
    Ok(())
}

fn run_signal(config: &BotConfig, testnet: bool, json: bool) -> Result<()> {
    let breaker = Arc::new(CircuitBreaker::default_exchange());
    let source = BinanceClient::new(base_url(testnet), breaker).context("building HTTP client")?;
    let suite = IndicatorSuite::from_config(config);

    let mut failures = 0usize;
    for symbol in &config.symbols {
        let mut window = PriceWindow::new(suite.required_bars());
        let bars = match source.fetch_bars(symbol, &config.interval, window.capacity()) {
            Ok(bars) => bars,
            Err(e) => {
                eprintln!("{symbol}: fetch failed: {e}");
                failures += 1;
                continue;
            }
        };
        window
            .merge(&bars)
            .with_context(|| format!("{symbol}: invalid kline batch"))?;

        let snapshot = suite.snapshot(&window);
        let signals = evaluate(&snapshot, config.rsi_threshold, &suite);
        let price = window.latest().map(|b| b.close);

        if json {
            let line = serde_json::json!({
                "symbol": symbol,
                "price": price,
                "bars": window.len(),
                "rsi": snapshot.rsi_value(),
                "macd": snapshot.macd.as_ref().and_then(|r| r.as_ref().ok()).map(|m| {
                    serde_json::json!({ "macd": m.macd, "signal": m.signal, "histogram": m.histogram() })
                }),
                "alligator": snapshot.alligator.as_ref().and_then(|r| r.as_ref().ok()).map(|a| {
                    serde_json::json!({ "jaw": a.jaw, "teeth": a.teeth, "lips": a.lips })
                }),
                "signals": signals,
            });
            println!("{line}");
            continue;
        }

        println!("{symbol}");
        match price {
            Some(p) => println!("  price:     {p}"),
            None => println!("  price:     n/a"),
        }
        match &snapshot.rsi {
            Ok(v) => println!("  rsi:       {v:.2} (threshold {})", config.rsi_threshold),
            Err(e) => println!("  rsi:       {e}"),
        }
        match &snapshot.macd {
            Some(Ok(m)) => println!(
                "  macd:      {:.6} signal {:.6} hist {:.6}",
                m.macd,
                m.signal,
                m.histogram()
            ),
            Some(Err(e)) => println!("  macd:      {e}"),
            None => {}
        }
        match &snapshot.alligator {
            Some(Ok(a)) => println!(
                "  alligator: jaw {:.6} teeth {:.6} lips {:.6}",
                a.jaw, a.teeth, a.lips
            ),
            Some(Err(e)) => println!("  alligator: {e}"),
            None => {}
        }
        println!("  entry={} exit={}", signals.entry, signals.exit);
    }

    if failures == config.symbols.len() {
        bail!("no symbol could be fetched");
    }
    Ok(())
}
