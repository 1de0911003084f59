//! Bitfinex funding bot entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use metrics_exporter_prometheus::PrometheusBuilder;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bitfinex_funder::alert::WebhookAlertSink;
use bitfinex_funder::api::{create_router, AppState};
use bitfinex_funder::config::Config;
use bitfinex_funder::controller::FundingController;
use bitfinex_funder::exchange::{BitfinexClient, DryRunWritePort, ExchangeWritePort};
use bitfinex_funder::exchange::ports::{wallet_snapshot, ExchangeReadPort};
use bitfinex_funder::exchange::types::Currency;
use bitfinex_funder::idle::monitor::scan_for_break;
use bitfinex_funder::idle::{IdleSeriesStore, JsonFileStore};
use bitfinex_funder::metrics;
use bitfinex_funder::policy::CurrencyPolicy;
use bitfinex_funder::signals::read_signals;
use bitfinex_funder::utils::shutdown_signal;

/// Bitfinex margin-funding position bot.
#[derive(Parser, Debug)]
#[command(name = "bitfinex-funder")]
#[command(about = "Automated margin-funding position bot for Bitfinex")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the funding bot (default), ticking on an interval.
    Run {
        /// Run a single tick and exit.
        #[arg(long)]
        once: bool,

        /// Run in dry-run mode (no offers submitted or canceled).
        #[arg(long)]
        dry_run: Option<bool>,

        /// HTTP server port for health/metrics.
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Check configuration validity.
    CheckConfig,

    /// Check wallet balances and active offers.
    CheckBalance,

    /// Show market signals and the derived target for a currency.
    Signals {
        /// Currency (USD, EUR, GBP).
        currency: String,
    },

    /// Show the stored idle series and its alert evaluation for a currency.
    Idle {
        /// Currency (USD, EUR, GBP).
        currency: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("bitfinex_funder=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();

    metrics::init_metrics();

    match args.command {
        Some(Command::CheckConfig) => cmd_check_config().await,
        Some(Command::CheckBalance) => cmd_check_balance().await,
        Some(Command::Signals { currency }) => cmd_signals(&currency).await,
        Some(Command::Idle { currency }) => cmd_idle(&currency).await,
        Some(Command::Run { once, dry_run, port }) => cmd_run(once, dry_run, port).await,
        None => cmd_run(false, None, None).await,
    }
}

/// Build the controller and its collaborators from config.
fn build_controller(config: &Config) -> anyhow::Result<FundingController> {
    let client = Arc::new(BitfinexClient::new(config));

    let write: Arc<dyn ExchangeWritePort> = if config.dry_run {
        Arc::new(DryRunWritePort)
    } else {
        client.clone()
    };

    let store: Arc<dyn IdleSeriesStore> = Arc::new(JsonFileStore::new(config.data_dir.clone()));
    let sink = Arc::new(WebhookAlertSink::from_config(config)?);

    Ok(FundingController::new(
        client,
        write,
        store,
        sink,
        config.policies(),
    ))
}

/// Run the funding bot.
async fn cmd_run(
    once: bool,
    dry_run_override: Option<bool>,
    port_override: Option<u16>,
) -> anyhow::Result<()> {
    info!("Loading configuration...");
    let mut config = Config::load().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Some(dry_run) = dry_run_override {
        config.dry_run = dry_run;
    }
    if let Some(port) = port_override {
        config.port = port;
    }

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    info!("Configuration loaded successfully");
    info!("Mode: {}", if config.dry_run { "DRY RUN" } else { "LIVE" });
    info!(
        "Currencies: {}",
        config
            .currencies
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    info!("Tick interval: {}s", config.tick_interval_secs);

    let controller = build_controller(&config)?;

    if once {
        let report = controller.run_tick().await?;
        info!(
            "Tick complete: {} ok, {} failed, {} submitted, {} canceled",
            report.completed.len(),
            report.failures.len(),
            report.offers_submitted(),
            report.offers_canceled(),
        );
        // failures were already forwarded to the alert sink; the entry
        // point still reports success, like a serverless handler
        return Ok(());
    }

    // Prometheus exporter, rendered by the HTTP API
    let prometheus = PrometheusBuilder::new().install_recorder()?;
    let app_state = AppState::new(Some(prometheus));

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());
    let _server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    info!("Starting funding bot...");
    let mut interval = tokio::time::interval(Duration::from_secs(config.tick_interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match controller.run_tick().await {
                    Ok(report) => {
                        info!(
                            "Tick complete: {} ok, {} failed, {} submitted, {} canceled",
                            report.completed.len(),
                            report.failures.len(),
                            report.offers_submitted(),
                            report.offers_canceled(),
                        );
                        app_state.record_tick(&report).await;
                    }
                    Err(e) => {
                        error!("Tick failed: {}", e);
                    }
                }
            }
            _ = shutdown_signal() => {
                info!("Shutting down");
                break;
            }
        }
    }

    Ok(())
}

/// Check configuration validity.
async fn cmd_check_config() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BITFINEX FUNDER - CONFIGURATION CHECK");
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
    println!(
        "  Currencies: {}",
        config
            .currencies
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );
    println!("  Dry Run: {}", config.dry_run);
    println!("  Tick Interval: {}s", config.tick_interval_secs);
    println!("  Data Dir: {}", config.data_dir);
    println!(
        "  Alerts: {}",
        if config.enable_alerts { "Enabled" } else { "Disabled" }
    );

    for policy in config.policies() {
        println!("  --- {} policy ---", policy.currency);
        println!("    FRR offset: {}", policy.rate.frr_offset);
        println!("    Floor rate: {}", policy.rate.floor_rate);
        println!(
            "    Idle alert: {} for {}",
            policy.idle_alert.threshold_amount, policy.idle_alert.duration
        );
    }

    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Check wallet balances and active offers.
async fn cmd_check_balance() -> anyhow::Result<()> {
    println!("======================================================================");
    println!("BITFINEX FUNDER - BALANCE CHECK");
    println!("======================================================================");

    let config = Config::load()?;
    config.validate().map_err(|e| anyhow::anyhow!(e))?;

    let client = BitfinexClient::new(&config);

    for currency in &config.currencies {
        println!("\n--- {} ---", currency);

        let snapshot = wallet_snapshot(&client, *currency).await?;
        println!("  Total balance: {}", snapshot.balance_total);
        println!("  Available balance: {}", snapshot.balance_available);

        let offers = client.active_offers(&currency.symbol()).await?;
        println!("  Active offers: {}", offers.len());
        for offer in offers.iter().take(5) {
            println!(
                "    #{} {} at {} for {} days",
                offer.id, offer.amount, offer.rate, offer.period
            );
        }
        if offers.len() > 5 {
            println!("    ... and {} more", offers.len() - 5);
        }
    }

    println!("\n======================================================================");
    println!("BALANCE CHECK COMPLETED");
    println!("======================================================================");

    Ok(())
}

/// Show market signals and the derived target for a currency.
async fn cmd_signals(currency: &str) -> anyhow::Result<()> {
    let currency: Currency = currency
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown currency: {currency}"))?;

    let config = Config::load()?;
    let client = BitfinexClient::new(&config);
    let policy = CurrencyPolicy::builtin(currency);
    let symbol = currency.symbol();

    println!("======================================================================");
    println!("BITFINEX FUNDER - MARKET SIGNALS ({symbol})");
    println!("======================================================================");

    let signals = read_signals(&client, &symbol, &policy).await?;
    println!("  FRR: {}", signals.frr);
    match signals.bbr {
        Some(bbr) => println!("  BBR: {} (depth {})", bbr, policy.min_cumulative_ask),
        None => println!("  BBR: n/a (empty book)"),
    }

    let rate = policy.rate.target(signals.frr, signals.bbr);
    let period = policy.periods.period_for(rate);
    println!("  Target rate: {}", rate);
    println!("  Target period: {} days", period);

    println!("\n  Recent funding stats:");
    let stats = client.funding_stats(&symbol).await?;
    for stat in stats.iter().take(5) {
        println!(
            "    {}  frr/day {}  avg period {}",
            stat.ts, stat.frr_daily, stat.avg_period
        );
    }

    println!("======================================================================");

    Ok(())
}

/// Show the stored idle series and its alert evaluation for a currency.
async fn cmd_idle(currency: &str) -> anyhow::Result<()> {
    let currency: Currency = currency
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown currency: {currency}"))?;

    let config = Config::load()?;
    let store = JsonFileStore::new(config.data_dir.clone());
    let policy = CurrencyPolicy::builtin(currency);

    println!("======================================================================");
    println!("BITFINEX FUNDER - IDLE SERIES ({currency})");
    println!("======================================================================");

    let series = store.read(currency).await?;
    println!("  Samples: {}", series.len());
    for sample in series.iter().rev().take(10) {
        println!("    {}  {}", sample.ts, sample.value);
    }

    let now = time::OffsetDateTime::now_utc();
    let hit = scan_for_break(
        &series,
        policy.idle_alert.threshold_amount,
        policy.idle_alert.duration,
        policy.alert_scan,
        now,
    );

    match hit {
        Some(idle_break) => println!(
            "\n  ALERT: at least {} idle since {}",
            idle_break.lowest, idle_break.since
        ),
        None => println!("\n  No sustained-idle condition"),
    }

    println!("======================================================================");

    Ok(())
}
