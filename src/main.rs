//! Kalshi sports market-making bot entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kalshi_mm::api::{create_router, AppState};
use kalshi_mm::config::Config;
use kalshi_mm::market::{
    discover_markets, DryRunClient, KalshiClient, MarketFilter, TradingApi,
};
use kalshi_mm::metrics;
use kalshi_mm::scheduler::CycleScheduler;
use kalshi_mm::utils::{format_cents, shutdown_channel, shutdown_signal};

/// Two-sided quoting bot for Kalshi sports markets.
#[derive(Parser, Debug)]
#[command(name = "kalshi-mm")]
#[command(about = "Keeps a resting bid/ask around the mid of liquid Kalshi sports markets")]
#[command(version)]
struct Args {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log order mutations instead of sending them.
    #[arg(long, global = true)]
    dry_run: bool,

    /// Trade against the live exchange instead of demo.
    #[arg(long, global = true)]
    live: bool,

    /// HTTP server port for health/status.
    #[arg(short, long, global = true)]
    port: Option<u16>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the refresh loop until interrupted (default).
    Run,

    /// Run a single refresh cycle and exit.
    Once,

    /// Check configuration validity.
    CheckConfig,

    /// Check account balance and connection.
    CheckBalance,

    /// List the markets that would be quoted.
    DiscoverMarkets,
}

impl Args {
    /// Load configuration and apply CLI overrides.
    fn config(&self) -> anyhow::Result<Config> {
        let mut config = Config::load()?;
        if self.dry_run {
            config.dry_run = true;
        }
        if self.live {
            config.kalshi_demo = false;
        }
        if let Some(port) = self.port {
            config.port = port;
        }
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    // Initialize logging
    let filter = if args.verbose {
        EnvFilter::new("kalshi_mm=debug,info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let json = Config::load().map(|c| c.log_json).unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer()).init();
    }

    // Handle subcommands
    match args.command {
        Some(Command::CheckConfig) => cmd_check_config(&args).await,
        Some(Command::CheckBalance) => cmd_check_balance(&args).await,
        Some(Command::DiscoverMarkets) => cmd_discover_markets(&args).await,
        Some(Command::Once) => cmd_once(&args).await,
        Some(Command::Run) | None => cmd_run(&args).await,
    }
}

/// Build the trading API for the configured mode.
fn build_api(config: &Config) -> anyhow::Result<Arc<dyn TradingApi>> {
    let client = KalshiClient::new(config)?;
    if !client.is_authenticated() {
        warn!("No API credentials configured, requests will be unsigned");
    }

    if config.dry_run {
        Ok(Arc::new(DryRunClient::new(client)))
    } else {
        Ok(Arc::new(client))
    }
}

fn load_validated(args: &Args) -> anyhow::Result<Config> {
    let config = args.config().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return Err(anyhow::anyhow!("Configuration validation failed: {}", e));
    }

    Ok(config)
}

/// Check configuration validity.
async fn cmd_check_config(args: &Args) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("KALSHI MM - CONFIGURATION CHECK");
    println!("======================================================================");

    // Load configuration
    print!("Loading configuration... ");
    let config = match args.config() {
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

    // Validate configuration
    print!("Validating configuration... ");
    match config.validate() {
        Ok(()) => println!("OK"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Configuration validation failed"));
        }
    }

    // Check signing key
    print!("Checking signing key... ");
    match KalshiClient::new(&config) {
        Ok(client) if client.is_authenticated() => println!("OK"),
        Ok(_) => println!("NOT CONFIGURED (unsigned requests)"),
        Err(e) => {
            println!("FAILED");
            println!("  Error: {}", e);
            return Err(anyhow::anyhow!("Signing key invalid"));
        }
    }

    // Show configuration summary
    println!("----------------------------------------------------------------------");
    println!("Configuration Summary:");
    println!("  Mode: {}", config.mode_label());
    println!("  Endpoint: {}", config.base_url());
    println!("  Prefixes: {}", config.target_event_prefixes.join(", "));
    println!("  Min Volume: {}", config.min_volume);
    println!("  Spread: {}¢ (max book spread {}¢)", config.spread_cents, config.max_spread_cents);
    println!("  Order Size: {} contracts", config.order_size);
    println!("  Max Position: {} contracts", config.max_position_per_market);
    println!("  Refresh: {}s (backoff {}s)", config.refresh_seconds, config.error_backoff_seconds);
    println!("======================================================================");
    println!("CONFIGURATION CHECK PASSED");
    println!("======================================================================");

    Ok(())
}

/// Check account balance and connection.
async fn cmd_check_balance(args: &Args) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("KALSHI MM - BALANCE CHECK");
    println!("======================================================================");

    let config = load_validated(args)?;
    println!("Endpoint: {}", config.base_url());
    println!("======================================================================");

    // Create client
    print!("\n1. Creating client... ");
    let api = build_api(&config)?;
    println!("OK");

    // Get balance
    print!("\n2. Getting balance... ");
    match api.get_balance().await {
        Ok(cents) => {
            println!("OK");
            println!("   Balance: {}", format_cents(cents));
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
        }
    }

    // Get positions
    print!("\n3. Getting positions... ");
    match api.get_positions().await {
        Ok(positions) => {
            let open: Vec<_> = positions.iter().filter(|p| !p.is_flat()).collect();
            println!("OK");
            println!("   Open positions: {}", open.len());
            for pos in open.iter().take(5) {
                println!("   - {} {:+}", pos.ticker, pos.position);
            }
            if open.len() > 5 {
                println!("   ... and {} more", open.len() - 5);
            }
        }
        Err(e) => {
            println!("FAILED");
            println!("   Error: {}", e);
        }
    }

    println!("\n======================================================================");
    println!("BALANCE CHECK COMPLETED");
    println!("======================================================================");

    Ok(())
}

/// List the markets that pass the filter.
async fn cmd_discover_markets(args: &Args) -> anyhow::Result<()> {
    println!("======================================================================");
    println!("KALSHI MM - MARKET DISCOVERY");
    println!("======================================================================");

    let config = load_validated(args)?;
    let api = build_api(&config)?;
    let filter = MarketFilter::from_config(&config);

    println!(
        "\nListing open markets (prefixes: {}, min volume: {})...\n",
        filter.prefixes.join(", "),
        filter.min_volume
    );

    match discover_markets(api.as_ref(), &filter, config.market_page_limit).await {
        Ok(markets) if markets.is_empty() => {
            println!("NO MARKETS MATCHED");
        }
        Ok(markets) => {
            println!("{} MARKETS MATCHED", markets.len());
            println!("----------------------------------------------------------------------");
            for market in &markets {
                println!("  {:<40} volume {}", market.ticker, market.volume);
            }
        }
        Err(e) => {
            println!("DISCOVERY FAILED");
            println!("  Error: {}", e);
        }
    }
    println!("======================================================================");

    Ok(())
}

/// Run one cycle and print its summary.
async fn cmd_once(args: &Args) -> anyhow::Result<()> {
    let config = load_validated(args)?;
    info!("Mode: {}", config.mode_label());

    metrics::init_metrics();
    let api = build_api(&config)?;
    let mut scheduler = CycleScheduler::new(api, &config);

    let report = scheduler.run_cycle().await?;
    println!("{}", serde_json::to_string_pretty(&report)?);

    Ok(())
}

/// Run the refresh loop.
async fn cmd_run(args: &Args) -> anyhow::Result<()> {
    // Load configuration
    info!("Loading configuration...");
    let config = load_validated(args)?;

    info!("Configuration loaded successfully");
    info!("Mode: {}", config.mode_label());
    info!("Endpoint: {}", config.base_url());
    info!("Spread: {}¢, order size: {}", config.spread_cents, config.order_size);
    info!("Refresh every {}s", config.refresh_seconds);

    // Initialize metrics
    if config.metrics_enabled {
        if let Err(e) = metrics::install_exporter(config.metrics_port) {
            warn!("{}", e);
            metrics::init_metrics();
        }
    } else {
        metrics::init_metrics();
    }

    // Create app state
    let app_state = AppState::with_mode(config.mode_label());

    // Start HTTP server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = TcpListener::bind(addr).await?;
    info!("HTTP server listening on {}", addr);

    let router = create_router(app_state.clone());

    // Spawn HTTP server
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, router)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    // Forward process signals to the scheduler
    let (shutdown_tx, shutdown_rx) = shutdown_channel();
    tokio::spawn(async move {
        shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    });

    let api = build_api(&config)?;
    let scheduler = CycleScheduler::new(api, &config).with_app_state(app_state);

    info!("Starting quoting bot...");
    scheduler.run(shutdown_rx).await;

    match server_handle.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => error!("HTTP server error: {}", e),
        Err(e) => error!("HTTP server task failed: {}", e),
    }

    info!("Shutdown complete");
    Ok(())
}
