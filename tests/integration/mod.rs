//! Integration tests for the Kalshi quoting bot.
//!
//! These tests require demo credentials in KALSHI_API_KEY_ID and
//! KALSHI_PRIVATE_KEY_PATH (or KALSHI_PRIVATE_KEY).
//! Run with: cargo test --test integration -- --ignored
//!
//! Note: These tests talk to the Kalshi demo API. Order tests go through the
//! dry-run wrapper so nothing is placed.

use kalshi_mm::config::Config;
use kalshi_mm::market::{
    discover_markets, DryRunClient, KalshiClient, MarketFilter, MarketStatus, TradingApi,
};
use kalshi_mm::scheduler::CycleScheduler;

/// Get a demo config from environment.
fn test_config() -> Option<Config> {
    let config = Config::load().ok()?;

    if !config.kalshi_demo || !config.has_credentials() {
        return None;
    }

    Some(Config {
        dry_run: true,
        ..config
    })
}

fn demo_client() -> Option<KalshiClient> {
    let config = test_config()?;
    match KalshiClient::new(&config) {
        Ok(client) => Some(client),
        Err(e) => {
            println!("Skipping: could not build client: {}", e);
            None
        }
    }
}

/// Test that we can query the balance.
#[tokio::test]
#[ignore = "requires Kalshi demo credentials"]
async fn test_get_balance() {
    let Some(client) = demo_client() else {
        println!("Skipping: demo credentials not set");
        return;
    };

    let result = client.get_balance().await;
    assert!(result.is_ok(), "Failed to get balance: {:?}", result.err());

    let balance = result.unwrap();
    assert!(balance >= 0, "Balance should not be negative");
    println!("Balance: {}¢", balance);
}

/// Test one page of the market listing.
#[tokio::test]
#[ignore = "requires Kalshi demo credentials"]
async fn test_list_markets_page() {
    let Some(client) = demo_client() else {
        println!("Skipping: demo credentials not set");
        return;
    };

    let page = client
        .list_markets(MarketStatus::Open, 20, None)
        .await
        .expect("listing should succeed");

    assert!(page.markets.len() <= 20);
    for market in &page.markets {
        assert!(!market.ticker.is_empty());
    }
    println!(
        "Listed {} markets, next cursor: {:?}",
        page.markets.len(),
        page.next_cursor()
    );
}

/// Test that order books stay on the 1..=99 scale.
#[tokio::test]
#[ignore = "requires Kalshi demo credentials"]
async fn test_order_book_prices_in_range() {
    let Some(client) = demo_client() else {
        println!("Skipping: demo credentials not set");
        return;
    };

    let page = client
        .list_markets(MarketStatus::Open, 5, None)
        .await
        .expect("listing should succeed");
    let Some(market) = page.markets.first() else {
        println!("Skipping: no open markets");
        return;
    };

    let book = client
        .get_order_book(&market.ticker)
        .await
        .expect("order book should load");

    for level in book.bids.iter().chain(book.asks.iter()) {
        assert!((1..=99).contains(&level.price), "price {} out of range", level.price);
    }
    println!(
        "{}: best bid {:?}, best ask {:?}",
        market.ticker,
        book.best_bid(),
        book.best_ask()
    );
}

/// Test market discovery end to end.
#[tokio::test]
#[ignore = "requires Kalshi demo credentials"]
async fn test_discover_markets() {
    let Some(config) = test_config() else {
        println!("Skipping: demo credentials not set");
        return;
    };
    let client = KalshiClient::new(&config).expect("client");
    let filter = MarketFilter::from_config(&config);

    let markets = discover_markets(&client, &filter, config.market_page_limit)
        .await
        .expect("discovery should succeed");

    for market in &markets {
        assert!(filter.matches(market));
    }
    println!("{} candidate markets", markets.len());
}

/// Test a full dry-run cycle.
#[tokio::test]
#[ignore = "requires Kalshi demo credentials"]
async fn test_dry_run_cycle() {
    let Some(config) = test_config() else {
        println!("Skipping: demo credentials not set");
        return;
    };
    let client = KalshiClient::new(&config).expect("client");

    let mut scheduler = CycleScheduler::new(DryRunClient::new(client), &config);
    let report = scheduler.run_cycle().await.expect("cycle should succeed");

    println!(
        "cycle {}: {} candidates, {} quoted, {} skipped, {} failed",
        report.cycle,
        report.candidates(),
        report.count("quoted"),
        report.count("skipped"),
        report.count("failed")
    );
}
