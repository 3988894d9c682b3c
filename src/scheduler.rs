//! The periodic refresh cycle.
//!
//! One cycle: read the balance, discover candidate markets, refresh each
//! one in listing order. Markets are refreshed one at a time and a failure
//! in one market never stops the next. A failure to read the balance or
//! list markets aborts the cycle, and the scheduler backs off before
//! trying again.

use std::time::{Duration, Instant};

use rust_decimal::Decimal;
use serde::Serialize;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info, instrument, warn};

use crate::api::AppState;
use crate::config::Config;
use crate::error::BotError;
use crate::market::{discover_markets, MarketFilter, TradingApi};
use crate::metrics;
use crate::trading::{OrderRefresher, RefreshOutcome};
use crate::utils::{cents_to_dollars, format_cents, sleep_or_shutdown};

/// Outcome for one market in a cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MarketResult {
    /// Market ticker.
    pub ticker: String,
    /// What happened.
    #[serde(flatten)]
    pub outcome: RefreshOutcome,
}

/// Summary of one completed cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    /// Cycle number, starting at 1.
    pub cycle: u64,
    /// When the cycle started.
    #[serde(with = "time::serde::rfc3339")]
    pub started_at: OffsetDateTime,
    /// Account balance in dollars.
    pub balance: Decimal,
    /// Per-market results, in listing order.
    pub results: Vec<MarketResult>,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

impl CycleReport {
    /// Number of candidate markets.
    pub fn candidates(&self) -> usize {
        self.results.len()
    }

    /// Number of markets with the given outcome label.
    pub fn count(&self, label: &str) -> usize {
        self.results
            .iter()
            .filter(|r| r.outcome.label() == label)
            .count()
    }

    /// Results that failed.
    pub fn failures(&self) -> impl Iterator<Item = &MarketResult> {
        self.results
            .iter()
            .filter(|r| matches!(r.outcome, RefreshOutcome::Failed { .. }))
    }
}

/// Runs refresh cycles against an injected trading API.
pub struct CycleScheduler<A> {
    api: A,
    filter: MarketFilter,
    refresher: OrderRefresher,
    page_limit: u32,
    refresh_interval: Duration,
    error_backoff: Duration,
    state: Option<AppState>,
    cycle: u64,
}

impl<A: TradingApi> CycleScheduler<A> {
    /// Create a scheduler from configuration.
    pub fn new(api: A, config: &Config) -> Self {
        Self {
            api,
            filter: MarketFilter::from_config(config),
            refresher: OrderRefresher::from_config(config),
            page_limit: config.market_page_limit,
            refresh_interval: config.refresh_interval(),
            error_backoff: config.error_backoff(),
            state: None,
            cycle: 0,
        }
    }

    /// Publish cycle results to the HTTP status endpoints.
    pub fn with_app_state(mut self, state: AppState) -> Self {
        self.state = Some(state);
        self
    }

    /// Override the sleep after a good cycle and after a failed one.
    pub fn with_intervals(mut self, refresh: Duration, backoff: Duration) -> Self {
        self.refresh_interval = refresh;
        self.error_backoff = backoff;
        self
    }

    /// Run one cycle.
    ///
    /// Only balance and listing failures are returned as errors; per-market
    /// failures are reported in the [`CycleReport`].
    #[instrument(skip(self), fields(cycle = self.cycle + 1))]
    pub async fn run_cycle(&mut self) -> Result<CycleReport, BotError> {
        self.cycle += 1;
        let _timer = metrics::timer_cycle();
        let started = Instant::now();
        let started_at = OffsetDateTime::now_utc();

        let balance_cents = self.api.get_balance().await?;
        metrics::set_balance_cents(balance_cents);
        info!(balance = %format_cents(balance_cents), "Account balance");

        let markets = discover_markets(&self.api, &self.filter, self.page_limit).await?;
        metrics::set_candidate_markets(markets.len());

        let mut results = Vec::with_capacity(markets.len());
        for market in markets {
            let outcome = self.refresher.refresh(&self.api, &market.ticker).await;
            metrics::inc_market_outcome(outcome.label());
            results.push(MarketResult {
                ticker: market.ticker,
                outcome,
            });
        }

        let report = CycleReport {
            cycle: self.cycle,
            started_at,
            balance: cents_to_dollars(balance_cents),
            results,
            duration_ms: started.elapsed().as_millis() as u64,
        };
        log_report(&report);
        metrics::inc_cycles();

        Ok(report)
    }

    /// How long to wait after a cycle.
    pub fn delay_after(&self, result: &Result<CycleReport, BotError>) -> Duration {
        match result {
            Ok(_) => self.refresh_interval,
            Err(_) => self.error_backoff,
        }
    }

    /// Run cycles until shutdown is requested.
    ///
    /// An in-flight cycle always finishes; only the sleep between cycles is
    /// interrupted.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(
            refresh_secs = self.refresh_interval.as_secs_f64(),
            backoff_secs = self.error_backoff.as_secs_f64(),
            "Starting refresh loop"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let result = self.run_cycle().await;
            match &result {
                Ok(report) => {
                    if let Some(state) = &self.state {
                        state.record_cycle(report.clone()).await;
                    }
                }
                Err(e) => {
                    metrics::inc_cycle_failures();
                    error!(
                        error = %e,
                        backoff_secs = self.error_backoff.as_secs(),
                        "Cycle failed, backing off"
                    );
                    if let Some(state) = &self.state {
                        state.record_failure(e.to_string()).await;
                    }
                }
            }

            if sleep_or_shutdown(self.delay_after(&result), &mut shutdown).await {
                break;
            }
        }

        info!(cycles = self.cycle, "Refresh loop stopped");
    }
}

fn log_report(report: &CycleReport) {
    for failure in report.failures() {
        if let RefreshOutcome::Failed { stage, reason } = &failure.outcome {
            warn!(ticker = %failure.ticker, %stage, reason = %reason, "Market failed this cycle");
        }
    }

    info!(
        cycle = report.cycle,
        candidates = report.candidates(),
        quoted = report.count("quoted"),
        partial = report.count("partially_quoted"),
        cap_reached = report.count("cap_reached"),
        skipped = report.count("skipped"),
        failed = report.count("failed"),
        duration_ms = report.duration_ms,
        "Cycle complete"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::mock::{ApiCall, MockTradingApi};
    use crate::market::Market;
    use crate::trading::{RefreshStage, Side};
    use crate::utils::shutdown_channel;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    fn scheduler(api: MockTradingApi) -> CycleScheduler<MockTradingApi> {
        CycleScheduler::new(api, &Config::default())
    }

    #[tokio::test]
    async fn empty_candidate_cycle_touches_no_orders() {
        let api = MockTradingApi::new();
        api.set_balance(10_000);
        api.set_markets(vec![Market::new("TENNIS-X-A", "TENNIS-X", 1_000_000)]);

        let mut scheduler = scheduler(api.clone());
        let report = scheduler.run_cycle().await.unwrap();

        assert_eq!(report.candidates(), 0);
        assert_eq!(report.balance, dec!(100.00));
        assert_eq!(
            api.calls(),
            vec![ApiCall::GetBalance, ApiCall::ListMarkets { cursor: None }]
        );
        assert_eq!(scheduler.delay_after(&Ok(report)), Duration::from_secs(45));
    }

    #[tokio::test]
    async fn listing_failure_aborts_cycle_and_backs_off() {
        let api = MockTradingApi::new();
        api.set_markets(vec![Market::new("NBA-A-1", "NBA-A", 60_000)]);
        api.set_fail_listing(true);

        let mut scheduler = scheduler(api.clone());
        let result = scheduler.run_cycle().await;

        assert!(matches!(result, Err(BotError::Market(_))));
        assert!(!api
            .calls()
            .iter()
            .any(|c| matches!(c, ApiCall::GetOrderBook { .. }) || c.is_order_or_position()));
        assert_eq!(scheduler.delay_after(&result), Duration::from_secs(60));
    }

    #[tokio::test]
    async fn balance_failure_aborts_cycle() {
        let api = MockTradingApi::new();
        api.set_fail_balance(true);

        let mut scheduler = scheduler(api.clone());
        assert!(matches!(
            scheduler.run_cycle().await,
            Err(BotError::Trading(_))
        ));
        assert_eq!(api.calls(), vec![ApiCall::GetBalance]);
    }

    #[tokio::test]
    async fn market_failure_does_not_block_next_market() {
        let api = MockTradingApi::new();
        api.set_markets(vec![
            Market::new("NBA-A-1", "NBA-A", 60_000),
            Market::new("NFL-B-1", "NFL-B", 60_000),
        ]);
        api.set_order_book("NBA-A-1", &[(48, 10)], &[(52, 10)]);
        api.set_order_book("NFL-B-1", &[(30, 10)], &[(34, 10)]);
        api.add_resting("stuck", "NBA-A-1", Side::Buy, 40);
        api.fail_cancel_for("stuck");

        let mut scheduler = scheduler(api.clone());
        let report = scheduler.run_cycle().await.unwrap();

        let labels: Vec<_> = report.results.iter().map(|r| r.outcome.label()).collect();
        assert_eq!(labels, vec!["failed", "quoted"]);
        assert_eq!(report.failures().count(), 1);

        let prices: Vec<_> = api
            .resting_orders("NFL-B-1")
            .iter()
            .map(|o| o.price)
            .collect();
        assert_eq!(prices, vec![30, 34]);
    }

    #[tokio::test]
    async fn order_book_failure_does_not_block_next_market() {
        let api = MockTradingApi::new();
        api.set_markets(vec![
            Market::new("NBA-A-1", "NBA-A", 60_000),
            Market::new("NFL-B-1", "NFL-B", 60_000),
        ]);
        api.set_order_book("NFL-B-1", &[(30, 10)], &[(34, 10)]);
        api.fail_order_book_for("NBA-A-1");

        let mut scheduler = scheduler(api.clone());
        let report = scheduler.run_cycle().await.unwrap();

        assert!(matches!(
            report.results[0].outcome,
            RefreshOutcome::Failed {
                stage: RefreshStage::OrderBook,
                ..
            }
        ));
        assert_eq!(report.results[1].outcome.label(), "quoted");
        assert_eq!(api.resting_orders("NFL-B-1").len(), 2);
    }

    #[tokio::test]
    async fn markets_are_refreshed_in_listing_order() {
        let api = MockTradingApi::new();
        api.set_markets(vec![
            Market::new("NHL-Z-1", "NHL-Z", 60_000),
            Market::new("NBA-A-1", "NBA-A", 60_000),
        ]);

        let mut scheduler = scheduler(api.clone());
        scheduler.run_cycle().await.unwrap();

        let books: Vec<_> = api
            .calls()
            .into_iter()
            .filter_map(|c| match c {
                ApiCall::GetOrderBook { ticker } => Some(ticker),
                _ => None,
            })
            .collect();
        assert_eq!(books, vec!["NHL-Z-1".to_string(), "NBA-A-1".to_string()]);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown_and_publishes_state() {
        let api = MockTradingApi::new();
        let state = AppState::new();
        let scheduler = scheduler(api.clone())
            .with_app_state(state.clone())
            .with_intervals(Duration::from_secs(3600), Duration::from_secs(3600));

        let (tx, rx) = shutdown_channel();
        let handle = tokio::spawn(scheduler.run(rx));

        // Wait for the first cycle to land, then stop during the sleep.
        for _ in 0..100 {
            if state.is_ready() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();

        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert!(state.is_ready());
        assert_eq!(state.stats.read().await.cycles_completed, 1);
    }

    #[tokio::test]
    async fn failed_cycles_retry_after_backoff() {
        let api = MockTradingApi::new();
        api.set_fail_listing(true);
        let state = AppState::new();
        let scheduler = scheduler(api.clone())
            .with_app_state(state.clone())
            .with_intervals(Duration::from_secs(3600), Duration::from_millis(5));

        let (tx, rx) = shutdown_channel();
        let handle = tokio::spawn(scheduler.run(rx));

        for _ in 0..100 {
            if state.stats.read().await.cycle_failures >= 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();

        let stats = state.stats.read().await;
        assert!(stats.cycle_failures >= 2);
        assert!(!state.is_ready());
        assert!(stats.last_error.is_some());
    }
}
