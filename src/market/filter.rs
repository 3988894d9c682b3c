//! Candidate selection for quoting.
//!
//! Walks the open-market listing page by page and keeps the markets whose
//! event ticker starts with an allowed league prefix and whose volume meets
//! the liquidity threshold.

use tracing::{debug, info, instrument};

use super::exchange::TradingApi;
use super::types::{Market, MarketStatus};
use crate::config::Config;
use crate::error::MarketError;

/// Prefix allowlist plus minimum volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketFilter {
    /// Allowed event ticker prefixes.
    pub prefixes: Vec<String>,
    /// Minimum traded volume (inclusive).
    pub min_volume: i64,
}

impl MarketFilter {
    /// Create a filter.
    pub fn new(prefixes: Vec<String>, min_volume: i64) -> Self {
        Self {
            prefixes: prefixes
                .into_iter()
                .map(|p| p.trim().to_string())
                .filter(|p| !p.is_empty())
                .collect(),
            min_volume,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.target_event_prefixes.clone(), config.min_volume)
    }

    /// Check if a market is a quoting candidate.
    pub fn matches(&self, market: &Market) -> bool {
        self.prefixes
            .iter()
            .any(|prefix| market.event_ticker.starts_with(prefix.as_str()))
            && market.volume >= self.min_volume
    }
}

/// Fetch every open market and keep the ones the filter accepts.
///
/// Pagination is followed until the listing returns an empty or missing
/// cursor. Listing order is preserved. No matches is an empty vec, not an
/// error.
#[instrument(skip(api, filter))]
pub async fn discover_markets<A: TradingApi + ?Sized>(
    api: &A,
    filter: &MarketFilter,
    page_limit: u32,
) -> Result<Vec<Market>, MarketError> {
    let mut candidates = Vec::new();
    let mut cursor: Option<String> = None;
    let mut scanned = 0usize;
    let mut pages = 0usize;

    loop {
        let page = api
            .list_markets(MarketStatus::Open, page_limit, cursor.as_deref())
            .await?;
        pages += 1;
        scanned += page.markets.len();

        let next = page.next_cursor().map(str::to_string);
        candidates.extend(page.markets.into_iter().filter(|m| filter.matches(m)));

        debug!(page = pages, matched = candidates.len(), "Scanned market page");

        match next {
            Some(next) if Some(&next) != cursor.as_ref() => cursor = Some(next),
            _ => break,
        }
    }

    info!(
        scanned,
        pages,
        candidates = candidates.len(),
        "Market discovery complete"
    );
    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::mock::{ApiCall, MockTradingApi};
    use crate::market::types::MarketPage;
    use pretty_assertions::assert_eq;

    fn filter() -> MarketFilter {
        MarketFilter::new(vec!["NBA-".to_string(), "NFL-".to_string()], 50_000)
    }

    #[test]
    fn excludes_unlisted_prefix_regardless_of_volume() {
        let tennis = Market::new("TENNIS-X-A", "TENNIS-X", 10_000_000);
        assert!(!filter().matches(&tennis));
    }

    #[test]
    fn volume_threshold_is_inclusive() {
        assert!(filter().matches(&Market::new("NBA-LAL-BOS-LAL", "NBA-LAL-BOS", 50_000)));
        assert!(!filter().matches(&Market::new("NBA-LAL-BOS-LAL", "NBA-LAL-BOS", 49_999)));
    }

    #[test]
    fn blank_prefixes_are_dropped() {
        let filter = MarketFilter::new(vec![" ".to_string(), " NHL-".to_string()], 0);
        assert_eq!(filter.prefixes, vec!["NHL-".to_string()]);
        assert!(!filter.matches(&Market::new("MLB-X", "MLB-X", 1)));
    }

    #[tokio::test]
    async fn follows_cursor_to_exhaustion() {
        let api = MockTradingApi::new();
        api.push_market_page(MarketPage {
            markets: vec![
                Market::new("NBA-A-1", "NBA-A", 60_000),
                Market::new("TENNIS-B-1", "TENNIS-B", 90_000),
            ],
            cursor: Some("p2".to_string()),
        });
        api.push_market_page(MarketPage {
            markets: vec![
                Market::new("NFL-C-1", "NFL-C", 50_000),
                Market::new("NBA-D-1", "NBA-D", 10),
            ],
            cursor: Some(String::new()),
        });

        let markets = discover_markets(&api, &filter(), 500).await.unwrap();
        let tickers: Vec<_> = markets.iter().map(|m| m.ticker.as_str()).collect();
        assert_eq!(tickers, vec!["NBA-A-1", "NFL-C-1"]);

        assert_eq!(
            api.calls(),
            vec![
                ApiCall::ListMarkets { cursor: None },
                ApiCall::ListMarkets {
                    cursor: Some("p2".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn empty_listing_is_not_an_error() {
        let api = MockTradingApi::new();
        let markets = discover_markets(&api, &filter(), 500).await.unwrap();
        assert!(markets.is_empty());
    }

    #[tokio::test]
    async fn listing_failure_propagates() {
        let api = MockTradingApi::new();
        api.set_fail_listing(true);
        assert!(discover_markets(&api, &filter(), 500).await.is_err());
    }
}
