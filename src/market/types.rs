//! Market-related types for Kalshi binary-outcome markets.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lifecycle status of a market.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum MarketStatus {
    /// Open for trading.
    #[default]
    #[strum(to_string = "open", serialize = "active")]
    #[serde(alias = "active")]
    Open,
    /// No longer trading.
    #[strum(to_string = "closed", serialize = "settled", serialize = "determined")]
    #[serde(alias = "settled", alias = "determined", alias = "finalized")]
    Closed,
    /// Any status this client does not know about.
    #[serde(other)]
    Unknown,
}

/// Snapshot of one market, fetched fresh every cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Market {
    /// Market ticker (e.g., "NBA-LAL-BOS-LAL").
    pub ticker: String,
    /// Parent event ticker (e.g., "NBA-LAL-BOS").
    pub event_ticker: String,
    /// Cumulative contracts traded.
    #[serde(default)]
    pub volume: i64,
    /// Lifecycle status.
    #[serde(default)]
    pub status: MarketStatus,
}

impl Market {
    /// Create an open market snapshot.
    pub fn new(ticker: impl Into<String>, event_ticker: impl Into<String>, volume: i64) -> Self {
        Self {
            ticker: ticker.into(),
            event_ticker: event_ticker.into(),
            volume,
            status: MarketStatus::Open,
        }
    }
}

/// One page of the market listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MarketPage {
    /// Markets on this page.
    #[serde(default)]
    pub markets: Vec<Market>,
    /// Cursor for the next page; empty or absent at the end.
    #[serde(default)]
    pub cursor: Option<String>,
}

impl MarketPage {
    /// Next cursor, treating an empty string as the end of the listing.
    pub fn next_cursor(&self) -> Option<&str> {
        self.cursor.as_deref().filter(|c| !c.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn status_from_string_works() {
        assert_eq!(MarketStatus::from_str("open").unwrap(), MarketStatus::Open);
        assert_eq!(MarketStatus::from_str("active").unwrap(), MarketStatus::Open);
        assert_eq!(MarketStatus::from_str("settled").unwrap(), MarketStatus::Closed);
    }

    #[test]
    fn market_deserializes_from_listing() {
        let json = serde_json::json!({
            "ticker": "NBA-LAL-BOS-LAL",
            "event_ticker": "NBA-LAL-BOS",
            "volume": 61234,
            "status": "active",
            "yes_bid": 48
        });
        let market: Market = serde_json::from_value(json).unwrap();
        assert_eq!(market.ticker, "NBA-LAL-BOS-LAL");
        assert_eq!(market.volume, 61234);
        assert_eq!(market.status, MarketStatus::Open);
    }

    #[test]
    fn unknown_status_is_tolerated() {
        let json = serde_json::json!({
            "ticker": "T",
            "event_ticker": "E",
            "status": "paused"
        });
        let market: Market = serde_json::from_value(json).unwrap();
        assert_eq!(market.status, MarketStatus::Unknown);
        assert_eq!(market.volume, 0);
    }

    #[test]
    fn empty_cursor_ends_listing() {
        let page = MarketPage {
            markets: vec![],
            cursor: Some(String::new()),
        };
        assert_eq!(page.next_cursor(), None);

        let page = MarketPage {
            markets: vec![],
            cursor: Some("abc".to_string()),
        };
        assert_eq!(page.next_cursor(), Some("abc"));
    }
}
