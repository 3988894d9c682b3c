//! Order book types and data structures.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Lowest tradable price in cents.
pub const MIN_PRICE_CENTS: i64 = 1;
/// Highest tradable price in cents.
pub const MAX_PRICE_CENTS: i64 = 99;

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price in cents (1..=99).
    pub price: i64,
    /// Contracts resting at this price.
    pub size: i64,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: i64, size: i64) -> Self {
        Self { price, size }
    }

    /// Whether the price lies on the tradable 1..=99 scale.
    pub fn is_tradable(&self) -> bool {
        (MIN_PRICE_CENTS..=MAX_PRICE_CENTS).contains(&self.price) && self.size > 0
    }
}

/// "Yes"-side book for one market.
///
/// Levels are not assumed to be sorted; best prices are computed.
#[derive(Debug, Clone)]
pub struct OrderBook {
    /// Market ticker this book represents.
    pub ticker: String,
    /// Yes bid levels.
    pub bids: Vec<PriceLevel>,
    /// Yes ask levels.
    pub asks: Vec<PriceLevel>,
    /// When this snapshot was taken.
    pub updated_at: OffsetDateTime,
}

impl OrderBook {
    /// Create an empty book for a ticker.
    pub fn empty(ticker: impl Into<String>) -> Self {
        Self {
            ticker: ticker.into(),
            bids: Vec::new(),
            asks: Vec::new(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Highest bid price.
    pub fn best_bid(&self) -> Option<i64> {
        self.bids.iter().map(|l| l.price).max()
    }

    /// Lowest ask price.
    pub fn best_ask(&self) -> Option<i64> {
        self.asks.iter().map(|l| l.price).min()
    }

    /// Get the spread between best bid and ask.
    pub fn spread(&self) -> Option<i64> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }
}
