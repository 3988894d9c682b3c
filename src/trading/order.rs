//! Order types and creation.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::orderbook::{MAX_PRICE_CENTS, MIN_PRICE_CENTS};

/// Order action on the "yes" contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy yes contracts (our bid).
    #[strum(to_string = "buy", serialize = "BUY")]
    Buy,
    /// Sell yes contracts (our ask).
    #[strum(to_string = "sell", serialize = "SELL")]
    Sell,
}

/// Order type.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    /// Rests on the book at a fixed price.
    #[default]
    #[strum(serialize = "limit")]
    Limit,
}

/// Order status from API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Accepted but not yet on the book.
    #[strum(serialize = "pending")]
    Pending,
    /// Resting on the book.
    #[strum(to_string = "resting", serialize = "open")]
    #[serde(alias = "open")]
    Resting,
    /// Fully filled.
    #[strum(to_string = "executed", serialize = "filled")]
    #[serde(alias = "filled")]
    Executed,
    /// Cancelled.
    #[strum(to_string = "canceled", serialize = "cancelled")]
    #[serde(alias = "cancelled")]
    Canceled,
}

impl OrderStatus {
    /// Check if the order is still working on the book.
    pub fn is_open(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Resting)
    }
}

/// An order owned by the exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    /// Exchange order ID.
    pub order_id: String,
    /// Market ticker.
    pub ticker: String,
    /// Buy or sell.
    pub side: Side,
    /// Yes price in cents.
    pub price: i64,
    /// Remaining contracts.
    pub size: i64,
    /// Current status.
    pub status: OrderStatus,
}

/// Order parameters for submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderRequest {
    /// Market ticker.
    pub ticker: String,
    /// Buy or sell.
    pub side: Side,
    /// Order type.
    pub kind: OrderKind,
    /// Yes price in cents.
    pub price: i64,
    /// Number of contracts.
    pub size: i64,
}

impl OrderRequest {
    /// Create a limit buy.
    pub fn buy(ticker: impl Into<String>, price: i64, size: i64) -> Self {
        Self {
            ticker: ticker.into(),
            side: Side::Buy,
            kind: OrderKind::Limit,
            price,
            size,
        }
    }

    /// Create a limit sell.
    pub fn sell(ticker: impl Into<String>, price: i64, size: i64) -> Self {
        Self {
            ticker: ticker.into(),
            side: Side::Sell,
            kind: OrderKind::Limit,
            price,
            size,
        }
    }

    /// Validate order parameters.
    pub fn validate(&self) -> Result<(), String> {
        if self.ticker.is_empty() {
            return Err("ticker is required".to_string());
        }
        if !(MIN_PRICE_CENTS..=MAX_PRICE_CENTS).contains(&self.price) {
            return Err(format!("price {}¢ outside 1..=99", self.price));
        }
        if self.size <= 0 {
            return Err("size must be positive".to_string());
        }
        Ok(())
    }
}
