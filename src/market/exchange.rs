//! The exchange operations the bot depends on.

use std::sync::Arc;

use async_trait::async_trait;

use super::types::{MarketPage, MarketStatus};
use crate::error::{MarketError, TradingError};
use crate::orderbook::OrderBook;
use crate::trading::order::{Order, OrderRequest};
use crate::trading::position::Position;

/// Trading API collaborator.
///
/// Implemented by the live [`KalshiClient`](super::KalshiClient), the
/// [`DryRunClient`](super::DryRunClient) wrapper, and the test mock.
#[async_trait]
pub trait TradingApi: Send + Sync {
    /// Cash balance in cents.
    async fn get_balance(&self) -> Result<i64, TradingError>;

    /// One page of the market listing.
    async fn list_markets(
        &self,
        status: MarketStatus,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MarketPage, MarketError>;

    /// Yes-side book for a market.
    async fn get_order_book(&self, ticker: &str) -> Result<OrderBook, MarketError>;

    /// Resting orders for a market.
    async fn get_open_orders(&self, ticker: &str) -> Result<Vec<Order>, TradingError>;

    /// Cancel one order. Fails with `NotFound` if it is already gone.
    async fn cancel_order(&self, order_id: &str) -> Result<(), TradingError>;

    /// Full position snapshot across all markets.
    async fn get_positions(&self) -> Result<Vec<Position>, TradingError>;

    /// Place an order, returning its id.
    async fn create_order(&self, request: &OrderRequest) -> Result<String, TradingError>;
}

#[async_trait]
impl<T: TradingApi + ?Sized> TradingApi for Arc<T> {
    async fn get_balance(&self) -> Result<i64, TradingError> {
        (**self).get_balance().await
    }

    async fn list_markets(
        &self,
        status: MarketStatus,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MarketPage, MarketError> {
        (**self).list_markets(status, limit, cursor).await
    }

    async fn get_order_book(&self, ticker: &str) -> Result<OrderBook, MarketError> {
        (**self).get_order_book(ticker).await
    }

    async fn get_open_orders(&self, ticker: &str) -> Result<Vec<Order>, TradingError> {
        (**self).get_open_orders(ticker).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TradingError> {
        (**self).cancel_order(order_id).await
    }

    async fn get_positions(&self) -> Result<Vec<Position>, TradingError> {
        (**self).get_positions().await
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String, TradingError> {
        (**self).create_order(request).await
    }
}
