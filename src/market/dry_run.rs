//! Dry-run wrapper (reads go to the exchange, writes are only logged).

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tracing::info;

use super::exchange::TradingApi;
use super::types::{MarketPage, MarketStatus};
use crate::error::{MarketError, TradingError};
use crate::orderbook::OrderBook;
use crate::trading::order::{Order, OrderRequest};
use crate::trading::position::Position;

/// Wraps a [`TradingApi`] and suppresses order mutations.
#[derive(Debug)]
pub struct DryRunClient<A> {
    inner: A,
    next_id: AtomicU64,
}

impl<A: TradingApi> DryRunClient<A> {
    /// Wrap a client.
    pub fn new(inner: A) -> Self {
        Self {
            inner,
            next_id: AtomicU64::new(0),
        }
    }
}

#[async_trait]
impl<A: TradingApi> TradingApi for DryRunClient<A> {
    async fn get_balance(&self) -> Result<i64, TradingError> {
        self.inner.get_balance().await
    }

    async fn list_markets(
        &self,
        status: MarketStatus,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MarketPage, MarketError> {
        self.inner.list_markets(status, limit, cursor).await
    }

    async fn get_order_book(&self, ticker: &str) -> Result<OrderBook, MarketError> {
        self.inner.get_order_book(ticker).await
    }

    async fn get_open_orders(&self, ticker: &str) -> Result<Vec<Order>, TradingError> {
        self.inner.get_open_orders(ticker).await
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TradingError> {
        info!(order_id, "[DRY] Would cancel order");
        Ok(())
    }

    async fn get_positions(&self) -> Result<Vec<Position>, TradingError> {
        self.inner.get_positions().await
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String, TradingError> {
        request.validate().map_err(TradingError::InvalidParams)?;

        let seq = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            ticker = %request.ticker,
            side = %request.side,
            price = request.price,
            size = request.size,
            "[DRY] Would place order"
        );
        Ok(format!("dry-run-{}", seq))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::mock::{ApiCall, MockTradingApi};
    use crate::trading::order::Side;
    use tokio_test::{assert_err, assert_ok};

    #[tokio::test]
    async fn reads_pass_through_writes_do_not() {
        let mock = MockTradingApi::new();
        mock.set_balance(500);
        mock.add_resting("o1", "NBA-A", Side::Buy, 48);
        let api = DryRunClient::new(mock.clone());

        assert_eq!(api.get_balance().await.unwrap(), 500);
        assert_ok!(api.cancel_order("o1").await);
        let id = api
            .create_order(&OrderRequest::sell("NBA-A", 52, 20))
            .await
            .unwrap();

        assert_eq!(id, "dry-run-1");
        assert_eq!(mock.calls(), vec![ApiCall::GetBalance]);
        assert_eq!(mock.resting_orders("NBA-A").len(), 1);
    }

    #[tokio::test]
    async fn invalid_orders_are_still_rejected() {
        let api = DryRunClient::new(MockTradingApi::new());
        assert_err!(api.create_order(&OrderRequest::buy("NBA-A", 0, 20)).await);
    }
}
