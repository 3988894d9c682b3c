//! In-memory trading API for unit testing.
//!
//! [`MockTradingApi`] serves canned markets, books, orders and positions,
//! applies order mutations to its own state, and records every call so
//! tests can assert on call sequences.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use time::OffsetDateTime;

use super::exchange::TradingApi;
use super::types::{Market, MarketPage, MarketStatus};
use crate::error::{MarketError, TradingError};
use crate::orderbook::{OrderBook, PriceLevel};
use crate::trading::order::{Order, OrderRequest, OrderStatus, Side};
use crate::trading::position::Position;

/// A recorded call against the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApiCall {
    /// `get_balance`.
    GetBalance,
    /// `list_markets` with the cursor that was sent.
    ListMarkets {
        /// Cursor argument.
        cursor: Option<String>,
    },
    /// `get_order_book`.
    GetOrderBook {
        /// Market ticker.
        ticker: String,
    },
    /// `get_open_orders`.
    GetOpenOrders {
        /// Market ticker.
        ticker: String,
    },
    /// `cancel_order`.
    CancelOrder {
        /// Order ID.
        order_id: String,
    },
    /// `get_positions`.
    GetPositions,
    /// `create_order`.
    CreateOrder {
        /// Market ticker.
        ticker: String,
        /// Buy or sell.
        side: Side,
        /// Yes price in cents.
        price: i64,
        /// Contracts.
        size: i64,
    },
}

impl ApiCall {
    /// Whether the call touches orders or positions.
    pub fn is_order_or_position(&self) -> bool {
        matches!(
            self,
            ApiCall::GetOpenOrders { .. }
                | ApiCall::CancelOrder { .. }
                | ApiCall::GetPositions
                | ApiCall::CreateOrder { .. }
        )
    }
}

/// Configuration for mock client behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Balance to return, in cents.
    pub balance: i64,
    /// Whether to fail balance requests.
    pub fail_balance: bool,
    /// Whether to fail market listing requests.
    pub fail_listing: bool,
    /// Whether to fail order book requests.
    pub fail_order_book: bool,
    /// Whether to fail open-order requests.
    pub fail_open_orders: bool,
    /// Whether to fail position requests.
    pub fail_positions: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

#[derive(Debug, Default)]
struct MockState {
    config: MockConfig,
    pages: Vec<MarketPage>,
    books: HashMap<String, OrderBook>,
    orders: Vec<Order>,
    positions: Vec<Position>,
    fail_books: HashSet<String>,
    fail_cancel: HashSet<String>,
    vanished: HashSet<String>,
    fail_create: HashSet<Side>,
    calls: Vec<ApiCall>,
    next_order_id: u64,
}

/// Mock trading API for testing.
#[derive(Debug, Clone, Default)]
pub struct MockTradingApi {
    state: Arc<Mutex<MockState>>,
}

impl MockTradingApi {
    /// Create a new mock with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        let api = Self::new();
        api.state().config = config;
        api
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Set the mock balance in cents.
    pub fn set_balance(&self, cents: i64) {
        self.state().config.balance = cents;
    }

    /// Fail balance requests.
    pub fn set_fail_balance(&self, fail: bool) {
        self.state().config.fail_balance = fail;
    }

    /// Fail market listing requests.
    pub fn set_fail_listing(&self, fail: bool) {
        self.state().config.fail_listing = fail;
    }

    /// Fail order book requests.
    pub fn set_fail_order_book(&self, fail: bool) {
        self.state().config.fail_order_book = fail;
    }

    /// Fail open-order requests.
    pub fn set_fail_open_orders(&self, fail: bool) {
        self.state().config.fail_open_orders = fail;
    }

    /// Fail position requests.
    pub fn set_fail_positions(&self, fail: bool) {
        self.state().config.fail_positions = fail;
    }

    /// Serve these markets as a single listing page.
    pub fn set_markets(&self, markets: Vec<Market>) {
        self.state().pages = vec![MarketPage {
            markets,
            cursor: None,
        }];
    }

    /// Append a listing page. Page `n` is served for the cursor of page `n - 1`.
    pub fn push_market_page(&self, page: MarketPage) {
        self.state().pages.push(page);
    }

    /// Set the book for a ticker from best-first `(price, size)` levels.
    pub fn set_order_book(&self, ticker: &str, bids: &[(i64, i64)], asks: &[(i64, i64)]) {
        let level = |&(price, size): &(i64, i64)| PriceLevel::new(price, size);
        let book = OrderBook {
            ticker: ticker.to_string(),
            bids: bids.iter().map(level).collect(),
            asks: asks.iter().map(level).collect(),
            updated_at: OffsetDateTime::now_utc(),
        };
        self.state().books.insert(ticker.to_string(), book);
    }

    /// Add a resting order.
    pub fn add_order(&self, order: Order) {
        self.state().orders.push(order);
    }

    /// Add a resting order with a generated fill-in for the other fields.
    pub fn add_resting(&self, order_id: &str, ticker: &str, side: Side, price: i64) {
        self.add_order(Order {
            order_id: order_id.to_string(),
            ticker: ticker.to_string(),
            side,
            price,
            size: 1,
            status: OrderStatus::Resting,
        });
    }

    /// Set the signed position for a ticker.
    pub fn set_position(&self, ticker: &str, position: i64) {
        let mut state = self.state();
        state.positions.retain(|p| p.ticker != ticker);
        state.positions.push(Position::new(ticker, position));
    }

    /// Fail order book requests for one ticker only.
    pub fn fail_order_book_for(&self, ticker: &str) {
        self.state().fail_books.insert(ticker.to_string());
    }

    /// Make cancelling this order fail with a non-`NotFound` error.
    pub fn fail_cancel_for(&self, order_id: &str) {
        self.state().fail_cancel.insert(order_id.to_string());
    }

    /// Keep listing this order as resting but answer `NotFound` on cancel,
    /// as when it fills between the listing and the cancel.
    pub fn vanish_on_cancel(&self, order_id: &str) {
        self.state().vanished.insert(order_id.to_string());
    }

    /// Make placing orders on this side fail.
    pub fn fail_create_for(&self, side: Side) {
        self.state().fail_create.insert(side);
    }

    /// All recorded calls, in order.
    pub fn calls(&self) -> Vec<ApiCall> {
        self.state().calls.clone()
    }

    /// Clear recorded calls.
    pub fn clear_calls(&self) {
        self.state().calls.clear();
    }

    /// Orders currently resting for a ticker.
    pub fn resting_orders(&self, ticker: &str) -> Vec<Order> {
        self.state()
            .orders
            .iter()
            .filter(|o| o.ticker == ticker && o.status.is_open())
            .cloned()
            .collect()
    }

    async fn enter(&self, call: ApiCall) -> MockConfig {
        let config = {
            let mut state = self.state();
            state.calls.push(call);
            state.config.clone()
        };
        if config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(config.latency_ms)).await;
        }
        config
    }
}

#[async_trait]
impl TradingApi for MockTradingApi {
    async fn get_balance(&self) -> Result<i64, TradingError> {
        let config = self.enter(ApiCall::GetBalance).await;
        if config.fail_balance {
            return Err(TradingError::AuthenticationFailed(
                "Mock balance failure".to_string(),
            ));
        }
        Ok(config.balance)
    }

    async fn list_markets(
        &self,
        _status: MarketStatus,
        _limit: u32,
        cursor: Option<&str>,
    ) -> Result<MarketPage, MarketError> {
        let config = self
            .enter(ApiCall::ListMarkets {
                cursor: cursor.map(str::to_string),
            })
            .await;
        if config.fail_listing {
            return Err(MarketError::FetchFailed {
                resource: "markets".to_string(),
                reason: "Mock listing failure".to_string(),
            });
        }

        let state = self.state();
        let index = match cursor {
            None => Some(0),
            Some(c) => state
                .pages
                .iter()
                .position(|p| p.next_cursor() == Some(c))
                .map(|i| i + 1),
        };

        Ok(index
            .and_then(|i| state.pages.get(i))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_order_book(&self, ticker: &str) -> Result<OrderBook, MarketError> {
        let config = self
            .enter(ApiCall::GetOrderBook {
                ticker: ticker.to_string(),
            })
            .await;
        if config.fail_order_book || self.state().fail_books.contains(ticker) {
            return Err(MarketError::FetchFailed {
                resource: ticker.to_string(),
                reason: "Mock order book failure".to_string(),
            });
        }

        Ok(self
            .state()
            .books
            .get(ticker)
            .cloned()
            .unwrap_or_else(|| OrderBook::empty(ticker)))
    }

    async fn get_open_orders(&self, ticker: &str) -> Result<Vec<Order>, TradingError> {
        let config = self
            .enter(ApiCall::GetOpenOrders {
                ticker: ticker.to_string(),
            })
            .await;
        if config.fail_open_orders {
            return Err(TradingError::ParseError("Mock open orders failure".to_string()));
        }
        Ok(self.resting_orders(ticker))
    }

    async fn cancel_order(&self, order_id: &str) -> Result<(), TradingError> {
        self.enter(ApiCall::CancelOrder {
            order_id: order_id.to_string(),
        })
        .await;

        let mut state = self.state();
        if state.fail_cancel.contains(order_id) {
            return Err(TradingError::CancelFailed {
                order_id: order_id.to_string(),
                reason: "Mock cancel failure".to_string(),
            });
        }
        if state.vanished.contains(order_id) {
            return Err(TradingError::NotFound {
                order_id: order_id.to_string(),
            });
        }

        match state
            .orders
            .iter_mut()
            .find(|o| o.order_id == order_id && o.status.is_open())
        {
            Some(order) => {
                order.status = OrderStatus::Canceled;
                Ok(())
            }
            None => Err(TradingError::NotFound {
                order_id: order_id.to_string(),
            }),
        }
    }

    async fn get_positions(&self) -> Result<Vec<Position>, TradingError> {
        let config = self.enter(ApiCall::GetPositions).await;
        if config.fail_positions {
            return Err(TradingError::ParseError("Mock positions failure".to_string()));
        }
        Ok(self.state().positions.clone())
    }

    async fn create_order(&self, request: &OrderRequest) -> Result<String, TradingError> {
        self.enter(ApiCall::CreateOrder {
            ticker: request.ticker.clone(),
            side: request.side,
            price: request.price,
            size: request.size,
        })
        .await;

        request.validate().map_err(TradingError::InvalidParams)?;

        let mut state = self.state();
        if state.fail_create.contains(&request.side) {
            return Err(TradingError::InsufficientBalance(
                "Mock create failure".to_string(),
            ));
        }

        state.next_order_id += 1;
        let order_id = format!("mock-{}", state.next_order_id);
        state.orders.push(Order {
            order_id: order_id.clone(),
            ticker: request.ticker.clone(),
            side: request.side,
            price: request.price,
            size: request.size,
            status: OrderStatus::Resting,
        });
        Ok(order_id)
    }
}
