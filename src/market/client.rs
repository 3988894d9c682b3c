//! Kalshi trade API client.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tracing::{debug, instrument, warn};

use super::exchange::TradingApi;
use super::types::{MarketPage, MarketStatus};
use crate::config::Config;
use crate::error::{BotError, MarketError, TradingError};
use crate::metrics;
use crate::orderbook::{OrderBook, PriceLevel};
use crate::signing::KalshiSigner;
use crate::trading::order::{Order, OrderKind, OrderRequest, OrderStatus, Side};
use crate::trading::position::Position;

/// Page size used when walking orders and positions.
const PORTFOLIO_PAGE_LIMIT: &str = "200";

static CLIENT_ORDER_SEQ: AtomicU64 = AtomicU64::new(0);

/// Kalshi REST client.
#[derive(Debug, Clone)]
pub struct KalshiClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL including the API prefix (e.g. ".../trade-api/v2").
    base_url: String,
    /// Path component of the base URL, prepended to signed paths.
    path_prefix: String,
    /// Request signer; unsigned requests when absent.
    signer: Option<KalshiSigner>,
}

/// Balance response from API.
#[derive(Debug, Clone, Deserialize)]
pub struct BalanceResponse {
    /// Cash balance in cents.
    pub balance: i64,
}

/// Order book envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderBookEnvelope {
    /// The book.
    pub orderbook: OrderBookResponse,
}

/// Order book response; each side lists `[price, quantity]` bids.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OrderBookResponse {
    /// Bids for yes.
    #[serde(default)]
    pub yes: Option<Vec<[i64; 2]>>,
    /// Bids for no.
    #[serde(default)]
    pub no: Option<Vec<[i64; 2]>>,
}

/// Order as returned by the portfolio endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiOrder {
    /// Order ID.
    pub order_id: String,
    /// Market ticker.
    pub ticker: String,
    /// Buy or sell.
    pub action: Side,
    /// Yes price in cents.
    #[serde(default)]
    pub yes_price: i64,
    /// Unfilled contracts.
    #[serde(default)]
    pub remaining_count: i64,
    /// Order status.
    pub status: OrderStatus,
}

impl From<ApiOrder> for Order {
    fn from(order: ApiOrder) -> Self {
        Order {
            order_id: order.order_id,
            ticker: order.ticker,
            side: order.action,
            price: order.yes_price,
            size: order.remaining_count,
            status: order.status,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OrdersResponse {
    #[serde(default)]
    orders: Vec<ApiOrder>,
    #[serde(default)]
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PositionsResponse {
    #[serde(default)]
    market_positions: Vec<Position>,
    #[serde(default)]
    cursor: Option<String>,
}

/// Order creation request body.
#[derive(Debug, Clone, Serialize)]
pub struct CreateOrderBody<'a> {
    /// Market ticker.
    pub ticker: &'a str,
    /// Buy or sell.
    pub action: Side,
    /// Contract side; always "yes".
    pub side: &'static str,
    /// Order type.
    #[serde(rename = "type")]
    pub kind: OrderKind,
    /// Number of contracts.
    pub count: i64,
    /// Yes price in cents.
    pub yes_price: i64,
    /// Idempotency key.
    pub client_order_id: String,
}

#[derive(Debug, Deserialize)]
struct CreateOrderResponse {
    order: CreatedOrder,
}

#[derive(Debug, Deserialize)]
struct CreatedOrder {
    order_id: String,
}

/// A failed request before it is mapped onto a domain error.
#[derive(Debug)]
enum RequestFailure {
    Http(reqwest::Error),
    Status {
        status: StatusCode,
        body: String,
        retry_after: Option<u64>,
    },
    Parse(String),
}

impl RequestFailure {
    fn into_market_error(self, resource: &str) -> MarketError {
        match self {
            RequestFailure::Http(e) => MarketError::HttpError(e),
            RequestFailure::Parse(reason) => MarketError::ParseError(reason),
            RequestFailure::Status { status, .. }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                MarketError::AuthenticationFailed(format!("HTTP {}", status))
            }
            RequestFailure::Status {
                status,
                retry_after,
                ..
            } if status == StatusCode::TOO_MANY_REQUESTS => MarketError::RateLimited {
                retry_after_seconds: retry_after.unwrap_or(1),
            },
            RequestFailure::Status { status, body, .. } => MarketError::FetchFailed {
                resource: resource.to_string(),
                reason: format!("HTTP {} - {}", status, body),
            },
        }
    }

    fn into_trading_error(self) -> TradingError {
        match self {
            RequestFailure::Http(e) => TradingError::HttpError(e),
            RequestFailure::Parse(reason) => TradingError::ParseError(reason),
            RequestFailure::Status { status, body, .. }
                if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN =>
            {
                TradingError::AuthenticationFailed(format!("HTTP {} - {}", status, body))
            }
            RequestFailure::Status {
                status,
                retry_after,
                ..
            } if status == StatusCode::TOO_MANY_REQUESTS => TradingError::RateLimited {
                retry_after_seconds: retry_after.unwrap_or(1),
            },
            RequestFailure::Status { status, body, .. } => {
                if body.contains("insufficient_balance") {
                    TradingError::InsufficientBalance(body)
                } else {
                    TradingError::OrderRejected {
                        status: status.as_u16(),
                        reason: body,
                    }
                }
            }
        }
    }
}

impl KalshiClient {
    /// Create a client from config, loading the signing key if configured.
    pub fn new(config: &Config) -> Result<Self, BotError> {
        let signer = match (&config.kalshi_api_key_id, config.private_key_pem()?) {
            (Some(key_id), Some(pem)) => Some(KalshiSigner::from_pem(key_id.clone(), &pem)?),
            _ => None,
        };

        Self::with_signer(
            config.base_url(),
            signer,
            Duration::from_millis(config.http_timeout_ms),
        )
    }

    /// Create a client for an explicit base URL.
    pub fn with_signer(
        base_url: &str,
        signer: Option<KalshiSigner>,
        timeout: Duration,
    ) -> Result<Self, BotError> {
        let parsed = reqwest::Url::parse(base_url)
            .map_err(|e| BotError::InvalidConfig(format!("bad base url {}: {}", base_url, e)))?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .tcp_keepalive(Duration::from_secs(30))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            path_prefix: parsed.path().trim_end_matches('/').to_string(),
            signer,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Whether requests are signed.
    pub fn is_authenticated(&self) -> bool {
        self.signer.is_some()
    }

    /// Full path that is signed for an endpoint.
    fn signed_path(&self, path: &str) -> String {
        format!("{}{}", self.path_prefix, path)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<T, RequestFailure> {
        let start = Instant::now();
        let url = format!("{}{}", self.base_url, path);

        let mut request = self.http.request(method.clone(), &url).query(query);
        if let Some(signer) = &self.signer {
            for (name, value) in signer.auth_headers(method.as_str(), &self.signed_path(path)) {
                request = request.header(name, value);
            }
        }
        if let Some(body) = body {
            request = request.json(&body);
        }

        let response = request.send().await.map_err(RequestFailure::Http)?;
        metrics::record_http_latency(start, endpoint_label(path));

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse().ok());
            let body = response.text().await.unwrap_or_default();
            debug!(%status, path, "Request failed");
            return Err(RequestFailure::Status {
                status,
                body,
                retry_after,
            });
        }

        let bytes = response.bytes().await.map_err(RequestFailure::Http)?;
        if bytes.is_empty() {
            return serde_json::from_slice(b"null")
                .map_err(|e| RequestFailure::Parse(format!("{}: {}", path, e)));
        }
        serde_json::from_slice(&bytes)
            .map_err(|e| RequestFailure::Parse(format!("{}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, RequestFailure> {
        self.request(Method::GET, path, query, None).await
    }
}

/// Collapse ticker/order-id path segments so metric labels stay bounded.
fn endpoint_label(path: &str) -> &'static str {
    if path.starts_with("/markets/") {
        "orderbook"
    } else if path.starts_with("/markets") {
        "markets"
    } else if path.starts_with("/portfolio/balance") {
        "balance"
    } else if path.starts_with("/portfolio/positions") {
        "positions"
    } else if path.starts_with("/portfolio/orders") {
        "orders"
    } else {
        "other"
    }
}

/// Convert the raw two-sided bids into a yes book.
///
/// Kalshi publishes bids only; a no bid at `p` is a yes ask at `100 - p`.
pub fn convert_order_book(ticker: &str, response: OrderBookResponse) -> OrderBook {
    let to_levels = |levels: Option<Vec<[i64; 2]>>, invert: bool| -> Vec<PriceLevel> {
        levels
            .unwrap_or_default()
            .into_iter()
            .map(|[price, size]| {
                let price = if invert { 100 - price } else { price };
                PriceLevel::new(price, size)
            })
            .filter(PriceLevel::is_tradable)
            .collect()
    };

    OrderBook {
        ticker: ticker.to_string(),
        bids: to_levels(response.yes, false),
        asks: to_levels(response.no, true),
        updated_at: OffsetDateTime::now_utc(),
    }
}

fn next_client_order_id() -> String {
    let seq = CLIENT_ORDER_SEQ.fetch_add(1, Ordering::Relaxed);
    format!(
        "kalshi-mm-{}-{}",
        OffsetDateTime::now_utc().unix_timestamp_nanos(),
        seq
    )
}

fn non_empty(cursor: Option<String>) -> Option<String> {
    cursor.filter(|c| !c.is_empty())
}

#[async_trait]
impl TradingApi for KalshiClient {
    #[instrument(skip(self))]
    async fn get_balance(&self) -> Result<i64, TradingError> {
        let response: BalanceResponse = self
            .get("/portfolio/balance", &[])
            .await
            .map_err(RequestFailure::into_trading_error)?;

        debug!(balance_cents = response.balance, "Retrieved balance");
        Ok(response.balance)
    }

    #[instrument(skip(self))]
    async fn list_markets(
        &self,
        status: MarketStatus,
        limit: u32,
        cursor: Option<&str>,
    ) -> Result<MarketPage, MarketError> {
        let mut query = vec![("status", status.to_string()), ("limit", limit.to_string())];
        if let Some(cursor) = cursor {
            query.push(("cursor", cursor.to_string()));
        }

        self.get("/markets", &query)
            .await
            .map_err(|e| e.into_market_error("markets"))
    }

    #[instrument(skip(self))]
    async fn get_order_book(&self, ticker: &str) -> Result<OrderBook, MarketError> {
        let start = Instant::now();
        let path = format!("/markets/{}/orderbook", ticker);

        let envelope: OrderBookEnvelope = self
            .get(&path, &[])
            .await
            .map_err(|e| e.into_market_error(ticker))?;

        metrics::record_orderbook_fetch_latency(start);
        Ok(convert_order_book(ticker, envelope.orderbook))
    }

    #[instrument(skip(self))]
    async fn get_open_orders(&self, ticker: &str) -> Result<Vec<Order>, TradingError> {
        let mut orders = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![
                ("ticker", ticker.to_string()),
                ("status", OrderStatus::Resting.to_string()),
                ("limit", PORTFOLIO_PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: OrdersResponse = self
                .get("/portfolio/orders", &query)
                .await
                .map_err(RequestFailure::into_trading_error)?;

            orders.extend(
                page.orders
                    .into_iter()
                    .map(Order::from)
                    .filter(|o| o.status.is_open() && o.ticker == ticker),
            );

            cursor = non_empty(page.cursor);
            if cursor.is_none() {
                break;
            }
        }

        debug!(count = orders.len(), "Retrieved open orders");
        Ok(orders)
    }

    #[instrument(skip(self))]
    async fn cancel_order(&self, order_id: &str) -> Result<(), TradingError> {
        let path = format!("/portfolio/orders/{}", order_id);

        match self
            .request::<serde_json::Value>(Method::DELETE, &path, &[], None)
            .await
        {
            Ok(_) => {
                metrics::inc_orders_canceled();
                Ok(())
            }
            Err(RequestFailure::Status { status, .. }) if status == StatusCode::NOT_FOUND => {
                Err(TradingError::NotFound {
                    order_id: order_id.to_string(),
                })
            }
            Err(e) => {
                let reason = e.into_trading_error();
                warn!(order_id, error = %reason, "Failed to cancel order");
                Err(match reason {
                    TradingError::OrderRejected { status, reason } => TradingError::CancelFailed {
                        order_id: order_id.to_string(),
                        reason: format!("HTTP {} - {}", status, reason),
                    },
                    other => other,
                })
            }
        }
    }

    #[instrument(skip(self))]
    async fn get_positions(&self) -> Result<Vec<Position>, TradingError> {
        let mut positions = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let mut query = vec![("limit", PORTFOLIO_PAGE_LIMIT.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let page: PositionsResponse = self
                .get("/portfolio/positions", &query)
                .await
                .map_err(RequestFailure::into_trading_error)?;

            positions.extend(page.market_positions);

            cursor = non_empty(page.cursor);
            if cursor.is_none() {
                break;
            }
        }

        debug!(count = positions.len(), "Retrieved positions");
        Ok(positions)
    }

    #[instrument(
        skip(self, request),
        fields(ticker = %request.ticker, side = %request.side, price = request.price)
    )]
    async fn create_order(&self, request: &OrderRequest) -> Result<String, TradingError> {
        request.validate().map_err(TradingError::InvalidParams)?;

        let body = CreateOrderBody {
            ticker: &request.ticker,
            action: request.side,
            side: "yes",
            kind: request.kind,
            count: request.size,
            yes_price: request.price,
            client_order_id: next_client_order_id(),
        };

        let body = serde_json::to_value(&body)
            .map_err(|e| TradingError::InvalidParams(format!("unencodable order: {}", e)))?;

        let start = Instant::now();
        let result: Result<CreateOrderResponse, _> = self
            .request(Method::POST, "/portfolio/orders", &[], Some(body))
            .await;
        metrics::record_order_submit_latency(start);

        match result {
            Ok(response) => {
                metrics::inc_orders_submitted();
                debug!(order_id = %response.order.order_id, "Order placed");
                Ok(response.order.order_id)
            }
            Err(e) => {
                metrics::inc_orders_failed();
                Err(match e.into_trading_error() {
                    TradingError::OrderRejected { reason, .. }
                        if reason.contains("invalid_price") =>
                    {
                        TradingError::InvalidPrice {
                            price: request.price,
                        }
                    }
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation_works() {
        let config = Config::default();
        let client = KalshiClient::new(&config).unwrap();
        assert_eq!(client.base_url(), crate::config::DEMO_BASE_URL);
        assert_eq!(client.path_prefix, "/trade-api/v2");
        assert!(!client.is_authenticated());
        assert_eq!(
            client.signed_path("/portfolio/balance"),
            "/trade-api/v2/portfolio/balance"
        );
    }

    #[test]
    fn bad_base_url_is_rejected() {
        let result = KalshiClient::with_signer("not a url", None, Duration::from_secs(1));
        assert!(matches!(result, Err(BotError::InvalidConfig(_))));
    }

    #[test]
    fn order_book_converts_no_bids_to_yes_asks() {
        let response: OrderBookEnvelope = serde_json::from_value(serde_json::json!({
            "orderbook": {
                "yes": [[45, 100], [48, 20]],
                "no": [[50, 30], [48, 10]]
            }
        }))
        .unwrap();

        let book = convert_order_book("NBA-LAL-BOS-LAL", response.orderbook);
        assert_eq!(book.best_bid(), Some(48));
        // no bids at 50 and 48 become yes asks at 50 and 52
        assert_eq!(book.best_ask(), Some(50));
        assert_eq!(book.asks.len(), 2);
    }

    #[test]
    fn order_book_tolerates_null_sides() {
        let response: OrderBookEnvelope = serde_json::from_value(serde_json::json!({
            "orderbook": { "yes": null, "no": [[40, 5]] }
        }))
        .unwrap();

        let book = convert_order_book("T", response.orderbook);
        assert!(book.bids.is_empty());
        assert_eq!(book.best_ask(), Some(60));
    }

    #[test]
    fn api_order_converts() {
        let api: ApiOrder = serde_json::from_value(serde_json::json!({
            "order_id": "ord-1",
            "ticker": "NBA-LAL-BOS-LAL",
            "side": "yes",
            "action": "sell",
            "yes_price": 52,
            "remaining_count": 20,
            "status": "resting"
        }))
        .unwrap();

        let order = Order::from(api);
        assert_eq!(order.side, Side::Sell);
        assert_eq!(order.price, 52);
        assert_eq!(order.status, OrderStatus::Resting);
    }

    #[test]
    fn create_order_body_shape() {
        let body = CreateOrderBody {
            ticker: "NBA-LAL-BOS-LAL",
            action: Side::Buy,
            side: "yes",
            kind: OrderKind::Limit,
            count: 20,
            yes_price: 48,
            client_order_id: "id".to_string(),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["action"], "buy");
        assert_eq!(json["type"], "limit");
        assert_eq!(json["yes_price"], 48);
    }

    #[test]
    fn status_failures_map_to_domain_errors() {
        let auth = RequestFailure::Status {
            status: StatusCode::UNAUTHORIZED,
            body: String::new(),
            retry_after: None,
        };
        assert!(matches!(
            auth.into_trading_error(),
            TradingError::AuthenticationFailed(_)
        ));

        let limited = RequestFailure::Status {
            status: StatusCode::TOO_MANY_REQUESTS,
            body: String::new(),
            retry_after: Some(7),
        };
        assert!(matches!(
            limited.into_market_error("markets"),
            MarketError::RateLimited {
                retry_after_seconds: 7
            }
        ));

        let broke = RequestFailure::Status {
            status: StatusCode::BAD_REQUEST,
            body: r#"{"error":{"code":"insufficient_balance"}}"#.to_string(),
            retry_after: None,
        };
        assert!(matches!(
            broke.into_trading_error(),
            TradingError::InsufficientBalance(_)
        ));
    }

    #[test]
    fn endpoint_labels_are_bounded() {
        assert_eq!(endpoint_label("/markets"), "markets");
        assert_eq!(endpoint_label("/markets/NBA-X/orderbook"), "orderbook");
        assert_eq!(endpoint_label("/portfolio/orders/abc"), "orders");
    }

    #[test]
    fn client_order_ids_are_unique() {
        assert_ne!(next_client_order_id(), next_client_order_id());
    }
}
