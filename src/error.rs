//! Unified error types for the quoting bot.

use thiserror::Error;

/// Unified error type for the quoting bot.
#[derive(Error, Debug)]
pub enum BotError {
    /// Configuration loading error.
    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    /// Configuration failed validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Market-related error.
    #[error("market error: {0}")]
    Market(#[from] MarketError),

    /// Trading/order error.
    #[error("trading error: {0}")]
    Trading(#[from] TradingError),

    /// HTTP request error.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Market listing and order book errors.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Failed to fetch market information.
    #[error("failed to fetch {resource}: {reason}")]
    FetchFailed {
        /// What was being fetched (a ticker or "markets").
        resource: String,
        /// Reason for failure.
        reason: String,
    },

    /// Authentication was rejected.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limited by the API.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// Failed to parse market data.
    #[error("failed to parse market data: {0}")]
    ParseError(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

/// Balance, order, and position errors.
#[derive(Error, Debug)]
pub enum TradingError {
    /// The order no longer exists (already filled or cancelled).
    #[error("order {order_id} not found")]
    NotFound {
        /// Order ID that was not found.
        order_id: String,
    },

    /// Failed to cancel order.
    #[error("failed to cancel order {order_id}: {reason}")]
    CancelFailed {
        /// Order ID that failed to cancel.
        order_id: String,
        /// Reason for failure.
        reason: String,
    },

    /// Exchange rejected the price.
    #[error("invalid price: {price}¢")]
    InvalidPrice {
        /// Rejected price in cents.
        price: i64,
    },

    /// Not enough cash to rest the order.
    #[error("insufficient balance: {0}")]
    InsufficientBalance(String),

    /// Invalid order parameters.
    #[error("invalid order parameters: {0}")]
    InvalidParams(String),

    /// Signing error.
    #[error("signing error: {0}")]
    SigningError(String),

    /// Authentication failed.
    #[error("authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Rate limited by the API.
    #[error("rate limited: retry after {retry_after_seconds}s")]
    RateLimited {
        /// Seconds to wait before retrying.
        retry_after_seconds: u64,
    },

    /// Order rejected by the exchange.
    #[error("order rejected: HTTP {status} - {reason}")]
    OrderRejected {
        /// HTTP status code.
        status: u16,
        /// Rejection reason from the exchange.
        reason: String,
    },

    /// Failed to parse a response.
    #[error("failed to parse response: {0}")]
    ParseError(String),

    /// HTTP request failed.
    #[error("http request failed: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl TradingError {
    /// Whether this error means the order is already gone.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TradingError::NotFound { .. })
    }
}

/// Convenient Result type alias.
pub type Result<T> = std::result::Result<T, BotError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_detected() {
        let err = TradingError::NotFound {
            order_id: "abc".to_string(),
        };
        assert!(err.is_not_found());
        assert!(!TradingError::InvalidPrice { price: 0 }.is_not_found());
    }

    #[test]
    fn bot_error_wraps_market_error() {
        let err: BotError = MarketError::ParseError("bad cursor".to_string()).into();
        assert_eq!(
            err.to_string(),
            "market error: failed to parse market data: bad cursor"
        );
    }
}
