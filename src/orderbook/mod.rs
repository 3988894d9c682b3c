//! Order book module for market data.
//!
//! Books are fetched fresh every cycle; only the best bid and best ask
//! feed the quote.

pub mod types;

pub use types::{OrderBook, PriceLevel, MAX_PRICE_CENTS, MIN_PRICE_CENTS};
