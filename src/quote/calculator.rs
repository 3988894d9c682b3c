//! Symmetric quote calculation around the mid-price.

use std::fmt;

use serde::Serialize;

use crate::config::Config;
use crate::orderbook::{OrderBook, MAX_PRICE_CENTS, MIN_PRICE_CENTS};

/// Quoting parameters, in cents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QuoteParams {
    /// Distance between the mid and each side of the quote.
    pub spread_cents: i64,
    /// Widest book spread that is still quoted.
    pub max_spread_cents: i64,
}

impl QuoteParams {
    /// Build parameters from config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            spread_cents: config.spread_cents,
            max_spread_cents: config.max_spread_cents,
        }
    }
}

/// Two-sided quote for one market.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Quote {
    /// Observed mid-price.
    pub mid: i64,
    /// Our bid in cents.
    pub bid: i64,
    /// Our ask in cents.
    pub ask: i64,
}

/// Why a market was not quoted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// No resting bids.
    NoBids,
    /// No resting asks.
    NoAsks,
    /// Book spread above the sanity ceiling.
    SpreadTooWide {
        /// Observed spread.
        spread: i64,
        /// Configured ceiling.
        max: i64,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NoBids => write!(f, "no bids"),
            SkipReason::NoAsks => write!(f, "no asks"),
            SkipReason::SpreadTooWide { spread, max } => {
                write!(f, "spread {}¢ wider than {}¢", spread, max)
            }
        }
    }
}

/// Floor of the average of best bid and best ask.
pub fn mid_price(best_bid: i64, best_ask: i64) -> i64 {
    (best_bid + best_ask).div_euclid(2)
}

/// Compute a symmetric quote, or the reason not to quote.
pub fn compute_quote(
    best_bid: Option<i64>,
    best_ask: Option<i64>,
    params: QuoteParams,
) -> Result<Quote, SkipReason> {
    let best_bid = best_bid.ok_or(SkipReason::NoBids)?;
    let best_ask = best_ask.ok_or(SkipReason::NoAsks)?;

    let spread = best_ask - best_bid;
    if spread > params.max_spread_cents {
        return Err(SkipReason::SpreadTooWide {
            spread,
            max: params.max_spread_cents,
        });
    }

    let mid = mid_price(best_bid, best_ask);
    Ok(Quote {
        mid,
        bid: (mid - params.spread_cents).max(MIN_PRICE_CENTS),
        ask: (mid + params.spread_cents).min(MAX_PRICE_CENTS),
    })
}

/// Compute a quote from a book's best bid and ask.
pub fn quote_book(book: &OrderBook, params: QuoteParams) -> Result<Quote, SkipReason> {
    compute_quote(book.best_bid(), book.best_ask(), params)
}
