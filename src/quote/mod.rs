//! Quote module.
//!
//! Pure calculation of the two-sided quote from a market's best bid/ask.

pub mod calculator;

pub use calculator::{compute_quote, mid_price, quote_book, Quote, QuoteParams, SkipReason};
