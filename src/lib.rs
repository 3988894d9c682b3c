//! Kalshi sports market-making bot.
//!
//! This library quotes both sides of liquid sports-event markets on Kalshi:
//! every cycle it lists open markets, keeps the ones whose event ticker
//! matches a league prefix and whose volume clears a liquidity floor, and
//! re-centres a resting bid/ask pair around each market's mid-price.
//!
//! # Strategy
//!
//! Prices are integer cents on the 1..=99 scale of a binary contract:
//!
//! ```text
//! best bid:  48¢
//! best ask:  52¢
//! ─────────────────────
//! mid:       50¢  (floor of the average)
//! quote:     48¢ / 52¢  (mid ∓ SPREAD_CENTS, clamped to 1..=99)
//! ```
//!
//! Markets with an empty book side or a spread wider than the sanity ceiling
//! are left alone. A market whose position has reached the cap has its
//! resting orders cancelled and no new ones placed.
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from environment
//! - [`error`]: Unified error types
//! - [`market`]: Market types, filtering, and the Kalshi client
//! - [`orderbook`]: Order book snapshot and best bid/ask
//! - [`quote`]: Quote computation around the mid-price
//! - [`trading`]: Order types, positions, and the per-market refresher
//! - [`scheduler`]: The periodic refresh cycle
//! - [`signing`]: Request signing
//! - [`metrics`]: Prometheus metrics
//! - [`api`]: HTTP API for health/status
//! - [`utils`]: Utility functions

pub mod api;
pub mod config;
pub mod error;
pub mod market;
pub mod metrics;
pub mod orderbook;
pub mod quote;
pub mod scheduler;
pub mod signing;
pub mod trading;
pub mod utils;

pub use config::Config;
pub use error::{BotError, Result};
