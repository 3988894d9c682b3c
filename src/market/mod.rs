//! Market module for Kalshi sports markets.
//!
//! This module handles:
//! - Market snapshot types
//! - Candidate selection (prefix allowlist and volume threshold)
//! - The [`TradingApi`] collaborator and its implementations
//!   (live REST client, dry-run wrapper, in-memory mock)

pub mod client;
pub mod dry_run;
pub mod exchange;
pub mod filter;
pub mod mock;
pub mod types;

pub use client::KalshiClient;
pub use dry_run::DryRunClient;
pub use exchange::TradingApi;
pub use filter::{discover_markets, MarketFilter};
pub use mock::{ApiCall, MockConfig, MockTradingApi};
pub use types::{Market, MarketPage, MarketStatus};
