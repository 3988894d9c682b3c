//! Trading module for order management.
//!
//! This module handles:
//! - Order types and creation
//! - Position lookup and the per-market cap
//! - Per-market order refresh

pub mod order;
pub mod position;
pub mod refresher;

pub use order::{Order, OrderKind, OrderRequest, OrderStatus, Side};
pub use position::{position_for, within_cap, Position};
pub use refresher::{OrderRefresher, RefreshOutcome, RefreshStage};
