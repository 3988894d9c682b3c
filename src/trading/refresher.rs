//! Per-market order reconciliation.
//!
//! One refresh of one market runs, strictly in order:
//! fetch book, quote, cancel every resting order, read position, place bid
//! and ask. A skipped quote ends the refresh before anything is canceled,
//! so existing orders stay on the book.

use serde::Serialize;
use strum::Display;
use tracing::{debug, info, instrument, warn};

use super::order::{OrderRequest, Side};
use super::position::{position_for, within_cap};
use crate::config::Config;
use crate::market::TradingApi;
use crate::metrics;
use crate::quote::{quote_book, Quote, QuoteParams, SkipReason};

/// Step of a refresh that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RefreshStage {
    /// Fetching the order book.
    OrderBook,
    /// Listing resting orders.
    OpenOrders,
    /// Cancelling resting orders.
    Cancel,
    /// Reading positions.
    Positions,
    /// Placing the new quote.
    Placement,
}

/// Result of refreshing one market.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
    /// Both sides placed.
    Quoted {
        /// Quote that was placed.
        quote: Quote,
        /// Position at placement time.
        position: i64,
        /// Orders canceled before placing.
        canceled: usize,
    },
    /// One side placed, the other rejected.
    PartiallyQuoted {
        /// Quote that was attempted.
        quote: Quote,
        /// Position at placement time.
        position: i64,
        /// Orders canceled before placing.
        canceled: usize,
        /// Side that failed.
        failed_side: Side,
        /// Why it failed.
        reason: String,
    },
    /// Position at or beyond the cap; resting orders canceled, nothing placed.
    CapReached {
        /// Current position.
        position: i64,
        /// Orders canceled.
        canceled: usize,
    },
    /// Book not quotable; resting orders left alone.
    Skipped {
        /// Why the market was not quoted.
        reason: SkipReason,
    },
    /// Something failed for this market.
    Failed {
        /// Step that failed.
        stage: RefreshStage,
        /// Error description.
        reason: String,
    },
}

impl RefreshOutcome {
    /// Short label for logs and metrics.
    pub fn label(&self) -> &'static str {
        match self {
            RefreshOutcome::Quoted { .. } => "quoted",
            RefreshOutcome::PartiallyQuoted { .. } => "partially_quoted",
            RefreshOutcome::CapReached { .. } => "cap_reached",
            RefreshOutcome::Skipped { .. } => "skipped",
            RefreshOutcome::Failed { .. } => "failed",
        }
    }

    /// Whether any new order went on the book.
    pub fn placed_orders(&self) -> bool {
        matches!(
            self,
            RefreshOutcome::Quoted { .. } | RefreshOutcome::PartiallyQuoted { .. }
        )
    }

    fn failed(stage: RefreshStage, reason: impl ToString) -> Self {
        RefreshOutcome::Failed {
            stage,
            reason: reason.to_string(),
        }
    }
}

/// Reconciles resting orders for one market at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderRefresher {
    params: QuoteParams,
    order_size: i64,
    max_position: i64,
}

impl OrderRefresher {
    /// Create a refresher.
    pub fn new(params: QuoteParams, order_size: i64, max_position: i64) -> Self {
        Self {
            params,
            order_size,
            max_position,
        }
    }

    /// Build from configuration.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            QuoteParams::from_config(config),
            config.order_size,
            config.max_position_per_market,
        )
    }

    /// Refresh one market. Never fails; errors come back as [`RefreshOutcome::Failed`].
    #[instrument(skip(self, api))]
    pub async fn refresh<A: TradingApi + ?Sized>(&self, api: &A, ticker: &str) -> RefreshOutcome {
        let outcome = self.reconcile(api, ticker).await;
        log_outcome(ticker, &outcome);
        outcome
    }

    async fn reconcile<A: TradingApi + ?Sized>(&self, api: &A, ticker: &str) -> RefreshOutcome {
        let book = match api.get_order_book(ticker).await {
            Ok(book) => book,
            Err(e) => return RefreshOutcome::failed(RefreshStage::OrderBook, e),
        };

        let quote = match quote_book(&book, self.params) {
            Ok(quote) => quote,
            Err(reason) => return RefreshOutcome::Skipped { reason },
        };

        let canceled = match self.cancel_resting(api, ticker).await {
            Ok(canceled) => canceled,
            Err(outcome) => return outcome,
        };

        let position = match api.get_positions().await {
            Ok(positions) => position_for(&positions, ticker),
            Err(e) => return RefreshOutcome::failed(RefreshStage::Positions, e),
        };

        if !within_cap(position, self.max_position) {
            return RefreshOutcome::CapReached { position, canceled };
        }

        let bid = api
            .create_order(&OrderRequest::buy(ticker, quote.bid, self.order_size))
            .await;
        let ask = api
            .create_order(&OrderRequest::sell(ticker, quote.ask, self.order_size))
            .await;

        match (bid, ask) {
            (Ok(bid_id), Ok(ask_id)) => {
                debug!(%bid_id, %ask_id, "Placed both sides");
                RefreshOutcome::Quoted {
                    quote,
                    position,
                    canceled,
                }
            }
            (Ok(_), Err(e)) => RefreshOutcome::PartiallyQuoted {
                quote,
                position,
                canceled,
                failed_side: Side::Sell,
                reason: e.to_string(),
            },
            (Err(e), Ok(_)) => RefreshOutcome::PartiallyQuoted {
                quote,
                position,
                canceled,
                failed_side: Side::Buy,
                reason: e.to_string(),
            },
            (Err(bid_err), Err(ask_err)) => RefreshOutcome::failed(
                RefreshStage::Placement,
                format!("bid: {}; ask: {}", bid_err, ask_err),
            ),
        }
    }

    /// Cancel every resting order for the ticker.
    ///
    /// All cancels are attempted. Orders already gone count as handled.
    /// Any other failure fails the refresh so no new quote overlaps a
    /// stale one.
    async fn cancel_resting<A: TradingApi + ?Sized>(
        &self,
        api: &A,
        ticker: &str,
    ) -> Result<usize, RefreshOutcome> {
        let orders = api
            .get_open_orders(ticker)
            .await
            .map_err(|e| RefreshOutcome::failed(RefreshStage::OpenOrders, e))?;

        let mut canceled = 0;
        let mut failures = Vec::new();

        for order in &orders {
            match api.cancel_order(&order.order_id).await {
                Ok(()) => canceled += 1,
                Err(e) if e.is_not_found() => {
                    debug!(order_id = %order.order_id, "Order already gone");
                }
                Err(e) => {
                    metrics::inc_cancel_failures();
                    warn!(order_id = %order.order_id, error = %e, "Cancel failed");
                    failures.push(e.to_string());
                }
            }
        }

        if failures.is_empty() {
            Ok(canceled)
        } else {
            Err(RefreshOutcome::failed(
                RefreshStage::Cancel,
                failures.join("; "),
            ))
        }
    }
}

fn log_outcome(ticker: &str, outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Quoted {
            quote, position, ..
        } => info!(
            ticker,
            mid = quote.mid,
            bid = quote.bid,
            ask = quote.ask,
            position,
            "Quoted"
        ),
        RefreshOutcome::PartiallyQuoted {
            quote,
            position,
            failed_side,
            reason,
            ..
        } => warn!(
            ticker,
            mid = quote.mid,
            bid = quote.bid,
            ask = quote.ask,
            position,
            %failed_side,
            reason = %reason,
            "Partially quoted"
        ),
        RefreshOutcome::CapReached { position, canceled } => {
            info!(ticker, position, canceled, "Position cap reached, not quoting")
        }
        RefreshOutcome::Skipped { reason } => {
            debug!(ticker, reason = %reason, "Skipped, resting orders left in place")
        }
        RefreshOutcome::Failed { stage, reason } => {
            warn!(ticker, %stage, reason = %reason, "Refresh failed")
        }
    }
}
