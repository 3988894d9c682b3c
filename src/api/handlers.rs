//! HTTP API handlers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use tokio::sync::RwLock;

use crate::scheduler::CycleReport;

/// Running totals published by the scheduler.
#[derive(Debug, Clone, Default)]
pub struct BotStats {
    /// Cycles that completed.
    pub cycles_completed: u64,
    /// Cycles aborted by a systemic failure.
    pub cycle_failures: u64,
    /// The most recent completed cycle.
    pub last_report: Option<CycleReport>,
    /// The most recent systemic failure.
    pub last_error: Option<String>,
}

/// Application state shared with handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Whether a cycle has completed.
    pub ready: Arc<AtomicBool>,
    /// Trading mode label.
    pub mode: &'static str,
    /// Cycle statistics.
    pub stats: Arc<RwLock<BotStats>>,
}

impl AppState {
    /// Create new app state.
    pub fn new() -> Self {
        Self::with_mode("DEMO")
    }

    /// Create app state reporting the given trading mode.
    pub fn with_mode(mode: &'static str) -> Self {
        Self {
            ready: Arc::new(AtomicBool::new(false)),
            mode,
            stats: Arc::new(RwLock::new(BotStats::default())),
        }
    }

    /// Set ready state.
    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Check if ready.
    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    /// Record a completed cycle.
    pub async fn record_cycle(&self, report: CycleReport) {
        let mut stats = self.stats.write().await;
        stats.cycles_completed += 1;
        stats.last_report = Some(report);
        stats.last_error = None;
        drop(stats);
        self.set_ready(true);
    }

    /// Record a cycle that failed before any market was refreshed.
    pub async fn record_failure(&self, error: String) {
        let mut stats = self.stats.write().await;
        stats.cycle_failures += 1;
        stats.last_error = Some(error);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Status: "ok".
    pub status: &'static str,
}

/// Readiness check response.
#[derive(Debug, Serialize)]
pub struct ReadyResponse {
    /// Whether a cycle has completed.
    pub ready: bool,
    /// Completed cycles.
    pub cycles_completed: u64,
}

/// Status response.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// Service status.
    pub status: &'static str,
    /// Trading mode.
    pub mode: &'static str,
    /// Completed cycles.
    pub cycles_completed: u64,
    /// Failed cycles.
    pub cycle_failures: u64,
    /// Last systemic failure, cleared by the next good cycle.
    pub last_error: Option<String>,
    /// The most recent cycle.
    pub last_cycle: Option<CycleReport>,
}

/// Health check handler - always returns 200.
pub async fn health() -> impl IntoResponse {
    Json(HealthResponse { status: "ok" })
}

/// Readiness check handler - returns 200 if ready, 503 otherwise.
pub async fn ready(State(state): State<AppState>) -> impl IntoResponse {
    let is_ready = state.is_ready();
    let cycles_completed = state.stats.read().await.cycles_completed;

    let response = ReadyResponse {
        ready: is_ready,
        cycles_completed,
    };

    if is_ready {
        (StatusCode::OK, Json(response))
    } else {
        (StatusCode::SERVICE_UNAVAILABLE, Json(response))
    }
}

/// Status handler - returns the last cycle summary.
pub async fn status(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.stats.read().await.clone();

    let status = match (&stats.last_error, state.is_ready()) {
        (Some(_), _) => "degraded",
        (None, true) => "running",
        (None, false) => "starting",
    };

    Json(StatusResponse {
        status,
        mode: state.mode,
        cycles_completed: stats.cycles_completed,
        cycle_failures: stats.cycle_failures,
        last_error: stats.last_error,
        last_cycle: stats.last_report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn app_state_ready_toggle() {
        let state = AppState::new();
        assert!(!state.is_ready());

        state.set_ready(true);
        assert!(state.is_ready());

        state.set_ready(false);
        assert!(!state.is_ready());
    }

    #[tokio::test]
    async fn failure_then_success_clears_error() {
        let state = AppState::new();
        state.record_failure("listing down".to_string()).await;
        assert!(!state.is_ready());
        assert_eq!(state.stats.read().await.cycle_failures, 1);

        state
            .record_cycle(CycleReport {
                cycle: 2,
                started_at: time::OffsetDateTime::now_utc(),
                balance: rust_decimal::Decimal::ZERO,
                results: Vec::new(),
                duration_ms: 3,
            })
            .await;

        let stats = state.stats.read().await;
        assert!(state.is_ready());
        assert_eq!(stats.cycles_completed, 1);
        assert!(stats.last_error.is_none());
    }
}
