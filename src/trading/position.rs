//! Position tracking.

use serde::Deserialize;

/// Net holding in one market (positive = long yes).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Position {
    /// Market ticker.
    pub ticker: String,
    /// Signed contract count.
    #[serde(default)]
    pub position: i64,
}

impl Position {
    /// Create a new position.
    pub fn new(ticker: impl Into<String>, position: i64) -> Self {
        Self {
            ticker: ticker.into(),
            position,
        }
    }

    /// Check if the position is flat.
    pub fn is_flat(&self) -> bool {
        self.position == 0
    }
}

/// Position for a ticker from a full snapshot; absent means flat.
pub fn position_for(positions: &[Position], ticker: &str) -> i64 {
    positions
        .iter()
        .find(|p| p.ticker == ticker)
        .map(|p| p.position)
        .unwrap_or(0)
}

/// Whether a market may still be quoted under the cap.
pub fn within_cap(position: i64, max_position: i64) -> bool {
    position.unsigned_abs() < max_position.unsigned_abs()
}
