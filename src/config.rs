//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;

/// Kalshi demo environment base URL.
pub const DEMO_BASE_URL: &str = "https://demo.api.kalshi.com/trade-api/v2";

/// Kalshi production base URL.
pub const LIVE_BASE_URL: &str = "https://api.kalshi.com/trade-api/v2";

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Kalshi Connection ===
    /// Use the demo environment instead of live trading.
    #[serde(default = "default_true")]
    pub kalshi_demo: bool,

    /// Explicit API base URL (overrides demo/live selection).
    #[serde(default)]
    pub kalshi_base_url: Option<String>,

    /// API key identifier.
    #[serde(default)]
    pub kalshi_api_key_id: Option<String>,

    /// Path to the RSA private key PEM file.
    #[serde(default)]
    pub kalshi_private_key_path: Option<String>,

    /// Inline RSA private key PEM (alternative to the path).
    #[serde(default)]
    pub kalshi_private_key: Option<String>,

    // === Market Selection ===
    /// Event ticker prefixes to quote (comma-separated in the environment).
    #[serde(default = "default_prefixes")]
    pub target_event_prefixes: Vec<String>,

    /// Minimum traded volume for a market to be quoted (inclusive).
    #[serde(default = "default_min_volume")]
    pub min_volume: i64,

    /// Page size for the market listing.
    #[serde(default = "default_page_limit")]
    pub market_page_limit: u32,

    // === Quoting Parameters ===
    /// Distance in cents between the mid and each side of the quote.
    #[serde(default = "default_spread_cents")]
    pub spread_cents: i64,

    /// Widest book spread, in cents, that is still quoted.
    #[serde(default = "default_max_spread_cents")]
    pub max_spread_cents: i64,

    /// Contracts per order.
    #[serde(default = "default_order_size")]
    pub order_size: i64,

    /// Absolute position at which quoting stops for a market.
    #[serde(default = "default_max_position")]
    pub max_position_per_market: i64,

    // === Scheduling ===
    /// Seconds between refresh cycles.
    #[serde(default = "default_refresh_seconds")]
    pub refresh_seconds: u64,

    /// Seconds to back off after a cycle-level failure.
    #[serde(default = "default_error_backoff")]
    pub error_backoff_seconds: u64,

    // === Operation Modes ===
    /// Log order mutations instead of sending them.
    #[serde(default)]
    pub dry_run: bool,

    /// Per-request HTTP timeout in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    // === Server Configuration ===
    /// HTTP server port for health/status endpoints.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Enable the Prometheus exporter.
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    /// Port for the Prometheus exporter.
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,

    /// Emit logs as JSON.
    #[serde(default)]
    pub log_json: bool,
}

fn default_true() -> bool {
    true
}

fn default_prefixes() -> Vec<String> {
    ["NBA-", "NFL-", "NHL-", "MLB-", "CFB-", "CBB-", "WNBA-", "SOCCER-"]
        .iter()
        .map(|p| p.to_string())
        .collect()
}

fn default_min_volume() -> i64 {
    50_000
}

fn default_page_limit() -> u32 {
    500
}

fn default_spread_cents() -> i64 {
    2
}

fn default_max_spread_cents() -> i64 {
    20
}

fn default_order_size() -> i64 {
    20
}

fn default_max_position() -> i64 {
    1000
}

fn default_refresh_seconds() -> u64 {
    45
}

fn default_error_backoff() -> u64 {
    60
}

fn default_http_timeout() -> u64 {
    10_000
}

fn default_port() -> u16 {
    8080
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            kalshi_demo: true,
            kalshi_base_url: None,
            kalshi_api_key_id: None,
            kalshi_private_key_path: None,
            kalshi_private_key: None,
            target_event_prefixes: default_prefixes(),
            min_volume: default_min_volume(),
            market_page_limit: default_page_limit(),
            spread_cents: default_spread_cents(),
            max_spread_cents: default_max_spread_cents(),
            order_size: default_order_size(),
            max_position_per_market: default_max_position(),
            refresh_seconds: default_refresh_seconds(),
            error_backoff_seconds: default_error_backoff(),
            dry_run: false,
            http_timeout_ms: default_http_timeout(),
            port: default_port(),
            metrics_enabled: true,
            metrics_port: default_metrics_port(),
            rust_log: default_log_level(),
            log_json: false,
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if !self.kalshi_demo && !self.has_credentials() {
            return Err(
                "live trading requires KALSHI_API_KEY_ID and KALSHI_PRIVATE_KEY_PATH (or KALSHI_PRIVATE_KEY)"
                    .to_string(),
            );
        }

        if self.kalshi_api_key_id.is_some() != self.has_key_material() {
            return Err("KALSHI_API_KEY_ID and the private key must be set together".to_string());
        }

        if !(1..=49).contains(&self.spread_cents) {
            return Err("SPREAD_CENTS must be between 1 and 49".to_string());
        }

        if !(1..=98).contains(&self.max_spread_cents) {
            return Err("MAX_SPREAD_CENTS must be between 1 and 98".to_string());
        }

        if self.order_size <= 0 {
            return Err("ORDER_SIZE must be positive".to_string());
        }

        if self.max_position_per_market <= 0 {
            return Err("MAX_POSITION_PER_MARKET must be positive".to_string());
        }

        if self.min_volume < 0 {
            return Err("MIN_VOLUME must not be negative".to_string());
        }

        if self.refresh_seconds == 0 {
            return Err("REFRESH_SECONDS must be at least 1".to_string());
        }

        if self.market_page_limit == 0 {
            return Err("MARKET_PAGE_LIMIT must be at least 1".to_string());
        }

        if self.target_event_prefixes.iter().all(|p| p.trim().is_empty()) {
            return Err("TARGET_EVENT_PREFIXES must name at least one prefix".to_string());
        }

        Ok(())
    }

    /// Base URL of the trade API for the selected environment.
    pub fn base_url(&self) -> &str {
        match &self.kalshi_base_url {
            Some(url) => url,
            None if self.kalshi_demo => DEMO_BASE_URL,
            None => LIVE_BASE_URL,
        }
    }

    /// Check if both the key id and key material are configured.
    pub fn has_credentials(&self) -> bool {
        self.kalshi_api_key_id.is_some() && self.has_key_material()
    }

    fn has_key_material(&self) -> bool {
        self.kalshi_private_key.is_some() || self.kalshi_private_key_path.is_some()
    }

    /// Read the private key PEM, inline value first, then the file.
    pub fn private_key_pem(&self) -> std::io::Result<Option<String>> {
        if let Some(pem) = &self.kalshi_private_key {
            return Ok(Some(pem.clone()));
        }
        match &self.kalshi_private_key_path {
            Some(path) => std::fs::read_to_string(path).map(Some),
            None => Ok(None),
        }
    }

    /// Human-readable trading mode.
    pub fn mode_label(&self) -> &'static str {
        match (self.kalshi_demo, self.dry_run) {
            (_, true) => "DRY RUN",
            (true, false) => "DEMO",
            (false, false) => "LIVE TRADING",
        }
    }

    /// Interval between successful cycles.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_seconds)
    }

    /// Pause after a cycle-level failure.
    pub fn error_backoff(&self) -> Duration {
        Duration::from_secs(self.error_backoff_seconds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_sensible() {
        let config = Config::default();
        assert_eq!(config.spread_cents, 2);
        assert_eq!(config.order_size, 20);
        assert_eq!(config.refresh_seconds, 45);
        assert_eq!(config.min_volume, 50_000);
        assert_eq!(config.max_position_per_market, 1000);
        assert_eq!(config.max_spread_cents, 20);
        assert_eq!(config.error_backoff(), Duration::from_secs(60));
        assert!(config.target_event_prefixes.contains(&"NBA-".to_string()));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn demo_selects_demo_url() {
        let config = Config::default();
        assert_eq!(config.base_url(), DEMO_BASE_URL);

        let live = Config {
            kalshi_demo: false,
            ..Config::default()
        };
        assert_eq!(live.base_url(), LIVE_BASE_URL);

        let overridden = Config {
            kalshi_base_url: Some("http://localhost:9999".to_string()),
            ..Config::default()
        };
        assert_eq!(overridden.base_url(), "http://localhost:9999");
    }

    #[test]
    fn validate_rejects_live_without_credentials() {
        let config = Config {
            kalshi_demo: false,
            ..Config::default()
        };
        assert!(config.validate().is_err());

        let with_creds = Config {
            kalshi_demo: false,
            kalshi_api_key_id: Some("key-id".to_string()),
            kalshi_private_key_path: Some("/tmp/key.pem".to_string()),
            ..Config::default()
        };
        assert!(with_creds.validate().is_ok());
    }

    #[test]
    fn validate_rejects_half_configured_credentials() {
        let config = Config {
            kalshi_api_key_id: Some("key-id".to_string()),
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_quoting_parameters() {
        let zero_spread = Config {
            spread_cents: 0,
            ..Config::default()
        };
        assert!(zero_spread.validate().is_err());

        let zero_size = Config {
            order_size: 0,
            ..Config::default()
        };
        assert!(zero_size.validate().is_err());

        let no_prefixes = Config {
            target_event_prefixes: vec![String::new()],
            ..Config::default()
        };
        assert!(no_prefixes.validate().is_err());
    }

    #[test]
    fn inline_key_wins_over_path() {
        let config = Config {
            kalshi_private_key: Some("PEM".to_string()),
            kalshi_private_key_path: Some("/does/not/exist".to_string()),
            ..Config::default()
        };
        assert_eq!(config.private_key_pem().unwrap(), Some("PEM".to_string()));
    }

    #[test]
    fn mode_label_reflects_flags() {
        assert_eq!(Config::default().mode_label(), "DEMO");
        let dry = Config {
            dry_run: true,
            ..Config::default()
        };
        assert_eq!(dry.mode_label(), "DRY RUN");
    }
}
