//! Configuration parsing for the feed runner.
//!
//! Settings come from a single JSON file. Only `exchanges` and `symbols` are
//! required; every tuning block falls back to its defaults.
//!
//! # Example config
//!
//! ```json
//! {
//!   "logging": { "module_name": "mx-runner", "log_path": "/tmp/log" },
//!   "exchanges": ["binance", "okx"],
//!   "symbols": ["BTCUSDT", "ETHUSDT"],
//!   "endpoints": { "binance": "wss://stream.binance.com:443/ws" },
//!   "retry": { "base_delay_ms": 5000, "max_delay_ms": 60000 },
//!   "error_log": { "burst": 3, "every_nth": 50, "window_ms": 120000 },
//!   "status_interval_sec": 10,
//!   "stale_after_sec": 60
//! }
//! ```

use std::collections::HashMap;

use serde::Deserialize;

use crate::error::MxError;
use crate::retry::RetryPolicy;
use crate::throttle::ThrottleConfig;
use crate::types::normalize_symbol;

/// Top-level application config, deserialized from a JSON file.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Logging metadata (module name, log path, level).
    #[serde(default)]
    pub logging: Option<LoggingConfig>,

    /// Exchange ids to connect to (e.g. `"binance"`, `"okx"`).
    pub exchanges: Vec<String>,

    /// Unified symbols to subscribe on every selected exchange.
    pub symbols: Vec<String>,

    /// Per-exchange endpoint overrides.
    #[serde(default)]
    pub endpoints: HashMap<String, String>,

    #[serde(default)]
    pub retry: RetryPolicy,

    /// Throttle for transport-error logging.
    #[serde(default)]
    pub error_log: ThrottleConfig,

    /// How often the runner polls and logs connection status.
    #[serde(default = "default_status_interval")]
    pub status_interval_sec: u64,

    /// Force a fresh session when a connected link is silent this long.
    #[serde(default)]
    pub stale_after_sec: Option<u64>,
}

/// Logging metadata block.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    pub module_name: Option<String>,
    pub log_path: Option<String>,
    pub log_level: Option<String>,
}

fn default_status_interval() -> u64 {
    10
}

impl AppConfig {
    /// Module name used for log file prefixes.
    pub fn module_name(&self) -> String {
        self.logging
            .as_ref()
            .and_then(|l| l.module_name.clone())
            .unwrap_or_else(|| "mx-runner".to_string())
    }

    /// Returns the log path.
    pub fn log_path(&self) -> Option<String> {
        self.logging.as_ref().and_then(|l| l.log_path.clone())
    }

    /// Symbols in unified form, deduplicated, in config order.
    pub fn normalized_symbols(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.symbols.len());
        for s in &self.symbols {
            let s = normalize_symbol(s);
            if !s.is_empty() && !out.contains(&s) {
                out.push(s);
            }
        }
        out
    }

    /// Exchange ids lowercased and deduplicated, in config order.
    pub fn normalized_exchanges(&self) -> Vec<String> {
        let mut out: Vec<String> = Vec::with_capacity(self.exchanges.len());
        for e in &self.exchanges {
            let e = e.trim().to_lowercase();
            if !e.is_empty() && !out.contains(&e) {
                out.push(e);
            }
        }
        out
    }

    pub fn validate(&self) -> Result<(), MxError> {
        if self.normalized_symbols().is_empty() {
            return Err(MxError::Config("at least one symbol is required".into()));
        }
        if self.status_interval_sec == 0 {
            return Err(MxError::Config("status_interval_sec must be > 0".into()));
        }
        self.retry.validate()
    }
}

/// Load, parse and validate a JSON config file.
pub fn load_config(path: &std::path::Path) -> anyhow::Result<AppConfig> {
    let content = std::fs::read_to_string(path)?;
    let config: AppConfig = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_uses_defaults() {
        let cfg: AppConfig =
            serde_json::from_str(r#"{"exchanges": ["Binance"], "symbols": ["btcusdt"]}"#).unwrap();
        assert_eq!(cfg.status_interval_sec, 10);
        assert_eq!(cfg.retry, RetryPolicy::default());
        assert_eq!(cfg.error_log, ThrottleConfig::default());
        assert!(cfg.stale_after_sec.is_none());
        assert_eq!(cfg.normalized_exchanges(), vec!["binance"]);
        assert_eq!(cfg.normalized_symbols(), vec!["BTCUSDT"]);
        assert_eq!(cfg.module_name(), "mx-runner");
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn full_config_round_trips_fields() {
        let json = r#"{
            "logging": {"module_name": "feed", "log_path": "/tmp/log"},
            "exchanges": ["okx", "okx", "bybit"],
            "symbols": ["ETHUSDT", "ethusdt", "BTCUSDT"],
            "endpoints": {"okx": "wss://example.test/ws"},
            "retry": {"max_retries": 3},
            "status_interval_sec": 5,
            "stale_after_sec": 60
        }"#;
        let cfg: AppConfig = serde_json::from_str(json).unwrap();
        assert_eq!(cfg.normalized_exchanges(), vec!["okx", "bybit"]);
        assert_eq!(cfg.normalized_symbols(), vec!["ETHUSDT", "BTCUSDT"]);
        assert_eq!(cfg.endpoints.get("okx").map(String::as_str), Some("wss://example.test/ws"));
        assert_eq!(cfg.retry.max_retries, 3);
        assert_eq!(cfg.stale_after_sec, Some(60));
        assert_eq!(cfg.log_path().as_deref(), Some("/tmp/log"));
        assert_eq!(cfg.module_name(), "feed");
    }

    #[test]
    fn empty_symbols_rejected() {
        let cfg: AppConfig = serde_json::from_str(r#"{"exchanges": ["okx"], "symbols": [" "]}"#).unwrap();
        assert!(matches!(cfg.validate(), Err(MxError::Config(_))));
    }
}
