//! Bybit v5 linear: `tickers.<SYMBOL>`.
//!
//! Bybit drops idle connections unless the client sends `{"op":"ping"}`
//! roughly every 20 seconds.

pub mod json_parser;

use std::time::Duration;

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;
use mx_core::ws::{PingConfig, PingPayload};

use crate::descriptor::ExchangeDescriptor;

pub const ID: &str = "bybit";
const BYBIT_LINEAR_WS_URL: &str = "wss://stream.bybit.com/v5/public/linear";
const PING_INTERVAL: Duration = Duration::from_secs(20);

#[derive(Debug, Clone)]
pub struct Bybit {
    endpoint: String,
}

impl Bybit {
    pub fn new() -> Self {
        Self::with_endpoint(BYBIT_LINEAR_WS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for Bybit {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeDescriptor for Bybit {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        "Bybit"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_requests(&self, symbols: &[String]) -> Vec<String> {
        vec![json_parser::build_subscribe(symbols)]
    }

    fn ping(&self) -> Option<PingConfig> {
        Some(PingConfig {
            interval: PING_INTERVAL,
            payload: PingPayload::Json(serde_json::json!({"req_id": "mx-ping", "op": "ping"})),
        })
    }

    fn parse_text(&self, text: &str) -> Result<Vec<NormalizedTick>, MxError> {
        json_parser::parse_message(text)
    }
}
