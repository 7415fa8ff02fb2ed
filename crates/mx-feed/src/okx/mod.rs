//! OKX v5 public: `tickers` channel.
//!
//! OKX closes connections that stay silent for 30 seconds; the client sends a
//! bare `ping` text frame every 25.

pub mod json_parser;

use std::time::Duration;

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;
use mx_core::ws::{PingConfig, PingPayload};

use crate::descriptor::ExchangeDescriptor;

pub const ID: &str = "okx";
const OKX_WS_URL: &str = "wss://ws.okx.com:8443/ws/v5/public";
const PING_INTERVAL: Duration = Duration::from_secs(25);

#[derive(Debug, Clone)]
pub struct Okx {
    endpoint: String,
}

impl Okx {
    pub fn new() -> Self {
        Self::with_endpoint(OKX_WS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for Okx {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeDescriptor for Okx {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        "OKX"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_requests(&self, symbols: &[String]) -> Vec<String> {
        vec![json_parser::build_subscribe(symbols)]
    }

    fn ping(&self) -> Option<PingConfig> {
        Some(PingConfig { interval: PING_INTERVAL, payload: PingPayload::Text("ping".into()) })
    }

    fn parse_text(&self, text: &str) -> Result<Vec<NormalizedTick>, MxError> {
        json_parser::parse_message(text)
    }
}
