//! Bitget v2 public: spot `ticker` channel.

pub mod json_parser;

use std::time::Duration;

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;
use mx_core::ws::{PingConfig, PingPayload};

use crate::descriptor::ExchangeDescriptor;

pub const ID: &str = "bitget";
const BITGET_WS_URL: &str = "wss://ws.bitget.com/v2/ws/public";
const PING_INTERVAL: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Bitget {
    endpoint: String,
}

impl Bitget {
    pub fn new() -> Self {
        Self::with_endpoint(BITGET_WS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for Bitget {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeDescriptor for Bitget {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        "Bitget"
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
