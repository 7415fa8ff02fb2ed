//! BingX spot market: per-symbol `@ticker` streams, gzip-compressed, with a
//! server-driven `Ping`/`Pong` keep-alive.

pub mod json_parser;

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;

use crate::descriptor::ExchangeDescriptor;

pub const ID: &str = "bingx";
const BINGX_WS_URL: &str = "wss://open-api-ws.bingx.com/market";

#[derive(Debug, Clone)]
pub struct BingX {
    endpoint: String,
}

impl BingX {
    pub fn new() -> Self {
        Self::with_endpoint(BINGX_WS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for BingX {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeDescriptor for BingX {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        "BingX"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_requests(&self, symbols: &[String]) -> Vec<String> {
        json_parser::build_subscribe(symbols)
    }

    fn parse_text(&self, text: &str) -> Result<Vec<NormalizedTick>, MxError> {
        json_parser::parse_message(text)
    }

    fn keepalive_reply(&self, text: &str) -> Option<String> {
        json_parser::keepalive_reply(text)
    }
}
