//! Binance spot: `<symbol>@ticker` 24h rolling ticker.
//!
//! Binance sends WebSocket ping frames itself and expects pongs, which the
//! transport answers; no client ping is configured.

pub mod json_parser;

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;

use crate::descriptor::ExchangeDescriptor;

pub const ID: &str = "binance";
const BINANCE_WS_URL: &str = "wss://stream.binance.com:9443/ws";

#[derive(Debug, Clone)]
pub struct Binance {
    endpoint: String,
}

impl Binance {
    pub fn new() -> Self {
        Self::with_endpoint(BINANCE_WS_URL)
    }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into() }
    }
}

impl Default for Binance {
    fn default() -> Self {
        Self::new()
    }
}

impl ExchangeDescriptor for Binance {
    fn id(&self) -> &'static str {
        ID
    }

    fn display_name(&self) -> &'static str {
        "Binance"
    }

    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn subscribe_requests(&self, symbols: &[String]) -> Vec<String> {
        vec![json_parser::build_subscribe(symbols)]
    }

    fn parse_text(&self, text: &str) -> Result<Vec<NormalizedTick>, MxError> {
        json_parser::parse_message(text)
    }
}
