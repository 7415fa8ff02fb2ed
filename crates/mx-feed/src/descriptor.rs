//! Exchange descriptors: the static, exchange-specific half of a connection.
//!
//! A descriptor knows where to connect, what to send after connecting, and
//! how to turn inbound frames into [`NormalizedTick`]s. Everything else
//! (reconnects, fan-out, status) is exchange-agnostic and lives in
//! [`crate::connection`]. Adding an exchange means adding one descriptor and
//! registering it in [`crate::registry`].

use mx_core::error::MxError;
use mx_core::types::NormalizedTick;
use mx_core::ws::PingConfig;

pub trait ExchangeDescriptor: Send + Sync {
    /// Stable lowercase identifier (`"binance"`).
    fn id(&self) -> &'static str;

    /// Human-readable name (`"Binance"`).
    fn display_name(&self) -> &'static str;

    /// WebSocket endpoint URL.
    fn endpoint(&self) -> &str;

    /// Wire messages to send after connecting, for unified `symbols`.
    fn subscribe_requests(&self, symbols: &[String]) -> Vec<String>;

    /// Client keep-alive, if the exchange expects one.
    fn ping(&self) -> Option<PingConfig> {
        None
    }

    /// Parse a text frame.
    ///
    /// Acks, pongs and unknown JSON shapes yield `Ok(vec![])`. `Err` is
    /// reserved for frames that are not JSON at all.
    fn parse_text(&self, text: &str) -> Result<Vec<NormalizedTick>, MxError>;

    /// Text to send back for an inbound keep-alive, if the exchange expects
    /// the client to answer its pings.
    fn keepalive_reply(&self, _text: &str) -> Option<String> {
        None
    }
}

/// Parse `text` as JSON, mapping failure to [`MxError::Parse`].
pub(crate) fn parse_json(exchange: &str, text: &str) -> Result<serde_json::Value, MxError> {
    serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(64).collect();
        MxError::Parse(format!("{exchange}: {e} in {preview:?}"))
    })
}

/// Bare textual keep-alives (`ping`, `pong`, `Ping`) several exchanges send.
pub(crate) fn is_heartbeat(text: &str) -> bool {
    let t = text.trim();
    t.eq_ignore_ascii_case("ping") || t.eq_ignore_ascii_case("pong")
}
