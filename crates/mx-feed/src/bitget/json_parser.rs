//! Bitget v2 JSON message parser.
//!
//! Routes by `arg.channel`; only `ticker` produces ticks. Bitget uses unified
//! symbols natively. `change24h` is a fraction and is scaled to a percentage.

use mx_core::error::MxError;
use mx_core::time_util;
use mx_core::types::NormalizedTick;

use crate::descriptor::{is_heartbeat, parse_json};
use crate::json_util::{parse_f64_field, parse_u64_field};

use super::ID;

/// Build the subscription message for the spot `ticker` channel of each symbol.
pub fn build_subscribe(symbols: &[String]) -> String {
    let args: Vec<serde_json::Value> = symbols
        .iter()
        .map(|s| serde_json::json!({"instType": "SPOT", "channel": "ticker", "instId": s}))
        .collect();

    serde_json::json!({
        "op": "subscribe",
        "args": args
    })
    .to_string()
}

/// Parse a Bitget text frame into zero or more ticks.
pub fn parse_message(text: &str) -> Result<Vec<NormalizedTick>, MxError> {
    // Bitget echoes "pong" in response to our "ping".
    if is_heartbeat(text) {
        return Ok(vec![]);
    }
    let v = parse_json(ID, text)?;

    let channel = v.get("arg").and_then(|a| a.get("channel")).and_then(|c| c.as_str());
    if channel != Some("ticker") {
        return Ok(vec![]);
    }
    let Some(data) = v.get("data").and_then(|d| d.as_array()) else {
        return Ok(vec![]);
    };
    let frame_ts = parse_u64_field(&v, "ts");
    Ok(data.iter().filter_map(|item| parse_ticker(item, frame_ts)).collect())
}

fn parse_ticker(item: &serde_json::Value, frame_ts: Option<u64>) -> Option<NormalizedTick> {
    let last_price = parse_f64_field(item, "lastPr")?;

    Some(NormalizedTick {
        symbol: item.get("instId")?.as_str()?.to_string(),
        last_price,
        bid: parse_f64_field(item, "bidPr").unwrap_or(last_price),
        ask: parse_f64_field(item, "askPr").unwrap_or(last_price),
        volume_24h: parse_f64_field(item, "baseVolume").unwrap_or(0.0),
        change_percent_24h: parse_f64_field(item, "change24h").map(|c| c * 100.0).unwrap_or(0.0),
        exchange_id: ID.to_string(),
        event_time_ms: parse_u64_field(item, "ts").or(frame_ts).unwrap_or_else(time_util::now_ms),
    })
}
