//! Binance JSON message parser.
//!
//! Handles `24hrTicker` events, bare or wrapped in the combined-stream
//! envelope (`{"stream": ..., "data": {...}}`), and the array form sent by
//! `!ticker@arr`. Subscription acks (`{"result": null, "id": 1}`) produce
//! nothing.

use mx_core::error::MxError;
use mx_core::time_util;
use mx_core::types::NormalizedTick;

use crate::descriptor::{is_heartbeat, parse_json};
use crate::json_util::{parse_f64_field, parse_u64_field};

use super::ID;

/// Build the subscription message for the 24h ticker of each symbol.
pub fn build_subscribe(symbols: &[String]) -> String {
    let params: Vec<String> = symbols.iter().map(|s| format!("{}@ticker", s.to_lowercase())).collect();
    serde_json::json!({
        "method": "SUBSCRIBE",
        "params": params,
        "id": 1
    })
    .to_string()
}

/// Parse a Binance text frame into zero or more ticks.
pub fn parse_message(text: &str) -> Result<Vec<NormalizedTick>, MxError> {
    if is_heartbeat(text) {
        return Ok(vec![]);
    }
    let v = parse_json(ID, text)?;
    let data = v.get("data").unwrap_or(&v);

    let ticks = match data.as_array() {
        Some(items) => items.iter().filter_map(parse_ticker).collect(),
        None => parse_ticker(data).into_iter().collect(),
    };
    Ok(ticks)
}

fn parse_ticker(v: &serde_json::Value) -> Option<NormalizedTick> {
    if v.get("e")?.as_str()? != "24hrTicker" {
        return None;
    }
    let last_price = parse_f64_field(v, "c")?;

    Some(NormalizedTick {
        symbol: v.get("s")?.as_str()?.to_uppercase(),
        last_price,
        bid: parse_f64_field(v, "b").unwrap_or(last_price),
        ask: parse_f64_field(v, "a").unwrap_or(last_price),
        volume_24h: parse_f64_field(v, "v").unwrap_or(0.0),
        change_percent_24h: parse_f64_field(v, "P").unwrap_or(0.0),
        exchange_id: ID.to_string(),
        event_time_ms: parse_u64_field(v, "E").unwrap_or_else(time_util::now_ms),
    })
}
