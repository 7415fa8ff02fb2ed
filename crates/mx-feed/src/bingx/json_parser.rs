//! BingX spot market JSON parser.
//!
//! BingX gzip-compresses its pushes; frames arrive here already inflated.
//! The server's textual `Ping` must be answered with `Pong` (see
//! [`keepalive_reply`]) or the socket is dropped.

use mx_core::error::MxError;
use mx_core::time_util;
use mx_core::types::{NormalizedTick, from_dashed, to_dashed};

use crate::descriptor::{is_heartbeat, parse_json};
use crate::json_util::{parse_f64_field, parse_str_f64, parse_u64_field};

use super::ID;

/// One subscription message per symbol; BingX takes a single `dataType` each.
pub fn build_subscribe(symbols: &[String]) -> Vec<String> {
    symbols
        .iter()
        .map(|s| {
            let dashed = to_dashed(s);
            serde_json::json!({
                "id": format!("mx-{dashed}"),
                "reqType": "sub",
                "dataType": format!("{dashed}@ticker")
            })
            .to_string()
        })
        .collect()
}

/// Reply owed for a server keep-alive.
pub fn keepalive_reply(text: &str) -> Option<String> {
    (text.trim() == "Ping").then(|| "Pong".to_string())
}

/// Parse a BingX text frame into zero or more ticks.
pub fn parse_message(text: &str) -> Result<Vec<NormalizedTick>, MxError> {
    if is_heartbeat(text) {
        return Ok(vec![]);
    }
    let v = parse_json(ID, text)?;

    let is_ticker = v.get("dataType").and_then(|d| d.as_str()).is_some_and(|d| d.ends_with("@ticker"));
    if !is_ticker {
        return Ok(vec![]);
    }
    let Some(data) = v.get("data") else {
        return Ok(vec![]);
    };
    Ok(parse_ticker(data).into_iter().collect())
}

fn parse_ticker(data: &serde_json::Value) -> Option<NormalizedTick> {
    let symbol = data.get("s")?.as_str()?;
    let last_price = parse_f64_field(data, "c")?;

    Some(NormalizedTick {
        symbol: from_dashed(symbol),
        last_price,
        bid: parse_f64_field(data, "b").unwrap_or(last_price),
        ask: parse_f64_field(data, "a").unwrap_or(last_price),
        volume_24h: parse_f64_field(data, "v").unwrap_or(0.0),
        change_percent_24h: parse_percent(data.get("P")).unwrap_or(0.0),
        exchange_id: ID.to_string(),
        event_time_ms: parse_u64_field(data, "E").unwrap_or_else(time_util::now_ms),
    })
}

/// `"1.25%"`, `"1.25"` and `1.25` all mean 1.25 percent.
fn parse_percent(v: Option<&serde_json::Value>) -> Option<f64> {
    match v?.as_str() {
        Some(s) => fast_float2::parse(s.trim().trim_end_matches('%')).ok(),
        None => parse_str_f64(v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_ticker_push() {
        let json = r#"{
            "code": 0, "dataType": "BTC-USDT@ticker",
            "data": {"e": "24hTicker", "E": 1700000000123, "s": "BTC-USDT",
                     "p": "300", "P": "1.00%", "o": "30000", "c": "30300",
                     "v": "812.5", "b": "30299.5", "a": "30300.5"}
        }"#;
        let ticks = parse_message(json).unwrap();
        assert_eq!(ticks.len(), 1);
        let t = &ticks[0];
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.exchange_id, "bingx");
        assert!((t.change_percent_24h - 1.0).abs() < 1e-9);
        assert!((t.bid - 30299.5).abs() < 1e-9);
        assert_eq!(t.event_time_ms, 1700000000123);
    }

    #[test]
    fn missing_book_falls_back_to_last() {
        let json = r#"{"dataType": "ETH-USDT@ticker", "data": {"s": "ETH-USDT", "c": "2000", "P": "-0.5"}}"#;
        let t = &parse_message(json).unwrap()[0];
        assert_eq!(t.bid, 2000.0);
        assert_eq!(t.ask, 2000.0);
        assert!((t.change_percent_24h + 0.5).abs() < 1e-9);
    }

    #[test]
    fn ack_and_ping_yield_nothing() {
        assert!(parse_message("Ping").unwrap().is_empty());
        let ack = r#"{"id": "mx-BTC-USDT", "code": 0, "msg": "", "dataType": "", "data": null}"#;
        assert!(parse_message(ack).unwrap().is_empty());
    }

    #[test]
    fn only_ping_is_answered() {
        assert_eq!(keepalive_reply("Ping").as_deref(), Some("Pong"));
        assert!(keepalive_reply("Pong").is_none());
        assert!(keepalive_reply(r#"{"ping":1}"#).is_none());
    }

    #[test]
    fn one_request_per_symbol() {
        let reqs = build_subscribe(&["BTCUSDT".into(), "ETHUSDT".into()]);
        assert_eq!(reqs.len(), 2);
        let v: serde_json::Value = serde_json::from_str(&reqs[1]).unwrap();
        assert_eq!(v["dataType"], "ETH-USDT@ticker");
        assert_eq!(v["reqType"], "sub");
    }
}
