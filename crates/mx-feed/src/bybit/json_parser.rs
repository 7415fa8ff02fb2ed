//! Bybit v5 JSON message parser.
//!
//! Linear `tickers.<SYMBOL>` topics send a `snapshot` first and then `delta`
//! updates carrying only the fields that changed. A delta without
//! `lastPrice` produces no tick; a missing bid/ask falls back to the last
//! price. `price24hPcnt` is a fraction and is scaled to a percentage.

use mx_core::error::MxError;
use mx_core::time_util;
use mx_core::types::NormalizedTick;

use crate::descriptor::{is_heartbeat, parse_json};
use crate::json_util::{parse_f64_field, parse_u64_field};

use super::ID;

/// Build the subscription message for the ticker topic of each symbol.
pub fn build_subscribe(symbols: &[String]) -> String {
    let args: Vec<String> = symbols.iter().map(|s| format!("tickers.{s}")).collect();

    serde_json::json!({
        "req_id": "mx-tickers",
        "op": "subscribe",
        "args": args
    })
    .to_string()
}

/// Parse a Bybit text frame into zero or more ticks.
///
/// Pong (`{"op":"ping","ret_msg":"pong",...}`) and subscription acks carry no
/// `topic` and yield nothing.
pub fn parse_message(text: &str) -> Result<Vec<NormalizedTick>, MxError> {
    if is_heartbeat(text) {
        return Ok(vec![]);
    }
    let v = parse_json(ID, text)?;

    let Some(topic) = v.get("topic").and_then(|t| t.as_str()) else {
        return Ok(vec![]);
    };
    if !topic.starts_with("tickers.") {
        return Ok(vec![]);
    }
    Ok(parse_ticker(&v).into_iter().collect())
}

fn parse_ticker(v: &serde_json::Value) -> Option<NormalizedTick> {
    let data = v.get("data")?;
    let last_price = parse_f64_field(data, "lastPrice")?;

    Some(NormalizedTick {
        symbol: data.get("symbol")?.as_str()?.to_string(),
        last_price,
        bid: parse_f64_field(data, "bid1Price").unwrap_or(last_price),
        ask: parse_f64_field(data, "ask1Price").unwrap_or(last_price),
        volume_24h: parse_f64_field(data, "volume24h").unwrap_or(0.0),
        change_percent_24h: parse_f64_field(data, "price24hPcnt").map(|p| p * 100.0).unwrap_or(0.0),
        exchange_id: ID.to_string(),
        event_time_ms: parse_u64_field(v, "ts").unwrap_or_else(time_util::now_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_snapshot() {
        let json = r#"{
            "topic": "tickers.BTCUSDT",
            "type": "snapshot",
            "data": {
                "symbol": "BTCUSDT", "lastPrice": "16597.00", "bid1Price": "16596.50",
                "ask1Price": "16597.50", "volume24h": "49337.318", "price24hPcnt": "-0.0121"
            },
            "cs": 24987956059,
            "ts": 1673272861686
        }"#;
        let ticks = parse_message(json).unwrap();
        assert_eq!(ticks.len(), 1);
        let t = &ticks[0];
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.exchange_id, "bybit");
        assert!((t.bid - 16596.50).abs() < 1e-6);
        assert!((t.ask - 16597.50).abs() < 1e-6);
        assert!((t.change_percent_24h + 1.21).abs() < 1e-9);
        assert_eq!(t.event_time_ms, 1673272861686);
    }

    #[test]
    fn delta_without_price_is_skipped() {
        let json = r#"{"topic": "tickers.BTCUSDT", "type": "delta",
            "data": {"symbol": "BTCUSDT", "openInterest": "1234"}, "ts": 1673272861686}"#;
        assert!(parse_message(json).unwrap().is_empty());
    }

    #[test]
    fn delta_with_price_falls_back_for_quotes() {
        let json = r#"{"topic": "tickers.ETHUSDT", "type": "delta",
            "data": {"symbol": "ETHUSDT", "lastPrice": "1200.5"}, "ts": 1673272861686}"#;
        let t = &parse_message(json).unwrap()[0];
        assert_eq!(t.bid, 1200.5);
        assert_eq!(t.ask, 1200.5);
    }

    #[test]
    fn pong_and_ack_yield_nothing() {
        let pong = r#"{"success": true, "ret_msg": "pong", "conn_id": "abc", "op": "ping"}"#;
        assert!(parse_message(pong).unwrap().is_empty());
        let ack = r#"{"success": true, "ret_msg": "", "op": "subscribe", "conn_id": "abc"}"#;
        assert!(parse_message(ack).unwrap().is_empty());
    }

    #[test]
    fn subscribe_uses_ticker_topics() {
        let msg = build_subscribe(&["BTCUSDT".into()]);
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["op"], "subscribe");
        assert_eq!(v["args"], serde_json::json!(["tickers.BTCUSDT"]));
    }
}
