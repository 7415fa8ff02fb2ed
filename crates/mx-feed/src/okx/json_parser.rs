//! OKX JSON message parser.
//!
//! Routes by `arg.channel`; only `tickers` produces ticks. OKX has no 24h
//! percent field, so the change is derived from `open24h`. Instrument ids
//! (`BTC-USDT`) are converted back to unified symbols (`BTCUSDT`).

use mx_core::error::MxError;
use mx_core::time_util;
use mx_core::types::{NormalizedTick, from_dashed, to_dashed};

use crate::descriptor::{is_heartbeat, parse_json};
use crate::json_util::{parse_f64_field, parse_u64_field, percent_change};

use super::ID;

/// Build the subscription message for the `tickers` channel of each symbol.
pub fn build_subscribe(symbols: &[String]) -> String {
    let args: Vec<serde_json::Value> = symbols
        .iter()
        .map(|s| serde_json::json!({"channel": "tickers", "instId": to_dashed(s)}))
        .collect();

    serde_json::json!({
        "op": "subscribe",
        "args": args
    })
    .to_string()
}

/// Parse an OKX text frame into zero or more ticks.
///
/// OKX echoes `pong` to our `ping`; subscribe acks carry `event` and no data.
pub fn parse_message(text: &str) -> Result<Vec<NormalizedTick>, MxError> {
    if is_heartbeat(text) {
        return Ok(vec![]);
    }
    let v = parse_json(ID, text)?;

    let channel = v.get("arg").and_then(|a| a.get("channel")).and_then(|c| c.as_str());
    if channel != Some("tickers") {
        return Ok(vec![]);
    }
    let Some(data) = v.get("data").and_then(|d| d.as_array()) else {
        return Ok(vec![]);
    };
    Ok(data.iter().filter_map(parse_ticker).collect())
}

fn parse_ticker(item: &serde_json::Value) -> Option<NormalizedTick> {
    let inst_id = item.get("instId")?.as_str()?;
    let last_price = parse_f64_field(item, "last")?;
    let open = parse_f64_field(item, "open24h").unwrap_or(0.0);

    Some(NormalizedTick {
        symbol: from_dashed(inst_id),
        last_price,
        bid: parse_f64_field(item, "bidPx").unwrap_or(last_price),
        ask: parse_f64_field(item, "askPx").unwrap_or(last_price),
        volume_24h: parse_f64_field(item, "vol24h").unwrap_or(0.0),
        change_percent_24h: percent_change(open, last_price),
        exchange_id: ID.to_string(),
        event_time_ms: parse_u64_field(item, "ts").unwrap_or_else(time_util::now_ms),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tickers_push() {
        let json = r#"{
            "arg": {"channel": "tickers", "instId": "BTC-USDT"},
            "data": [{
                "instType": "SPOT", "instId": "BTC-USDT", "last": "30300",
                "lastSz": "0.1", "askPx": "30300.1", "askSz": "1", "bidPx": "30299.9",
                "bidSz": "2", "open24h": "30000", "high24h": "30500", "low24h": "29800",
                "vol24h": "1234.5", "volCcy24h": "37000000", "ts": "1672515782136"
            }]
        }"#;
        let ticks = parse_message(json).unwrap();
        assert_eq!(ticks.len(), 1);
        let t = &ticks[0];
        assert_eq!(t.symbol, "BTCUSDT");
        assert_eq!(t.exchange_id, "okx");
        assert!((t.change_percent_24h - 1.0).abs() < 1e-9);
        assert!((t.bid - 30299.9).abs() < 1e-6);
        assert!((t.volume_24h - 1234.5).abs() < 1e-9);
        assert_eq!(t.event_time_ms, 1672515782136);
    }

    #[test]
    fn subscribe_ack_yields_nothing() {
        let ack = r#"{"event": "subscribe", "arg": {"channel": "tickers", "instId": "BTC-USDT"}, "connId": "a4d3ae55"}"#;
        assert!(parse_message(ack).unwrap().is_empty());
    }

    #[test]
    fn other_channels_ignored() {
        let json = r#"{"arg": {"channel": "trades", "instId": "BTC-USDT"}, "data": [{"px": "1"}]}"#;
        assert!(parse_message(json).unwrap().is_empty());
    }

    #[test]
    fn pong_returns_nothing() {
        assert!(parse_message("pong").unwrap().is_empty());
    }

    #[test]
    fn subscribe_uses_dashed_ids() {
        let msg = build_subscribe(&["BTCUSDT".into(), "ETHUSDC".into()]);
        let v: serde_json::Value = serde_json::from_str(&msg).unwrap();
        assert_eq!(v["args"][0]["instId"], "BTC-USDT");
        assert_eq!(v["args"][1]["instId"], "ETH-USDC");
        assert_eq!(v["args"][1]["channel"], "tickers");
    }
}
