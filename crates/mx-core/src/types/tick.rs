//! The normalized tick: the single data type flowing from parsers to
//! subscribers.
//!
//! # Conventions
//!
//! - `symbol` is always the unified form (`BTCUSDT`), whatever the exchange
//!   calls the instrument on the wire.
//! - `change_percent_24h` is a percentage (`1.5` means +1.5%), never a
//!   fraction.
//! - `event_time_ms` is the exchange event time in milliseconds since Unix
//!   epoch, or local receive time when the exchange omits it.

use serde::{Deserialize, Serialize};

/// One normalized price/volume observation for a symbol from one exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedTick {
    pub symbol: String,
    pub last_price: f64,
    pub bid: f64,
    pub ask: f64,
    pub volume_24h: f64,
    pub change_percent_24h: f64,
    pub exchange_id: String,
    pub event_time_ms: u64,
}

impl std::fmt::Display for NormalizedTick {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Tick({} {} last={:.8} bid={:.8} ask={:.8} vol={:.4} chg={:+.2}%)",
            self.exchange_id,
            self.symbol,
            self.last_price,
            self.bid,
            self.ask,
            self.volume_24h,
            self.change_percent_24h
        )
    }
}
