//! Symbol format conversion.
//!
//! The public API speaks unified symbols (`BTCUSDT`). Some exchanges want a
//! dashed form (`BTC-USDT`, `BTC-USDT-SWAP`); these helpers convert in both
//! directions so ticks come back keyed by the symbol the caller used.

/// Quote currencies tried, in order, when splitting a unified symbol.
const QUOTES: &[&str] = &["USDT", "USDC", "FDUSD", "BUSD", "DAI", "BTC", "ETH"];

/// Normalize user input: trim and uppercase.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// Split a unified symbol into `(base, quote)`.
///
/// Returns `None` when no known quote currency matches.
pub fn split_symbol(symbol: &str) -> Option<(&str, &str)> {
    QUOTES.iter().find_map(|q| match symbol.strip_suffix(q) {
        Some(base) if !base.is_empty() => Some((base, *q)),
        _ => None,
    })
}

/// Convert a unified symbol (`BTCUSDT`) to dashed form (`BTC-USDT`).
///
/// Symbols that already contain a hyphen, or whose quote currency is not
/// recognised, are returned unchanged.
pub fn to_dashed(symbol: &str) -> String {
    if symbol.contains('-') {
        return symbol.to_string();
    }
    match split_symbol(symbol) {
        Some((base, quote)) => format!("{base}-{quote}"),
        None => symbol.to_string(),
    }
}

/// Convert a dashed instrument id back to unified form.
///
/// `BTC-USDT` → `BTCUSDT`, `BTC-USDT-SWAP` → `BTCUSDT`.
pub fn from_dashed(inst_id: &str) -> String {
    let trimmed = inst_id.strip_suffix("-SWAP").unwrap_or(inst_id);
    trimmed.replace('-', "")
}
