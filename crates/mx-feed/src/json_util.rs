//! Shared JSON parsing helpers used by all exchange parsers.
//!
//! Exchanges encode numbers as JSON strings (`"30000.5"`) or native numbers
//! (`30000.5`), sometimes both within one message; these helpers accept either.

/// Parse a JSON value (string or number) as `f64`.
#[inline]
pub fn parse_str_f64(v: Option<&serde_json::Value>) -> Option<f64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        fast_float2::parse(s).ok()
    } else {
        v.as_f64()
    }
}

/// Parse a JSON value (string or number) as `u64`.
#[inline]
pub fn parse_str_u64(v: Option<&serde_json::Value>) -> Option<u64> {
    let v = v?;
    if let Some(s) = v.as_str() {
        s.parse().ok()
    } else {
        v.as_u64()
    }
}

/// Parse a named field on a JSON object as `f64` (string or number).
#[inline]
pub fn parse_f64_field(v: &serde_json::Value, key: &str) -> Option<f64> {
    parse_str_f64(v.get(key))
}

/// Parse a named field on a JSON object as `u64` (string or number).
#[inline]
pub fn parse_u64_field(v: &serde_json::Value, key: &str) -> Option<u64> {
    parse_str_u64(v.get(key))
}

/// Percent change from an opening price. Zero when `open` is not positive.
#[inline]
pub fn percent_change(open: f64, last: f64) -> f64 {
    if open > 0.0 { (last - open) / open * 100.0 } else { 0.0 }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_and_numbers_both_parse() {
        let v = json!({"a": "30000.5", "b": 12.25, "c": "x", "t": "1672515782136", "u": 7});
        assert_eq!(parse_f64_field(&v, "a"), Some(30000.5));
        assert_eq!(parse_f64_field(&v, "b"), Some(12.25));
        assert_eq!(parse_f64_field(&v, "c"), None);
        assert_eq!(parse_f64_field(&v, "missing"), None);
        assert_eq!(parse_u64_field(&v, "t"), Some(1_672_515_782_136));
        assert_eq!(parse_u64_field(&v, "u"), Some(7));
    }

    #[test]
    fn percent_change_guards_zero_open() {
        assert!((percent_change(100.0, 101.5) - 1.5).abs() < 1e-9);
        assert_eq!(percent_change(0.0, 101.5), 0.0);
    }
}
