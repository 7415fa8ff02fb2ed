//! Exchange descriptor registry.
//!
//! Maps an exchange id to its [`ExchangeDescriptor`]. Built once at startup
//! (optionally with endpoint overrides) and read-only afterwards.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use mx_core::error::MxError;

use crate::bingx::BingX;
use crate::binance::Binance;
use crate::bitget::Bitget;
use crate::bybit::Bybit;
use crate::descriptor::ExchangeDescriptor;
use crate::okx::Okx;

/// `{id, name}` entry returned by [`ExchangeRegistry::list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExchangeInfo {
    pub id: String,
    pub name: String,
}

pub struct ExchangeRegistry {
    /// Registration order is preserved for `list`.
    descriptors: Vec<Arc<dyn ExchangeDescriptor>>,
}

impl ExchangeRegistry {
    /// All built-in exchanges with their default endpoints.
    pub fn new() -> Self {
        Self::from_descriptors(vec![
            Arc::new(Binance::new()),
            Arc::new(Bybit::new()),
            Arc::new(Okx::new()),
            Arc::new(Bitget::new()),
            Arc::new(BingX::new()),
        ])
    }

    /// Built-in exchanges, with `overrides` replacing endpoints by id.
    ///
    /// Unknown ids and malformed or non-WebSocket URLs are config errors.
    pub fn with_endpoints(overrides: &HashMap<String, String>) -> Result<Self, MxError> {
        let defaults = Self::new();
        for id in overrides.keys() {
            defaults.get(id)?;
        }

        let endpoint = |id: &str, default: &str| -> Result<String, MxError> {
            match overrides.get(id) {
                Some(url) => validate_ws_url(id, url),
                None => Ok(default.to_string()),
            }
        };

        let mut descriptors: Vec<Arc<dyn ExchangeDescriptor>> = Vec::with_capacity(defaults.len());
        for d in &defaults.descriptors {
            let url = endpoint(d.id(), d.endpoint())?;
            let desc: Arc<dyn ExchangeDescriptor> = match d.id() {
                crate::binance::ID => Arc::new(Binance::with_endpoint(url)),
                crate::bybit::ID => Arc::new(Bybit::with_endpoint(url)),
                crate::okx::ID => Arc::new(Okx::with_endpoint(url)),
                crate::bitget::ID => Arc::new(Bitget::with_endpoint(url)),
                crate::bingx::ID => Arc::new(BingX::with_endpoint(url)),
                _ => Arc::clone(d),
            };
            descriptors.push(desc);
        }
        Ok(Self::from_descriptors(descriptors))
    }

    /// Registry over an explicit descriptor set. Later duplicates of an id are ignored.
    pub fn from_descriptors(descriptors: Vec<Arc<dyn ExchangeDescriptor>>) -> Self {
        let mut out: Vec<Arc<dyn ExchangeDescriptor>> = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if !out.iter().any(|o| o.id() == d.id()) {
                out.push(d);
            }
        }
        Self { descriptors: out }
    }

    pub fn get(&self, id: &str) -> Result<Arc<dyn ExchangeDescriptor>, MxError> {
        self.descriptors
            .iter()
            .find(|d| d.id() == id)
            .cloned()
            .ok_or_else(|| MxError::UnknownExchange(id.to_string()))
    }

    pub fn list(&self) -> Vec<ExchangeInfo> {
        self.descriptors
            .iter()
            .map(|d| ExchangeInfo { id: d.id().to_string(), name: d.display_name().to_string() })
            .collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.descriptors.iter().map(|d| d.id())
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }
}

impl Default for ExchangeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_ws_url(id: &str, raw: &str) -> Result<String, MxError> {
    let parsed = url::Url::parse(raw).map_err(|e| MxError::Config(format!("{id}: bad endpoint {raw:?}: {e}")))?;
    match parsed.scheme() {
        "ws" | "wss" => Ok(raw.to_string()),
        other => Err(MxError::Config(format!("{id}: endpoint scheme must be ws or wss, got {other}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_builtins_in_order() {
        let reg = ExchangeRegistry::new();
        let ids: Vec<String> = reg.list().into_iter().map(|i| i.id).collect();
        assert_eq!(ids, vec!["binance", "bybit", "okx", "bitget", "bingx"]);
        assert_eq!(reg.get("okx").unwrap().display_name(), "OKX");
    }

    #[test]
    fn unknown_id_is_rejected() {
        let reg = ExchangeRegistry::new();
        match reg.get("kraken") {
            Err(MxError::UnknownExchange(id)) => assert_eq!(id, "kraken"),
            other => panic!("expected UnknownExchange, got {:?}", other.map(|d| d.id())),
        }
    }

    #[test]
    fn endpoint_override_applies_to_one_exchange() {
        let overrides = HashMap::from([("okx".to_string(), "wss://example.test/ws".to_string())]);
        let reg = ExchangeRegistry::with_endpoints(&overrides).unwrap();
        assert_eq!(reg.get("okx").unwrap().endpoint(), "wss://example.test/ws");
        assert_eq!(reg.get("binance").unwrap().endpoint(), "wss://stream.binance.com:9443/ws");
        assert_eq!(reg.len(), 5);
    }

    #[test]
    fn bad_overrides_rejected() {
        let http = HashMap::from([("okx".to_string(), "https://example.test".to_string())]);
        assert!(matches!(ExchangeRegistry::with_endpoints(&http), Err(MxError::Config(_))));

        let garbage = HashMap::from([("okx".to_string(), "not a url".to_string())]);
        assert!(matches!(ExchangeRegistry::with_endpoints(&garbage), Err(MxError::Config(_))));

        let unknown = HashMap::from([("kraken".to_string(), "wss://example.test".to_string())]);
        assert!(matches!(ExchangeRegistry::with_endpoints(&unknown), Err(MxError::UnknownExchange(_))));
    }
}
