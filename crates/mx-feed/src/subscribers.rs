//! Symbol → callback registry and tick fan-out.
//!
//! Shared by every connection. Receive paths take the read lock only long
//! enough to clone the callback list, so callbacks run without any lock held
//! and may themselves subscribe or unsubscribe.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use ahash::AHashMap;
use parking_lot::RwLock;
use tracing::error;

use mx_core::types::NormalizedTick;

/// Tick consumer. Identity is the `Arc` allocation: registering a clone of
/// the same `Arc` twice is a no-op.
pub type TickCallback = Arc<dyn Fn(&NormalizedTick) + Send + Sync>;

#[derive(Default)]
pub struct SubscriberRegistry {
    by_symbol: RwLock<AHashMap<String, Vec<TickCallback>>>,
}

fn same_callback(a: &TickCallback, b: &TickCallback) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

impl SubscriberRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `symbol`. Returns `false` if it already was.
    pub fn subscribe(&self, symbol: &str, callback: TickCallback) -> bool {
        let mut map = self.by_symbol.write();
        let list = map.entry(symbol.to_string()).or_default();
        if list.iter().any(|c| same_callback(c, &callback)) {
            return false;
        }
        list.push(callback);
        true
    }

    /// Remove `callback` from `symbol`, dropping the symbol entry once empty.
    /// Returns whether anything was removed.
    pub fn unsubscribe(&self, symbol: &str, callback: &TickCallback) -> bool {
        let mut map = self.by_symbol.write();
        let Some(list) = map.get_mut(symbol) else {
            return false;
        };
        let before = list.len();
        list.retain(|c| !same_callback(c, callback));
        let removed = list.len() != before;
        if list.is_empty() {
            map.remove(symbol);
        }
        removed
    }

    /// Deliver `tick` to every callback registered for its symbol.
    ///
    /// A panicking callback is logged and skipped; the rest still run.
    /// Returns the number of callbacks that completed.
    pub fn fan_out(&self, tick: &NormalizedTick) -> usize {
        let callbacks: Vec<TickCallback> = match self.by_symbol.read().get(&tick.symbol) {
            Some(list) => list.clone(),
            None => return 0,
        };

        let mut delivered = 0;
        for cb in &callbacks {
            match catch_unwind(AssertUnwindSafe(|| cb(tick))) {
                Ok(()) => delivered += 1,
                Err(_) => error!("[{}] subscriber for {} panicked; skipped", tick.exchange_id, tick.symbol),
            }
        }
        delivered
    }

    pub fn clear(&self) {
        self.by_symbol.write().clear();
    }

    /// Symbols with at least one subscriber.
    pub fn symbol_count(&self) -> usize {
        self.by_symbol.read().len()
    }

    pub fn subscriber_count(&self, symbol: &str) -> usize {
        self.by_symbol.read().get(symbol).map_or(0, Vec::len)
    }
}
