//! Connection manager: the facade the rest of the application talks to.
//!
//! Owns one [`Connection`] per selected exchange plus the shared
//! [`SubscriberRegistry`]. Every operation returns immediately; socket I/O
//! and reconnects run on the connections' own tasks.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use ahash::AHashMap;
use parking_lot::Mutex;
use tracing::info;

use mx_core::config::AppConfig;
use mx_core::error::MxError;
use mx_core::ws::{Connector, WsConnector};

use crate::connection::{Connection, ConnectionSettings, ConnectionStats};
use crate::registry::{ExchangeInfo, ExchangeRegistry};
use crate::subscribers::{SubscriberRegistry, TickCallback};

pub struct ConnectionManager {
    registry: Arc<ExchangeRegistry>,
    subscribers: Arc<SubscriberRegistry>,
    connector: Arc<dyn Connector>,
    settings: ConnectionSettings,
    connections: Mutex<AHashMap<String, Arc<Connection>>>,
}

impl ConnectionManager {
    /// Manager over real WebSocket sessions, with endpoint overrides and
    /// tuning taken from `config`.
    pub fn from_config(config: &AppConfig) -> Result<Self, MxError> {
        let registry = ExchangeRegistry::with_endpoints(&config.endpoints)?;
        let settings = ConnectionSettings { retry: config.retry.clone(), error_log: config.error_log };
        Ok(Self::with_connector(Arc::new(registry), Arc::new(WsConnector), settings))
    }

    pub fn with_connector(
        registry: Arc<ExchangeRegistry>,
        connector: Arc<dyn Connector>,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            registry,
            subscribers: Arc::new(SubscriberRegistry::new()),
            connector,
            settings,
            connections: Mutex::new(AHashMap::new()),
        }
    }

    /// Connect `exchange_id` to `symbols`, creating its connection if absent.
    pub fn connect(&self, exchange_id: &str, symbols: &[String]) -> Result<(), MxError> {
        let descriptor = self.registry.get(exchange_id)?;
        let conn = {
            let mut connections = self.connections.lock();
            connections
                .entry(exchange_id.to_string())
                .or_insert_with(|| {
                    Connection::new(descriptor, self.subscribers.clone(), self.connector.clone(), &self.settings)
                })
                .clone()
        };
        conn.connect(symbols);
        Ok(())
    }

    /// Stop and forget one exchange. Unknown or idle ids are a no-op.
    pub fn disconnect(&self, exchange_id: &str) {
        let conn = self.connections.lock().remove(exchange_id);
        if let Some(conn) = conn {
            conn.disconnect();
        }
    }

    /// Stop every connection and drop all subscribers.
    pub fn disconnect_all(&self) {
        self.disconnect_connections();
        self.subscribers.clear();
    }

    /// Replace the current selection: everything is disconnected, then only
    /// `exchange_ids` are connected.
    ///
    /// Unlike [`disconnect_all`](Self::disconnect_all), subscribers are kept,
    /// so consumers registered before a selection change keep receiving ticks
    /// from the newly selected exchanges without re-subscribing. Nothing is
    /// torn down if any id is unknown.
    pub fn connect_to_selected(&self, exchange_ids: &[String], symbols: &[String]) -> Result<(), MxError> {
        for id in exchange_ids {
            self.registry.get(id)?;
        }
        self.disconnect_connections();
        info!("connecting to {} exchanges for {} symbols", exchange_ids.len(), symbols.len());
        for id in exchange_ids {
            self.connect(id, symbols)?;
        }
        Ok(())
    }

    fn disconnect_connections(&self) {
        let drained: Vec<Arc<Connection>> = self.connections.lock().drain().map(|(_, c)| c).collect();
        for conn in drained {
            conn.disconnect();
        }
    }

    pub fn subscribe(&self, symbol: &str, callback: TickCallback) -> bool {
        self.subscribers.subscribe(symbol, callback)
    }

    pub fn unsubscribe(&self, symbol: &str, callback: &TickCallback) -> bool {
        self.subscribers.unsubscribe(symbol, callback)
    }

    pub fn subscribers(&self) -> &Arc<SubscriberRegistry> {
        &self.subscribers
    }

    pub fn available_exchanges(&self) -> Vec<ExchangeInfo> {
        self.registry.list()
    }

    /// `exchange id → connected` for every known exchange.
    pub fn connection_status(&self) -> BTreeMap<String, bool> {
        let connections = self.connections.lock();
        self.registry
            .ids()
            .map(|id| (id.to_string(), connections.get(id).is_some_and(|c| c.is_connected())))
            .collect()
    }

    /// Stats for each live connection, ordered by exchange id.
    pub fn connection_stats(&self) -> Vec<ConnectionStats> {
        let mut stats: Vec<ConnectionStats> = self.live().iter().map(|c| c.stats()).collect();
        stats.sort_by(|a, b| a.exchange_id.cmp(&b.exchange_id));
        stats
    }

    /// Percentage of live connections currently connected.
    pub fn health_score(&self) -> u8 {
        let live = self.live();
        if live.is_empty() {
            return 0;
        }
        let up = live.iter().filter(|c| c.is_connected()).count();
        (up * 100 / live.len()) as u8
    }

    /// Open a fresh session for one exchange now.
    pub fn force_reconnect(&self, exchange_id: &str) -> Result<bool, MxError> {
        self.registry.get(exchange_id)?;
        let conn = self.connections.lock().get(exchange_id).cloned();
        Ok(conn.is_some_and(|c| c.force_reconnect()))
    }

    /// Force a fresh session on every connected link silent for `max_idle`.
    /// Returns the affected exchange ids.
    pub fn reconnect_stale(&self, max_idle: Duration) -> Vec<String> {
        let mut reconnected = Vec::new();
        for conn in self.live() {
            if conn.is_stale(max_idle) && conn.force_reconnect() {
                reconnected.push(conn.id().to_string());
            }
        }
        reconnected.sort();
        reconnected
    }

    /// Reopen links that ended with a non-recoverable close code and are
    /// still wanted. Each link gets a bounded number of reopens between
    /// successful opens. Returns the affected exchange ids.
    pub fn repair_closed(&self) -> Vec<String> {
        let mut repaired: Vec<String> =
            self.live().into_iter().filter(|c| c.repair()).map(|c| c.id().to_string()).collect();
        repaired.sort();
        repaired
    }

    /// Snapshot of live connections, so no connection lock is taken under
    /// the table lock.
    fn live(&self) -> Vec<Arc<Connection>> {
        self.connections.lock().values().cloned().collect()
    }
}

impl Drop for ConnectionManager {
    fn drop(&mut self) {
        self.disconnect_connections();
    }
}
