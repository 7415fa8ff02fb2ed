//! # mx-feed
//!
//! Live ticker feeds from several cryptocurrency exchanges behind one
//! exchange-agnostic connection manager.
//!
//! ## Architecture
//!
//! Each exchange is an [`ExchangeDescriptor`](descriptor::ExchangeDescriptor):
//! endpoint, subscription builder and parser. A [`Connection`](connection::Connection)
//! drives one descriptor through connect, subscribe, receive and reconnect,
//! handing parsed ticks to the shared [`SubscriberRegistry`](subscribers::SubscriberRegistry).
//! The [`ConnectionManager`](manager::ConnectionManager) owns one connection per
//! selected exchange.
//!
//! ## Shared infrastructure
//!
//! - [`registry`]: id → descriptor table
//! - [`frame`]: text/binary frame decoding
//! - [`json_util`]: JSON parsing helpers

pub mod binance;
pub mod bingx;
pub mod bitget;
pub mod bybit;
pub mod connection;
pub mod descriptor;
pub mod frame;
pub mod json_util;
pub mod manager;
pub mod okx;
pub mod registry;
pub mod subscribers;

#[cfg(test)]
pub(crate) mod test_support;

pub use connection::{ConnectionState, ConnectionStats};
pub use manager::ConnectionManager;
pub use registry::{ExchangeInfo, ExchangeRegistry};
pub use subscribers::TickCallback;
