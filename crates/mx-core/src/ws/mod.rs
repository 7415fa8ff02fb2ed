//! WebSocket transport: one session per socket, lifecycle reported through
//! [`SessionHandler`].

pub mod client;

pub use client::{
    CLOSE_ABNORMAL, CLOSE_NO_STATUS, Connector, PingConfig, PingPayload, Session, SessionHandler, WsConnConfig,
    WsConnection, WsConnector,
};
