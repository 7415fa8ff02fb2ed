//! Typed error definitions for the multi-exchange feed.
//!
//! [`MxError`] covers the failures a caller can observe directly. Transport
//! failures and undecodable frames are normally absorbed by the connection
//! state machine and only show up here when a component reports them upward.

use thiserror::Error;

/// Domain-specific errors for the feed.
#[derive(Debug, Error)]
pub enum MxError {
    /// Configuration parsing or validation error.
    #[error("config error: {0}")]
    Config(String),

    /// A frame that could not be decoded at all.
    #[error("parse error: {0}")]
    Parse(String),

    /// The caller named an exchange that has no descriptor.
    #[error("unknown exchange: {0}")]
    UnknownExchange(String),
}
