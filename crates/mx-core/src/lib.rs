//! # mx-core
//!
//! Core crate for the multi-exchange ticker feed, providing:
//!
//! - **Types** (`types`): the normalized tick and symbol conversion helpers
//! - **Configuration** (`config`): JSON config deserialization
//! - **Error types** (`error`): domain-specific `MxError` via thiserror
//! - **Retry policy** (`retry`): pure backoff / cooldown computation
//! - **Log throttling** (`throttle`): counter + time-window log suppression
//! - **WebSocket** (`ws`): single-session WS transport behind a `Connector` seam
//! - **Time utilities** (`time_util`): wall-clock timestamps
//! - **Logging** (`logging`): tracing-based structured logging

pub mod config;
pub mod error;
pub mod logging;
pub mod retry;
pub mod throttle;
pub mod time_util;
pub mod types;
pub mod ws;

// Re-export types at crate root for convenience.
pub use types::*;
