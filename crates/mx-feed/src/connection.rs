//! Per-exchange connection state machine.
//!
//! A [`Connection`] owns at most one transport session at a time and decides
//! what happens when it ends: retry after a backoff, sit out a cooldown, or
//! stay down. Every session is tagged with a generation number; events and
//! timers from an older generation are ignored, so a late close from a
//! replaced socket can never schedule a second reconnect.
//!
//! ```text
//! Disconnected ─connect─▶ Connecting ─open─▶ Connected
//!                            ▲                  │ close 1000/1005/1006
//!                            │                  ▼
//!                            ├──timer── Reconnecting   (attempt < max)
//!                            ├──timer── CoolingDown    (attempt = max, counter reset)
//!                            └──repair── Closed        (other close codes, up to 5 reopens)
//! ```
//!
//! Requires a tokio runtime: reconnect timers are spawned tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use mx_core::retry::RetryPolicy;
use mx_core::throttle::{LogThrottle, ThrottleConfig};
use mx_core::time_util;
use mx_core::ws::{CLOSE_ABNORMAL, CLOSE_NO_STATUS, Connector, Session, SessionHandler, WsConnConfig};

use crate::descriptor::ExchangeDescriptor;
use crate::frame::{self, Frame};
use crate::subscribers::SubscriberRegistry;

/// Normal closure.
const CLOSE_NORMAL: u16 = 1000;

/// Parse failures are logged at most once per minute per exchange.
const PARSE_LOG_WINDOW_MS: u64 = 60_000;

/// Reopen attempts for a `Closed` link before it is left alone.
pub const MAX_REPAIR_ATTEMPTS: u32 = 5;

/// Close codes after which the connection retries.
pub fn is_recoverable_close(code: u16) -> bool {
    matches!(code, CLOSE_NORMAL | CLOSE_NO_STATUS | CLOSE_ABNORMAL)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Ended with a non-recoverable close code; waits for an explicit connect.
    Closed,
    /// Waiting on a backoff timer.
    Reconnecting,
    /// Retries exhausted; waiting on the cooldown timer.
    CoolingDown,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closed => "closed",
            Self::Reconnecting => "reconnecting",
            Self::CoolingDown => "cooling_down",
        };
        f.write_str(s)
    }
}

/// Point-in-time view of one connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConnectionStats {
    pub exchange_id: String,
    pub state: ConnectionState,
    pub subscribed_symbols: Vec<String>,
    pub retry_attempts: u32,
    pub consecutive_failures: u32,
    pub last_error_ms: Option<u64>,
    /// Delay of the pending backoff or cooldown timer.
    pub next_retry_delay_ms: Option<u64>,
    pub messages: u64,
    pub ticks: u64,
    pub parse_errors: u64,
    pub transport_errors: u64,
    pub closes: u64,
    pub reconnects: u64,
    pub last_message_ms: Option<u64>,
}

/// Tuning shared by every connection of a manager.
#[derive(Debug, Clone, Default)]
pub struct ConnectionSettings {
    pub retry: RetryPolicy,
    pub error_log: ThrottleConfig,
}

struct ConnInner {
    state: ConnectionState,
    /// Symbols the caller asked for; re-sent on every session.
    requested_symbols: Vec<String>,
    /// Symbols of the last session that completed its subscribe step.
    subscribed_symbols: Vec<String>,
    consecutive_failures: u32,
    retry_attempts: u32,
    last_error_ms: Option<u64>,
    reconnect_enabled: bool,
    /// Reopens of a `Closed` link since the last successful open.
    repair_attempts: u32,

    generation: u64,
    session: Option<Box<dyn Session>>,
    timer: Option<JoinHandle<()>>,
    next_delay: Option<Duration>,

    error_log: LogThrottle,
    close_log: LogThrottle,
    parse_log: LogThrottle,

    messages: u64,
    ticks: u64,
    parse_errors: u64,
    transport_errors: u64,
    closes: u64,
    reconnects: u64,
    last_message_ms: Option<u64>,
    last_activity: Option<Instant>,
}

impl ConnInner {
    fn cancel_timer(&mut self) {
        if let Some(timer) = self.timer.take() {
            timer.abort();
        }
        self.next_delay = None;
    }
}

pub struct Connection {
    descriptor: Arc<dyn ExchangeDescriptor>,
    subscribers: Arc<SubscriberRegistry>,
    connector: Arc<dyn Connector>,
    retry: RetryPolicy,
    me: Weak<Connection>,
    inner: Mutex<ConnInner>,
}

impl Connection {
    pub fn new(
        descriptor: Arc<dyn ExchangeDescriptor>,
        subscribers: Arc<SubscriberRegistry>,
        connector: Arc<dyn Connector>,
        settings: &ConnectionSettings,
    ) -> Arc<Self> {
        let inner = ConnInner {
            state: ConnectionState::Disconnected,
            requested_symbols: Vec::new(),
            subscribed_symbols: Vec::new(),
            consecutive_failures: 0,
            retry_attempts: 0,
            last_error_ms: None,
            reconnect_enabled: false,
            repair_attempts: 0,
            generation: 0,
            session: None,
            timer: None,
            next_delay: None,
            error_log: LogThrottle::new(settings.error_log),
            close_log: LogThrottle::new(settings.error_log),
            parse_log: LogThrottle::windowed(PARSE_LOG_WINDOW_MS),
            messages: 0,
            ticks: 0,
            parse_errors: 0,
            transport_errors: 0,
            closes: 0,
            reconnects: 0,
            last_message_ms: None,
            last_activity: None,
        };
        Arc::new_cyclic(|me| Self {
            descriptor,
            subscribers,
            connector,
            retry: settings.retry.clone(),
            me: me.clone(),
            inner: Mutex::new(inner),
        })
    }

    pub fn id(&self) -> &'static str {
        self.descriptor.id()
    }

    /// Open a session for `symbols`, replacing any current one.
    ///
    /// Ignored while a connect or backoff is already in flight.
    pub fn connect(&self, symbols: &[String]) {
        let generation = {
            let mut inner = self.inner.lock();
            if matches!(inner.state, ConnectionState::Connecting | ConnectionState::Reconnecting) {
                info!("[{}] connect ignored: already {}", self.id(), inner.state);
                return;
            }
            inner.reconnect_enabled = true;
            inner.repair_attempts = 0;
            inner.requested_symbols = symbols.to_vec();
            inner.cancel_timer();
            inner.generation
        };
        self.open_session(generation);
    }

    /// Stop for good: no timer survives, no reconnect follows. Idempotent.
    pub fn disconnect(&self) {
        let session = {
            let mut inner = self.inner.lock();
            inner.reconnect_enabled = false;
            inner.cancel_timer();
            inner.generation += 1;
            if inner.state != ConnectionState::Disconnected {
                info!("[{}] disconnected", self.id());
            }
            inner.state = ConnectionState::Disconnected;
            inner.subscribed_symbols.clear();
            inner.session.take()
        };
        if let Some(mut session) = session {
            session.close();
        }
    }

    /// Replace the current session immediately, keeping retry counters.
    ///
    /// Returns `false` when the connection was explicitly disconnected.
    pub fn force_reconnect(&self) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            if !inner.reconnect_enabled {
                return false;
            }
            inner.cancel_timer();
            inner.reconnects += 1;
            inner.generation
        };
        info!("[{}] forcing a fresh session", self.id());
        self.open_session(generation)
    }

    /// Reopen a link that ended with a non-recoverable close code.
    ///
    /// Only applies to `Closed` links the caller still wants up, and gives up
    /// after [`MAX_REPAIR_ATTEMPTS`] reopens without a successful open.
    pub fn repair(&self) -> bool {
        let generation = {
            let mut inner = self.inner.lock();
            if inner.state != ConnectionState::Closed
                || !inner.reconnect_enabled
                || inner.repair_attempts >= MAX_REPAIR_ATTEMPTS
            {
                return false;
            }
            inner.repair_attempts += 1;
            inner.reconnects += 1;
            info!("[{}] reopening closed link ({}/{MAX_REPAIR_ATTEMPTS})", self.id(), inner.repair_attempts);
            inner.generation
        };
        self.open_session(generation)
    }

    pub fn state(&self) -> ConnectionState {
        self.inner.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Connected, but no frame for at least `max_idle`.
    pub fn is_stale(&self, max_idle: Duration) -> bool {
        let inner = self.inner.lock();
        inner.state == ConnectionState::Connected
            && inner.last_activity.is_some_and(|at| at.elapsed() >= max_idle)
    }

    pub fn stats(&self) -> ConnectionStats {
        let inner = self.inner.lock();
        ConnectionStats {
            exchange_id: self.id().to_string(),
            state: inner.state,
            subscribed_symbols: inner.subscribed_symbols.clone(),
            retry_attempts: inner.retry_attempts,
            consecutive_failures: inner.consecutive_failures,
            last_error_ms: inner.last_error_ms,
            next_retry_delay_ms: inner.next_delay.map(|d| d.as_millis() as u64),
            messages: inner.messages,
            ticks: inner.ticks,
            parse_errors: inner.parse_errors,
            transport_errors: inner.transport_errors,
            closes: inner.closes,
            reconnects: inner.reconnects,
            last_message_ms: inner.last_message_ms,
        }
    }

    /// Start a new session, unless the connection moved past `expected`
    /// (disconnected or replaced) since the caller looked at it.
    fn open_session(&self, expected: u64) -> bool {
        let (old, generation, symbols) = {
            let mut inner = self.inner.lock();
            if inner.generation != expected || !inner.reconnect_enabled {
                debug!("[{}] session open skipped: superseded", self.id());
                return false;
            }
            inner.generation += 1;
            inner.state = ConnectionState::Connecting;
            (inner.session.take(), inner.generation, inner.requested_symbols.clone())
        };
        if let Some(mut old) = old {
            old.close();
        }

        let requests =
            if symbols.is_empty() { Vec::new() } else { self.descriptor.subscribe_requests(&symbols) };
        let handler = Arc::new(SessionEvents { conn: self.me.clone(), generation, symbols, requests });
        let config = WsConnConfig {
            label: self.id().to_string(),
            url: self.descriptor.endpoint().to_string(),
            extra_headers: HashMap::new(),
            ping: self.descriptor.ping(),
        };
        debug!("[{}] opening session #{generation}", self.id());
        let mut session = self.connector.open(config, handler);

        let mut inner = self.inner.lock();
        if inner.generation == generation {
            inner.session = Some(session);
        } else {
            drop(inner);
            session.close();
        }
        true
    }

    fn handle_open(&self, generation: u64, symbols: &[String]) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        inner.state = ConnectionState::Connected;
        inner.subscribed_symbols = symbols.to_vec();
        inner.retry_attempts = 0;
        inner.repair_attempts = 0;
        inner.consecutive_failures = 0;
        inner.cancel_timer();
        inner.error_log.reset();
        inner.close_log.reset();
        inner.last_activity = Some(Instant::now());
        info!("[{}] connected, subscribed to {} symbols", self.id(), symbols.len());
    }

    /// Returns the keep-alive answer owed to the server, if any.
    fn handle_frame(&self, generation: u64, frame: Frame<'_>) -> Option<String> {
        let connected = {
            let mut inner = self.inner.lock();
            if inner.generation != generation {
                return None;
            }
            inner.messages += 1;
            inner.last_message_ms = Some(time_util::now_ms());
            inner.last_activity = Some(Instant::now());
            inner.state == ConnectionState::Connected
        };

        let text = frame::decode(frame)?;
        if let Some(reply) = self.descriptor.keepalive_reply(&text) {
            return Some(reply);
        }
        if !connected {
            return None;
        }

        let ticks = match self.descriptor.parse_text(&text) {
            Ok(ticks) => ticks,
            Err(e) => {
                let mut inner = self.inner.lock();
                inner.parse_errors += 1;
                if inner.parse_log.should_log(time_util::now_ms()) {
                    warn!("[{}] dropping undecodable frame ({} so far): {e}", self.id(), inner.parse_errors);
                }
                return None;
            }
        };
        if ticks.is_empty() {
            return None;
        }

        for tick in &ticks {
            self.subscribers.fan_out(tick);
        }
        self.inner.lock().ticks += ticks.len() as u64;
        None
    }

    fn handle_error(&self, generation: u64, error: &str) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        let now = time_util::now_ms();
        inner.consecutive_failures = inner.consecutive_failures.saturating_add(1);
        inner.transport_errors += 1;
        inner.last_error_ms = Some(now);
        if inner.error_log.should_log(now) {
            warn!(
                "[{}] transport error #{} ({} consecutive): {error}",
                self.id(),
                inner.error_log.count(),
                inner.consecutive_failures
            );
        }
    }

    fn handle_close(&self, generation: u64, code: u16) {
        let mut inner = self.inner.lock();
        if inner.generation != generation {
            return;
        }
        inner.session = None;
        inner.subscribed_symbols.clear();
        inner.closes += 1;
        let id = self.id();

        if !inner.reconnect_enabled {
            inner.state = ConnectionState::Disconnected;
            return;
        }
        if !is_recoverable_close(code) {
            inner.state = ConnectionState::Closed;
            warn!("[{id}] closed with code {code}; not reconnecting");
            return;
        }

        inner.retry_attempts += 1;
        let attempt = inner.retry_attempts;
        let failures = inner.consecutive_failures;
        let max = self.retry.max_retries(failures);
        let log = inner.close_log.should_log(time_util::now_ms());

        let delay = if attempt < max {
            let delay = self.retry.backoff_delay(attempt - 1, failures);
            inner.state = ConnectionState::Reconnecting;
            if log {
                info!("[{id}] closed ({code}); retry {attempt}/{max} in {}s", delay.as_secs());
            }
            delay
        } else {
            let delay = self.retry.cooldown_duration(failures);
            inner.state = ConnectionState::CoolingDown;
            if log {
                warn!(
                    "[{id}] closed ({code}); {attempt} retries used, cooling down for {}s ({failures} consecutive failures)",
                    delay.as_secs()
                );
            }
            delay
        };
        self.schedule(&mut inner, generation, delay);
    }

    fn schedule(&self, inner: &mut ConnInner, generation: u64, delay: Duration) {
        inner.cancel_timer();
        let me = self.me.clone();
        inner.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Some(conn) = me.upgrade() {
                conn.fire_timer(generation);
            }
        }));
        inner.next_delay = Some(delay);
    }

    fn fire_timer(&self, generation: u64) {
        {
            let mut inner = self.inner.lock();
            if inner.generation != generation || !inner.reconnect_enabled {
                return;
            }
            // This task is the timer; dropping its handle detaches it.
            inner.timer = None;
            inner.next_delay = None;
            if inner.state == ConnectionState::CoolingDown {
                inner.retry_attempts = 0;
                info!("[{}] cooldown over, reconnecting", self.id());
            }
            inner.reconnects += 1;
        }
        self.open_session(generation);
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        let inner = self.inner.get_mut();
        inner.cancel_timer();
        if let Some(mut session) = inner.session.take() {
            session.close();
        }
    }
}

/// Handler for one session generation.
struct SessionEvents {
    conn: Weak<Connection>,
    generation: u64,
    symbols: Vec<String>,
    requests: Vec<String>,
}

impl SessionHandler for SessionEvents {
    fn subscribe_requests(&self) -> Vec<String> {
        self.requests.clone()
    }

    fn on_open(&self) {
        if let Some(conn) = self.conn.upgrade() {
            conn.handle_open(self.generation, &self.symbols);
        }
    }

    fn on_text(&self, text: &str) -> Option<String> {
        self.conn.upgrade()?.handle_frame(self.generation, Frame::Text(text))
    }

    fn on_binary(&self, data: &[u8]) -> Option<String> {
        self.conn.upgrade()?.handle_frame(self.generation, Frame::Binary(data))
    }

    fn on_error(&self, error: &str) {
        if let Some(conn) = self.conn.upgrade() {
            conn.handle_error(self.generation, error);
        }
    }

    fn on_close(&self, code: u16) {
        if let Some(conn) = self.conn.upgrade() {
            conn.handle_close(self.generation, code);
        }
    }
}
