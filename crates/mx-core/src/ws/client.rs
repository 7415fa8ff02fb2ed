//! Single WebSocket session with keep-alive pings.
//!
//! Each `WsConnection` runs as a tokio task that:
//! 1. Connects to the exchange WebSocket endpoint (TLS).
//! 2. Sends the subscription messages supplied by the handler.
//! 3. Reports `on_open`, then forwards every frame to the handler.
//! 4. Sends periodic ping messages (exchange-specific format).
//! 5. Reports the close code exactly once and exits.
//!
//! The session never reconnects on its own. Whoever owns the handler decides
//! whether and when a new session is opened.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::watch;
use tokio::time::Interval;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

/// Close code reported when the peer sent a close frame without a status.
pub const CLOSE_NO_STATUS: u16 = 1005;

/// Close code reported when the connection dropped without a close frame.
pub const CLOSE_ABNORMAL: u16 = 1006;

/// Ping payload format: varies by exchange.
#[derive(Debug, Clone, PartialEq)]
pub enum PingPayload {
    /// Send a text frame (e.g. OKX/Bitget send `"ping"`).
    Text(String),
    /// Send a JSON object as text (e.g. Bybit `{"op":"ping"}`).
    Json(serde_json::Value),
    /// Use the standard WebSocket ping frame.
    WebSocketPing,
}

/// Ping / keep-alive configuration for a WebSocket connection.
#[derive(Debug, Clone, PartialEq)]
pub struct PingConfig {
    pub interval: Duration,
    pub payload: PingPayload,
}

/// Configuration for a single WebSocket session.
#[derive(Debug, Clone)]
pub struct WsConnConfig {
    /// Log prefix (usually the exchange id).
    pub label: String,
    /// Full WebSocket URL (e.g. `wss://stream.binance.com:9443/ws`).
    pub url: String,
    /// Extra HTTP headers for the handshake.
    pub extra_headers: HashMap<String, String>,
    /// Keep-alive ping, if the exchange needs one from the client.
    pub ping: Option<PingConfig>,
}

/// Receives the lifecycle events of one session.
///
/// Calls for one session are serialized: they all come from the session's
/// own task, in wire order.
pub trait SessionHandler: Send + Sync {
    /// Messages to send right after the socket opens.
    fn subscribe_requests(&self) -> Vec<String>;
    /// Socket open and every subscribe request sent.
    fn on_open(&self);
    /// Inbound text frame. A returned string is sent back as a text frame.
    fn on_text(&self, text: &str) -> Option<String>;
    /// Inbound binary frame. A returned string is sent back as a text frame.
    fn on_binary(&self, data: &[u8]) -> Option<String>;
    /// Transport-level failure. A close report follows.
    fn on_error(&self, error: &str);
    /// Session over. Not called when the session was shut down locally.
    fn on_close(&self, code: u16);
}

/// A running session that can be asked to stop.
pub trait Session: Send {
    /// Request shutdown. Returns immediately.
    fn close(&mut self);
}

/// Opens sessions. The seam between connection logic and real sockets.
pub trait Connector: Send + Sync {
    fn open(&self, config: WsConnConfig, handler: Arc<dyn SessionHandler>) -> Box<dyn Session>;
}

/// [`Connector`] backed by `tokio-tungstenite`. Requires a tokio runtime.
#[derive(Debug, Clone, Copy, Default)]
pub struct WsConnector;

impl Connector for WsConnector {
    fn open(&self, config: WsConnConfig, handler: Arc<dyn SessionHandler>) -> Box<dyn Session> {
        let mut conn = WsConnection::new(config);
        conn.start(handler);
        Box::new(conn)
    }
}

/// A single WebSocket session managed by a background tokio task.
pub struct WsConnection {
    /// Session configuration.
    pub config: WsConnConfig,
    /// Shutdown signal sender.
    shutdown_tx: Option<watch::Sender<bool>>,
    /// Task join handle.
    task: Option<tokio::task::JoinHandle<()>>,
}

impl WsConnection {
    /// Create a new (not yet started) session.
    pub fn new(config: WsConnConfig) -> Self {
        Self { config, shutdown_tx: None, task: None }
    }

    /// Start the session task.
    pub fn start(&mut self, handler: Arc<dyn SessionHandler>) {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let config = self.config.clone();

        let task = tokio::spawn(async move {
            run_session(config, handler, shutdown_rx).await;
        });

        self.shutdown_tx = Some(shutdown_tx);
        self.task = Some(task);
    }

    /// Signal shutdown without waiting. The task closes the socket itself.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        self.task.take();
    }
}

impl Session for WsConnection {
    fn close(&mut self) {
        self.stop();
    }
}

/// One session: connect, subscribe, read, ping, report close.
async fn run_session(
    config: WsConnConfig,
    handler: Arc<dyn SessionHandler>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let label = &config.label;
    info!("[{label}] connecting to {}", config.url);

    let ws_stream = tokio::select! {
        res = connect_ws(&config) => match res {
            Ok(s) => s,
            Err(e) => {
                handler.on_error(&format!("connect failed: {e}"));
                handler.on_close(CLOSE_ABNORMAL);
                return;
            }
        },
        _ = shutdown_rx.changed() => return,
    };

    let (mut ws_write, mut ws_read) = ws_stream.split();

    for sub_msg in handler.subscribe_requests() {
        debug!("[{label}] subscribing: {sub_msg}");
        if let Err(e) = ws_write.send(Message::Text(sub_msg.into())).await {
            handler.on_error(&format!("subscribe send failed: {e}"));
            handler.on_close(CLOSE_ABNORMAL);
            return;
        }
    }
    handler.on_open();

    let mut ping_timer = config.ping.as_ref().map(|p| {
        let start = tokio::time::Instant::now() + p.interval;
        tokio::time::interval_at(start, p.interval)
    });

    let code = loop {
        tokio::select! {
            _ = shutdown_rx.changed() => {
                debug!("[{label}] shutdown signal received");
                let _ = ws_write.close().await;
                return;
            }

            msg = ws_read.next() => {
                let reply = match msg {
                    Some(Ok(Message::Text(text))) => handler.on_text(text.as_str()).map(|r| Message::Text(r.into())),
                    Some(Ok(Message::Binary(data))) => handler.on_binary(&data[..]).map(|r| Message::Text(r.into())),
                    Some(Ok(Message::Ping(data))) => Some(Message::Pong(data)),
                    Some(Ok(Message::Close(frame))) => {
                        break frame.map(|f| u16::from(f.code)).unwrap_or(CLOSE_NO_STATUS);
                    }
                    Some(Err(e)) => {
                        handler.on_error(&format!("read error: {e}"));
                        break CLOSE_ABNORMAL;
                    }
                    None => {
                        warn!("[{label}] stream ended");
                        break CLOSE_ABNORMAL;
                    }
                    _ => None, // Pong, Frame
                };
                if let Some(reply) = reply {
                    if let Err(e) = ws_write.send(reply).await {
                        handler.on_error(&format!("reply send failed: {e}"));
                        break CLOSE_ABNORMAL;
                    }
                }
            }

            _ = next_ping(&mut ping_timer) => {
                let ping_msg = match config.ping.as_ref().map(|p| &p.payload) {
                    Some(PingPayload::Text(t)) => Message::Text(t.clone().into()),
                    Some(PingPayload::Json(j)) => Message::Text(j.to_string().into()),
                    Some(PingPayload::WebSocketPing) | None => Message::Ping(Vec::new().into()),
                };
                if let Err(e) = ws_write.send(ping_msg).await {
                    handler.on_error(&format!("ping send failed: {e}"));
                    break CLOSE_ABNORMAL;
                }
            }
        }
    };

    handler.on_close(code);
}

/// Resolves on the next ping tick, or never when pinging is off.
async fn next_ping(timer: &mut Option<Interval>) {
    match timer {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Establish a TLS WebSocket connection.
async fn connect_ws(
    config: &WsConnConfig,
) -> anyhow::Result<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
> {
    use tokio_tungstenite::tungstenite::client::IntoClientRequest;
    use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};

    let mut request = config.url.as_str().into_client_request()?;
    for (key, value) in &config.extra_headers {
        request
            .headers_mut()
            .insert(HeaderName::from_bytes(key.as_bytes())?, HeaderValue::from_str(value)?);
    }

    let (stream, _response) = tokio_tungstenite::connect_async(request).await?;
    Ok(stream)
}


#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::{TcpListener, TcpStream};
    use tokio::sync::{mpsc, oneshot};
    use tokio_tungstenite::WebSocketStream;
    use tokio_tungstenite::tungstenite::protocol::CloseFrame;
    use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

    struct Events {
        tx: mpsc::UnboundedSender<String>,
        subs: Vec<String>,
    }

    impl SessionHandler for Events {
        fn subscribe_requests(&self) -> Vec<String> {
            let _ = self.tx.send("subscribe".into());
            self.subs.clone()
        }
        fn on_open(&self) {
            let _ = self.tx.send("open".into());
        }
        fn on_text(&self, text: &str) -> Option<String> {
            let _ = self.tx.send(format!("text:{text}"));
            (text == "Ping").then(|| "Pong".to_string())
        }
        fn on_binary(&self, data: &[u8]) -> Option<String> {
            let _ = self.tx.send(format!("binary:{}", data.len()));
            None
        }
        fn on_error(&self, _error: &str) {
            let _ = self.tx.send("error".into());
        }
        fn on_close(&self, code: u16) {
            let _ = self.tx.send(format!("close:{code}"));
        }
    }

    fn config(url: String) -> WsConnConfig {
        WsConnConfig { label: "test".into(), url, extra_headers: HashMap::new(), ping: None }
    }

    fn start(url: String, subs: &[&str]) -> (WsConnection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handler = Arc::new(Events { tx, subs: subs.iter().map(|s| s.to_string()).collect() });
        let mut conn = WsConnection::new(config(url));
        conn.start(handler);
        (conn, rx)
    }

    /// Collect events until the session task drops its handler.
    async fn drain(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
        let mut out = Vec::new();
        let collect = async {
            while let Some(ev) = rx.recv().await {
                out.push(ev);
            }
        };
        tokio::time::timeout(Duration::from_secs(5), collect).await.expect("session did not finish");
        out
    }

    async fn next_text(ws: &mut WebSocketStream<TcpStream>) -> Option<String> {
        while let Some(msg) = ws.next().await {
            if let Ok(Message::Text(t)) = msg {
                return Some(t.to_string());
            }
        }
        None
    }

    /// Accept one client on a loopback port and hand the socket to `serve`.
    async fn serve_once<F, Fut>(serve: F) -> String
    where
        F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = ()> + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let ws = tokio_tungstenite::accept_async(stream).await.unwrap();
            serve(ws).await;
        });
        format!("ws://{addr}/ws")
    }

    #[tokio::test]
    async fn subscribes_before_open_then_reports_normal_close() {
        let (first_tx, first_rx) = oneshot::channel();
        let url = serve_once(|mut ws| async move {
            let _ = first_tx.send(next_text(&mut ws).await);
            ws.send(Message::Text("hello".into())).await.unwrap();
            let _ = ws.close(Some(CloseFrame { code: CloseCode::Normal, reason: "bye".into() })).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let (_conn, mut rx) = start(url, &["sub-1"]);
        let events = drain(&mut rx).await;

        assert_eq!(first_rx.await.unwrap().as_deref(), Some("sub-1"));
        assert_eq!(events, vec!["subscribe", "open", "text:hello", "close:1000"]);
    }

    #[tokio::test]
    async fn close_without_status_reports_1005() {
        let url = serve_once(|mut ws| async move {
            next_text(&mut ws).await;
            let _ = ws.close(None).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let (_conn, mut rx) = start(url, &["sub"]);
        let events = drain(&mut rx).await;
        assert_eq!(events.last().map(String::as_str), Some("close:1005"));
    }

    #[tokio::test]
    async fn dropped_tcp_reports_1006_exactly_once() {
        let url = serve_once(|mut ws| async move {
            next_text(&mut ws).await;
            drop(ws);
        })
        .await;

        let (_conn, mut rx) = start(url, &["sub"]);
        let events = drain(&mut rx).await;
        let closes: Vec<_> = events.iter().filter(|e| e.starts_with("close:")).collect();
        assert_eq!(closes, vec!["close:1006"]);
        assert_eq!(events.last().map(String::as_str), Some("close:1006"));
    }

    #[tokio::test]
    async fn stop_after_open_reports_no_close() {
        let url = serve_once(|mut ws| async move { while ws.next().await.is_some() {} }).await;

        let (mut conn, mut rx) = start(url, &["sub"]);
        loop {
            match rx.recv().await.as_deref() {
                Some("open") => break,
                Some(_) => continue,
                None => panic!("session ended before open"),
            }
        }
        conn.stop();

        let rest = drain(&mut rx).await;
        assert!(rest.iter().all(|e| !e.starts_with("close:")), "{rest:?}");
    }

    #[tokio::test]
    async fn handler_reply_is_sent_back() {
        let (reply_tx, reply_rx) = oneshot::channel();
        let url = serve_once(|mut ws| async move {
            next_text(&mut ws).await;
            ws.send(Message::Text("Ping".into())).await.unwrap();
            let _ = reply_tx.send(next_text(&mut ws).await);
            let _ = ws.close(Some(CloseFrame { code: CloseCode::Normal, reason: "".into() })).await;
            while ws.next().await.is_some() {}
        })
        .await;

        let (_conn, mut rx) = start(url, &["sub"]);
        let events = drain(&mut rx).await;
        assert_eq!(reply_rx.await.unwrap().as_deref(), Some("Pong"));
        assert!(events.contains(&"text:Ping".to_string()));
    }

    #[tokio::test]
    async fn bad_url_reports_error_then_abnormal_close() {
        let (_conn, mut rx) = start("not a url".into(), &[]);
        let events = drain(&mut rx).await;
        assert_eq!(events, vec!["error", "close:1006"]);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_ping_timer_never_fires() {
        let mut timer: Option<Interval> = None;
        let fired = tokio::time::timeout(Duration::from_secs(3600), next_ping(&mut timer)).await;
        assert!(fired.is_err());
    }
}
