//! Socket-free transport for connection and manager tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use mx_core::ws::{Connector, Session, SessionHandler, WsConnConfig};

/// One session opened through [`RecordingConnector`].
#[derive(Clone)]
pub(crate) struct Recorded {
    pub config: WsConnConfig,
    pub handler: Arc<dyn SessionHandler>,
    pub closed: Arc<AtomicBool>,
}

struct FakeSession {
    closed: Arc<AtomicBool>,
}

impl Session for FakeSession {
    fn close(&mut self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

/// Records every `open` and never touches the handler itself; tests drive
/// the lifecycle through [`Recorded::handler`].
#[derive(Default)]
pub(crate) struct RecordingConnector {
    sessions: Mutex<Vec<Recorded>>,
}

impl RecordingConnector {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn session(&self, index: usize) -> Recorded {
        self.sessions.lock()[index].clone()
    }

    pub fn last(&self) -> Recorded {
        let sessions = self.sessions.lock();
        sessions[sessions.len() - 1].clone()
    }

    /// Sessions opened for one exchange label, oldest first.
    pub fn for_label(&self, label: &str) -> Vec<Recorded> {
        self.sessions.lock().iter().filter(|s| s.config.label == label).cloned().collect()
    }
}

impl Recorded {
    /// What the real transport does on a successful handshake.
    pub fn open(&self) -> Vec<String> {
        let requests = self.handler.subscribe_requests();
        self.handler.on_open();
        requests
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Connector for RecordingConnector {
    fn open(&self, config: WsConnConfig, handler: Arc<dyn SessionHandler>) -> Box<dyn Session> {
        let closed = Arc::new(AtomicBool::new(false));
        self.sessions.lock().push(Recorded { config, handler, closed: closed.clone() });
        Box::new(FakeSession { closed })
    }
}
