//! Test utilities: an in-memory transport and log capture
//!
//! [`MockConnector`] stands in for the WebSocket transport. Every successful
//! connection attempt hands the test a [`MockServer`] that can push frames to
//! the client, read the commands it sent, and drop the session.

#![cfg(any(test, feature = "benchmark"))]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::mpsc;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use url::Url;

use crate::transport::{Connector, TransportSession};
use crate::types::Command;
use crate::{Result, SyncError};

/// Frames a realistic timer would send during a short race.
pub fn sample_frames() -> Vec<String> {
    vec![
        r#"{"type":"race_state","active":true}"#.to_string(),
        r#"{"type":"status","current_rssi":48,"peak_rssi":52,"lap_count":0,"crossing":false}"#
            .to_string(),
        r#"{"type":"status","current_rssi":171,"peak_rssi":187,"lap_count":0,"crossing":true}"#
            .to_string(),
        r#"{"type":"lap","lap_time_ms":0,"rssi_peak":187}"#.to_string(),
        r#"{"type":"lap","lap_time_ms":45230,"rssi_peak":181}"#.to_string(),
        r#"{"type":"lap","lap_time_ms":44980,"rssi_peak":176}"#.to_string(),
        r#"{"type":"status","current_rssi":40,"peak_rssi":0,"lap_count":3,"crossing":false}"#
            .to_string(),
        r#"{"type":"race_state","active":false}"#.to_string(),
    ]
}

enum ServerFrame {
    Text(String),
    Close,
    Fail(String),
}

struct Shared {
    attempts: AtomicUsize,
    refusals: AtomicUsize,
    servers: mpsc::UnboundedSender<MockServer>,
}

/// In-memory connector; clones share attempt counters
#[derive(Clone)]
pub struct MockConnector {
    shared: Arc<Shared>,
}

impl MockConnector {
    /// Create a connector and the queue its accepted sessions arrive on.
    pub fn new() -> (Self, MockServers) {
        let (servers, accepted) = mpsc::unbounded_channel();
        let shared = Shared { attempts: AtomicUsize::new(0), refusals: AtomicUsize::new(0), servers };
        (Self { shared: Arc::new(shared) }, MockServers { accepted })
    }

    /// Number of connection attempts made so far, successful or not.
    pub fn attempts(&self) -> usize {
        self.shared.attempts.load(Ordering::SeqCst)
    }

    /// Refuse the next `count` connection attempts.
    pub fn refuse_next(&self, count: usize) {
        self.shared.refusals.store(count, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl Connector for MockConnector {
    type Session = MockSession;

    async fn connect(&self, endpoint: &Url) -> Result<MockSession> {
        self.shared.attempts.fetch_add(1, Ordering::SeqCst);

        let refused = self
            .shared
            .refusals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if refused {
            return Err(SyncError::transport(format!("connection to {} refused", endpoint)));
        }

        let (frames_tx, frames_rx) = mpsc::unbounded_channel();
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let server = MockServer { frames: frames_tx, sent: sent_rx };
        self.shared
            .servers
            .send(server)
            .map_err(|_| SyncError::transport("mock server queue dropped"))?;

        Ok(MockSession { frames: frames_rx, sent: sent_tx })
    }
}

/// Queue of sessions accepted by a [`MockConnector`]
pub struct MockServers {
    accepted: mpsc::UnboundedReceiver<MockServer>,
}

impl MockServers {
    /// Wait for the next accepted session.
    pub async fn accept(&mut self) -> MockServer {
        self.accepted.recv().await.expect("mock connector dropped")
    }

    pub fn try_accept(&mut self) -> Option<MockServer> {
        self.accepted.try_recv().ok()
    }
}

/// The timer's end of one mock session
pub struct MockServer {
    frames: mpsc::UnboundedSender<ServerFrame>,
    sent: mpsc::UnboundedReceiver<String>,
}

impl MockServer {
    /// Send a raw text frame to the client.
    pub fn push(&self, text: impl Into<String>) {
        let _ = self.frames.send(ServerFrame::Text(text.into()));
    }

    /// Close the session cleanly.
    pub fn close(&self) {
        let _ = self.frames.send(ServerFrame::Close);
    }

    /// Fail the session with a transport error.
    pub fn fail(&self, reason: impl Into<String>) {
        let _ = self.frames.send(ServerFrame::Fail(reason.into()));
    }

    /// Next command from the client; `None` once the client closed the session.
    pub async fn next_command(&mut self) -> Option<Command> {
        let text = self.sent.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent an invalid command"))
    }

    /// Next raw frame from the client, if one is already waiting.
    pub fn try_next_raw(&mut self) -> Option<String> {
        self.sent.try_recv().ok()
    }
}

/// The client's end of one mock session
pub struct MockSession {
    frames: mpsc::UnboundedReceiver<ServerFrame>,
    sent: mpsc::UnboundedSender<String>,
}

#[async_trait::async_trait]
impl TransportSession for MockSession {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.sent.send(text).map_err(|_| SyncError::transport("mock server gone"))
    }

    async fn next_text(&mut self) -> Result<Option<String>> {
        match self.frames.recv().await {
            Some(ServerFrame::Text(text)) => Ok(Some(text)),
            Some(ServerFrame::Close) | None => Ok(None),
            Some(ServerFrame::Fail(reason)) => Err(SyncError::transport(reason)),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.frames.close();
        Ok(())
    }
}

/// Counts WARN events; install with [`WarningCounter::install`].
#[derive(Clone, Default)]
pub struct WarningCounter {
    count: Arc<AtomicUsize>,
}

impl WarningCounter {
    /// Route this thread's events through a fresh counter.
    pub fn install() -> (Self, tracing::subscriber::DefaultGuard) {
        use tracing_subscriber::layer::SubscriberExt;

        let counter = Self::default();
        let subscriber = tracing_subscriber::registry().with(counter.clone());
        let guard = tracing::subscriber::set_default(subscriber);
        (counter, guard)
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

impl<S: Subscriber> Layer<S> for WarningCounter {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() == Level::WARN {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }
}
