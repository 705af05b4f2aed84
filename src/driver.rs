//! Driver owns the transport session and the race model
//!
//! One spawned task runs the whole client: it connects, resynchronises, reads
//! frames, applies them to the model, publishes notifications and delivers
//! commands. Handles talk to it over a request channel, so nothing else ever
//! touches the session or mutates the model.
//!
//! Lifecycle per attempt:
//!
//! ```text
//! Connecting --connect ok--> Open --frame error / peer close / idle--> wait delay --> Connecting
//!     |                        |
//!     +--connect failed--------+--------> wait delay --> Connecting
//!
//! cancel (close / all handles dropped) from any state --> Closed
//! ```

use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::codec::{self, Envelope};
use crate::hub::{Notification, NotificationHub};
use crate::model::{ModelChange, RaceModel};
use crate::transport::{Connector, TransportSession};
use crate::types::{Command, ConnectionState, SessionId, StatusSnapshot};
use crate::{Result, SyncError};

/// Upper bound on a graceful close before the session is simply dropped
const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

/// Work submitted by client handles
pub(crate) enum Request {
    /// Deliver one command if a session is open
    Send { command: Command, reply: oneshot::Sender<Result<()>> },
    /// Re-request full state from the timer
    Refresh { reply: oneshot::Sender<Result<()>> },
    /// Clear laps locally, then ask the timer to reset
    ResetRace { reply: oneshot::Sender<Result<()>> },
}

/// Settings the driver needs from the client config
pub(crate) struct DriverSettings {
    pub endpoint: Url,
    pub reconnect_delay: Duration,
    pub idle_timeout: Option<Duration>,
    pub resync_on_connect: bool,
    pub request_buffer: usize,
}

/// Channels returned by [`Driver::spawn`]
pub(crate) struct DriverChannels {
    pub requests: mpsc::Sender<Request>,
    pub state: watch::Receiver<ConnectionState>,
    pub model: watch::Receiver<Arc<RaceModel>>,
    pub status: watch::Receiver<Option<StatusSnapshot>>,
    pub notifications: broadcast::Sender<Notification>,
    pub cancel: CancellationToken,
}

enum Connect<S> {
    Opened(S),
    Failed,
    Cancelled,
}

enum SessionEnd {
    Lost,
    Cancelled,
}

/// The connection manager task
pub(crate) struct Driver<C: Connector> {
    connector: Arc<C>,
    settings: DriverSettings,
    requests: mpsc::Receiver<Request>,
    model: RaceModel,
    hub: NotificationHub,
    state: ConnectionState,
    state_tx: watch::Sender<ConnectionState>,
    model_tx: watch::Sender<Arc<RaceModel>>,
    status_tx: watch::Sender<Option<StatusSnapshot>>,
    cancel: CancellationToken,
    sessions_opened: u64,
}

impl<C: Connector> Driver<C> {
    /// Spawn the driver task
    ///
    /// Must be called from within a Tokio runtime.
    pub fn spawn(connector: C, settings: DriverSettings, hub: NotificationHub) -> DriverChannels {
        let (request_tx, request_rx) = mpsc::channel(settings.request_buffer.max(1));
        let (state_tx, state_rx) = watch::channel(ConnectionState::Connecting);
        let (model_tx, model_rx) = watch::channel(Arc::new(RaceModel::new()));
        let (status_tx, status_rx) = watch::channel(None);
        let notifications = hub.sender();
        let cancel = CancellationToken::new();

        let driver = Driver {
            connector: Arc::new(connector),
            settings,
            requests: request_rx,
            model: RaceModel::new(),
            hub,
            state: ConnectionState::Connecting,
            state_tx,
            model_tx,
            status_tx,
            cancel: cancel.clone(),
            sessions_opened: 0,
        };

        tokio::spawn(driver.run());

        DriverChannels {
            requests: request_tx,
            state: state_rx,
            model: model_rx,
            status: status_rx,
            notifications,
            cancel,
        }
    }

    async fn run(mut self) {
        info!(endpoint = %self.settings.endpoint, "Connection manager started");
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            self.set_state(ConnectionState::Connecting, None);

            match self.connect(attempt).await {
                Connect::Opened(session) => {
                    attempt = 0;
                    self.sessions_opened += 1;
                    let id = SessionId(self.sessions_opened);
                    if let SessionEnd::Cancelled = self.drive_session(id, session).await {
                        break;
                    }
                }
                Connect::Failed => {}
                Connect::Cancelled => break,
            }

            if !self.wait_before_reconnect().await {
                break;
            }
        }

        self.set_state(ConnectionState::Closed, None);
        info!(sessions = self.sessions_opened, "Connection manager stopped");
    }

    /// One connection attempt, answering requests while it is in flight
    async fn connect(&mut self, attempt: u32) -> Connect<C::Session> {
        debug!(attempt, endpoint = %self.settings.endpoint, "Connecting");

        let connector = Arc::clone(&self.connector);
        let endpoint = self.settings.endpoint.clone();
        let connecting = async move { connector.connect(&endpoint).await };
        tokio::pin!(connecting);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!(attempt, "Connection attempt cancelled");
                    return Connect::Cancelled;
                }
                result = &mut connecting => {
                    return match result {
                        Ok(session) => Connect::Opened(session),
                        Err(e) => {
                            warn!(attempt, error = %e, "Connection attempt failed");
                            Connect::Failed
                        }
                    };
                }
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_offline(request),
                    None => {
                        debug!("All client handles dropped");
                        return Connect::Cancelled;
                    }
                },
            }
        }
    }

    /// Fixed-delay wait before the next attempt. Returns false on shutdown.
    async fn wait_before_reconnect(&mut self) -> bool {
        self.set_state(ConnectionState::Connecting, None);
        info!(delay_ms = self.settings.reconnect_delay.as_millis() as u64, "Reconnect scheduled");

        let delay = tokio::time::sleep(self.settings.reconnect_delay);
        tokio::pin!(delay);

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    debug!("Pending reconnect cancelled");
                    return false;
                }
                _ = &mut delay => return true,
                request = self.requests.recv() => match request {
                    Some(request) => self.handle_offline(request),
                    None => {
                        debug!("All client handles dropped");
                        return false;
                    }
                },
            }
        }
    }

    /// Run one open session until it is lost or the client shuts down
    async fn drive_session(&mut self, id: SessionId, mut session: C::Session) -> SessionEnd {
        info!(session = %id, "Session open");
        self.set_state(ConnectionState::Open, Some(id));

        if self.settings.resync_on_connect {
            if let Err(e) = Self::resync(&mut session, id).await {
                error!(session = %id, error = %e, "Resync failed, dropping session");
                return SessionEnd::Lost;
            }
        }

        // Half the idle window passes before the heartbeat, half after it
        let idle_timeout = self.settings.idle_timeout;
        let half_idle = idle_timeout.map(|timeout| timeout / 2).unwrap_or_default();
        let watchdog = tokio::time::sleep(half_idle);
        tokio::pin!(watchdog);
        let mut heartbeat_sent = false;

        let mut frames = 0u64;
        let end = loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break SessionEnd::Cancelled,
                frame = session.next_text() => match frame {
                    Ok(Some(text)) => {
                        frames += 1;
                        heartbeat_sent = false;
                        watchdog.as_mut().reset(Instant::now() + half_idle);
                        self.handle_frame(id, &text);
                    }
                    Ok(None) => {
                        info!(session = %id, frames, "Session closed by timer");
                        break SessionEnd::Lost;
                    }
                    Err(e) => {
                        error!(session = %id, frames, error = %e, "Transport error");
                        break SessionEnd::Lost;
                    }
                },
                _ = &mut watchdog, if idle_timeout.is_some() => {
                    if heartbeat_sent {
                        warn!(
                            session = %id,
                            frames,
                            idle_timeout = ?idle_timeout,
                            "Timer went silent, dropping session"
                        );
                        break SessionEnd::Lost;
                    }
                    trace!(session = %id, "Link quiet, sending heartbeat");
                    if let Err(e) = Self::deliver(&mut session, id, Command::GetStatus).await {
                        error!(session = %id, error = %e, "Heartbeat failed");
                        break SessionEnd::Lost;
                    }
                    heartbeat_sent = true;
                    watchdog.as_mut().reset(Instant::now() + half_idle);
                }
                request = self.requests.recv() => match request {
                    Some(request) => {
                        if let ControlFlow::Break(()) =
                            self.handle_online(request, &mut session, id).await
                        {
                            break SessionEnd::Lost;
                        }
                    }
                    None => {
                        debug!("All client handles dropped");
                        break SessionEnd::Cancelled;
                    }
                },
            }
        };

        if let SessionEnd::Cancelled = end {
            debug!(session = %id, "Closing session on shutdown");
            match tokio::time::timeout(CLOSE_TIMEOUT, session.close()).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(session = %id, error = %e, "Error closing session"),
                Err(_) => debug!(session = %id, "Timed out closing session"),
            }
        }

        end
    }

    fn handle_frame(&mut self, id: SessionId, text: &str) {
        let envelope = match codec::decode(text) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(session = %id, error = %e, "Dropping malformed message");
                return;
            }
        };

        trace!(session = %id, kind = envelope.kind(), "Envelope received");

        if let Envelope::Unknown { kind } = &envelope {
            debug!(session = %id, kind = %kind, "Ignoring unknown message type");
        }

        if let Some(change) = self.model.apply(&envelope) {
            self.publish_model(change);
        }
    }

    /// Handle a request while a session is open
    ///
    /// Breaks when the transport failed and the session must be dropped.
    async fn handle_online(
        &mut self,
        request: Request,
        session: &mut C::Session,
        id: SessionId,
    ) -> ControlFlow<()> {
        let (result, reply) = match request {
            Request::Send { command, reply } => (Self::deliver(session, id, command).await, reply),
            Request::Refresh { reply } => (Self::resync(session, id).await, reply),
            Request::ResetRace { reply } => {
                self.reset_laps();
                (Self::deliver(session, id, Command::ResetRace).await, reply)
            }
        };

        let lost = matches!(result, Err(SyncError::Transport { .. }));
        if let Err(e) = &result {
            error!(session = %id, error = %e, "Failed to send command");
        }
        let _ = reply.send(result);

        if lost { ControlFlow::Break(()) } else { ControlFlow::Continue(()) }
    }

    /// Handle a request while no session is open: nothing is queued
    fn handle_offline(&mut self, request: Request) {
        let (command, reply) = match request {
            Request::Send { command, reply } => (command, reply),
            Request::Refresh { reply } => (Command::GetStatus, reply),
            Request::ResetRace { reply } => {
                self.reset_laps();
                (Command::ResetRace, reply)
            }
        };

        warn!(command = %command, state = ?self.state, "Not connected, dropping command");
        let _ = reply.send(Err(SyncError::not_connected(command.name())));
    }

    async fn resync(session: &mut C::Session, id: SessionId) -> Result<()> {
        debug!(session = %id, "Requesting full state");
        for command in Command::resync() {
            Self::deliver(session, id, command).await?;
        }
        Ok(())
    }

    async fn deliver(session: &mut C::Session, id: SessionId, command: Command) -> Result<()> {
        let text = codec::encode(&command)?;
        trace!(session = %id, command = %command, "Sending command");
        session.send_text(text).await
    }

    fn reset_laps(&mut self) {
        if let Some(change) = self.model.reset_laps() {
            debug!("Laps cleared locally");
            self.publish_model(change);
        }
    }

    fn publish_model(&mut self, change: ModelChange) {
        self.model_tx.send_replace(Arc::new(self.model.clone()));
        if change == ModelChange::Status {
            self.status_tx.send_replace(self.model.status().copied());
        }
        self.hub.publish(Notification::Model(change), &self.model);
    }

    fn set_state(&mut self, state: ConnectionState, session: Option<SessionId>) {
        if self.state == state {
            return;
        }
        self.state = state;
        self.state_tx.send_replace(state);
        self.hub.publish(Notification::Connection { state, session }, &self.model);
    }
}
