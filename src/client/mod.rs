//! Client handle for a live lap timer
//!
//! [`RaceClient`] is a cheap, cloneable handle to the driver task that owns the
//! connection and the race model. Commands go through the handle; state comes
//! back as snapshots, watch-backed streams and notifications.
//!
//! Commands are delivered at most once. A command issued while no session is
//! open is dropped with a warning and the call returns
//! [`SyncError::NotConnected`]; nothing is queued for later.

use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::ClientConfig;
use crate::driver::{Driver, DriverSettings, Request};
use crate::hub::{Notification, NotificationHub, notification_stream};
use crate::model::RaceModel;
use crate::stream::ThrottleExt;
use crate::transport::Connector;
use crate::transports::WebSocketConnector;
use crate::types::{Command, ConnectionState, StatusSnapshot, UpdateRate};
use crate::{Result, SyncError};


/// Handle to a running sync client
///
/// The driver shuts down when [`close`](RaceClient::close) is called on any
/// clone, or when every clone has been dropped.
#[derive(Clone)]
pub struct RaceClient {
    requests: mpsc::Sender<Request>,
    state: watch::Receiver<ConnectionState>,
    model: watch::Receiver<Arc<RaceModel>>,
    status: watch::Receiver<Option<StatusSnapshot>>,
    notifications: broadcast::Sender<Notification>,
    cancel: CancellationToken,
}

impl RaceClient {
    /// Connect to the timer over WebSocket.
    ///
    /// Returns immediately; the connection is established (and re-established)
    /// in the background. Must be called from within a Tokio runtime.
    pub fn connect(config: &ClientConfig) -> Result<Self> {
        let hub = NotificationHub::new(config.notification_capacity);
        let connector = WebSocketConnector::new().with_connect_timeout(config.connect_timeout());
        Self::spawn(connector, config, hub)
    }

    /// Start a client over any transport, with pre-registered observers.
    ///
    /// ```rust,no_run
    /// use lapsync::{ClientConfig, NotificationHub, RaceClient, WebSocketConnector};
    /// use lapsync::{Notification, RaceModel};
    ///
    /// # #[tokio::main]
    /// # async fn main() -> lapsync::Result<()> {
    /// let config = ClientConfig::default();
    /// let mut hub = NotificationHub::new(config.notification_capacity);
    /// hub.add_observer(|n: &Notification, model: &RaceModel| {
    ///     println!("{:?}: {} laps", n, model.laps().len());
    /// });
    /// let client = RaceClient::spawn(WebSocketConnector::new(), &config, hub)?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn spawn<C: Connector>(
        connector: C,
        config: &ClientConfig,
        hub: NotificationHub,
    ) -> Result<Self> {
        let endpoint = config.validate()?;
        let settings = DriverSettings {
            endpoint,
            reconnect_delay: config.reconnect_delay(),
            idle_timeout: config.idle_timeout(),
            resync_on_connect: config.resync_on_connect,
            request_buffer: config.request_buffer,
        };

        let channels = Driver::spawn(connector, settings, hub);

        Ok(Self {
            requests: channels.requests,
            state: channels.state,
            model: channels.model,
            status: channels.status,
            notifications: channels.notifications,
            cancel: channels.cancel,
        })
    }

    async fn request<F>(&self, make: F) -> Result<()>
    where
        F: FnOnce(oneshot::Sender<Result<()>>) -> Request,
    {
        let (reply, response) = oneshot::channel();
        self.requests.send(make(reply)).await.map_err(|_| SyncError::Shutdown)?;
        response.await.map_err(|_| SyncError::Shutdown)?
    }

    /// Send a command if a session is open.
    pub async fn send(&self, command: Command) -> Result<()> {
        self.request(|reply| Request::Send { command, reply }).await
    }

    pub async fn start_race(&self) -> Result<()> {
        self.send(Command::StartRace).await
    }

    pub async fn stop_race(&self) -> Result<()> {
        self.send(Command::StopRace).await
    }

    /// Clear the local lap list, then ask the timer to reset.
    ///
    /// The laps are cleared even when the command cannot be delivered.
    pub async fn reset_race(&self) -> Result<()> {
        self.request(|reply| Request::ResetRace { reply }).await
    }

    /// Tune the receiver; rejected locally if outside the 5.8 GHz band.
    pub async fn set_frequency(&self, mhz: u16) -> Result<()> {
        self.send(Command::set_frequency(mhz)?).await
    }

    pub async fn set_threshold(&self, threshold: u8) -> Result<()> {
        self.send(Command::set_threshold(threshold)).await
    }

    /// Ask the timer for its full state again.
    ///
    /// Call this when the host UI becomes visible or regains focus, to recover
    /// from updates missed while it was in the background.
    ///
    /// Laps are only deduplicated when the timer answers `get_laps` with a
    /// `laps` snapshot or numbered `lap` messages; unnumbered replies append.
    pub async fn refresh(&self) -> Result<()> {
        self.request(|reply| Request::Refresh { reply }).await
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Wait until the connection reaches `state`.
    pub async fn wait_for_state(&self, state: ConnectionState) -> Result<()> {
        let mut receiver = self.state.clone();
        match receiver.wait_for(|current| *current == state).await {
            Ok(_) => Ok(()),
            Err(_) => Err(SyncError::Shutdown),
        }
    }

    /// Current model snapshot.
    pub fn model(&self) -> Arc<RaceModel> {
        Arc::clone(&self.model.borrow())
    }

    /// Latest status, if the timer has sent one.
    pub fn status(&self) -> Option<StatusSnapshot> {
        *self.status.borrow()
    }

    /// Model snapshots: the current one first, then each update.
    ///
    /// Intermediate snapshots may be skipped if the consumer is slow; use
    /// [`notifications`](RaceClient::notifications) to see every change.
    pub fn model_updates(&self) -> impl Stream<Item = Arc<RaceModel>> + 'static {
        WatchStream::new(self.model.clone())
    }

    /// Connection state changes, starting with the current state.
    pub fn connection_states(&self) -> impl Stream<Item = ConnectionState> + 'static {
        WatchStream::new(self.state.clone())
    }

    /// Status snapshots, optionally capped to a maximum rate.
    pub fn status_updates(&self, rate: UpdateRate) -> BoxStream<'static, StatusSnapshot> {
        let snapshots = WatchStream::new(self.status.clone()).filter_map(|opt| async move { opt });

        match rate.throttle_interval() {
            None => snapshots.boxed(),
            Some(interval) => snapshots.throttle(interval).boxed(),
        }
    }

    /// Every notification published from now on, in order.
    pub fn notifications(&self) -> impl Stream<Item = Notification> + 'static {
        notification_stream(self.notifications.subscribe())
    }

    /// Shut down: cancels any pending reconnect and closes the open session.
    ///
    /// Returns once the driver has stopped.
    pub async fn close(&self) {
        debug!("Closing race client");
        self.cancel.cancel();
        let _ = self.wait_for_state(ConnectionState::Closed).await;
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled() || self.connection_state() == ConnectionState::Closed
    }
}
