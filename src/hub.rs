//! Change notifications for UI layers.
//!
//! The hub lives inside the client's actor task. Synchronous [`Observer`]s are
//! called in mutation order with the updated model; async subscribers get the
//! same sequence of [`Notification`]s over a bounded broadcast channel.

use futures::{Stream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{trace, warn};

use crate::model::{ModelChange, RaceModel};
use crate::types::{ConnectionState, SessionId};

/// Something a renderer may need to redraw for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Notification {
    /// The connection manager changed state
    Connection { state: ConnectionState, session: Option<SessionId> },
    /// Part of the race model changed
    Model(ModelChange),
}

/// Receives notifications synchronously on the client's actor task.
///
/// Implementations must not block; hand heavy work off to another task.
pub trait Observer: Send + 'static {
    fn notify(&mut self, notification: &Notification, model: &RaceModel);
}

impl<F> Observer for F
where
    F: FnMut(&Notification, &RaceModel) + Send + 'static,
{
    fn notify(&mut self, notification: &Notification, model: &RaceModel) {
        self(notification, model)
    }
}

/// Fan-out point for model and connection notifications
pub struct NotificationHub {
    observers: Vec<Box<dyn Observer>>,
    events: broadcast::Sender<Notification>,
}

impl NotificationHub {
    /// Create a hub whose async subscribers buffer up to `capacity` notifications.
    pub fn new(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self { observers: Vec::new(), events }
    }

    /// Register a synchronous observer.
    pub fn add_observer<O: Observer>(&mut self, observer: O) {
        self.observers.push(Box::new(observer));
    }

    /// Subscribe to notifications published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.events.subscribe()
    }

    pub(crate) fn sender(&self) -> broadcast::Sender<Notification> {
        self.events.clone()
    }

    /// Deliver one notification to every observer, then to subscribers.
    pub fn publish(&mut self, notification: Notification, model: &RaceModel) {
        for observer in &mut self.observers {
            observer.notify(&notification, model);
        }

        if self.events.send(notification).is_err() {
            trace!(?notification, "No async subscribers");
        }
    }
}

/// Adapt a broadcast receiver into a stream, skipping over lag gaps.
pub fn notification_stream(
    receiver: broadcast::Receiver<Notification>,
) -> impl Stream<Item = Notification> + 'static {
    BroadcastStream::new(receiver).filter_map(|item| async move {
        match item {
            Ok(notification) => Some(notification),
            Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                warn!(skipped, "Notification subscriber lagged, some notifications were dropped");
                None
            }
        }
    })
}
