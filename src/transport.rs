//! Transport traits the connection manager drives

use url::Url;

use crate::Result;

/// Opens transport sessions to the timer
///
/// A connector is reused for every reconnect attempt, so it holds only
/// configuration; each successful [`connect`](Connector::connect) yields a
/// brand new session.
#[async_trait::async_trait]
pub trait Connector: Send + Sync + 'static {
    type Session: TransportSession;

    /// Open a new session to `endpoint`
    async fn connect(&self, endpoint: &Url) -> Result<Self::Session>;
}

/// One open, message-framed connection
#[async_trait::async_trait]
pub trait TransportSession: Send + 'static {
    /// Send one text frame
    async fn send_text(&mut self, text: String) -> Result<()>;

    /// Wait for the next inbound text frame
    ///
    /// Returns:
    /// - `Ok(Some(text))` - A frame arrived
    /// - `Ok(None)` - The peer closed the session cleanly
    /// - `Err(e)` - The transport failed
    ///
    /// Must be cancel-safe: the connection manager polls it inside `select!`
    /// and may drop the future to handle a command or shutdown.
    async fn next_text(&mut self) -> Result<Option<String>>;

    /// Close the session
    async fn close(&mut self) -> Result<()>;
}
