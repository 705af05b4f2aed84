//! WebSocket transport built on tokio-tungstenite

use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::{Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, trace};
use url::Url;

use crate::transport::{Connector, TransportSession};
use crate::{Result, SyncError};

/// How often an open socket is pinged so a dead link surfaces as a write error
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// Opens WebSocket sessions to the timer
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    connect_timeout: Duration,
}

impl Default for WebSocketConnector {
    fn default() -> Self {
        Self { connect_timeout: Duration::from_secs(10) }
    }
}

impl WebSocketConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give up on a handshake that takes longer than `timeout`
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

#[async_trait::async_trait]
impl Connector for WebSocketConnector {
    type Session = WebSocketSession;

    async fn connect(&self, endpoint: &Url) -> Result<WebSocketSession> {
        debug!(%endpoint, "Opening WebSocket");

        let (stream, response) =
            tokio::time::timeout(self.connect_timeout, connect_async(endpoint.as_str()))
                .await
                .map_err(|_| {
                    SyncError::transport(format!(
                        "handshake with {} timed out after {:?}",
                        endpoint, self.connect_timeout
                    ))
                })??;

        debug!(status = %response.status(), "WebSocket handshake complete");

        let first_ping = Instant::now() + PING_INTERVAL;
        let mut keepalive = tokio::time::interval_at(first_ping, PING_INTERVAL);
        keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Ok(WebSocketSession { stream, keepalive })
    }
}

/// One open WebSocket
pub struct WebSocketSession {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    keepalive: Interval,
}

#[async_trait::async_trait]
impl TransportSession for WebSocketSession {
    async fn send_text(&mut self, text: String) -> Result<()> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn next_text(&mut self) -> Result<Option<String>> {
        loop {
            let message = tokio::select! {
                message = self.stream.next() => message,
                _ = self.keepalive.tick() => {
                    trace!("Sending keepalive ping");
                    self.stream.send(Message::Ping(Default::default())).await?;
                    continue;
                }
            };

            match message {
                Some(Ok(Message::Text(text))) => return Ok(Some(text.as_str().to_owned())),
                Some(Ok(Message::Close(frame))) => {
                    debug!(?frame, "Peer closed WebSocket");
                    return Ok(None);
                }
                Some(Ok(Message::Binary(bytes))) => {
                    debug!(len = bytes.len(), "Ignoring binary frame");
                }
                // Pings are answered by tungstenite itself
                Some(Ok(other)) => trace!(?other, "Ignoring control frame"),
                Some(Err(e)) => return Err(e.into()),
                None => return Ok(None),
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        match self.stream.close(None).await {
            Ok(()) => Ok(()),
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
