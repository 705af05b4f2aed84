//! Live telemetry sync client for WiFi lap timers.
//!
//! lapsync keeps a consistent local model of a lap timer (RSSI status, lap
//! history, race state) over a WebSocket that reconnects on its own, and sends
//! race commands back to the timer.
//!
//! # Features
//!
//! - **Self-healing connection**: fixed-delay reconnect, forever, until closed
//! - **Resync on connect**: every new session starts with `get_status` + `get_laps`
//! - **Deterministic model**: a pure fold over inbound messages, safe to replay
//! - **Typed commands**: validated before they leave the client
//! - **Notifications**: synchronous observers and async streams, in mutation order
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use lapsync::{LapSync, Notification, format_lap_time};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> lapsync::Result<()> {
//!     let client = LapSync::for_origin("http://192.168.4.1/")?;
//!     let mut notifications = Box::pin(client.notifications());
//!
//!     while let Some(notification) = notifications.next().await {
//!         if let Notification::Model(_) = notification {
//!             let model = client.model();
//!             if let Some((index, lap)) = model.best_lap() {
//!                 println!("Best: lap {} in {}", index + 1, format_lap_time(lap.lap_time_ms));
//!             }
//!         }
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod codec;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Sync engine
pub mod client;
pub mod config;
mod driver;
pub mod hub;
pub mod model;
pub mod stream;

// Transports
pub mod transport;
pub mod transports;

// Core exports
pub use error::*;
pub use types::*;

pub use client::RaceClient;
pub use codec::{Envelope, decode, encode};
pub use config::ClientConfig;
pub use hub::{Notification, NotificationHub, Observer};
pub use model::{ModelChange, RaceModel};
pub use transport::{Connector, TransportSession};
pub use transports::WebSocketConnector;

/// Unified entry point for lap timer connections.
///
/// ```rust,no_run
/// use lapsync::{ClientConfig, LapSync};
///
/// #[tokio::main]
/// async fn main() -> lapsync::Result<()> {
///     let client = LapSync::connect(&ClientConfig::default())?;
///     client.start_race().await?;
///     Ok(())
/// }
/// ```
pub struct LapSync;

impl LapSync {
    /// Connect to a timer over WebSocket using `config`.
    ///
    /// Returns as soon as the background driver is running; use
    /// [`RaceClient::wait_for_state`] to wait for the first session.
    ///
    /// # Errors
    ///
    /// Returns an error if the config is invalid or the endpoint is not a
    /// `ws`/`wss` URL. Connection failures are never returned: they are
    /// retried in the background.
    pub fn connect(config: &ClientConfig) -> Result<RaceClient> {
        RaceClient::connect(config)
    }

    /// Connect to the timer serving the page at `origin`.
    ///
    /// The socket is at `/ws` on the same host and port, over `wss` for
    /// `https` origins.
    pub fn for_origin(origin: &str) -> Result<RaceClient> {
        RaceClient::connect(&ClientConfig::for_origin(origin)?)
    }
}
