//! Client configuration.
//!
//! Defaults match the timer firmware: the timer runs its own access point at
//! `192.168.4.1` and serves the socket at `/ws` on port 80. A config can be
//! built in code, loaded from YAML, or derived from the origin of the page that
//! hosts the UI.
//!
//! ```rust
//! use lapsync::ClientConfig;
//!
//! let config = ClientConfig::from_yaml_str("endpoint: ws://10.0.0.5/ws\nreconnect_delay_ms: 1000\n")?;
//! assert_eq!(config.reconnect_delay().as_millis(), 1000);
//! assert!(config.resync_on_connect);
//! # Ok::<(), lapsync::SyncError>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

use crate::{Result, SyncError};

/// Path the timer serves its socket on.
pub const SOCKET_PATH: &str = "/ws";

/// Settings for [`RaceClient`](crate::RaceClient)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ClientConfig {
    /// WebSocket URL of the timer
    pub endpoint: String,

    /// Fixed delay between a lost session and the next connection attempt
    pub reconnect_delay_ms: u64,

    /// Give up on a connection attempt that has not opened within this time
    pub connect_timeout_ms: u64,

    /// Drop a session that has delivered no frame for this long; 0 disables.
    ///
    /// Halfway through a silent window the client sends `get_status`, so a
    /// live timer always answers in time.
    pub idle_timeout_ms: u64,

    /// Send `get_status` and `get_laps` whenever a session opens
    ///
    /// The model only stays free of duplicates across a resync when the timer
    /// answers `get_laps` with a `laps` snapshot or with numbered `lap`
    /// messages. Unnumbered `lap` replies are appended again.
    pub resync_on_connect: bool,

    /// Pending requests from client handles before callers wait
    pub request_buffer: usize,

    /// Notifications buffered per async subscriber before it lags
    pub notification_capacity: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: format!("ws://192.168.4.1{}", SOCKET_PATH),
            reconnect_delay_ms: 3000,
            connect_timeout_ms: 10_000,
            idle_timeout_ms: 10_000,
            resync_on_connect: true,
            request_buffer: 32,
            notification_capacity: 256,
        }
    }
}

impl ClientConfig {
    /// Config pointing at an explicit endpoint, defaults elsewhere.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self { endpoint: endpoint.into(), ..Self::default() }
    }

    /// Config for a UI served from `origin`.
    ///
    /// The socket lives at `/ws` on the same host and port, over `wss` when the
    /// page itself is served over `https`.
    ///
    /// ```rust
    /// use lapsync::ClientConfig;
    ///
    /// let config = ClientConfig::for_origin("https://timer.local:8443/index.html")?;
    /// assert_eq!(config.endpoint, "wss://timer.local:8443/ws");
    /// # Ok::<(), lapsync::SyncError>(())
    /// ```
    pub fn for_origin(origin: &str) -> Result<Self> {
        Ok(Self::new(endpoint_for_origin(origin)?.to_string()))
    }

    /// Parse a YAML document. Missing fields take their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Self = serde_yaml_ng::from_str(yaml)
            .map_err(|e| SyncError::config("client config YAML", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load a YAML config file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let yaml = std::fs::read_to_string(path)
            .map_err(|e| SyncError::file_error(path.to_path_buf(), e))?;
        Self::from_yaml_str(&yaml)
    }

    /// Check the config and return the parsed endpoint.
    pub fn validate(&self) -> Result<Url> {
        if self.reconnect_delay_ms == 0 {
            return Err(SyncError::config("reconnect_delay_ms", "must be at least 1"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(SyncError::config("connect_timeout_ms", "must be at least 1"));
        }
        if self.request_buffer == 0 {
            return Err(SyncError::config("request_buffer", "must be at least 1"));
        }
        if self.notification_capacity == 0 {
            return Err(SyncError::config("notification_capacity", "must be at least 1"));
        }
        self.endpoint_url()
    }

    /// Parsed endpoint; only `ws` and `wss` are accepted.
    pub fn endpoint_url(&self) -> Result<Url> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| SyncError::invalid_endpoint(&self.endpoint, e.to_string()))?;
        match url.scheme() {
            "ws" | "wss" => Ok(url),
            other => Err(SyncError::invalid_endpoint(
                &self.endpoint,
                format!("unsupported scheme '{}', expected ws or wss", other),
            )),
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    /// Silence allowed on an open session, `None` when disabled.
    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

/// Socket URL for a page served from `origin`.
pub fn endpoint_for_origin(origin: &str) -> Result<Url> {
    let page =
        Url::parse(origin).map_err(|e| SyncError::invalid_endpoint(origin, e.to_string()))?;

    let scheme = match page.scheme() {
        "https" | "wss" => "wss",
        "http" | "ws" => "ws",
        other => {
            return Err(SyncError::invalid_endpoint(
                origin,
                format!("cannot derive a socket URL from scheme '{}'", other),
            ));
        }
    };

    let host = page
        .host_str()
        .ok_or_else(|| SyncError::invalid_endpoint(origin, "origin has no host"))?;
    let authority = match page.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    };

    let endpoint = format!("{}://{}{}", scheme, authority, SOCKET_PATH);
    Ok(Url::parse(&endpoint)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_timer_firmware() {
        let config = ClientConfig::default();
        assert_eq!(config.endpoint, "ws://192.168.4.1/ws");
        assert_eq!(config.reconnect_delay(), Duration::from_secs(3));
        assert!(config.resync_on_connect);
        assert_eq!(config.idle_timeout(), Some(Duration::from_secs(10)));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_idle_timeout_disables_the_watchdog() {
        let config = ClientConfig::from_yaml_str("idle_timeout_ms: 0\n").unwrap();
        assert_eq!(config.idle_timeout(), None);
    }

    #[test]
    fn zero_delays_are_rejected() {
        for yaml in ["reconnect_delay_ms: 0\n", "connect_timeout_ms: 0\n"] {
            assert!(
                matches!(ClientConfig::from_yaml_str(yaml), Err(SyncError::Config { .. })),
                "{yaml:?} was accepted"
            );
        }

        let config = ClientConfig { reconnect_delay_ms: 0, ..ClientConfig::default() };
        assert!(matches!(config.validate(), Err(SyncError::Config { .. })));
    }

    #[test]
    fn origin_scheme_selects_socket_scheme() {
        assert_eq!(endpoint_for_origin("http://192.168.4.1/").unwrap().as_str(), "ws://192.168.4.1/ws");
        assert_eq!(
            endpoint_for_origin("https://timer.example.com/race?x=1").unwrap().as_str(),
            "wss://timer.example.com/ws"
        );
        assert_eq!(
            endpoint_for_origin("http://localhost:8080").unwrap().as_str(),
            "ws://localhost:8080/ws"
        );
    }

    #[test]
    fn origin_without_usable_scheme_is_rejected() {
        assert!(matches!(
            endpoint_for_origin("file:///tmp/index.html"),
            Err(SyncError::InvalidEndpoint { .. })
        ));
        assert!(endpoint_for_origin("::not a url::").is_err());
    }

    #[test]
    fn yaml_fills_missing_fields_with_defaults() {
        let config = ClientConfig::from_yaml_str("reconnect_delay_ms: 500\n").unwrap();
        assert_eq!(config.reconnect_delay_ms, 500);
        assert_eq!(config.endpoint, ClientConfig::default().endpoint);
        assert_eq!(config.request_buffer, 32);
    }

    #[test]
    fn yaml_rejects_unknown_fields_and_bad_values() {
        assert!(matches!(
            ClientConfig::from_yaml_str("reconect_delay_ms: 500\n"),
            Err(SyncError::Config { .. })
        ));
        assert!(matches!(
            ClientConfig::from_yaml_str("endpoint: http://192.168.4.1/ws\n"),
            Err(SyncError::InvalidEndpoint { .. })
        ));
        assert!(matches!(
            ClientConfig::from_yaml_str("request_buffer: 0\n"),
            Err(SyncError::Config { .. })
        ));
    }

    #[test]
    fn missing_config_file_reports_path() {
        let err = ClientConfig::from_path("/definitely/not/here.yaml").unwrap_err();
        match err {
            SyncError::File { path, .. } => assert!(path.ends_with("here.yaml")),
            other => panic!("expected file error, got {other:?}"),
        }
    }
}
