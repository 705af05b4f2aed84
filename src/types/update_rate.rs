//! Delivery rate control for status streams

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delivery rate for status snapshot streams
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub enum UpdateRate {
    /// Every snapshot the timer sends
    #[default]
    Native,

    /// At most this many snapshots per second, latest wins
    /// `Max(0)` is treated as Native
    Max(u32),
}

impl UpdateRate {
    /// Get throttle interval if needed
    pub fn throttle_interval(self) -> Option<Duration> {
        match self {
            UpdateRate::Native | UpdateRate::Max(0) => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn throttle_interval_from_hz() {
        assert_eq!(UpdateRate::Native.throttle_interval(), None);
        assert_eq!(UpdateRate::Max(0).throttle_interval(), None);
        assert_eq!(UpdateRate::Max(10).throttle_interval(), Some(Duration::from_millis(100)));
    }
}
