//! Live receiver status reported by the timer.

use serde::{Deserialize, Serialize};

/// Full scale of the timer's RSSI readings.
pub const RSSI_FULL_SCALE: u32 = 255;

/// Latest receiver status.
///
/// Each snapshot fully replaces the previous one. Missing numeric fields
/// decode as zero and a missing `crossing` flag as `false`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(default)]
pub struct StatusSnapshot {
    /// Filtered RSSI at the time of the report
    pub current_rssi: u32,
    /// Highest RSSI seen since the last lap
    pub peak_rssi: u32,
    /// Laps counted by the timer
    pub lap_count: u32,
    /// True while the pilot is inside the gate threshold
    pub crossing: bool,
}

impl StatusSnapshot {
    /// Fill level of the RSSI bar for the current reading.
    pub fn rssi_fraction(&self) -> f64 {
        rssi_fraction(self.current_rssi)
    }
}

/// Map an RSSI (or threshold) value onto `0.0..=1.0` of the timer's scale.
pub fn rssi_fraction(value: u32) -> f64 {
    (value as f64 / RSSI_FULL_SCALE as f64).min(1.0)
}
