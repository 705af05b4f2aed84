//! Lap records and lap-time formatting.

use serde::{Deserialize, Serialize};

/// One completed lap as reported by the timer.
///
/// A `lap_time_ms` of zero means the timer had no previous crossing to measure
/// from (the first gate pass of a race). Such records count as laps but have no
/// time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct LapRecord {
    pub lap_time_ms: u32,
    #[serde(alias = "peak_rssi")]
    pub rssi_peak: u32,
}

impl LapRecord {
    pub fn new(lap_time_ms: u32, rssi_peak: u32) -> Self {
        Self { lap_time_ms, rssi_peak }
    }

    /// Lap time, or `None` for the zero placeholder.
    pub fn lap_time_ms(&self) -> Option<u32> {
        (self.lap_time_ms > 0).then_some(self.lap_time_ms)
    }

    /// Formatted lap time, or `None` for the zero placeholder.
    pub fn display_time(&self) -> Option<String> {
        self.lap_time_ms().map(format_lap_time)
    }
}

/// A lap prepared for display: 1-based lap number plus best-lap flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LapRow<'a> {
    pub number: usize,
    pub lap: &'a LapRecord,
    pub is_best: bool,
}

/// Format milliseconds as `m:ss.hh`.
///
/// ```rust
/// use lapsync::format_lap_time;
///
/// assert_eq!(format_lap_time(63412), "1:03.41");
/// assert_eq!(format_lap_time(44980), "0:44.98");
/// ```
pub fn format_lap_time(ms: u32) -> String {
    let minutes = ms / 60_000;
    let seconds = (ms / 1000) % 60;
    let hundredths = (ms % 1000) / 10;
    format!("{}:{:02}.{:02}", minutes, seconds, hundredths)
}
