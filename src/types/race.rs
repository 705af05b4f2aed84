//! Race state flag.

use serde::{Deserialize, Serialize};

/// Whether the timer is currently running a race.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
pub struct RaceState {
    pub active: bool,
}
