//! Commands sent from the client to the timer.

use serde::{Deserialize, Serialize};

use crate::{Result, SyncError};

/// Lowest frequency the RX5808 receiver can tune (MHz).
pub const MIN_FREQUENCY_MHZ: u16 = 5645;
/// Highest frequency the RX5808 receiver can tune (MHz).
pub const MAX_FREQUENCY_MHZ: u16 = 5945;

/// A command for the timer.
///
/// Serializes to one flat object, the command name under `command` and any
/// parameters next to it: `{"command":"set_frequency","frequency":5800}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "tauri", derive(specta::Type))]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    GetStatus,
    GetLaps,
    StartRace,
    StopRace,
    ResetRace,
    SetFrequency { frequency: u16 },
    SetThreshold { threshold: u8 },
}

impl Command {
    /// Wire name of the command.
    pub fn name(&self) -> &'static str {
        match self {
            Command::GetStatus => "get_status",
            Command::GetLaps => "get_laps",
            Command::StartRace => "start_race",
            Command::StopRace => "stop_race",
            Command::ResetRace => "reset_race",
            Command::SetFrequency { .. } => "set_frequency",
            Command::SetThreshold { .. } => "set_threshold",
        }
    }

    /// Build a frequency command, rejecting values outside the receiver band.
    pub fn set_frequency(mhz: u16) -> Result<Self> {
        if !(MIN_FREQUENCY_MHZ..=MAX_FREQUENCY_MHZ).contains(&mhz) {
            return Err(SyncError::invalid_parameter(
                "frequency",
                mhz as i64,
                format!("must be within {}..={} MHz", MIN_FREQUENCY_MHZ, MAX_FREQUENCY_MHZ),
            ));
        }
        Ok(Command::SetFrequency { frequency: mhz })
    }

    pub fn set_threshold(threshold: u8) -> Self {
        Command::SetThreshold { threshold }
    }

    /// The pair of requests that rebuilds the full model from the server.
    pub fn resync() -> [Command; 2] {
        [Command::GetStatus, Command::GetLaps]
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequency_band_is_enforced() {
        assert_eq!(
            Command::set_frequency(5800).unwrap(),
            Command::SetFrequency { frequency: 5800 }
        );
        assert!(Command::set_frequency(MIN_FREQUENCY_MHZ).is_ok());
        assert!(Command::set_frequency(MAX_FREQUENCY_MHZ).is_ok());

        let err = Command::set_frequency(5000).unwrap_err();
        assert!(matches!(err, SyncError::InvalidParameter { parameter: "frequency", .. }));
        assert!(Command::set_frequency(6000).is_err());
    }

    #[test]
    fn names_match_serialized_tag() {
        let commands = [
            Command::GetStatus,
            Command::GetLaps,
            Command::StartRace,
            Command::StopRace,
            Command::ResetRace,
            Command::SetFrequency { frequency: 5800 },
            Command::SetThreshold { threshold: 50 },
        ];

        for command in commands {
            let value = serde_json::to_value(command).unwrap();
            assert_eq!(value["command"], command.name());
        }
    }
}
