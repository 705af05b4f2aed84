//! Wire codec for timer messages.
//!
//! Inbound frames are JSON objects with a `type` discriminant. Outbound frames
//! are flat JSON objects with a `command` field plus the command's parameters.
//!
//! Unknown `type` values are not errors: they decode to [`Envelope::Unknown`]
//! so newer firmware can add message kinds without breaking older clients.

use serde::Deserialize;
use serde_json::Value;

use crate::types::{Command, LapRecord, RaceState, StatusSnapshot};
use crate::{Result, SyncError};

/// One decoded inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Envelope {
    /// Full replacement of the receiver status
    Status(StatusSnapshot),
    /// One new lap, optionally numbered by the server
    Lap { lap: LapRecord, lap_number: Option<u32> },
    /// Authoritative list of every lap in the current race
    Laps(Vec<LapRecord>),
    /// Race running flag
    RaceState(RaceState),
    /// A message kind this client does not know about
    Unknown { kind: String },
}

impl Envelope {
    /// The `type` discriminant this envelope was decoded from.
    pub fn kind(&self) -> &str {
        match self {
            Envelope::Status(_) => "status",
            Envelope::Lap { .. } => "lap",
            Envelope::Laps(_) => "laps",
            Envelope::RaceState(_) => "race_state",
            Envelope::Unknown { kind } => kind,
        }
    }
}

#[derive(Deserialize)]
struct LapPayload {
    lap_time_ms: u32,
    #[serde(alias = "peak_rssi")]
    rssi_peak: u32,
    #[serde(default)]
    lap_number: Option<u32>,
}

#[derive(Deserialize)]
struct LapsPayload {
    laps: Vec<LapRecord>,
}

/// Decode one inbound text frame.
pub fn decode(raw: &str) -> Result<Envelope> {
    let value: Value = serde_json::from_str(raw)?;
    let Value::Object(mut fields) = value else {
        return Err(SyncError::decode("expected a JSON object"));
    };

    let kind = match fields.remove("type") {
        Some(Value::String(kind)) => kind,
        Some(other) => {
            return Err(SyncError::decode(format!("`type` must be a string, got {}", other)));
        }
        None => return Err(SyncError::decode("missing `type` field")),
    };
    let payload = Value::Object(fields);

    let envelope = match kind.as_str() {
        "status" => Envelope::Status(serde_json::from_value(payload)?),
        "lap" => {
            let lap: LapPayload = serde_json::from_value(payload)?;
            Envelope::Lap {
                lap: LapRecord::new(lap.lap_time_ms, lap.rssi_peak),
                lap_number: lap.lap_number.filter(|n| *n > 0),
            }
        }
        "laps" => {
            let laps: LapsPayload = serde_json::from_value(payload)?;
            Envelope::Laps(laps.laps)
        }
        "race_state" => Envelope::RaceState(serde_json::from_value(payload)?),
        _ => Envelope::Unknown { kind: kind.clone() },
    };

    Ok(envelope)
}

/// Encode a command as one outbound text frame.
pub fn encode(command: &Command) -> Result<String> {
    Ok(serde_json::to_string(command)?)
}
