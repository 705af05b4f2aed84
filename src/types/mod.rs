//! Domain types shared by the codec, the race model and the client.
//!
//! - [`StatusSnapshot`] is the receiver's latest RSSI report
//! - [`LapRecord`] is one lap as measured by the timer
//! - [`RaceState`] says whether a race is running
//! - [`Command`] is anything the client can ask the timer to do
//! - [`UpdateRate`] caps how often status streams deliver
//! - [`ConnectionState`] and [`SessionId`] describe the transport session
//!
//! All wire types derive `serde` and, with the `tauri` feature, `specta::Type`
//! so UI layers can generate TypeScript typings for them.

mod command;
mod lap;
mod race;
mod session;
mod status;
mod update_rate;

pub use command::*;
pub use lap::*;
pub use race::*;
pub use session::*;
pub use status::*;
pub use update_rate::*;
