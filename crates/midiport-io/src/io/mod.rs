//! Hardware MIDI engines.
//!
//! Device enumeration, connection, and real-time I/O via midir.
//! Requires the `midi-io` feature.

mod input;
mod output;

pub use input::MidirInputEngine;
pub use output::MidirOutputEngine;

/// Client name advertised to the OS when none is configured.
pub const DEFAULT_CLIENT_NAME: &str = "midiport";
