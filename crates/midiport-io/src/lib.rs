//! MIDI port controllers for midiport.
//!
//! Provides output and input controllers, hardware engines, and an in-process
//! loopback bus.
//!
//! Feature gates: `midi-io` (hardware I/O via midir, on by default).

pub use midiport_core::{
    AsyncSource, DeltaClock, Error, ErrorKind, EventLoop, IgnoreTypes, InboundQueue,
    InputCallback, InputEngine, KeepAlive, MidiMessage, OutputEngine, PortEngine, QueueStats,
    Result, Waker,
};

mod controller;
pub use controller::{MidiInput, MidiOutput};

pub(crate) mod port;
pub use port::{PortInfo, PortType};

mod loopback;
pub use loopback::{LoopbackBus, LoopbackInput, LoopbackOutput};

#[cfg(feature = "midi-io")]
pub(crate) mod io;

#[cfg(feature = "midi-io")]
pub use io::{MidirInputEngine, MidirOutputEngine, DEFAULT_CLIENT_NAME};
