//! # midiport - MIDI port controllers
//!
//! Output and input port controllers over a pluggable MIDI engine.
//!
//! ## Architecture
//!
//! midiport is an umbrella crate that coordinates:
//! - **midiport-core** - Messages, ignore filters, engine traits, inbound
//!   hand-off queue, single-threaded event loop
//! - **midiport-io** - `MidiInput` / `MidiOutput` controllers, midir engines,
//!   in-process loopback bus
//!
//! Output is synchronous. Input arrives on the engine's driver thread, is
//! queued, and is delivered to listeners when the [`EventLoop`] runs.
//!
//! ## Quick Start
//!
//! ```ignore
//! use midiport::prelude::*;
//!
//! let event_loop = EventLoop::new();
//! let builder = MidiPortBuilder::new().client_name("my-app");
//!
//! let mut input = builder.build_input(&event_loop)?;
//! input.on_message(|msg| println!("{:.3}s {:02X?}", msg.delta_time(), msg.bytes()));
//! input.open_port(0)?;
//!
//! let mut output = builder.build_output()?;
//! output.open_port(0)?;
//! output.send_message(&[0x90, 60, 100])?;
//!
//! event_loop.run();
//! ```
//!
//! ## Feature Flags
//!
//! - `midi-io` (default) - Hardware MIDI via midir

/// Re-export of midiport-core for direct access
pub use midiport_core as core;

/// Re-export of midiport-io for direct access
pub use midiport_io as io;

pub use midiport_core::{
    AsyncSource, ErrorKind, EventLoop, IgnoreTypes, InboundQueue, InputEngine, KeepAlive,
    MidiMessage, OutputEngine, PortEngine, QueueStats, Waker,
};

pub use midiport_io::{
    LoopbackBus, LoopbackInput, LoopbackOutput, MidiInput, MidiOutput, PortInfo, PortType,
};

#[cfg(feature = "midi-io")]
pub use midiport_io::{MidirInputEngine, MidirOutputEngine};

mod error;
pub use error::{Error, Result};

mod config;
pub use config::MidiPortConfig;

mod builder;
pub use builder::{Backend, MidiPortBuilder};

pub mod binding;

/// Convenience prelude for common imports
pub mod prelude {
    pub use crate::{
        EventLoop, IgnoreTypes, LoopbackBus, MidiInput, MidiMessage, MidiOutput,
        MidiPortBuilder, MidiPortConfig, PortInfo,
    };
}
