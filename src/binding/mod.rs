//! Host boundary.
//!
//! Scripting hosts call controllers by method name with dynamically typed
//! arguments (`serde_json::Value`). Arguments are validated here before any
//! controller or engine call; errors carry a [`crate::Error::host_class`]
//! the host can raise.
//!
//! ```ignore
//! let event_loop = EventLoop::new();
//! let midi = binding::exports(&event_loop, MidiPortBuilder::new());
//!
//! let mut input = midi.input()?;
//! input.on("message", |args| println!("{:?}", args))?;
//! input.call("openPort", &[json!(0)])?;
//! event_loop.run();
//! ```

mod args;
mod input;
mod output;

pub use args::{MessageBytes, INLINE_MESSAGE_BYTES};
pub use input::{message_event_args, InputBinding, MESSAGE_EVENT};
pub use output::OutputBinding;

use crate::{MidiPortBuilder, Result};
use midiport_core::EventLoop;

/// Module exports: constructors for the two host classes.
#[derive(Debug, Clone)]
pub struct MidiModule {
    event_loop: EventLoop,
    builder: MidiPortBuilder,
}

impl MidiModule {
    /// `new input()`
    pub fn input(&self) -> Result<InputBinding> {
        Ok(InputBinding::new(self.builder.build_input(&self.event_loop)?))
    }

    /// `new output()`
    pub fn output(&self) -> Result<OutputBinding> {
        Ok(OutputBinding::new(self.builder.build_output()?))
    }

    pub fn event_loop(&self) -> &EventLoop {
        &self.event_loop
    }
}

pub fn exports(event_loop: &EventLoop, builder: MidiPortBuilder) -> MidiModule {
    MidiModule {
        event_loop: event_loop.clone(),
        builder,
    }
}
