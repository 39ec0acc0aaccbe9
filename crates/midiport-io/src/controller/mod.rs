//! Port controllers: the host-facing objects that own one engine each.

mod input;
mod output;

pub use input::MidiInput;
pub use output::MidiOutput;
