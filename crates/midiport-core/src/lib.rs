//! Core types for midiport.
//!
//! Provides the message type, ignore filters, the engine trait seam, and the
//! cross-thread hand-off (inbound queue + consumer event loop) used by the
//! input controller.
//!
//! Feature gates: `midi-io` (conversions from `midir` errors).

pub mod error;
pub use error::{Error, ErrorKind, Result};

mod message;
pub use message::MidiMessage;

mod filter;
pub use filter::IgnoreTypes;

pub mod engine;
pub use engine::{DeltaClock, InputCallback, InputEngine, OutputEngine, PortEngine};

pub mod event_loop;
pub use event_loop::{AsyncSource, EventLoop, KeepAlive, Waker};

pub mod queue;
pub use queue::{InboundQueue, QueueProducer, QueueStats};
