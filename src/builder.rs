//! Builder for configuring and constructing port controllers.

use crate::config::MidiPortConfig;
use crate::Result;
use midiport_core::{EventLoop, IgnoreTypes, InboundQueue, InputEngine, OutputEngine};
use midiport_io::{LoopbackBus, MidiInput, MidiOutput};
use tracing::debug;

/// Where the built controllers get their ports from.
#[derive(Debug, Clone)]
pub enum Backend {
    /// Platform MIDI service via midir.
    #[cfg(feature = "midi-io")]
    Midir,
    /// In-process bus; controllers built from the same bus see each other.
    Loopback(LoopbackBus),
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "midi-io")]
        {
            Backend::Midir
        }
        #[cfg(not(feature = "midi-io"))]
        {
            Backend::Loopback(LoopbackBus::new())
        }
    }
}

/// Controllers built here are boxed over their engine, so hardware and
/// loopback controllers have the same type.
///
/// # Example
///
/// ```ignore
/// use midiport::prelude::*;
///
/// let event_loop = EventLoop::new();
/// let builder = MidiPortBuilder::new()
///     .client_name("my-app")
///     .ignore(IgnoreTypes::new(false, true, true))
///     .queue_capacity(1024);
///
/// let mut input = builder.build_input(&event_loop)?;
/// input.on_message(|msg| println!("{:?}", msg));
/// input.open_port(0)?;
/// event_loop.run();
/// ```
#[derive(Debug, Clone, Default)]
pub struct MidiPortBuilder {
    config: MidiPortConfig,
    backend: Backend,
}

impl MidiPortBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: MidiPortConfig) -> Self {
        Self {
            config,
            backend: Backend::default(),
        }
    }

    /// Default: "midiport"
    pub fn client_name(mut self, name: impl Into<String>) -> Self {
        self.config.client_name = name.into();
        self
    }

    pub fn port_label(mut self, label: impl Into<String>) -> Self {
        self.config.port_label = Some(label.into());
        self
    }

    /// Default: sysex, timing and active sensing all ignored
    pub fn ignore(mut self, ignore: IgnoreTypes) -> Self {
        self.config.ignore = ignore;
        self
    }

    /// Bounds the inbound queue; newer messages are dropped once it is full.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.config.queue_capacity = Some(capacity);
        self
    }

    pub fn high_water_mark(mut self, messages: usize) -> Self {
        self.config.high_water_mark = messages;
        self
    }

    #[cfg(feature = "midi-io")]
    pub fn midir(mut self) -> Self {
        self.backend = Backend::Midir;
        self
    }

    pub fn loopback(mut self, bus: &LoopbackBus) -> Self {
        self.backend = Backend::Loopback(bus.clone());
        self
    }

    pub fn config(&self) -> &MidiPortConfig {
        &self.config
    }

    pub fn backend(&self) -> &Backend {
        &self.backend
    }

    pub fn build_input(&self, event_loop: &EventLoop) -> Result<MidiInput> {
        self.config.validate()?;
        let engine: Box<dyn InputEngine> = match &self.backend {
            #[cfg(feature = "midi-io")]
            Backend::Midir => Box::new(midiport_io::MidirInputEngine::new(
                self.config.client_name.clone(),
            )?),
            Backend::Loopback(bus) => Box::new(bus.input_engine()),
        };

        let queue =
            InboundQueue::with_limits(self.config.queue_capacity, self.config.high_water_mark);
        let mut input =
            MidiInput::with_engine(engine, event_loop, self.config.label()).with_queue(queue);
        input.set_ignore(self.config.ignore);
        debug!("Built MIDI input '{}' ({:?})", self.config.label(), self.backend);
        Ok(input)
    }

    pub fn build_output(&self) -> Result<MidiOutput> {
        self.config.validate()?;
        let engine: Box<dyn OutputEngine> = match &self.backend {
            #[cfg(feature = "midi-io")]
            Backend::Midir => Box::new(midiport_io::MidirOutputEngine::new(
                self.config.client_name.clone(),
            )?),
            Backend::Loopback(bus) => Box::new(bus.output_engine()),
        };
        debug!("Built MIDI output '{}' ({:?})", self.config.label(), self.backend);
        Ok(MidiOutput::with_engine(engine, self.config.label()))
    }
}
