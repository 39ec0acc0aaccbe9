//! Output port controller.

use crate::port::{check_index, find_port, list_ports, port_name, PortInfo, PortType};
use midiport_core::{OutputEngine, Result};
use tracing::{debug, trace};

/// Sends MIDI to one output port at a time. Writes are synchronous.
pub struct MidiOutput<E: OutputEngine = Box<dyn OutputEngine>> {
    engine: E,
    label: String,
    connected: Option<String>,
}

#[cfg(feature = "midi-io")]
impl MidiOutput {
    /// Output controller on the platform's MIDI backend.
    pub fn new() -> Result<Self> {
        Self::with_label(crate::io::DEFAULT_CLIENT_NAME)
    }

    pub fn with_label(label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let engine = crate::io::MidirOutputEngine::new(label.clone())?;
        Ok(Self::with_engine(Box::new(engine) as Box<dyn OutputEngine>, label))
    }
}

impl<E: OutputEngine> MidiOutput<E> {
    pub fn with_engine(engine: E, label: impl Into<String>) -> Self {
        Self {
            engine,
            label: label.into(),
            connected: None,
        }
    }

    pub fn port_count(&self) -> usize {
        self.engine.port_count()
    }

    pub fn port_name(&self, index: usize) -> Result<String> {
        port_name(&self.engine, index)
    }

    pub fn ports(&self) -> Vec<PortInfo> {
        list_ports(&self.engine, PortType::Output)
    }

    /// Binds to output port `index`, closing any previous binding first.
    pub fn open_port(&mut self, index: usize) -> Result<()> {
        check_index(&self.engine, index)?;
        self.close_port();

        let name = self.engine.port_name(index).ok();
        self.engine.open_port(index, &self.label)?;
        debug!("Opened MIDI output port {} ({:?})", index, name);
        self.connected = name;
        Ok(())
    }

    /// Opens the first port whose name contains `pattern` (case-insensitive).
    pub fn open_port_by_name(&mut self, pattern: &str) -> Result<usize> {
        let index = find_port(&self.engine, pattern)?;
        self.open_port(index)?;
        Ok(index)
    }

    pub fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.close_port();
        self.engine.open_virtual_port(name)?;
        debug!("Opened virtual MIDI output '{}'", name);
        self.connected = Some(name.to_string());
        Ok(())
    }

    /// No-op when nothing is open.
    pub fn close_port(&mut self) {
        if self.engine.is_port_open() {
            self.engine.close_port();
            debug!("Closed MIDI output port {:?}", self.connected);
        }
        self.connected = None;
    }

    pub fn is_port_open(&self) -> bool {
        self.engine.is_port_open()
    }

    /// Name of the bound port, if any.
    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Writes `bytes` to the bound port as one message. Blocks until the
    /// engine accepts it; errors are not retried.
    pub fn send_message(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("MIDI out {:02X?}", bytes);
        self.engine.send_message(bytes)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }
}

impl<E: OutputEngine> Drop for MidiOutput<E> {
    fn drop(&mut self) {
        self.close_port();
    }
}

impl<E: OutputEngine> std::fmt::Debug for MidiOutput<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiOutput")
            .field("label", &self.label)
            .field("connected", &self.connected)
            .finish()
    }
}
