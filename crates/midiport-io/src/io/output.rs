//! MIDI output engine backed by midir.

use midiport_core::{Error, OutputEngine, PortEngine, Result};
use midir::{MidiOutput, MidiOutputConnection};
use tracing::{debug, trace};

/// midir consumes its client on connect, so each open creates a fresh client
/// and a separate `probe` client serves enumeration.
pub struct MidirOutputEngine {
    client_name: String,
    probe: MidiOutput,
    connection: Option<MidiOutputConnection>,
}

impl MidirOutputEngine {
    pub fn new(client_name: impl Into<String>) -> Result<Self> {
        let client_name = client_name.into();
        let probe = MidiOutput::new(&client_name)?;
        Ok(Self {
            client_name,
            probe,
            connection: None,
        })
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }
}

impl PortEngine for MidirOutputEngine {
    fn port_count(&self) -> usize {
        self.probe.port_count()
    }

    fn port_name(&self, index: usize) -> Result<String> {
        let ports = self.probe.ports();
        let port = ports.get(index).ok_or(Error::PortOutOfRange {
            index,
            count: ports.len(),
        })?;
        Ok(self.probe.port_name(port)?)
    }

    fn open_port(&mut self, index: usize, label: &str) -> Result<()> {
        self.close_port();

        let output = MidiOutput::new(&self.client_name)?;
        let ports = output.ports();
        let port = ports.get(index).ok_or(Error::PortOutOfRange {
            index,
            count: ports.len(),
        })?;
        let connection = output.connect(port, label)?;
        self.connection = Some(connection);
        debug!("midir output connected to port {}", index);
        Ok(())
    }

    fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.close_port();
        self.connection = Some(create_virtual(&self.client_name, name)?);
        debug!("midir virtual output '{}' created", name);
        Ok(())
    }

    fn close_port(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!("midir output connection closed");
        }
    }

    fn is_port_open(&self) -> bool {
        self.connection.is_some()
    }
}

impl OutputEngine for MidirOutputEngine {
    fn send_message(&mut self, bytes: &[u8]) -> Result<()> {
        let connection = self.connection.as_mut().ok_or(Error::PortNotOpen)?;
        trace!("midir send {:02X?}", bytes);
        connection.send(bytes)?;
        Ok(())
    }
}

impl Drop for MidirOutputEngine {
    fn drop(&mut self) {
        self.close_port();
    }
}

#[cfg(unix)]
fn create_virtual(client_name: &str, name: &str) -> Result<MidiOutputConnection> {
    use midir::os::unix::VirtualOutput;

    let output = MidiOutput::new(client_name)?;
    Ok(output.create_virtual(name)?)
}

#[cfg(not(unix))]
fn create_virtual(_client_name: &str, _name: &str) -> Result<MidiOutputConnection> {
    Err(Error::VirtualPortsUnsupported)
}
