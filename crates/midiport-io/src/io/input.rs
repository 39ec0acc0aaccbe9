//! MIDI input engine backed by midir.
//!
//! midir invokes the connection closure on its own thread. The closure applies
//! the ignore filter, turns midir's microsecond timestamps into delta-times,
//! and forwards to whatever callback is currently registered.

use midiport_core::{
    DeltaClock, Error, IgnoreTypes, InputCallback, InputEngine, PortEngine, Result,
};
use midir::{Ignore, MidiInput, MidiInputConnection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

struct Shared {
    callback: Mutex<Option<InputCallback>>,
    ignore: AtomicU8,
}

impl Shared {
    fn handle(&self, timestamp: u64, bytes: &[u8], clock: &mut DeltaClock) {
        let ignore = IgnoreTypes::from_bits(self.ignore.load(Ordering::Acquire));
        if !ignore.allows(bytes) {
            trace!("midir input filtered {:02X?}", bytes);
            return;
        }
        let delta = clock.delta(timestamp);
        // Held across the call so cancel_callback() waits for an in-flight delivery.
        if let Some(callback) = self.callback.lock().as_mut() {
            callback(delta, bytes);
        }
    }
}

/// Filtering is done here rather than with `MidiInput::ignore` because midir
/// fixes its filter at connect time; ours can change while the port is open.
pub struct MidirInputEngine {
    client_name: String,
    probe: MidiInput,
    shared: Arc<Shared>,
    connection: Option<MidiInputConnection<DeltaClock>>,
}

impl MidirInputEngine {
    pub fn new(client_name: impl Into<String>) -> Result<Self> {
        let client_name = client_name.into();
        let probe = MidiInput::new(&client_name)?;
        Ok(Self {
            client_name,
            probe,
            shared: Arc::new(Shared {
                callback: Mutex::new(None),
                ignore: AtomicU8::new(IgnoreTypes::default().to_bits()),
            }),
            connection: None,
        })
    }

    pub fn client_name(&self) -> &str {
        &self.client_name
    }

    fn client(&self) -> Result<MidiInput> {
        let mut input = MidiInput::new(&self.client_name)?;
        input.ignore(Ignore::None);
        Ok(input)
    }
}

impl PortEngine for MidirInputEngine {
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

        let input = self.client()?;
        let ports = input.ports();
        let port = ports.get(index).ok_or(Error::PortOutOfRange {
            index,
            count: ports.len(),
        })?;
        let shared = Arc::clone(&self.shared);
        let connection = input.connect(
            port,
            label,
            move |timestamp, bytes, clock| shared.handle(timestamp, bytes, clock),
            DeltaClock::new(),
        )?;
        self.connection = Some(connection);
        debug!("midir input connected to port {}", index);
        Ok(())
    }

    fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.close_port();
        let input = self.client()?;
        self.connection = Some(create_virtual(input, name, Arc::clone(&self.shared))?);
        debug!("midir virtual input '{}' created", name);
        Ok(())
    }

    fn close_port(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
            debug!("midir input connection closed");
        }
    }

    fn is_port_open(&self) -> bool {
        self.connection.is_some()
    }
}

impl InputEngine for MidirInputEngine {
    fn set_callback(&mut self, callback: InputCallback) {
        *self.shared.callback.lock() = Some(callback);
    }

    fn cancel_callback(&mut self) {
        self.shared.callback.lock().take();
    }

    fn ignore_types(&mut self, ignore: IgnoreTypes) {
        self.shared.ignore.store(ignore.to_bits(), Ordering::Release);
    }
}

impl Drop for MidirInputEngine {
    fn drop(&mut self) {
        self.cancel_callback();
        self.close_port();
    }
}

#[cfg(unix)]
fn create_virtual(
    input: MidiInput,
    name: &str,
    shared: Arc<Shared>,
) -> Result<MidiInputConnection<DeltaClock>> {
    use midir::os::unix::VirtualInput;

    Ok(input.create_virtual(
        name,
        move |timestamp, bytes, clock| shared.handle(timestamp, bytes, clock),
        DeltaClock::new(),
    )?)
}

#[cfg(not(unix))]
fn create_virtual(
    _input: MidiInput,
    _name: &str,
    _shared: Arc<Shared>,
) -> Result<MidiInputConnection<DeltaClock>> {
    Err(Error::VirtualPortsUnsupported)
}
