//! In-process loopback MIDI bus.
//!
//! Behaves like an OS loopback driver: each bus port shows up both as an
//! input source and as an output destination, and bytes written to a
//! destination are delivered to every input bound to the matching source.
//! Virtual ports appear on the opposite side, as they do with real drivers.
//!
//! [`LoopbackBus::inject`] plays the role of hardware: it delivers on the
//! calling thread, which becomes the "driver thread" for that message.

use midiport_core::{
    Error, IgnoreTypes, InputCallback, InputEngine, OutputEngine, PortEngine, Result,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace};

type WireId = u64;
type SinkId = u64;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(0);

struct Subscriber {
    id: SinkId,
    sink: Arc<Sink>,
    /// Binding generation of `sink` when it subscribed.
    generation: u64,
}

struct Wire {
    name: String,
    subscribers: Vec<Subscriber>,
    sent: Vec<Vec<u8>>,
}

#[derive(Default)]
struct BusState {
    wires: HashMap<WireId, Wire>,
    /// Visible to input engines.
    sources: Vec<WireId>,
    /// Visible to output engines.
    destinations: Vec<WireId>,
    next_wire: WireId,
}

impl BusState {
    fn add_wire(&mut self, name: &str) -> WireId {
        let id = self.next_wire;
        self.next_wire += 1;
        self.wires.insert(
            id,
            Wire {
                name: name.to_string(),
                subscribers: Vec::new(),
                sent: Vec::new(),
            },
        );
        id
    }

    fn remove_wire(&mut self, id: WireId) {
        self.wires.remove(&id);
        self.sources.retain(|&w| w != id);
        self.destinations.retain(|&w| w != id);
    }

    fn wire_name(&self, list: &[WireId], index: usize) -> Result<String> {
        list.get(index)
            .and_then(|id| self.wires.get(id))
            .map(|wire| wire.name.clone())
            .ok_or(Error::PortOutOfRange {
                index,
                count: list.len(),
            })
    }

    /// Subscribers of `id` at this instant, cloned so delivery can happen
    /// without the bus lock.
    fn subscribers(&self, id: WireId) -> Vec<(Arc<Sink>, u64)> {
        self.wires
            .get(&id)
            .map(|wire| {
                wire.subscribers
                    .iter()
                    .map(|s| (Arc::clone(&s.sink), s.generation))
                    .collect()
            })
            .unwrap_or_default()
    }
}

struct Slot {
    callback: Option<InputCallback>,
    /// Bumped on every close. Deliveries copied out under an older
    /// generation are dropped.
    generation: u64,
}

/// Receiving end of one loopback input engine.
struct Sink {
    slot: Mutex<Slot>,
    ignore: AtomicU8,
    last_delivery: Mutex<Option<Instant>>,
}

impl Sink {
    fn new() -> Self {
        Self {
            slot: Mutex::new(Slot {
                callback: None,
                generation: 0,
            }),
            ignore: AtomicU8::new(IgnoreTypes::default().to_bits()),
            last_delivery: Mutex::new(None),
        }
    }

    fn generation(&self) -> u64 {
        self.slot.lock().generation
    }

    /// Waits for a delivery in progress, then invalidates every delivery
    /// copied out for the current binding.
    fn unbind(&self) {
        let mut slot = self.slot.lock();
        slot.generation = slot.generation.wrapping_add(1);
    }

    /// `generation`: binding the message was routed to. `delta`: explicit
    /// delta-time, or `None` to measure from the previous delivery. Returns
    /// whether a callback received the message.
    fn deliver(&self, generation: u64, delta: Option<f64>, bytes: &[u8]) -> bool {
        let ignore = IgnoreTypes::from_bits(self.ignore.load(Ordering::Acquire));
        if !ignore.allows(bytes) {
            trace!("Loopback input filtered {:02X?}", bytes);
            return false;
        }

        let mut slot = self.slot.lock();
        if slot.generation != generation {
            trace!("Loopback input dropped {:02X?} routed to a closed binding", bytes);
            return false;
        }

        let now = Instant::now();
        let delta = {
            let mut last = self.last_delivery.lock();
            let measured = last
                .map(|t| now.duration_since(t).as_secs_f64())
                .unwrap_or(0.0);
            *last = Some(now);
            delta.unwrap_or(measured)
        };

        match slot.callback.as_mut() {
            Some(callback) => {
                callback(delta, bytes);
                true
            }
            None => false,
        }
    }
}

/// Shared handle to a loopback bus. Clones refer to the same bus.
#[derive(Clone, Default)]
pub struct LoopbackBus {
    state: Arc<Mutex<BusState>>,
}

impl LoopbackBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ports<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let bus = Self::new();
        for name in names {
            bus.add_port(name.as_ref());
        }
        bus
    }

    /// Plugs in a port visible on both sides. Returns its input-side index.
    pub fn add_port(&self, name: &str) -> usize {
        let mut state = self.state.lock();
        let id = state.add_wire(name);
        state.sources.push(id);
        state.destinations.push(id);
        debug!("Loopback port '{}' added", name);
        state.sources.len() - 1
    }

    /// Unplugs the first port named `name`. Bound engines keep their handle
    /// but sends on it fail from then on.
    pub fn remove_port(&self, name: &str) -> bool {
        let mut state = self.state.lock();
        let found = state
            .wires
            .iter()
            .find(|(_, wire)| wire.name == name)
            .map(|(id, _)| *id);
        match found {
            Some(id) => {
                state.remove_wire(id);
                debug!("Loopback port '{}' removed", name);
                true
            }
            None => false,
        }
    }

    pub fn input_port_names(&self) -> Vec<String> {
        let state = self.state.lock();
        (0..state.sources.len())
            .filter_map(|i| state.wire_name(&state.sources, i).ok())
            .collect()
    }

    pub fn output_port_names(&self) -> Vec<String> {
        let state = self.state.lock();
        (0..state.destinations.len())
            .filter_map(|i| state.wire_name(&state.destinations, i).ok())
            .collect()
    }

    /// Simulates the driver receiving `bytes` on input port `index`.
    /// Returns how many bound inputs accepted the message.
    pub fn inject(&self, index: usize, delta_time: f64, bytes: &[u8]) -> Result<usize> {
        let subscribers = {
            let state = self.state.lock();
            let id = *state.sources.get(index).ok_or(Error::PortOutOfRange {
                index,
                count: state.sources.len(),
            })?;
            state.subscribers(id)
        };
        Ok(subscribers
            .iter()
            .filter(|(sink, generation)| sink.deliver(*generation, Some(delta_time), bytes))
            .count())
    }

    /// Every message written to output port `index`, in write order.
    pub fn sent(&self, index: usize) -> Vec<Vec<u8>> {
        let state = self.state.lock();
        state
            .destinations
            .get(index)
            .and_then(|id| state.wires.get(id))
            .map(|wire| wire.sent.clone())
            .unwrap_or_default()
    }

    pub fn input_engine(&self) -> LoopbackInput {
        LoopbackInput {
            bus: self.clone(),
            id: NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed),
            sink: Arc::new(Sink::new()),
            binding: None,
        }
    }

    pub fn output_engine(&self) -> LoopbackOutput {
        LoopbackOutput {
            bus: self.clone(),
            binding: None,
        }
    }
}

impl std::fmt::Debug for LoopbackBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackBus")
            .field("inputs", &self.input_port_names())
            .field("outputs", &self.output_port_names())
            .finish()
    }
}

#[derive(Debug, Clone, Copy)]
struct Binding {
    wire: WireId,
    is_virtual: bool,
}

/// Input engine on a [`LoopbackBus`].
pub struct LoopbackInput {
    bus: LoopbackBus,
    id: SinkId,
    sink: Arc<Sink>,
    binding: Option<Binding>,
}

impl LoopbackInput {
    /// `generation` is read before the bus lock is taken; a callback may
    /// hold its slot while calling back into the bus.
    fn subscribe(
        &mut self,
        state: &mut BusState,
        wire: WireId,
        is_virtual: bool,
        generation: u64,
    ) {
        if let Some(wire) = state.wires.get_mut(&wire) {
            wire.subscribers.push(Subscriber {
                id: self.id,
                sink: Arc::clone(&self.sink),
                generation,
            });
        }
        *self.sink.last_delivery.lock() = None;
        self.binding = Some(Binding { wire, is_virtual });
    }
}

impl PortEngine for LoopbackInput {
    fn port_count(&self) -> usize {
        self.bus.state.lock().sources.len()
    }

    fn port_name(&self, index: usize) -> Result<String> {
        let state = self.bus.state.lock();
        state.wire_name(&state.sources, index)
    }

    fn open_port(&mut self, index: usize, _label: &str) -> Result<()> {
        self.close_port();
        let generation = self.sink.generation();
        let bus = self.bus.clone();
        let mut state = bus.state.lock();
        let wire = *state.sources.get(index).ok_or(Error::PortOutOfRange {
            index,
            count: state.sources.len(),
        })?;
        self.subscribe(&mut state, wire, false, generation);
        Ok(())
    }

    fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.close_port();
        let generation = self.sink.generation();
        let bus = self.bus.clone();
        let mut state = bus.state.lock();
        let wire = state.add_wire(name);
        state.destinations.push(wire);
        self.subscribe(&mut state, wire, true, generation);
        debug!("Loopback virtual input '{}' created", name);
        Ok(())
    }

    fn close_port(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        self.sink.unbind();
        let mut state = self.bus.state.lock();
        if binding.is_virtual {
            state.remove_wire(binding.wire);
        } else if let Some(wire) = state.wires.get_mut(&binding.wire) {
            wire.subscribers.retain(|s| s.id != self.id);
        }
    }

    fn is_port_open(&self) -> bool {
        self.binding.is_some()
    }
}

impl InputEngine for LoopbackInput {
    fn set_callback(&mut self, callback: InputCallback) {
        self.sink.slot.lock().callback = Some(callback);
    }

    fn cancel_callback(&mut self) {
        self.sink.slot.lock().callback.take();
    }

    fn ignore_types(&mut self, ignore: IgnoreTypes) {
        self.sink.ignore.store(ignore.to_bits(), Ordering::Release);
    }
}

impl Drop for LoopbackInput {
    fn drop(&mut self) {
        self.cancel_callback();
        self.close_port();
    }
}

/// Output engine on a [`LoopbackBus`].
pub struct LoopbackOutput {
    bus: LoopbackBus,
    binding: Option<Binding>,
}

impl PortEngine for LoopbackOutput {
    fn port_count(&self) -> usize {
        self.bus.state.lock().destinations.len()
    }

    fn port_name(&self, index: usize) -> Result<String> {
        let state = self.bus.state.lock();
        state.wire_name(&state.destinations, index)
    }

    fn open_port(&mut self, index: usize, _label: &str) -> Result<()> {
        self.close_port();
        let state = self.bus.state.lock();
        let wire = *state.destinations.get(index).ok_or(Error::PortOutOfRange {
            index,
            count: state.destinations.len(),
        })?;
        drop(state);
        self.binding = Some(Binding {
            wire,
            is_virtual: false,
        });
        Ok(())
    }

    fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.close_port();
        let mut state = self.bus.state.lock();
        let wire = state.add_wire(name);
        state.sources.push(wire);
        drop(state);
        self.binding = Some(Binding {
            wire,
            is_virtual: true,
        });
        debug!("Loopback virtual output '{}' created", name);
        Ok(())
    }

    fn close_port(&mut self) {
        if let Some(binding) = self.binding.take() {
            if binding.is_virtual {
                self.bus.state.lock().remove_wire(binding.wire);
            }
        }
    }

    fn is_port_open(&self) -> bool {
        self.binding.is_some()
    }
}

impl OutputEngine for LoopbackOutput {
    fn send_message(&mut self, bytes: &[u8]) -> Result<()> {
        let binding = self.binding.ok_or(Error::PortNotOpen)?;
        let subscribers = {
            let mut state = self.bus.state.lock();
            let wire = state
                .wires
                .get_mut(&binding.wire)
                .ok_or_else(|| Error::MidiPort("Loopback port was removed".to_string()))?;
            wire.sent.push(bytes.to_vec());
            state.subscribers(binding.wire)
        };
        for (sink, generation) in &subscribers {
            sink.deliver(*generation, None, bytes);
        }
        Ok(())
    }
}

impl Drop for LoopbackOutput {
    fn drop(&mut self) {
        self.close_port();
    }
}
