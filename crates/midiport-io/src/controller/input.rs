//! Input port controller.
//!
//! The engine callback runs on the driver thread and only appends to the
//! inbound queue. Listeners run on the event loop thread when the loop
//! dispatches this controller's source.

use crate::port::{check_index, find_port, list_ports, port_name, PortInfo, PortType};
use midiport_core::{
    AsyncSource, EventLoop, IgnoreTypes, InboundQueue, InputEngine, KeepAlive, MidiMessage,
    QueueStats, Result,
};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

type Listener = Box<dyn FnMut(&MidiMessage)>;
type Listeners = Rc<ListenerSet>;

#[derive(Default)]
struct ListenerSet {
    registered: RefCell<Vec<Listener>>,
    /// Bumped by `clear_listeners`, so a clear from inside a listener is not
    /// undone when the running set is put back.
    cleared: Cell<u64>,
}

/// Receives MIDI from one input port at a time and emits each message to the
/// registered listeners on the event loop thread.
pub struct MidiInput<E: InputEngine = Box<dyn InputEngine>> {
    engine: E,
    event_loop: EventLoop,
    queue: InboundQueue,
    listeners: Listeners,
    source: Option<AsyncSource>,
    keep_alive: Option<KeepAlive>,
    /// Bumped on every close; a batch in flight stops when it changes.
    epoch: Rc<Cell<u64>>,
    ignore: IgnoreTypes,
    label: String,
    connected: Option<String>,
}

#[cfg(feature = "midi-io")]
impl MidiInput {
    /// Input controller on the platform's MIDI backend.
    pub fn new(event_loop: &EventLoop) -> Result<Self> {
        Self::with_label(event_loop, crate::io::DEFAULT_CLIENT_NAME)
    }

    pub fn with_label(event_loop: &EventLoop, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let engine = crate::io::MidirInputEngine::new(label.clone())?;
        Ok(Self::with_engine(
            Box::new(engine) as Box<dyn InputEngine>,
            event_loop,
            label,
        ))
    }
}

impl<E: InputEngine> MidiInput<E> {
    pub fn with_engine(mut engine: E, event_loop: &EventLoop, label: impl Into<String>) -> Self {
        let ignore = IgnoreTypes::default();
        engine.ignore_types(ignore);
        Self {
            engine,
            event_loop: event_loop.clone(),
            queue: InboundQueue::new(),
            listeners: Rc::new(ListenerSet::default()),
            source: None,
            keep_alive: None,
            epoch: Rc::new(Cell::new(0)),
            ignore,
            label: label.into(),
            connected: None,
        }
    }

    /// Replaces the inbound queue, e.g. one with a capacity. Closes the port
    /// if it is open.
    pub fn with_queue(mut self, queue: InboundQueue) -> Self {
        self.close_port();
        self.queue = queue;
        self
    }

    pub fn port_count(&self) -> usize {
        self.engine.port_count()
    }

    pub fn port_name(&self, index: usize) -> Result<String> {
        port_name(&self.engine, index)
    }

    pub fn ports(&self) -> Vec<PortInfo> {
        list_ports(&self.engine, PortType::Input)
    }

    /// Binds to input port `index` and starts relaying its messages.
    /// An existing binding is closed first.
    pub fn open_port(&mut self, index: usize) -> Result<()> {
        check_index(&self.engine, index)?;
        let name = self.engine.port_name(index).ok();

        self.attach();
        if let Err(e) = self.engine.open_port(index, &self.label) {
            self.close_port();
            return Err(e);
        }
        debug!("Opened MIDI input port {} ({:?})", index, name);
        self.connected = name;
        Ok(())
    }

    pub fn open_port_by_name(&mut self, pattern: &str) -> Result<usize> {
        let index = find_port(&self.engine, pattern)?;
        self.open_port(index)?;
        Ok(index)
    }

    pub fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        self.attach();
        if let Err(e) = self.engine.open_virtual_port(name) {
            self.close_port();
            return Err(e);
        }
        debug!("Opened virtual MIDI input '{}'", name);
        self.connected = Some(name.to_string());
        Ok(())
    }

    /// Stops the driver callback, closes the port, releases the event loop
    /// and discards anything not yet delivered. No-op when closed.
    pub fn close_port(&mut self) {
        self.engine.cancel_callback();
        if self.engine.is_port_open() {
            self.engine.close_port();
            debug!("Closed MIDI input port {:?}", self.connected);
        }
        if let Some(mut source) = self.source.take() {
            source.detach();
        }
        self.keep_alive = None;

        let discarded = self.queue.clear();
        if discarded > 0 {
            debug!("Dropped {} undelivered MIDI messages on close", discarded);
        }
        self.epoch.set(self.epoch.get().wrapping_add(1));
        self.connected = None;
    }

    pub fn is_port_open(&self) -> bool {
        self.engine.is_port_open()
    }

    pub fn connected_port_name(&self) -> Option<&str> {
        self.connected.as_deref()
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// `true` suppresses that category before it reaches the queue.
    pub fn ignore_types(&mut self, sysex: bool, timing: bool, sensing: bool) {
        self.set_ignore(IgnoreTypes::new(sysex, timing, sensing));
    }

    pub fn set_ignore(&mut self, ignore: IgnoreTypes) {
        self.ignore = ignore;
        self.engine.ignore_types(ignore);
    }

    pub fn ignore(&self) -> IgnoreTypes {
        self.ignore
    }

    /// Registers a listener for every delivered message. Listeners run on
    /// the event loop thread in registration order.
    pub fn on_message<F>(&self, listener: F)
    where
        F: FnMut(&MidiMessage) + 'static,
    {
        self.listeners.registered.borrow_mut().push(Box::new(listener));
    }

    /// Removes every listener. Called from a listener, the remaining
    /// listeners are skipped for the message being emitted.
    pub fn clear_listeners(&self) {
        self.listeners.registered.borrow_mut().clear();
        let cleared = &self.listeners.cleared;
        cleared.set(cleared.get().wrapping_add(1));
    }

    /// Received but not yet delivered, at the time of the call.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Rejected because the queue was at capacity.
    pub fn dropped(&self) -> u64 {
        self.queue.dropped()
    }

    /// `pending` and `dropped` read together.
    pub fn stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Whether this controller is keeping the event loop alive.
    pub fn is_referenced(&self) -> bool {
        self.keep_alive.is_some()
    }

    /// Delivers the current backlog immediately instead of waiting for the
    /// event loop. Must be called on the loop thread.
    pub fn dispatch_pending(&self) -> usize {
        deliver(&self.queue, &self.listeners, &self.epoch)
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn engine_mut(&mut self) -> &mut E {
        &mut self.engine
    }

    /// Registers the loop source, the driver callback and the keep-alive
    /// token for a new binding.
    fn attach(&mut self) {
        self.close_port();

        let queue = self.queue.clone();
        let listeners = Rc::clone(&self.listeners);
        let epoch = Rc::clone(&self.epoch);
        let source = self
            .event_loop
            .async_source(move || deliver(&queue, &listeners, &epoch));

        let producer = self.queue.producer(source.waker());
        self.engine.set_callback(Box::new(move |delta_time: f64, bytes: &[u8]| {
            producer.push(MidiMessage::new(delta_time, bytes));
        }));

        self.source = Some(source);
        self.keep_alive = Some(self.event_loop.keep_alive());
    }
}

/// Takes the backlog in one pass and emits it outside the queue lock.
/// Stops early if a listener closes the port.
fn deliver(queue: &InboundQueue, listeners: &Listeners, epoch: &Cell<u64>) -> usize {
    let started = epoch.get();
    let batch = queue.take_all();
    let mut delivered = 0;
    for message in &batch {
        if epoch.get() != started {
            break;
        }
        emit(listeners, message);
        delivered += 1;
    }
    delivered
}

fn emit(listeners: &ListenerSet, message: &MidiMessage) {
    // Taken out so a listener may register more listeners while running.
    let cleared = listeners.cleared.get();
    let mut active = std::mem::take(&mut *listeners.registered.borrow_mut());
    for listener in active.iter_mut() {
        if listeners.cleared.get() != cleared {
            break;
        }
        listener(message);
    }
    if listeners.cleared.get() != cleared {
        return;
    }
    let mut slot = listeners.registered.borrow_mut();
    let added = std::mem::replace(&mut *slot, active);
    slot.extend(added);
}

impl<E: InputEngine> Drop for MidiInput<E> {
    fn drop(&mut self) {
        self.close_port();
    }
}

impl<E: InputEngine> std::fmt::Debug for MidiInput<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MidiInput")
            .field("label", &self.label)
            .field("connected", &self.connected)
            .field("ignore", &self.ignore)
            .field("pending", &self.pending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoopbackBus, LoopbackInput};
    use midiport_core::{Error, ErrorKind, InputEngine, PortEngine};
    use std::sync::mpsc;
    use std::thread;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_millis(500);

    fn recorder(input: &MidiInput<LoopbackInput>) -> Rc<RefCell<Vec<MidiMessage>>> {
        let received = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&received);
        input.on_message(move |message| sink.borrow_mut().push(message.clone()));
        received
    }

    fn open_input(bus: &LoopbackBus, event_loop: &EventLoop) -> MidiInput<LoopbackInput> {
        let mut input = MidiInput::with_engine(bus.input_engine(), event_loop, "test");
        input.open_port(0).unwrap();
        input
    }

    #[test]
    fn test_messages_delivered_in_order() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = open_input(&bus, &event_loop);
        let received = recorder(&input);

        let driver = bus.clone();
        thread::spawn(move || {
            driver.inject(0, 0.0, &[0x90, 0x40, 0x7F]).unwrap();
            driver.inject(0, 0.01, &[0x80, 0x40, 0x00]).unwrap();
        })
        .join()
        .unwrap();

        assert_eq!(event_loop.run_once(WAIT), 2);
        let received = received.borrow();
        assert_eq!(received.len(), 2);
        assert_eq!(received[0].bytes(), &[0x90, 0x40, 0x7F]);
        assert_eq!(received[0].delta_time(), 0.0);
        assert_eq!(received[1].bytes(), &[0x80, 0x40, 0x00]);
        assert_eq!(received[1].delta_time(), 0.01);
    }

    #[test]
    fn test_listeners_not_called_on_driver_thread() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = open_input(&bus, &event_loop);
        let received = recorder(&input);

        bus.inject(0, 0.0, &[0x90, 1, 1]).unwrap();
        assert!(received.borrow().is_empty());
        assert_eq!(input.pending(), 1);

        event_loop.run_until_idle();
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(input.pending(), 0);
    }

    #[test]
    fn test_open_out_of_range() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let mut input = MidiInput::with_engine(bus.input_engine(), &event_loop, "test");

        let err = input.open_port(3).unwrap_err();
        assert!(matches!(err, Error::PortOutOfRange { index: 3, count: 1 }));
        assert_eq!(err.kind(), ErrorKind::Range);
        assert!(!input.is_port_open());
        assert!(!input.is_referenced());
        assert_eq!(event_loop.alive(), 0);
        assert_eq!(event_loop.source_count(), 0);
    }

    #[test]
    fn test_close_discards_backlog_and_releases_loop() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let mut input = open_input(&bus, &event_loop);
        let received = recorder(&input);
        assert_eq!(event_loop.alive(), 1);

        bus.inject(0, 0.0, &[0x90, 1, 1]).unwrap();
        input.close_port();

        assert_eq!(input.pending(), 0);
        assert!(!input.is_port_open());
        assert_eq!(event_loop.alive(), 0);
        assert_eq!(event_loop.source_count(), 0);

        // Wake raised before close is ignored
        assert_eq!(event_loop.run_until_idle(), 0);
        assert!(received.borrow().is_empty());

        // Nothing reaches the closed controller
        assert_eq!(bus.inject(0, 0.0, &[0x90, 2, 2]).unwrap(), 0);
    }

    #[test]
    fn test_double_close_is_noop() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let mut input = MidiInput::with_engine(bus.input_engine(), &event_loop, "test");
        input.close_port();
        input.open_port(0).unwrap();
        input.close_port();
        input.close_port();
        assert_eq!(event_loop.alive(), 0);
    }

    #[test]
    fn test_reopen_holds_single_keep_alive() {
        let bus = LoopbackBus::with_ports(["Keys", "Pads"]);
        let event_loop = EventLoop::new();
        let mut input = open_input(&bus, &event_loop);
        let received = recorder(&input);

        input.open_port(1).unwrap();
        assert_eq!(event_loop.alive(), 1);
        assert_eq!(event_loop.source_count(), 1);
        assert_eq!(input.connected_port_name(), Some("Pads"));

        assert_eq!(bus.inject(0, 0.0, &[0x90, 1, 1]).unwrap(), 0);
        assert_eq!(bus.inject(1, 0.0, &[0x90, 2, 2]).unwrap(), 1);
        event_loop.run_until_idle();
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(received.borrow()[0].bytes()[1], 2);
    }

    #[test]
    fn test_default_ignores_clock_and_sysex() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let mut input = open_input(&bus, &event_loop);
        let received = recorder(&input);
        assert_eq!(input.ignore(), IgnoreTypes::ALL);

        bus.inject(0, 0.0, &[0xF8]).unwrap();
        bus.inject(0, 0.0, &[0xF0, 0x7E, 0xF7]).unwrap();
        bus.inject(0, 0.0, &[0xFE]).unwrap();
        event_loop.run_until_idle();
        assert!(received.borrow().is_empty());

        input.ignore_types(false, true, true);
        bus.inject(0, 0.0, &[0xF0, 0x7E, 0xF7]).unwrap();
        bus.inject(0, 0.0, &[0xF8]).unwrap();
        event_loop.run_until_idle();
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(received.borrow()[0].bytes(), &[0xF0, 0x7E, 0xF7]);
    }

    #[test]
    fn test_capacity_drops_newest() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let mut input = MidiInput::with_engine(bus.input_engine(), &event_loop, "test")
            .with_queue(InboundQueue::with_limits(Some(2), 16));
        input.open_port(0).unwrap();
        let received = recorder(&input);

        for note in 0..5 {
            bus.inject(0, 0.0, &[0x90, note, 1]).unwrap();
        }
        assert_eq!(input.pending(), 2);
        assert_eq!(input.dropped(), 3);
        assert_eq!(
            input.stats(),
            QueueStats {
                pending: 2,
                dropped: 3
            }
        );

        event_loop.run_until_idle();
        let notes: Vec<u8> = received.borrow().iter().map(|m| m.bytes()[1]).collect();
        assert_eq!(notes, vec![0, 1]);
    }

    #[test]
    fn test_listener_closing_port_stops_batch() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = Rc::new(RefCell::new(open_input(&bus, &event_loop)));
        let count = Rc::new(Cell::new(0));

        let handle = Rc::clone(&input);
        let seen = Rc::clone(&count);
        input.borrow().on_message(move |_| {
            seen.set(seen.get() + 1);
            handle.borrow_mut().close_port();
        });

        for note in 0..3 {
            bus.inject(0, 0.0, &[0x90, note, 1]).unwrap();
        }
        assert_eq!(event_loop.run_until_idle(), 1);
        assert_eq!(count.get(), 1);
        assert!(!input.borrow().is_port_open());
        input.borrow().clear_listeners();
    }

    #[test]
    fn test_listener_added_during_delivery() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = Rc::new(open_input(&bus, &event_loop));
        let late_hits = Rc::new(Cell::new(0));

        let handle = Rc::downgrade(&input);
        let hits = Rc::clone(&late_hits);
        let registered = Cell::new(false);
        input.on_message(move |_| {
            if registered.replace(true) {
                return;
            }
            if let Some(input) = handle.upgrade() {
                let hits = Rc::clone(&hits);
                input.on_message(move |_| hits.set(hits.get() + 1));
            }
        });

        bus.inject(0, 0.0, &[0x90, 1, 1]).unwrap();
        bus.inject(0, 0.0, &[0x90, 2, 1]).unwrap();
        event_loop.run_until_idle();
        assert_eq!(late_hits.get(), 1);
    }

    #[test]
    fn test_listener_clearing_listeners() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = Rc::new(open_input(&bus, &event_loop));
        let first_hits = Rc::new(Cell::new(0));
        let second_hits = Rc::new(Cell::new(0));

        let handle = Rc::downgrade(&input);
        let hits = Rc::clone(&first_hits);
        input.on_message(move |_| {
            hits.set(hits.get() + 1);
            if let Some(input) = handle.upgrade() {
                input.clear_listeners();
            }
        });
        let hits = Rc::clone(&second_hits);
        input.on_message(move |_| hits.set(hits.get() + 1));

        bus.inject(0, 0.0, &[0x90, 1, 1]).unwrap();
        bus.inject(0, 0.0, &[0x90, 2, 1]).unwrap();
        assert_eq!(event_loop.run_until_idle(), 2);
        assert_eq!(first_hits.get(), 1);
        assert_eq!(second_hits.get(), 0);

        // Listeners registered after the clear stay
        let received = recorder(&input);
        bus.inject(0, 0.0, &[0x90, 3, 1]).unwrap();
        event_loop.run_until_idle();
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(first_hits.get(), 1);
    }

    #[test]
    fn test_reopen_drops_message_routed_to_previous_port() {
        let bus = LoopbackBus::with_ports(["Keys", "Pads"]);

        // Subscribed first on "Keys", so it stalls the driver thread before
        // the controller's callback is reached.
        let (entered_tx, entered_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();
        let mut stall = bus.input_engine();
        stall.set_callback(Box::new(move |_delta: f64, _bytes: &[u8]| {
            let _ = entered_tx.send(());
            let _ = release_rx.recv();
        }));
        stall.open_port(0, "stall").unwrap();

        let event_loop = EventLoop::new();
        let mut input = open_input(&bus, &event_loop);
        let received = recorder(&input);

        let driver = bus.clone();
        let handle = thread::spawn(move || driver.inject(0, 0.0, &[0x90, 0x11, 0x7F]).unwrap());
        entered_rx.recv_timeout(WAIT).unwrap();

        input.open_port(1).unwrap();
        release_tx.send(()).unwrap();
        assert_eq!(handle.join().unwrap(), 1);

        event_loop.run_until_idle();
        assert_eq!(input.connected_port_name(), Some("Pads"));
        assert_eq!(input.pending(), 0);
        assert!(received.borrow().is_empty());

        bus.inject(1, 0.0, &[0x90, 0x12, 0x7F]).unwrap();
        event_loop.run_until_idle();
        assert_eq!(received.borrow()[0].bytes(), &[0x90, 0x12, 0x7F]);
    }

    #[test]
    fn test_dispatch_pending_without_loop() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = open_input(&bus, &event_loop);
        let received = recorder(&input);

        bus.inject(0, 0.0, &[0xB0, 1, 64]).unwrap();
        assert_eq!(input.dispatch_pending(), 1);
        assert_eq!(received.borrow().len(), 1);
        assert_eq!(event_loop.run_until_idle(), 0);
    }

    #[test]
    fn test_virtual_port_receives_from_output() {
        let bus = LoopbackBus::new();
        let event_loop = EventLoop::new();
        let mut input = MidiInput::with_engine(bus.input_engine(), &event_loop, "test");
        input.open_virtual_port("Monitor In").unwrap();
        let received = recorder(&input);

        let mut out = crate::MidiOutput::with_engine(bus.output_engine(), "test");
        out.open_port_by_name("monitor").unwrap();
        out.send_message(&[0x90, 60, 100]).unwrap();

        event_loop.run_until_idle();
        assert_eq!(received.borrow()[0].bytes(), &[0x90, 60, 100]);
        assert_eq!(input.connected_port_name(), Some("Monitor In"));
    }

    #[test]
    fn test_drop_releases_loop() {
        let bus = LoopbackBus::with_ports(["Keys"]);
        let event_loop = EventLoop::new();
        let input = open_input(&bus, &event_loop);
        assert_eq!(event_loop.alive(), 1);
        drop(input);
        assert_eq!(event_loop.alive(), 0);
        assert_eq!(event_loop.run(), 0);
    }
}
