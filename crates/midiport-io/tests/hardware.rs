//! Hardware integration tests against the platform MIDI backend.
//!
//! Uses virtual ports, so no device is needed, but the OS MIDI service must
//! be running (ALSA sequencer on Linux, CoreMIDI on macOS). All tests are
//! `#[ignore]` so CI doesn't fail without one.
//!
//! Run with:
//!   cargo test -p midiport-io --test hardware -- --ignored --test-threads=1

#![cfg(all(feature = "midi-io", unix))]

use midiport_io::{EventLoop, MidiInput, MidiMessage, MidiOutput};
use std::cell::RefCell;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

const SETTLE: Duration = Duration::from_millis(200);
const WAIT: Duration = Duration::from_millis(500);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

/// Virtual output -> hardware input controller.
#[test]
#[ignore]
fn test_virtual_output_to_input() {
    init_tracing();
    let event_loop = EventLoop::new();
    let mut output = MidiOutput::with_label("midiport-test-out").expect("MIDI backend unavailable");
    output
        .open_virtual_port("midiport loopback")
        .expect("virtual output");
    thread::sleep(SETTLE);

    let mut input = MidiInput::with_label(&event_loop, "midiport-test-in").unwrap();
    input
        .open_port_by_name("midiport loopback")
        .expect("virtual port should be listed as an input");
    let received: Rc<RefCell<Vec<MidiMessage>>> = Rc::default();
    let sink = Rc::clone(&received);
    input.on_message(move |message| sink.borrow_mut().push(message.clone()));
    thread::sleep(SETTLE);

    output.send_message(&[0x90, 0x40, 0x7F]).unwrap();
    output.send_message(&[0x80, 0x40, 0x00]).unwrap();

    let mut delivered = 0;
    for _ in 0..10 {
        delivered += event_loop.run_once(WAIT);
        if delivered >= 2 {
            break;
        }
    }

    let received = received.borrow();
    assert_eq!(received.len(), 2);
    assert_eq!(received[0].bytes(), &[0x90, 0x40, 0x7F]);
    assert_eq!(received[0].delta_time(), 0.0);
    assert_eq!(received[1].bytes(), &[0x80, 0x40, 0x00]);
}

/// Virtual input is visible to output controllers; closing it removes it.
#[test]
#[ignore]
fn test_virtual_input_lifecycle() {
    init_tracing();
    let event_loop = EventLoop::new();
    let mut input = MidiInput::with_label(&event_loop, "midiport-test-in").unwrap();
    input.open_virtual_port("midiport sink").unwrap();
    assert!(input.is_referenced());
    thread::sleep(SETTLE);

    let output = MidiOutput::with_label("midiport-test-out").unwrap();
    assert!(output.ports().iter().any(|p| p.name.contains("midiport sink")));

    input.close_port();
    input.close_port();
    assert_eq!(event_loop.alive(), 0);
}

#[test]
#[ignore]
fn test_list_ports() {
    init_tracing();
    let event_loop = EventLoop::new();
    let input = MidiInput::new(&event_loop).unwrap();
    let output = MidiOutput::new().unwrap();

    for port in input.ports().iter().chain(output.ports().iter()) {
        println!("{:?} {}: {}", port.port_type, port.index, port.name);
    }
    assert!(input.port_name(input.port_count()).is_err());
}
