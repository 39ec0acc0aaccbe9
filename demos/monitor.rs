//! Prints every message arriving on an input port.
//!
//! Usage: `cargo run --example monitor -- [port name]`
//! Without a name, opens a virtual input called "midiport monitor".
//! Stops after a Stop (0xFC) message.

use midiport::prelude::*;
use std::cell::RefCell;
use std::rc::Rc;

fn main() {
    tracing_subscriber::fmt::init();

    let event_loop = EventLoop::new();
    let input = Rc::new(RefCell::new(
        MidiPortBuilder::new()
            .client_name("midiport-monitor")
            .ignore(IgnoreTypes::new(false, true, true))
            .build_input(&event_loop)
            .unwrap(),
    ));

    match std::env::args().nth(1) {
        Some(pattern) => {
            let index = input.borrow_mut().open_port_by_name(&pattern).unwrap_or_else(|e| {
                eprintln!("ERROR: {}", e);
                std::process::exit(1);
            });
            println!("Listening on [{}] {}", index, pattern);
        }
        None => {
            input
                .borrow_mut()
                .open_virtual_port("midiport monitor")
                .unwrap();
            println!("Listening on virtual port 'midiport monitor'");
        }
    }

    let handle = Rc::downgrade(&input);
    input.borrow().on_message(move |msg| {
        println!("{:>8.3}s  {:02X?}", msg.delta_time(), msg.bytes());
        if msg.status() == Some(0xFC) {
            if let Some(input) = handle.upgrade() {
                input.borrow_mut().close_port();
            }
        }
    });

    // Returns once the port is closed
    event_loop.run();
    println!("Stopped");
}
