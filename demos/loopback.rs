//! Output -> input round trip over the in-process loopback bus.
//!
//! A second thread plays the role of a hardware driver.

use midiport::prelude::*;
use std::thread;
use std::time::Duration;

fn main() {
    let bus = LoopbackBus::with_ports(["Loopback A"]);
    let event_loop = EventLoop::new();
    let builder = MidiPortBuilder::new().loopback(&bus);

    let mut input = builder.build_input(&event_loop).unwrap();
    input.on_message(|msg| println!("in : {:>6.3}s {:02X?}", msg.delta_time(), msg.bytes()));
    input.open_port(0).unwrap();

    let mut output = builder.build_output().unwrap();
    output.open_port(0).unwrap();
    output.send_message(&[0x90, 60, 100]).unwrap();
    println!("out: {:02X?}", bus.sent(0).last().unwrap());

    let driver = bus.clone();
    let handle = thread::spawn(move || {
        for note in [64u8, 67, 72] {
            thread::sleep(Duration::from_millis(50));
            driver.inject(0, 0.05, &[0x90, note, 100]).unwrap();
        }
    });

    let mut delivered = event_loop.run_until_idle();
    while delivered < 4 {
        delivered += event_loop.run_once(Duration::from_millis(200));
    }
    handle.join().unwrap();

    input.close_port();
    println!("delivered {} messages", delivered);
}
