use midiport::prelude::*;

fn main() {
    let event_loop = EventLoop::new();
    let builder = MidiPortBuilder::new().client_name("list-ports");
    let input = builder.build_input(&event_loop).unwrap();
    let output = builder.build_output().unwrap();

    println!("=== MIDI Input Ports ===");
    let ports = input.ports();
    if ports.is_empty() {
        println!("  (none found)");
    }
    for port in &ports {
        println!("  [{}] {}", port.index, port.name);
    }

    println!("\n=== MIDI Output Ports ===");
    let ports = output.ports();
    if ports.is_empty() {
        println!("  (none found)");
    }
    for port in &ports {
        println!("  [{}] {}", port.index, port.name);
    }
}
