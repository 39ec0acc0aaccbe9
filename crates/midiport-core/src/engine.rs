//! Engine traits: the seam between port controllers and a MIDI backend.
//!
//! Engines own platform handles and the driver thread. Controllers only
//! validate arguments, manage lifecycle, and move input off the driver thread.

use crate::{IgnoreTypes, Result};

/// Invoked on the engine's driver thread for every message that passes the
/// ignore filter. Arguments are `(delta_time_seconds, bytes)`.
pub type InputCallback = Box<dyn FnMut(f64, &[u8]) + Send + 'static>;

pub trait PortEngine {
    /// Currently visible ports. Re-queried on every call.
    fn port_count(&self) -> usize;

    /// Fails with [`crate::Error::PortOutOfRange`] when `index >= port_count()`.
    fn port_name(&self, index: usize) -> Result<String>;

    /// `label` is the client-side name advertised for the connection.
    fn open_port(&mut self, index: usize, label: &str) -> Result<()>;

    fn open_virtual_port(&mut self, name: &str) -> Result<()>;

    /// No-op when nothing is open.
    fn close_port(&mut self);

    fn is_port_open(&self) -> bool;
}

pub trait InputEngine: PortEngine {
    /// Replaces any previously registered callback. Messages received on a
    /// port closed before this call never reach the new callback.
    fn set_callback(&mut self, callback: InputCallback);

    /// After this returns the callback is never invoked again.
    fn cancel_callback(&mut self);

    fn ignore_types(&mut self, ignore: IgnoreTypes);
}

pub trait OutputEngine: PortEngine {
    /// Blocking write. No retry.
    fn send_message(&mut self, bytes: &[u8]) -> Result<()>;
}

impl<E: PortEngine + ?Sized> PortEngine for Box<E> {
    fn port_count(&self) -> usize {
        (**self).port_count()
    }

    fn port_name(&self, index: usize) -> Result<String> {
        (**self).port_name(index)
    }

    fn open_port(&mut self, index: usize, label: &str) -> Result<()> {
        (**self).open_port(index, label)
    }

    fn open_virtual_port(&mut self, name: &str) -> Result<()> {
        (**self).open_virtual_port(name)
    }

    fn close_port(&mut self) {
        (**self).close_port()
    }

    fn is_port_open(&self) -> bool {
        (**self).is_port_open()
    }
}

impl<E: InputEngine + ?Sized> InputEngine for Box<E> {
    fn set_callback(&mut self, callback: InputCallback) {
        (**self).set_callback(callback)
    }

    fn cancel_callback(&mut self) {
        (**self).cancel_callback()
    }

    fn ignore_types(&mut self, ignore: IgnoreTypes) {
        (**self).ignore_types(ignore)
    }
}

impl<E: OutputEngine + ?Sized> OutputEngine for Box<E> {
    fn send_message(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).send_message(bytes)
    }
}

/// Tracks the engine timestamp of the previous message and turns absolute
/// timestamps into delta-times.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeltaClock {
    last_micros: Option<u64>,
}

impl DeltaClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// `0.0` for the first message, then seconds since the previous one.
    /// Timestamps that go backwards yield `0.0`.
    pub fn delta(&mut self, timestamp_micros: u64) -> f64 {
        let delta = match self.last_micros {
            Some(last) => timestamp_micros.saturating_sub(last) as f64 / 1_000_000.0,
            None => 0.0,
        };
        self.last_micros = Some(timestamp_micros);
        delta
    }

    pub fn reset(&mut self) {
        self.last_micros = None;
    }
}
