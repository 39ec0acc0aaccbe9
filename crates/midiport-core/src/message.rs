//! Received MIDI messages.

use serde::{Deserialize, Serialize};

/// A raw MIDI message as delivered by an input engine.
///
/// `delta_time` is the time in seconds since the previous message on the
/// same port. The engine assigns it; the first message after a port is
/// opened carries `0.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MidiMessage {
    delta_time: f64,
    bytes: Vec<u8>,
}

impl MidiMessage {
    pub fn new(delta_time: f64, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            delta_time,
            bytes: bytes.into(),
        }
    }

    #[inline]
    pub fn delta_time(&self) -> f64 {
        self.delta_time
    }

    #[inline]
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    #[inline]
    pub fn status(&self) -> Option<u8> {
        self.bytes.first().copied()
    }

    /// Channel (0-15) for channel voice/mode messages.
    pub fn channel(&self) -> Option<u8> {
        match self.status()? {
            s @ 0x80..=0xEF => Some(s & 0x0F),
            _ => None,
        }
    }

    pub fn into_parts(self) -> (f64, Vec<u8>) {
        (self.delta_time, self.bytes)
    }
}
