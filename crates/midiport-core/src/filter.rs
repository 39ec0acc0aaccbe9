//! Message-category suppression applied by input engines before delivery.

use serde::{Deserialize, Serialize};

const SYSEX_START: u8 = 0xF0;
const SYSEX_END: u8 = 0xF7;
const MTC_QUARTER_FRAME: u8 = 0xF1;
const TIMING_CLOCK: u8 = 0xF8;
const ACTIVE_SENSING: u8 = 0xFE;

/// Which message categories an input engine drops.
///
/// Defaults to dropping all three, which is what MIDI engines do until
/// told otherwise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IgnoreTypes {
    pub sysex: bool,
    pub timing: bool,
    pub sensing: bool,
}

impl IgnoreTypes {
    pub const NONE: IgnoreTypes = IgnoreTypes {
        sysex: false,
        timing: false,
        sensing: false,
    };

    pub const ALL: IgnoreTypes = IgnoreTypes {
        sysex: true,
        timing: true,
        sensing: true,
    };

    pub fn new(sysex: bool, timing: bool, sensing: bool) -> Self {
        Self {
            sysex,
            timing,
            sensing,
        }
    }

    /// Returns `false` if `bytes` belongs to a suppressed category.
    pub fn allows(&self, bytes: &[u8]) -> bool {
        match bytes.first() {
            Some(&SYSEX_START) | Some(&SYSEX_END) => !self.sysex,
            Some(&MTC_QUARTER_FRAME) | Some(&TIMING_CLOCK) => !self.timing,
            Some(&ACTIVE_SENSING) => !self.sensing,
            _ => true,
        }
    }

    /// Packs the flags so engines can share them through an atomic.
    pub fn to_bits(self) -> u8 {
        (self.sysex as u8) | ((self.timing as u8) << 1) | ((self.sensing as u8) << 2)
    }

    pub fn from_bits(bits: u8) -> Self {
        Self {
            sysex: bits & 0b001 != 0,
            timing: bits & 0b010 != 0,
            sensing: bits & 0b100 != 0,
        }
    }
}

impl Default for IgnoreTypes {
    fn default() -> Self {
        Self::ALL
    }
}
