//! Host object for [`MidiInput`].

use super::args;
use crate::Result;
use midiport_core::{Error, MidiMessage};
use midiport_io::MidiInput;
use serde_json::Value;

/// Name of the only event an input emits.
pub const MESSAGE_EVENT: &str = "message";

pub struct InputBinding {
    input: MidiInput,
}

impl InputBinding {
    pub fn new(input: MidiInput) -> Self {
        Self { input }
    }

    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "getPortCount" => Ok(Value::from(self.input.port_count())),
            "getPortName" => {
                let index = args::port_index(args, 0)?;
                Ok(Value::from(self.input.port_name(index)?))
            }
            "openPort" => {
                let index = args::port_index(args, 0)?;
                self.input.open_port(index)?;
                Ok(Value::Null)
            }
            "openVirtualPort" => {
                let name = args::string(args, 0)?;
                self.input.open_virtual_port(name)?;
                Ok(Value::Null)
            }
            "closePort" => {
                self.input.close_port();
                Ok(Value::Null)
            }
            "ignoreTypes" => {
                let (sysex, timing, sensing) = args::three_booleans(args)?;
                self.input.ignore_types(sysex, timing, sensing);
                Ok(Value::Null)
            }
            other => Err(Error::UnknownMethod(other.to_string()).into()),
        }
    }

    /// Subscribes `listener` to `event`. The listener receives the event
    /// arguments, `[deltaTime, [bytes...]]` for `"message"`.
    pub fn on<F>(&self, event: &str, mut listener: F) -> Result<()>
    where
        F: FnMut(&[Value]) + 'static,
    {
        if event != MESSAGE_EVENT {
            return Err(Error::InvalidArgument(format!("Unknown event '{}'", event)).into());
        }
        self.input
            .on_message(move |message| listener(&message_event_args(message)));
        Ok(())
    }

    pub fn controller(&self) -> &MidiInput {
        &self.input
    }

    pub fn controller_mut(&mut self) -> &mut MidiInput {
        &mut self.input
    }
}

/// Host values for one `"message"` event.
pub fn message_event_args(message: &MidiMessage) -> [Value; 2] {
    [
        Value::from(message.delta_time()),
        Value::from(message.bytes().to_vec()),
    ]
}

impl std::fmt::Debug for InputBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("InputBinding").field(&self.input).finish()
    }
}
