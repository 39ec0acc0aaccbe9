//! Host object for [`MidiOutput`].

use super::args;
use crate::Result;
use midiport_core::Error;
use midiport_io::MidiOutput;
use serde_json::Value;

pub struct OutputBinding {
    output: MidiOutput,
}

impl OutputBinding {
    pub fn new(output: MidiOutput) -> Self {
        Self { output }
    }

    /// Dispatches one host method call. Methods without a result return
    /// `Value::Null`.
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        match method {
            "getPortCount" => Ok(Value::from(self.output.port_count())),
            "getPortName" => {
                let index = args::port_index(args, 0)?;
                Ok(Value::from(self.output.port_name(index)?))
            }
            "openPort" => {
                let index = args::port_index(args, 0)?;
                self.output.open_port(index)?;
                Ok(Value::Null)
            }
            "openVirtualPort" => {
                let name = args::string(args, 0)?;
                self.output.open_virtual_port(name)?;
                Ok(Value::Null)
            }
            "closePort" => {
                self.output.close_port();
                Ok(Value::Null)
            }
            "sendMessage" => {
                let bytes = args::message_bytes(args, 0)?;
                self.output.send_message(&bytes)?;
                Ok(Value::Null)
            }
            other => Err(Error::UnknownMethod(other.to_string()).into()),
        }
    }

    pub fn controller(&self) -> &MidiOutput {
        &self.output
    }

    pub fn controller_mut(&mut self) -> &mut MidiOutput {
        &mut self.output
    }
}

impl std::fmt::Debug for OutputBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("OutputBinding").field(&self.output).finish()
    }
}
