//! Error types for MIDI port controllers and engines.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Unknown method: {0}")]
    UnknownMethod(String),

    #[error("Invalid MIDI port number {index} ({count} ports available)")]
    PortOutOfRange { index: usize, count: usize },

    #[error("No MIDI port found matching '{0}'")]
    PortNotFound(String),

    #[error("MIDI device error: {0}")]
    MidiDevice(String),

    #[error("MIDI port error: {0}")]
    MidiPort(String),

    #[error("MIDI send error: {0}")]
    Send(String),

    #[error("No MIDI port is open")]
    PortNotOpen,

    #[error("Virtual MIDI ports are not supported on this platform")]
    VirtualPortsUnsupported,

    #[error("Invalid config: {0}")]
    InvalidConfig(String),
}

/// Coarse classification used by host bindings to pick the error class
/// reported to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Wrong arity or type of a call argument.
    InvalidArgument,
    /// Port index or name outside what the engine currently reports.
    Range,
    /// Driver/backend failure, propagated as-is.
    Engine,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidArgument(_) | Error::UnknownMethod(_) | Error::InvalidConfig(_) => {
                ErrorKind::InvalidArgument
            }
            Error::PortOutOfRange { .. } | Error::PortNotFound(_) => ErrorKind::Range,
            Error::MidiDevice(_)
            | Error::MidiPort(_)
            | Error::Send(_)
            | Error::PortNotOpen
            | Error::VirtualPortsUnsupported => ErrorKind::Engine,
        }
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::InitError> for Error {
    fn from(e: midir::InitError) -> Self {
        Error::MidiDevice(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::PortInfoError> for Error {
    fn from(e: midir::PortInfoError) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiOutput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiOutput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::ConnectError<midir::MidiInput>> for Error {
    fn from(e: midir::ConnectError<midir::MidiInput>) -> Self {
        Error::MidiPort(e.to_string())
    }
}

#[cfg(feature = "midi-io")]
impl From<midir::SendError> for Error {
    fn from(e: midir::SendError) -> Self {
        Error::Send(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
