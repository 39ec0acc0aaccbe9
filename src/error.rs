//! Centralized error type for the midiport umbrella crate.
//!
//! Wraps controller errors so `?` propagates naturally across crate boundaries.

use midiport_core::ErrorKind;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Port(#[from] midiport_core::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Port(e) => e.kind(),
            Error::Json(_) => ErrorKind::InvalidArgument,
        }
    }

    /// Exception class a scripting host raises for this error.
    pub fn host_class(&self) -> &'static str {
        match self.kind() {
            ErrorKind::InvalidArgument => "TypeError",
            ErrorKind::Range => "RangeError",
            ErrorKind::Engine => "Error",
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
