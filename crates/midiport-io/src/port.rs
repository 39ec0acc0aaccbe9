//! Port listing helpers shared by both controllers.

use midiport_core::{Error, PortEngine, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortType {
    Input,
    Output,
}

/// Snapshot of one engine port. Indices are only valid until the engine's
/// port list changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub port_type: PortType,
}

pub(crate) fn list_ports<E: PortEngine + ?Sized>(engine: &E, port_type: PortType) -> Vec<PortInfo> {
    (0..engine.port_count())
        .filter_map(|index| {
            engine.port_name(index).ok().map(|name| PortInfo {
                index,
                name,
                port_type,
            })
        })
        .collect()
}

/// Case-insensitive substring match; first hit wins.
pub(crate) fn find_port<E: PortEngine + ?Sized>(engine: &E, pattern: &str) -> Result<usize> {
    let needle = pattern.to_lowercase();
    (0..engine.port_count())
        .find(|&index| {
            engine
                .port_name(index)
                .map(|name| name.to_lowercase().contains(&needle))
                .unwrap_or(false)
        })
        .ok_or_else(|| Error::PortNotFound(pattern.to_string()))
}

/// Port name lookup as seen by callers: an out-of-range index is an
/// invalid argument rather than a range error.
pub(crate) fn port_name<E: PortEngine + ?Sized>(engine: &E, index: usize) -> Result<String> {
    engine.port_name(index).map_err(|e| match e {
        Error::PortOutOfRange { index, count } => Error::InvalidArgument(format!(
            "Port index {} is out of range ({} ports available)",
            index, count
        )),
        other => other,
    })
}

/// Range check performed before the engine is asked to open anything.
pub(crate) fn check_index<E: PortEngine + ?Sized>(engine: &E, index: usize) -> Result<()> {
    let count = engine.port_count();
    if index >= count {
        return Err(Error::PortOutOfRange { index, count });
    }
    Ok(())
}
