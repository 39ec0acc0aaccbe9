//! Port controller configuration.

use crate::Result;
use midiport_core::queue::DEFAULT_HIGH_WATER_MARK;
use midiport_core::{Error, IgnoreTypes};
use serde::{Deserialize, Serialize};

/// Settings shared by the controllers a [`crate::MidiPortBuilder`] creates.
///
/// Deserializes from partial JSON; missing fields take their defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiPortConfig {
    /// Client name advertised to the OS MIDI service.
    pub client_name: String,
    /// Name given to each connection. Falls back to `client_name`.
    pub port_label: Option<String>,
    /// Initial input filter.
    pub ignore: IgnoreTypes,
    /// Inbound queue bound. `None` keeps the queue unbounded.
    pub queue_capacity: Option<usize>,
    /// Backlog size that logs a warning.
    pub high_water_mark: usize,
}

impl Default for MidiPortConfig {
    fn default() -> Self {
        Self {
            client_name: "midiport".to_string(),
            port_label: None,
            ignore: IgnoreTypes::default(),
            queue_capacity: None,
            high_water_mark: DEFAULT_HIGH_WATER_MARK,
        }
    }
}

impl MidiPortConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn label(&self) -> &str {
        self.port_label.as_deref().unwrap_or(&self.client_name)
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_name.trim().is_empty() {
            return Err(Error::InvalidConfig("client_name must not be empty".to_string()).into());
        }
        if self.queue_capacity == Some(0) {
            return Err(Error::InvalidConfig(
                "queue_capacity must be at least 1 (omit it for an unbounded queue)".to_string(),
            )
            .into());
        }
        if self.high_water_mark == 0 {
            return Err(Error::InvalidConfig("high_water_mark must be at least 1".to_string()).into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = MidiPortConfig::default();
        assert_eq!(config.client_name, "midiport");
        assert_eq!(config.label(), "midiport");
        assert_eq!(config.ignore, IgnoreTypes::ALL);
        assert_eq!(config.queue_capacity, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json() {
        let config = MidiPortConfig::from_json(
            r#"{ "port_label": "Monitor", "ignore": { "sysex": false, "timing": true, "sensing": true } }"#,
        )
        .unwrap();
        assert_eq!(config.client_name, "midiport");
        assert_eq!(config.label(), "Monitor");
        assert!(!config.ignore.sysex);
        assert_eq!(config.high_water_mark, DEFAULT_HIGH_WATER_MARK);
    }

    #[test]
    fn test_json_roundtrip_keeps_capacity() {
        let config = MidiPortConfig {
            queue_capacity: Some(512),
            ..Default::default()
        };
        let back = MidiPortConfig::from_json(&config.to_json().unwrap()).unwrap();
        assert_eq!(back, config);
    }

    #[test]
    fn test_rejects_zero_capacity() {
        let err = MidiPortConfig::from_json(r#"{ "queue_capacity": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("queue_capacity"));
    }

    #[test]
    fn test_rejects_empty_client_name() {
        let config = MidiPortConfig {
            client_name: "  ".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
