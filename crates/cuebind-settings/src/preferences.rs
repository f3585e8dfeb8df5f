//! Typed view over the well-known non-action MIDI entries.

use crate::map::ConfigurationMap;
use crate::{ValueError, NO_DEFAULT};

pub const ENABLED_KEY: &str = "midi.enabled";
pub const INTERFACE_KEY: &str = "midi.interface";
pub const GLOBAL_CHANNEL_KEY: &str = "midi.globalChannel";

pub const DEFAULT_GLOBAL_CHANNEL: u8 = 16;

/// MIDI preferences decoded from a [`ConfigurationMap`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MidiPreferences {
    pub enabled: bool,
    pub interface: Option<String>,
    pub global_channel: u8,
}

impl Default for MidiPreferences {
    fn default() -> Self {
        Self {
            enabled: false,
            interface: None,
            global_channel: DEFAULT_GLOBAL_CHANNEL,
        }
    }
}

impl MidiPreferences {
    /// Decodes the entries that are present; absent ones keep their defaults.
    pub fn from_map(map: &ConfigurationMap) -> Result<Self, ValueError> {
        let mut prefs = Self::default();
        if let Some((identifier, value)) = lookup(map, ENABLED_KEY) {
            prefs.enabled = parse_bool(identifier, value)?;
        }
        prefs.interface = interface(map).map(str::to_string);
        if let Some((identifier, value)) = lookup(map, GLOBAL_CHANNEL_KEY) {
            prefs.global_channel = parse_channel(identifier, value)?;
        }
        Ok(prefs)
    }
}

fn lookup<'a>(map: &'a ConfigurationMap, key: &str) -> Option<(&'a str, &'a str)> {
    let identifier = map.identifier_for(key)?;
    let value = map.get(identifier)?;
    (value != NO_DEFAULT).then_some((identifier, value))
}

/// Configured device name, if one is set.
pub fn interface(map: &ConfigurationMap) -> Option<&str> {
    lookup(map, INTERFACE_KEY)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
}

pub fn parse_bool(identifier: &str, value: &str) -> Result<bool, ValueError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ValueError::InvalidBool {
            identifier: identifier.to_string(),
            value: value.to_string(),
        }),
    }
}

pub fn parse_channel(identifier: &str, value: &str) -> Result<u8, ValueError> {
    value
        .trim()
        .parse::<u8>()
        .ok()
        .filter(|channel| (1..=16).contains(channel))
        .ok_or_else(|| ValueError::InvalidChannel {
            identifier: identifier.to_string(),
            value: value.to_string(),
        })
}

/// Drops the port number some backends append: `Launchpad 1` becomes `Launchpad`.
pub fn strip_port_suffix(name: &str) -> &str {
    let without_digits = name.trim_end_matches(|c: char| c.is_ascii_digit());
    if without_digits.len() == name.len() {
        return name;
    }
    without_digits.trim_end()
}

pub fn set_enabled(map: &mut ConfigurationMap, enabled: bool) -> bool {
    set_known(map, ENABLED_KEY, if enabled { "true" } else { "false" })
}

pub fn set_interface(map: &mut ConfigurationMap, name: &str) -> bool {
    set_known(map, INTERFACE_KEY, strip_port_suffix(name))
}

pub fn set_global_channel(map: &mut ConfigurationMap, channel: u8) -> Result<bool, ValueError> {
    let identifier = map.identifier_for(GLOBAL_CHANNEL_KEY).unwrap_or(GLOBAL_CHANNEL_KEY);
    let channel = parse_channel(identifier, &channel.to_string())?;
    Ok(set_known(map, GLOBAL_CHANNEL_KEY, &channel.to_string()))
}

fn set_known(map: &mut ConfigurationMap, key: &str, value: &str) -> bool {
    match map.identifier_for(key).map(str::to_string) {
        Some(identifier) => {
            map.set(&identifier, value);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{DefaultValues, KeyDeclarations};

    fn map() -> ConfigurationMap {
        let mut keys = KeyDeclarations::new();
        keys.insert(ENABLED_KEY.into(), "MIDI_ENABLED".into());
        keys.insert(INTERFACE_KEY.into(), "MIDI_INTERFACE".into());
        keys.insert(GLOBAL_CHANNEL_KEY.into(), "MIDI_CHANNEL".into());
        let mut defaults = DefaultValues::new();
        defaults.insert(ENABLED_KEY.into(), "FALSE".into());
        defaults.insert(GLOBAL_CHANNEL_KEY.into(), "4".into());
        ConfigurationMap::from_extraction(&keys, &defaults)
    }

    #[test]
    fn decodes_present_entries() {
        let prefs = MidiPreferences::from_map(&map()).unwrap();
        assert_eq!(
            prefs,
            MidiPreferences {
                enabled: false,
                interface: None,
                global_channel: 4,
            }
        );
    }

    #[test]
    fn rejects_out_of_range_channel() {
        let mut map = map();
        map.set("MIDI_CHANNEL", "17");
        let err = MidiPreferences::from_map(&map).unwrap_err();
        assert!(matches!(err, ValueError::InvalidChannel { .. }));
        assert!(set_global_channel(&mut map, 0).is_err());
        assert_eq!(set_global_channel(&mut map, 9), Ok(true));
        assert_eq!(map.get("MIDI_CHANNEL"), Some("9"));
    }

    #[test]
    fn formats_writes() {
        let mut map = map();
        assert!(set_enabled(&mut map, true));
        assert!(set_interface(&mut map, "nanoKONTROL2 3"));
        assert_eq!(map.get("MIDI_ENABLED"), Some("true"));
        assert_eq!(interface(&map), Some("nanoKONTROL2"));
    }

    #[test]
    fn strips_only_trailing_numbers() {
        assert_eq!(strip_port_suffix("Launchpad 1"), "Launchpad");
        assert_eq!(strip_port_suffix("Launchpad"), "Launchpad");
        assert_eq!(strip_port_suffix("Port:20"), "Port:");
    }
}
