//! Canonical text encoding of MIDI trigger events.
//!
//! A binding is stored as `"<enabled>,<KIND>,<channel>,<value>"`, for example
//! `true,NOTE_ON,3,64`. Channels are 1-based.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors produced while decoding a binding string.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("malformed MIDI encoding {encoding:?}: {reason}")]
    Malformed {
        encoding: String,
        reason: &'static str,
    },
}

/// Message kinds understood by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MidiKind {
    NoteOn,
    NoteOff,
    ControlChange,
    ProgramChange,
    PitchBend,
    ChannelPressure,
    PolyPressure,
    Unknown,
}

/// Symbol and status nibble of every known kind.
const KIND_TABLE: [(MidiKind, &str, u8); 7] = [
    (MidiKind::NoteOff, "NOTE_OFF", 0x80),
    (MidiKind::NoteOn, "NOTE_ON", 0x90),
    (MidiKind::PolyPressure, "POLY_PRESSURE", 0xA0),
    (MidiKind::ControlChange, "CONTROL_CHANGE", 0xB0),
    (MidiKind::ProgramChange, "PROGRAM_CHANGE", 0xC0),
    (MidiKind::ChannelPressure, "CHANNEL_PRESSURE", 0xD0),
    (MidiKind::PitchBend, "PITCH_BEND", 0xE0),
];

const UNKNOWN_SYMBOL: &str = "UNKNOWN";

impl MidiKind {
    pub fn symbol(self) -> &'static str {
        KIND_TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map_or(UNKNOWN_SYMBOL, |(_, symbol, _)| *symbol)
    }

    /// Unrecognised symbols map to [`MidiKind::Unknown`].
    pub fn from_symbol(symbol: &str) -> Self {
        KIND_TABLE
            .iter()
            .find(|(_, known, _)| *known == symbol)
            .map_or(MidiKind::Unknown, |(kind, _, _)| *kind)
    }

    pub fn status(self) -> Option<u8> {
        KIND_TABLE
            .iter()
            .find(|(kind, _, _)| *kind == self)
            .map(|(_, _, status)| *status)
    }

    fn from_status(status: u8) -> Self {
        KIND_TABLE
            .iter()
            .find(|(_, _, nibble)| *nibble == status & 0xF0)
            .map_or(MidiKind::Unknown, |(kind, _, _)| *kind)
    }
}

impl fmt::Display for MidiKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// A trigger event: kind, 1-based channel and primary data value.
///
/// The primary value is the note, controller or program number, the
/// pressure amount for channel pressure, and the signed bend
/// (-8192..=8191) for pitch bend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MidiEvent {
    pub kind: MidiKind,
    pub channel: u8,
    pub primary_value: i32,
}

const PITCH_BEND_CENTER: i32 = 8192;

impl MidiEvent {
    pub fn new(kind: MidiKind, channel: u8, primary_value: i32) -> Self {
        Self {
            kind,
            channel,
            primary_value,
        }
    }

    /// Decodes a raw channel voice message. System and running-status
    /// messages yield `None`.
    pub fn from_raw(bytes: &[u8]) -> Option<Self> {
        let (&status, data) = bytes.split_first()?;
        if !(0x80..0xF0).contains(&status) {
            return None;
        }
        let kind = MidiKind::from_status(status);
        let channel = (status & 0x0F) + 1;
        let data1 = i32::from(*data.first()? & 0x7F);
        let primary_value = match kind {
            MidiKind::PitchBend => {
                let msb = i32::from(*data.get(1)? & 0x7F);
                ((msb << 7) | data1) - PITCH_BEND_CENTER
            }
            _ => data1,
        };
        Some(Self::new(kind, channel, primary_value))
    }

    /// Raw bytes for sending, with `secondary` as the second data byte where
    /// the message has one. `Unknown` events cannot be sent.
    pub fn to_raw(&self, secondary: u8) -> Option<Vec<u8>> {
        let status = self.kind.status()? | (self.channel.clamp(1, 16) - 1);
        let data1 = self.primary_value.clamp(0, 127) as u8;
        let bytes = match self.kind {
            MidiKind::ProgramChange | MidiKind::ChannelPressure => vec![status, data1],
            MidiKind::PitchBend => {
                let bend = (self.primary_value + PITCH_BEND_CENTER).clamp(0, 0x3FFF) as u16;
                vec![status, (bend & 0x7F) as u8, ((bend >> 7) & 0x7F) as u8]
            }
            _ => vec![status, data1, secondary & 0x7F],
        };
        Some(bytes)
    }
}

impl fmt::Display for MidiEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ch:{} v:{}", self.kind, self.channel, self.primary_value)
    }
}

/// Canonical encoding of an enabled event.
pub fn encode(event: &MidiEvent) -> String {
    Binding::enabled(*event).to_string()
}

/// Parses a canonical encoding, ignoring the enablement flag.
pub fn decode(encoding: &str) -> Result<MidiEvent, CodecError> {
    encoding.parse::<Binding>().map(|binding| binding.event)
}

/// The `(kind, channel, value)` part of an encoding, without the flag.
pub fn trigger_suffix(encoding: &str) -> Option<&str> {
    encoding.split_once(',').map(|(_, suffix)| suffix)
}

/// A stored binding, including its enablement flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub enabled: bool,
    pub event: MidiEvent,
}

impl Binding {
    pub fn enabled(event: MidiEvent) -> Self {
        Self {
            enabled: true,
            event,
        }
    }
}

impl fmt::Display for Binding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.enabled,
            self.event.kind.symbol(),
            self.event.channel,
            self.event.primary_value
        )
    }
}

impl FromStr for Binding {
    type Err = CodecError;

    fn from_str(encoding: &str) -> Result<Self, Self::Err> {
        let malformed = |reason: &'static str| CodecError::Malformed {
            encoding: encoding.to_string(),
            reason,
        };
        let compact: String = encoding.chars().filter(|c| !c.is_whitespace()).collect();
        let fields: Vec<&str> = compact.split(',').collect();
        if fields.len() < 4 {
            return Err(malformed("expected 4 comma-separated fields"));
        }
        let channel = fields[2]
            .parse::<u8>()
            .map_err(|_| malformed("channel is not an integer"))?;
        if !(1..=16).contains(&channel) {
            return Err(malformed("channel is outside 1-16"));
        }
        let primary_value = fields[3]
            .parse::<i32>()
            .map_err(|_| malformed("value is not an integer"))?;
        Ok(Self {
            enabled: fields[0].eq_ignore_ascii_case("true"),
            event: MidiEvent::new(MidiKind::from_symbol(fields[1]), channel, primary_value),
        })
    }
}
