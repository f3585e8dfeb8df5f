use std::time::Duration;

use crate::codec::MidiEvent;

/// Result of waiting for a single MIDI event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureOutcome {
    /// An event arrived before the timeout.
    Event(MidiEvent),
    /// Nothing arrived within the timeout.
    TimedOut,
    /// No input port matches the requested device.
    DeviceNotFound,
}

/// Transport abstraction for platform specific MIDI implementations.
pub trait MidiBackend: Send {
    /// Enumerate available input port names.
    fn enumerate(&self) -> anyhow::Result<Vec<String>>;

    /// Open the named input and block until one event arrives or `timeout`
    /// elapses. The port is closed again before returning.
    fn await_next_event(&mut self, device: &str, timeout: Duration)
        -> anyhow::Result<CaptureOutcome>;

    /// Emit a single event on the output port.
    fn send(&self, event: &MidiEvent) -> anyhow::Result<()>;
}

impl<B: MidiBackend + ?Sized> MidiBackend for Box<B> {
    fn enumerate(&self) -> anyhow::Result<Vec<String>> {
        (**self).enumerate()
    }

    fn await_next_event(
        &mut self,
        device: &str,
        timeout: Duration,
    ) -> anyhow::Result<CaptureOutcome> {
        (**self).await_next_event(device, timeout)
    }

    fn send(&self, event: &MidiEvent) -> anyhow::Result<()> {
        (**self).send(event)
    }
}

/// Picks the first port whose name contains `requested`, ignoring case.
pub fn resolve_device<'a>(requested: &str, available: &'a [String]) -> Option<&'a str> {
    let requested = requested.trim().to_lowercase();
    if requested.is_empty() {
        return None;
    }
    available
        .iter()
        .find(|name| name.to_lowercase().contains(&requested))
        .map(String::as_str)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_by_case_insensitive_substring() {
        let ports = vec![
            "Midi Through:0".to_string(),
            "nanoKONTROL2:nanoKONTROL2 MIDI 1 20:0".to_string(),
        ];
        assert_eq!(resolve_device("nanokontrol2", &ports), Some(ports[1].as_str()));
        assert_eq!(resolve_device("Launchpad", &ports), None);
        assert_eq!(resolve_device("  ", &ports), None);
    }
}
