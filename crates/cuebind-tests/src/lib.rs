//! Shared fixtures for the cross-crate tests.

use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use cuebind_midi::{CaptureOutcome, MidiBackend, MidiEvent};
use cuebind_settings::layout::{DEFAULTS_RELATIVE_PATH, KEYS_RELATIVE_PATH};
use parking_lot::Mutex;

pub const KEYS_SOURCE: &str = r#"package org.quelea.services.utils;

public final class QueleaPropertyKeys {
    public static final String LANGUAGE_FILE_KEY = "language.file";
    public static final String MIDI_ENABLED_KEY = "midi.enabled";
    public static final String MIDI_INTERFACE_KEY = "midi.interface";
    public static final String MIDI_GLOBAL_CHANNEL_KEY = "midi.globalChannel";
    public static final String MIDI_ACTION_NEXT_SLIDE = "midi.Action.next_slide";
    public static final String MIDI_ACTION_PREVIOUS_SLIDE = "midi.Action.previous_slide";
    public static final String MIDI_ACTION_CLEAR = "midi.Action.clear";
}
"#;

pub const PROPERTIES_SOURCE: &str = r#"package org.quelea.services.utils;

public final class QueleaProperties extends SortedProperties {

    public boolean getUseMidiControl() {
        return Boolean.parseBoolean(getProperty(QueleaPropertyKeys.MIDI_ENABLED_KEY, "false"));
    }

    public String getMidiInterface() {
        return getProperty(MIDI_INTERFACE_KEY);
    }

    public int getMidiGlobalChannel() {
        return Integer.parseInt(getProperty(MIDI_GLOBAL_CHANNEL_KEY, "16"));
    }

    public String getMidiActionNextSlide()
    {
        return getProperty(MIDI_ACTION_NEXT_SLIDE, "true,NOTE_ON,16,1");
    }

    public String getMidiActionPreviousSlide() {
        return getProperty("midi.Action.previous_slide", "true,NOTE_ON,16,2");
    }
}
"#;

/// Writes both host sources below `root` in the standard layout.
pub fn write_sources(root: &Path) -> anyhow::Result<()> {
    for (relative, content) in [
        (KEYS_RELATIVE_PATH, KEYS_SOURCE),
        (DEFAULTS_RELATIVE_PATH, PROPERTIES_SOURCE),
    ] {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
    }
    Ok(())
}

/// Backend that replays queued capture outcomes and records what it was asked.
#[derive(Clone, Default)]
pub struct ScriptedBackend {
    pub ports: Vec<String>,
    outcomes: Arc<Mutex<VecDeque<CaptureOutcome>>>,
    pub requests: Arc<Mutex<Vec<(String, Duration)>>>,
    pub sent: Arc<Mutex<Vec<MidiEvent>>>,
}

impl ScriptedBackend {
    pub fn with_ports(ports: &[&str]) -> Self {
        Self {
            ports: ports.iter().map(|port| port.to_string()).collect(),
            ..Self::default()
        }
    }

    /// Queues the outcome of the next capture.
    pub fn push(&self, outcome: CaptureOutcome) {
        self.outcomes.lock().push_back(outcome);
    }
}

impl MidiBackend for ScriptedBackend {
    fn enumerate(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.ports.clone())
    }

    fn await_next_event(
        &mut self,
        device: &str,
        timeout: Duration,
    ) -> anyhow::Result<CaptureOutcome> {
        self.requests.lock().push((device.to_string(), timeout));
        if !self.ports.iter().any(|port| port == device) {
            return Ok(CaptureOutcome::DeviceNotFound);
        }
        Ok(self
            .outcomes
            .lock()
            .pop_front()
            .unwrap_or(CaptureOutcome::TimedOut))
    }

    fn send(&self, event: &MidiEvent) -> anyhow::Result<()> {
        self.sent.lock().push(*event);
        Ok(())
    }
}
