//! The capability surface used by presentation layers.

use std::path::Path;

use crossbeam_channel::Sender;
use cuebind_settings::{
    action_label, export_to, import_from, preferences, write_template, ConfigurationMap,
    ExtractOptions, Extraction, SettingsError,
};
use tracing::{debug, info};

use crate::codec::{Binding, MidiEvent};
use crate::device::{resolve_device, MidiBackend};
use crate::learn::{LearnController, LearnError, LearnOptions, LearnSignal};

/// Owns the configuration, the learn controller and the MIDI backend.
pub struct Configurator<B: MidiBackend> {
    extraction: Extraction,
    options: ExtractOptions,
    map: ConfigurationMap,
    controller: LearnController,
    backend: B,
    device: Option<String>,
}

impl<B: MidiBackend> Configurator<B> {
    pub fn new(
        extraction: Extraction,
        options: ExtractOptions,
        learn: LearnOptions,
        backend: B,
    ) -> Self {
        let map = ConfigurationMap::from_defaults(&extraction);
        Self {
            extraction,
            options,
            map,
            controller: LearnController::new(learn),
            backend,
            device: None,
        }
    }

    pub fn with_observer(mut self, observer: Sender<LearnSignal>) -> Self {
        self.controller = std::mem::take(&mut self.controller).with_observer(observer);
        self
    }

    pub fn configuration(&self) -> &ConfigurationMap {
        &self.map
    }

    pub fn configuration_mut(&mut self) -> &mut ConfigurationMap {
        &mut self.map
    }

    /// Ordered `(identifier, value)` pairs.
    pub fn current_configuration(&self) -> Vec<(String, String)> {
        self.map.to_pairs()
    }

    pub fn controller(&self) -> &LearnController {
        &self.controller
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn action_identifiers(&self) -> Vec<String> {
        self.map
            .action_identifiers(&self.options.action_marker)
            .map(str::to_string)
            .collect()
    }

    /// Human label for an action identifier, falling back to the identifier.
    pub fn action_label(&self, identifier: &str) -> String {
        match self.map.property_key(identifier) {
            Some(key) => action_label(key, &self.options.action_marker),
            None => identifier.to_string(),
        }
    }

    /// Capture from `device` instead of the configured interface.
    pub fn set_device(&mut self, device: impl Into<String>) {
        self.device = Some(device.into());
    }

    pub fn list_input_devices(&self) -> anyhow::Result<Vec<String>> {
        self.backend.enumerate()
    }

    /// Input device to capture from: the explicit device, else the configured
    /// interface matched against the enumerated ports, else the first port.
    pub fn resolve_device(&self) -> anyhow::Result<Option<String>> {
        let requested = self
            .device
            .as_deref()
            .or_else(|| preferences::interface(&self.map));
        let available = self.backend.enumerate()?;
        let resolved = match requested {
            Some(name) => resolve_device(name, &available)
                .map(str::to_string)
                .or_else(|| Some(name.to_string())),
            None => available.first().cloned(),
        };
        debug!(?requested, ?resolved, "resolved capture device");
        Ok(resolved)
    }

    /// Arms an action binding. Entries outside the action marker, such as
    /// the preferences, cannot be armed.
    pub fn arm(&mut self, action: &str) -> Result<LearnSignal, LearnError> {
        let is_action = self
            .map
            .action_identifiers(&self.options.action_marker)
            .any(|identifier| identifier == action);
        if !is_action {
            return Err(LearnError::UnknownAction(action.to_string()));
        }
        self.controller.arm(action)
    }

    pub fn cancel(&mut self) -> Option<LearnSignal> {
        self.controller.cancel()
    }

    /// Captures for the armed action on the resolved device.
    pub fn capture(&mut self) -> Result<LearnSignal, LearnError> {
        let device = match self.resolve_device() {
            Ok(device) => device.unwrap_or_default(),
            Err(err) => {
                self.controller.disarm();
                return Err(LearnError::Backend(err));
            }
        };
        self.controller
            .capture(&mut self.backend, &device, &mut self.map)
    }

    /// Arms `action` and captures, unless arming cancelled a pending capture.
    pub fn learn(&mut self, action: &str) -> Result<LearnSignal, LearnError> {
        match self.arm(action)? {
            signal @ LearnSignal::Cancelled { .. } => Ok(signal),
            _ => self.capture(),
        }
    }

    /// Applies the known entries of a settings file; returns how many applied.
    pub fn import_settings(&mut self, path: &Path) -> Result<usize, SettingsError> {
        let imported = import_from(path, self.map.identifiers())?;
        Ok(self.map.apply(imported))
    }

    pub fn export_settings(&self, path: &Path) -> Result<(), SettingsError> {
        export_to(path, &self.map)
    }

    /// Writes the defaults, not the current values, to a fresh file.
    pub fn write_template(&self, path: &Path) -> Result<(), SettingsError> {
        write_template(path, &ConfigurationMap::from_defaults(&self.extraction))
    }

    pub fn reset_to_defaults(&mut self) {
        self.controller.cancel();
        self.map = ConfigurationMap::from_defaults(&self.extraction);
        info!(entries = self.map.len(), "configuration reset to defaults");
    }

    /// Action bindings in map order; values that do not decode are `None`.
    pub fn bindings(&self) -> Vec<(String, Option<Binding>)> {
        self.action_identifiers()
            .into_iter()
            .map(|identifier| {
                let binding = self.map.get(&identifier).and_then(|value| {
                    value
                        .parse::<Binding>()
                        .map_err(|err| debug!(%err, "no usable binding"))
                        .ok()
                });
                (identifier, binding)
            })
            .collect()
    }

    pub fn send_event(&self, event: &MidiEvent) -> anyhow::Result<()> {
        self.backend.send(event)
    }

    /// Sends the event stored for `action`.
    pub fn send_binding(&self, action: &str) -> anyhow::Result<()> {
        let Some(value) = self.map.get(action) else {
            return Err(LearnError::UnknownAction(action.to_string()).into());
        };
        let binding: Binding = value.parse()?;
        self.send_event(&binding.event)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;
    use crate::codec::MidiKind;
    use crate::device::CaptureOutcome;
    use crate::learn::LearnState;
    use cuebind_settings::{DefaultValues, KeyDeclarations, MidiPreferences};

    #[derive(Default)]
    struct DummyBackend {
        ports: Vec<String>,
        next: Option<CaptureOutcome>,
        devices_seen: Vec<String>,
        sent: Mutex<Vec<MidiEvent>>,
    }

    impl MidiBackend for DummyBackend {
        fn enumerate(&self) -> anyhow::Result<Vec<String>> {
            Ok(self.ports.clone())
        }

        fn await_next_event(
            &mut self,
            device: &str,
            _timeout: Duration,
        ) -> anyhow::Result<CaptureOutcome> {
            self.devices_seen.push(device.to_string());
            Ok(self.next.take().unwrap_or(CaptureOutcome::TimedOut))
        }

        fn send(&self, event: &MidiEvent) -> anyhow::Result<()> {
            self.sent.lock().push(*event);
            Ok(())
        }
    }

    struct FailingBackend;

    impl MidiBackend for FailingBackend {
        fn enumerate(&self) -> anyhow::Result<Vec<String>> {
            anyhow::bail!("MIDI subsystem unavailable")
        }

        fn await_next_event(&mut self, _: &str, _: Duration) -> anyhow::Result<CaptureOutcome> {
            Ok(CaptureOutcome::TimedOut)
        }

        fn send(&self, _: &MidiEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn extraction() -> Extraction {
        let mut keys = KeyDeclarations::new();
        keys.insert("midi.enabled".into(), "MIDI_ENABLED".into());
        keys.insert("midi.interface".into(), "MIDI_INTERFACE".into());
        keys.insert("midi.Action.next_slide".into(), "MIDI_NEXT_SLIDE".into());
        keys.insert("midi.Action.clear".into(), "MIDI_CLEAR".into());
        let mut defaults = DefaultValues::new();
        defaults.insert("midi.enabled".into(), "false".into());
        defaults.insert("midi.interface".into(), "nanoKONTROL2".into());
        defaults.insert("midi.Action.clear".into(), "false,CONTROL_CHANGE,1,7".into());
        Extraction { keys, defaults }
    }

    fn configurator(backend: DummyBackend) -> Configurator<DummyBackend> {
        Configurator::new(
            extraction(),
            ExtractOptions::default(),
            LearnOptions::default(),
            backend,
        )
    }

    #[test]
    fn lists_actions_with_labels() {
        let session = configurator(DummyBackend::default());
        assert_eq!(
            session.action_identifiers(),
            vec!["MIDI_NEXT_SLIDE".to_string(), "MIDI_CLEAR".to_string()]
        );
        assert_eq!(session.action_label("MIDI_NEXT_SLIDE"), "Next Slide");
        assert_eq!(session.action_label("OTHER"), "OTHER");
    }

    #[test]
    fn learn_uses_configured_interface() {
        let mut session = configurator(DummyBackend {
            ports: vec!["Midi Through".into(), "nanoKONTROL2 MIDI 1".into()],
            next: Some(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 2, 40))),
            ..Default::default()
        });
        let signal = session.learn("MIDI_NEXT_SLIDE").unwrap();
        assert!(matches!(signal, LearnSignal::BindingApplied { .. }));
        assert_eq!(session.backend().devices_seen, vec!["nanoKONTROL2 MIDI 1".to_string()]);
        assert_eq!(session.configuration().get("MIDI_NEXT_SLIDE"), Some("true,NOTE_ON,2,40"));
    }

    #[test]
    fn arm_rejects_unknown_action() {
        let mut session = configurator(DummyBackend::default());
        assert!(matches!(session.arm("NOPE"), Err(LearnError::UnknownAction(_))));
        assert_eq!(session.controller().state(), &LearnState::Idle);
    }

    #[test]
    fn arm_rejects_non_action_entries() {
        let mut session = configurator(DummyBackend {
            ports: vec!["nanoKONTROL2".into()],
            next: Some(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 3, 64))),
            ..Default::default()
        });
        for identifier in ["MIDI_ENABLED", "MIDI_INTERFACE"] {
            assert!(matches!(
                session.learn(identifier),
                Err(LearnError::UnknownAction(ref rejected)) if rejected == identifier
            ));
        }
        assert_eq!(session.configuration().get("MIDI_ENABLED"), Some("false"));
        assert!(MidiPreferences::from_map(session.configuration()).is_ok());
        assert!(session.backend().devices_seen.is_empty());
    }

    #[test]
    fn device_lookup_failure_is_not_reported_as_cancel() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut session = Configurator::new(
            extraction(),
            ExtractOptions::default(),
            LearnOptions::default(),
            FailingBackend,
        )
        .with_observer(tx);
        session.arm("MIDI_CLEAR").unwrap();
        assert!(matches!(session.capture(), Err(LearnError::Backend(_))));
        assert!(!session.controller().is_armed());
        let signals: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            signals,
            vec![LearnSignal::CaptureStarted {
                action: "MIDI_CLEAR".into()
            }]
        );
    }

    #[test]
    fn reset_restores_defaults_and_disarms() {
        let mut session = configurator(DummyBackend::default());
        session.configuration_mut().set("MIDI_ENABLED", "true");
        session.arm("MIDI_CLEAR").unwrap();
        session.reset_to_defaults();
        assert_eq!(session.configuration().get("MIDI_ENABLED"), Some("false"));
        assert!(!session.controller().is_armed());
    }

    #[test]
    fn send_binding_decodes_stored_value() {
        let session = configurator(DummyBackend::default());
        session.send_binding("MIDI_CLEAR").unwrap();
        assert_eq!(
            session.backend().sent.lock().as_slice(),
            &[MidiEvent::new(MidiKind::ControlChange, 1, 7)]
        );
        assert!(session.send_binding("MIDI_NEXT_SLIDE").is_err());
        assert!(session.send_binding("NOPE").is_err());
    }

    #[test]
    fn bindings_skip_undecodable_values() {
        let session = configurator(DummyBackend::default());
        let bindings = session.bindings();
        assert_eq!(bindings[0], ("MIDI_NEXT_SLIDE".to_string(), None));
        assert_eq!(bindings[1].1.map(|binding| binding.enabled), Some(false));
    }

    #[test]
    fn import_applies_known_entries() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("quelea.properties");
        std::fs::write(&path, "MIDI_ENABLED=true\nlanguage=gb.lang\n").unwrap();
        let mut session = configurator(DummyBackend::default());
        assert_eq!(session.import_settings(&path).unwrap(), 1);
        assert_eq!(session.configuration().get("MIDI_ENABLED"), Some("true"));
        assert_eq!(session.current_configuration().len(), 4);
    }
}
