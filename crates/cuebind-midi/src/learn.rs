//! Learn mode: arm an action, capture one event, apply or reject it.

use std::fmt;
use std::time::Duration;

use crossbeam_channel::Sender;
use cuebind_settings::ConfigurationMap;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::codec::{encode, trigger_suffix};
use crate::device::{CaptureOutcome, MidiBackend};

/// Capture wait used when no other timeout is configured.
pub const DEFAULT_CAPTURE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnOptions {
    pub timeout: Duration,
}

impl Default for LearnOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

/// Errors produced by misuse of the learn controller.
#[derive(Debug, Error)]
pub enum LearnError {
    #[error("cannot arm {requested}: {armed} is already armed")]
    AlreadyArmed { armed: String, requested: String },
    #[error("no action is armed")]
    NotArmed,
    #[error("unknown action {0}")]
    UnknownAction(String),
    #[error("MIDI backend failure")]
    Backend(#[source] anyhow::Error),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LearnState {
    #[default]
    Idle,
    Armed { action: String },
}

/// Notifications for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LearnSignal {
    CaptureStarted {
        action: String,
    },
    BindingApplied {
        action: String,
        encoding: String,
    },
    DuplicateBinding {
        action: String,
        conflicts_with: String,
        encoding: String,
    },
    TimedOut {
        action: String,
    },
    DeviceNotFound {
        action: String,
        device: String,
    },
    Cancelled {
        action: String,
    },
}

impl LearnSignal {
    pub fn action(&self) -> &str {
        match self {
            Self::CaptureStarted { action }
            | Self::BindingApplied { action, .. }
            | Self::DuplicateBinding { action, .. }
            | Self::TimedOut { action }
            | Self::DeviceNotFound { action, .. }
            | Self::Cancelled { action } => action,
        }
    }
}

impl fmt::Display for LearnSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureStarted { action } => write!(f, "listening for {action}"),
            Self::BindingApplied { action, encoding } => {
                write!(f, "bound {action} to {encoding}")
            }
            Self::DuplicateBinding {
                action,
                conflicts_with,
                encoding,
            } => write!(
                f,
                "{encoding} is already bound to {conflicts_with}; {action} unchanged"
            ),
            Self::TimedOut { action } => write!(f, "no MIDI event received for {action}"),
            Self::DeviceNotFound { action, device } => {
                write!(f, "device {device:?} not found; {action} unchanged")
            }
            Self::Cancelled { action } => write!(f, "capture for {action} cancelled"),
        }
    }
}

/// Two-phase arm/capture state machine. At most one action is armed.
#[derive(Debug, Default)]
pub struct LearnController {
    state: LearnState,
    options: LearnOptions,
    observer: Option<Sender<LearnSignal>>,
}

impl LearnController {
    pub fn new(options: LearnOptions) -> Self {
        Self {
            state: LearnState::Idle,
            options,
            observer: None,
        }
    }

    /// Every signal is also published on `observer`.
    pub fn with_observer(mut self, observer: Sender<LearnSignal>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn options(&self) -> &LearnOptions {
        &self.options
    }

    pub fn state(&self) -> &LearnState {
        &self.state
    }

    pub fn is_armed(&self) -> bool {
        matches!(self.state, LearnState::Armed { .. })
    }

    pub fn armed_action(&self) -> Option<&str> {
        match &self.state {
            LearnState::Armed { action } => Some(action),
            LearnState::Idle => None,
        }
    }

    /// Arms `action`. Arming the already armed action cancels the capture.
    pub fn arm(&mut self, action: &str) -> Result<LearnSignal, LearnError> {
        let signal = match &self.state {
            LearnState::Idle => {
                self.state = LearnState::Armed {
                    action: action.to_string(),
                };
                LearnSignal::CaptureStarted {
                    action: action.to_string(),
                }
            }
            LearnState::Armed { action: armed } if armed == action => {
                self.state = LearnState::Idle;
                LearnSignal::Cancelled {
                    action: action.to_string(),
                }
            }
            LearnState::Armed { action: armed } => {
                return Err(LearnError::AlreadyArmed {
                    armed: armed.clone(),
                    requested: action.to_string(),
                });
            }
        };
        Ok(self.emit(signal))
    }

    /// Returns to idle. `None` when nothing was armed.
    pub fn cancel(&mut self) -> Option<LearnSignal> {
        match std::mem::take(&mut self.state) {
            LearnState::Armed { action } => Some(self.emit(LearnSignal::Cancelled { action })),
            LearnState::Idle => None,
        }
    }

    /// Returns to idle without signalling.
    pub(crate) fn disarm(&mut self) {
        self.state = LearnState::Idle;
    }

    /// Blocks for the next event on `device` and applies it to the armed
    /// action. The controller is idle again afterwards, whatever the outcome.
    pub fn capture<B>(
        &mut self,
        backend: &mut B,
        device: &str,
        map: &mut ConfigurationMap,
    ) -> Result<LearnSignal, LearnError>
    where
        B: MidiBackend + ?Sized,
    {
        let LearnState::Armed { action } = std::mem::take(&mut self.state) else {
            return Err(LearnError::NotArmed);
        };
        if !map.contains(&action) {
            return Err(LearnError::UnknownAction(action));
        }
        let outcome = backend
            .await_next_event(device, self.options.timeout)
            .map_err(LearnError::Backend)?;
        let signal = match outcome {
            CaptureOutcome::Event(event) => {
                let encoding = encode(&event);
                match find_duplicate(map, &action, &encoding) {
                    Some(conflicts_with) => {
                        warn!(%action, %conflicts_with, %encoding, "duplicate MIDI binding rejected");
                        LearnSignal::DuplicateBinding {
                            action,
                            conflicts_with,
                            encoding,
                        }
                    }
                    None => {
                        map.set(&action, encoding.clone());
                        info!(%action, %encoding, "MIDI binding applied");
                        LearnSignal::BindingApplied { action, encoding }
                    }
                }
            }
            CaptureOutcome::TimedOut => LearnSignal::TimedOut { action },
            CaptureOutcome::DeviceNotFound => LearnSignal::DeviceNotFound {
                action,
                device: device.to_string(),
            },
        };
        Ok(self.emit(signal))
    }

    fn emit(&self, signal: LearnSignal) -> LearnSignal {
        if let Some(observer) = &self.observer {
            if observer.send(signal.clone()).is_err() {
                debug!(%signal, "learn observer disconnected");
            }
        }
        signal
    }
}

/// Finds another entry whose trigger matches `encoding`, ignoring the
/// enablement flag. Entries without a `,` separator are skipped.
pub fn find_duplicate(map: &ConfigurationMap, action: &str, encoding: &str) -> Option<String> {
    let wanted = trigger_suffix(encoding)?;
    map.entries()
        .filter(|(identifier, _)| *identifier != action)
        .find(|(identifier, value)| match trigger_suffix(value) {
            Some(suffix) => suffix == wanted,
            None => {
                debug!(%identifier, %value, "skipping entry without a MIDI trigger");
                false
            }
        })
        .map(|(identifier, _)| identifier.to_string())
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::codec::{MidiEvent, MidiKind};

    #[derive(Default)]
    struct ScriptedBackend {
        outcomes: VecDeque<CaptureOutcome>,
        timeouts: Vec<Duration>,
    }

    impl MidiBackend for ScriptedBackend {
        fn enumerate(&self) -> anyhow::Result<Vec<String>> {
            Ok(vec!["Scripted".into()])
        }

        fn await_next_event(
            &mut self,
            _device: &str,
            timeout: Duration,
        ) -> anyhow::Result<CaptureOutcome> {
            self.timeouts.push(timeout);
            self.outcomes
                .pop_front()
                .ok_or_else(|| anyhow::anyhow!("script exhausted"))
        }

        fn send(&self, _event: &MidiEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    fn map() -> ConfigurationMap {
        let mut map = ConfigurationMap::new();
        map.apply([
            ("ENABLED", "false"),
            ("NEXT", "NO_DEFAULT"),
            ("PREVIOUS", "false,NOTE_ON,1,60"),
        ]);
        map
    }

    fn backend(outcome: CaptureOutcome) -> ScriptedBackend {
        ScriptedBackend {
            outcomes: VecDeque::from([outcome]),
            ..Default::default()
        }
    }

    #[test]
    fn applies_unique_binding_with_default_timeout() {
        let mut map = map();
        let mut controller = LearnController::default();
        let mut backend = backend(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 3, 64)));
        assert_eq!(
            controller.arm("NEXT").unwrap(),
            LearnSignal::CaptureStarted {
                action: "NEXT".into()
            }
        );
        let signal = controller.capture(&mut backend, "Scripted", &mut map).unwrap();
        assert_eq!(
            signal,
            LearnSignal::BindingApplied {
                action: "NEXT".into(),
                encoding: "true,NOTE_ON,3,64".into()
            }
        );
        assert_eq!(map.get("NEXT"), Some("true,NOTE_ON,3,64"));
        assert_eq!(controller.state(), &LearnState::Idle);
        assert_eq!(backend.timeouts, vec![DEFAULT_CAPTURE_TIMEOUT]);
    }

    #[test]
    fn duplicate_ignores_enablement_flag() {
        let mut map = map();
        let mut controller = LearnController::default();
        let mut backend = backend(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 1, 60)));
        controller.arm("NEXT").unwrap();
        let signal = controller.capture(&mut backend, "Scripted", &mut map).unwrap();
        assert_eq!(
            signal,
            LearnSignal::DuplicateBinding {
                action: "NEXT".into(),
                conflicts_with: "PREVIOUS".into(),
                encoding: "true,NOTE_ON,1,60".into()
            }
        );
        assert_eq!(map.get("NEXT"), Some("NO_DEFAULT"));
        assert!(!controller.is_armed());
    }

    #[test]
    fn rebinding_same_action_is_not_a_duplicate() {
        let mut map = map();
        let mut controller = LearnController::default();
        let mut backend = backend(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 1, 60)));
        controller.arm("PREVIOUS").unwrap();
        controller.capture(&mut backend, "Scripted", &mut map).unwrap();
        assert_eq!(map.get("PREVIOUS"), Some("true,NOTE_ON,1,60"));
    }

    #[test]
    fn timeout_and_missing_device_leave_map_alone() {
        for outcome in [CaptureOutcome::TimedOut, CaptureOutcome::DeviceNotFound] {
            let mut map = map();
            let before = map.clone();
            let mut controller = LearnController::default();
            controller.arm("NEXT").unwrap();
            let signal = controller
                .capture(&mut backend(outcome), "Scripted", &mut map)
                .unwrap();
            assert!(matches!(
                signal,
                LearnSignal::TimedOut { .. } | LearnSignal::DeviceNotFound { .. }
            ));
            assert_eq!(map, before);
            assert_eq!(controller.state(), &LearnState::Idle);
        }
    }

    #[test]
    fn arming_rules() {
        let mut controller = LearnController::default();
        controller.arm("NEXT").unwrap();
        let err = controller.arm("PREVIOUS").unwrap_err();
        assert!(matches!(err, LearnError::AlreadyArmed { ref armed, .. } if armed == "NEXT"));
        assert_eq!(controller.armed_action(), Some("NEXT"));
        assert_eq!(
            controller.arm("NEXT").unwrap(),
            LearnSignal::Cancelled {
                action: "NEXT".into()
            }
        );
        assert_eq!(controller.cancel(), None);
    }

    #[test]
    fn capture_requires_armed_action_and_recovers_from_backend_errors() {
        let mut map = map();
        let mut controller = LearnController::default();
        let mut backend = ScriptedBackend::default();
        assert!(matches!(
            controller.capture(&mut backend, "Scripted", &mut map),
            Err(LearnError::NotArmed)
        ));
        controller.arm("NEXT").unwrap();
        assert!(matches!(
            controller.capture(&mut backend, "Scripted", &mut map),
            Err(LearnError::Backend(_))
        ));
        assert!(!controller.is_armed());
    }

    #[test]
    fn capture_refuses_undeclared_action() {
        let mut map = map();
        let before = map.clone();
        let mut controller = LearnController::default();
        let mut backend = backend(CaptureOutcome::Event(MidiEvent::new(MidiKind::NoteOn, 1, 1)));
        controller.arm("TYPO").unwrap();
        assert!(matches!(
            controller.capture(&mut backend, "Scripted", &mut map),
            Err(LearnError::UnknownAction(ref action)) if action == "TYPO"
        ));
        assert_eq!(map, before);
        assert!(!controller.is_armed());
        assert!(backend.timeouts.is_empty());
    }

    #[test]
    fn observer_receives_signals() {
        let (tx, rx) = crossbeam_channel::unbounded();
        let mut controller = LearnController::new(LearnOptions {
            timeout: Duration::from_millis(250),
        })
        .with_observer(tx);
        controller.arm("NEXT").unwrap();
        controller.cancel();
        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(received.len(), 2);
        assert!(matches!(received[1], LearnSignal::Cancelled { .. }));
    }
}
