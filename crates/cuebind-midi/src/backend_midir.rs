use std::time::Duration;

use anyhow::Context;
use crossbeam_channel::{bounded, RecvTimeoutError};
use midir::{Ignore, MidiInput, MidiInputPort};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::codec::MidiEvent;
use crate::device::{resolve_device, CaptureOutcome, MidiBackend};
use crate::output::{open_output, MidiOutputHandle};

const DEFAULT_CLIENT_NAME: &str = "cuebind";

/// Velocity or second data byte used when sending a bound event.
const SEND_SECONDARY: u8 = 127;

/// Backend implemented using the `midir` crate.
pub struct MidirBackend {
    client_name: String,
    output_hint: Option<String>,
    output: Mutex<Option<MidiOutputHandle>>,
}

impl Default for MidirBackend {
    fn default() -> Self {
        Self::new(DEFAULT_CLIENT_NAME)
    }
}

impl MidirBackend {
    pub fn new(client_name: impl Into<String>) -> Self {
        Self {
            client_name: client_name.into(),
            output_hint: None,
            output: Mutex::new(None),
        }
    }

    /// Prefer the output port whose name contains `hint` when sending.
    pub fn with_output_hint(mut self, hint: impl Into<String>) -> Self {
        self.output_hint = Some(hint.into());
        self
    }

    fn port_names(input: &MidiInput) -> Vec<String> {
        input
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| {
                input
                    .port_name(port)
                    .unwrap_or_else(|_| format!("Port {index}"))
            })
            .collect()
    }
}

impl MidiBackend for MidirBackend {
    fn enumerate(&self) -> anyhow::Result<Vec<String>> {
        let input =
            MidiInput::new(&self.client_name).context("initialise midir for enumeration")?;
        Ok(Self::port_names(&input))
    }

    fn await_next_event(
        &mut self,
        device: &str,
        timeout: Duration,
    ) -> anyhow::Result<CaptureOutcome> {
        let mut input = MidiInput::new(&self.client_name).context("initialise midir for input")?;
        input.ignore(Ignore::All);
        let names = Self::port_names(&input);
        let Some(name) = resolve_device(device, &names).map(str::to_string) else {
            debug!(%device, available = names.len(), "no matching MIDI input");
            return Ok(CaptureOutcome::DeviceNotFound);
        };
        let ports: Vec<MidiInputPort> = input.ports();
        let Some(port) = names
            .iter()
            .position(|candidate| *candidate == name)
            .and_then(|index| ports.get(index))
        else {
            return Ok(CaptureOutcome::DeviceNotFound);
        };

        let (tx, rx) = bounded(16);
        let connection = input
            .connect(
                port,
                "cuebind-capture",
                move |_timestamp, message, _| {
                    if let Some(event) = MidiEvent::from_raw(message) {
                        let _ = tx.try_send(event);
                    }
                },
                (),
            )
            .map_err(|err| anyhow::anyhow!("failed to connect midi input {name}: {err}"))?;
        info!(port = %name, timeout_ms = timeout.as_millis() as u64, "listening for MIDI event");

        let outcome = match rx.recv_timeout(timeout) {
            Ok(event) => CaptureOutcome::Event(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                CaptureOutcome::TimedOut
            }
        };
        connection.close();
        Ok(outcome)
    }

    fn send(&self, event: &MidiEvent) -> anyhow::Result<()> {
        let Some(bytes) = event.to_raw(SEND_SECONDARY) else {
            anyhow::bail!("cannot send {event}: unsupported message kind");
        };
        let mut output = self.output.lock();
        if output.is_none() {
            *output = Some(open_output(&self.client_name, self.output_hint.as_deref())?);
        }
        match output.as_mut() {
            Some(handle) => {
                debug!(port = handle.name(), %event, "sending MIDI event");
                handle.send(&bytes)
            }
            None => anyhow::bail!("no MIDI output open"),
        }
    }
}
