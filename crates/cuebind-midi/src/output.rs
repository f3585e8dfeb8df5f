use std::sync::Arc;

use anyhow::Context;
use midir::{MidiOutput, MidiOutputConnection};

use crate::device::resolve_device;

/// Handle to an open MIDI output connection.
pub struct MidiOutputHandle {
    name: Arc<str>,
    connection: MidiOutputConnection,
}

impl MidiOutputHandle {
    /// Name of the connected port.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Send a raw MIDI message over the port.
    pub fn send(&mut self, bytes: &[u8]) -> anyhow::Result<()> {
        self.connection
            .send(bytes)
            .map_err(|err| anyhow::anyhow!("failed to send MIDI message on {}: {err}", self.name))
    }
}

/// Enumerate available output port names.
pub fn list_outputs(client_name: &str) -> anyhow::Result<Vec<String>> {
    let output = MidiOutput::new(client_name).context("initialise midir for output enumeration")?;
    Ok(output
        .ports()
        .iter()
        .enumerate()
        .map(|(index, port)| {
            output
                .port_name(port)
                .unwrap_or_else(|_| format!("Port {index}"))
        })
        .collect())
}

/// Open the output matching `preferred`, or the first output when no
/// preference is given or nothing matches.
pub fn open_output(client_name: &str, preferred: Option<&str>) -> anyhow::Result<MidiOutputHandle> {
    let output = MidiOutput::new(client_name).context("initialise midir for output")?;
    let ports = output.ports();
    let names: Vec<String> = ports
        .iter()
        .enumerate()
        .map(|(index, port)| {
            output
                .port_name(port)
                .unwrap_or_else(|_| format!("Port {index}"))
        })
        .collect();
    let index = preferred
        .and_then(|wanted| resolve_device(wanted, &names))
        .and_then(|name| names.iter().position(|candidate| candidate == name))
        .unwrap_or(0);
    let Some(port) = ports.get(index) else {
        anyhow::bail!("no MIDI output ports available");
    };
    let name: Arc<str> = Arc::from(names[index].as_str());
    let connection = output
        .connect(port, "cuebind-output")
        .map_err(|err| anyhow::anyhow!("failed to open MIDI output {name}: {err}"))?;
    tracing::info!(port = %name, "opened MIDI output");
    Ok(MidiOutputHandle { name, connection })
}
