use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};

use crate::device::MidiBackend;

/// Interval between device polling iterations.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Event emitted by the hotplug watcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HotplugEvent {
    /// The device list changed; carries the new list.
    Snapshot(Vec<String>),
}

/// Watcher that polls the backend and reports input device list changes.
pub struct HotplugWatcher {
    stop_tx: Option<Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
    rx: Receiver<HotplugEvent>,
}

impl HotplugWatcher {
    /// Spawn a new watcher. The first snapshot is always reported.
    pub fn spawn<B>(backend: B, interval: Duration) -> anyhow::Result<Self>
    where
        B: MidiBackend + 'static,
    {
        let (event_tx, event_rx) = unbounded();
        let (stop_tx, stop_rx) = unbounded::<()>();
        let handle = thread::Builder::new()
            .name("cuebind-hotplug".into())
            .spawn(move || {
                let mut last: Option<Vec<String>> = None;
                while stop_rx.try_recv().is_err() {
                    match backend.enumerate() {
                        Ok(snapshot) if last.as_ref() != Some(&snapshot) => {
                            last = Some(snapshot.clone());
                            if event_tx.send(HotplugEvent::Snapshot(snapshot)).is_err() {
                                break;
                            }
                        }
                        Ok(_) => {}
                        Err(err) => {
                            tracing::debug!(?err, "midi hotplug enumerate failed");
                        }
                    }
                    thread::park_timeout(interval);
                }
            })?;
        Ok(Self {
            stop_tx: Some(stop_tx),
            thread: Some(handle),
            rx: event_rx,
        })
    }

    /// Receive the next hotplug event, if available.
    pub fn try_recv(&self) -> Option<HotplugEvent> {
        self.rx.try_recv().ok()
    }

    /// Block until the next event arrives or `timeout` elapses.
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HotplugEvent> {
        self.rx.recv_timeout(timeout).ok()
    }
}

impl Drop for HotplugWatcher {
    fn drop(&mut self) {
        if let Some(stop) = self.stop_tx.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.thread.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}
