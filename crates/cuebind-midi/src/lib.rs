//! MIDI side of cuebind: the trigger codec, device backends and learn mode.

pub mod backend_midir;
pub mod codec;
pub mod device;
pub mod hotplug;
pub mod learn;
pub mod output;
pub mod session;

pub use backend_midir::MidirBackend;
pub use codec::{decode, encode, Binding, CodecError, MidiEvent, MidiKind};
pub use device::{resolve_device, CaptureOutcome, MidiBackend};
pub use hotplug::{HotplugEvent, HotplugWatcher};
pub use learn::{
    LearnController, LearnError, LearnOptions, LearnSignal, LearnState, DEFAULT_CAPTURE_TIMEOUT,
};
pub use session::Configurator;
