//! Recovers MIDI property declarations from host sources and keeps a flat
//! `identifier=value` settings file in sync with them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub mod extract;
pub mod layout;
pub mod map;
pub mod preferences;
pub mod sync;

pub use extract::{
    extract_defaults, extract_keys, DefaultValues, ExtractOptions, Extraction, KeyDeclarations,
    PropertyExtractor,
};
pub use layout::SourceLayout;
pub use map::{action_label, ConfigEntry, ConfigurationMap};
pub use preferences::MidiPreferences;
pub use sync::{export_to, import_from, write_template};

/// Value assigned to a property whose accessor declares no default.
pub const NO_DEFAULT: &str = "NO_DEFAULT";

/// Errors produced while recovering declarations from source artifacts.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// A source artifact could not be read.
    #[error("unable to read source artifact {path:?}")]
    SourceNotFound {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// The key declarations yielded nothing, usually a format change upstream.
    #[error("no MIDI property keys found in {origin}")]
    Empty { origin: String },
}

/// Errors produced while reading or writing a settings file.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("settings file I/O failed for {path:?}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errors produced when a stored string cannot be interpreted as a typed value.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValueError {
    #[error("{identifier} holds {value:?}, expected true or false")]
    InvalidBool { identifier: String, value: String },
    #[error("{identifier} holds {value:?}, expected a MIDI channel between 1 and 16")]
    InvalidChannel { identifier: String, value: String },
}
