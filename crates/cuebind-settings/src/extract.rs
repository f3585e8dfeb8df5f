//! Key and default extraction from the host's property sources.
//!
//! The key source declares constants such as
//! `public static final String MIDI_ENABLED_KEY = "midi.enabled";` and the
//! defaults source contains accessors like
//! `public boolean isMidiEnabled() { return getProperty(MIDI_ENABLED_KEY, "false"); }`.

use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info, warn};

use crate::ExtractError;

/// Dotted configuration name, keyed to the identifier it is bound to.
pub type KeyDeclarations = IndexMap<String, String>;

/// Compiled-in default values, keyed by dotted configuration name.
pub type DefaultValues = IndexMap<String, String>;

/// Substring marking a MIDI-related key declaration.
pub const DEFAULT_KEY_MARKER: &str = "midi.";

/// Prefix marking a property key as an action trigger.
pub const DEFAULT_ACTION_MARKER: &str = "midi.Action.";

const ACCESSOR_CALL: &str = "getProperty";

/// Markers used to recognise MIDI declarations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    pub key_marker: String,
    pub action_marker: String,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            key_marker: DEFAULT_KEY_MARKER.to_string(),
            action_marker: DEFAULT_ACTION_MARKER.to_string(),
        }
    }
}

/// Result of scanning both source artifacts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    pub keys: KeyDeclarations,
    pub defaults: DefaultValues,
}

/// Scans host sources for MIDI property declarations.
#[derive(Debug, Clone, Default)]
pub struct PropertyExtractor {
    options: ExtractOptions,
}

impl PropertyExtractor {
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ExtractOptions {
        &self.options
    }

    pub fn extract_keys(&self, source: &str) -> KeyDeclarations {
        extract_keys(source, &self.options.key_marker)
    }

    pub fn extract_defaults(&self, source: &str, keys: &KeyDeclarations) -> DefaultValues {
        extract_defaults(source, keys)
    }

    /// Extracts from in-memory sources. `origin` names the key source in errors.
    pub fn extract(
        &self,
        keys_source: &str,
        defaults_source: &str,
        origin: &str,
    ) -> Result<Extraction, ExtractError> {
        let keys = self.extract_keys(keys_source);
        if keys.is_empty() {
            return Err(ExtractError::Empty {
                origin: origin.to_string(),
            });
        }
        let defaults = self.extract_defaults(defaults_source, &keys);
        info!(
            keys = keys.len(),
            defaults = defaults.len(),
            "extracted MIDI property declarations"
        );
        Ok(Extraction { keys, defaults })
    }

    /// Reads both artifacts from disk and extracts. Neither file is parsed
    /// unless both can be read.
    pub fn extract_files(
        &self,
        keys_path: &Path,
        defaults_path: &Path,
    ) -> Result<Extraction, ExtractError> {
        let keys_source = read_source(keys_path)?;
        let defaults_source = read_source(defaults_path)?;
        self.extract(
            &keys_source,
            &defaults_source,
            &keys_path.display().to_string(),
        )
    }
}

fn read_source(path: &Path) -> Result<String, ExtractError> {
    fs::read_to_string(path).map_err(|source| ExtractError::SourceNotFound {
        path: path.to_path_buf(),
        source,
    })
}

/// Collects `"dotted.key" -> IDENTIFIER` from every line containing `marker`.
///
/// The identifier is the last whitespace-delimited token before `=`, the key
/// is the quoted literal after it up to `;`.
pub fn extract_keys(source: &str, marker: &str) -> KeyDeclarations {
    let mut keys = KeyDeclarations::new();
    for line in source.lines() {
        if !line.contains(marker) {
            continue;
        }
        let Some((lhs, rhs)) = line.split_once('=') else {
            continue;
        };
        let Some(identifier) = lhs.split_whitespace().last() else {
            continue;
        };
        let literal = rhs.split(';').next().unwrap_or(rhs).trim().trim_matches('"');
        if literal.is_empty() {
            continue;
        }
        if let Some(existing) = keys.get(literal) {
            if existing != identifier {
                warn!(key = literal, %existing, ignored = identifier, "property key declared twice");
            }
            continue;
        }
        if let Some((other, _)) = keys.iter().find(|(_, bound)| bound.as_str() == identifier) {
            warn!(%identifier, first = %other, ignored = literal, "identifier bound to two keys");
            continue;
        }
        keys.insert(literal.to_string(), identifier.to_string());
    }
    keys
}

/// Finds the accessor default for each key. Keys without an accessor are
/// left out of the result.
pub fn extract_defaults(source: &str, keys: &KeyDeclarations) -> DefaultValues {
    let lines: Vec<&str> = source.lines().collect();
    let mut defaults = DefaultValues::new();
    for (key, identifier) in keys {
        match accessor_default(&lines, key, identifier) {
            Some(value) => {
                defaults.insert(key.clone(), value);
            }
            None => debug!(%key, %identifier, "no accessor default declared"),
        }
    }
    defaults
}

/// Looks for `public ... return ... getProperty(KEY, "DEFAULT")` where KEY is
/// the bound identifier (optionally qualified) or the quoted key itself.
/// `public` may sit on the return line or on the nearest line above it that
/// is neither blank nor a lone `{`.
fn accessor_default(lines: &[&str], key: &str, identifier: &str) -> Option<String> {
    let quoted = format!("\"{key}\"");
    for (index, line) in lines.iter().enumerate() {
        let Some(at) = find_word(line, "return") else {
            continue;
        };
        if !is_public_body(lines, index, &line[..at]) {
            continue;
        }
        let mut rest = &line[at..];
        while let Some(pos) = rest.find(ACCESSOR_CALL) {
            rest = &rest[pos + ACCESSOR_CALL.len()..];
            if let Some((first, default)) = parse_accessor_args(rest) {
                if first == quoted || names_identifier(first, identifier) {
                    return Some(default.to_string());
                }
            }
        }
    }
    None
}

/// `IDENT` or `Owner.IDENT`.
fn names_identifier(argument: &str, identifier: &str) -> bool {
    argument
        .strip_suffix(identifier)
        .is_some_and(|owner| owner.is_empty() || owner.ends_with('.'))
}

fn is_public_body(lines: &[&str], index: usize, head: &str) -> bool {
    if find_word(head, "public").is_some() {
        return true;
    }
    if !matches!(head.trim(), "" | "{") {
        return false;
    }
    lines[..index]
        .iter()
        .rev()
        .find(|line| !matches!(line.trim(), "" | "{"))
        .is_some_and(|line| find_word(line, "public").is_some())
}

/// Position of `word` followed by whitespace.
fn find_word(text: &str, word: &str) -> Option<usize> {
    text.match_indices(word)
        .find(|(at, _)| {
            let preceded = text[..*at]
                .chars()
                .next_back()
                .map_or(true, |c| !c.is_alphanumeric() && c != '_');
            let followed = text[at + word.len()..]
                .chars()
                .next()
                .is_some_and(char::is_whitespace);
            preceded && followed
        })
        .map(|(at, _)| at)
}

/// Parses `(FIRST, "DEFAULT")` and returns both arguments.
fn parse_accessor_args(rest: &str) -> Option<(&str, &str)> {
    let rest = rest.trim_start().strip_prefix('(')?;
    let (first, rest) = rest.split_once(',')?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let (default, rest) = rest.split_once('"')?;
    if default.is_empty() || !rest.trim_start().starts_with(')') {
        return None;
    }
    Some((first.trim(), default))
}
