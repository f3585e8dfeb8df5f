//! Import from and merge into flat `identifier=value` settings files.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use indexmap::IndexMap;
use tracing::{debug, info};

use crate::map::ConfigurationMap;
use crate::SettingsError;

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> SettingsError + '_ {
    move |source| SettingsError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Splits a settings line on its first `=`.
fn split_entry(line: &str) -> Option<(&str, &str)> {
    let (identifier, value) = line.trim().split_once('=')?;
    let identifier = identifier.trim();
    if identifier.is_empty() {
        return None;
    }
    Some((identifier, value.trim()))
}

/// Reads the values of `known` identifiers from a settings file. Malformed
/// and unrecognised lines are skipped.
pub fn import_from<I, S>(path: &Path, known: I) -> Result<IndexMap<String, String>, SettingsError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let known: HashSet<String> = known.into_iter().map(|s| s.as_ref().to_string()).collect();
    let content = fs::read_to_string(path).map_err(io_error(path))?;
    let mut imported = IndexMap::new();
    for line in content.lines() {
        let Some((identifier, value)) = split_entry(line) else {
            continue;
        };
        if known.contains(identifier) {
            imported.insert(identifier.to_string(), value.to_string());
        } else {
            debug!(%identifier, "skipping unrecognised settings entry");
        }
    }
    info!(path = %path.display(), entries = imported.len(), "imported settings");
    Ok(imported)
}

/// Upserts every entry of `map` into the settings file.
///
/// Lines whose identifier is not in `map` are kept byte for byte and in
/// order; matching lines are rewritten in place and the remaining entries are
/// appended in map order. A missing file is created.
pub fn export_to(path: &Path, map: &ConfigurationMap) -> Result<(), SettingsError> {
    let content = if path.exists() {
        let existing = fs::read_to_string(path).map_err(io_error(path))?;
        merge(&existing, map)
    } else {
        render(map)
    };
    fs::write(path, content).map_err(io_error(path))?;
    info!(path = %path.display(), entries = map.len(), "exported settings");
    Ok(())
}

/// Writes `map` to a fresh file, discarding anything already there.
pub fn write_template(path: &Path, map: &ConfigurationMap) -> Result<(), SettingsError> {
    fs::write(path, render(map)).map_err(io_error(path))
}

fn render(map: &ConfigurationMap) -> String {
    let mut out = String::new();
    for (identifier, value) in map.entries() {
        push_entry(&mut out, identifier, value, "\n");
    }
    out
}

fn merge(existing: &str, map: &ConfigurationMap) -> String {
    let mut out = String::with_capacity(existing.len());
    let mut seen = HashSet::new();
    for line in existing.split_inclusive('\n') {
        let (body, ending) = split_line_ending(line);
        match split_entry(body) {
            Some((identifier, _)) if map.contains(identifier) => {
                let value = map.get(identifier).unwrap_or_default();
                let ending = if ending.is_empty() { "\n" } else { ending };
                push_entry(&mut out, identifier, value, ending);
                seen.insert(identifier.to_string());
            }
            _ => out.push_str(line),
        }
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    for (identifier, value) in map.entries() {
        if !seen.contains(identifier) {
            push_entry(&mut out, identifier, value, "\n");
        }
    }
    out
}

fn split_line_ending(line: &str) -> (&str, &str) {
    if let Some(body) = line.strip_suffix("\r\n") {
        (body, "\r\n")
    } else if let Some(body) = line.strip_suffix('\n') {
        (body, "\n")
    } else {
        (line, "")
    }
}

fn push_entry(out: &mut String, identifier: &str, value: &str, ending: &str) {
    out.push_str(identifier);
    out.push('=');
    out.push_str(value);
    out.push_str(ending);
}
