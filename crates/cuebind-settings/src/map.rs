//! In-memory configuration, keyed by declared identifier.

use indexmap::IndexMap;
use serde::Serialize;

use crate::extract::{DefaultValues, Extraction, KeyDeclarations};
use crate::NO_DEFAULT;

/// Snapshot of a single configuration entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigEntry {
    pub identifier: String,
    /// Dotted key the identifier was declared for; absent for imported extras.
    pub property_key: Option<String>,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Slot {
    property_key: Option<String>,
    value: String,
}

/// Ordered `identifier -> value` mapping. Values stay plain strings; typed
/// interpretation happens at the point of use.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigurationMap {
    slots: IndexMap<String, Slot>,
}

impl ConfigurationMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// One entry per declared key, valued with its default or [`NO_DEFAULT`].
    pub fn from_extraction(keys: &KeyDeclarations, defaults: &DefaultValues) -> Self {
        let slots = keys
            .iter()
            .map(|(key, identifier)| {
                let value = defaults
                    .get(key)
                    .cloned()
                    .unwrap_or_else(|| NO_DEFAULT.to_string());
                (
                    identifier.clone(),
                    Slot {
                        property_key: Some(key.clone()),
                        value,
                    },
                )
            })
            .collect();
        Self { slots }
    }

    pub fn from_defaults(extraction: &Extraction) -> Self {
        Self::from_extraction(&extraction.keys, &extraction.defaults)
    }

    pub fn get(&self, identifier: &str) -> Option<&str> {
        self.slots.get(identifier).map(|slot| slot.value.as_str())
    }

    /// Overwrites the value, appending a new entry if the identifier is unknown.
    pub fn set(&mut self, identifier: &str, value: impl Into<String>) {
        let value = value.into();
        match self.slots.get_mut(identifier) {
            Some(slot) => slot.value = value,
            None => {
                self.slots.insert(
                    identifier.to_string(),
                    Slot {
                        property_key: None,
                        value,
                    },
                );
            }
        }
    }

    /// Merges imported values, returning how many were applied.
    pub fn apply<I, K, V>(&mut self, values: I) -> usize
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut applied = 0;
        for (identifier, value) in values {
            self.set(identifier.as_ref(), value);
            applied += 1;
        }
        applied
    }

    pub fn contains(&self, identifier: &str) -> bool {
        self.slots.contains_key(identifier)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Entries in extraction order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.slots
            .iter()
            .map(|(identifier, slot)| (identifier.as_str(), slot.value.as_str()))
    }

    pub fn identifiers(&self) -> impl Iterator<Item = &str> + '_ {
        self.slots.keys().map(String::as_str)
    }

    pub fn to_pairs(&self) -> Vec<(String, String)> {
        self.entries()
            .map(|(identifier, value)| (identifier.to_string(), value.to_string()))
            .collect()
    }

    pub fn snapshot(&self) -> Vec<ConfigEntry> {
        self.slots
            .iter()
            .map(|(identifier, slot)| ConfigEntry {
                identifier: identifier.clone(),
                property_key: slot.property_key.clone(),
                value: slot.value.clone(),
            })
            .collect()
    }

    pub fn property_key(&self, identifier: &str) -> Option<&str> {
        self.slots
            .get(identifier)
            .and_then(|slot| slot.property_key.as_deref())
    }

    /// Identifier declared for a dotted property key.
    pub fn identifier_for(&self, property_key: &str) -> Option<&str> {
        self.slots
            .iter()
            .find(|(_, slot)| slot.property_key.as_deref() == Some(property_key))
            .map(|(identifier, _)| identifier.as_str())
    }

    /// Identifiers whose property key carries the action marker.
    pub fn action_identifiers<'a>(&'a self, marker: &'a str) -> impl Iterator<Item = &'a str> {
        self.slots
            .iter()
            .filter(move |(_, slot)| {
                slot.property_key
                    .as_deref()
                    .is_some_and(|key| key.contains(marker))
            })
            .map(|(identifier, _)| identifier.as_str())
    }
}

/// Human label for an action key: `midi.Action.next_slide` becomes `Next Slide`.
pub fn action_label(property_key: &str, marker: &str) -> String {
    property_key
        .replace(marker, "")
        .replace('_', " ")
        .split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
