use std::path::{Path, PathBuf};

use crate::extract::{Extraction, PropertyExtractor};
use crate::ExtractError;

/// Key declarations, relative to the host checkout.
pub const KEYS_RELATIVE_PATH: &str =
    "Quelea/src/main/java/org/quelea/services/utils/QueleaPropertyKeys.java";

/// Accessor declarations, relative to the host checkout.
pub const DEFAULTS_RELATIVE_PATH: &str =
    "Quelea/src/main/java/org/quelea/services/utils/QueleaProperties.java";

/// Location of the two source artifacts the extractor reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLayout {
    pub keys: PathBuf,
    pub defaults: PathBuf,
}

impl SourceLayout {
    /// Standard layout below a checkout root.
    pub fn from_root(root: &Path) -> Self {
        Self {
            keys: root.join(KEYS_RELATIVE_PATH),
            defaults: root.join(DEFAULTS_RELATIVE_PATH),
        }
    }

    /// Replaces either path when an override is given.
    pub fn with_overrides(mut self, keys: Option<PathBuf>, defaults: Option<PathBuf>) -> Self {
        if let Some(keys) = keys {
            self.keys = keys;
        }
        if let Some(defaults) = defaults {
            self.defaults = defaults;
        }
        self
    }

    pub fn extract(&self, extractor: &PropertyExtractor) -> Result<Extraction, ExtractError> {
        extractor.extract_files(&self.keys, &self.defaults)
    }
}
