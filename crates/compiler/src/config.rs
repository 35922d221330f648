//! Build options
//!
//! The frontend receives options as raw string pairs. [`BuildOptions`] is the
//! typed view the compiler works with.

use crate::diagnostics::{DiagnosticEvent, Diagnostics};
use crate::{Error, Result};
use serde::de::{Error as _, value::MapDeserializer};
use serde::{Deserialize, Deserializer};
use std::collections::{BTreeMap, HashMap};

/// Main resource file used when no `filename` option is given
pub const DEFAULT_FILENAME: &str = "task.yaml";

/// Context patterns used when no `context-patterns` option is given
pub const DEFAULT_CONTEXT_PATTERNS: &[&str] = &["*.yml", "*.yaml"];

/// Prefix of options that override run params, e.g. `param:version=1.2`
pub const PARAM_PREFIX: &str = "param:";

const KNOWN_KEYS: &[&str] = &["filename", "context-patterns", "no-cache"];

/// Typed build configuration
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct BuildOptions {
    /// Name of the file holding the main resource
    pub filename: String,

    /// Glob patterns selecting auxiliary files in the build context
    #[serde(deserialize_with = "comma_list")]
    pub context_patterns: Vec<String>,

    /// Mark every exec node as uncacheable
    #[serde(deserialize_with = "flag")]
    pub no_cache: bool,

    /// Param overrides applied on top of the run's own values
    #[serde(skip)]
    pub params: BTreeMap<String, String>,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            filename: DEFAULT_FILENAME.to_string(),
            context_patterns: DEFAULT_CONTEXT_PATTERNS
                .iter()
                .map(|p| (*p).to_string())
                .collect(),
            no_cache: false,
            params: BTreeMap::new(),
        }
    }
}

impl BuildOptions {
    /// Parse raw key/value options.
    ///
    /// Unknown keys are reported through `diagnostics` and otherwise ignored.
    ///
    /// # Errors
    ///
    /// Returns a validation error when a known key has an unusable value.
    pub fn from_raw(raw: &HashMap<String, String>, diagnostics: &dyn Diagnostics) -> Result<Self> {
        let mut known = Vec::new();
        let mut params = BTreeMap::new();

        let mut keys: Vec<&String> = raw.keys().collect();
        keys.sort();
        for key in keys {
            let value = &raw[key];
            if let Some(name) = key.strip_prefix(PARAM_PREFIX) {
                if name.is_empty() {
                    return Err(Error::validation("param option needs a name after 'param:'"));
                }
                params.insert(name.to_string(), value.clone());
            } else if KNOWN_KEYS.contains(&key.as_str()) {
                known.push((key.as_str(), value.as_str()));
            } else {
                diagnostics.emit(DiagnosticEvent::UnknownOption { key: key.clone() });
            }
        }

        let deserializer: MapDeserializer<'_, _, serde::de::value::Error> =
            MapDeserializer::new(known.into_iter());
        let mut options = Self::deserialize(deserializer)
            .map_err(|e| Error::validation(format!("invalid build option: {e}")))?;

        if options.filename.trim().is_empty() {
            return Err(Error::validation("build option 'filename' must not be empty"));
        }
        if options.context_patterns.is_empty() {
            options.context_patterns = Self::default().context_patterns;
        }
        options.params = params;
        Ok(options)
    }
}

fn comma_list<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<String>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    Ok(raw
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect())
}

fn flag<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "" | "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        other => Err(D::Error::custom(format!("expected a boolean, got '{other}'"))),
    }
}
