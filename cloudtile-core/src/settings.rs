//! Settings passed to the tippecanoe CLI.
//!
//! A [`TippecanoeSettings`] is an ordered key -> value mapping built from a
//! grouped YAML schema (the packaged [`DEFAULT_SCHEMA`] plus an optional
//! caller-supplied file) and then adjusted through overrides. Every write goes
//! through [`TippecanoeSettings::set`], which normalizes the key, rejects
//! keys the schema does not know and keeps `minimum-zoom <= maximum-zoom`.
//!
//! The zoom check on a single `set` runs against whatever counterpart is
//! already stored, so the order of two individual sets matters: raising both
//! zooms above the current maximum must set `maximum-zoom` first. Use
//! [`TippecanoeSettings::set_zoom_levels`] to replace both at once.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_yaml::Value;
use tracing::{debug, error, info};

use crate::error::{Error, Result, ValidationError};

/// The packaged baseline schema.
pub const DEFAULT_SCHEMA: &str = include_str!("tippecanoe.yaml");

/// Name used for the packaged schema in logs and errors.
pub const DEFAULT_SCHEMA_NAME: &str = "tippecanoe.yaml";

pub const MINIMUM_ZOOM: &str = "minimum-zoom";
pub const MAXIMUM_ZOOM: &str = "maximum-zoom";

/// Token meaning "as deep as the data needs" for `maximum-zoom`.
pub const UNBOUNDED_TOKEN: &str = "g";

/// Marker that turns an example key in the schema into a comment.
const COMMENTED_KEY: &str = "  # ";

/// A single setting value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingValue {
    Bool(bool),
    Int(i64),
    Str(String),
    /// The `g` sentinel.
    Unbounded,
}

impl SettingValue {
    /// Parses a raw command-line value.
    ///
    /// `True`/`False` in any case become booleans, integers become integers,
    /// `g` becomes [`SettingValue::Unbounded`]; anything else stays a string.
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if raw.eq_ignore_ascii_case("true") {
            SettingValue::Bool(true)
        } else if raw.eq_ignore_ascii_case("false") {
            SettingValue::Bool(false)
        } else if raw == UNBOUNDED_TOKEN {
            SettingValue::Unbounded
        } else if let Ok(n) = raw.parse::<i64>() {
            SettingValue::Int(n)
        } else {
            SettingValue::Str(raw.to_string())
        }
    }

    fn from_yaml(key: &str, value: &Value, source_name: &str) -> std::result::Result<Self, ValidationError> {
        match value {
            Value::Bool(b) => Ok(SettingValue::Bool(*b)),
            Value::Number(n) => Ok(match n.as_i64() {
                Some(i) => SettingValue::Int(i),
                None => SettingValue::Str(n.to_string()),
            }),
            Value::String(s) if s == UNBOUNDED_TOKEN => Ok(SettingValue::Unbounded),
            Value::String(s) => Ok(SettingValue::Str(s.clone())),
            _ => Err(ValidationError::MalformedConfig {
                source_name: source_name.to_string(),
                reason: format!("{key} must hold a boolean, number or string"),
            }),
        }
    }
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(b) => write!(f, "{b}"),
            SettingValue::Int(i) => write!(f, "{i}"),
            SettingValue::Str(s) => f.write_str(s),
            SettingValue::Unbounded => f.write_str(UNBOUNDED_TOKEN),
        }
    }
}

impl From<bool> for SettingValue {
    fn from(value: bool) -> Self {
        SettingValue::Bool(value)
    }
}

impl From<i64> for SettingValue {
    fn from(value: i64) -> Self {
        SettingValue::Int(value)
    }
}

impl From<i32> for SettingValue {
    fn from(value: i32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<u32> for SettingValue {
    fn from(value: u32) -> Self {
        SettingValue::Int(i64::from(value))
    }
}

impl From<&str> for SettingValue {
    fn from(value: &str) -> Self {
        if value == UNBOUNDED_TOKEN {
            SettingValue::Unbounded
        } else {
            SettingValue::Str(value.to_string())
        }
    }
}

impl From<String> for SettingValue {
    fn from(value: String) -> Self {
        SettingValue::from(value.as_str())
    }
}

impl From<ZoomLevel> for SettingValue {
    fn from(value: ZoomLevel) -> Self {
        match value {
            ZoomLevel::Level(z) => SettingValue::from(z),
            ZoomLevel::Unbounded => SettingValue::Unbounded,
        }
    }
}

/// A maximum zoom: a concrete level or "maximum available".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomLevel {
    Level(u32),
    Unbounded,
}

impl ZoomLevel {
    /// Reads a zoom out of a stored or user-supplied value for `key`.
    pub fn from_setting(key: &str, value: &SettingValue) -> std::result::Result<Self, ValidationError> {
        let invalid = || ValidationError::InvalidZoom {
            key: key.to_string(),
            value: value.to_string(),
        };
        match value {
            SettingValue::Int(i) => u32::try_from(*i).map(ZoomLevel::Level).map_err(|_| invalid()),
            SettingValue::Unbounded => Ok(ZoomLevel::Unbounded),
            SettingValue::Str(s) => s.trim().parse::<ZoomLevel>().map_err(|_| invalid()),
            SettingValue::Bool(_) => Err(invalid()),
        }
    }

    pub(crate) fn minimum(key: &str, value: &SettingValue) -> std::result::Result<u32, ValidationError> {
        match ZoomLevel::from_setting(key, value)? {
            ZoomLevel::Level(z) => Ok(z),
            ZoomLevel::Unbounded => Err(ValidationError::InvalidZoom {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }
}

impl fmt::Display for ZoomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ZoomLevel::Level(z) => write!(f, "{z}"),
            ZoomLevel::Unbounded => f.write_str(UNBOUNDED_TOKEN),
        }
    }
}

impl FromStr for ZoomLevel {
    type Err = ValidationError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if s == UNBOUNDED_TOKEN {
            return Ok(ZoomLevel::Unbounded);
        }
        s.parse::<u32>()
            .map(ZoomLevel::Level)
            .map_err(|_| ValidationError::InvalidZoom {
                key: MAXIMUM_ZOOM.to_string(),
                value: s.to_string(),
            })
    }
}

/// Canonical (hyphenated) form of a setting key.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace('_', "-")
}

/// Serializes one entry the way tippecanoe expects it, `None` for `false`.
pub fn argument_token(key: &str, value: &SettingValue) -> Option<String> {
    match value {
        SettingValue::Bool(true) => Some(format!("--{key}")),
        SettingValue::Bool(false) => None,
        other => Some(format!("--{key}={other}")),
    }
}

/// Parses one `--tc-kwargs` token: `key` (boolean true) or `key=value`.
pub fn parse_override(token: &str) -> std::result::Result<(String, SettingValue), ValidationError> {
    let (key, value) = match token.split_once('=') {
        Some((key, value)) => (key.trim(), SettingValue::parse(value)),
        None => (token.trim(), SettingValue::Bool(true)),
    };
    if key.is_empty() {
        return Err(ValidationError::MalformedOverride(token.to_string()));
    }
    Ok((normalize_key(key), value))
}

/// Parses a list of override tokens. A repeated key keeps its first
/// position and its last value.
pub fn parse_overrides<S: AsRef<str>>(
    tokens: &[S],
) -> std::result::Result<Vec<(String, SettingValue)>, ValidationError> {
    let mut parsed: Vec<(String, SettingValue)> = Vec::with_capacity(tokens.len());
    for token in tokens {
        let (key, value) = parse_override(token.as_ref())?;
        match parsed.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => parsed.push((key, value)),
        }
    }
    Ok(parsed)
}

/// Validated, ordered settings for one tippecanoe invocation.
#[derive(Debug, Clone)]
pub struct TippecanoeSettings {
    entries: Vec<(String, SettingValue)>,
    known_keys: HashSet<String>,
}

impl TippecanoeSettings {
    /// Settings from the packaged schema only.
    pub fn new() -> Result<Self> {
        Self::load(DEFAULT_SCHEMA, None)
    }

    /// Loads the active defaults of `base`, then layers the values of
    /// `override_path` on top of them.
    ///
    /// The set of recognized keys comes from `base` alone, commented-out
    /// example keys included.
    pub fn load(base: &str, override_path: Option<&Path>) -> Result<Self> {
        let known_keys = flatten_groups(&uncomment(base), "base schema")?
            .into_iter()
            .map(|(key, _)| key)
            .collect();

        let mut settings = TippecanoeSettings {
            entries: Vec::new(),
            known_keys,
        };

        for (key, value) in flatten_groups(base, "base schema")? {
            let value = SettingValue::from_yaml(&key, &value, "base schema")?;
            settings.set(&key, value)?;
        }

        if let Some(path) = override_path {
            if !path.exists() {
                error!(config_path = %path.display(), "Tippecanoe config file not found");
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            info!(config_path = %path.display(), "Using custom tippecanoe config file");
            let text = fs::read_to_string(path)?;
            let source_name = path.display().to_string();
            for (key, value) in flatten_groups(&text, &source_name)? {
                let value = SettingValue::from_yaml(&key, &value, &source_name)?;
                settings.set(&key, value)?;
            }
        }

        debug!(settings = ?settings.entries, "Loaded tippecanoe settings");
        Ok(settings)
    }

    /// Whether `key` (in either underscore or hyphen form) is recognized.
    pub fn is_known(&self, key: &str) -> bool {
        self.known_keys.contains(&normalize_key(key))
    }

    pub fn get(&self, key: &str) -> Option<&SettingValue> {
        let key = normalize_key(key);
        self.entries.iter().find(|(k, _)| *k == key).map(|(_, v)| v)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SettingValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Validates and stores one setting.
    pub fn set(
        &mut self,
        key: &str,
        value: impl Into<SettingValue>,
    ) -> std::result::Result<(), ValidationError> {
        let key = normalize_key(key);
        let mut value = value.into();

        if !self.known_keys.contains(&key) {
            error!(key = %key, "Rejected unknown tippecanoe setting");
            return Err(ValidationError::UnknownSetting(key));
        }

        match key.as_str() {
            MAXIMUM_ZOOM => {
                let max = ZoomLevel::from_setting(&key, &value)?;
                if let (ZoomLevel::Level(max), Some(min)) = (max, self.minimum_zoom()) {
                    if max < min {
                        return Err(ValidationError::MaxBelowMin { min, max });
                    }
                }
                value = max.into();
            }
            MINIMUM_ZOOM => {
                let min = ZoomLevel::minimum(&key, &value)?;
                if let Some(ZoomLevel::Level(max)) = self.maximum_zoom() {
                    if min > max {
                        return Err(ValidationError::MinAboveMax { min, max });
                    }
                }
                value = min.into();
            }
            _ => {}
        }

        debug!(key = %key, value = %value, "Setting tippecanoe option");
        self.insert(key, value);
        Ok(())
    }

    /// Applies each update through [`set`](Self::set), in order.
    pub fn override_settings<I, K, V>(&mut self, updates: I) -> std::result::Result<(), ValidationError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<SettingValue>,
    {
        for (key, value) in updates {
            self.set(key.as_ref(), value)?;
        }
        Ok(())
    }

    /// Replaces both zoom levels as one validated unit.
    pub fn set_zoom_levels(&mut self, min: u32, max: ZoomLevel) -> std::result::Result<(), ValidationError> {
        for key in [MINIMUM_ZOOM, MAXIMUM_ZOOM] {
            if !self.known_keys.contains(key) {
                return Err(ValidationError::UnknownSetting(key.to_string()));
            }
        }
        if let ZoomLevel::Level(max) = max {
            if max < min {
                return Err(ValidationError::MaxBelowMin { min, max });
            }
        }
        self.insert(MINIMUM_ZOOM.to_string(), min.into());
        self.insert(MAXIMUM_ZOOM.to_string(), max.into());
        Ok(())
    }

    pub fn minimum_zoom(&self) -> Option<u32> {
        match self.get(MINIMUM_ZOOM)? {
            SettingValue::Int(z) => u32::try_from(*z).ok(),
            _ => None,
        }
    }

    pub fn maximum_zoom(&self) -> Option<ZoomLevel> {
        match self.get(MAXIMUM_ZOOM)? {
            SettingValue::Int(z) => u32::try_from(*z).ok().map(ZoomLevel::Level),
            SettingValue::Unbounded => Some(ZoomLevel::Unbounded),
            _ => None,
        }
    }

    /// Both zoom levels, when both are configured.
    pub fn zoom_levels(&self) -> Option<(u32, ZoomLevel)> {
        Some((self.minimum_zoom()?, self.maximum_zoom()?))
    }

    /// CLI arguments in insertion order: `--key` for `true`, `--key=value`
    /// for non-booleans, nothing for `false`.
    pub fn to_argument_list(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter_map(|(k, v)| argument_token(k, v))
            .collect()
    }

    fn insert(&mut self, key: String, value: SettingValue) {
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }
}

fn uncomment(schema: &str) -> String {
    schema.replace(COMMENTED_KEY, "  ")
}

/// Flattens `group -> {key: value}` into one ordered list of leaf pairs.
/// Groups that are empty or not mappings contribute nothing.
fn flatten_groups(text: &str, source_name: &str) -> std::result::Result<Vec<(String, Value)>, ValidationError> {
    let has_content = text
        .lines()
        .map(str::trim)
        .any(|line| !line.is_empty() && !line.starts_with('#'));
    if !has_content {
        return Err(ValidationError::EmptyConfig(source_name.to_string()));
    }

    let document: Value =
        serde_yaml::from_str(text).map_err(|e| ValidationError::MalformedConfig {
            source_name: source_name.to_string(),
            reason: e.to_string(),
        })?;

    let groups = match document {
        Value::Mapping(groups) if !groups.is_empty() => groups,
        _ => return Err(ValidationError::EmptyConfig(source_name.to_string())),
    };

    let mut flat = Vec::new();
    for (_, members) in groups {
        let Value::Mapping(members) = members else {
            continue;
        };
        for (key, value) in members {
            let Some(key) = key.as_str() else {
                return Err(ValidationError::MalformedConfig {
                    source_name: source_name.to_string(),
                    reason: format!("setting names must be strings, found {key:?}"),
                });
            };
            flat.push((normalize_key(key), value));
        }
    }
    Ok(flat)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_recognizes_booleans_numbers_and_sentinel() {
        assert_eq!(SettingValue::parse("True"), SettingValue::Bool(true));
        assert_eq!(SettingValue::parse("false"), SettingValue::Bool(false));
        assert_eq!(SettingValue::parse("10"), SettingValue::Int(10));
        assert_eq!(SettingValue::parse("g"), SettingValue::Unbounded);
        assert_eq!(SettingValue::parse("2.5"), SettingValue::Str("2.5".into()));
    }

    #[test]
    fn uncomment_exposes_example_keys() {
        let known = flatten_groups(&uncomment(DEFAULT_SCHEMA), "test").unwrap();
        let keys: Vec<_> = known.iter().map(|(k, _)| k.as_str()).collect();
        assert!(keys.contains(&MINIMUM_ZOOM));
        assert!(keys.contains(&MAXIMUM_ZOOM));
        assert!(keys.contains(&"no-tile-size-limit"));
    }

    #[test]
    fn comment_only_document_is_empty() {
        let err = flatten_groups("# nothing here\n\n", "empty.yaml").unwrap_err();
        assert!(matches!(err, ValidationError::EmptyConfig(_)));
    }
}
