//! Arguments handed to the remote execution service.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::ValidationError;
use crate::settings::{argument_token, SettingValue, ZoomLevel};

pub const MIN_MEMORY_MIB: u32 = 32_768;
pub const MAX_MEMORY_MIB: u32 = 122_880;
pub const MEMORY_STEP_MIB: u32 = 8_192;
pub const MIN_STORAGE_GIB: u32 = 20;
pub const MAX_STORAGE_GIB: u32 = 200;

/// Optional container resource limits for a remote job.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_mib: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_gib: Option<u32>,
}

impl ResourceOverrides {
    /// Validated overrides; `None` keeps the service default.
    pub fn new(memory_mib: Option<u32>, storage_gib: Option<u32>) -> Result<Self, ValidationError> {
        let overrides = Self {
            memory_mib,
            storage_gib,
        };
        overrides.validate()?;
        Ok(overrides)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(memory) = self.memory_mib {
            if !(MIN_MEMORY_MIB..=MAX_MEMORY_MIB).contains(&memory) || memory % MEMORY_STEP_MIB != 0 {
                return Err(ValidationError::InvalidResources(format!(
                    "memory must be between {MIN_MEMORY_MIB} and {MAX_MEMORY_MIB} MiB \
                     in steps of {MEMORY_STEP_MIB}, got {memory}"
                )));
            }
        }
        if let Some(storage) = self.storage_gib {
            if !(MIN_STORAGE_GIB..=MAX_STORAGE_GIB).contains(&storage) {
                return Err(ValidationError::InvalidResources(format!(
                    "storage must be between {MIN_STORAGE_GIB} and {MAX_STORAGE_GIB} GiB, got {storage}"
                )));
            }
        }
        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.memory_mib.is_none() && self.storage_gib.is_none()
    }
}

/// A `cloudtile convert ...` command line to run inside the remote container.
///
/// The remote side always reads from and writes to object storage, so
/// `--s3` is always present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteCommand {
    subcommand: String,
    filename: String,
    zooms: Option<(u32, ZoomLevel)>,
    label: Option<String>,
    config: Option<PathBuf>,
    overrides: Vec<(String, SettingValue)>,
}

impl RemoteCommand {
    pub fn new(subcommand: impl Into<String>, filename: impl Into<String>) -> Self {
        Self {
            subcommand: subcommand.into(),
            filename: filename.into(),
            ..Self::default()
        }
    }

    pub fn zoom_levels(mut self, min: u32, max: ZoomLevel) -> Self {
        self.zooms = Some((min, max));
        self
    }

    /// An empty label is dropped.
    pub fn label(mut self, label: impl Into<String>) -> Self {
        let label = label.into();
        self.label = (!label.is_empty()).then_some(label);
        self
    }

    pub fn config(mut self, path: impl Into<PathBuf>) -> Self {
        self.config = Some(path.into());
        self
    }

    pub fn overrides(mut self, overrides: Vec<(String, SettingValue)>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Arguments in their fixed order, without the program name.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec![
            "convert".to_string(),
            self.subcommand.clone(),
            self.filename.clone(),
        ];
        if let Some((min, max)) = self.zooms {
            args.push(min.to_string());
            args.push(max.to_string());
        }
        if let Some(label) = &self.label {
            args.extend(["--suffix".to_string(), label.clone()]);
        }
        if let Some(config) = &self.config {
            args.extend(["--config".to_string(), config.to_string_lossy().into_owned()]);
        }
        args.push("--s3".to_string());

        let tokens: Vec<String> = self
            .overrides
            .iter()
            .filter_map(|(key, value)| override_token(key, value))
            .collect();
        if !tokens.is_empty() {
            args.push("--tc-kwargs".to_string());
            args.extend(tokens);
        }
        args
    }
}

/// `--tc-kwargs` form of one override: the same policy as the tippecanoe
/// argument list, without the leading dashes.
fn override_token(key: &str, value: &SettingValue) -> Option<String> {
    argument_token(key, value).map(|token| token.trim_start_matches('-').to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_must_sit_on_a_step() {
        assert!(ResourceOverrides::new(Some(32_768), Some(20)).is_ok());
        assert!(ResourceOverrides::new(Some(122_880), None).is_ok());
        assert!(ResourceOverrides::new(Some(40_000), None).is_err());
        assert!(ResourceOverrides::new(Some(1024), None).is_err());
        assert!(ResourceOverrides::new(None, Some(201)).is_err());
    }

    #[test]
    fn false_overrides_are_omitted() {
        assert_eq!(override_token("force", &SettingValue::Bool(false)), None);
        assert_eq!(
            override_token("force", &SettingValue::Bool(true)),
            Some("force".to_string())
        );
        assert_eq!(
            override_token("drop-rate", &SettingValue::Str("2.5".into())),
            Some("drop-rate=2.5".to_string())
        );
    }
}
