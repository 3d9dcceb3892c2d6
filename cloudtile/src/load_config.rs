/// `load_config` module: reads the application YAML config into [`AppConfig`].
///
/// This is the only place the CLI parses its own configuration. Tool settings
/// (tippecanoe flags) are a separate concern handled by the core crate.
///
/// # Responsibilities
/// - Parse the user-supplied YAML file into typed sections
/// - Default every missing section and field, so an empty file is valid
/// - Report unreadable or malformed files with the path and the YAML cause
///
/// # Schema
/// ```yaml
/// work_dir: .
/// storage:
///   root: ./cloudtile-store
///   bucket: cloudtile-files
/// remote:
///   endpoint: http://localhost:8080
///   cluster: cloudtile
///   task_definition: cloudtile
/// tools:
///   timeout_secs: null
/// ```
use anyhow::Result;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where remote inputs are downloaded to before conversion.
    pub work_dir: PathBuf,
    pub storage: StorageSection,
    pub remote: RemoteSection,
    pub tools: ToolsSection,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            storage: StorageSection::default(),
            remote: RemoteSection::default(),
            tools: ToolsSection::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub root: PathBuf,
    pub bucket: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            root: PathBuf::from("./cloudtile-store"),
            bucket: "cloudtile-files".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RemoteSection {
    pub endpoint: String,
    pub cluster: String,
    pub task_definition: String,
}

impl Default for RemoteSection {
    fn default() -> Self {
        Self {
            endpoint: "http://localhost:8080".to_string(),
            cluster: "cloudtile".to_string(),
            task_definition: "cloudtile".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ToolsSection {
    /// No value means external tools may run for as long as they need.
    pub timeout_secs: Option<u64>,
}

impl ToolsSection {
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

/// Loads the application config, or the defaults when `path` is `None`.
pub fn load_config<P: AsRef<Path>>(path: Option<P>) -> Result<AppConfig> {
    let Some(path) = path else {
        info!("No app config given, using defaults");
        return Ok(AppConfig::default());
    };
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let config_content = match fs::read_to_string(path_ref) {
        Ok(content) => {
            info!(config_path = ?path_ref, "Config file read successfully");
            content
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            return Err(anyhow::anyhow!(
                "Failed to read config file {:?}: {}",
                path_ref,
                e
            ));
        }
    };

    if config_content.trim().is_empty() {
        info!(config_path = ?path_ref, "Config file is empty, using defaults");
        return Ok(AppConfig::default());
    }

    match serde_yaml::from_str(&config_content) {
        Ok(conf) => {
            info!(config_path = ?path_ref, "Parsed config YAML successfully");
            Ok(conf)
        }
        Err(e) => {
            error!(error = ?e, config_path = ?path_ref, "Failed to parse config YAML");
            Err(anyhow::anyhow!("Failed to parse config YAML: {e}"))
        }
    }
}
