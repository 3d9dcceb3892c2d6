use cloudtile::load_config::{load_config, AppConfig};
use std::fs::write;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::NamedTempFile;

#[test]
fn test_no_config_path_gives_defaults() {
    let config = load_config(None::<PathBuf>).expect("Defaults should load");
    assert_eq!(config, AppConfig::default());
    assert_eq!(config.storage.bucket, "cloudtile-files");
    assert_eq!(config.tools.timeout(), None);
}

#[test]
fn test_empty_config_file_gives_defaults() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "\n").unwrap();

    let config = load_config(Some(config_file.path())).expect("Empty config should load");
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_partial_config_keeps_other_defaults() {
    let config_yaml = r#"
work_dir: /tmp/cloudtile-work
storage:
  bucket: tiles-prod
tools:
  timeout_secs: 3600
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(Some(config_file.path())).expect("Config should load");
    assert_eq!(config.work_dir, PathBuf::from("/tmp/cloudtile-work"));
    assert_eq!(config.storage.bucket, "tiles-prod");
    assert_eq!(config.storage.root, PathBuf::from("./cloudtile-store"));
    assert_eq!(config.remote.endpoint, "http://localhost:8080");
    assert_eq!(config.tools.timeout(), Some(Duration::from_secs(3600)));
}

#[test]
fn test_remote_section_is_read() {
    let config_yaml = r#"
remote:
  endpoint: https://tasks.example.org
  cluster: tiles
  task_definition: cloudtile-large
"#;
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), config_yaml).unwrap();

    let config = load_config(Some(config_file.path())).expect("Config should load");
    assert_eq!(config.remote.endpoint, "https://tasks.example.org");
    assert_eq!(config.remote.cluster, "tiles");
    assert_eq!(config.remote.task_definition, "cloudtile-large");
}

#[test]
fn test_missing_config_file_fails() {
    let err = load_config(Some("does/not/exist.yaml")).unwrap_err();
    assert!(err.to_string().contains("Failed to read config file"));
}

#[test]
fn test_malformed_config_fails() {
    let config_file = NamedTempFile::new().expect("temp file");
    write(config_file.path(), "storage: [unterminated\n").unwrap();

    let err = load_config(Some(config_file.path())).unwrap_err();
    assert!(err.to_string().contains("Failed to parse config YAML"));
}
