use std::fs;
use std::path::Path;

use cloudtile_core::error::{Error, ValidationError};
use cloudtile_core::settings::{
    parse_overrides, SettingValue, TippecanoeSettings, ZoomLevel, DEFAULT_SCHEMA,
};
use tempfile::tempdir;

const BASELINE_ARGS: [&str; 7] = [
    "--force",
    "--read-parallel",
    "--coalesce-densest-as-needed",
    "--simplification=10",
    "--maximum-tile-bytes=2500000",
    "--maximum-tile-features=20000",
    "--no-tile-compression",
];

#[test]
fn test_baseline_argument_list() {
    let settings = TippecanoeSettings::new().unwrap();
    assert_eq!(settings.to_argument_list(), BASELINE_ARGS);
    // Pure function of the current contents
    assert_eq!(settings.to_argument_list(), settings.to_argument_list());
}

#[test]
fn test_false_boolean_is_omitted() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("force", false).unwrap();
    assert_eq!(settings.to_argument_list(), &BASELINE_ARGS[1..]);
    assert_eq!(settings.get("force"), Some(&SettingValue::Bool(false)));
}

#[test]
fn test_underscore_keys_are_normalized() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("read_parallel", false).unwrap();
    assert_eq!(settings.get("read-parallel"), Some(&SettingValue::Bool(false)));
    assert!(settings.is_known("no_tile_size_limit"));
}

#[test]
fn test_unknown_key_is_rejected() {
    let mut settings = TippecanoeSettings::new().unwrap();
    let err = settings.set("bad-key", true).unwrap_err();
    assert!(matches!(err, ValidationError::UnknownSetting(ref key) if key == "bad-key"));
    assert!(err.to_string().contains("is not a valid tippecanoe setting"));
    assert!(!settings.contains("bad-key"));
}

#[test]
fn test_commented_keys_are_recognized_but_inactive() {
    let mut settings = TippecanoeSettings::new().unwrap();
    assert!(!settings.contains("drop-rate"));
    settings.set("drop-rate", "2.5").unwrap();
    assert_eq!(
        settings.to_argument_list().last().map(String::as_str),
        Some("--drop-rate=2.5")
    );
}

#[test]
fn test_max_below_min_is_rejected() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("maximum-zoom", 3).unwrap();
    let err = settings.set("minimum-zoom", 5).unwrap_err();
    assert!(matches!(err, ValidationError::MinAboveMax { min: 5, max: 3 }));
    assert!(err
        .to_string()
        .contains("maximum zoom cannot be less than minimum zoom"));
    assert_eq!(settings.minimum_zoom(), None);
}

#[test]
fn test_min_above_max_is_rejected_in_either_order() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("minimum-zoom", 7).unwrap();
    let err = settings.set("maximum-zoom", 3).unwrap_err();
    assert!(err
        .to_string()
        .contains("maximum zoom cannot be less than minimum zoom"));
    assert_eq!(settings.maximum_zoom(), None);
}

#[test]
fn test_unbounded_maximum_accepts_any_minimum() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("maximum-zoom", "g").unwrap();
    settings.set("minimum-zoom", 14).unwrap();
    assert_eq!(settings.zoom_levels(), Some((14, ZoomLevel::Unbounded)));
    let args = settings.to_argument_list();
    assert!(args.ends_with(&["--maximum-zoom=g".to_string(), "--minimum-zoom=14".to_string()]));
}

#[test]
fn test_set_zoom_levels_replaces_both_at_once() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings.set("minimum-zoom", 2).unwrap();
    settings.set("maximum-zoom", 4).unwrap();
    // Setting min to 9 on its own would trip the ordering check.
    settings.set_zoom_levels(9, ZoomLevel::Level(12)).unwrap();
    assert_eq!(settings.zoom_levels(), Some((9, ZoomLevel::Level(12))));

    let err = settings
        .set_zoom_levels(6, ZoomLevel::Level(5))
        .unwrap_err();
    assert!(matches!(err, ValidationError::MaxBelowMin { min: 6, max: 5 }));
    assert_eq!(settings.zoom_levels(), Some((9, ZoomLevel::Level(12))));
}

#[test]
fn test_zoom_keys_reject_non_numeric_values() {
    let mut settings = TippecanoeSettings::new().unwrap();
    assert!(matches!(
        settings.set("minimum-zoom", "g"),
        Err(ValidationError::InvalidZoom { .. })
    ));
    assert!(matches!(
        settings.set("maximum-zoom", true),
        Err(ValidationError::InvalidZoom { .. })
    ));
}

#[test]
fn test_override_settings_applies_in_order() {
    let mut settings = TippecanoeSettings::new().unwrap();
    settings
        .override_settings([("force", SettingValue::Bool(false)), ("simplification", SettingValue::Int(12))])
        .unwrap();
    assert_eq!(settings.get("force"), Some(&SettingValue::Bool(false)));
    assert_eq!(settings.get("simplification"), Some(&SettingValue::Int(12)));
}

#[test]
fn test_override_file_merges_over_baseline() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.yaml");
    fs::write(
        &path,
        "output:\n  force: false\nzoom:\n  minimum_zoom: 3\n  maximum-zoom: g\n",
    )
    .unwrap();

    let settings = TippecanoeSettings::load(DEFAULT_SCHEMA, Some(&path)).unwrap();
    assert_eq!(settings.get("force"), Some(&SettingValue::Bool(false)));
    assert_eq!(settings.get("simplification"), Some(&SettingValue::Int(10)));
    assert_eq!(settings.zoom_levels(), Some((3, ZoomLevel::Unbounded)));
}

#[test]
fn test_override_file_with_unknown_key_fails() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("custom.yaml");
    fs::write(&path, "output:\n  not-a-flag: true\n").unwrap();

    let err = TippecanoeSettings::load(DEFAULT_SCHEMA, Some(&path)).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::UnknownSetting(_))
    ));
}

#[test]
fn test_missing_override_file_is_not_found() {
    let err = TippecanoeSettings::load(DEFAULT_SCHEMA, Some(Path::new("bad/path/to/config.yaml")))
        .unwrap_err();
    assert!(matches!(err, Error::ConfigNotFound(_)));
    assert!(err.is_not_found());
}

#[test]
fn test_empty_override_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.yaml");
    fs::write(&path, "# only a comment\n").unwrap();

    let err = TippecanoeSettings::load(DEFAULT_SCHEMA, Some(&path)).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::EmptyConfig(_))
    ));
}

#[test]
fn test_malformed_override_file_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "output: [force\n").unwrap();

    let err = TippecanoeSettings::load(DEFAULT_SCHEMA, Some(&path)).unwrap_err();
    assert!(matches!(
        err,
        Error::Validation(ValidationError::MalformedConfig { .. })
    ));
}

#[test]
fn test_parse_overrides_keeps_first_position_and_last_value() {
    let parsed = parse_overrides(&["force=False", "drop_rate=2.5", "no-tile-size-limit", "force=True"])
        .unwrap();
    assert_eq!(
        parsed,
        vec![
            ("force".to_string(), SettingValue::Bool(true)),
            ("drop-rate".to_string(), SettingValue::Str("2.5".to_string())),
            ("no-tile-size-limit".to_string(), SettingValue::Bool(true)),
        ]
    );
    assert!(matches!(
        parse_overrides(&["=5"]),
        Err(ValidationError::MalformedOverride(_))
    ));
}
