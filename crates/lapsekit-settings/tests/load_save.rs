use lapsekit_settings::{JobSettings, SettingsError};
use lapsekit_stabilization::{MinimumInterval, StabilizationAxis, StrategyKind};
use tempfile::TempDir;

fn customized() -> JobSettings {
    let mut settings = JobSettings::default();
    settings.processor.stabilization.strategy = StrategyKind::Gcode;
    settings.processor.stabilization.minimum_interval = MinimumInterval::Millimeters(25.0);
    settings.processor.stabilization.x = StabilizationAxis::Fixed(10.0);
    settings.processor.snapshot.lift_height_mm = Some(0.4);
    settings.processor.snapshot.resume_command = Some("M400".to_string());
    settings.logging.json = true;
    settings
}

#[test]
fn test_save_and_load_toml() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("job.toml");

    let settings = customized();
    settings.save_to_file(&path).unwrap();
    let loaded = JobSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_save_and_load_json() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.json");

    let settings = customized();
    settings.save_to_file(&path).unwrap();
    let loaded = JobSettings::load_from_file(&path).unwrap();
    assert_eq!(loaded, settings);
}

#[test]
fn test_unsupported_extension() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.yaml");
    assert!(matches!(
        JobSettings::default().save_to_file(&path),
        Err(SettingsError::UnsupportedFormat(_))
    ));
    assert!(!path.exists());
}

#[test]
fn test_invalid_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.toml");
    std::fs::write(
        &path,
        "[processor.position]\nretraction_threshold = -1.0\n",
    )
    .unwrap();

    let err = JobSettings::load_from_file(&path).unwrap_err();
    assert!(matches!(err, SettingsError::Validation(_)));
}

#[test]
fn test_malformed_file_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.toml");
    std::fs::write(&path, "[processor\n").unwrap();
    assert!(matches!(
        JobSettings::load_from_file(&path),
        Err(SettingsError::TomlError(_))
    ));

    let path = dir.path().join("job.json");
    std::fs::write(&path, "{ not json").unwrap();
    assert!(matches!(
        JobSettings::load_from_file(&path),
        Err(SettingsError::JsonError(_))
    ));
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");
    assert!(matches!(
        JobSettings::load_from_file(&path),
        Err(SettingsError::IoError(_))
    ));
}

#[test]
fn test_invalid_settings_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("job.toml");
    let mut settings = JobSettings::default();
    settings.processor.position.history_size = 0;
    assert!(settings.save_to_file(&path).is_err());
    assert!(!path.exists());
}
