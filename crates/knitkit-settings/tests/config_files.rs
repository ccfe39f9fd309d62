use knitkit_core::Alignment;
use knitkit_settings::{Config, SettingsError};
use std::path::PathBuf;
use tempfile::TempDir;

fn customized() -> Config {
    let mut config = Config::new();
    config.connection.port = "/dev/ttyACM0".to_string();
    config.connection.idle_timeout_ms = Some(30_000);
    config.knitting.start_needle = 60;
    config.knitting.stop_needle = 139;
    config.knitting.num_colors = 3;
    config.knitting.start_line = 12;
    config.knitting.alignment = Alignment::Offset(70);
    config.add_recent_file(PathBuf::from("patterns/fair-isle.png"));
    config
}

#[test]
fn test_toml_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("nested").join("config.toml");

    let config = customized();
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_json_round_trip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.json");

    let config = customized();
    config.save_to_file(&path).unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded, config);
}

#[test]
fn test_partial_toml_uses_defaults() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "[knitting]\nstart_needle = 20\nstop_needle = 179\nalignment = \"left\"\n",
    )
    .unwrap();

    let loaded = Config::load_from_file(&path).unwrap();
    assert_eq!(loaded.knitting.start_needle, 20);
    assert_eq!(loaded.knitting.alignment, Alignment::Left);
    assert_eq!(loaded.connection, Config::new().connection);
    assert_eq!(loaded.knitting.num_colors, 2);
}

#[test]
fn test_invalid_file_is_rejected_on_load() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[knitting]\nnum_colors = 9\n").unwrap();

    assert!(matches!(
        Config::load_from_file(&path),
        Err(SettingsError::InvalidSetting { key, .. }) if key == "knitting.num_colors"
    ));
}

#[test]
fn test_invalid_config_is_not_saved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    let mut config = Config::new();
    config.connection.baud_rate = 0;
    assert!(config.save_to_file(&path).is_err());
    assert!(!path.exists());
}

#[test]
fn test_load_or_default() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("missing.toml");
    assert_eq!(Config::load_or_default(&path).unwrap(), Config::new());

    std::fs::write(&path, "not = [valid").unwrap();
    assert!(matches!(
        Config::load_or_default(&path),
        Err(SettingsError::TomlError(_))
    ));
}
