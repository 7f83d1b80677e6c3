//! Runtime configuration loading

use std::io::Write;

use tern_vm_runtime::{RuntimeConfig, Tern, TernError};

#[test]
fn test_defaults() {
    let config = RuntimeConfig::default();
    assert_eq!(config.max_jobs_per_turn, None);
    assert!(config.track_rejections);
    assert!(!config.log_jobs);
}

#[test]
fn test_partial_toml_keeps_defaults() {
    let config = RuntimeConfig::from_toml_str("max_jobs_per_turn = 64\n").unwrap();
    assert_eq!(config.max_jobs_per_turn, Some(64));
    assert!(config.track_rejections);
}

#[test]
fn test_load_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "track_rejections = false").unwrap();
    writeln!(file, "log_jobs = true").unwrap();

    let config = RuntimeConfig::load(file.path()).unwrap();
    assert!(!config.track_rejections);
    assert!(config.log_jobs);

    let tern = Tern::with_config(config.clone());
    assert_eq!(tern.config(), &config);
    assert!(!tern.context().rejection_tracker().is_enabled());
}

#[test]
fn test_missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = RuntimeConfig::load(&dir.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, TernError::Io { .. }));
}

#[test]
fn test_wrong_type_is_config_error() {
    let err = RuntimeConfig::from_toml_str("max_jobs_per_turn = \"many\"").unwrap_err();
    assert!(matches!(err, TernError::Config { .. }));
    assert!(err.to_string().starts_with("failed to parse config '<inline>'"));
}
