use capture_diff::{CaptureOpts, Settings};
use std::path::{Path, PathBuf};

#[test]
fn test_capture_opts_creation() {
    let opts = CaptureOpts {
        work_dir: Some("/tmp/capture".to_string()),
        diff_tool: Some(PathBuf::from("/usr/bin/meld")),
        open_diff_tool: Some(true),
        target_user: Some("alice".to_string()),
        ..Default::default()
    };

    let settings = opts.resolve().unwrap();
    assert_eq!(settings.work_dir.as_deref(), Some("/tmp/capture"));
    assert_eq!(settings.active_diff_tool(), Some(Path::new("/usr/bin/meld")));
    assert_eq!(settings.target_user.as_deref(), Some("alice"));
    assert!(!opts.dry_run);
}

#[test]
fn test_datetime_columns_stripped_by_default() {
    let settings = Settings::default();
    let options = settings.session_options();
    assert!(options.strip_timestamp_columns);
    assert!(options.target_user.is_none());
    assert!(settings.active_diff_tool().is_none());
}

#[test]
fn test_diff_tool_requires_opt_in() {
    let settings = Settings {
        diff_tool: Some(PathBuf::from("/usr/bin/meld")),
        auto_open_diff_tool: false,
        ..Default::default()
    };
    assert!(settings.active_diff_tool().is_none());
}

#[test]
fn test_stream_endpoint_without_user() {
    let settings = Settings {
        stream_url: Some("ws://localhost:8080/ws".to_string()),
        ..Default::default()
    };
    assert_eq!(
        settings.stream_endpoint().as_deref(),
        Some("ws://localhost:8080/ws")
    );
}

#[test]
fn test_missing_config_file_is_an_error() {
    let opts = CaptureOpts {
        config: Some(PathBuf::from("/nonexistent/capture.toml")),
        ..Default::default()
    };
    let err = opts.resolve().unwrap_err();
    assert!(format!("{err:#}").contains("Failed to read settings file"));
}
