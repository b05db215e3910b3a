// Configuration loading and discovery

use proberun::config::MonitorConfig;
use proberun::MonitorError;
use std::fs;

const VALID: &str = r#"
common:
  delay: 120
probes:
  raw_tcp:
    - host: example.com
      port: 443
"#;

#[test]
fn load_single_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("services.yaml");
    fs::write(&path, VALID).unwrap();

    let config = MonitorConfig::from_file(&path).unwrap();
    assert_eq!(config.common.delay, 120);
    assert!(!config.notifications_enabled());
}

#[test]
fn missing_file_is_a_read_error() {
    let dir = tempfile::tempdir().unwrap();
    let result = MonitorConfig::from_file(&dir.path().join("absent.yaml"));
    assert!(matches!(result, Err(MonitorError::ConfigRead { .. })));
}

#[test]
fn invalid_yaml_is_a_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    fs::write(&path, "common: [not, a, mapping").unwrap();

    let result = MonitorConfig::from_file(&path);
    assert!(matches!(result, Err(MonitorError::ConfigParse { .. })));
}

#[test]
fn discover_lists_yaml_files_sorted() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("b.yaml"), VALID).unwrap();
    fs::write(dir.path().join("a.yaml"), VALID).unwrap();
    fs::write(dir.path().join("notes.txt"), "not a config").unwrap();

    let files = MonitorConfig::discover_files(dir.path()).unwrap();
    let names: Vec<_> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_str().unwrap())
        .collect();
    assert_eq!(names, vec!["a.yaml", "b.yaml"]);
}

#[test]
fn discover_on_missing_directory_reports_no_config() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope");

    let result = MonitorConfig::discover_files(&missing);
    assert!(matches!(result, Err(MonitorError::NoConfig { .. })));
}

#[test]
fn discover_on_empty_directory_reports_no_config() {
    let dir = tempfile::tempdir().unwrap();
    let result = MonitorConfig::discover_files(dir.path());
    assert!(matches!(result, Err(MonitorError::NoConfig { .. })));
}
