use std::fs;

use codemap_core::analysis::SkipReason;
use codemap_core::config::{DEFAULT_MAX_FILE_SIZE, DEFAULT_PARSE_TIMEOUT_MS, DEFAULT_QUEUE_CAPACITY};
use codemap_core::{Analyzer, Config};
use tempfile::TempDir;

#[test]
fn test_default_config() {
    let config = Config::default();
    assert_eq!(config.walk.max_file_size, DEFAULT_MAX_FILE_SIZE);
    assert_eq!(config.analysis.parse_timeout_ms, DEFAULT_PARSE_TIMEOUT_MS);
    assert_eq!(config.analysis.queue_capacity, DEFAULT_QUEUE_CAPACITY);
    assert!(config.walk.ignore_dirs.iter().any(|d| d == ".git"));
}

#[test]
fn test_config_roundtrips_through_toml() {
    let config = Config::default();
    let toml_str = toml::to_string_pretty(&config).unwrap();
    let parsed: Config = toml::from_str(&toml_str).unwrap();
    assert_eq!(parsed, config);
}

#[test]
fn test_config_file_drives_analysis() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("src");
    fs::create_dir_all(root.join("generated")).unwrap();
    fs::write(root.join("small.py"), "x = 1\n").unwrap();
    fs::write(root.join("large.py"), "y = 2\n".repeat(50)).unwrap();
    fs::write(root.join("generated/out.py"), "z = 3\n").unwrap();
    fs::write(root.join("script.rb"), "puts 1\n").unwrap();

    let config_path = dir.path().join("codemap.toml");
    fs::write(
        &config_path,
        r#"
[walk]
ignore_dirs = ["generated"]
ignore_extensions = ["rb"]
max_file_size = 100

[analysis]
workers = 1
"#,
    )
    .unwrap();

    let config = Config::from_file(&config_path).unwrap();
    let output = Analyzer::new(config).analyze_sequential(&root).unwrap();

    let paths: Vec<&str> = output.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(paths, vec!["small.py"]);
    assert_eq!(output.summary.skipped_for(SkipReason::TooLarge), 1);
    assert_eq!(output.summary.skipped_for(SkipReason::Unsupported), 1);
}

#[test]
fn test_invalid_config_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("codemap.toml");
    fs::write(&path, "[analysis]\nqueue_capacity = 0\n").unwrap();
    assert!(Config::from_file(&path).is_err());

    assert!(Config::from_file(dir.path().join("missing.toml")).is_err());
}
