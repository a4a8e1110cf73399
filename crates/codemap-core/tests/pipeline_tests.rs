use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::time::Duration;

use codemap_core::analysis::{AnalysisRecord, CancellationToken, EntityKind, RelationKind, SkipReason};
use codemap_core::{AnalysisError, Analyzer, Config};
use tempfile::TempDir;

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

fn analyzer(workers: usize) -> Analyzer {
    let mut config = Config::default();
    config.analysis.workers = workers;
    config.analysis.queue_capacity = 2;
    Analyzer::new(config)
}

/// A small mixed-language project.
fn project() -> TempDir {
    let dir = TempDir::new().unwrap();
    let root = dir.path();
    write(root, "app/main.py", "import os\n\ndef main():\n    helper()\n\ndef helper():\n    return os.getcwd()\n");
    write(root, "app/models.py", "class User:\n    def __init__(self, name):\n        self.name = name\n");
    write(root, "web/index.ts", "import { api } from './api';\nexport function render(): void { api(); }\n");
    write(root, "svc/server.go", "package svc\n\ntype Server struct{}\n\nfunc (s *Server) Start() {}\n");
    write(root, "lib/util.rs", "pub fn add(a: i32, b: i32) -> i32 { a + b }\n");
    write(root, "lib/broken.rs", "fn broken( {\n");
    write(root, "docs/README.md", "# docs\n");
    write(root, "node_modules/dep/index.js", "function dep() {}\n");
    write(root, "app/vendor/lib.py", "def vendored():\n    pass\n");
    dir
}

fn record_set(records: &[AnalysisRecord]) -> HashSet<String> {
    records
        .iter()
        .map(|r| serde_json::to_string(r).unwrap())
        .collect()
}

#[test]
fn test_single_python_file_project() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().join("proj");
    write(&root, "a.py", "def foo():\n    pass\n");
    write(&root, "README.md", "hello\n");
    write(&root, "node_modules/b.py", "def bar():\n    pass\n");

    let output = Analyzer::default().analyze_sequential(&root).unwrap();
    assert_eq!(output.records.len(), 1);

    let record = &output.records[0];
    assert_eq!(record.path, "a.py");
    assert_eq!(record.language, "python");
    assert_eq!(record.entities.len(), 2);
    assert_eq!(record.entities_of(EntityKind::File).count(), 1);

    let foo = record.find(EntityKind::Function, "foo").unwrap();
    let file = record.file_entity().unwrap();
    assert_eq!(record.relationships.len(), 1);
    assert!(record.has_relationship(RelationKind::Contains, &file.id, &foo.id));
}

#[test]
fn test_sequential_skips_and_summary() {
    let dir = project();
    let output = analyzer(1).analyze_sequential(dir.path()).unwrap();

    let paths: Vec<&str> = output.records.iter().map(|r| r.path.as_str()).collect();
    assert_eq!(
        paths,
        vec!["app/main.py", "app/models.py", "lib/util.rs", "svc/server.go", "web/index.ts"]
    );

    let summary = &output.summary;
    assert_eq!(summary.records, 5);
    assert_eq!(summary.skipped_for(SkipReason::Parse), 1);
    assert_eq!(summary.skipped_for(SkipReason::Unsupported), 1);
    assert_eq!(summary.files_seen, 7);
    assert_eq!(summary.skips.len(), 1);
    assert_eq!(summary.skips[0].path, "lib/broken.rs");
    assert_eq!(summary.languages.get("python"), Some(&2));
    assert!(summary.unresolved_calls >= 1);
}

#[tokio::test]
async fn test_parallel_matches_sequential() {
    let dir = project();

    let sequential = analyzer(1).analyze_sequential(dir.path()).unwrap();
    let parallel = analyzer(4).analyze(dir.path()).await.unwrap();

    assert_eq!(record_set(&sequential.records), record_set(&parallel.records));
    assert_eq!(sequential.summary.files_seen, parallel.summary.files_seen);
    assert_eq!(sequential.summary.skipped, parallel.summary.skipped);
}

#[tokio::test]
async fn test_analysis_is_idempotent() {
    let dir = project();
    let analyzer = analyzer(3);

    let first = analyzer.analyze(dir.path()).await.unwrap();
    let second = analyzer.analyze(dir.path()).await.unwrap();
    assert_eq!(first.records, second.records);
}

#[tokio::test]
async fn test_relationships_stay_within_record() {
    let dir = project();
    let output = analyzer(2).analyze(dir.path()).await.unwrap();

    for record in &output.records {
        let ids: HashSet<&str> = record.entities.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids.len(), record.entities.len(), "duplicate ids in {}", record.path);
        for rel in &record.relationships {
            assert!(ids.contains(rel.from.as_str()), "{} dangling from {}", record.path, rel.from);
            assert!(ids.contains(rel.to.as_str()), "{} dangling to {}", record.path, rel.to);
        }
    }

    let main = output.records.iter().find(|r| r.path == "app/main.py").unwrap();
    let caller = main.find(EntityKind::Function, "main").unwrap();
    let callee = main.find(EntityKind::Function, "helper").unwrap();
    assert!(main.has_relationship(RelationKind::Calls, &caller.id, &callee.id));
    assert_eq!(main.relationships_of(RelationKind::Imports).count(), 1);

    let server = output.records.iter().find(|r| r.path == "svc/server.go").unwrap();
    assert_eq!(server.stats().has_method, 1);
}

#[tokio::test]
async fn test_ignored_dirs_from_config() {
    let dir = project();
    let mut config = Config::default();
    config.walk.ignore_dirs.push("web".to_string());
    config.walk.ignore_extensions.push("go".to_string());

    let output = Analyzer::new(config).analyze(dir.path()).await.unwrap();
    assert!(output.records.iter().all(|r| !r.path.starts_with("web/")));
    assert!(output.records.iter().all(|r| !r.path.ends_with(".go")));
    assert!(output.records.iter().all(|r| !r.path.contains("vendor")));
    assert!(output.records.iter().all(|r| !r.path.contains("node_modules")));
}

#[tokio::test]
async fn test_cancelled_batch_returns_error() {
    let dir = project();
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = analyzer(2).analyze_with_cancel(dir.path(), cancel.clone()).await;
    assert!(matches!(result, Err(AnalysisError::Cancelled)));

    let result = analyzer(1).analyze_sequential_with_cancel(dir.path(), &cancel);
    assert!(matches!(result, Err(AnalysisError::Cancelled)));
}

#[tokio::test]
async fn test_generous_deadline_completes() {
    let dir = project();
    let output = analyzer(2)
        .analyze_with_deadline(dir.path(), Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(output.records.len(), 5);
}

#[tokio::test]
async fn test_parse_timeout_skips_file_and_batch_completes() {
    let dir = TempDir::new().unwrap();
    let big: String = (0..50_000)
        .map(|i| format!("def f{}(a, b):\n    return a + b * {}\n", i, i))
        .collect();
    write(dir.path(), "big.py", &big);
    write(dir.path(), "small.py", "def g():\n    pass\n");

    let mut config = Config::default();
    config.walk.max_file_size = 64 * 1024 * 1024;
    config.analysis.parse_timeout_ms = 1;
    config.analysis.workers = 2;
    let analyzer = Analyzer::new(config);

    let parallel = analyzer.analyze(dir.path()).await.unwrap();
    let sequential = analyzer.analyze_sequential(dir.path()).unwrap();
    for output in [parallel, sequential] {
        let paths: Vec<&str> = output.records.iter().map(|r| r.path.as_str()).collect();
        assert_eq!(paths, vec!["small.py"]);
        assert_eq!(output.summary.skipped_for(SkipReason::Parse), 1);
        assert_eq!(output.summary.skips[0].path, "big.py");
        assert!(output.summary.skips[0].message.contains("timed out"));
    }
}

#[tokio::test]
async fn test_missing_root_is_fatal() {
    let dir = TempDir::new().unwrap();
    let result = Analyzer::default().analyze(dir.path().join("nope")).await;
    assert!(matches!(result, Err(AnalysisError::RootNotFound(_))));
}

#[tokio::test]
async fn test_empty_root_yields_empty_output() {
    let dir = TempDir::new().unwrap();
    let output = analyzer(2).analyze(dir.path()).await.unwrap();
    assert!(output.records.is_empty());
    assert_eq!(output.summary.files_seen, 0);
}

#[test]
fn test_record_json_shape() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "m.py", "from os import path as p\n\nx = 1\n");

    let output = Analyzer::default().analyze_sequential(dir.path()).unwrap();
    let json = serde_json::to_value(&output.records[0]).unwrap();

    let keys: Vec<&str> = json.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 4);
    for key in ["path", "language", "entities", "relationships"] {
        assert!(keys.contains(&key), "missing {}", key);
    }

    let kinds: HashSet<&str> = json["entities"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["kind"].as_str().unwrap())
        .collect();
    assert_eq!(kinds, HashSet::from(["File", "Module", "Variable"]));

    let rel_kinds: HashSet<&str> = json["relationships"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["kind"].as_str().unwrap())
        .collect();
    assert!(rel_kinds.contains("IMPORTS"));
    assert!(rel_kinds.contains("CONTAINS"));

    let back: AnalysisRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, output.records[0]);
}
