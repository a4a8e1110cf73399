//! Directory walker.
//!
//! Lazy, iterative traversal of a source tree in file-name order. Every
//! regular file produces either a [`SourceFile`] to analyse or a
//! [`FileSkip`] explaining why it will not be analysed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use ignore::{DirEntry, WalkBuilder};

use super::error::{FileSkip, SkipReason};
use super::models::SourceFile;
use super::registry::LanguageRegistry;
use crate::config::WalkConfig;

/// Walker over one project root.
pub struct Walker {
    root: PathBuf,
    config: WalkConfig,
    registry: Arc<LanguageRegistry>,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>, config: WalkConfig, registry: Arc<LanguageRegistry>) -> Self {
        Self {
            root: root.into(),
            config,
            registry,
        }
    }

    /// Start the traversal.
    pub fn walk(&self) -> Walk {
        let filter_config = self.config.clone();

        let mut builder = WalkBuilder::new(&self.root);
        builder
            .standard_filters(false)
            .follow_links(self.config.follow_links)
            .sort_by_file_name(|a, b| a.cmp(b))
            .filter_entry(move |entry| {
                // The root itself is never filtered, whatever its name.
                if entry.depth() == 0 {
                    return true;
                }
                let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
                let ignored = entry
                    .file_name()
                    .to_str()
                    .is_some_and(|name| filter_config.is_ignored_dir(name));
                !(is_dir && ignored)
            });
        if self.config.respect_gitignore {
            builder.git_ignore(true).git_exclude(true).require_git(false);
        }

        Walk {
            inner: builder.build(),
            root: self.root.clone(),
            config: self.config.clone(),
            registry: Arc::clone(&self.registry),
        }
    }
}

/// Lazy iterator of walk outcomes.
pub struct Walk {
    inner: ignore::Walk,
    root: PathBuf,
    config: WalkConfig,
    registry: Arc<LanguageRegistry>,
}

impl Iterator for Walk {
    type Item = Result<SourceFile, FileSkip>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    let path = error_path(&err)
                        .map(|p| relative_path(&self.root, &p))
                        .unwrap_or_default();
                    return Some(Err(FileSkip::access(path, err)));
                }
            };

            if entry.depth() == 0 {
                continue;
            }
            if let Some(outcome) = self.classify(&entry) {
                return Some(outcome);
            }
        }
    }
}

impl Walk {
    /// Decide what a file entry becomes. Directories yield nothing.
    fn classify(&self, entry: &DirEntry) -> Option<Result<SourceFile, FileSkip>> {
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            return None;
        }

        let rel = relative_path(&self.root, entry.path());

        // Symlinks that were not followed: resolve the target ourselves.
        let metadata = if file_type.is_symlink() {
            match std::fs::metadata(entry.path()) {
                Ok(meta) if meta.is_dir() => return None,
                Ok(meta) => meta,
                Err(err) => return Some(Err(FileSkip::access(rel, format!("broken symlink: {}", err)))),
            }
        } else {
            match entry.metadata() {
                Ok(meta) => meta,
                Err(err) => return Some(Err(FileSkip::access(rel, err))),
            }
        };
        if !metadata.is_file() {
            return None;
        }

        let file_name = entry.file_name().to_string_lossy();
        let language = match self.registry.language_for_path(entry.path()) {
            Some(language) if !self.config.is_ignored_file(&file_name) => language,
            _ => return Some(Err(FileSkip::unsupported(rel))),
        };

        let size = metadata.len();
        if size > self.config.max_file_size {
            return Some(Err(FileSkip::new(
                rel,
                SkipReason::TooLarge,
                format!("{} bytes exceeds limit of {} bytes", size, self.config.max_file_size),
            )));
        }

        Some(Ok(SourceFile {
            path: rel,
            absolute_path: entry.path().to_path_buf(),
            language,
            size,
        }))
    }
}

/// Path relative to the root, `/`-separated.
fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// The path an `ignore` error refers to, if any.
fn error_path(err: &ignore::Error) -> Option<PathBuf> {
    match err {
        ignore::Error::WithPath { path, .. } => Some(path.clone()),
        ignore::Error::WithDepth { err, .. } | ignore::Error::WithLineNumber { err, .. } => error_path(err),
        ignore::Error::Loop { child, .. } => Some(child.clone()),
        ignore::Error::Partial(errs) => errs.iter().find_map(error_path),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::registry::Language;
    use std::fs;
    use tempfile::TempDir;

    fn write(dir: &TempDir, rel: &str, content: &str) {
        let path = dir.path().join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    fn walker(dir: &TempDir, config: WalkConfig) -> Walker {
        let registry = Arc::new(LanguageRegistry::with_ignored_extensions(&config.ignore_extensions));
        Walker::new(dir.path(), config, registry)
    }

    fn files(walker: &Walker) -> Vec<String> {
        walker.walk().filter_map(Result::ok).map(|f| f.path).collect()
    }

    #[test]
    fn test_walk_is_sorted_and_relative() {
        let dir = TempDir::new().unwrap();
        write(&dir, "b.py", "x = 1\n");
        write(&dir, "a/z.go", "package a\n");
        write(&dir, "a/m.rs", "fn m() {}\n");
        write(&dir, "c.ts", "let c = 1;\n");

        let walker = walker(&dir, WalkConfig::default());
        assert_eq!(files(&walker), vec!["a/m.rs", "a/z.go", "b.py", "c.ts"]);

        let first = walker.walk().find_map(Result::ok).unwrap();
        assert_eq!(first.language, Language::Rust);
        assert_eq!(first.size, 10);
        assert!(first.absolute_path.ends_with("a/m.rs"));
    }

    #[test]
    fn test_ignored_dirs_pruned_at_any_depth() {
        let dir = TempDir::new().unwrap();
        write(&dir, "src/app.py", "");
        write(&dir, "node_modules/lib.js", "");
        write(&dir, "src/deep/node_modules/x.js", "");
        write(&dir, "src/.git/hooks.py", "");

        let walker = walker(&dir, WalkConfig::default());
        let outcomes: Vec<_> = walker.walk().collect();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_ref().unwrap().path, "src/app.py");
    }

    #[test]
    fn test_only_directories_are_pruned_by_name() {
        let dir = TempDir::new().unwrap();
        write(&dir, "gen/out.py", "");
        write(&dir, "src/gen", "");
        write(&dir, "src/lib.py", "");

        let mut config = WalkConfig::default();
        config.ignore_dirs = vec!["gen".to_string()];
        assert!(config.is_ignored_dir("gen"));

        let outcomes: Vec<_> = walker(&dir, config).walk().collect();
        let skipped: Vec<&str> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .map(|s| s.path.as_str())
            .collect();
        assert_eq!(skipped, vec!["src/gen"]);
        assert_eq!(outcomes.len(), 2);
    }

    #[test]
    fn test_root_named_like_ignored_dir_is_walked() {
        let dir = TempDir::new().unwrap();
        write(&dir, "build/main.py", "");

        let registry = Arc::new(LanguageRegistry::new());
        let walker = Walker::new(dir.path().join("build"), WalkConfig::default(), registry);
        assert_eq!(files(&walker), vec!["main.py"]);
    }

    #[test]
    fn test_skips_unsupported_ignored_and_large() {
        let dir = TempDir::new().unwrap();
        write(&dir, "README.md", "# hi\n");
        write(&dir, "Makefile", "all:\n");
        write(&dir, "bundle.min.js", "var a;");
        write(&dir, "big.py", &"x = 1\n".repeat(100));
        write(&dir, "ok.py", "x = 1\n");

        let config = WalkConfig {
            max_file_size: 64,
            ..WalkConfig::default()
        };
        let walker = walker(&dir, config);
        let outcomes: Vec<_> = walker.walk().collect();

        let skips: Vec<(String, SkipReason)> = outcomes
            .iter()
            .filter_map(|o| o.as_ref().err())
            .map(|s| (s.path.clone(), s.reason))
            .collect();
        assert_eq!(
            skips,
            vec![
                ("Makefile".to_string(), SkipReason::Unsupported),
                ("README.md".to_string(), SkipReason::Unsupported),
                ("big.py".to_string(), SkipReason::TooLarge),
                ("bundle.min.js".to_string(), SkipReason::Unsupported),
            ]
        );
        assert_eq!(files(&walker), vec!["ok.py"]);
    }

    #[test]
    fn test_gitignore_is_opt_in() {
        let dir = TempDir::new().unwrap();
        write(&dir, ".gitignore", "gen/\n");
        write(&dir, "gen/out.py", "");
        write(&dir, "main.py", "");

        assert_eq!(files(&walker(&dir, WalkConfig::default())), vec!["gen/out.py", "main.py"]);

        let config = WalkConfig {
            respect_gitignore: true,
            ..WalkConfig::default()
        };
        assert_eq!(files(&walker(&dir, config)), vec!["main.py"]);
    }

    #[cfg(unix)]
    #[test]
    fn test_broken_symlink_is_access_skip() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.py", "");
        std::os::unix::fs::symlink(dir.path().join("missing.py"), dir.path().join("b.py")).unwrap();
        write(&dir, "c.py", "");

        let walker = walker(&dir, WalkConfig::default());
        let outcomes: Vec<_> = walker.walk().collect();
        assert_eq!(outcomes.len(), 3);
        let skip = outcomes[1].as_ref().unwrap_err();
        assert_eq!(skip.path, "b.py");
        assert_eq!(skip.reason, SkipReason::Access);
        assert_eq!(files(&walker), vec!["a.py", "c.py"]);
    }
}
