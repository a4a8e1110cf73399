//! Analysis pipeline: Walker -> Registry -> Parser Adapter -> Extractor -> Assembler.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use super::assembler::{AnalysisOutput, FileOutcome, GraphAssembler};
use super::cancellation::CancellationToken;
use super::error::{AnalysisError, ExtractError, FileSkip, ParseError};
use super::extract;
use super::models::{AnalysisRecord, SourceFile};
use super::parser::ParserAdapter;
use super::registry::{Language, LanguageRegistry};
use super::walker::Walker;
use crate::config::Config;

/// Entry point for analysing a source tree.
///
/// Cheap to clone: configuration and registry are shared read-only.
#[derive(Debug, Clone)]
pub struct Analyzer {
    config: Arc<Config>,
    registry: Arc<LanguageRegistry>,
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Analyzer {
    pub fn new(config: Config) -> Self {
        let registry = Arc::new(config.registry());
        Self {
            config: Arc::new(config),
            registry,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &LanguageRegistry {
        &self.registry
    }

    fn walker(&self, root: &Path) -> Walker {
        Walker::new(root, self.config.walk.clone(), Arc::clone(&self.registry))
    }

    fn adapter(&self) -> ParserAdapter {
        ParserAdapter::new(self.config.analysis.parse_timeout())
    }

    /// Validate the root before any work starts.
    fn check_root(&self, root: &Path) -> Result<PathBuf, AnalysisError> {
        let metadata = match std::fs::metadata(root) {
            Ok(metadata) => metadata,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AnalysisError::RootNotFound(root.to_path_buf()))
            }
            Err(source) => {
                return Err(AnalysisError::RootUnreadable {
                    path: root.to_path_buf(),
                    source,
                })
            }
        };
        if !metadata.is_dir() {
            return Err(AnalysisError::RootNotDirectory(root.to_path_buf()));
        }
        std::fs::read_dir(root).map_err(|source| AnalysisError::RootUnreadable {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(root.to_path_buf())
    }

    // =========================================================================
    // SINGLE FILE
    // =========================================================================

    /// Read, parse and extract one walked file.
    pub fn analyze_file(&self, file: &SourceFile, adapter: &mut ParserAdapter) -> FileOutcome {
        let bytes = match std::fs::read(&file.absolute_path) {
            Ok(bytes) => bytes,
            Err(err) => return FileSkip::access(&file.path, err).into(),
        };
        let source = match String::from_utf8(bytes) {
            Ok(source) => source,
            Err(_) => return FileSkip::parse(&file.path, &ParseError::InvalidUtf8).into(),
        };
        self.analyze_text(&file.path, file.language, &source, adapter)
    }

    /// Analyse in-memory source, resolving the language from the path's extension.
    pub fn analyze_source(&self, path: &str, source: &str) -> FileOutcome {
        match self.registry.language_for_path(path) {
            Some(language) => self.analyze_text(path, language, source, &mut self.adapter()),
            None => FileSkip::unsupported(path).into(),
        }
    }

    fn analyze_text(
        &self,
        path: &str,
        language: Language,
        source: &str,
        adapter: &mut ParserAdapter,
    ) -> FileOutcome {
        let tree = match adapter.parse(source, language) {
            Ok(tree) => tree,
            Err(err) => return FileSkip::parse(path, &err).into(),
        };

        let extracted = catch_unwind(AssertUnwindSafe(|| extract::extract(language, &tree, source, path)));
        let extraction = match extracted {
            Ok(Ok(extraction)) => extraction,
            Ok(Err(err)) => return FileSkip::extractor(path, &err).into(),
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                tracing::warn!(path, language = %language, %message, "Extractor panicked");
                return FileSkip::extractor(path, &ExtractError::Panicked(message)).into();
            }
        };

        FileOutcome::Record {
            record: AnalysisRecord {
                path: path.to_string(),
                language: language.grammar_name().to_string(),
                entities: extraction.entities,
                relationships: extraction.relationships,
            },
            unresolved_calls: extraction.unresolved_calls,
            dropped_relationships: extraction.dropped_relationships,
        }
    }

    // =========================================================================
    // SEQUENTIAL
    // =========================================================================

    /// Analyse a tree on the calling thread.
    pub fn analyze_sequential(&self, root: impl AsRef<Path>) -> Result<AnalysisOutput, AnalysisError> {
        self.analyze_sequential_with_cancel(root, &CancellationToken::new())
    }

    pub fn analyze_sequential_with_cancel(
        &self,
        root: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let root = self.check_root(root.as_ref())?;
        let started = Instant::now();
        tracing::debug!(root = %root.display(), "Starting sequential analysis");

        let mut adapter = self.adapter().with_cancellation(cancel.clone());
        let mut assembler = GraphAssembler::new();
        for outcome in self.walker(&root).walk() {
            if cancel.is_cancelled() {
                return Err(AnalysisError::Cancelled);
            }
            let outcome = match outcome {
                Ok(file) => self.analyze_file(&file, &mut adapter),
                Err(skip) => skip.into(),
            };
            assembler.push(outcome);
        }

        // A parse aborted mid-file still leaves the batch cancelled.
        if cancel.is_cancelled() {
            return Err(AnalysisError::Cancelled);
        }
        Ok(assembler.finish(started.elapsed()))
    }

    // =========================================================================
    // WORKER POOL
    // =========================================================================

    /// Analyse a tree on a bounded pool of blocking workers.
    pub async fn analyze(&self, root: impl AsRef<Path>) -> Result<AnalysisOutput, AnalysisError> {
        self.analyze_with_cancel(root, CancellationToken::new()).await
    }

    /// Analyse a tree, giving up once `deadline` has passed.
    pub async fn analyze_with_deadline(
        &self,
        root: impl AsRef<Path>,
        deadline: Duration,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let cancel = CancellationToken::new();
        let timer_cancel = cancel.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(deadline).await;
            tracing::warn!(deadline_ms = deadline.as_millis() as u64, "Analysis deadline reached");
            timer_cancel.cancel();
        });

        let result = self.analyze_with_cancel(root, cancel).await;
        timer.abort();
        result
    }

    /// Analyse a tree until done or until `cancel` fires.
    ///
    /// A cancelled batch discards every partial record.
    pub async fn analyze_with_cancel(
        &self,
        root: impl AsRef<Path>,
        cancel: CancellationToken,
    ) -> Result<AnalysisOutput, AnalysisError> {
        let root = self.check_root(root.as_ref())?;
        let started = Instant::now();
        let workers = self.config.analysis.effective_workers();
        tracing::debug!(root = %root.display(), workers, "Starting analysis");

        let (work_tx, work_rx) = mpsc::channel::<SourceFile>(self.config.analysis.queue_capacity);
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<FileOutcome>();

        // Producer: the walker feeds files to the queue and reports skips directly.
        let walker = self.walker(&root);
        let producer_cancel = cancel.clone();
        let skip_tx = result_tx.clone();
        let producer = tokio::task::spawn_blocking(move || {
            for outcome in walker.walk() {
                if producer_cancel.is_cancelled() {
                    break;
                }
                match outcome {
                    Ok(file) => {
                        if work_tx.blocking_send(file).is_err() {
                            break;
                        }
                    }
                    Err(skip) => {
                        if skip_tx.send(skip.into()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        // Workers: each owns one parser and pulls from the shared queue.
        let work_rx = Arc::new(Mutex::new(work_rx));
        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let analyzer = self.clone();
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let cancel = cancel.clone();

            handles.push(tokio::task::spawn_blocking(move || {
                let mut adapter = analyzer.adapter().with_cancellation(cancel.clone());
                let mut processed = 0usize;
                while !cancel.is_cancelled() {
                    let next = match work_rx.lock() {
                        Ok(mut rx) => rx.blocking_recv(),
                        Err(_) => break,
                    };
                    let Some(file) = next else { break };
                    let outcome = analyzer.analyze_file(&file, &mut adapter);
                    processed += 1;
                    if result_tx.send(outcome).is_err() {
                        break;
                    }
                }
                tracing::trace!(worker_id, processed, "Worker finished");
            }));
        }
        drop(work_rx);
        drop(result_tx);

        let mut assembler = GraphAssembler::new();
        while let Some(outcome) = result_rx.recv().await {
            assembler.push(outcome);
        }

        producer
            .await
            .map_err(|e| AnalysisError::Worker(format!("walker: {}", e)))?;
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Worker failed");
                return Err(AnalysisError::Worker(e.to_string()));
            }
        }

        if cancel.is_cancelled() {
            tracing::debug!(received = assembler.len(), "Analysis cancelled");
            return Err(AnalysisError::Cancelled);
        }
        Ok(assembler.finish(started.elapsed()))
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
