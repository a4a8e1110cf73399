//! Graph assembler: collects per-file outcomes into the batch output.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{FileSkip, SkipReason};
use super::models::AnalysisRecord;

/// Result of analysing one file.
#[derive(Debug, Clone)]
pub enum FileOutcome {
    Record {
        record: AnalysisRecord,
        /// Calls that named no function of the file.
        unresolved_calls: usize,
        /// Edges dropped because an endpoint was missing.
        dropped_relationships: usize,
    },
    Skipped(FileSkip),
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Record { record, .. } => &record.path,
            Self::Skipped(skip) => &skip.path,
        }
    }
}

impl From<FileSkip> for FileOutcome {
    fn from(skip: FileSkip) -> Self {
        Self::Skipped(skip)
    }
}

/// Aggregate statistics for one analysis batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    /// Every file the walker reported, analysed or skipped.
    pub files_seen: usize,
    pub records: usize,
    pub entities: usize,
    pub relationships: usize,
    pub dropped_relationships: usize,
    pub unresolved_calls: usize,
    pub skipped: BTreeMap<SkipReason, usize>,
    /// Records per language grammar name.
    pub languages: BTreeMap<String, usize>,
    /// Notable skips; unsupported files are only counted.
    pub skips: Vec<FileSkip>,
    pub duration_ms: u64,
    pub completed_at: DateTime<Utc>,
}

impl BatchSummary {
    /// Total skipped files across all reasons.
    pub fn skipped_total(&self) -> usize {
        self.skipped.values().sum()
    }

    pub fn skipped_for(&self, reason: SkipReason) -> usize {
        self.skipped.get(&reason).copied().unwrap_or(0)
    }
}

impl fmt::Display for BatchSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Analysed {} of {} files in {} ms",
            self.records, self.files_seen, self.duration_ms
        )?;
        writeln!(
            f,
            "  {} entities, {} relationships ({} dropped, {} unresolved calls)",
            self.entities, self.relationships, self.dropped_relationships, self.unresolved_calls
        )?;
        for (language, count) in &self.languages {
            writeln!(f, "  {:<12} {}", language, count)?;
        }
        for (reason, count) in &self.skipped {
            writeln!(f, "  skipped {:<12} {}", reason.as_str(), count)?;
        }
        Ok(())
    }
}

/// Batch output: ordered records plus the summary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisOutput {
    pub records: Vec<AnalysisRecord>,
    pub summary: BatchSummary,
}

/// Accumulates outcomes as workers produce them.
///
/// Performs no cross-file deduplication: each record stays self-contained.
#[derive(Debug, Default)]
pub struct GraphAssembler {
    records: Vec<AnalysisRecord>,
    files_seen: usize,
    dropped_relationships: usize,
    unresolved_calls: usize,
    skipped: BTreeMap<SkipReason, usize>,
    skips: Vec<FileSkip>,
}

impl GraphAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, outcome: FileOutcome) {
        self.files_seen += 1;
        match outcome {
            FileOutcome::Record {
                record,
                unresolved_calls,
                dropped_relationships,
            } => {
                self.unresolved_calls += unresolved_calls;
                self.dropped_relationships += dropped_relationships;
                self.records.push(record);
            }
            FileOutcome::Skipped(skip) => {
                tracing::debug!(path = %skip.path, reason = %skip.reason, message = %skip.message, "Skipped file");
                *self.skipped.entry(skip.reason).or_insert(0) += 1;
                if skip.reason.is_notable() {
                    self.skips.push(skip);
                }
            }
        }
    }

    /// Number of outcomes received so far.
    pub fn len(&self) -> usize {
        self.files_seen
    }

    pub fn is_empty(&self) -> bool {
        self.files_seen == 0
    }

    /// Sort records and skips by path and build the summary.
    pub fn finish(mut self, elapsed: Duration) -> AnalysisOutput {
        self.records.sort_by(|a, b| a.path.cmp(&b.path));
        self.skips.sort_by(|a, b| a.path.cmp(&b.path));

        let mut languages = BTreeMap::new();
        for record in &self.records {
            *languages.entry(record.language.clone()).or_insert(0) += 1;
        }

        let summary = BatchSummary {
            files_seen: self.files_seen,
            records: self.records.len(),
            entities: self.records.iter().map(|r| r.entities.len()).sum(),
            relationships: self.records.iter().map(|r| r.relationships.len()).sum(),
            dropped_relationships: self.dropped_relationships,
            unresolved_calls: self.unresolved_calls,
            skipped: self.skipped,
            languages,
            skips: self.skips,
            duration_ms: elapsed.as_millis() as u64,
            completed_at: Utc::now(),
        };

        tracing::info!(
            files = summary.files_seen,
            records = summary.records,
            entities = summary.entities,
            relationships = summary.relationships,
            skipped = summary.skipped_total(),
            duration_ms = summary.duration_ms,
            "Analysis batch complete"
        );

        AnalysisOutput {
            records: self.records,
            summary,
        }
    }
}

/// Assemble a finished set of outcomes in one call.
pub fn assemble(outcomes: impl IntoIterator<Item = FileOutcome>, elapsed: Duration) -> AnalysisOutput {
    let mut assembler = GraphAssembler::new();
    for outcome in outcomes {
        assembler.push(outcome);
    }
    assembler.finish(elapsed)
}
