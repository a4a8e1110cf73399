//! Cooperative cancellation for analysis batches.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Cloneable cancellation token.
///
/// The walker and every worker check it between files, and parsers poll it
/// mid-parse. Once cancelled a token stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    /// Non-zero once cancelled; the layout tree-sitter expects of its flag.
    cancelled: Arc<AtomicUsize>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation of every clone of this token.
    pub fn cancel(&self) {
        self.cancelled.store(1, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst) != 0
    }

    pub(crate) fn flag(&self) -> &AtomicUsize {
        &self.cancelled
    }
}
