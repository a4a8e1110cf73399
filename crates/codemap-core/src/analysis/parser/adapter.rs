//! Tree-sitter parser adapter.

use std::time::Duration;

use tree_sitter::{Node, Parser as TSParser, Tree};

use crate::analysis::cancellation::CancellationToken;
use crate::analysis::error::ParseError;
use crate::analysis::registry::Language;

/// Wraps a single tree-sitter parser instance.
///
/// One grammar is active at a time. An adapter must not be shared between
/// workers; each worker owns its own.
pub struct ParserAdapter {
    // Declared before `cancel` so the parser drops while the flag is alive.
    parser: TSParser,
    active: Option<Language>,
    timeout: Duration,
    cancel: Option<CancellationToken>,
}

impl ParserAdapter {
    /// Create an adapter with the given per-parse timeout.
    ///
    /// A zero timeout disables the limit.
    pub fn new(timeout: Duration) -> Self {
        Self {
            parser: TSParser::new(),
            active: None,
            timeout,
            cancel: None,
        }
    }

    /// Abort in-flight parses once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        // SAFETY: the flag lives in the token's `Arc`, and `self.cancel` holds
        // a clone of it for as long as `self.parser` can read the pointer.
        unsafe { self.parser.set_cancellation_flag(Some(token.flag())) };
        self.cancel = Some(token);
        self
    }

    /// Language currently loaded into the parser.
    pub fn active_language(&self) -> Option<Language> {
        self.active
    }

    /// Parse source code into a tree.
    ///
    /// Fails if the grammar cannot be loaded, the parse times out, or the
    /// resulting tree contains syntax errors.
    pub fn parse(&mut self, source: &str, language: Language) -> Result<Tree, ParseError> {
        self.activate(language)?;

        self.parser.reset();
        self.parser.set_timeout_micros(self.timeout.as_micros() as u64);

        let tree = match self.parser.parse(source, None) {
            Some(tree) => tree,
            None => {
                // A cancelled parse leaves state behind; clear it for the next file.
                self.parser.reset();
                let cancelled = self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled);
                return Err(if cancelled {
                    ParseError::Cancelled
                } else if self.timeout.is_zero() {
                    ParseError::NoTree
                } else {
                    ParseError::Timeout(self.timeout.as_millis() as u64)
                });
            }
        };

        let root = tree.root_node();
        if root.has_error() {
            let (line, column) = first_error(root)
                .map(|n| {
                    let pos = n.start_position();
                    (pos.row + 1, pos.column + 1)
                })
                .unwrap_or((1, 1));
            return Err(ParseError::Syntax { line, column });
        }

        Ok(tree)
    }

    fn activate(&mut self, language: Language) -> Result<(), ParseError> {
        if self.active == Some(language) {
            return Ok(());
        }

        self.active = None;
        self.parser
            .set_language(&language.grammar())
            .map_err(|e| ParseError::Language {
                language: language.grammar_name().to_string(),
                message: e.to_string(),
            })?;
        self.active = Some(language);
        Ok(())
    }
}

/// Find the first ERROR or MISSING node in document order.
pub fn first_error(root: Node) -> Option<Node> {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_error() || node.is_missing() {
            return Some(node);
        }
        if !node.has_error() {
            continue;
        }
        let mut cursor = node.walk();
        let children: Vec<Node> = node.children(&mut cursor).collect();
        stack.extend(children.into_iter().rev());
    }
    None
}
