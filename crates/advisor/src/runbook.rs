//! Runbook corpus loading.
//!
//! The corpus is a single UTF-8 text file in which passages are separated by
//! blank lines. It is re-read for every request so edits to the file take
//! effect without a restart.

use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::error::AdvisorResult;
use crate::retrieval;

/// Reads the runbook corpus from disk.
#[derive(Debug, Clone)]
pub struct RunbookStore {
    path: PathBuf,
}

impl RunbookStore {
    /// Create a store reading from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the corpus. A missing file is an empty corpus.
    pub async fn load(&self) -> AdvisorResult<RunbookCorpus> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => {
                debug!(path = %self.path.display(), bytes = text.len(), "Loaded runbooks");
                Ok(RunbookCorpus::new(text))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No runbook file, using empty corpus");
                Ok(RunbookCorpus::default())
            }
            Err(e) => Err(e.into()),
        }
    }
}

/// Troubleshooting text split into blank-line delimited passages.
#[derive(Debug, Clone, Default)]
pub struct RunbookCorpus {
    passages: Vec<String>,
}

impl RunbookCorpus {
    /// Split `text` into passages.
    #[must_use]
    pub fn new(text: impl AsRef<str>) -> Self {
        Self {
            passages: split_passages(text.as_ref()),
        }
    }

    /// Passages in corpus order.
    #[must_use]
    pub fn passages(&self) -> &[String] {
        &self.passages
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    /// Best-matching passage for `query`, truncated to `max_chars`.
    #[must_use]
    pub fn retrieve(&self, query: &str, max_chars: usize) -> String {
        retrieval::best_passage(self.passages.iter().map(String::as_str), query, max_chars)
    }
}

/// Group consecutive non-blank lines into passages.
///
/// Lines containing only whitespace count as blank, and runs of several
/// blank lines never produce empty passages.
pub fn split_passages(text: &str) -> Vec<String> {
    let mut passages = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            if !current.is_empty() {
                passages.push(current.join("\n"));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        passages.push(current.join("\n"));
    }

    passages
}
