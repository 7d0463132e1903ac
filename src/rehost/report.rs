//! Per-document and per-run processing reports

use crate::RehostError;
use std::path::{Path, PathBuf};

/// A reference that was fetched (and uploaded, if an uploader is configured)
#[derive(Debug, Clone)]
pub struct SuccessRecord {
    /// The reference as it appeared in the document
    pub reference: String,

    /// Where the original was saved
    pub local_path: PathBuf,

    /// The URL that replaced the reference; `None` in download-only runs
    pub remote_url: Option<String>,

    /// Whether the backend reported the content as already present
    pub already_existed: bool,
}

/// A failure attributable to one reference, or to the document itself
#[derive(Debug)]
pub struct FailureRecord {
    /// The failing reference; `None` for document-level failures
    pub reference: Option<String>,

    /// What went wrong
    pub error: RehostError,
}

impl FailureRecord {
    /// Human-readable reason
    pub fn reason(&self) -> String {
        self.error.to_string()
    }
}

/// Result of processing one document
#[derive(Debug)]
pub struct ProcessingReport {
    /// The processed document
    pub document: PathBuf,

    /// Successfully handled references
    pub successes: Vec<SuccessRecord>,

    /// Failures, in the order they happened
    pub failures: Vec<FailureRecord>,

    /// Whether the document was written back
    pub rewritten: bool,
}

impl ProcessingReport {
    /// Creates an empty report for `document`
    pub fn new(document: &Path) -> Self {
        Self {
            document: document.to_path_buf(),
            successes: Vec::new(),
            failures: Vec::new(),
            rewritten: false,
        }
    }

    /// Records a handled reference
    pub fn record_success(
        &mut self,
        reference: String,
        local_path: PathBuf,
        remote_url: Option<String>,
        already_existed: bool,
    ) {
        self.successes.push(SuccessRecord {
            reference,
            local_path,
            remote_url,
            already_existed,
        });
    }

    /// Records a failure
    pub fn record_failure(&mut self, reference: Option<String>, error: RehostError) {
        self.failures.push(FailureRecord { reference, error });
    }

    /// Returns true if nothing failed
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Aggregate of all document reports in one run
#[derive(Debug, Default)]
pub struct RunSummary {
    /// Reports in processing order
    pub reports: Vec<ProcessingReport>,
}

impl RunSummary {
    /// Adds a document report
    pub fn push(&mut self, report: ProcessingReport) {
        self.reports.push(report);
    }

    /// Number of documents processed
    pub fn documents(&self) -> usize {
        self.reports.len()
    }

    /// Number of documents written back
    pub fn rewritten(&self) -> usize {
        self.reports.iter().filter(|r| r.rewritten).count()
    }

    /// Total successful references
    pub fn successes(&self) -> usize {
        self.reports.iter().map(|r| r.successes.len()).sum()
    }

    /// Total failures
    pub fn failures(&self) -> usize {
        self.reports.iter().map(|r| r.failures.len()).sum()
    }
}
