//! Pipeline orchestration
//!
//! This module drives one document at a time through:
//! - Reading the text and extracting image references
//! - Fetching every reference into the image directory
//! - Waiting for upload admission and uploading each fetched file
//! - Rewriting the document with the references that now have a new home

use crate::config::Config;
use crate::rehost::documents::find_documents;
use crate::rehost::extractor::ReferenceExtractor;
use crate::rehost::fetcher::{build_http_client, FetchOutcome, Fetcher};
use crate::rehost::limiter::RateLimiter;
use crate::rehost::report::{ProcessingReport, RunSummary};
use crate::rehost::rewriter::rewrite;
use crate::upload::{UploadOutcome, Uploader};
use crate::RehostError;
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio_util::sync::CancellationToken;

/// Main pipeline structure
///
/// The uploader is optional: without one the pipeline only downloads
/// originals and leaves documents untouched.
pub struct Pipeline {
    extractor: ReferenceExtractor,
    fetcher: Fetcher,
    uploader: Option<Arc<dyn Uploader>>,
    limiter: Arc<RateLimiter>,
    remote_prefix: String,
    fetch_concurrency: usize,
}

impl Pipeline {
    /// Creates a download-only pipeline
    ///
    /// # Arguments
    ///
    /// * `extractor` - Finds references in document text
    /// * `fetcher` - Downloads references into the image directory
    /// * `limiter` - Upload admission control, shared with other pipelines if needed
    pub fn new(extractor: ReferenceExtractor, fetcher: Fetcher, limiter: Arc<RateLimiter>) -> Self {
        Self {
            extractor,
            fetcher,
            uploader: None,
            limiter,
            remote_prefix: String::new(),
            fetch_concurrency: 1,
        }
    }

    /// Builds a pipeline from configuration
    ///
    /// # Returns
    ///
    /// * `Ok(Pipeline)` - Ready to process documents
    /// * `Err(RehostError)` - The HTTP client could not be built
    pub fn from_config(
        config: &Config,
        uploader: Option<Arc<dyn Uploader>>,
    ) -> Result<Self, RehostError> {
        let client = build_http_client(&config.fetch)?;

        let mut pipeline = Self::new(
            ReferenceExtractor::new(config.extract.skip_markers.clone()),
            Fetcher::new(client, config.storage.image_dir.clone()),
            Arc::new(RateLimiter::from_config(&config.rate_limit)),
        )
        .with_remote_prefix(&config.storage.remote_prefix)
        .with_fetch_concurrency(config.fetch.concurrency);

        if let Some(uploader) = uploader {
            pipeline = pipeline.with_uploader(uploader);
        }

        Ok(pipeline)
    }

    /// Sets the upload backend
    pub fn with_uploader(mut self, uploader: Arc<dyn Uploader>) -> Self {
        self.uploader = Some(uploader);
        self
    }

    /// Sets the prefix for remote object names
    pub fn with_remote_prefix(mut self, prefix: &str) -> Self {
        self.remote_prefix = prefix.trim_matches('/').to_string();
        self
    }

    /// Sets how many references of one document are fetched at once
    pub fn with_fetch_concurrency(mut self, concurrency: usize) -> Self {
        self.fetch_concurrency = concurrency.max(1);
        self
    }

    /// Returns the reference extractor
    pub fn extractor(&self) -> &ReferenceExtractor {
        &self.extractor
    }

    /// Processes every matching document under `root`
    ///
    /// Documents are handled one after another. Per-document failures end up
    /// in the summary; only a missing or unreadable root is an error.
    /// Cancellation stops the run before the next document starts.
    pub async fn process_tree(
        &self,
        root: &Path,
        extension: &str,
        cancel: &CancellationToken,
    ) -> Result<RunSummary, RehostError> {
        let documents = find_documents(root, extension)?;
        tracing::info!(
            "Found {} documents under {}",
            documents.len(),
            root.display()
        );

        let mut summary = RunSummary::default();

        for document in documents {
            if cancel.is_cancelled() {
                tracing::warn!("Run cancelled, {} documents processed", summary.documents());
                break;
            }

            let report = self.process_document(&document, cancel).await;
            tracing::info!(
                "{}: {} succeeded, {} failed{}",
                document.display(),
                report.successes.len(),
                report.failures.len(),
                if report.rewritten { ", rewritten" } else { "" }
            );
            summary.push(report);
        }

        tracing::info!(
            "Run complete: {} documents, {} rewritten, {} succeeded, {} failed",
            summary.documents(),
            summary.rewritten(),
            summary.successes(),
            summary.failures()
        );

        Ok(summary)
    }

    /// Processes a single document
    ///
    /// This method:
    /// 1. Reads the document; a missing file is the only early exit
    /// 2. Extracts references
    /// 3. Fetches them
    /// 4. Admits and uploads each fetched file, building the URL mapping
    /// 5. Rewrites and saves the document if anything was mapped
    ///
    /// Errors never escape: each one is recorded against its reference.
    pub async fn process_document(
        &self,
        path: &Path,
        cancel: &CancellationToken,
    ) -> ProcessingReport {
        let mut report = ProcessingReport::new(path);

        let text = match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                report.record_failure(
                    None,
                    RehostError::NotFound {
                        path: path.to_path_buf(),
                    },
                );
                return report;
            }
            Err(source) => {
                report.record_failure(
                    None,
                    RehostError::Filesystem {
                        path: path.to_path_buf(),
                        source,
                    },
                );
                return report;
            }
        };

        let references = self.extractor.extract(&text);
        if references.is_empty() {
            tracing::debug!("No image references in {}", path.display());
            return report;
        }
        tracing::debug!(
            "Found {} image references in {}",
            references.len(),
            path.display()
        );

        let fetched = self
            .fetcher
            .fetch_all(&references, self.fetch_concurrency)
            .await;

        let mut mapping: HashMap<String, String> = HashMap::new();

        for result in fetched {
            let reference = result.reference;
            let local_path = match result.outcome {
                FetchOutcome::Fetched(local_path) => local_path,
                FetchOutcome::Failed(e) => {
                    report.record_failure(Some(reference), e);
                    continue;
                }
            };

            let Some(uploader) = &self.uploader else {
                report.record_success(reference, local_path, None, false);
                continue;
            };

            if let Err(e) = self.limiter.admit(cancel).await {
                report.record_failure(Some(reference), e);
                continue;
            }

            let remote_name = self.remote_name(&local_path);
            match uploader.upload(&local_path, &remote_name).await {
                UploadOutcome::Uploaded(url) => {
                    tracing::debug!("Uploaded {} -> {}", reference, url);
                    mapping.insert(reference.clone(), url.clone());
                    report.record_success(reference, local_path, Some(url), false);
                }
                UploadOutcome::AlreadyExists(url) => {
                    tracing::info!("{} already hosted at {}", reference, url);
                    mapping.insert(reference.clone(), url.clone());
                    report.record_success(reference, local_path, Some(url), true);
                }
                UploadOutcome::Failed(e) => {
                    tracing::warn!("Upload of {} via {} failed: {}", reference, uploader.name(), e);
                    report.record_failure(Some(reference), e);
                }
            }
        }

        if !mapping.is_empty() {
            let updated = rewrite(&text, &mapping);
            match save_document(path, updated).await {
                Ok(()) => report.rewritten = true,
                Err(e) => {
                    tracing::error!("{}", e);
                    report.record_failure(None, e);
                }
            }
        }

        report
    }

    /// Forms the remote object name for a downloaded file
    fn remote_name(&self, local_path: &Path) -> String {
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        if self.remote_prefix.is_empty() {
            file_name
        } else {
            format!("{}/{}", self.remote_prefix, file_name)
        }
    }
}

/// Replaces the document's content without exposing a half-written file
async fn save_document(path: &Path, text: String) -> Result<(), RehostError> {
    let target = path.to_path_buf();
    tokio::task::spawn_blocking(move || write_atomically(&target, &text))
        .await
        .map_err(|e| RehostError::Rewrite {
            path: path.to_path_buf(),
            source: std::io::Error::new(ErrorKind::Other, e),
        })?
}

/// Writes to a temporary sibling and renames it over `path`
fn write_atomically(path: &Path, text: &str) -> Result<(), RehostError> {
    let rewrite_error = |source| RehostError::Rewrite {
        path: path.to_path_buf(),
        source,
    };

    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let permissions = std::fs::metadata(path).map_err(rewrite_error)?.permissions();

    let mut tmp = NamedTempFile::new_in(dir).map_err(rewrite_error)?;
    tmp.write_all(text.as_bytes()).map_err(rewrite_error)?;
    tmp.as_file().sync_all().map_err(rewrite_error)?;
    tmp.as_file()
        .set_permissions(permissions)
        .map_err(rewrite_error)?;
    tmp.persist(path).map_err(|e| rewrite_error(e.error))?;

    Ok(())
}
