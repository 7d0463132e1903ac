//! Rehosting module: the fetch, upload and rewrite pipeline
//!
//! This module contains the core logic, including:
//! - Image reference extraction from document text
//! - HTTP fetching with collision-free local naming
//! - Two-tier upload rate limiting
//! - Literal reference rewriting
//! - Per-document orchestration and reporting

mod documents;
mod extractor;
mod fetcher;
mod limiter;
mod pipeline;
mod report;
mod rewriter;

pub use documents::find_documents;
pub use extractor::{extract_references, ReferenceExtractor};
pub use fetcher::{
    build_http_client, candidate_filename, date_prefix, extension_for_content_type,
    split_extension, FetchOutcome, FetchResult, Fetcher,
};
pub use limiter::{QuotaWindow, RateLimiter};
pub use pipeline::Pipeline;
pub use report::{FailureRecord, ProcessingReport, RunSummary, SuccessRecord};
pub use rewriter::rewrite;

use crate::config::Config;
use crate::upload::Uploader;
use crate::RehostError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Runs a complete rehosting pass over the configured document tree
///
/// This is the main entry point. It will:
/// 1. Build the HTTP client, fetcher and rate limiter from `config`
/// 2. Find every document under `config.documents.root`
/// 3. Process each document, uploading through `uploader` when given
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `uploader` - Upload backend; `None` downloads only
/// * `cancel` - Stops the run between documents and interrupts rate-limit waits
///
/// # Returns
///
/// * `Ok(RunSummary)` - Every document was visited (individual failures are in the summary)
/// * `Err(RehostError)` - The run could not start
pub async fn run(
    config: &Config,
    uploader: Option<Arc<dyn Uploader>>,
    cancel: &CancellationToken,
) -> Result<RunSummary, RehostError> {
    let pipeline = Pipeline::from_config(config, uploader)?;
    pipeline
        .process_tree(&config.documents.root, &config.documents.extension, cancel)
        .await
}
