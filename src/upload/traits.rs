//! Uploader trait and outcome types
//!
//! This module defines the seam concrete storage backends implement.

use crate::RehostError;
use async_trait::async_trait;
use std::path::Path;

/// Marker preceding the existing URL in duplicate-content messages
pub const EXISTS_AT_MARKER: &str = "exists at:";

/// Outcome of a single upload
#[derive(Debug)]
pub enum UploadOutcome {
    /// The file was stored and is served from this URL
    Uploaded(String),

    /// The backend already holds this content at the given URL
    AlreadyExists(String),

    /// The backend rejected the upload or could not be reached
    Failed(RehostError),
}

impl UploadOutcome {
    /// Returns the public URL for successful outcomes
    ///
    /// `AlreadyExists` counts as success: its URL replaces the reference just
    /// like a fresh upload's would.
    pub fn remote_url(&self) -> Option<&str> {
        match self {
            Self::Uploaded(url) | Self::AlreadyExists(url) => Some(url),
            Self::Failed(_) => None,
        }
    }
}

/// Trait for remote storage backends
///
/// Implementations push a local file and report where it can be fetched.
/// Backends that detect duplicate content must return
/// [`UploadOutcome::AlreadyExists`] with the existing URL rather than a
/// failure. Errors are returned in the outcome, never panicked on.
#[async_trait]
pub trait Uploader: Send + Sync {
    /// Short backend name used in logs and error messages
    fn name(&self) -> &str;

    /// Uploads `local_path` under `remote_name`
    ///
    /// Backends that choose their own object names may ignore `remote_name`.
    async fn upload(&self, local_path: &Path, remote_name: &str) -> UploadOutcome;
}

/// Extracts the URL following `exists at:` in a backend message
///
/// Some image hosts report duplicates only as free text, e.g.
/// `"Image upload repeated limit, this image exists at: https://host/x.png"`.
/// The URL is the first whitespace-delimited token after the marker, with
/// trailing punctuation removed. Returns `None` if the marker is absent or
/// no http(s) URL follows it.
///
/// # Example
///
/// ```
/// use md_rehost::existing_url_from_message;
///
/// let msg = "this image exists at: https://host/x.png";
/// assert_eq!(existing_url_from_message(msg).as_deref(), Some("https://host/x.png"));
/// ```
pub fn existing_url_from_message(message: &str) -> Option<String> {
    let idx = message.find(EXISTS_AT_MARKER)?;
    let url = message[idx + EXISTS_AT_MARKER.len()..]
        .split_whitespace()
        .next()?
        .trim_end_matches(['.', ',', ';', ')', '"', '\'']);

    if url.starts_with("https://") || url.starts_with("http://") {
        Some(url.to_string())
    } else {
        None
    }
}
