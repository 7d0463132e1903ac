//! md-rehost: move images embedded in Markdown documents to a new host
//!
//! This crate scans a document tree for image references, downloads each
//! image, uploads it to an image host and rewrites the references to point at
//! the uploaded copy.

pub mod config;
pub mod output;
pub mod rehost;
pub mod upload;

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for md-rehost operations
#[derive(Debug, Error)]
pub enum RehostError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Document not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("Unsupported image reference: {reference}")]
    UnsupportedReference { reference: String },

    #[error("Network error for {url}: {source}")]
    Network { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("HTTP {status} for {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Filesystem error at {}: {source}", path.display())]
    Filesystem {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Upload to {backend} failed: {message}")]
    Upload { backend: String, message: String },

    #[error("Failed to rewrite {}: {source}", path.display())]
    Rewrite {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Operation cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing credential: {0}")]
    MissingCredential(String),
}

/// Result type alias for md-rehost operations
pub type Result<T> = std::result::Result<T, RehostError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use rehost::{
    extract_references, rewrite, FetchOutcome, FetchResult, Fetcher, Pipeline, ProcessingReport,
    RateLimiter, ReferenceExtractor, RunSummary,
};
pub use upload::{existing_url_from_message, smms_uploader, SmmsUploader, UploadOutcome, Uploader};
