//! Configuration module for md-rehost
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use md_rehost::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("rehost.toml")).unwrap();
//! println!("Uploads per minute: {}", config.rate_limit.per_minute);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DocumentsConfig, ExtractConfig, FetchConfig, RateLimitConfig, SmmsConfig,
    StorageConfig,
};

// Re-export parser functions
pub use parser::{load_config, parse_config, resolve_smms_token, SMMS_TOKEN_ENV};
