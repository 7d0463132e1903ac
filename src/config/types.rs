use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for md-rehost
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub documents: DocumentsConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(rename = "rate-limit", default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub extract: ExtractConfig,
    #[serde(default)]
    pub smms: Option<SmmsConfig>,
}

/// Which documents to scan
#[derive(Debug, Clone, Deserialize)]
pub struct DocumentsConfig {
    /// Root directory scanned recursively for documents
    pub root: PathBuf,

    /// File extension (without the dot) of documents to process
    #[serde(default = "default_extension")]
    pub extension: String,
}

/// Where downloaded originals go and how uploads are named
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Destination directory for downloaded originals
    #[serde(rename = "image-dir", default = "default_image_dir")]
    pub image_dir: PathBuf,

    /// Prefix prepended to the file name to form the remote object name
    #[serde(rename = "remote-prefix", default = "default_remote_prefix")]
    pub remote_prefix: String,
}

/// HTTP fetch settings
#[derive(Debug, Clone, Deserialize)]
pub struct FetchConfig {
    /// Per-request timeout (seconds)
    #[serde(rename = "timeout-secs", default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of references fetched concurrently within one document
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// User-Agent header sent to image hosts
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Upload quotas
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Maximum uploads per rolling minute window
    #[serde(rename = "per-minute", default = "default_per_minute")]
    pub per_minute: u32,

    /// Maximum uploads per rolling hour window
    #[serde(rename = "per-hour", default = "default_per_hour")]
    pub per_hour: u32,
}

/// Reference extraction settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExtractConfig {
    /// References containing any of these substrings are left alone
    #[serde(rename = "skip-markers", default)]
    pub skip_markers: Vec<String>,
}

/// SM.MS image hosting credentials
#[derive(Debug, Clone, Deserialize)]
pub struct SmmsConfig {
    /// API base URL
    #[serde(default = "default_smms_endpoint")]
    pub endpoint: String,

    /// API token; falls back to the `SMMS_API_TOKEN` environment variable
    #[serde(rename = "api-token", default)]
    pub api_token: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            image_dir: default_image_dir(),
            remote_prefix: default_remote_prefix(),
        }
    }
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            concurrency: default_concurrency(),
            user_agent: default_user_agent(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            per_minute: default_per_minute(),
            per_hour: default_per_hour(),
        }
    }
}

impl Default for SmmsConfig {
    fn default() -> Self {
        Self {
            endpoint: default_smms_endpoint(),
            api_token: None,
        }
    }
}

fn default_extension() -> String {
    "md".to_string()
}

fn default_image_dir() -> PathBuf {
    PathBuf::from("./images")
}

fn default_remote_prefix() -> String {
    "images".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_concurrency() -> usize {
    5
}

fn default_user_agent() -> String {
    format!("md-rehost/{}", env!("CARGO_PKG_VERSION"))
}

fn default_per_minute() -> u32 {
    15
}

fn default_per_hour() -> u32 {
    100
}

fn default_smms_endpoint() -> String {
    "https://smms.app/api/v2".to_string()
}
