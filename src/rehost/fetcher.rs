//! Image fetcher
//!
//! This module downloads referenced images into a local directory:
//! - Deriving a safe file name from the reference's path
//! - HEAD requests to pick an extension when the path has none
//! - GET requests with a bounded timeout
//! - Date-prefixing names from `Last-Modified`
//! - Collision-free naming (`name.jpg`, `name_1.jpg`, ...)

use crate::config::FetchConfig;
use crate::RehostError;
use chrono::{DateTime, NaiveDateTime};
use futures::stream::{self, StreamExt};
use reqwest::header::{CONTENT_TYPE, LAST_MODIFIED};
use reqwest::Client;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Stem used when a reference path has no usable file name
const FALLBACK_STEM: &str = "image";

/// RFC 850 and asctime date layouts
const OBSOLETE_HTTP_DATES: [&str; 2] = ["%A, %d-%b-%y %H:%M:%S GMT", "%a %b %e %H:%M:%S %Y"];

/// Result of fetching one reference
#[derive(Debug)]
pub struct FetchResult {
    /// The reference exactly as it appeared in the document
    pub reference: String,

    /// What happened
    pub outcome: FetchOutcome,
}

/// Outcome of a fetch attempt
#[derive(Debug)]
pub enum FetchOutcome {
    /// The image was written to this path
    Fetched(PathBuf),

    /// The fetch failed; no file was left behind
    Failed(RehostError),
}

impl FetchResult {
    /// Returns the local path if the fetch succeeded
    pub fn local_path(&self) -> Option<&Path> {
        match &self.outcome {
            FetchOutcome::Fetched(path) => Some(path),
            FetchOutcome::Failed(_) => None,
        }
    }
}

/// Builds an HTTP client for fetching images
///
/// # Arguments
///
/// * `config` - The fetch configuration
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Failed to build client
pub fn build_http_client(config: &FetchConfig) -> Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(config.user_agent.clone())
        .timeout(Duration::from_secs(config.timeout_secs))
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Downloads images into a destination directory
#[derive(Debug, Clone)]
pub struct Fetcher {
    client: Client,
    dest_dir: PathBuf,
}

impl Fetcher {
    /// Creates a fetcher writing into `dest_dir`
    ///
    /// The directory is created on first use.
    pub fn new(client: Client, dest_dir: impl Into<PathBuf>) -> Self {
        Self {
            client,
            dest_dir: dest_dir.into(),
        }
    }

    /// Returns the destination directory
    pub fn dest_dir(&self) -> &Path {
        &self.dest_dir
    }

    /// Fetches a single reference
    ///
    /// # Request Flow
    ///
    /// 1. Parse the reference; only absolute http(s) URLs are accepted
    /// 2. Derive a file name from the last path segment (percent-decoded)
    /// 3. If it has no extension, send HEAD and map Content-Type to one
    /// 4. Send GET; a non-2xx status fails the fetch
    /// 5. Prefix the name with `YYYYMMDD_` from a valid `Last-Modified`
    /// 6. Reserve a free name in the destination directory and write the bytes
    ///
    /// Nothing is retried. Errors are returned inside the result, never raised.
    pub async fn fetch(&self, reference: &str) -> FetchResult {
        let outcome = match self.try_fetch(reference).await {
            Ok(path) => {
                tracing::debug!("Fetched {} -> {}", reference, path.display());
                FetchOutcome::Fetched(path)
            }
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", reference, e);
                FetchOutcome::Failed(e)
            }
        };

        FetchResult {
            reference: reference.to_string(),
            outcome,
        }
    }

    /// Fetches several references with at most `concurrency` in flight
    ///
    /// Results are returned in the same order as `references`.
    pub async fn fetch_all(&self, references: &[String], concurrency: usize) -> Vec<FetchResult> {
        stream::iter(references)
            .map(|reference| self.fetch(reference))
            .buffered(concurrency.max(1))
            .collect()
            .await
    }

    async fn try_fetch(&self, reference: &str) -> Result<PathBuf, RehostError> {
        let url = parse_reference(reference)?;

        let mut file_name = candidate_filename(&url);
        if split_extension(&file_name).1.is_empty() {
            let content_type = self.probe_content_type(&url).await?;
            let stem = if file_name.is_empty() {
                FALLBACK_STEM
            } else {
                file_name.as_str()
            };
            file_name = format!(
                "{}{}",
                stem,
                extension_for_content_type(content_type.as_deref().unwrap_or(""))
            );
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| RehostError::Network {
                url: reference.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(RehostError::HttpStatus {
                url: reference.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(prefix) = response
            .headers()
            .get(LAST_MODIFIED)
            .and_then(|v| v.to_str().ok())
            .and_then(date_prefix)
        {
            file_name = format!("{}_{}", prefix, file_name);
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| RehostError::Network {
                url: reference.to_string(),
                source,
            })?;

        self.persist(&file_name, &bytes).await
    }

    /// Sends a HEAD request and returns the Content-Type header, if any
    async fn probe_content_type(&self, url: &Url) -> Result<Option<String>, RehostError> {
        let response = self
            .client
            .head(url.clone())
            .send()
            .await
            .map_err(|source| RehostError::Network {
                url: url.to_string(),
                source,
            })?;

        Ok(response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string))
    }

    /// Writes `bytes` under the first free variant of `file_name`
    ///
    /// Names are reserved with create-new semantics, so concurrent fetches
    /// never share a path. A partially written file is removed.
    async fn persist(&self, file_name: &str, bytes: &[u8]) -> Result<PathBuf, RehostError> {
        tokio::fs::create_dir_all(&self.dest_dir)
            .await
            .map_err(|source| RehostError::Filesystem {
                path: self.dest_dir.clone(),
                source,
            })?;

        let (stem, ext) = split_extension(file_name);
        let mut counter = 0u32;

        loop {
            let name = if counter == 0 {
                file_name.to_string()
            } else {
                format!("{}_{}{}", stem, counter, ext)
            };
            let path = self.dest_dir.join(name);

            match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    let written = async {
                        file.write_all(bytes).await?;
                        file.flush().await
                    }
                    .await;

                    if let Err(source) = written {
                        drop(file);
                        let _ = tokio::fs::remove_file(&path).await;
                        return Err(RehostError::Filesystem { path, source });
                    }

                    return Ok(path);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => counter += 1,
                Err(source) => return Err(RehostError::Filesystem { path, source }),
            }
        }
    }
}

/// Parses a reference as an absolute http(s) URL
fn parse_reference(reference: &str) -> Result<Url, RehostError> {
    let unsupported = || RehostError::UnsupportedReference {
        reference: reference.to_string(),
    };

    let url = Url::parse(reference).map_err(|_| unsupported())?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(unsupported());
    }

    Ok(url)
}

/// Derives a file name from the last path segment of `url`
///
/// The segment is percent-decoded and characters that are unsafe in file
/// names are replaced with `_`. Returns an empty string when nothing usable
/// remains.
pub fn candidate_filename(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or("");

    let decoded = urlencoding::decode(segment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| segment.to_string());

    let sanitized: String = decoded
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let sanitized = sanitized.trim();
    if sanitized.trim_matches('.').is_empty() {
        return String::new();
    }

    sanitized.to_string()
}

/// Splits `name` into stem and extension (with its dot)
///
/// A leading dot does not start an extension, so `.hidden` has none.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(idx) if idx > 0 && idx + 1 < name.len() => (&name[..idx], &name[idx..]),
        _ => (name, ""),
    }
}

/// Maps a Content-Type value to a file extension
///
/// | Content-Type contains | Extension |
/// |-----------------------|-----------|
/// | `jpeg` or `jpg`       | `.jpg`    |
/// | `png`                 | `.png`    |
/// | `gif`                 | `.gif`    |
/// | `webp`                | `.webp`   |
/// | anything else         | `.jpg`    |
pub fn extension_for_content_type(content_type: &str) -> &'static str {
    let content_type = content_type.to_ascii_lowercase();
    if content_type.contains("jpeg") || content_type.contains("jpg") {
        ".jpg"
    } else if content_type.contains("png") {
        ".png"
    } else if content_type.contains("gif") {
        ".gif"
    } else if content_type.contains("webp") {
        ".webp"
    } else {
        ".jpg"
    }
}

/// Formats a `Last-Modified` value as `YYYYMMDD`, or `None` if it is malformed
///
/// Accepts the preferred IMF-fixdate form as well as the obsolete RFC 850
/// and asctime forms HTTP recipients must still understand.
pub fn date_prefix(last_modified: &str) -> Option<String> {
    let value = last_modified.trim();

    let date = DateTime::parse_from_rfc2822(value)
        .map(|dt| dt.naive_local())
        .ok()
        .or_else(|| {
            OBSOLETE_HTTP_DATES
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(value, format).ok())
        })?;

    Some(date.format("%Y%m%d").to_string())
}
