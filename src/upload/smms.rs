//! SM.MS image hosting backend
//!
//! Uploads go to `POST {endpoint}/upload` as multipart form data with the
//! file in the `smfile` field and the API token in the `Authorization`
//! header. The JSON reply looks like:
//!
//! ```text
//! {"success": true,  "code": "success", "data": {"url": "https://..."}}
//! {"success": false, "code": "image_repeated",
//!  "message": "Image upload repeated limit, this image exists at: https://...",
//!  "images": "https://..."}
//! ```

use crate::config::{resolve_smms_token, Config, SmmsConfig};
use crate::upload::traits::{existing_url_from_message, UploadOutcome, Uploader};
use crate::RehostError;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

const BACKEND_NAME: &str = "sm.ms";

/// Code SM.MS uses for duplicate content
const IMAGE_REPEATED: &str = "image_repeated";

#[derive(Debug, Deserialize)]
struct SmmsResponse {
    #[serde(default)]
    success: bool,

    #[serde(default)]
    code: String,

    #[serde(default)]
    message: String,

    #[serde(default)]
    data: Value,

    #[serde(default)]
    images: Value,
}

/// Uploader for the SM.MS image hosting API
pub struct SmmsUploader {
    client: Client,
    upload_url: String,
    api_token: String,
}

impl std::fmt::Debug for SmmsUploader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SmmsUploader")
            .field("upload_url", &self.upload_url)
            .field("api_token", &"[redacted]")
            .finish()
    }
}

impl SmmsUploader {
    /// Creates an uploader for the given API base URL
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the token is empty.
    pub fn new(client: Client, endpoint: &str, api_token: String) -> Result<Self, RehostError> {
        if api_token.trim().is_empty() {
            return Err(crate::ConfigError::MissingCredential(
                "SM.MS API token is empty".to_string(),
            )
            .into());
        }

        Ok(Self {
            client,
            upload_url: format!("{}/upload", endpoint.trim_end_matches('/')),
            api_token,
        })
    }

    /// Creates an uploader from the `[smms]` configuration section
    pub fn from_config(
        client: Client,
        config: &SmmsConfig,
        api_token: String,
    ) -> Result<Self, RehostError> {
        Self::new(client, &config.endpoint, api_token)
    }

    async fn try_upload(&self, local_path: &Path) -> Result<UploadOutcome, RehostError> {
        let bytes = tokio::fs::read(local_path)
            .await
            .map_err(|source| RehostError::Filesystem {
                path: local_path.to_path_buf(),
                source,
            })?;

        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        let form = Form::new().part("smfile", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(&self.upload_url)
            .header("Authorization", &self.api_token)
            .multipart(form)
            .send()
            .await
            .map_err(|source| RehostError::Network {
                url: self.upload_url.clone(),
                source,
            })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(self.rejected(format!("HTTP {}", status.as_u16())));
        }

        let body: SmmsResponse = response
            .json()
            .await
            .map_err(|e| self.rejected(format!("invalid response body: {}", e)))?;

        Ok(self.interpret(body))
    }

    /// Maps a decoded reply to an outcome
    fn interpret(&self, body: SmmsResponse) -> UploadOutcome {
        if body.success {
            return match body.data.get("url").and_then(Value::as_str) {
                Some(url) => UploadOutcome::Uploaded(url.to_string()),
                None => UploadOutcome::Failed(self.rejected("reply has no data.url".to_string())),
            };
        }

        let existing = body
            .images
            .as_str()
            .filter(|url| !url.is_empty())
            .map(str::to_string)
            .filter(|_| body.code == IMAGE_REPEATED)
            .or_else(|| existing_url_from_message(&body.message));

        match existing {
            Some(url) => UploadOutcome::AlreadyExists(url),
            None if body.message.is_empty() => {
                UploadOutcome::Failed(self.rejected(format!("upload refused ({})", body.code)))
            }
            None => UploadOutcome::Failed(self.rejected(body.message)),
        }
    }

    fn rejected(&self, message: String) -> RehostError {
        RehostError::Upload {
            backend: BACKEND_NAME.to_string(),
            message,
        }
    }
}

/// Builds the SM.MS uploader a configuration asks for
///
/// The token comes from `[smms]` or the `SMMS_API_TOKEN` environment
/// variable. A token from the environment alone uses the default endpoint.
///
/// # Returns
///
/// * `Ok(Some(uploader))` - A token was found
/// * `Ok(None)` - No `[smms]` section and no environment token (download-only)
/// * `Err(RehostError)` - `[smms]` is present but no token is set anywhere
pub fn smms_uploader(
    config: &Config,
    client: Client,
) -> Result<Option<Arc<dyn Uploader>>, RehostError> {
    let token = resolve_smms_token(config)?;
    Ok(uploader_for_token(config, token, client)?.map(|u| Arc::new(u) as Arc<dyn Uploader>))
}

fn uploader_for_token(
    config: &Config,
    token: Option<String>,
    client: Client,
) -> Result<Option<SmmsUploader>, RehostError> {
    let Some(token) = token else {
        return Ok(None);
    };

    let smms = config.smms.clone().unwrap_or_default();
    SmmsUploader::from_config(client, &smms, token).map(Some)
}

#[async_trait]
impl Uploader for SmmsUploader {
    fn name(&self) -> &str {
        BACKEND_NAME
    }

    /// SM.MS picks its own object names, so `remote_name` is only logged.
    async fn upload(&self, local_path: &Path, remote_name: &str) -> UploadOutcome {
        tracing::debug!(
            "Uploading {} to {} (as {})",
            local_path.display(),
            BACKEND_NAME,
            remote_name
        );

        match self.try_upload(local_path).await {
            Ok(outcome) => outcome,
            Err(e) => UploadOutcome::Failed(e),
        }
    }
}
