//! Gemini REST client: file upload, file state lookup and content generation.
//!
//! [`GenerativeBackend`] is the seam the analysis orchestrator talks to;
//! [`GeminiClient`] is the production implementation.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::config::GeminiConfig;

const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

// ============================================================================
// GenerativeBackend trait
// ============================================================================

/// Abstraction over the generative-AI provider.
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    /// Upload audio bytes under `display_name` and return the remote handle.
    async fn upload_media(
        &self,
        display_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<RemoteMedia, GeminiError>;

    /// Fetch the current state of a previously uploaded file.
    async fn media_status(&self, name: &str) -> Result<RemoteMedia, GeminiError>;

    /// Run the model over the uploaded file plus an instruction prompt. The
    /// response is returned untouched; text extraction happens downstream.
    async fn generate(&self, media: &RemoteMedia, prompt: &str) -> Result<Value, GeminiError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}

// ============================================================================
// Remote media handle
// ============================================================================

/// Lifecycle of an uploaded file on the provider side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(from = "String")]
pub enum MediaState {
    /// `STATE_UNSPECIFIED` and anything we do not recognise.
    #[default]
    Uploading,
    Processing,
    Ready,
    Failed,
}

impl From<String> for MediaState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PROCESSING" => MediaState::Processing,
            "ACTIVE" => MediaState::Ready,
            "FAILED" => MediaState::Failed,
            _ => MediaState::Uploading,
        }
    }
}

impl MediaState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaState::Uploading => "STATE_UNSPECIFIED",
            MediaState::Processing => "PROCESSING",
            MediaState::Ready => "ACTIVE",
            MediaState::Failed => "FAILED",
        }
    }
}

/// Provider-side reference to an uploaded file.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteMedia {
    /// `files/<id>`
    pub name: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub state: MediaState,
}

// ============================================================================
// Error types
// ============================================================================

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({code}): {message}")]
    Api { code: u16, message: String },

    #[error("Missing API key")]
    MissingApiKey,

    #[error("Upload session did not return an upload URL")]
    MissingUploadUrl,
}

// ============================================================================
// Gemini API structs (private)
// ============================================================================

#[derive(Debug, Serialize)]
struct UploadStart<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Debug, Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteMedia,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Part<'a> {
    File {
        #[serde(rename = "fileData")]
        file_data: FileData<'a>,
    },
    Text {
        text: &'a str,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: Option<GeminiErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    code: u16,
    message: String,
}

// ============================================================================
// GeminiClient
// ============================================================================

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    config: GeminiConfig,
}

impl GeminiClient {
    pub fn new(config: GeminiConfig) -> Result<Self, GeminiError> {
        if config.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()?;

        Ok(Self { client, config })
    }

    /// Point the client at another host (mock servers in tests).
    pub fn with_base_url(mut config: GeminiConfig, base_url: String) -> Result<Self, GeminiError> {
        config.base_url = base_url;
        Self::new(config)
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version,
            path
        )
    }

    async fn start_upload(&self, display_name: &str, mime_type: &str, len: usize) -> Result<String, GeminiError> {
        let url = format!(
            "{}/upload/{}/files",
            self.config.base_url.trim_end_matches('/'),
            self.config.api_version
        );

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", len.to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStart {
                file: UploadMetadata { display_name },
            })
            .send()
            .await?;

        let response = check_status(response).await?;
        upload_url(response.headers())
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn upload_media(
        &self,
        display_name: &str,
        bytes: Vec<u8>,
        mime_type: &str,
    ) -> Result<RemoteMedia, GeminiError> {
        let upload_url = self.start_upload(display_name, mime_type, bytes.len()).await?;

        let response = self
            .client
            .post(&upload_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;

        let uploaded: UploadResponse = check_status(response).await?.json().await?;
        tracing::info!(
            file = %uploaded.file.name,
            state = uploaded.file.state.as_str(),
            "Uploaded audio to Gemini"
        );
        Ok(uploaded.file)
    }

    async fn media_status(&self, name: &str) -> Result<RemoteMedia, GeminiError> {
        let response = self
            .client
            .get(self.api_url(name))
            .query(&[("key", self.config.api_key.as_str())])
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    async fn generate(&self, media: &RemoteMedia, prompt: &str) -> Result<Value, GeminiError> {
        let url = self.api_url(&format!("models/{}:generateContent", self.config.model));

        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    Part::File {
                        file_data: FileData {
                            mime_type: &media.mime_type,
                            file_uri: &media.uri,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
            },
        };

        let response = self
            .client
            .post(&url)
            .query(&[("key", self.config.api_key.as_str())])
            .json(&request)
            .send()
            .await?;

        Ok(check_status(response).await?.json().await?)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Turn a non-2xx response into `GeminiError::Api`, preferring the structured
/// error body when the API sends one.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, GeminiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_body = response.text().await.unwrap_or_default();
    let error_detail = serde_json::from_str::<GeminiErrorResponse>(&error_body)
        .ok()
        .and_then(|e| e.error);

    let (code, message) = error_detail
        .map(|e| (e.code, e.message))
        .unwrap_or((status.as_u16(), error_body));

    tracing::error!(code = code, message = %message, "Gemini API error");

    Err(GeminiError::Api { code, message })
}

fn upload_url(headers: &HeaderMap) -> Result<String, GeminiError> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .ok_or(GeminiError::MissingUploadUrl)
}

// ============================================================================
// TESTS
// ============================================================================
