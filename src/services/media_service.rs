use async_trait::async_trait;
use bytes::Bytes;
use reqwest::Client;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, warn};

use crate::models::inbound_message::MediaRef;
use crate::services::conversation_flow::StoredCv;

#[derive(Debug, thiserror::Error)]
pub enum MediaError {
    #[error("message carries no media reference")]
    MissingReference,
    #[error("media credentials are not configured")]
    MissingAuth,
    #[error("media endpoint answered with status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("media id {0} could not be resolved to a URL")]
    Unresolvable(String),
    #[error("downloaded file is not a PDF")]
    NotPdf,
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<reqwest::Error> for MediaError {
    fn from(err: reqwest::Error) -> Self {
        MediaError::Network(err.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct FetchedMedia {
    pub bytes: Bytes,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, MediaError>;
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes `bytes` under a fresh key ending in `.{extension}` and returns the key.
    async fn persist(&self, bytes: &[u8], extension: &str) -> Result<String, MediaError>;
    async fn remove(&self, key: &str);
}

#[derive(Debug, Clone)]
pub enum MediaAuth {
    Bearer(String),
    Basic { username: String, password: String },
}

/// Downloads attachments from the provider's media endpoints.
#[derive(Clone)]
pub struct HttpMediaFetcher {
    client: Client,
    graph_api_base: String,
    graph_token: Option<String>,
    url_auth: Option<MediaAuth>,
}

#[derive(Debug, Deserialize)]
struct MediaUrlResponse {
    url: Option<String>,
}

impl HttpMediaFetcher {
    pub fn new(
        client: Client,
        graph_api_base: String,
        graph_token: Option<String>,
        url_auth: Option<MediaAuth>,
    ) -> Self {
        Self {
            client,
            graph_api_base: graph_api_base.trim_end_matches('/').to_string(),
            graph_token,
            url_auth,
        }
    }

    async fn resolve(&self, media_id: &str) -> Result<String, MediaError> {
        let token = self.graph_token.as_ref().ok_or(MediaError::MissingAuth)?;
        let resp = self
            .client
            .get(format!("{}/{}", self.graph_api_base, media_id))
            .bearer_auth(token)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(MediaError::Status(resp.status().as_u16()));
        }
        let body: MediaUrlResponse = resp.json().await?;
        body.url
            .filter(|url| !url.is_empty())
            .ok_or_else(|| MediaError::Unresolvable(media_id.to_string()))
    }

    async fn download(&self, url: &str, auth: &MediaAuth) -> Result<FetchedMedia, MediaError> {
        let request = match auth {
            MediaAuth::Bearer(token) => self.client.get(url).bearer_auth(token),
            MediaAuth::Basic { username, password } => {
                self.client.get(url).basic_auth(username, Some(password))
            }
        };
        let resp = request.send().await?;
        if !resp.status().is_success() {
            return Err(MediaError::Status(resp.status().as_u16()));
        }
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = resp.bytes().await?;
        Ok(FetchedMedia { bytes, content_type })
    }
}

#[async_trait]
impl MediaFetcher for HttpMediaFetcher {
    async fn fetch(&self, media: &MediaRef) -> Result<FetchedMedia, MediaError> {
        match media {
            MediaRef::ProviderId(id) => {
                let url = self.resolve(id).await?;
                let token = self.graph_token.clone().ok_or(MediaError::MissingAuth)?;
                self.download(&url, &MediaAuth::Bearer(token)).await
            }
            MediaRef::Url(url) => {
                let auth = self.url_auth.as_ref().ok_or(MediaError::MissingAuth)?;
                self.download(url, auth).await
            }
        }
    }
}

/// Stores blobs on the local filesystem under `<root>/cv/`.
#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn persist(&self, bytes: &[u8], extension: &str) -> Result<String, MediaError> {
        let dir = self.root.join("cv");
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| MediaError::Storage(e.to_string()))?;

        let key = format!("cv/{}.{}", uuid::Uuid::new_v4(), extension);
        fs::write(self.root.join(&key), bytes).await.map_err(|e| {
            tracing::error!("Failed to write CV file: {}", e);
            MediaError::Storage(e.to_string())
        })?;
        Ok(key)
    }

    async fn remove(&self, key: &str) {
        if let Err(e) = fs::remove_file(self.root.join(key)).await {
            warn!(key, error = %e, "failed to remove stored blob");
        }
    }
}

/// Maps a declared content type to a file extension. PDF is the fallback.
pub fn extension_for(content_type: Option<&str>, force_pdf: bool) -> &'static str {
    if force_pdf {
        return "pdf";
    }
    let ct = content_type.unwrap_or_default().to_ascii_lowercase();
    if ct.contains("image") {
        if ct.contains("png") {
            "png"
        } else {
            "jpg"
        }
    } else if ct.contains("application/pdf") {
        "pdf"
    } else if ct.contains("word") || ct.contains("document") {
        "docx"
    } else {
        "pdf"
    }
}

pub fn display_filename(sender: &str, extension: &str) -> String {
    let digits: String = sender.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        format!("cv_attachment.{}", extension)
    } else {
        format!("cv_{}.{}", digits, extension)
    }
}

/// Fetches an attachment and persists it as a CV blob.
#[derive(Clone)]
pub struct MediaIntake {
    fetcher: std::sync::Arc<dyn MediaFetcher>,
    store: std::sync::Arc<dyn BlobStore>,
}

impl MediaIntake {
    pub fn new(fetcher: std::sync::Arc<dyn MediaFetcher>, store: std::sync::Arc<dyn BlobStore>) -> Self {
        Self { fetcher, store }
    }

    /// One attempt, no retries. PDF is enforced on the downloaded bytes.
    pub async fn store_cv(&self, media: Option<&MediaRef>, sender: &str) -> Result<StoredCv, MediaError> {
        let media = media.ok_or(MediaError::MissingReference)?;
        let fetched = self.fetcher.fetch(media).await?;
        if !fetched.bytes.starts_with(b"%PDF") {
            return Err(MediaError::NotPdf);
        }
        let extension = extension_for(fetched.content_type.as_deref(), true);
        let storage_key = self.store.persist(&fetched.bytes, extension).await?;
        info!(sender, storage_key = %storage_key, size = fetched.bytes.len(), "stored CV");
        Ok(StoredCv {
            storage_key,
            display_filename: display_filename(sender, extension),
        })
    }

    pub async fn discard(&self, key: &str) {
        self.store.remove(key).await;
    }
}
