//! Image uploads for post images and profile pictures.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use thiserror::Error;

pub const DEFAULT_MEDIA_ENDPOINT: &str = "https://api.cloudinary.com";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MediaError {
    #[error("media host not configured")]
    NotConfigured,

    #[error("empty file")]
    EmptyFile,

    #[error("upload rejected with status {0}")]
    Rejected(u16),

    #[error("upload failed: {0}")]
    Transport(String),
}

#[async_trait]
pub trait MediaHost: Send + Sync {
    /// Store `bytes` and return the public https URL.
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, MediaError>;
}

/// Unsigned uploads to a Cloudinary-style host.
#[derive(Clone)]
pub struct CloudinaryHost {
    client: reqwest::Client,
    endpoint: String,
    cloud_name: String,
    upload_preset: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
}

impl CloudinaryHost {
    pub fn new(
        cloud_name: &str,
        upload_preset: &str,
        timeout: Duration,
    ) -> Result<Self, MediaError> {
        Self::with_endpoint(DEFAULT_MEDIA_ENDPOINT, cloud_name, upload_preset, timeout)
    }

    pub fn with_endpoint(
        endpoint: &str,
        cloud_name: &str,
        upload_preset: &str,
        timeout: Duration,
    ) -> Result<Self, MediaError> {
        if cloud_name.trim().is_empty() {
            return Err(MediaError::NotConfigured);
        }
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            cloud_name: cloud_name.trim().to_string(),
            upload_preset: upload_preset.to_string(),
        })
    }

    pub fn upload_url(&self) -> String {
        format!("{}/v1_1/{}/image/upload", self.endpoint, self.cloud_name)
    }
}

#[async_trait]
impl MediaHost for CloudinaryHost {
    async fn upload(&self, bytes: Vec<u8>, file_name: &str) -> Result<String, MediaError> {
        if bytes.is_empty() {
            return Err(MediaError::EmptyFile);
        }
        let size = bytes.len();
        let form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .part("file", Part::bytes(bytes).file_name(file_name.to_string()));

        let resp = self
            .client
            .post(self.upload_url())
            .multipart(form)
            .send()
            .await
            .map_err(|e| MediaError::Transport(e.to_string()))?;

        if !resp.status().is_success() {
            tracing::warn!(status = %resp.status(), file = %file_name, "Upload rejected");
            return Err(MediaError::Rejected(resp.status().as_u16()));
        }
        let body: UploadResponse = resp
            .json()
            .await
            .map_err(|e| MediaError::Transport(e.to_string()))?;
        tracing::debug!(size, url = %body.secure_url, "Uploaded image");
        Ok(body.secure_url)
    }
}
