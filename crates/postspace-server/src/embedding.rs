//! Client for the embedding service.
//!
//! The service maps a post's title and text to a point in 3D space:
//! `POST {base}/embed-only {"title", "text"} -> {"coordinates": [x, y, z]}`.
//! Every call is bounded by the configured timeout, so post creation
//! never waits on the service indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use postspace_shared::constants::EMBED_ONLY_PATH;
use postspace_shared::Coordinates;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("embedding service answered {0}")]
    Status(u16),

    #[error("invalid embedding response: {0}")]
    InvalidResponse(String),
}

/// Anything that can place a post in the shared space.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, title: &str, text: &str) -> Result<Coordinates, EmbedError>;
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    title: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    coordinates: Vec<f64>,
}

/// [`Embedder`] backed by the HTTP embedding service.
#[derive(Clone)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpEmbedder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: format!("{}{}", base_url.trim_end_matches('/'), EMBED_ONLY_PATH),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, title: &str, text: &str) -> Result<Coordinates, EmbedError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&EmbedRequest { title, text })
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(EmbedError::Status(resp.status().as_u16()));
        }

        let body: EmbedResponse = resp
            .json()
            .await
            .map_err(|e| EmbedError::InvalidResponse(e.to_string()))?;

        let coords: [f64; 3] = body.coordinates.as_slice().try_into().map_err(|_| {
            EmbedError::InvalidResponse(format!(
                "expected 3 coordinates, got {}",
                body.coordinates.len()
            ))
        })?;
        let coords = Coordinates::from_array(coords);
        if !coords.is_finite() {
            return Err(EmbedError::InvalidResponse("non-finite coordinate".into()));
        }

        tracing::debug!(x = coords.x, y = coords.y, z = coords.z, "Post embedded");
        Ok(coords)
    }
}
