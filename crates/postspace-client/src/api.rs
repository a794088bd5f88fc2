//! Typed access to the postspace HTTP API.
//!
//! Views only see the [`ForumApi`] trait. [`HttpForumApi`] is the real
//! implementation; tests substitute in-memory fakes. Every failure is
//! folded into one [`ApiError`] case so views can decide uniformly
//! whether to offer a retry.

use std::time::Duration;

use async_trait::async_trait;
use postspace_shared::wire::{
    CreatePostRequest, CreatePostResponse, CreateProfileRequest, CreateReplyRequest, ErrorBody,
    UpdateProfileRequest,
};
use postspace_shared::{Post, PostId, Profile, UserId, ValidationError};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ApiError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),
}

impl ApiError {
    /// Only transient failures are worth retrying unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Transient(_))
    }

    pub fn from_status(status: StatusCode, message: String) -> Self {
        match status.as_u16() {
            400 | 422 => ApiError::Validation(message),
            401 | 403 => ApiError::Unauthorized(message),
            404 => ApiError::NotFound(message),
            409 => ApiError::Conflict(message),
            429 => ApiError::Transient(message),
            s if s >= 500 => ApiError::Transient(message),
            _ => ApiError::Validation(message),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e.to_string())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ApiError::Transient("request timed out".to_string())
        } else {
            ApiError::Transient(e.to_string())
        }
    }
}

#[async_trait]
pub trait ForumApi: Send + Sync {
    async fn list_root_posts(&self) -> Result<Vec<Post>, ApiError>;

    /// Newest posts of any kind, most recent first.
    async fn list_recent_posts(&self, limit: u32) -> Result<Vec<Post>, ApiError>;

    /// Direct replies of `parent_id`, oldest first.
    async fn list_replies(&self, parent_id: PostId) -> Result<Vec<Post>, ApiError>;

    async fn list_posts_by_author(&self, author: UserId) -> Result<Vec<Post>, ApiError>;

    async fn create_post(&self, token: &str, req: &CreatePostRequest) -> Result<Post, ApiError>;

    async fn create_reply(
        &self,
        token: &str,
        parent_id: PostId,
        text: &str,
    ) -> Result<Post, ApiError>;

    async fn get_profile(&self, username: &str) -> Result<Profile, ApiError>;

    async fn get_profile_by_id(&self, id: UserId) -> Result<Profile, ApiError>;

    async fn create_profile(
        &self,
        token: &str,
        req: &CreateProfileRequest,
    ) -> Result<Profile, ApiError>;

    /// Update the profile of whoever `token` belongs to. There is no way
    /// to name another user's profile.
    async fn update_profile(
        &self,
        token: &str,
        req: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError>;
}

/// [`ForumApi`] over HTTP.
#[derive(Clone)]
pub struct HttpForumApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpForumApi {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let resp = self.client.get(self.url(path)).query(query).send().await?;
        decode(resp).await
    }

    async fn post_json<B: Serialize + Sync, T: DeserializeOwned>(
        &self,
        path: &str,
        token: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(token)
            .json(body)
            .send()
            .await?;
        decode(resp).await
    }
}

/// Turn a response into `T`, or into the matching [`ApiError`] using the
/// server's `{ "error": ... }` body when there is one.
async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<T>()
            .await
            .map_err(|e| ApiError::Transient(format!("invalid response body: {e}")));
    }

    let text = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ErrorBody>(&text)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        });
    tracing::debug!(status = %status, message = %message, "API request failed");
    Err(ApiError::from_status(status, message))
}

#[async_trait]
impl ForumApi for HttpForumApi {
    async fn list_root_posts(&self) -> Result<Vec<Post>, ApiError> {
        self.get_json("/api/posts", &[]).await
    }

    async fn list_recent_posts(&self, limit: u32) -> Result<Vec<Post>, ApiError> {
        self.get_json("/api/posts/recent", &[("limit", limit.to_string())])
            .await
    }

    async fn list_replies(&self, parent_id: PostId) -> Result<Vec<Post>, ApiError> {
        self.get_json("/api/get_replys", &[("parent_id", parent_id.to_string())])
            .await
    }

    async fn list_posts_by_author(&self, author: UserId) -> Result<Vec<Post>, ApiError> {
        self.get_json(&format!("/api/profile/{author}/posts"), &[])
            .await
    }

    async fn create_post(&self, token: &str, req: &CreatePostRequest) -> Result<Post, ApiError> {
        let resp: CreatePostResponse = self.post_json("/api/post", token, req).await?;
        Ok(resp.post)
    }

    async fn create_reply(
        &self,
        token: &str,
        parent_id: PostId,
        text: &str,
    ) -> Result<Post, ApiError> {
        let body = CreateReplyRequest {
            parent_id,
            text: text.to_string(),
        };
        self.post_json("/api/reply", token, &body).await
    }

    async fn get_profile(&self, username: &str) -> Result<Profile, ApiError> {
        self.get_json("/api/get-profile", &[("username", username.to_string())])
            .await
    }

    async fn get_profile_by_id(&self, id: UserId) -> Result<Profile, ApiError> {
        self.get_json(&format!("/api/profile/{id}"), &[]).await
    }

    async fn create_profile(
        &self,
        token: &str,
        req: &CreateProfileRequest,
    ) -> Result<Profile, ApiError> {
        self.post_json("/api/create_profile", token, req).await
    }

    async fn update_profile(
        &self,
        token: &str,
        req: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError> {
        tracing::debug!("Updating own profile");
        self.post_json("/api/update_profile", token, req).await
    }
}
