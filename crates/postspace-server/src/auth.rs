//! Session verification against the identity provider.
//!
//! Write endpoints require `Authorization: Bearer <access token>`. The
//! token is resolved to a user by asking the provider's
//! `GET /auth/v1/user` endpoint; the server never sees passwords.

use std::time::Duration;

use async_trait::async_trait;
use axum::http::{header, HeaderMap, StatusCode};
use postspace_shared::wire::AuthUser;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,

    #[error("session rejected")]
    Rejected,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// Bearer token from the `Authorization` header, if present and
/// non-empty.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// [`SessionVerifier`] that asks a GoTrue-style identity provider.
#[derive(Clone)]
pub struct RemoteVerifier {
    client: reqwest::Client,
    user_url: String,
    api_key: Option<String>,
}

impl RemoteVerifier {
    pub fn new(
        auth_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: reqwest::Client::builder().timeout(timeout).build()?,
            user_url: format!("{}/auth/v1/user", auth_url.trim_end_matches('/')),
            api_key,
        })
    }
}

#[async_trait]
impl SessionVerifier for RemoteVerifier {
    async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
        let mut req = self.client.get(&self.user_url).bearer_auth(token);
        if let Some(key) = &self.api_key {
            req = req.header("apikey", key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        match resp.status() {
            s if s.is_success() => resp
                .json::<AuthUser>()
                .await
                .map_err(|e| AuthError::Unavailable(format!("invalid user payload: {e}"))),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::Rejected),
            s => Err(AuthError::Unavailable(format!("provider answered {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{routing::get, Json, Router};
    use postspace_shared::UserId;
    use serde_json::json;
    use uuid::Uuid;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc"));

        headers.insert(header::AUTHORIZATION, "Basic abc".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        headers.insert(header::AUTHORIZATION, "Bearer   ".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);
    }

    #[tokio::test]
    async fn test_remote_verifier_resolves_user() {
        let id = Uuid::new_v4();
        let app = Router::new().route(
            "/auth/v1/user",
            get(move |headers: HeaderMap| async move {
                let authorized = headers
                    .get(header::AUTHORIZATION)
                    .and_then(|v| v.to_str().ok())
                    == Some("Bearer good")
                    && headers.get("apikey").and_then(|v| v.to_str().ok()) == Some("anon");
                if authorized {
                    Ok(Json(json!({ "id": id, "email": "ada@example.com" })))
                } else {
                    Err(StatusCode::UNAUTHORIZED)
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let verifier = RemoteVerifier::new(
            &format!("http://{addr}"),
            Some("anon".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        let user = verifier.verify("good").await.unwrap();
        assert_eq!(user.id, UserId(id));
        assert!(matches!(
            verifier.verify("bad").await,
            Err(AuthError::Rejected)
        ));
    }
}
