//! Sign-up, sign-in and the process-wide session.
//!
//! Credentials only ever go to the identity provider. What the rest of
//! the client sees is a [`Session`] published through a
//! [`SessionContext`], which components receive explicitly and observe
//! through [`SessionSubscription`]s.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use postspace_shared::wire::{AuthUser, CreateProfileRequest};
use postspace_shared::{validate, Profile, UserId, ValidationError};
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::sync::watch;

use crate::api::{ApiError, ForumApi};
use crate::events::{ClientEvent, EventBus};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub access_token: String,
    pub user_id: UserId,
    pub email: Option<String>,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum AuthError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("account already exists")]
    AlreadyRegistered,

    #[error("identity provider unavailable: {0}")]
    Unavailable(String),

    #[error("could not create profile: {0}")]
    Profile(ApiError),
}

// ---------------------------------------------------------------------------
// Identity provider
// ---------------------------------------------------------------------------

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Register credentials. Returns the new identity.
    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    async fn get_user(&self, token: &str) -> Result<AuthUser, AuthError>;
}

/// GoTrue-compatible [`IdentityProvider`] (`/auth/v1/*`).
#[derive(Clone)]
pub struct GoTrueProvider {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    user: AuthUser,
}

/// `/signup` answers with the user, or with a session wrapping it when
/// email confirmation is disabled.
#[derive(Deserialize)]
#[serde(untagged)]
enum SignUpResponse {
    Session { user: AuthUser },
    User(AuthUser),
}

impl GoTrueProvider {
    pub fn new(
        base_url: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AuthError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let req = self
            .client
            .request(method, format!("{}/auth/v1{}", self.base_url, path));
        match &self.api_key {
            Some(key) => req.header("apikey", key),
            None => req,
        }
    }
}

fn unavailable(e: reqwest::Error) -> AuthError {
    AuthError::Unavailable(e.to_string())
}

#[async_trait]
impl IdentityProvider for GoTrueProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<UserId, AuthError> {
        let resp = self
            .request(reqwest::Method::POST, "/signup")
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        match resp.status() {
            s if s.is_success() => {
                let body: SignUpResponse = resp.json().await.map_err(unavailable)?;
                Ok(match body {
                    SignUpResponse::Session { user } | SignUpResponse::User(user) => user.id,
                })
            }
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Err(AuthError::AlreadyRegistered)
            }
            s => Err(AuthError::Unavailable(format!("signup answered {s}"))),
        }
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let resp = self
            .request(reqwest::Method::POST, "/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(unavailable)?;

        match resp.status() {
            s if s.is_success() => {
                let body: TokenResponse = resp.json().await.map_err(unavailable)?;
                Ok(Session {
                    access_token: body.access_token,
                    user_id: body.user.id,
                    email: body.user.email,
                })
            }
            s if s.is_client_error() => Err(AuthError::InvalidCredentials),
            s => Err(AuthError::Unavailable(format!("token answered {s}"))),
        }
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        let resp = self
            .request(reqwest::Method::POST, "/logout")
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        if resp.status().is_success() || resp.status() == StatusCode::UNAUTHORIZED {
            Ok(())
        } else {
            Err(AuthError::Unavailable(format!(
                "logout answered {}",
                resp.status()
            )))
        }
    }

    async fn get_user(&self, token: &str) -> Result<AuthUser, AuthError> {
        let resp = self
            .request(reqwest::Method::GET, "/user")
            .bearer_auth(token)
            .send()
            .await
            .map_err(unavailable)?;
        match resp.status() {
            s if s.is_success() => resp.json().await.map_err(unavailable),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(AuthError::InvalidCredentials),
            s => Err(AuthError::Unavailable(format!("user answered {s}"))),
        }
    }
}

// ---------------------------------------------------------------------------
// Session context
// ---------------------------------------------------------------------------

/// The signed-in session, if any, shared by every component of one
/// client.
#[derive(Debug, Clone)]
pub struct SessionContext {
    tx: Arc<watch::Sender<Option<Session>>>,
}

impl Default for SessionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionContext {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> Option<Session> {
        self.tx.borrow().clone()
    }

    pub fn access_token(&self) -> Option<String> {
        self.tx.borrow().as_ref().map(|s| s.access_token.clone())
    }

    pub fn set(&self, session: Option<Session>) {
        let signed_in = session.is_some();
        self.tx.send_replace(session);
        tracing::debug!(signed_in, "Session changed");
    }

    pub fn subscribe(&self) -> SessionSubscription {
        SessionSubscription {
            rx: self.tx.subscribe(),
        }
    }

    /// Live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Observer of a [`SessionContext`]. Dropping it unsubscribes.
#[derive(Debug)]
pub struct SessionSubscription {
    rx: watch::Receiver<Option<Session>>,
}

impl SessionSubscription {
    pub fn current(&self) -> Option<Session> {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. `None` once the context is gone.
    pub async fn changed(&mut self) -> Option<Option<Session>> {
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone())
    }
}

// ---------------------------------------------------------------------------
// Auth service
// ---------------------------------------------------------------------------

/// Account flows that combine the identity provider and the forum API.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn IdentityProvider>,
    api: Arc<dyn ForumApi>,
    session: SessionContext,
    events: EventBus,
}

impl AuthService {
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        api: Arc<dyn ForumApi>,
        session: SessionContext,
        events: EventBus,
    ) -> Self {
        Self {
            provider,
            api,
            session,
            events,
        }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Create an account and its profile, leaving the user signed in.
    ///
    /// Email and username are validated before anything is sent.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
        username: &str,
    ) -> Result<Profile, AuthError> {
        validate::email(email)?;
        let username = validate::username(username)?;
        validate::require_text("password", password)?;

        let user_id = self.provider.sign_up(email.trim(), password).await?;
        let session = self.provider.sign_in(email.trim(), password).await?;
        if session.user_id != user_id {
            tracing::warn!(
                signed_up = %user_id.short(),
                signed_in = %session.user_id.short(),
                "Identity changed between sign-up and sign-in"
            );
        }

        let req = CreateProfileRequest {
            username,
            ..Default::default()
        };
        let profile = self
            .api
            .create_profile(&session.access_token, &req)
            .await
            .map_err(AuthError::Profile)?;

        tracing::info!(user = %session.user_id.short(), username = %profile.username, "Registered");
        self.publish(Some(session));
        Ok(profile)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        validate::email(email)?;
        let session = self.provider.sign_in(email.trim(), password).await?;
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Restore a session from a stored access token.
    pub async fn resume(&self, token: &str) -> Result<Session, AuthError> {
        let user = self.provider.get_user(token).await?;
        let session = Session {
            access_token: token.to_string(),
            user_id: user.id,
            email: user.email,
        };
        self.publish(Some(session.clone()));
        Ok(session)
    }

    /// Always ends the local session, even if the provider cannot be
    /// reached.
    pub async fn sign_out(&self) {
        if let Some(token) = self.session.access_token() {
            if let Err(e) = self.provider.sign_out(&token).await {
                tracing::warn!(error = %e, "Remote sign-out failed");
            }
        }
        self.publish(None);
    }

    fn publish(&self, session: Option<Session>) {
        let signed_in = session.is_some();
        self.session.set(session);
        self.events.emit(ClientEvent::SessionChanged { signed_in });
    }
}
