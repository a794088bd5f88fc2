//! Client wiring shared by every view.
//!
//! [`ForumClient`] owns the API client, identity provider, media host,
//! session context and event bus, and hands views the pieces they need.
//! There is no global state: a host builds one `ForumClient` and passes
//! it around.

use std::sync::Arc;

use postspace_shared::Profile;
use thiserror::Error;

use crate::api::{ApiError, ForumApi, HttpForumApi};
use crate::auth::{AuthError, AuthService, GoTrueProvider, IdentityProvider, SessionContext};
use crate::board::BoardView;
use crate::canvas::PlotCanvas;
use crate::config::ClientConfig;
use crate::events::EventBus;
use crate::lifetime::ViewLifetime;
use crate::media::{CloudinaryHost, MediaError, MediaHost};
use crate::profile::ProfileView;
use crate::settings::SettingsView;
use crate::thread::ThreadContext;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("API client: {0}")]
    Api(#[from] ApiError),

    #[error("identity provider: {0}")]
    Auth(#[from] AuthError),

    #[error("media host: {0}")]
    Media(#[from] MediaError),
}

#[derive(Clone)]
pub struct ForumClient {
    api: Arc<dyn ForumApi>,
    media: Option<Arc<dyn MediaHost>>,
    auth: AuthService,
    session: SessionContext,
    events: EventBus,
}

impl ForumClient {
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let api: Arc<dyn ForumApi> =
            Arc::new(HttpForumApi::new(&config.api_url, config.request_timeout)?);
        let provider: Arc<dyn IdentityProvider> = Arc::new(GoTrueProvider::new(
            &config.auth_url,
            config.auth_api_key.clone(),
            config.request_timeout,
        )?);
        let media: Option<Arc<dyn MediaHost>> = match &config.media_cloud_name {
            Some(cloud) => Some(Arc::new(CloudinaryHost::new(
                cloud,
                &config.media_upload_preset,
                config.request_timeout,
            )?)),
            None => {
                tracing::info!("No media host configured, picture uploads disabled");
                None
            }
        };
        tracing::info!(api = %config.api_url, auth = %config.auth_url, "Client configured");
        Ok(Self::with_parts(api, provider, media))
    }

    pub fn with_parts(
        api: Arc<dyn ForumApi>,
        provider: Arc<dyn IdentityProvider>,
        media: Option<Arc<dyn MediaHost>>,
    ) -> Self {
        let session = SessionContext::new();
        let events = EventBus::default();
        let auth = AuthService::new(provider, api.clone(), session.clone(), events.clone());
        Self {
            api,
            media,
            auth,
            session,
            events,
        }
    }

    pub fn api(&self) -> Arc<dyn ForumApi> {
        self.api.clone()
    }

    pub fn auth(&self) -> &AuthService {
        &self.auth
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn thread_context(&self) -> ThreadContext {
        ThreadContext {
            api: self.api.clone(),
            session: self.session.clone(),
            events: self.events.clone(),
        }
    }

    pub fn board(&self) -> Arc<BoardView> {
        Arc::new(BoardView::new(
            self.api.clone(),
            self.events.clone(),
            ViewLifetime::new(),
        ))
    }

    /// Board plus plot canvas of the given pixel size.
    pub fn canvas(&self, width: u32, height: u32) -> PlotCanvas {
        PlotCanvas::new(self.board(), self.thread_context(), width, height)
    }

    pub fn profile_view(&self, username: &str) -> ProfileView {
        ProfileView::new(self.api.clone(), username, ViewLifetime::new())
    }

    /// Settings need a media host for picture uploads.
    pub fn settings_view(&self, profile: Profile) -> Result<SettingsView, ClientError> {
        let media = self.media.clone().ok_or(MediaError::NotConfigured)?;
        Ok(SettingsView::new(
            self.api.clone(),
            media,
            self.session.clone(),
            self.events.clone(),
            profile,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_default_config() {
        let client = ForumClient::from_config(&ClientConfig::default()).unwrap();
        assert!(client.session().current().is_none());
        assert!(client.media.is_none());
    }

    #[tokio::test]
    async fn test_settings_require_media_host() {
        let client = ForumClient::from_config(&ClientConfig::default()).unwrap();
        let profile = Profile {
            id: crate::testing::user(),
            username: "ada".into(),
            profile_picture: None,
            tag: None,
            bio: None,
            coordinates: None,
            created_at: chrono::Utc::now(),
        };
        assert!(matches!(
            client.settings_view(profile),
            Err(ClientError::Media(MediaError::NotConfigured))
        ));
    }

    #[tokio::test]
    async fn test_views_share_session() {
        let mut config = ClientConfig::default();
        config.media_cloud_name = Some("demo".into());
        let client = ForumClient::from_config(&config).unwrap();
        let sub = client.session().subscribe();
        let _canvas = client.canvas(640, 480);
        assert_eq!(client.session().subscriber_count(), 1);
        drop(sub);
        assert_eq!(client.session().subscriber_count(), 0);
    }
}
