//! Profile settings for the signed-in user.

use std::sync::{Arc, Mutex, MutexGuard};

use postspace_shared::wire::UpdateProfileRequest;
use postspace_shared::{validate, Profile, ValidationError};
use thiserror::Error;

use crate::api::{ApiError, ForumApi};
use crate::auth::SessionContext;
use crate::events::{ClientEvent, EventBus};
use crate::media::{MediaError, MediaHost};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SettingsError {
    #[error("sign in to edit your profile")]
    NotSignedIn,

    #[error("this profile belongs to someone else")]
    NotOwner,

    #[error(transparent)]
    Invalid(#[from] ValidationError),

    #[error("picture upload failed: {0}")]
    Upload(#[from] MediaError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// A picture picked by the user, not yet uploaded.
#[derive(Debug, Clone)]
pub struct PictureUpload {
    pub bytes: Vec<u8>,
    pub file_name: String,
}

/// Editable fields. Blank tag or bio clears it.
#[derive(Debug, Clone, Default)]
pub struct SettingsForm {
    pub username: String,
    pub tag: String,
    pub bio: String,
    /// `None` keeps the current picture.
    pub picture: Option<PictureUpload>,
}

pub struct SettingsView {
    api: Arc<dyn ForumApi>,
    media: Arc<dyn MediaHost>,
    session: SessionContext,
    events: EventBus,
    profile: Mutex<Profile>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl SettingsView {
    pub fn new(
        api: Arc<dyn ForumApi>,
        media: Arc<dyn MediaHost>,
        session: SessionContext,
        events: EventBus,
        profile: Profile,
    ) -> Self {
        Self {
            api,
            media,
            session,
            events,
            profile: Mutex::new(profile),
        }
    }

    pub fn profile(&self) -> Profile {
        lock(&self.profile).clone()
    }

    /// Form pre-filled with the current values.
    pub fn form(&self) -> SettingsForm {
        let profile = lock(&self.profile);
        SettingsForm {
            username: profile.username.clone(),
            tag: profile.tag.clone().unwrap_or_default(),
            bio: profile.bio.clone().unwrap_or_default(),
            picture: None,
        }
    }

    /// Validate, upload the new picture if there is one, then update the
    /// profile. Nothing is uploaded or sent when validation fails.
    pub async fn save(&self, form: SettingsForm) -> Result<Profile, SettingsError> {
        let session = self.session.current().ok_or(SettingsError::NotSignedIn)?;
        let current = self.profile();
        if session.user_id != current.id {
            return Err(SettingsError::NotOwner);
        }

        let username = validate::username(&form.username)?;
        let tag = validate::tag(Some(&form.tag))?;
        let bio = validate::bio(Some(&form.bio))?;

        let profile_picture = match form.picture {
            Some(picture) => Some(
                self.media
                    .upload(picture.bytes, &picture.file_name)
                    .await?,
            ),
            None => None,
        };

        let req = UpdateProfileRequest {
            username: (username != current.username).then_some(username),
            profile_picture,
            tag: Some(tag.unwrap_or_default()),
            bio: Some(bio.unwrap_or_default()),
        };
        let updated = self
            .api
            .update_profile(&session.access_token, &req)
            .await?;

        tracing::info!(user = %updated.id.short(), "Profile saved");
        *lock(&self.profile) = updated.clone();
        self.events.emit(ClientEvent::ProfileSaved(updated.id));
        Ok(updated)
    }
}
