//! Public profile page, addressed by username.

use std::sync::{Arc, Mutex, MutexGuard};

use postspace_shared::{PostTree, Profile};

use crate::api::{ApiError, ForumApi};
use crate::auth::Session;
use crate::lifetime::{RequestTracker, Ticket, ViewLifetime};
use crate::state::LoadState;

pub struct ProfileView {
    api: Arc<dyn ForumApi>,
    lifetime: ViewLifetime,
    username: String,
    profile: Mutex<LoadState<Profile>>,
    posts: Mutex<LoadState<PostTree>>,
    requests: RequestTracker,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ProfileView {
    pub fn new(api: Arc<dyn ForumApi>, username: &str, lifetime: ViewLifetime) -> Self {
        Self {
            api,
            lifetime,
            username: username.trim().to_string(),
            profile: Mutex::new(LoadState::Idle),
            posts: Mutex::new(LoadState::Idle),
            requests: RequestTracker::new(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn profile(&self) -> LoadState<Profile> {
        lock(&self.profile).clone()
    }

    /// The profile owner's posts and replies, as a tree.
    pub fn posts(&self) -> LoadState<PostTree> {
        lock(&self.posts).clone()
    }

    /// The username does not exist, as opposed to a failed lookup.
    pub fn is_not_found(&self) -> bool {
        matches!(lock(&self.profile).error(), Some(ApiError::NotFound(_)))
    }

    pub fn is_owned_by(&self, session: Option<&Session>) -> bool {
        match (session, lock(&self.profile).loaded()) {
            (Some(s), Some(p)) => s.user_id == p.id,
            _ => false,
        }
    }

    fn is_stale(&self, ticket: Ticket) -> bool {
        self.lifetime.is_cancelled() || !self.requests.is_current(ticket)
    }

    /// Load the profile, then the owner's posts. Posts are not fetched
    /// when the profile itself fails. Only the newest of overlapping
    /// loads writes anything.
    pub async fn load(&self) {
        let ticket = self.requests.begin();
        *lock(&self.profile) = LoadState::Loading;
        let result = self.api.get_profile(&self.username).await;
        if self.is_stale(ticket) {
            tracing::debug!(username = %self.username, "Dropping profile response");
            return;
        }

        let owner = match &result {
            Ok(profile) => Some(profile.id),
            Err(e) => {
                tracing::debug!(username = %self.username, error = %e, "Profile lookup failed");
                None
            }
        };
        *lock(&self.profile) = LoadState::from_result(result);

        let Some(owner) = owner else {
            *lock(&self.posts) = LoadState::Idle;
            return;
        };

        *lock(&self.posts) = LoadState::Loading;
        let posts = self.api.list_posts_by_author(owner).await;
        if self.is_stale(ticket) {
            tracing::debug!(username = %self.username, "Dropping profile posts response");
            return;
        }
        *lock(&self.posts) =
            LoadState::from_result(posts.map(|posts| PostTree::by_author(posts, owner)));
    }

    pub fn close(&self) {
        self.lifetime.cancel();
    }
}

impl Drop for ProfileView {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
