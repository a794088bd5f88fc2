//! Detail view of one post and its direct replies.
//!
//! A [`ThreadView`] shows a post, the profile summary of whoever wrote
//! it, and its replies in creation order. Expanding a reply opens a
//! nested view on a child lifetime, so closing the outer view also
//! silences every nested one.

use std::sync::{Arc, Mutex, MutexGuard};

use postspace_shared::{validate, Post, PostId, ValidationError};
use thiserror::Error;

use crate::api::{ApiError, ForumApi};
use crate::auth::SessionContext;
use crate::events::{ClientEvent, EventBus};
use crate::lifetime::{RequestTracker, ViewLifetime};
use crate::state::LoadState;

/// Shown in place of the poster when their profile cannot be loaded.
pub const MISSING_PROFILE_LABEL: &str = "no profile found";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PosterSummary {
    Found {
        username: String,
        profile_picture: Option<String>,
    },
    Missing,
}

impl PosterSummary {
    pub fn label(&self) -> &str {
        match self {
            PosterSummary::Found { username, .. } => username,
            PosterSummary::Missing => MISSING_PROFILE_LABEL,
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReplyError {
    #[error("reply text is empty")]
    Empty,

    #[error(transparent)]
    Invalid(ValidationError),

    #[error("sign in to reply")]
    NotSignedIn,

    #[error(transparent)]
    Api(#[from] ApiError),
}

/// Everything a thread view needs besides the post itself.
#[derive(Clone)]
pub struct ThreadContext {
    pub api: Arc<dyn ForumApi>,
    pub session: SessionContext,
    pub events: EventBus,
}

pub struct ThreadView {
    ctx: ThreadContext,
    post: Post,
    lifetime: ViewLifetime,
    replies: Mutex<LoadState<Vec<Post>>>,
    poster: Mutex<LoadState<PosterSummary>>,
    /// Replies posted from this view, kept so a listing that was
    /// already in flight when they were created still shows them.
    posted: Mutex<Vec<Post>>,
    requests: RequestTracker,
    poster_requests: RequestTracker,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl ThreadView {
    /// Create the view without fetching anything yet.
    pub fn new(ctx: ThreadContext, post: Post, lifetime: ViewLifetime) -> Self {
        Self {
            ctx,
            post,
            lifetime,
            replies: Mutex::new(LoadState::Idle),
            poster: Mutex::new(LoadState::Idle),
            posted: Mutex::new(Vec::new()),
            requests: RequestTracker::new(),
            poster_requests: RequestTracker::new(),
        }
    }

    /// Create the view and load replies and poster together.
    pub async fn open(ctx: ThreadContext, post: Post, lifetime: ViewLifetime) -> Self {
        let view = Self::new(ctx, post, lifetime);
        tokio::join!(view.load(), view.load_poster());
        view
    }

    pub fn post(&self) -> &Post {
        &self.post
    }

    pub fn lifetime(&self) -> &ViewLifetime {
        &self.lifetime
    }

    pub fn replies(&self) -> LoadState<Vec<Post>> {
        lock(&self.replies).clone()
    }

    pub fn poster(&self) -> LoadState<PosterSummary> {
        lock(&self.poster).clone()
    }

    pub async fn load(&self) {
        let ticket = self.requests.begin();
        *lock(&self.replies) = LoadState::Loading;

        let result = self.ctx.api.list_replies(self.post.id).await;

        if self.lifetime.is_cancelled() || !self.requests.is_current(ticket) {
            tracing::debug!(post = %self.post.id, "Dropping replies response");
            return;
        }
        let result = result.map(|mut replies| {
            for reply in lock(&self.posted).iter() {
                if !replies.iter().any(|r| r.id == reply.id) {
                    replies.push(reply.clone());
                }
            }
            replies
        });
        if let Err(e) = &result {
            tracing::warn!(post = %self.post.id, error = %e, "Failed to load replies");
        }
        *lock(&self.replies) = LoadState::from_result(result);
    }

    /// Reload after a retryable failure. Returns whether a retry ran.
    pub async fn retry(&self) -> bool {
        if !lock(&self.replies).can_retry() {
            return false;
        }
        self.load().await;
        true
    }

    pub async fn load_poster(&self) {
        let ticket = self.poster_requests.begin();
        *lock(&self.poster) = LoadState::Loading;
        let summary = match self.ctx.api.get_profile_by_id(self.post.author_id).await {
            Ok(profile) => PosterSummary::Found {
                username: profile.username,
                profile_picture: profile.profile_picture,
            },
            Err(e) => {
                tracing::debug!(author = %self.post.author_id.short(), error = %e, "No poster profile");
                PosterSummary::Missing
            }
        };
        if self.lifetime.is_cancelled() || !self.poster_requests.is_current(ticket) {
            return;
        }
        *lock(&self.poster) = LoadState::Loaded(summary);
    }

    /// Post a reply to this view's post as the signed-in user.
    ///
    /// Blank text and a missing session fail before any request. On
    /// success the reply is appended to the loaded replies, or to the
    /// result of a listing still in flight.
    pub async fn submit_reply(&self, text: &str) -> Result<Post, ReplyError> {
        let text = validate::reply_text(text).map_err(|e| match e {
            ValidationError::MissingField(_) => ReplyError::Empty,
            other => ReplyError::Invalid(other),
        })?;
        let token = self
            .ctx
            .session
            .access_token()
            .ok_or(ReplyError::NotSignedIn)?;

        let reply = self
            .ctx
            .api
            .create_reply(&token, self.post.id, &text)
            .await?;

        if self.lifetime.is_cancelled() {
            return Ok(reply);
        }
        lock(&self.posted).push(reply.clone());
        if let LoadState::Loaded(replies) = &mut *lock(&self.replies) {
            if !replies.iter().any(|r| r.id == reply.id) {
                replies.push(reply.clone());
            }
        }
        self.ctx.events.emit(ClientEvent::ReplyPosted {
            parent_id: self.post.id,
            reply_id: reply.id,
        });
        Ok(reply)
    }

    /// Nested view for one of the loaded replies.
    pub fn expand(&self, reply_id: PostId) -> Option<ThreadView> {
        let reply = lock(&self.replies)
            .loaded()?
            .iter()
            .find(|r| r.id == reply_id)
            .cloned()?;
        Some(ThreadView::new(
            self.ctx.clone(),
            reply,
            self.lifetime.child(),
        ))
    }

    pub fn close(&self) {
        if !self.lifetime.is_cancelled() {
            self.lifetime.cancel();
            self.ctx.events.emit(ClientEvent::ThreadClosed(self.post.id));
        }
    }
}

impl Drop for ThreadView {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
