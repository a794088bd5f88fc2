//! In-memory [`ForumApi`] for view tests.
//!
//! Access tokens are the caller's `UserId` rendered as a string, so a
//! test can act as any user without an identity provider.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use postspace_shared::wire::{CreatePostRequest, CreateProfileRequest, UpdateProfileRequest};
use postspace_shared::{children_of, validate, Coordinates, Post, PostId, Profile, UserId};
use tokio::sync::oneshot;

use crate::api::{ApiError, ForumApi};

#[derive(Default)]
pub(crate) struct FakeForum {
    state: Mutex<ForumState>,
}

#[derive(Default)]
struct ForumState {
    posts: Vec<Post>,
    profiles: Vec<Profile>,
    failures: VecDeque<ApiError>,
    gates: Vec<(Held, oneshot::Receiver<()>)>,
    calls: usize,
    clock: i64,
}

impl ForumState {
    fn next_time(&mut self) -> chrono::DateTime<Utc> {
        self.clock += 1;
        Utc::now() + Duration::milliseconds(self.clock)
    }
}

/// Read calls that a test can hold open with [`FakeForum::hold_next`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Held {
    RootList,
    Replies,
    AuthorPosts,
    ProfileByName,
    ProfileById,
}

pub(crate) fn user() -> UserId {
    UserId(uuid::Uuid::new_v4())
}

/// Yield until `forum` has seen at least `n` calls.
pub(crate) async fn wait_for_calls(forum: &FakeForum, n: usize) {
    while forum.calls() < n {
        tokio::task::yield_now().await;
    }
}

impl FakeForum {
    pub fn add_root(&self, title: &str, at: [f64; 3]) -> Post {
        let mut state = self.state.lock().unwrap();
        let post = Post {
            id: PostId::new(),
            title: title.to_string(),
            body: Some(format!("{title} body")),
            image_ref: None,
            author_id: user(),
            parent_id: None,
            coordinates: Some(Coordinates::from_array(at)),
            created_at: state.next_time(),
        };
        state.posts.push(post.clone());
        post
    }

    pub fn add_reply(&self, parent: PostId, author: UserId, text: &str) -> Post {
        let mut state = self.state.lock().unwrap();
        let post = Post {
            id: PostId::new(),
            title: String::new(),
            body: Some(text.to_string()),
            image_ref: None,
            author_id: author,
            parent_id: Some(parent),
            coordinates: None,
            created_at: state.next_time(),
        };
        state.posts.push(post.clone());
        post
    }

    pub fn add_profile(&self, id: UserId, username: &str) -> Profile {
        let mut state = self.state.lock().unwrap();
        let profile = Profile {
            id,
            username: username.to_string(),
            profile_picture: Some("https://img.example/old.png".into()),
            tag: None,
            bio: None,
            coordinates: None,
            created_at: state.next_time(),
        };
        state.profiles.push(profile.clone());
        profile
    }

    pub fn profile_by_name(&self, username: &str) -> Option<Profile> {
        let state = self.state.lock().unwrap();
        state.profiles.iter().find(|p| p.username == username).cloned()
    }

    /// The next call of any kind fails with `err`.
    pub fn fail_next(&self, err: ApiError) {
        self.state.lock().unwrap().failures.push_back(err);
    }

    /// The next `call` takes its snapshot immediately but only answers
    /// once the returned sender fires.
    pub fn hold_next(&self, call: Held) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.state.lock().unwrap().gates.push((call, rx));
        tx
    }

    pub fn calls(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    fn begin(&self) -> Result<(), ApiError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;
        match state.failures.pop_front() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    async fn answer<T>(&self, call: Held, snapshot: T) -> T {
        let gate = {
            let mut state = self.state.lock().unwrap();
            let held = state.gates.iter().position(|(c, _)| *c == call);
            held.map(|i| state.gates.remove(i).1)
        };
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        snapshot
    }

    fn caller(token: &str) -> Result<UserId, ApiError> {
        token
            .parse()
            .map_err(|_| ApiError::Unauthorized("invalid session".into()))
    }
}

#[async_trait]
impl ForumApi for FakeForum {
    async fn list_root_posts(&self) -> Result<Vec<Post>, ApiError> {
        self.begin()?;
        let roots: Vec<Post> = {
            let state = self.state.lock().unwrap();
            state.posts.iter().filter(|p| p.is_root()).cloned().collect()
        };
        Ok(self.answer(Held::RootList, roots).await)
    }

    async fn list_recent_posts(&self, limit: u32) -> Result<Vec<Post>, ApiError> {
        self.begin()?;
        let state = self.state.lock().unwrap();
        let mut posts = state.posts.clone();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        posts.truncate(limit as usize);
        Ok(posts)
    }

    async fn list_replies(&self, parent_id: PostId) -> Result<Vec<Post>, ApiError> {
        self.begin()?;
        let replies = children_of(&self.state.lock().unwrap().posts, parent_id);
        Ok(self.answer(Held::Replies, replies).await)
    }

    async fn list_posts_by_author(&self, author: UserId) -> Result<Vec<Post>, ApiError> {
        self.begin()?;
        let posts: Vec<Post> = {
            let state = self.state.lock().unwrap();
            state
                .posts
                .iter()
                .filter(|p| p.author_id == author)
                .cloned()
                .collect()
        };
        Ok(self.answer(Held::AuthorPosts, posts).await)
    }

    async fn create_post(&self, token: &str, req: &CreatePostRequest) -> Result<Post, ApiError> {
        self.begin()?;
        let author = Self::caller(token)?;
        let (title, text) = validate::root_post(&req.title, &req.text)?;
        let mut state = self.state.lock().unwrap();
        let post = Post {
            id: PostId::new(),
            title,
            body: Some(text),
            image_ref: req.image_url.clone(),
            author_id: author,
            parent_id: None,
            coordinates: Some(Coordinates::new(0.0, 0.0, 0.0)),
            created_at: state.next_time(),
        };
        state.posts.push(post.clone());
        Ok(post)
    }

    async fn create_reply(
        &self,
        token: &str,
        parent_id: PostId,
        text: &str,
    ) -> Result<Post, ApiError> {
        self.begin()?;
        let author = Self::caller(token)?;
        let text = validate::reply_text(text)?;
        if !self.state.lock().unwrap().posts.iter().any(|p| p.id == parent_id) {
            return Err(ApiError::NotFound("parent post not found".into()));
        }
        Ok(self.add_reply(parent_id, author, &text))
    }

    async fn get_profile(&self, username: &str) -> Result<Profile, ApiError> {
        self.begin()?;
        let found = self
            .profile_by_name(username)
            .ok_or_else(|| ApiError::NotFound("profile not found".into()));
        self.answer(Held::ProfileByName, found).await
    }

    async fn get_profile_by_id(&self, id: UserId) -> Result<Profile, ApiError> {
        self.begin()?;
        let found = {
            let state = self.state.lock().unwrap();
            state.profiles.iter().find(|p| p.id == id).cloned()
        };
        let found = found.ok_or_else(|| ApiError::NotFound("profile not found".into()));
        self.answer(Held::ProfileById, found).await
    }

    async fn create_profile(
        &self,
        token: &str,
        req: &CreateProfileRequest,
    ) -> Result<Profile, ApiError> {
        self.begin()?;
        let id = Self::caller(token)?;
        {
            let state = self.state.lock().unwrap();
            if state
                .profiles
                .iter()
                .any(|p| p.id == id || p.username == req.username)
            {
                return Err(ApiError::Conflict(
                    "username taken or profile already exists".into(),
                ));
            }
        }
        Ok(self.add_profile(id, &req.username))
    }

    async fn update_profile(
        &self,
        token: &str,
        req: &UpdateProfileRequest,
    ) -> Result<Profile, ApiError> {
        self.begin()?;
        let id = Self::caller(token)?;
        let mut state = self.state.lock().unwrap();
        let profile = state
            .profiles
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| ApiError::NotFound("profile not found".into()))?;
        let clear = |v: &String| (!v.is_empty()).then(|| v.clone());
        if let Some(name) = &req.username {
            profile.username = name.clone();
        }
        if let Some(pic) = &req.profile_picture {
            profile.profile_picture = clear(pic);
        }
        if let Some(tag) = &req.tag {
            profile.tag = clear(tag);
        }
        if let Some(bio) = &req.bio {
            profile.bio = clear(bio);
        }
        Ok(profile.clone())
    }
}
