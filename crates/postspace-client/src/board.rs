//! The board: every root post, plus the newest-posts strip.

use std::sync::{Arc, Mutex, MutexGuard};

use postspace_shared::constants::{DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use postspace_shared::{Post, PostId};

use crate::api::ForumApi;
use crate::events::{ClientEvent, EventBus};
use crate::lifetime::{RequestTracker, ViewLifetime};
use crate::state::LoadState;

pub struct BoardView {
    api: Arc<dyn ForumApi>,
    events: EventBus,
    lifetime: ViewLifetime,
    roots: Mutex<LoadState<Vec<Post>>>,
    recent: Mutex<LoadState<Vec<Post>>>,
    roots_requests: RequestTracker,
    recent_requests: RequestTracker,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl BoardView {
    pub fn new(api: Arc<dyn ForumApi>, events: EventBus, lifetime: ViewLifetime) -> Self {
        Self {
            api,
            events,
            lifetime,
            roots: Mutex::new(LoadState::Idle),
            recent: Mutex::new(LoadState::Idle),
            roots_requests: RequestTracker::new(),
            recent_requests: RequestTracker::new(),
        }
    }

    pub fn lifetime(&self) -> &ViewLifetime {
        &self.lifetime
    }

    pub fn roots(&self) -> LoadState<Vec<Post>> {
        lock(&self.roots).clone()
    }

    pub fn recent(&self) -> LoadState<Vec<Post>> {
        lock(&self.recent).clone()
    }

    /// A loaded root post by id.
    pub fn find_root(&self, id: PostId) -> Option<Post> {
        lock(&self.roots)
            .loaded()
            .and_then(|posts| posts.iter().find(|p| p.id == id).cloned())
    }

    /// Fetch all root posts. Returns whether this response was applied:
    /// a reload that was overtaken by a newer one, or that finished after
    /// the board closed, changes nothing.
    pub async fn reload(&self) -> bool {
        let ticket = self.roots_requests.begin();
        {
            let mut roots = lock(&self.roots);
            if !roots.is_loading() && roots.loaded().is_none() {
                *roots = LoadState::Loading;
            }
        }

        let result = self.api.list_root_posts().await;

        if self.lifetime.is_cancelled() {
            tracing::debug!("Board closed, dropping root posts response");
            return false;
        }
        if !self.roots_requests.is_current(ticket) {
            tracing::debug!("Stale root posts response ignored");
            return false;
        }

        match &result {
            Ok(posts) => {
                tracing::debug!(count = posts.len(), "Root posts loaded");
                self.events
                    .emit(ClientEvent::PostsLoaded { count: posts.len() });
            }
            Err(e) => tracing::warn!(error = %e, "Failed to load posts"),
        }
        *lock(&self.roots) = LoadState::from_result(result);
        true
    }

    pub async fn load_recent(&self) -> bool {
        self.load_recent_with(DEFAULT_RECENT_LIMIT).await
    }

    pub async fn load_recent_with(&self, limit: u32) -> bool {
        let ticket = self.recent_requests.begin();
        *lock(&self.recent) = LoadState::Loading;

        let result = self
            .api
            .list_recent_posts(limit.clamp(1, MAX_RECENT_LIMIT))
            .await;

        if self.lifetime.is_cancelled() || !self.recent_requests.is_current(ticket) {
            return false;
        }
        *lock(&self.recent) = LoadState::from_result(result);
        true
    }

    pub fn close(&self) {
        self.lifetime.cancel();
    }
}

impl Drop for BoardView {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::testing::{wait_for_calls, FakeForum, Held};

    fn board(forum: &Arc<FakeForum>) -> Arc<BoardView> {
        Arc::new(BoardView::new(
            forum.clone(),
            EventBus::default(),
            ViewLifetime::new(),
        ))
    }

    fn titles(state: &LoadState<Vec<Post>>) -> Vec<String> {
        state
            .loaded()
            .map(|posts| posts.iter().map(|p| p.title.clone()).collect())
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_later_reload_wins_over_slow_earlier_one() {
        let forum = Arc::new(FakeForum::default());
        forum.add_root("A", [0.0, 0.0, 0.0]);
        let board = board(&forum);

        let gate = forum.hold_next(Held::RootList);
        let slow = {
            let board = board.clone();
            tokio::spawn(async move { board.reload().await })
        };
        wait_for_calls(&forum, 1).await;

        forum.add_root("B", [1.0, 1.0, 1.0]);
        assert!(board.reload().await);
        assert_eq!(titles(&board.roots()), vec!["A", "B"]);

        gate.send(()).unwrap();
        assert!(!slow.await.unwrap());
        assert_eq!(titles(&board.roots()), vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_failure_is_not_an_empty_board() {
        let forum = Arc::new(FakeForum::default());
        let board = board(&forum);
        forum.fail_next(ApiError::Transient("store unreachable".into()));

        assert!(board.reload().await);
        let state = board.roots();
        assert!(state.loaded().is_none());
        assert!(state.can_retry());

        assert!(board.reload().await);
        assert_eq!(board.roots().loaded().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_response_after_close_is_dropped() {
        let forum = Arc::new(FakeForum::default());
        forum.add_root("A", [0.0, 0.0, 0.0]);
        let board = board(&forum);

        let gate = forum.hold_next(Held::RootList);
        let pending = {
            let board = board.clone();
            tokio::spawn(async move { board.reload().await })
        };
        wait_for_calls(&forum, 1).await;
        board.close();
        gate.send(()).unwrap();

        assert!(!pending.await.unwrap());
        assert!(board.roots().loaded().is_none());
    }

    #[tokio::test]
    async fn test_recent_strip_is_newest_first() {
        let forum = Arc::new(FakeForum::default());
        let a = forum.add_root("A", [0.0, 0.0, 0.0]);
        forum.add_root("B", [1.0, 0.0, 0.0]);
        forum.add_reply(a.id, crate::testing::user(), "hi");
        let board = board(&forum);

        assert!(board.load_recent_with(2).await);
        let recent = board.recent();
        let posts = recent.loaded().unwrap();
        assert_eq!(posts.len(), 2);
        assert_eq!(posts[0].body.as_deref(), Some("hi"));
        assert_eq!(posts[1].title, "B");
    }

    #[tokio::test]
    async fn test_find_root_after_load() {
        let forum = Arc::new(FakeForum::default());
        let a = forum.add_root("A", [0.0, 0.0, 0.0]);
        let board = board(&forum);
        assert!(board.find_root(a.id).is_none());
        board.reload().await;
        assert_eq!(board.find_root(a.id).map(|p| p.title), Some("A".to_string()));
    }
}
