use postspace_shared::{PostId, UserId};
use tokio::sync::broadcast;

/// Notifications from views to whatever shell hosts them.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
    PostsLoaded { count: usize },
    PostSelected(PostId),
    ThreadClosed(PostId),
    ReplyPosted { parent_id: PostId, reply_id: PostId },
    SessionChanged { signed_in: bool },
    ProfileSaved(UserId),
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<ClientEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ClientEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: ClientEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("No event listeners");
        }
    }
}
