//! Cancellation and request ordering for views.
//!
//! Every view owns a [`ViewLifetime`]. Closing or dropping the view
//! cancels it, and async work that finishes afterwards checks it before
//! touching view state. A [`RequestTracker`] makes the newest request
//! win when the same data is loaded more than once concurrently.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct ViewLifetime {
    own: Arc<watch::Sender<bool>>,
    parent: Option<Box<ViewLifetime>>,
}

impl Default for ViewLifetime {
    fn default() -> Self {
        Self::new()
    }
}

impl ViewLifetime {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self {
            own: Arc::new(tx),
            parent: None,
        }
    }

    /// A lifetime that ends with this one, or earlier on its own.
    pub fn child(&self) -> Self {
        let mut child = Self::new();
        child.parent = Some(Box::new(self.clone()));
        child
    }

    pub fn cancel(&self) {
        self.own.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.own.borrow() || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }

    /// Resolves once this lifetime or any ancestor is cancelled.
    pub fn cancelled(&self) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            let rx = self.own.subscribe();
            match &self.parent {
                None => wait_for_cancel(rx).await,
                Some(parent) => {
                    tokio::select! {
                        _ = wait_for_cancel(rx) => {}
                        _ = parent.cancelled() => {}
                    }
                }
            }
        })
    }
}

async fn wait_for_cancel(mut rx: watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            // Sender gone without cancelling: never resolves.
            std::future::pending::<()>().await;
        }
    }
}

/// Monotonic request tickets.
#[derive(Debug, Default)]
pub struct RequestTracker {
    latest: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket(u64);

impl RequestTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a request. Every earlier ticket stops being current.
    pub fn begin(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_newest_ticket_wins() {
        let tracker = RequestTracker::new();
        let first = tracker.begin();
        assert!(tracker.is_current(first));
        let second = tracker.begin();
        assert!(!tracker.is_current(first));
        assert!(tracker.is_current(second));
    }

    #[test]
    fn test_child_follows_parent() {
        let parent = ViewLifetime::new();
        let child = parent.child();
        child.cancel();
        assert!(child.is_cancelled());
        assert!(!parent.is_cancelled());

        let other = parent.child();
        parent.cancel();
        assert!(other.is_cancelled());
    }

    #[tokio::test]
    async fn test_cancelled_future_resolves() {
        let parent = ViewLifetime::new();
        let child = parent.child();
        let waiter = {
            let child = child.clone();
            tokio::spawn(async move { child.cancelled().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        parent.cancel();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("cancellation propagated")
            .unwrap();
    }
}
