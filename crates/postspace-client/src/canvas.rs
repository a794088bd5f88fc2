//! Glue between the plot engine and the views.
//!
//! [`PlotCanvas`] feeds the board's root posts into the engine, forwards
//! pointer input, and opens a [`ThreadView`] for whichever post the user
//! selects. [`spawn_render_loop`] paces frames and hands them to a
//! [`FrameSink`] until the canvas lifetime ends.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Instant;

use postspace_plot::{Frame, FrameLimiter, PlotEngine, PlotEvent, PointerButton};
use postspace_shared::PostId;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::board::BoardView;
use crate::events::ClientEvent;
use crate::lifetime::ViewLifetime;
use crate::state::LoadState;
use crate::thread::{ThreadContext, ThreadView};

/// Whatever paints frames: a GPU backend, a terminal, a test recorder.
pub trait FrameSink: Send + 'static {
    fn present(&mut self, frame: &Frame);
}

pub type SharedEngine = Arc<Mutex<PlotEngine>>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

/// Render at the engine's frame rate until `lifetime` is cancelled.
pub fn spawn_render_loop<S: FrameSink>(
    engine: SharedEngine,
    mut sink: S,
    lifetime: ViewLifetime,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(FrameLimiter::default().interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = lifetime.cancelled() => break,
                _ = ticker.tick() => {
                    let mut engine = lock(&engine);
                    engine.frame(Instant::now());
                    if let Some(frame) = engine.present() {
                        sink.present(frame);
                    }
                }
            }
        }
        tracing::debug!("Render loop stopped");
    })
}

pub struct PlotCanvas {
    engine: SharedEngine,
    board: Arc<BoardView>,
    thread_ctx: ThreadContext,
    detail: Mutex<Option<Arc<ThreadView>>>,
    lifetime: ViewLifetime,
}

impl PlotCanvas {
    pub fn new(
        board: Arc<BoardView>,
        thread_ctx: ThreadContext,
        width: u32,
        height: u32,
    ) -> Self {
        let lifetime = board.lifetime().child();
        Self {
            engine: Arc::new(Mutex::new(PlotEngine::new(width, height))),
            board,
            thread_ctx,
            detail: Mutex::new(None),
            lifetime,
        }
    }

    pub fn engine(&self) -> SharedEngine {
        self.engine.clone()
    }

    pub fn lifetime(&self) -> &ViewLifetime {
        &self.lifetime
    }

    /// The open detail view, if a post is selected.
    pub fn detail(&self) -> Option<Arc<ThreadView>> {
        lock(&self.detail).clone()
    }

    /// Reload the board and replot. A failed load keeps the current plot.
    pub async fn refresh(&self) -> LoadState<usize> {
        if !self.board.reload().await {
            return LoadState::Loading;
        }
        match self.board.roots() {
            LoadState::Loaded(posts) => {
                let events = lock(&self.engine).set_posts(&posts);
                if events.contains(&PlotEvent::SelectionCleared) {
                    self.drop_detail();
                }
                let plotted = lock(&self.engine).points().len();
                LoadState::Loaded(plotted)
            }
            LoadState::Failed(e) => LoadState::Failed(e),
            LoadState::Idle | LoadState::Loading => LoadState::Loading,
        }
    }

    pub fn pointer_move(&self, x: f64, y: f64) -> Vec<PlotEvent> {
        lock(&self.engine).pointer_move(x, y)
    }

    pub fn pointer_down(&self, x: f64, y: f64, button: PointerButton) {
        lock(&self.engine).pointer_down(x, y, button);
    }

    /// Finish a click or drag. A click on a post opens its thread.
    pub async fn pointer_up(&self, x: f64, y: f64) -> Vec<PlotEvent> {
        let events = lock(&self.engine).pointer_up(x, y);
        for event in &events {
            if let PlotEvent::PostSelected(id) = event {
                self.open_thread(*id).await;
            }
        }
        events
    }

    pub fn pointer_leave(&self) -> Vec<PlotEvent> {
        lock(&self.engine).pointer_leave()
    }

    pub fn wheel(&self, delta_y: f64) {
        lock(&self.engine).wheel(delta_y);
    }

    pub fn resize(&self, width: u32, height: u32) -> bool {
        lock(&self.engine).resize(width, height)
    }

    /// Replace the detail view with `id`'s thread.
    pub async fn open_thread(&self, id: PostId) -> Option<Arc<ThreadView>> {
        let Some(post) = self.board.find_root(id) else {
            tracing::warn!(post = %id, "Selected post is not on the board");
            return None;
        };
        let view = Arc::new(ThreadView::new(
            self.thread_ctx.clone(),
            post,
            self.lifetime.child(),
        ));
        if let Some(previous) = lock(&self.detail).replace(view.clone()) {
            previous.close();
        }
        self.thread_ctx.events.emit(ClientEvent::PostSelected(id));

        tokio::join!(view.load(), view.load_poster());
        Some(view)
    }

    /// Close the detail view and clear the selection.
    pub fn close_thread(&self) {
        lock(&self.engine).clear_selection();
        self.drop_detail();
    }

    pub fn close(&self) {
        self.drop_detail();
        self.lifetime.cancel();
    }

    fn drop_detail(&self) {
        if let Some(view) = lock(&self.detail).take() {
            view.close();
        }
    }
}

impl Drop for PlotCanvas {
    fn drop(&mut self) {
        self.lifetime.cancel();
    }
}
