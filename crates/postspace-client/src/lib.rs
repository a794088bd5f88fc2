//! # postspace-client
//!
//! Client-side logic of the postspace forum, independent of any UI
//! toolkit: the typed HTTP API, sign-in and the shared session, image
//! uploads, and the views (board, thread, profile, settings) with their
//! load states. The plot canvas connects the views to the
//! `postspace-plot` engine.

pub mod api;
pub mod app;
pub mod auth;
pub mod board;
pub mod canvas;
pub mod config;
pub mod events;
pub mod layout;
pub mod lifetime;
pub mod media;
pub mod profile;
pub mod settings;
pub mod state;
pub mod thread;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiError, ForumApi, HttpForumApi};
pub use app::{ClientError, ForumClient};
pub use auth::{AuthService, Session, SessionContext};
pub use config::ClientConfig;
pub use state::LoadState;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the default log subscriber. `RUST_LOG` overrides the filter.
/// Calling this twice is harmless.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("postspace_client=debug,postspace_plot=info,warn"));

    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .try_init();
}
