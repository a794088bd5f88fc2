//! # postspace-store
//!
//! Row store for postspace, backed by SQLite.
//!
//! The crate exposes a synchronous [`Database`] handle that wraps a
//! `rusqlite::Connection` and provides typed helpers for the two tables
//! the forum needs: `posts` (root posts and replies) and `profile`.
//! Posts are append-only; profiles are created once and updated by their
//! owner.

pub mod database;
pub mod migrations;
pub mod posts;
pub mod profiles;

mod error;
mod rows;

pub use database::Database;
pub use error::{Result, StoreError};
pub use posts::NewPost;
pub use profiles::{NewProfile, ProfileChanges};
