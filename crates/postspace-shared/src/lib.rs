//! # postspace-shared
//!
//! Types shared by every postspace crate: identifiers, the `Post` and
//! `Profile` models with their wire encoding, request/response bodies for
//! the HTTP API, input validation, and the post tree resolver that turns a
//! flat list of posts into threads.

pub mod constants;
pub mod error;
pub mod models;
pub mod tree;
pub mod types;
pub mod validate;
pub mod wire;

pub use error::ValidationError;
pub use models::{Coordinates, Post, Profile};
pub use tree::{children_of, PostTree};
pub use types::{PostId, UserId};
