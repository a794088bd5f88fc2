//! Domain models for posts and profiles.
//!
//! On the wire (and in the row store) both models use the flat column
//! names of the `posts` and `profile` tables: `post_id`,
//! `post_content_text`, `poster_id`, `point_x`/`point_y`/`point_z`, and so
//! on. In Rust the coordinates are grouped into a single optional
//! [`Coordinates`] value. The conversion goes through private `*Record`
//! structs so serde never has to guess about partially present points.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{PostId, UserId};

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// A position in the shared 3D space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Coordinates {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Build from a `[x, y, z]` array as returned by the embedding service.
    pub fn from_array(v: [f64; 3]) -> Self {
        Self::new(v[0], v[1], v[2])
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    fn from_parts(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Option<Self> {
        match (x, y, z) {
            (Some(x), Some(y), Some(z)) => Some(Self::new(x, y, z)),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Post
// ---------------------------------------------------------------------------

/// A root post or a reply.
///
/// `parent_id = None` marks a root post, the only kind that is ever plotted.
/// Posts are append-only: nothing in the system updates or deletes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "PostRecord", into = "PostRecord")]
pub struct Post {
    pub id: PostId,
    /// Required for root posts, empty for replies.
    pub title: String,
    pub body: Option<String>,
    /// URL of a hosted image.
    pub image_ref: Option<String>,
    pub author_id: UserId,
    pub parent_id: Option<PostId>,
    /// Computed once at creation for root posts; unused for replies.
    pub coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
}

impl Post {
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Where this post belongs in the plot, if anywhere. Replies never
    /// have a plot position, even if the row carries coordinates.
    pub fn plot_position(&self) -> Option<Coordinates> {
        if self.is_root() {
            self.coordinates
        } else {
            None
        }
    }

    pub fn body_text(&self) -> &str {
        self.body.as_deref().unwrap_or("")
    }
}

#[derive(Serialize, Deserialize)]
struct PostRecord {
    post_id: PostId,
    #[serde(default)]
    title: String,
    #[serde(default)]
    post_content_text: Option<String>,
    #[serde(default)]
    post_content_image: Option<String>,
    poster_id: UserId,
    #[serde(default)]
    parent_id: Option<PostId>,
    #[serde(default)]
    point_x: Option<f64>,
    #[serde(default)]
    point_y: Option<f64>,
    #[serde(default)]
    point_z: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<PostRecord> for Post {
    fn from(r: PostRecord) -> Self {
        Self {
            id: r.post_id,
            title: r.title,
            body: r.post_content_text,
            image_ref: r.post_content_image.filter(|s| !s.trim().is_empty()),
            author_id: r.poster_id,
            parent_id: r.parent_id,
            coordinates: Coordinates::from_parts(r.point_x, r.point_y, r.point_z),
            created_at: r.created_at,
        }
    }
}

impl From<Post> for PostRecord {
    fn from(p: Post) -> Self {
        Self {
            post_id: p.id,
            title: p.title,
            post_content_text: p.body,
            post_content_image: p.image_ref,
            poster_id: p.author_id,
            parent_id: p.parent_id,
            point_x: p.coordinates.map(|c| c.x),
            point_y: p.coordinates.map(|c| c.y),
            point_z: p.coordinates.map(|c| c.z),
            created_at: p.created_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// Public profile of a user. `username` is the routing key for profile
/// pages; `id` equals the owner's identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ProfileRecord", into = "ProfileRecord")]
pub struct Profile {
    pub id: UserId,
    pub username: String,
    pub profile_picture: Option<String>,
    pub tag: Option<String>,
    pub bio: Option<String>,
    /// A user-level position, independent of any post.
    pub coordinates: Option<Coordinates>,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct ProfileRecord {
    id: UserId,
    username: String,
    #[serde(default)]
    profile_picture: Option<String>,
    #[serde(default)]
    tag: Option<String>,
    #[serde(default)]
    bio: Option<String>,
    #[serde(default)]
    point_x: Option<f64>,
    #[serde(default)]
    point_y: Option<f64>,
    #[serde(default)]
    point_z: Option<f64>,
    created_at: DateTime<Utc>,
}

impl From<ProfileRecord> for Profile {
    fn from(r: ProfileRecord) -> Self {
        Self {
            id: r.id,
            username: r.username,
            profile_picture: r.profile_picture.filter(|s| !s.trim().is_empty()),
            tag: r.tag,
            bio: r.bio,
            coordinates: Coordinates::from_parts(r.point_x, r.point_y, r.point_z),
            created_at: r.created_at,
        }
    }
}

impl From<Profile> for ProfileRecord {
    fn from(p: Profile) -> Self {
        Self {
            id: p.id,
            username: p.username,
            profile_picture: p.profile_picture,
            tag: p.tag,
            bio: p.bio,
            point_x: p.coordinates.map(|c| c.x),
            point_y: p.coordinates.map(|c| c.y),
            point_z: p.coordinates.map(|c| c.z),
            created_at: p.created_at,
        }
    }
}
