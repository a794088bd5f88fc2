//! Request and response bodies of the postspace HTTP API.
//!
//! Both the server routes and the client's typed API use these structs,
//! which keeps the two sides from drifting apart.

use serde::{Deserialize, Serialize};

use crate::models::{Coordinates, Post};
use crate::types::{PostId, UserId};

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub error: String,
}

/// `POST /api/post`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostRequest {
    pub title: String,
    pub text: String,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePostResponse {
    pub post: Post,
    pub status: String,
}

/// `POST /api/reply`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReplyRequest {
    pub parent_id: PostId,
    pub text: String,
}

/// `POST /api/create_profile`. The profile id is taken from the caller's
/// session, never from the body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub username: String,
    #[serde(default)]
    pub profile_picture: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub bio: Option<String>,
    #[serde(default)]
    pub point_x: Option<f64>,
    #[serde(default)]
    pub point_y: Option<f64>,
    #[serde(default)]
    pub point_z: Option<f64>,
}

impl CreateProfileRequest {
    pub fn coordinates(&self) -> Option<Coordinates> {
        match (self.point_x, self.point_y, self.point_z) {
            (Some(x), Some(y), Some(z)) => Some(Coordinates::new(x, y, z)),
            _ => None,
        }
    }
}

/// `POST /api/update_profile`. `None` leaves a field unchanged; an empty
/// string clears an optional field.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UpdateProfileRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_picture: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl UpdateProfileRequest {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.profile_picture.is_none()
            && self.tag.is_none()
            && self.bio.is_none()
    }
}

/// User as reported by the identity provider's `/auth/v1/user` endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    #[serde(default)]
    pub email: Option<String>,
}
