use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        DefaultBodyLimit, Path, Query, State,
    },
    http::{HeaderMap, Method, StatusCode},
    middleware,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use postspace_shared::constants::{DEFAULT_RECENT_LIMIT, MAX_RECENT_LIMIT};
use postspace_shared::wire::{
    AuthUser, CreatePostRequest, CreatePostResponse, CreateProfileRequest, CreateReplyRequest,
    UpdateProfileRequest,
};
use postspace_shared::{validate, Post, PostId, Profile, UserId};
use postspace_store::{Database, NewPost, NewProfile, ProfileChanges, StoreError};

use crate::auth::{bearer_token, AuthError, SessionVerifier};
use crate::config::ServerConfig;
use crate::embedding::Embedder;
use crate::error::ServerError;
use crate::rate_limit::{rate_limit_middleware, RateLimiter};

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Mutex<Database>>,
    pub embedder: Arc<dyn Embedder>,
    pub verifier: Arc<dyn SessionVerifier>,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Run `f` against the database. The lock is released before this
    /// returns, so it is never held across an `.await`.
    fn with_db<T>(
        &self,
        f: impl FnOnce(&Database) -> Result<T, StoreError>,
    ) -> Result<T, ServerError> {
        let db = self
            .db
            .lock()
            .map_err(|_| ServerError::Internal("database lock poisoned".into()))?;
        Ok(f(&db)?)
    }

    async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, ServerError> {
        let token = bearer_token(headers)
            .ok_or_else(|| ServerError::Unauthorized(AuthError::MissingToken.to_string()))?;

        self.verifier.verify(token).await.map_err(|e| match e {
            AuthError::Unavailable(detail) => ServerError::Upstream(detail),
            other => ServerError::Unauthorized(other.to_string()),
        })
    }
}

pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_check))
        .route("/api/post", post(create_post))
        .route("/api/posts", get(list_posts))
        .route("/api/posts/recent", get(recent_posts))
        .route("/api/get_replys", get(list_replies))
        .route("/api/reply", post(create_reply))
        .route("/api/get-profile", get(get_profile))
        .route("/api/profile/{id}", get(profile_by_id))
        .route("/api/profile/{id}/posts", get(posts_by_author))
        .route("/api/create_profile", post(create_profile))
        .route("/api/update_profile", post(update_profile))
        .layer(DefaultBodyLimit::max(state.config.max_body_bytes))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    instance: String,
}

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        instance: state.config.instance_name.clone(),
    })
}

// ---------------------------------------------------------------------------
// Posts
// ---------------------------------------------------------------------------

/// Create a root post. The embedding is computed before anything is
/// written, so an embedding failure leaves no trace in the store.
async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatePostResponse>), ServerError> {
    let user = state.authenticate(&headers).await?;
    let Json(req) = payload?;
    let (title, text) = validate::root_post(&req.title, &req.text)?;
    let image_ref = validate::optional_text("image_url", req.image_url.as_deref(), 2048)?;

    let coordinates = state
        .embedder
        .embed(&title, &text)
        .await
        .map_err(|e| ServerError::Upstream(e.to_string()))?;

    let new = NewPost::root(user.id, title, text, image_ref, coordinates);
    let post = state.with_db(|db| db.insert_post(&new))?;

    info!(post_id = %post.id, author = %user.id.short(), "Root post created");

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            post,
            status: "created".to_string(),
        }),
    ))
}

async fn list_posts(State(state): State<AppState>) -> Result<Json<Vec<Post>>, ServerError> {
    Ok(Json(state.with_db(|db| db.list_root_posts())?))
}

#[derive(Deserialize)]
struct RecentQuery {
    limit: Option<u32>,
}

async fn recent_posts(
    State(state): State<AppState>,
    query: Result<Query<RecentQuery>, QueryRejection>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let Query(q) = query?;
    let limit = q
        .limit
        .unwrap_or(DEFAULT_RECENT_LIMIT)
        .clamp(1, MAX_RECENT_LIMIT);
    Ok(Json(state.with_db(|db| db.list_recent_posts(limit))?))
}

#[derive(Deserialize)]
struct RepliesQuery {
    parent_id: Option<String>,
}

async fn list_replies(
    State(state): State<AppState>,
    query: Result<Query<RepliesQuery>, QueryRejection>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let Query(q) = query?;
    let raw = q
        .parent_id
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| ServerError::BadRequest("parent_id is required".into()))?;
    let parent: PostId = raw
        .parse()
        .map_err(|_| ServerError::BadRequest("parent_id is not a valid id".into()))?;

    let replies = state.with_db(|db| {
        if !db.post_exists(parent)? {
            return Err(StoreError::NotFound("post"));
        }
        db.list_replies(parent)
    })?;
    Ok(Json(replies))
}

async fn create_reply(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateReplyRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Post>), ServerError> {
    let user = state.authenticate(&headers).await?;
    let Json(req) = payload?;
    let text = validate::reply_text(&req.text)?;

    let reply = state.with_db(|db| db.insert_post(&NewPost::reply(user.id, req.parent_id, text)))?;

    info!(
        post_id = %reply.id,
        parent_id = %req.parent_id,
        author = %user.id.short(),
        "Reply created"
    );

    Ok((StatusCode::CREATED, Json(reply)))
}

// ---------------------------------------------------------------------------
// Profiles
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct ProfileQuery {
    username: Option<String>,
}

async fn get_profile(
    State(state): State<AppState>,
    query: Result<Query<ProfileQuery>, QueryRejection>,
) -> Result<Json<Profile>, ServerError> {
    let Query(q) = query?;
    let username = q
        .username
        .map(|u| u.trim().to_string())
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ServerError::BadRequest("username is required".into()))?;

    Ok(Json(
        state.with_db(|db| db.get_profile_by_username(&username))?,
    ))
}

async fn profile_by_id(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Profile>, ServerError> {
    let id: UserId = raw
        .parse()
        .map_err(|_| ServerError::BadRequest("profile id is not a valid id".into()))?;
    Ok(Json(state.with_db(|db| db.get_profile_by_id(id))?))
}

/// Everything a user wrote, root posts and replies, oldest first.
async fn posts_by_author(
    State(state): State<AppState>,
    Path(raw): Path<String>,
) -> Result<Json<Vec<Post>>, ServerError> {
    let id: UserId = raw
        .parse()
        .map_err(|_| ServerError::BadRequest("profile id is not a valid id".into()))?;
    Ok(Json(state.with_db(|db| db.list_posts_by_author(id))?))
}

/// Create the caller's profile. The id always comes from the session.
async fn create_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<CreateProfileRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Profile>), ServerError> {
    let user = state.authenticate(&headers).await?;
    let Json(req) = payload?;

    let coordinates = req.coordinates();
    if coordinates.is_some_and(|c| !c.is_finite()) {
        return Err(postspace_shared::ValidationError::InvalidCoordinates.into());
    }

    let new = NewProfile {
        id: user.id,
        username: validate::username(&req.username)?,
        profile_picture: validate::optional_text(
            "profile_picture",
            req.profile_picture.as_deref(),
            2048,
        )?,
        tag: validate::tag(req.tag.as_deref())?,
        bio: validate::bio(req.bio.as_deref())?,
        coordinates,
    };

    let profile = state
        .with_db(|db| db.insert_profile(&new))
        .map_err(|e| match e {
            ServerError::Conflict(_) => {
                ServerError::Conflict("username taken or profile already exists".into())
            }
            other => other,
        })?;

    Ok((StatusCode::CREATED, Json(profile)))
}

/// Update the caller's own profile. Empty strings clear optional fields.
async fn update_profile(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<UpdateProfileRequest>, JsonRejection>,
) -> Result<Json<Profile>, ServerError> {
    let user = state.authenticate(&headers).await?;
    let Json(req) = payload?;

    let changes = ProfileChanges {
        username: req.username.as_deref().map(validate::username).transpose()?,
        profile_picture: req
            .profile_picture
            .as_deref()
            .map(|p| validate::optional_text("profile_picture", Some(p), 2048))
            .transpose()?,
        tag: req.tag.as_deref().map(|t| validate::tag(Some(t))).transpose()?,
        bio: req.bio.as_deref().map(|b| validate::bio(Some(b))).transpose()?,
    };

    let profile = state
        .with_db(|db| db.update_profile(user.id, &changes))
        .map_err(|e| match e {
            ServerError::Conflict(_) => ServerError::Conflict("username already taken".into()),
            other => other,
        })?;

    info!(user = %user.id.short(), "Profile updated");
    Ok(Json(profile))
}

pub async fn serve(state: AppState, addr: SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request};
    use postspace_shared::Coordinates;
    use serde_json::{json, Value};
    use tower::ServiceExt;
    use uuid::Uuid;

    use crate::embedding::EmbedError;

    struct FixedEmbedder(Option<[f64; 3]>);

    #[async_trait]
    impl Embedder for FixedEmbedder {
        async fn embed(&self, _title: &str, _text: &str) -> Result<Coordinates, EmbedError> {
            self.0
                .map(Coordinates::from_array)
                .ok_or(EmbedError::Status(503))
        }
    }

    /// Accepts tokens of the form `token-<n>` for the users registered
    /// under them.
    struct FakeVerifier(HashMap<String, UserId>);

    #[async_trait]
    impl SessionVerifier for FakeVerifier {
        async fn verify(&self, token: &str) -> Result<AuthUser, AuthError> {
            self.0
                .get(token)
                .map(|id| AuthUser {
                    id: *id,
                    email: None,
                })
                .ok_or(AuthError::Rejected)
        }
    }

    struct Harness {
        state: AppState,
        alice: UserId,
        bob: UserId,
    }

    fn harness_with(embedding: Option<[f64; 3]>) -> Harness {
        let alice = UserId(Uuid::new_v4());
        let bob = UserId(Uuid::new_v4());
        let verifier = FakeVerifier(HashMap::from([
            ("token-alice".to_string(), alice),
            ("token-bob".to_string(), bob),
        ]));
        let state = AppState {
            db: Arc::new(Mutex::new(Database::open_in_memory().unwrap())),
            embedder: Arc::new(FixedEmbedder(embedding)),
            verifier: Arc::new(verifier),
            rate_limiter: RateLimiter::new(1000.0, 1000.0),
            config: Arc::new(ServerConfig::default()),
        };
        Harness { state, alice, bob }
    }

    fn harness() -> Harness {
        harness_with(Some([1.0, 2.0, 3.0]))
    }

    async fn send(
        state: &AppState,
        method: Method,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let resp = build_router(state.clone()).oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, value)
    }

    async fn create_root(h: &Harness, title: &str, text: &str) -> Value {
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/post",
            Some("token-alice"),
            Some(json!({ "title": title, "text": text })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["post"].clone()
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness();
        let (status, body) = send(&h.state, Method::GET, "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_root_post_stores_embedding_coordinates() {
        let h = harness();
        let post = create_root(&h, "A", "B").await;

        assert_eq!(post["title"], "A");
        assert_eq!(post["post_content_text"], "B");
        assert_eq!(post["point_x"], 1.0);
        assert_eq!(post["point_y"], 2.0);
        assert_eq!(post["point_z"], 3.0);
        assert!(post["parent_id"].is_null());
        assert_eq!(post["poster_id"], h.alice.to_string());

        let id: PostId = post["post_id"].as_str().unwrap().parse().unwrap();
        let stored = h.state.db.lock().unwrap().get_post(id).unwrap();
        assert_eq!(stored.coordinates, Some(Coordinates::new(1.0, 2.0, 3.0)));
        assert!(stored.parent_id.is_none());
    }

    #[tokio::test]
    async fn test_embedding_failure_stores_nothing() {
        let h = harness_with(None);
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/post",
            Some("token-alice"),
            Some(json!({ "title": "A", "text": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert!(body["error"].is_string());

        let (_, posts) = send(&h.state, Method::GET, "/api/posts", None, None).await;
        assert_eq!(posts, json!([]));
    }

    #[tokio::test]
    async fn test_writes_require_a_session() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/post",
            None,
            Some(json!({ "title": "A", "text": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body["error"].is_string());

        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/post",
            Some("forged"),
            Some(json!({ "title": "A", "text": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/post",
            Some("token-alice"),
            Some(json!({ "title": "  ", "text": "B" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("title"));
    }

    #[tokio::test]
    async fn test_malformed_json_gets_error_body() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            Method::POST,
            "/api/reply",
            Some("token-alice"),
            Some(json!({ "text": "no parent" })),
        )
        .await;
        assert!(status.is_client_error());
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_reply_flow() {
        let h = harness();
        let root = create_root(&h, "A", "B").await;
        let root_id = root["post_id"].as_str().unwrap().to_string();

        let (status, reply) = send(
            &h.state,
            Method::POST,
            "/api/reply",
            Some("token-bob"),
            Some(json!({ "parent_id": root_id, "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(reply["parent_id"], root_id.as_str());
        assert_eq!(reply["post_content_text"], "hello");
        assert_eq!(reply["title"], "");
        assert!(reply["point_x"].is_null());
        assert_eq!(reply["poster_id"], h.bob.to_string());

        let (status, replies) = send(
            &h.state,
            Method::GET,
            &format!("/api/get_replys?parent_id={root_id}"),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(replies.as_array().unwrap().len(), 1);

        let (_, roots) = send(&h.state, Method::GET, "/api/posts", None, None).await;
        assert_eq!(roots.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reply_to_unknown_parent_is_not_found() {
        let h = harness();
        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/reply",
            Some("token-bob"),
            Some(json!({ "parent_id": PostId::new(), "text": "hello" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_whitespace_reply_is_rejected() {
        let h = harness();
        let root = create_root(&h, "A", "B").await;
        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/reply",
            Some("token-bob"),
            Some(json!({ "parent_id": root["post_id"], "text": "   " })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_replies_argument_errors() {
        let h = harness();
        let (status, _) = send(&h.state, Method::GET, "/api/get_replys", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h.state,
            Method::GET,
            "/api/get_replys?parent_id=nope",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(
            &h.state,
            Method::GET,
            &format!("/api/get_replys?parent_id={}", PostId::new()),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_recent_posts_are_newest_first_and_limited() {
        let h = harness();
        let mut ids = Vec::new();
        for i in 0..7 {
            let post = create_root(&h, &format!("t{i}"), "b").await;
            ids.push(post["post_id"].clone());
        }

        let (_, recent) = send(&h.state, Method::GET, "/api/posts/recent", None, None).await;
        let recent = recent.as_array().unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0]["post_id"], ids[6]);

        let (_, two) = send(&h.state, Method::GET, "/api/posts/recent?limit=2", None, None).await;
        assert_eq!(two.as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unknown_profile_is_not_found() {
        let h = harness();
        let (status, body) = send(
            &h.state,
            Method::GET,
            "/api/get-profile?username=ghost",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn test_profile_lifecycle() {
        let h = harness();
        let (status, created) = send(
            &h.state,
            Method::POST,
            "/api/create_profile",
            Some("token-alice"),
            Some(json!({ "username": "ada", "bio": "engines" })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(created["id"], h.alice.to_string());

        let (status, fetched) = send(
            &h.state,
            Method::GET,
            "/api/get-profile?username=ada",
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["bio"], "engines");

        let (status, by_id) = send(
            &h.state,
            Method::GET,
            &format!("/api/profile/{}", h.alice),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(by_id["username"], "ada");

        create_root(&h, "A", "B").await;
        let (status, posts) = send(
            &h.state,
            Method::GET,
            &format!("/api/profile/{}/posts", h.alice),
            None,
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(posts.as_array().unwrap().len(), 1);

        let (status, updated) = send(
            &h.state,
            Method::POST,
            "/api/update_profile",
            Some("token-alice"),
            Some(json!({ "tag": "math", "bio": "" })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(updated["tag"], "math");
        assert!(updated["bio"].is_null());
    }

    #[tokio::test]
    async fn test_taken_username_conflicts() {
        let h = harness();
        let create = |token: &'static str| {
            let state = h.state.clone();
            async move {
                send(
                    &state,
                    Method::POST,
                    "/api/create_profile",
                    Some(token),
                    Some(json!({ "username": "ada" })),
                )
                .await
                .0
            }
        };
        assert_eq!(create("token-alice").await, StatusCode::CREATED);
        assert_eq!(create("token-bob").await, StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_update_without_profile_is_not_found() {
        let h = harness();
        let (status, _) = send(
            &h.state,
            Method::POST,
            "/api/update_profile",
            Some("token-bob"),
            Some(json!({ "bio": "hi" })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
