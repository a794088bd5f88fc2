/// Application name
pub const APP_NAME: &str = "postspace";

/// Default HTTP API port (server)
pub const DEFAULT_HTTP_PORT: u16 = 8080;

/// Default base URL of the embedding service
pub const DEFAULT_EMBEDDING_URL: &str = "http://localhost:8000";

/// Path of the embedding endpoint, relative to the embedding base URL
pub const EMBED_ONLY_PATH: &str = "/embed-only";

/// Number of posts shown in the "newest posts" strip
pub const DEFAULT_RECENT_LIMIT: u32 = 5;

/// Upper bound for `/api/posts/recent?limit=`
pub const MAX_RECENT_LIMIT: u32 = 50;

/// Maximum title length in characters
pub const MAX_TITLE_LEN: usize = 200;

/// Maximum post / reply body length in characters
pub const MAX_BODY_LEN: usize = 10_000;

/// Username length bounds
pub const MIN_USERNAME_LEN: usize = 3;
pub const MAX_USERNAME_LEN: usize = 32;

/// Maximum profile bio length in characters
pub const MAX_BIO_LEN: usize = 1_000;

/// Maximum profile tag length in characters
pub const MAX_TAG_LEN: usize = 64;
