//! v001 -- Initial schema creation.
//!
//! Creates the `posts` and `profile` tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Profiles (1:1 with an identity-provider user)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS profile (
    id              TEXT PRIMARY KEY NOT NULL,   -- identity UUID
    username        TEXT NOT NULL UNIQUE,
    profile_picture TEXT,
    tag             TEXT,
    bio             TEXT,
    point_x         REAL,
    point_y         REAL,
    point_z         REAL,
    created_at      TEXT NOT NULL                -- RFC-3339, UTC, microseconds
);

-- ----------------------------------------------------------------
-- Posts (root posts and replies)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS posts (
    post_id            TEXT PRIMARY KEY NOT NULL,  -- UUID v4
    title              TEXT NOT NULL DEFAULT '',
    post_content_text  TEXT,
    post_content_image TEXT,
    poster_id          TEXT NOT NULL,              -- identity UUID
    parent_id          TEXT,                       -- NULL = root post
    point_x            REAL,
    point_y            REAL,
    point_z            REAL,
    created_at         TEXT NOT NULL,

    FOREIGN KEY (parent_id) REFERENCES posts(post_id)
);

CREATE INDEX IF NOT EXISTS idx_posts_parent_created
    ON posts(parent_id, created_at);

CREATE INDEX IF NOT EXISTS idx_posts_poster
    ON posts(poster_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
