use rusqlite::Connection;

const UP_SQL: &str = r#"
-- Newest-posts strip orders the whole table by creation time
CREATE INDEX IF NOT EXISTS idx_posts_created_desc
    ON posts(created_at DESC);
"#;

pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
