use rusqlite::{params, OptionalExtension};

use postspace_shared::{Coordinates, Post, PostId, UserId};

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::rows::{format_ts, now, parse_ts, parse_uuid};

const POST_COLUMNS: &str = "post_id, title, post_content_text, post_content_image, poster_id,
     parent_id, point_x, point_y, point_z, created_at";

/// Fields supplied by the caller when creating a post. The id and
/// creation timestamp are assigned by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPost {
    pub title: String,
    pub body: Option<String>,
    pub image_ref: Option<String>,
    pub author_id: UserId,
    pub parent_id: Option<PostId>,
    pub coordinates: Option<Coordinates>,
}

impl NewPost {
    pub fn root(
        author_id: UserId,
        title: impl Into<String>,
        body: impl Into<String>,
        image_ref: Option<String>,
        coordinates: Coordinates,
    ) -> Self {
        Self {
            title: title.into(),
            body: Some(body.into()),
            image_ref,
            author_id,
            parent_id: None,
            coordinates: Some(coordinates),
        }
    }

    /// Replies carry an empty title and no coordinates.
    pub fn reply(author_id: UserId, parent_id: PostId, text: impl Into<String>) -> Self {
        Self {
            title: String::new(),
            body: Some(text.into()),
            image_ref: None,
            author_id,
            parent_id: Some(parent_id),
            coordinates: None,
        }
    }
}

impl Database {
    /// Insert a post and return the stored record.
    ///
    /// A reply whose parent does not exist fails with `NotFound("parent post")`.
    pub fn insert_post(&self, new: &NewPost) -> Result<Post> {
        if let Some(parent) = new.parent_id {
            if !self.post_exists(parent)? {
                return Err(StoreError::NotFound("parent post"));
            }
        }

        let post = Post {
            id: PostId::new(),
            title: new.title.clone(),
            body: new.body.clone(),
            image_ref: new.image_ref.clone().filter(|s| !s.trim().is_empty()),
            author_id: new.author_id,
            parent_id: new.parent_id,
            coordinates: new.coordinates,
            created_at: now(),
        };

        self.conn().execute(
            "INSERT INTO posts (post_id, title, post_content_text, post_content_image, poster_id,
                                parent_id, point_x, point_y, point_z, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                post.id.to_string(),
                post.title,
                post.body,
                post.image_ref,
                post.author_id.to_string(),
                post.parent_id.map(|p| p.to_string()),
                post.coordinates.map(|c| c.x),
                post.coordinates.map(|c| c.y),
                post.coordinates.map(|c| c.z),
                format_ts(&post.created_at),
            ],
        )?;

        tracing::debug!(
            post_id = %post.id,
            parent_id = ?post.parent_id,
            author = %post.author_id.short(),
            "post inserted"
        );

        Ok(post)
    }

    pub fn get_post(&self, id: PostId) -> Result<Post> {
        self.conn()
            .query_row(
                &format!("SELECT {POST_COLUMNS} FROM posts WHERE post_id = ?1"),
                params![id.to_string()],
                row_to_post,
            )
            .map_err(StoreError::not_found_as("post"))
    }

    pub fn post_exists(&self, id: PostId) -> Result<bool> {
        let found = self
            .conn()
            .query_row(
                "SELECT 1 FROM posts WHERE post_id = ?1",
                params![id.to_string()],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// All posts without a parent, oldest first.
    pub fn list_root_posts(&self) -> Result<Vec<Post>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE parent_id IS NULL
                 ORDER BY created_at ASC, rowid ASC"
            ),
            [],
        )
    }

    /// Direct replies of `parent_id`, oldest first.
    pub fn list_replies(&self, parent_id: PostId) -> Result<Vec<Post>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE parent_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![parent_id.to_string()],
        )
    }

    /// Newest posts of any kind, most recent first.
    pub fn list_recent_posts(&self, limit: u32) -> Result<Vec<Post>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts
                 ORDER BY created_at DESC, rowid DESC
                 LIMIT ?1"
            ),
            params![limit],
        )
    }

    /// Everything written by one author (root posts and replies), oldest first.
    pub fn list_posts_by_author(&self, author: UserId) -> Result<Vec<Post>> {
        self.query_posts(
            &format!(
                "SELECT {POST_COLUMNS} FROM posts
                 WHERE poster_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ),
            params![author.to_string()],
        )
    }

    fn query_posts<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Post>> {
        let mut stmt = self.conn().prepare(sql)?;
        let rows = stmt.query_map(params, row_to_post)?;

        let mut posts = Vec::new();
        for row in rows {
            posts.push(row?);
        }
        Ok(posts)
    }
}

fn row_to_post(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    let id_str: String = row.get(0)?;
    let title: String = row.get(1)?;
    let body: Option<String> = row.get(2)?;
    let image_ref: Option<String> = row.get(3)?;
    let poster_str: String = row.get(4)?;
    let parent_str: Option<String> = row.get(5)?;
    let x: Option<f64> = row.get(6)?;
    let y: Option<f64> = row.get(7)?;
    let z: Option<f64> = row.get(8)?;
    let ts_str: String = row.get(9)?;

    let parent_id = match parent_str {
        Some(s) => Some(PostId(parse_uuid(5, &s)?)),
        None => None,
    };
    let coordinates = match (x, y, z) {
        (Some(x), Some(y), Some(z)) => Some(Coordinates::new(x, y, z)),
        _ => None,
    };

    Ok(Post {
        id: PostId(parse_uuid(0, &id_str)?),
        title,
        body,
        image_ref: image_ref.filter(|s| !s.trim().is_empty()),
        author_id: UserId(parse_uuid(4, &poster_str)?),
        parent_id,
        coordinates,
        created_at: parse_ts(9, &ts_str)?,
    })
}
