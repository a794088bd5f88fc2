//! Post tree resolver.
//!
//! Threads are stored flat: each reply points at its immediate parent via
//! `parent_id`. [`PostTree`] rebuilds the parent → children adjacency once
//! per load so views can walk a thread without rescanning the collection
//! on every render.

use std::collections::{HashMap, HashSet};

use crate::models::Post;
use crate::types::{PostId, UserId};

/// Direct replies of `id`, ascending by `created_at`. Posts with equal
/// timestamps keep their input order.
pub fn children_of(posts: &[Post], id: PostId) -> Vec<Post> {
    let mut children: Vec<Post> = posts
        .iter()
        .filter(|p| p.parent_id == Some(id))
        .cloned()
        .collect();
    // `sort_by_key` is stable, which gives the input-order tie-break.
    children.sort_by_key(|p| p.created_at);
    children
}

/// One line of a depth-first thread walk.
#[derive(Debug, Clone, Copy)]
pub struct ThreadEntry<'a> {
    /// 0 for the post the walk started from.
    pub depth: usize,
    pub post: &'a Post,
}

/// Adjacency map over a collection of posts.
#[derive(Debug, Default, Clone)]
pub struct PostTree {
    posts: HashMap<PostId, Post>,
    children: HashMap<PostId, Vec<PostId>>,
    roots: Vec<PostId>,
    orphans: Vec<PostId>,
}

impl PostTree {
    pub fn build(posts: impl IntoIterator<Item = Post>) -> Self {
        let mut ordered: Vec<(usize, Post)> = posts.into_iter().enumerate().collect();
        ordered.sort_by_key(|(idx, p)| (p.created_at, *idx));

        let mut tree = Self::default();
        let mut order: Vec<(PostId, Option<PostId>)> = Vec::with_capacity(ordered.len());
        for (_, post) in ordered {
            // First occurrence of an id wins.
            if tree.posts.contains_key(&post.id) {
                continue;
            }
            order.push((post.id, post.parent_id));
            tree.posts.insert(post.id, post);
        }

        // Second pass so that parents are known before classifying orphans.
        for (id, parent_id) in order {
            match parent_id {
                None => tree.roots.push(id),
                Some(parent) if tree.posts.contains_key(&parent) => {
                    tree.children.entry(parent).or_default().push(id)
                }
                Some(_) => tree.orphans.push(id),
            }
        }
        tree
    }

    /// Same structure, restricted to the posts written by `author`.
    /// Replies to other authors' posts become orphans of this view.
    pub fn by_author(posts: impl IntoIterator<Item = Post>, author: UserId) -> Self {
        Self::build(posts.into_iter().filter(|p| p.author_id == author))
    }

    pub fn get(&self, id: PostId) -> Option<&Post> {
        self.posts.get(&id)
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn roots(&self) -> Vec<&Post> {
        self.resolve(&self.roots)
    }

    /// Replies whose parent is not part of this collection.
    pub fn orphans(&self) -> Vec<&Post> {
        self.resolve(&self.orphans)
    }

    /// Ordered direct replies of `id`; empty when there are none or when
    /// `id` is unknown.
    pub fn children(&self, id: PostId) -> Vec<&Post> {
        self.children
            .get(&id)
            .map(|ids| self.resolve(ids))
            .unwrap_or_default()
    }

    pub fn reply_count(&self, id: PostId) -> usize {
        self.children.get(&id).map_or(0, Vec::len)
    }

    /// Depth-first walk starting at `id` (depth 0), children in creation
    /// order. Returns an empty walk when `id` is unknown.
    pub fn thread(&self, id: PostId) -> Vec<ThreadEntry<'_>> {
        let mut out = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![(id, 0usize)];

        while let Some((current, depth)) = stack.pop() {
            // Malformed data could contain a parent cycle.
            if !seen.insert(current) {
                continue;
            }
            let Some(post) = self.posts.get(&current) else {
                continue;
            };
            out.push(ThreadEntry { depth, post });

            if let Some(kids) = self.children.get(&current) {
                for child in kids.iter().rev() {
                    stack.push((*child, depth + 1));
                }
            }
        }
        out
    }

    fn resolve(&self, ids: &[PostId]) -> Vec<&Post> {
        ids.iter().filter_map(|id| self.posts.get(id)).collect()
    }
}
