// Service layer: one service per subsystem, each holding the store handles it
// needs. Services own the block-visibility rules and pagination envelopes;
// stores stay mechanical.

use std::collections::HashMap;

use crate::core::cursor::Cursor;
use crate::core::page::Page;
use crate::core::UserId;
use crate::domain::Post;
use crate::error::{AppError, AppResult};
use crate::store::{ContentStore, GraphStore};

pub mod comment_service;
pub mod post_service;
pub mod relation_service;
pub mod step_service;
pub mod tag_service;

pub use comment_service::CommentService;
pub use post_service::PostService;
pub use relation_service::RelationService;
pub use step_service::StepService;
pub use tag_service::TagService;

/// Load a post and apply the read gate: PUBLIC, not deleted, and no block
/// edge in either direction between viewer and author. Every failure mode is
/// `PostNotFound`.
pub(crate) async fn load_readable_post(
    content: &dyn ContentStore,
    graph: &dyn GraphStore,
    viewer: UserId,
    post_id: i64,
) -> AppResult<Post> {
    let post = content
        .get_post(post_id)
        .await?
        .ok_or(AppError::PostNotFound)?;
    let blocked =
        post.author_id != viewer && graph.blocked_either(viewer, post.author_id).await?;
    post.ensure_readable_by(blocked)?;
    Ok(post)
}

/// Drop posts whose author blocks or is blocked by the viewer, then build the
/// page envelope from the overfetched rows. Block checks are cached per
/// author so a page costs at most one check per distinct author.
pub(crate) async fn filter_blocked_and_paginate(
    graph: &dyn GraphStore,
    viewer: UserId,
    posts: Vec<Post>,
    limit: usize,
) -> AppResult<Page<Post>> {
    let mut block_cache: HashMap<UserId, bool> = HashMap::new();
    let mut visible = Vec::with_capacity(posts.len());
    for post in posts {
        let blocked = match block_cache.get(&post.author_id) {
            Some(blocked) => *blocked,
            None => {
                let blocked = post.author_id != viewer
                    && graph.blocked_either(viewer, post.author_id).await?;
                block_cache.insert(post.author_id, blocked);
                blocked
            }
        };
        if !blocked {
            visible.push(post);
        }
    }
    Ok(Page::paginate(visible, limit, |p| {
        Cursor::build(p.created_at, p.id)
    }))
}
