// Nested post comments, flattened to two effective levels: every reply in a
// thread hangs under the thread's root regardless of how deep the client
// nested it. `root_id` of a root comment is its own id.

use serde::Serialize;

use crate::core::{current_time_millis, CommentId, PostId, TimestampMs, UserId};
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Serialize)]
pub struct PostComment {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    /// Root comment of the thread; equals `id` for root comments.
    pub root_id: CommentId,
    /// Immediate parent; `None` for root comments.
    pub parent_id: Option<CommentId>,
    pub content: String,
    /// Direct + nested replies under this root. Maintained only on roots.
    pub reply_count: i64,
    /// Explicit atomic counter, same discipline as PostStatistics.
    pub like_count: i64,
    pub created_at: TimestampMs,
    pub deleted_at: Option<TimestampMs>,
}

impl PostComment {
    /// New root comment. `root_id` is set to the assigned id by the store on
    /// insert.
    pub fn create_root(post_id: PostId, author_id: UserId, content: &str) -> AppResult<Self> {
        let content = validated_content(content)?;
        Ok(PostComment {
            id: 0,
            post_id,
            author_id,
            root_id: 0,
            parent_id: None,
            content,
            reply_count: 0,
            like_count: 0,
            created_at: current_time_millis(),
            deleted_at: None,
        })
    }

    /// New reply under `parent`. The parent must be live; the reply is
    /// anchored to the parent's root so threads stay two-level.
    pub fn create_reply(
        post_id: PostId,
        author_id: UserId,
        parent: &PostComment,
        content: &str,
    ) -> AppResult<Self> {
        let content = validated_content(content)?;
        if parent.is_deleted() {
            return Err(AppError::CommentNotFound);
        }
        Ok(PostComment {
            id: 0,
            post_id,
            author_id,
            root_id: parent.root_id,
            parent_id: Some(parent.id),
            content,
            reply_count: 0,
            like_count: 0,
            created_at: current_time_millis(),
            deleted_at: None,
        })
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn delete(&mut self) {
        self.deleted_at = Some(current_time_millis());
    }

    /// Comment author and post author may delete.
    pub fn can_be_deleted_by(&self, user_id: UserId, post_author_id: UserId) -> bool {
        self.author_id == user_id || post_author_id == user_id
    }
}

fn validated_content(content: &str) -> AppResult<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Err(AppError::InvalidParam("comment content is blank".to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_content_rejected() {
        assert!(PostComment::create_root(1, 2, "  ").is_err());
    }

    #[test]
    fn reply_flattens_to_parents_root() {
        let mut root = PostComment::create_root(1, 2, "nice!").unwrap();
        root.id = 10;
        root.root_id = 10;

        let mut reply = PostComment::create_reply(1, 3, &root, "thanks").unwrap();
        reply.id = 11;
        assert_eq!(reply.root_id, 10);
        assert_eq!(reply.parent_id, Some(10));

        // Reply to the reply still lands under root 10.
        let nested = PostComment::create_reply(1, 2, &reply, "welcome").unwrap();
        assert_eq!(nested.root_id, 10);
        assert_eq!(nested.parent_id, Some(11));
    }

    #[test]
    fn reply_to_deleted_parent_fails() {
        let mut root = PostComment::create_root(1, 2, "hello").unwrap();
        root.id = 10;
        root.root_id = 10;
        root.delete();
        assert!(matches!(
            PostComment::create_reply(1, 3, &root, "hi"),
            Err(AppError::CommentNotFound)
        ));
    }

    #[test]
    fn delete_permissions() {
        let mut c = PostComment::create_root(1, 2, "x").unwrap();
        c.id = 5;
        assert!(c.can_be_deleted_by(2, 9)); // comment author
        assert!(c.can_be_deleted_by(9, 9)); // post author
        assert!(!c.can_be_deleted_by(4, 9));
    }
}
