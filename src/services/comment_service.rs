// Comment threads: two-level flattened nesting, root-level reply counters,
// comment likes.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cursor::Cursor;
use crate::core::page::{clamp_limit, Page};
use crate::core::{current_time_millis, CommentId, PostId, TimestampMs, UserId};
use crate::domain::PostComment;
use crate::error::{AppError, AppResult};
use crate::services::load_readable_post;
use crate::store::{ContentStore, GraphStore};

const DEFAULT_PREVIEW_SIZE: usize = 3;
const MAX_PREVIEW_SIZE: usize = 10;

#[derive(Debug, Clone, Deserialize)]
pub struct CommentCreateReq {
    pub content: String,
    #[serde(default)]
    pub parent_id: Option<CommentId>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentResp {
    pub id: CommentId,
    pub post_id: PostId,
    pub author_id: UserId,
    pub root_id: CommentId,
    pub parent_id: Option<CommentId>,
    pub content: String,
    pub reply_count: i64,
    pub like_count: i64,
    pub created_at: TimestampMs,
}

impl From<PostComment> for CommentResp {
    fn from(c: PostComment) -> Self {
        CommentResp {
            id: c.id,
            post_id: c.post_id,
            author_id: c.author_id,
            root_id: c.root_id,
            parent_id: c.parent_id,
            content: c.content,
            reply_count: c.reply_count,
            like_count: c.like_count,
            created_at: c.created_at,
        }
    }
}

/// One root comment plus a fixed preview window of its most recent replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentThreadResp {
    pub root: CommentResp,
    pub replies: Vec<CommentResp>,
}

pub struct CommentService {
    content: Arc<dyn ContentStore>,
    graph: Arc<dyn GraphStore>,
}

impl CommentService {
    pub fn new(content: Arc<dyn ContentStore>, graph: Arc<dyn GraphStore>) -> Self {
        Self { content, graph }
    }

    pub async fn create_comment(
        &self,
        user_id: UserId,
        post_id: PostId,
        req: CommentCreateReq,
    ) -> AppResult<CommentResp> {
        let post = load_readable_post(&*self.content, &*self.graph, user_id, post_id).await?;

        let comment = match req.parent_id {
            None => {
                let comment = PostComment::create_root(post.id, user_id, &req.content)?;
                self.content.insert_root_comment(comment).await?
            }
            Some(parent_id) => {
                let parent = self
                    .content
                    .get_comment(parent_id)
                    .await?
                    .filter(|c| !c.is_deleted() && c.post_id == post.id)
                    .ok_or(AppError::CommentNotFound)?;
                // Same conflation as post reads: a blocked parent author looks
                // like a missing post.
                if parent.author_id != user_id
                    && self.graph.blocked_either(user_id, parent.author_id).await?
                {
                    return Err(AppError::PostNotFound);
                }
                let comment = PostComment::create_reply(post.id, user_id, &parent, &req.content)?;
                let comment = self.content.insert_reply(comment).await?;
                self.content.inc_reply_count(comment.root_id, 1).await?;
                comment
            }
        };

        self.content.inc_comment_count(post.id, 1).await?;
        tracing::debug!(comment_id = comment.id, post_id = post.id, "comment created");
        Ok(comment.into())
    }

    pub async fn delete_comment(&self, user_id: UserId, comment_id: CommentId) -> AppResult<()> {
        let comment = self
            .content
            .get_comment(comment_id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or(AppError::CommentNotFound)?;
        let post = self
            .content
            .get_post(comment.post_id)
            .await?
            .ok_or(AppError::PostNotFound)?;
        if !comment.can_be_deleted_by(user_id, post.author_id) {
            return Err(AppError::Forbidden(
                "not the comment or post author".to_string(),
            ));
        }

        self.content
            .mark_comment_deleted(comment.id, current_time_millis())
            .await?;
        if !comment.is_root() {
            self.content.inc_reply_count(comment.root_id, -1).await?;
        }
        self.content.inc_comment_count(post.id, -1).await
    }

    pub async fn list_root_comments(
        &self,
        viewer: UserId,
        post_id: PostId,
        limit: Option<usize>,
        cursor: Option<&str>,
        preview_size: Option<usize>,
    ) -> AppResult<Page<CommentThreadResp>> {
        let post = load_readable_post(&*self.content, &*self.graph, viewer, post_id).await?;
        let limit = clamp_limit(limit);
        let preview_size = preview_size
            .unwrap_or(DEFAULT_PREVIEW_SIZE)
            .min(MAX_PREVIEW_SIZE);

        let roots = self
            .content
            .list_root_comments(post.id, Cursor::parse(cursor), limit + 1)
            .await?;
        let page = Page::paginate(roots, limit, |c| Cursor::build(c.created_at, c.id));

        let mut threads = Vec::with_capacity(page.items.len());
        for root in page.items {
            let replies = if preview_size == 0 {
                Vec::new()
            } else {
                self.content
                    .list_preview_replies(root.id, preview_size)
                    .await?
            };
            threads.push(CommentThreadResp {
                root: root.into(),
                replies: replies.into_iter().map(Into::into).collect(),
            });
        }

        Ok(Page {
            items: threads,
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }

    pub async fn list_replies(
        &self,
        viewer: UserId,
        root_id: CommentId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<CommentResp>> {
        let root = self
            .content
            .get_comment(root_id)
            .await?
            .filter(|c| !c.is_deleted() && c.is_root())
            .ok_or(AppError::CommentNotFound)?;
        load_readable_post(&*self.content, &*self.graph, viewer, root.post_id).await?;

        let limit = clamp_limit(limit);
        let replies = self
            .content
            .list_replies(root.id, Cursor::parse(cursor), limit + 1)
            .await?;
        let page = Page::paginate(replies, limit, |c| Cursor::build(c.created_at, c.id));
        Ok(Page {
            items: page.items.into_iter().map(Into::into).collect(),
            next_cursor: page.next_cursor,
            has_more: page.has_more,
        })
    }

    pub async fn like_comment(&self, user_id: UserId, comment_id: CommentId) -> AppResult<()> {
        let comment = self.load_live_comment(user_id, comment_id).await?;
        let inserted = self
            .content
            .insert_comment_like(comment.id, user_id, current_time_millis())
            .await?;
        if !inserted {
            return Err(AppError::AlreadyLiked);
        }
        self.content.inc_comment_like_count(comment.id, 1).await
    }

    pub async fn unlike_comment(&self, user_id: UserId, comment_id: CommentId) -> AppResult<()> {
        let comment = self.load_live_comment(user_id, comment_id).await?;
        let deleted = self
            .content
            .delete_comment_like(comment.id, user_id)
            .await?;
        if !deleted {
            return Err(AppError::NotLiked);
        }
        self.content.inc_comment_like_count(comment.id, -1).await
    }

    /// Live comment on a post the viewer may read.
    async fn load_live_comment(
        &self,
        viewer: UserId,
        comment_id: CommentId,
    ) -> AppResult<PostComment> {
        let comment = self
            .content
            .get_comment(comment_id)
            .await?
            .filter(|c| !c.is_deleted())
            .ok_or(AppError::CommentNotFound)?;
        load_readable_post(&*self.content, &*self.graph, viewer, comment.post_id).await?;
        Ok(comment)
    }
}
