// Store interfaces consumed by the service layer. Two backends: an in-memory
// store for tests and local runs, and a Postgres store via sqlx.
//
// Contract notes shared by all implementations:
// - Listing methods return rows strictly after the cursor position in
//   (created_at DESC, id DESC) order; callers pass limit+1 to detect the
//   next page.
// - Counter mutations (`inc_*`) are single atomic increment-by-delta
//   operations against the persisted value.
// - Conditional inserts for join rows (likes, bookmarks, follows) return
//   `false` when the row already exists, detected inside the store so two
//   racing requests cannot both succeed.

use async_trait::async_trait;
use chrono::NaiveDate;

use crate::core::cursor::Cursor;
use crate::core::{CommentId, PostId, TagId, TimestampMs, UserId};
use crate::domain::{BlockEdge, FollowEdge, Post, PostComment, PostMedia, PostStatistics, RelationEdge, StepCount, Tag};
use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

/// Posts, media, statistics, likes, bookmarks and comments.
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Insert the post, its zeroed statistics row and its media set in one
    /// transaction. Returns the post with its assigned id.
    async fn create_post(&self, post: Post, media: Vec<PostMedia>) -> AppResult<Post>;
    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>>;
    async fn update_post(&self, post: &Post) -> AppResult<()>;

    /// Delete the post's entire media set and insert the replacement.
    async fn replace_media(&self, post_id: PostId, media: Vec<PostMedia>) -> AppResult<()>;
    async fn list_media(&self, post_id: PostId) -> AppResult<Vec<PostMedia>>;
    async fn first_media(&self, post_id: PostId) -> AppResult<Option<PostMedia>>;

    async fn get_statistics(&self, post_id: PostId) -> AppResult<Option<PostStatistics>>;
    async fn inc_like_count(&self, post_id: PostId, delta: i64) -> AppResult<()>;
    async fn inc_comment_count(&self, post_id: PostId, delta: i64) -> AppResult<()>;
    async fn inc_bookmark_count(&self, post_id: PostId, delta: i64) -> AppResult<()>;

    async fn list_public_posts(&self, cursor: Cursor, limit: usize) -> AppResult<Vec<Post>>;
    async fn list_feed_posts(
        &self,
        author_ids: &[UserId],
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>>;
    async fn search_public_posts(
        &self,
        keyword: &str,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>>;
    async fn list_posts_by_tag(
        &self,
        tag_id: TagId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>>;

    async fn insert_post_like(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool>;
    async fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> AppResult<bool>;
    async fn insert_post_bookmark(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool>;
    async fn delete_post_bookmark(&self, user_id: UserId, post_id: PostId) -> AppResult<bool>;

    /// Insert a root comment; `root_id` is set to the assigned id inside the
    /// same transaction.
    async fn insert_root_comment(&self, comment: PostComment) -> AppResult<PostComment>;
    async fn insert_reply(&self, comment: PostComment) -> AppResult<PostComment>;
    async fn get_comment(&self, id: CommentId) -> AppResult<Option<PostComment>>;
    async fn mark_comment_deleted(
        &self,
        id: CommentId,
        deleted_at: TimestampMs,
    ) -> AppResult<()>;
    /// Atomic reply-count delta on the thread root.
    async fn inc_reply_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()>;
    async fn list_root_comments(
        &self,
        post_id: PostId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>>;
    async fn list_replies(
        &self,
        root_id: CommentId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>>;
    /// Most recent replies under a root, fixed window, no cursor.
    async fn list_preview_replies(
        &self,
        root_id: CommentId,
        limit: usize,
    ) -> AppResult<Vec<PostComment>>;

    async fn insert_comment_like(
        &self,
        comment_id: CommentId,
        user_id: UserId,
        created_at: TimestampMs,
    ) -> AppResult<bool>;
    async fn delete_comment_like(&self, comment_id: CommentId, user_id: UserId)
        -> AppResult<bool>;
    async fn inc_comment_like_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()>;
}

/// Directed follow and block edges.
#[async_trait]
pub trait GraphStore: Send + Sync {
    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool>;
    async fn delete_follow(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool>;
    async fn follow_exists(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool>;
    async fn list_followee_ids(&self, follower_id: UserId) -> AppResult<Vec<UserId>>;

    /// Upsert the block edge and remove any follow edges in both directions,
    /// transactionally. Idempotent: re-blocking is not an error.
    async fn block_and_sever(&self, edge: BlockEdge) -> AppResult<()>;
    async fn delete_block(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool>;
    async fn block_exists(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool>;
    /// Block edge in either direction between the two users.
    async fn blocked_either(&self, a: UserId, b: UserId) -> AppResult<bool>;

    async fn list_followers(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>>;
    async fn list_followings(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>>;
    async fn list_blocks(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>>;
}

/// Tags and post-tag associations.
#[async_trait]
pub trait TagStore: Send + Sync {
    /// Idempotent by `name_lc`: returns the existing tag when one matches.
    async fn find_or_create_tag(&self, tag: Tag) -> AppResult<Tag>;
    async fn get_tag(&self, id: TagId) -> AppResult<Option<Tag>>;
    async fn update_tag(&self, tag: &Tag) -> AppResult<()>;
    /// Deletes the tag and cascades its post associations. `false` when the
    /// tag did not exist.
    async fn delete_tag(&self, id: TagId) -> AppResult<bool>;
    /// Ascending by `name_lc`, filtered by substring, resumed after the
    /// cursor value.
    async fn list_tags(
        &self,
        keyword_lc: Option<&str>,
        after_name_lc: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<Tag>>;
    /// Replace-all semantics: every existing association for the post is
    /// removed before the new set is inserted.
    async fn replace_post_tags(&self, post_id: PostId, tag_ids: &[TagId]) -> AppResult<()>;
    async fn list_post_tags(&self, post_id: PostId) -> AppResult<Vec<Tag>>;
}

/// Per-day step records with compare-and-swap writes.
#[async_trait]
pub trait StepStore: Send + Sync {
    async fn get_step_day(&self, user_id: UserId, date: NaiveDate)
        -> AppResult<Option<StepCount>>;
    /// Insert the first record for a (user, date). `false` when a row
    /// appeared concurrently.
    async fn insert_step_day(&self, record: &StepCount) -> AppResult<bool>;
    /// Write guarded on the previously observed sync_sequence. `false` when
    /// another sync won the race and the caller must re-read.
    async fn update_step_day(&self, record: &StepCount, expected_sequence: i64)
        -> AppResult<bool>;
    /// Records updated strictly after `since`, newest first, capped by the
    /// caller's limit.
    async fn list_updated_after(
        &self,
        user_id: UserId,
        since: TimestampMs,
        limit: usize,
    ) -> AppResult<Vec<StepCount>>;
    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StepCount>>;
}
