// In-memory store backend. A single RwLock guards all state, so every write
// method is naturally a transaction and counter updates are atomic.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use crate::core::cursor::{before_cursor, Cursor};
use crate::core::{CommentId, PostId, TagId, TimestampMs, UserId};
use crate::domain::{
    BlockEdge, FollowEdge, Post, PostComment, PostMedia, PostStatistics, RelationEdge, StepCount,
    Tag,
};
use crate::error::{AppError, AppResult};
use crate::store::{ContentStore, GraphStore, StepStore, TagStore};

#[derive(Default)]
struct Inner {
    posts: HashMap<PostId, Post>,
    media: HashMap<PostId, Vec<PostMedia>>,
    statistics: HashMap<PostId, PostStatistics>,
    post_likes: HashMap<(UserId, PostId), TimestampMs>,
    post_bookmarks: HashMap<(UserId, PostId), TimestampMs>,
    comments: HashMap<CommentId, PostComment>,
    comment_likes: HashSet<(CommentId, UserId)>,
    follows: HashMap<(UserId, UserId), TimestampMs>,
    blocks: HashMap<(UserId, UserId), TimestampMs>,
    tags: HashMap<TagId, Tag>,
    post_tags: HashMap<PostId, Vec<TagId>>,
    steps: HashMap<(UserId, NaiveDate), StepCount>,
}

#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
    next_id: AtomicI64,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Inner::default()),
            next_id: AtomicI64::new(1),
        }
    }

    fn alloc_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst)
    }
}

/// Sort rows (created_at DESC, id DESC), drop everything at or before the
/// cursor position, keep `limit` rows.
fn page_desc<T, K>(mut rows: Vec<T>, cursor: Cursor, limit: usize, key: K) -> Vec<T>
where
    K: Fn(&T) -> (TimestampMs, i64),
{
    rows.sort_by(|a, b| key(b).cmp(&key(a)));
    rows.retain(|row| {
        let (ts, id) = key(row);
        before_cursor(&cursor, ts, id)
    });
    rows.truncate(limit);
    rows
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn create_post(&self, mut post: Post, media: Vec<PostMedia>) -> AppResult<Post> {
        let mut inner = self.inner.write().await;
        post.id = self.alloc_id();

        let mut rows = media;
        for row in &mut rows {
            row.id = self.alloc_id();
            row.post_id = post.id;
        }

        inner
            .statistics
            .insert(post.id, PostStatistics::zeroed(post.id));
        inner.media.insert(post.id, rows);
        inner.posts.insert(post.id, post.clone());
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        Ok(self.inner.read().await.posts.get(&id).cloned())
    }

    async fn update_post(&self, post: &Post) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.posts.get_mut(&post.id) {
            Some(stored) => {
                *stored = post.clone();
                Ok(())
            }
            None => Err(AppError::PostNotFound),
        }
    }

    async fn replace_media(&self, post_id: PostId, media: Vec<PostMedia>) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let mut rows = media;
        for row in &mut rows {
            row.id = self.alloc_id();
            row.post_id = post_id;
        }
        inner.media.insert(post_id, rows);
        Ok(())
    }

    async fn list_media(&self, post_id: PostId) -> AppResult<Vec<PostMedia>> {
        let inner = self.inner.read().await;
        let mut rows = inner.media.get(&post_id).cloned().unwrap_or_default();
        rows.sort_by_key(|m| m.sort_order);
        Ok(rows)
    }

    async fn first_media(&self, post_id: PostId) -> AppResult<Option<PostMedia>> {
        Ok(self.list_media(post_id).await?.into_iter().next())
    }

    async fn get_statistics(&self, post_id: PostId) -> AppResult<Option<PostStatistics>> {
        Ok(self.inner.read().await.statistics.get(&post_id).copied())
    }

    async fn inc_like_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.statistics.get_mut(&post_id) {
            Some(stats) => {
                stats.like_count += delta;
                Ok(())
            }
            None => Err(AppError::PostNotFound),
        }
    }

    async fn inc_comment_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.statistics.get_mut(&post_id) {
            Some(stats) => {
                stats.comment_count += delta;
                Ok(())
            }
            None => Err(AppError::PostNotFound),
        }
    }

    async fn inc_bookmark_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.statistics.get_mut(&post_id) {
            Some(stats) => {
                stats.bookmark_count += delta;
                Ok(())
            }
            None => Err(AppError::PostNotFound),
        }
    }

    async fn list_public_posts(&self, cursor: Cursor, limit: usize) -> AppResult<Vec<Post>> {
        let inner = self.inner.read().await;
        let rows: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| !p.is_deleted() && p.visibility == crate::domain::Visibility::Public)
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |p| (p.created_at, p.id)))
    }

    async fn list_feed_posts(
        &self,
        author_ids: &[UserId],
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let authors: HashSet<UserId> = author_ids.iter().copied().collect();
        let inner = self.inner.read().await;
        let rows: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| {
                !p.is_deleted()
                    && p.visibility == crate::domain::Visibility::Public
                    && authors.contains(&p.author_id)
            })
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |p| (p.created_at, p.id)))
    }

    async fn search_public_posts(
        &self,
        keyword: &str,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let needle = keyword.to_lowercase();
        let inner = self.inner.read().await;
        let rows: Vec<Post> = inner
            .posts
            .values()
            .filter(|p| {
                !p.is_deleted()
                    && p.visibility == crate::domain::Visibility::Public
                    && (p.title.to_lowercase().contains(&needle)
                        || p.caption
                            .as_deref()
                            .map(|c| c.to_lowercase().contains(&needle))
                            .unwrap_or(false))
            })
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |p| (p.created_at, p.id)))
    }

    async fn list_posts_by_tag(
        &self,
        tag_id: TagId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let inner = self.inner.read().await;
        let rows: Vec<Post> = inner
            .post_tags
            .iter()
            .filter(|(_, tags)| tags.contains(&tag_id))
            .filter_map(|(post_id, _)| inner.posts.get(post_id))
            .filter(|p| !p.is_deleted() && p.visibility == crate::domain::Visibility::Public)
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |p| (p.created_at, p.id)))
    }

    async fn insert_post_like(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.post_likes.contains_key(&(user_id, post_id)) {
            return Ok(false);
        }
        inner.post_likes.insert((user_id, post_id), created_at);
        Ok(true)
    }

    async fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.post_likes.remove(&(user_id, post_id)).is_some())
    }

    async fn insert_post_bookmark(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.post_bookmarks.contains_key(&(user_id, post_id)) {
            return Ok(false);
        }
        inner.post_bookmarks.insert((user_id, post_id), created_at);
        Ok(true)
    }

    async fn delete_post_bookmark(&self, user_id: UserId, post_id: PostId) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.post_bookmarks.remove(&(user_id, post_id)).is_some())
    }

    async fn insert_root_comment(&self, mut comment: PostComment) -> AppResult<PostComment> {
        let mut inner = self.inner.write().await;
        comment.id = self.alloc_id();
        comment.root_id = comment.id;
        inner.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn insert_reply(&self, mut comment: PostComment) -> AppResult<PostComment> {
        let mut inner = self.inner.write().await;
        comment.id = self.alloc_id();
        inner.comments.insert(comment.id, comment.clone());
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<PostComment>> {
        Ok(self.inner.read().await.comments.get(&id).cloned())
    }

    async fn mark_comment_deleted(
        &self,
        id: CommentId,
        deleted_at: TimestampMs,
    ) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.comments.get_mut(&id) {
            Some(comment) => {
                comment.deleted_at = Some(deleted_at);
                Ok(())
            }
            None => Err(AppError::CommentNotFound),
        }
    }

    async fn inc_reply_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.comments.get_mut(&comment_id) {
            Some(comment) => {
                comment.reply_count += delta;
                Ok(())
            }
            None => Err(AppError::CommentNotFound),
        }
    }

    async fn list_root_comments(
        &self,
        post_id: PostId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>> {
        let inner = self.inner.read().await;
        let rows: Vec<PostComment> = inner
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.is_root() && !c.is_deleted())
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |c| (c.created_at, c.id)))
    }

    async fn list_replies(
        &self,
        root_id: CommentId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>> {
        let inner = self.inner.read().await;
        let rows: Vec<PostComment> = inner
            .comments
            .values()
            .filter(|c| c.root_id == root_id && !c.is_root() && !c.is_deleted())
            .cloned()
            .collect();
        Ok(page_desc(rows, cursor, limit, |c| (c.created_at, c.id)))
    }

    async fn list_preview_replies(
        &self,
        root_id: CommentId,
        limit: usize,
    ) -> AppResult<Vec<PostComment>> {
        self.list_replies(root_id, Cursor::default(), limit).await
    }

    async fn insert_comment_like(
        &self,
        comment_id: CommentId,
        user_id: UserId,
        _created_at: TimestampMs,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.comment_likes.insert((comment_id, user_id)))
    }

    async fn delete_comment_like(
        &self,
        comment_id: CommentId,
        user_id: UserId,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.comment_likes.remove(&(comment_id, user_id)))
    }

    async fn inc_comment_like_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.comments.get_mut(&comment_id) {
            Some(comment) => {
                comment.like_count += delta;
                Ok(())
            }
            None => Err(AppError::CommentNotFound),
        }
    }
}

#[async_trait]
impl GraphStore for MemoryStore {
    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let key = (edge.follower_id, edge.followee_id);
        if inner.follows.contains_key(&key) {
            return Ok(false);
        }
        inner.follows.insert(key, edge.created_at);
        Ok(true)
    }

    async fn delete_follow(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.follows.remove(&(follower_id, followee_id)).is_some())
    }

    async fn follow_exists(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool> {
        Ok(self
            .inner
            .read()
            .await
            .follows
            .contains_key(&(follower_id, followee_id)))
    }

    async fn list_followee_ids(&self, follower_id: UserId) -> AppResult<Vec<UserId>> {
        let inner = self.inner.read().await;
        Ok(inner
            .follows
            .keys()
            .filter(|(follower, _)| *follower == follower_id)
            .map(|(_, followee)| *followee)
            .collect())
    }

    async fn block_and_sever(&self, edge: BlockEdge) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        let key = (edge.blocker_id, edge.blocked_id);
        inner.blocks.entry(key).or_insert(edge.created_at);
        inner.follows.remove(&(edge.blocker_id, edge.blocked_id));
        inner.follows.remove(&(edge.blocked_id, edge.blocker_id));
        Ok(())
    }

    async fn delete_block(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        Ok(inner.blocks.remove(&(blocker_id, blocked_id)).is_some())
    }

    async fn block_exists(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool> {
        Ok(self
            .inner
            .read()
            .await
            .blocks
            .contains_key(&(blocker_id, blocked_id)))
    }

    async fn blocked_either(&self, a: UserId, b: UserId) -> AppResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.blocks.contains_key(&(a, b)) || inner.blocks.contains_key(&(b, a)))
    }

    async fn list_followers(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let inner = self.inner.read().await;
        let rows: Vec<RelationEdge> = inner
            .follows
            .iter()
            .filter(|((_, followee), _)| *followee == user_id)
            .map(|((follower, _), created_at)| RelationEdge {
                user_id: *follower,
                created_at: *created_at,
            })
            .collect();
        Ok(page_desc(rows, cursor, limit, |e| (e.created_at, e.user_id)))
    }

    async fn list_followings(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let inner = self.inner.read().await;
        let rows: Vec<RelationEdge> = inner
            .follows
            .iter()
            .filter(|((follower, _), _)| *follower == user_id)
            .map(|((_, followee), created_at)| RelationEdge {
                user_id: *followee,
                created_at: *created_at,
            })
            .collect();
        Ok(page_desc(rows, cursor, limit, |e| (e.created_at, e.user_id)))
    }

    async fn list_blocks(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let inner = self.inner.read().await;
        let rows: Vec<RelationEdge> = inner
            .blocks
            .iter()
            .filter(|((blocker, _), _)| *blocker == user_id)
            .map(|((_, blocked), created_at)| RelationEdge {
                user_id: *blocked,
                created_at: *created_at,
            })
            .collect();
        Ok(page_desc(rows, cursor, limit, |e| (e.created_at, e.user_id)))
    }
}

#[async_trait]
impl TagStore for MemoryStore {
    async fn find_or_create_tag(&self, mut tag: Tag) -> AppResult<Tag> {
        let mut inner = self.inner.write().await;
        if let Some(existing) = inner.tags.values().find(|t| t.name_lc == tag.name_lc) {
            return Ok(existing.clone());
        }
        tag.id = self.alloc_id();
        inner.tags.insert(tag.id, tag.clone());
        Ok(tag)
    }

    async fn get_tag(&self, id: TagId) -> AppResult<Option<Tag>> {
        Ok(self.inner.read().await.tags.get(&id).cloned())
    }

    async fn update_tag(&self, tag: &Tag) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        match inner.tags.get_mut(&tag.id) {
            Some(stored) => {
                *stored = tag.clone();
                Ok(())
            }
            None => Err(AppError::TagNotFound),
        }
    }

    async fn delete_tag(&self, id: TagId) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.tags.remove(&id).is_none() {
            return Ok(false);
        }
        for tags in inner.post_tags.values_mut() {
            tags.retain(|t| *t != id);
        }
        Ok(true)
    }

    async fn list_tags(
        &self,
        keyword_lc: Option<&str>,
        after_name_lc: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<Tag>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<Tag> = inner
            .tags
            .values()
            .filter(|t| keyword_lc.map(|k| t.name_lc.contains(k)).unwrap_or(true))
            .filter(|t| after_name_lc.map(|c| t.name_lc.as_str() > c).unwrap_or(true))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.name_lc.cmp(&b.name_lc));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn replace_post_tags(&self, post_id: PostId, tag_ids: &[TagId]) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner.post_tags.insert(post_id, tag_ids.to_vec());
        Ok(())
    }

    async fn list_post_tags(&self, post_id: PostId) -> AppResult<Vec<Tag>> {
        let inner = self.inner.read().await;
        let ids = inner.post_tags.get(&post_id).cloned().unwrap_or_default();
        Ok(ids
            .iter()
            .filter_map(|id| inner.tags.get(id))
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StepStore for MemoryStore {
    async fn get_step_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> AppResult<Option<StepCount>> {
        Ok(self.inner.read().await.steps.get(&(user_id, date)).cloned())
    }

    async fn insert_step_day(&self, record: &StepCount) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let key = (record.user_id, record.record_date);
        if inner.steps.contains_key(&key) {
            return Ok(false);
        }
        inner.steps.insert(key, record.clone());
        Ok(true)
    }

    async fn update_step_day(
        &self,
        record: &StepCount,
        expected_sequence: i64,
    ) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        let key = (record.user_id, record.record_date);
        match inner.steps.get_mut(&key) {
            Some(stored) if stored.sync_sequence == expected_sequence => {
                *stored = record.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_updated_after(
        &self,
        user_id: UserId,
        since: TimestampMs,
        limit: usize,
    ) -> AppResult<Vec<StepCount>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<StepCount> = inner
            .steps
            .values()
            .filter(|r| r.user_id == user_id && r.updated_at > since)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        rows.truncate(limit);
        Ok(rows)
    }

    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StepCount>> {
        let inner = self.inner.read().await;
        let mut rows: Vec<StepCount> = inner
            .steps
            .values()
            .filter(|r| r.user_id == user_id && r.record_date >= from && r.record_date <= to)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.record_date);
        Ok(rows)
    }
}
