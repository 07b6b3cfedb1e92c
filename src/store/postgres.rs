// Postgres store backend over sqlx. Counter mutations are single UPDATE
// deltas, join rows rely on primary-key conflicts, and multi-row writes run
// inside transactions.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::Row;

use crate::core::cursor::Cursor;
use crate::core::{CommentId, PostId, TagId, TimestampMs, UserId};
use crate::domain::{
    BlockEdge, FollowEdge, MediaType, Post, PostComment, PostMedia, PostStatistics, RelationEdge,
    StepCount, Tag, Visibility,
};
use crate::error::AppResult;
use crate::store::{ContentStore, GraphStore, StepStore, TagStore};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(url: &str, max_connections: u32) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub async fn health_check(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Create tables and indexes. The unique keys on join tables are what
    /// makes the conditional inserts race-safe.
    pub async fn initialize(&self) -> AppResult<()> {
        let statements = [
            r#"
            CREATE TABLE IF NOT EXISTS posts (
                id BIGSERIAL PRIMARY KEY,
                author_id BIGINT NOT NULL,
                title TEXT NOT NULL,
                caption TEXT,
                visibility VARCHAR(16) NOT NULL,
                media_count INTEGER NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL,
                deleted_at BIGINT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_media (
                id BIGSERIAL PRIMARY KEY,
                post_id BIGINT NOT NULL,
                media_type VARCHAR(8) NOT NULL,
                object_key TEXT NOT NULL,
                url TEXT NOT NULL,
                width INTEGER NOT NULL DEFAULT 0,
                height INTEGER NOT NULL DEFAULT 0,
                sort_order INTEGER NOT NULL DEFAULT 0,
                blurhash TEXT,
                checksum TEXT,
                bytes BIGINT NOT NULL DEFAULT 0,
                mime_type TEXT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_statistics (
                post_id BIGINT PRIMARY KEY,
                like_count BIGINT NOT NULL DEFAULT 0,
                comment_count BIGINT NOT NULL DEFAULT 0,
                bookmark_count BIGINT NOT NULL DEFAULT 0,
                heat_score DOUBLE PRECISION NOT NULL DEFAULT 0
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_likes (
                user_id BIGINT NOT NULL,
                post_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (user_id, post_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_bookmarks (
                user_id BIGINT NOT NULL,
                post_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (user_id, post_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_comments (
                id BIGSERIAL PRIMARY KEY,
                post_id BIGINT NOT NULL,
                author_id BIGINT NOT NULL,
                root_id BIGINT NOT NULL DEFAULT 0,
                parent_id BIGINT,
                content TEXT NOT NULL,
                reply_count BIGINT NOT NULL DEFAULT 0,
                like_count BIGINT NOT NULL DEFAULT 0,
                created_at BIGINT NOT NULL,
                deleted_at BIGINT
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS comment_likes (
                comment_id BIGINT NOT NULL,
                user_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (comment_id, user_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_follows (
                follower_id BIGINT NOT NULL,
                followee_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (follower_id, followee_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS user_blocks (
                blocker_id BIGINT NOT NULL,
                blocked_id BIGINT NOT NULL,
                created_at BIGINT NOT NULL,
                PRIMARY KEY (blocker_id, blocked_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS tags (
                id BIGSERIAL PRIMARY KEY,
                name TEXT NOT NULL,
                name_lc TEXT NOT NULL UNIQUE
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS post_tags (
                post_id BIGINT NOT NULL,
                tag_id BIGINT NOT NULL,
                PRIMARY KEY (post_id, tag_id)
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS step_counts (
                user_id BIGINT NOT NULL,
                record_date DATE NOT NULL,
                steps INTEGER NOT NULL,
                distance_km DOUBLE PRECISION NOT NULL,
                kcal INTEGER NOT NULL,
                active_minutes INTEGER NOT NULL,
                data_source TEXT NOT NULL,
                sync_sequence BIGINT NOT NULL,
                version INTEGER NOT NULL,
                updated_at BIGINT NOT NULL,
                PRIMARY KEY (user_id, record_date)
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_posts_feed ON posts (visibility, created_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_post_media_post ON post_media (post_id, sort_order)",
            "CREATE INDEX IF NOT EXISTS idx_comments_post ON post_comments (post_id, created_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_comments_root ON post_comments (root_id, created_at DESC, id DESC)",
            "CREATE INDEX IF NOT EXISTS idx_post_tags_tag ON post_tags (tag_id)",
            "CREATE INDEX IF NOT EXISTS idx_steps_updated ON step_counts (user_id, updated_at DESC)",
        ];

        for statement in statements {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        author_id: row.get("author_id"),
        title: row.get("title"),
        caption: row.get("caption"),
        visibility: Visibility::from_str(&row.get::<String, _>("visibility")),
        media_count: row.get("media_count"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn media_from_row(row: &PgRow) -> PostMedia {
    let media_type = match row.get::<String, _>("media_type").as_str() {
        "video" => MediaType::Video,
        _ => MediaType::Image,
    };
    PostMedia {
        id: row.get("id"),
        post_id: row.get("post_id"),
        media_type,
        object_key: row.get("object_key"),
        url: row.get("url"),
        width: row.get("width"),
        height: row.get("height"),
        sort_order: row.get("sort_order"),
        blurhash: row.get("blurhash"),
        checksum: row.get("checksum"),
        bytes: row.get("bytes"),
        mime_type: row.get("mime_type"),
    }
}

fn comment_from_row(row: &PgRow) -> PostComment {
    PostComment {
        id: row.get("id"),
        post_id: row.get("post_id"),
        author_id: row.get("author_id"),
        root_id: row.get("root_id"),
        parent_id: row.get("parent_id"),
        content: row.get("content"),
        reply_count: row.get("reply_count"),
        like_count: row.get("like_count"),
        created_at: row.get("created_at"),
        deleted_at: row.get("deleted_at"),
    }
}

fn step_from_row(row: &PgRow) -> StepCount {
    StepCount {
        user_id: row.get("user_id"),
        record_date: row.get("record_date"),
        steps: row.get("steps"),
        distance_km: row.get("distance_km"),
        kcal: row.get("kcal"),
        active_minutes: row.get("active_minutes"),
        data_source: row.get("data_source"),
        sync_sequence: row.get("sync_sequence"),
        version: row.get("version"),
        updated_at: row.get("updated_at"),
    }
}

fn tag_from_row(row: &PgRow) -> Tag {
    Tag {
        id: row.get("id"),
        name: row.get("name"),
        name_lc: row.get("name_lc"),
    }
}

const POST_COLUMNS: &str =
    "id, author_id, title, caption, visibility, media_count, created_at, updated_at, deleted_at";
const COMMENT_COLUMNS: &str =
    "id, post_id, author_id, root_id, parent_id, content, reply_count, like_count, created_at, deleted_at";

async fn insert_media_rows<'a>(
    tx: &mut sqlx::Transaction<'a, sqlx::Postgres>,
    post_id: PostId,
    media: &[PostMedia],
) -> AppResult<()> {
    for item in media {
        sqlx::query(
            r#"
            INSERT INTO post_media
                (post_id, media_type, object_key, url, width, height, sort_order,
                 blurhash, checksum, bytes, mime_type)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            "#,
        )
        .bind(post_id)
        .bind(item.media_type.as_str())
        .bind(&item.object_key)
        .bind(&item.url)
        .bind(item.width)
        .bind(item.height)
        .bind(item.sort_order)
        .bind(&item.blurhash)
        .bind(&item.checksum)
        .bind(item.bytes)
        .bind(&item.mime_type)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl ContentStore for PostgresStore {
    async fn create_post(&self, mut post: Post, media: Vec<PostMedia>) -> AppResult<Post> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            r#"
            INSERT INTO posts
                (author_id, title, caption, visibility, media_count, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            "#,
        )
        .bind(post.author_id)
        .bind(&post.title)
        .bind(&post.caption)
        .bind(post.visibility.as_str())
        .bind(post.media_count)
        .bind(post.created_at)
        .bind(post.updated_at)
        .fetch_one(&mut *tx)
        .await?;
        post.id = row.get("id");

        sqlx::query("INSERT INTO post_statistics (post_id) VALUES ($1)")
            .bind(post.id)
            .execute(&mut *tx)
            .await?;

        insert_media_rows(&mut tx, post.id, &media).await?;

        tx.commit().await?;
        Ok(post)
    }

    async fn get_post(&self, id: PostId) -> AppResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {} FROM posts WHERE id = $1", POST_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(post_from_row))
    }

    async fn update_post(&self, post: &Post) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE posts
            SET title = $2, caption = $3, visibility = $4, media_count = $5,
                updated_at = $6, deleted_at = $7
            WHERE id = $1
            "#,
        )
        .bind(post.id)
        .bind(&post.title)
        .bind(&post.caption)
        .bind(post.visibility.as_str())
        .bind(post.media_count)
        .bind(post.updated_at)
        .bind(post.deleted_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_media(&self, post_id: PostId, media: Vec<PostMedia>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM post_media WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        insert_media_rows(&mut tx, post_id, &media).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list_media(&self, post_id: PostId) -> AppResult<Vec<PostMedia>> {
        let rows = sqlx::query(
            "SELECT * FROM post_media WHERE post_id = $1 ORDER BY sort_order ASC, id ASC",
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(media_from_row).collect())
    }

    async fn first_media(&self, post_id: PostId) -> AppResult<Option<PostMedia>> {
        let row = sqlx::query(
            "SELECT * FROM post_media WHERE post_id = $1 ORDER BY sort_order ASC, id ASC LIMIT 1",
        )
        .bind(post_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(media_from_row))
    }

    async fn get_statistics(&self, post_id: PostId) -> AppResult<Option<PostStatistics>> {
        let row = sqlx::query("SELECT * FROM post_statistics WHERE post_id = $1")
            .bind(post_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|row| PostStatistics {
            post_id: row.get("post_id"),
            like_count: row.get("like_count"),
            comment_count: row.get("comment_count"),
            bookmark_count: row.get("bookmark_count"),
            heat_score: row.get("heat_score"),
        }))
    }

    async fn inc_like_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        sqlx::query("UPDATE post_statistics SET like_count = like_count + $2 WHERE post_id = $1")
            .bind(post_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn inc_comment_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE post_statistics SET comment_count = comment_count + $2 WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn inc_bookmark_count(&self, post_id: PostId, delta: i64) -> AppResult<()> {
        sqlx::query(
            "UPDATE post_statistics SET bookmark_count = bookmark_count + $2 WHERE post_id = $1",
        )
        .bind(post_id)
        .bind(delta)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_public_posts(&self, cursor: Cursor, limit: usize) -> AppResult<Vec<Post>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM posts
            WHERE visibility = 'PUBLIC' AND deleted_at IS NULL
              AND ($1::bigint IS NULL OR created_at < $1
                   OR (created_at = $1 AND id < $2))
            ORDER BY created_at DESC, id DESC
            LIMIT $3
            "#,
            POST_COLUMNS
        ))
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn list_feed_posts(
        &self,
        author_ids: &[UserId],
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM posts
            WHERE visibility = 'PUBLIC' AND deleted_at IS NULL
              AND author_id = ANY($1)
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND id < $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            POST_COLUMNS
        ))
        .bind(author_ids.to_vec())
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn search_public_posts(
        &self,
        keyword: &str,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let pattern = format!("%{}%", keyword.trim());
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM posts
            WHERE visibility = 'PUBLIC' AND deleted_at IS NULL
              AND (title ILIKE $1 OR caption ILIKE $1)
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND id < $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            POST_COLUMNS
        ))
        .bind(pattern)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn list_posts_by_tag(
        &self,
        tag_id: TagId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<Post>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(
            r#"
            SELECT p.id, p.author_id, p.title, p.caption, p.visibility, p.media_count,
                   p.created_at, p.updated_at, p.deleted_at
            FROM posts p
            JOIN post_tags pt ON pt.post_id = p.id
            WHERE pt.tag_id = $1
              AND p.visibility = 'PUBLIC' AND p.deleted_at IS NULL
              AND ($2::bigint IS NULL OR p.created_at < $2
                   OR (p.created_at = $2 AND p.id < $3))
            ORDER BY p.created_at DESC, p.id DESC
            LIMIT $4
            "#,
        )
        .bind(tag_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn insert_post_like(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO post_likes (user_id, post_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_post_like(&self, user_id: UserId, post_id: PostId) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM post_likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_post_bookmark(
        &self,
        user_id: UserId,
        post_id: PostId,
        created_at: TimestampMs,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO post_bookmarks (user_id, post_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(post_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_post_bookmark(&self, user_id: UserId, post_id: PostId) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM post_bookmarks WHERE user_id = $1 AND post_id = $2")
                .bind(user_id)
                .bind(post_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn insert_root_comment(&self, mut comment: PostComment) -> AppResult<PostComment> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query(
            r#"
            INSERT INTO post_comments (post_id, author_id, root_id, parent_id, content, created_at)
            VALUES ($1, $2, 0, NULL, $3, $4)
            RETURNING id
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&mut *tx)
        .await?;
        comment.id = row.get("id");
        comment.root_id = comment.id;

        sqlx::query("UPDATE post_comments SET root_id = id WHERE id = $1")
            .bind(comment.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(comment)
    }

    async fn insert_reply(&self, mut comment: PostComment) -> AppResult<PostComment> {
        let row = sqlx::query(
            r#"
            INSERT INTO post_comments (post_id, author_id, root_id, parent_id, content, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.author_id)
        .bind(comment.root_id)
        .bind(comment.parent_id)
        .bind(&comment.content)
        .bind(comment.created_at)
        .fetch_one(&self.pool)
        .await?;
        comment.id = row.get("id");
        Ok(comment)
    }

    async fn get_comment(&self, id: CommentId) -> AppResult<Option<PostComment>> {
        let row = sqlx::query(&format!(
            "SELECT {} FROM post_comments WHERE id = $1",
            COMMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(comment_from_row))
    }

    async fn mark_comment_deleted(
        &self,
        id: CommentId,
        deleted_at: TimestampMs,
    ) -> AppResult<()> {
        sqlx::query("UPDATE post_comments SET deleted_at = $2 WHERE id = $1")
            .bind(id)
            .bind(deleted_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn inc_reply_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()> {
        sqlx::query("UPDATE post_comments SET reply_count = reply_count + $2 WHERE id = $1")
            .bind(comment_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_root_comments(
        &self,
        post_id: PostId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM post_comments
            WHERE post_id = $1 AND parent_id IS NULL AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND id < $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            COMMENT_COLUMNS
        ))
        .bind(post_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
    }

    async fn list_replies(
        &self,
        root_id: CommentId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<PostComment>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(&format!(
            r#"
            SELECT {} FROM post_comments
            WHERE root_id = $1 AND parent_id IS NOT NULL AND deleted_at IS NULL
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND id < $3))
            ORDER BY created_at DESC, id DESC
            LIMIT $4
            "#,
            COMMENT_COLUMNS
        ))
        .bind(root_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(comment_from_row).collect())
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
        created_at: TimestampMs,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO comment_likes (comment_id, user_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(comment_id)
        .bind(user_id)
        .bind(created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_comment_like(
        &self,
        comment_id: CommentId,
        user_id: UserId,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM comment_likes WHERE comment_id = $1 AND user_id = $2")
                .bind(comment_id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn inc_comment_like_count(&self, comment_id: CommentId, delta: i64) -> AppResult<()> {
        sqlx::query("UPDATE post_comments SET like_count = like_count + $2 WHERE id = $1")
            .bind(comment_id)
            .bind(delta)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl GraphStore for PostgresStore {
    async fn insert_follow(&self, edge: FollowEdge) -> AppResult<bool> {
        let result = sqlx::query(
            "INSERT INTO user_follows (follower_id, followee_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(edge.follower_id)
        .bind(edge.followee_id)
        .bind(edge.created_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn delete_follow(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool> {
        let result = sqlx::query(
            "DELETE FROM user_follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn follow_exists(&self, follower_id: UserId, followee_id: UserId) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 AS one FROM user_follows WHERE follower_id = $1 AND followee_id = $2",
        )
        .bind(follower_id)
        .bind(followee_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn list_followee_ids(&self, follower_id: UserId) -> AppResult<Vec<UserId>> {
        let rows = sqlx::query("SELECT followee_id FROM user_follows WHERE follower_id = $1")
            .bind(follower_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|row| row.get("followee_id")).collect())
    }

    async fn block_and_sever(&self, edge: BlockEdge) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO user_blocks (blocker_id, blocked_id, created_at) VALUES ($1, $2, $3)
             ON CONFLICT DO NOTHING",
        )
        .bind(edge.blocker_id)
        .bind(edge.blocked_id)
        .bind(edge.created_at)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"
            DELETE FROM user_follows
            WHERE (follower_id = $1 AND followee_id = $2)
               OR (follower_id = $2 AND followee_id = $1)
            "#,
        )
        .bind(edge.blocker_id)
        .bind(edge.blocked_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn delete_block(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool> {
        let result =
            sqlx::query("DELETE FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2")
                .bind(blocker_id)
                .bind(blocked_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn block_exists(&self, blocker_id: UserId, blocked_id: UserId) -> AppResult<bool> {
        let row = sqlx::query(
            "SELECT 1 AS one FROM user_blocks WHERE blocker_id = $1 AND blocked_id = $2",
        )
        .bind(blocker_id)
        .bind(blocked_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn blocked_either(&self, a: UserId, b: UserId) -> AppResult<bool> {
        let row = sqlx::query(
            r#"
            SELECT 1 AS one FROM user_blocks
            WHERE (blocker_id = $1 AND blocked_id = $2)
               OR (blocker_id = $2 AND blocked_id = $1)
            LIMIT 1
            "#,
        )
        .bind(a)
        .bind(b)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.is_some())
    }

    async fn list_followers(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(
            r#"
            SELECT follower_id AS user_id, created_at FROM user_follows
            WHERE followee_id = $1
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND follower_id < $3))
            ORDER BY created_at DESC, follower_id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| RelationEdge {
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn list_followings(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(
            r#"
            SELECT followee_id AS user_id, created_at FROM user_follows
            WHERE follower_id = $1
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND followee_id < $3))
            ORDER BY created_at DESC, followee_id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| RelationEdge {
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }

    async fn list_blocks(
        &self,
        user_id: UserId,
        cursor: Cursor,
        limit: usize,
    ) -> AppResult<Vec<RelationEdge>> {
        let (ts, id) = cursor.position().map_or((None, None), |(t, i)| (Some(t), Some(i)));
        let rows = sqlx::query(
            r#"
            SELECT blocked_id AS user_id, created_at FROM user_blocks
            WHERE blocker_id = $1
              AND ($2::bigint IS NULL OR created_at < $2
                   OR (created_at = $2 AND blocked_id < $3))
            ORDER BY created_at DESC, blocked_id DESC
            LIMIT $4
            "#,
        )
        .bind(user_id)
        .bind(ts)
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .iter()
            .map(|row| RelationEdge {
                user_id: row.get("user_id"),
                created_at: row.get("created_at"),
            })
            .collect())
    }
}

#[async_trait]
impl TagStore for PostgresStore {
    async fn find_or_create_tag(&self, tag: Tag) -> AppResult<Tag> {
        sqlx::query("INSERT INTO tags (name, name_lc) VALUES ($1, $2) ON CONFLICT DO NOTHING")
            .bind(&tag.name)
            .bind(&tag.name_lc)
            .execute(&self.pool)
            .await?;
        let row = sqlx::query("SELECT id, name, name_lc FROM tags WHERE name_lc = $1")
            .bind(&tag.name_lc)
            .fetch_one(&self.pool)
            .await?;
        Ok(tag_from_row(&row))
    }

    async fn get_tag(&self, id: TagId) -> AppResult<Option<Tag>> {
        let row = sqlx::query("SELECT id, name, name_lc FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(tag_from_row))
    }

    async fn update_tag(&self, tag: &Tag) -> AppResult<()> {
        sqlx::query("UPDATE tags SET name = $2, name_lc = $3 WHERE id = $1")
            .bind(tag.id)
            .bind(&tag.name)
            .bind(&tag.name_lc)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn delete_tag(&self, id: TagId) -> AppResult<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM post_tags WHERE tag_id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM tags WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_tags(
        &self,
        keyword_lc: Option<&str>,
        after_name_lc: Option<&str>,
        limit: usize,
    ) -> AppResult<Vec<Tag>> {
        let pattern = keyword_lc.map(|k| format!("%{}%", k));
        let rows = sqlx::query(
            r#"
            SELECT id, name, name_lc FROM tags
            WHERE ($1::text IS NULL OR name_lc LIKE $1)
              AND ($2::text IS NULL OR name_lc > $2)
            ORDER BY name_lc ASC
            LIMIT $3
            "#,
        )
        .bind(pattern)
        .bind(after_name_lc)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }

    async fn replace_post_tags(&self, post_id: PostId, tag_ids: &[TagId]) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        for tag_id in tag_ids {
            sqlx::query(
                "INSERT INTO post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn list_post_tags(&self, post_id: PostId) -> AppResult<Vec<Tag>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.name, t.name_lc FROM tags t
            JOIN post_tags pt ON pt.tag_id = t.id
            WHERE pt.post_id = $1
            ORDER BY t.name_lc ASC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(tag_from_row).collect())
    }
}

#[async_trait]
impl StepStore for PostgresStore {
    async fn get_step_day(
        &self,
        user_id: UserId,
        date: NaiveDate,
    ) -> AppResult<Option<StepCount>> {
        let row = sqlx::query("SELECT * FROM step_counts WHERE user_id = $1 AND record_date = $2")
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(step_from_row))
    }

    async fn insert_step_day(&self, record: &StepCount) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO step_counts
                (user_id, record_date, steps, distance_km, kcal, active_minutes,
                 data_source, sync_sequence, version, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(record.user_id)
        .bind(record.record_date)
        .bind(record.steps)
        .bind(record.distance_km)
        .bind(record.kcal)
        .bind(record.active_minutes)
        .bind(&record.data_source)
        .bind(record.sync_sequence)
        .bind(record.version)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update_step_day(
        &self,
        record: &StepCount,
        expected_sequence: i64,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE step_counts
            SET steps = $3, distance_km = $4, kcal = $5, active_minutes = $6,
                data_source = $7, sync_sequence = $8, version = $9, updated_at = $10
            WHERE user_id = $1 AND record_date = $2 AND sync_sequence = $11
            "#,
        )
        .bind(record.user_id)
        .bind(record.record_date)
        .bind(record.steps)
        .bind(record.distance_km)
        .bind(record.kcal)
        .bind(record.active_minutes)
        .bind(&record.data_source)
        .bind(record.sync_sequence)
        .bind(record.version)
        .bind(record.updated_at)
        .bind(expected_sequence)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_updated_after(
        &self,
        user_id: UserId,
        since: TimestampMs,
        limit: usize,
    ) -> AppResult<Vec<StepCount>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM step_counts
            WHERE user_id = $1 AND updated_at > $2
            ORDER BY updated_at DESC
            LIMIT $3
            "#,
        )
        .bind(user_id)
        .bind(since)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(step_from_row).collect())
    }

    async fn list_range(
        &self,
        user_id: UserId,
        from: NaiveDate,
        to: NaiveDate,
    ) -> AppResult<Vec<StepCount>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM step_counts
            WHERE user_id = $1 AND record_date >= $2 AND record_date <= $3
            ORDER BY record_date ASC
            "#,
        )
        .bind(user_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(step_from_row).collect())
    }
}
