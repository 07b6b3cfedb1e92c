// Post lifecycle, feed listings and the like/bookmark ledger.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::cursor::Cursor;
use crate::core::page::{clamp_limit, Page};
use crate::core::{current_time_millis, PostId, TimestampMs, UserId};
use crate::domain::{MediaType, Post, PostMedia, Tag, Visibility};
use crate::error::{AppError, AppResult};
use crate::object_store::ObjectStore;
use crate::services::{filter_blocked_and_paginate, load_readable_post};
use crate::store::{ContentStore, GraphStore, TagStore};

#[derive(Debug, Clone, Deserialize)]
pub struct MediaItemReq {
    pub object_key: String,
    pub url: String,
    pub mime_type: String,
    #[serde(default)]
    pub width: i32,
    #[serde(default)]
    pub height: i32,
    #[serde(default)]
    pub blurhash: Option<String>,
    #[serde(default)]
    pub checksum: Option<String>,
    #[serde(default)]
    pub bytes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostCreateReq {
    pub title: String,
    #[serde(default)]
    pub caption: Option<String>,
    #[serde(default)]
    pub publish: bool,
    #[serde(default)]
    pub media: Vec<MediaItemReq>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostUpdateReq {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Listing row: enough for a feed card, cover image included.
#[derive(Debug, Clone, Serialize)]
pub struct PostCardResp {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub cover_url: Option<String>,
    pub media_count: i32,
    pub created_at: TimestampMs,
}

#[derive(Debug, Clone, Serialize)]
pub struct PostDetailResp {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub caption: Option<String>,
    pub visibility: Visibility,
    pub media: Vec<PostMedia>,
    pub tags: Vec<Tag>,
    pub like_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
}

fn media_rows(post_id: PostId, items: &[MediaItemReq]) -> Vec<PostMedia> {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| PostMedia {
            id: 0,
            post_id,
            media_type: MediaType::from_mime(&item.mime_type),
            object_key: item.object_key.clone(),
            url: item.url.clone(),
            width: item.width,
            height: item.height,
            sort_order: i as i32,
            blurhash: item.blurhash.clone(),
            checksum: item.checksum.clone(),
            bytes: item.bytes,
            mime_type: item.mime_type.clone(),
        })
        .collect()
}

fn card_of(post: &Post, cover: Option<PostMedia>) -> PostCardResp {
    PostCardResp {
        id: post.id,
        author_id: post.author_id,
        title: post.title.clone(),
        cover_url: cover.map(|m| m.url),
        media_count: post.media_count,
        created_at: post.created_at,
    }
}

/// Map a page of posts to feed cards, resolving the cover images
/// concurrently.
pub(crate) async fn cards_for_page(
    content: &dyn ContentStore,
    page: Page<Post>,
) -> AppResult<Page<PostCardResp>> {
    let covers =
        futures::future::try_join_all(page.items.iter().map(|p| content.first_media(p.id)))
            .await?;
    let cards = page
        .items
        .iter()
        .zip(covers)
        .map(|(post, cover)| card_of(post, cover))
        .collect();
    Ok(Page {
        items: cards,
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    })
}

pub struct PostService {
    content: Arc<dyn ContentStore>,
    graph: Arc<dyn GraphStore>,
    tags: Arc<dyn TagStore>,
    objects: Arc<dyn ObjectStore>,
}

impl PostService {
    pub fn new(
        content: Arc<dyn ContentStore>,
        graph: Arc<dyn GraphStore>,
        tags: Arc<dyn TagStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            content,
            graph,
            tags,
            objects,
        }
    }

    pub async fn create_post(&self, author_id: UserId, req: PostCreateReq) -> AppResult<PostDetailResp> {
        let post = Post::create(
            author_id,
            &req.title,
            req.caption,
            req.publish,
            req.media.len() as i32,
        )?;
        let post = self
            .content
            .create_post(post, media_rows(0, &req.media))
            .await?;

        if !req.tags.is_empty() {
            let mut tag_ids = Vec::with_capacity(req.tags.len());
            for name in &req.tags {
                let tag = self.tags.find_or_create_tag(Tag::create(name)?).await?;
                if !tag_ids.contains(&tag.id) {
                    tag_ids.push(tag.id);
                }
            }
            self.tags.replace_post_tags(post.id, &tag_ids).await?;
        }

        tracing::info!(post_id = post.id, author_id, "post created");
        self.detail_of(post).await
    }

    pub async fn update_post(
        &self,
        user_id: UserId,
        post_id: PostId,
        req: PostUpdateReq,
    ) -> AppResult<PostDetailResp> {
        let mut post = self.load_own_post(user_id, post_id).await?;
        post.update_title(req.title.as_deref())?;
        post.update_caption(req.caption);
        self.content.update_post(&post).await?;
        self.detail_of(post).await
    }

    pub async fn publish_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let mut post = self.load_own_post(user_id, post_id).await?;
        post.publish();
        self.content.update_post(&post).await
    }

    pub async fn hide_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let mut post = self.load_own_post(user_id, post_id).await?;
        post.hide();
        self.content.update_post(&post).await
    }

    pub async fn delete_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let mut post = self.load_own_post(user_id, post_id).await?;
        post.delete();
        self.content.update_post(&post).await?;
        tracing::info!(post_id, "post deleted");
        Ok(())
    }

    /// Replace the post's media set. The previous objects are removed from
    /// object storage after the rows are swapped.
    pub async fn replace_media(
        &self,
        user_id: UserId,
        post_id: PostId,
        items: Vec<MediaItemReq>,
    ) -> AppResult<Vec<PostMedia>> {
        let mut post = self.load_own_post(user_id, post_id).await?;
        let old = self.content.list_media(post_id).await?;

        self.content
            .replace_media(post_id, media_rows(post_id, &items))
            .await?;
        post.update_media_count(items.len() as i32);
        self.content.update_post(&post).await?;

        // The replacement is already persisted; a failed object delete only
        // leaks the old blob, so cleanup is best-effort.
        for media in old {
            if let Err(err) = self.objects.delete(&media.object_key).await {
                tracing::warn!(
                    post_id,
                    key = %media.object_key,
                    "stale media cleanup failed: {}",
                    err
                );
            }
        }
        self.content.list_media(post_id).await
    }

    pub async fn get_detail(&self, viewer: UserId, post_id: PostId) -> AppResult<PostDetailResp> {
        let post = load_readable_post(&*self.content, &*self.graph, viewer, post_id).await?;
        self.detail_of(post).await
    }

    pub async fn list_public(
        &self,
        viewer: UserId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<PostCardResp>> {
        let limit = clamp_limit(limit);
        let posts = self
            .content
            .list_public_posts(Cursor::parse(cursor), limit + 1)
            .await?;
        let page = filter_blocked_and_paginate(&*self.graph, viewer, posts, limit).await?;
        cards_for_page(&*self.content, page).await
    }

    pub async fn list_follow_feed(
        &self,
        viewer: UserId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<PostCardResp>> {
        let limit = clamp_limit(limit);
        let followees = self.graph.list_followee_ids(viewer).await?;
        if followees.is_empty() {
            return Ok(Page::empty());
        }
        let posts = self
            .content
            .list_feed_posts(&followees, Cursor::parse(cursor), limit + 1)
            .await?;
        let page = filter_blocked_and_paginate(&*self.graph, viewer, posts, limit).await?;
        cards_for_page(&*self.content, page).await
    }

    pub async fn search(
        &self,
        viewer: UserId,
        keyword: &str,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<PostCardResp>> {
        let keyword = keyword.trim();
        if keyword.is_empty() {
            return Err(AppError::InvalidParam("search keyword is blank".to_string()));
        }
        let limit = clamp_limit(limit);
        let posts = self
            .content
            .search_public_posts(keyword, Cursor::parse(cursor), limit + 1)
            .await?;
        let page = filter_blocked_and_paginate(&*self.graph, viewer, posts, limit).await?;
        cards_for_page(&*self.content, page).await
    }

    pub async fn like_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let post = load_readable_post(&*self.content, &*self.graph, user_id, post_id).await?;
        let inserted = self
            .content
            .insert_post_like(user_id, post.id, current_time_millis())
            .await?;
        if !inserted {
            return Err(AppError::AlreadyLiked);
        }
        self.content.inc_like_count(post.id, 1).await
    }

    pub async fn unlike_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let post = load_readable_post(&*self.content, &*self.graph, user_id, post_id).await?;
        let deleted = self.content.delete_post_like(user_id, post.id).await?;
        if !deleted {
            return Err(AppError::NotLiked);
        }
        self.content.inc_like_count(post.id, -1).await
    }

    pub async fn bookmark_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let post = load_readable_post(&*self.content, &*self.graph, user_id, post_id).await?;
        let inserted = self
            .content
            .insert_post_bookmark(user_id, post.id, current_time_millis())
            .await?;
        if !inserted {
            return Err(AppError::AlreadyBookmarked);
        }
        self.content.inc_bookmark_count(post.id, 1).await
    }

    pub async fn unbookmark_post(&self, user_id: UserId, post_id: PostId) -> AppResult<()> {
        let post = load_readable_post(&*self.content, &*self.graph, user_id, post_id).await?;
        let deleted = self.content.delete_post_bookmark(user_id, post.id).await?;
        if !deleted {
            return Err(AppError::NotBookmarked);
        }
        self.content.inc_bookmark_count(post.id, -1).await
    }

    /// Live post owned by `user_id`, for mutation paths.
    async fn load_own_post(&self, user_id: UserId, post_id: PostId) -> AppResult<Post> {
        let post = self
            .content
            .get_post(post_id)
            .await?
            .ok_or(AppError::PostNotFound)?;
        post.ensure_modifiable(user_id)?;
        Ok(post)
    }

    async fn detail_of(&self, post: Post) -> AppResult<PostDetailResp> {
        let media = self.content.list_media(post.id).await?;
        let tags = self.tags.list_post_tags(post.id).await?;
        let stats = self
            .content
            .get_statistics(post.id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("missing statistics for post {}", post.id)))?;
        Ok(PostDetailResp {
            id: post.id,
            author_id: post.author_id,
            title: post.title,
            caption: post.caption,
            visibility: post.visibility,
            media,
            tags,
            like_count: stats.like_count,
            comment_count: stats.comment_count,
            bookmark_count: stats.bookmark_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
        })
    }
}
