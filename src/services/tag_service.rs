// Tag index: idempotent creation keyed on the lowercase name, alphabetical
// listing, and replace-all post associations.

use std::sync::Arc;

use serde::Deserialize;

use crate::core::cursor::Cursor;
use crate::core::page::{clamp_limit, Page};
use crate::core::{PostId, TagId, UserId};
use crate::domain::Tag;
use crate::error::{AppError, AppResult};
use crate::services::filter_blocked_and_paginate;
use crate::services::post_service::{cards_for_page, PostCardResp};
use crate::store::{ContentStore, GraphStore, TagStore};

#[derive(Debug, Clone, Deserialize)]
pub struct ReplacePostTagsReq {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub tag_ids: Vec<TagId>,
}

pub struct TagService {
    tags: Arc<dyn TagStore>,
    content: Arc<dyn ContentStore>,
    graph: Arc<dyn GraphStore>,
}

impl TagService {
    pub fn new(
        tags: Arc<dyn TagStore>,
        content: Arc<dyn ContentStore>,
        graph: Arc<dyn GraphStore>,
    ) -> Self {
        Self {
            tags,
            content,
            graph,
        }
    }

    /// Idempotent by normalized name: the existing tag comes back when one
    /// matches case-insensitively.
    pub async fn create_tag(&self, name: &str) -> AppResult<Tag> {
        self.tags.find_or_create_tag(Tag::create(name)?).await
    }

    pub async fn update_tag(&self, id: TagId, new_name: &str) -> AppResult<Tag> {
        let mut tag = self.tags.get_tag(id).await?.ok_or(AppError::TagNotFound)?;
        tag.rename(new_name)?;
        self.tags.update_tag(&tag).await?;
        Ok(tag)
    }

    pub async fn delete_tag(&self, id: TagId) -> AppResult<()> {
        if !self.tags.delete_tag(id).await? {
            return Err(AppError::TagNotFound);
        }
        Ok(())
    }

    /// Alphabetical listing; the cursor is the last item's lowercase name.
    pub async fn list_tags(
        &self,
        keyword: Option<&str>,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<Tag>> {
        let limit = clamp_limit(limit);
        let keyword_lc = keyword
            .map(|k| k.trim().to_lowercase())
            .filter(|k| !k.is_empty());
        let after = cursor.map(str::trim).filter(|c| !c.is_empty());
        let tags = self
            .tags
            .list_tags(keyword_lc.as_deref(), after, limit + 1)
            .await?;
        Ok(Page::paginate(tags, limit, |t| t.name_lc.clone()))
    }

    /// Replace the post's tag set: names are resolved (creating tags as
    /// needed), unioned with the explicit ids, and the association rows are
    /// swapped wholesale. Only the post author may do this.
    pub async fn replace_post_tags(
        &self,
        user_id: UserId,
        post_id: PostId,
        req: ReplacePostTagsReq,
    ) -> AppResult<Vec<Tag>> {
        let post = self
            .content
            .get_post(post_id)
            .await?
            .ok_or(AppError::PostNotFound)?;
        post.ensure_modifiable(user_id)?;

        let mut tag_ids: Vec<TagId> = Vec::with_capacity(req.names.len() + req.tag_ids.len());
        for name in &req.names {
            let tag = self.create_tag(name).await?;
            if !tag_ids.contains(&tag.id) {
                tag_ids.push(tag.id);
            }
        }
        for id in &req.tag_ids {
            self.tags.get_tag(*id).await?.ok_or(AppError::TagNotFound)?;
            if !tag_ids.contains(id) {
                tag_ids.push(*id);
            }
        }

        self.tags.replace_post_tags(post_id, &tag_ids).await?;
        self.tags.list_post_tags(post_id).await
    }

    pub async fn list_posts_by_tag(
        &self,
        viewer: UserId,
        tag_id: TagId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<PostCardResp>> {
        self.tags
            .get_tag(tag_id)
            .await?
            .ok_or(AppError::TagNotFound)?;
        let limit = clamp_limit(limit);
        let posts = self
            .content
            .list_posts_by_tag(tag_id, Cursor::parse(cursor), limit + 1)
            .await?;
        let page = filter_blocked_and_paginate(&*self.graph, viewer, posts, limit).await?;
        cards_for_page(&*self.content, page).await
    }
}
