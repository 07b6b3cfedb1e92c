// Follow and block edges between users.

use std::sync::Arc;

use serde::Serialize;

use crate::core::cursor::Cursor;
use crate::core::page::{clamp_limit, Page};
use crate::core::{TimestampMs, UserId};
use crate::domain::{BlockEdge, FollowEdge, RelationEdge};
use crate::error::{AppError, AppResult};
use crate::store::GraphStore;

#[derive(Debug, Clone, Serialize)]
pub struct RelationResp {
    pub user_id: UserId,
    pub created_at: TimestampMs,
}

impl From<RelationEdge> for RelationResp {
    fn from(edge: RelationEdge) -> Self {
        RelationResp {
            user_id: edge.user_id,
            created_at: edge.created_at,
        }
    }
}

pub struct RelationService {
    graph: Arc<dyn GraphStore>,
}

impl RelationService {
    pub fn new(graph: Arc<dyn GraphStore>) -> Self {
        Self { graph }
    }

    pub async fn follow(&self, me: UserId, target: UserId) -> AppResult<()> {
        let edge = FollowEdge::create(me, target)?;
        if self.graph.blocked_either(me, target).await? {
            return Err(AppError::UserBlocked);
        }
        if !self.graph.insert_follow(edge).await? {
            return Err(AppError::AlreadyFollowing);
        }
        tracing::debug!(follower = me, followee = target, "follow edge created");
        Ok(())
    }

    pub async fn unfollow(&self, me: UserId, target: UserId) -> AppResult<()> {
        if !self.graph.delete_follow(me, target).await? {
            return Err(AppError::NotFollowing);
        }
        Ok(())
    }

    /// Idempotent: re-blocking an already blocked user succeeds. Any follow
    /// edges between the two users are severed in the same transaction.
    pub async fn block(&self, me: UserId, target: UserId) -> AppResult<()> {
        let edge = BlockEdge::create(me, target)?;
        self.graph.block_and_sever(edge).await?;
        tracing::debug!(blocker = me, blocked = target, "block edge upserted");
        Ok(())
    }

    pub async fn unblock(&self, me: UserId, target: UserId) -> AppResult<()> {
        // No self block-edge can exist, so me == target falls out as
        // NotBlocking like any other absent edge.
        if !self.graph.delete_block(me, target).await? {
            return Err(AppError::NotBlocking);
        }
        Ok(())
    }

    pub async fn is_following(&self, me: UserId, target: UserId) -> AppResult<bool> {
        self.graph.follow_exists(me, target).await
    }

    pub async fn is_blocked(&self, me: UserId, target: UserId) -> AppResult<bool> {
        self.graph.block_exists(me, target).await
    }

    pub async fn is_blocked_by(&self, me: UserId, target: UserId) -> AppResult<bool> {
        self.graph.block_exists(target, me).await
    }

    pub async fn list_followers(
        &self,
        viewer: UserId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<RelationResp>> {
        let limit = clamp_limit(limit);
        let edges = self
            .graph
            .list_followers(viewer, Cursor::parse(cursor), limit + 1)
            .await?;
        self.filter_and_paginate(viewer, edges, limit).await
    }

    pub async fn list_followings(
        &self,
        viewer: UserId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<RelationResp>> {
        let limit = clamp_limit(limit);
        let edges = self
            .graph
            .list_followings(viewer, Cursor::parse(cursor), limit + 1)
            .await?;
        self.filter_and_paginate(viewer, edges, limit).await
    }

    pub async fn list_blocks(
        &self,
        viewer: UserId,
        limit: Option<usize>,
        cursor: Option<&str>,
    ) -> AppResult<Page<RelationResp>> {
        let limit = clamp_limit(limit);
        let edges = self
            .graph
            .list_blocks(viewer, Cursor::parse(cursor), limit + 1)
            .await?;
        // The viewer's own block list is not block-filtered, otherwise it
        // would always come back empty.
        let page = Page::paginate(edges, limit, |e| Cursor::build(e.created_at, e.user_id));
        Ok(map_page(page))
    }

    /// Follower/following listings hide counterparts with a block edge in
    /// either direction.
    async fn filter_and_paginate(
        &self,
        viewer: UserId,
        edges: Vec<RelationEdge>,
        limit: usize,
    ) -> AppResult<Page<RelationResp>> {
        let mut visible = Vec::with_capacity(edges.len());
        for edge in edges {
            if !self.graph.blocked_either(viewer, edge.user_id).await? {
                visible.push(edge);
            }
        }
        let page = Page::paginate(visible, limit, |e| Cursor::build(e.created_at, e.user_id));
        Ok(map_page(page))
    }
}

fn map_page(page: Page<RelationEdge>) -> Page<RelationResp> {
    Page {
        items: page.items.into_iter().map(Into::into).collect(),
        next_cursor: page.next_cursor,
        has_more: page.has_more,
    }
}
