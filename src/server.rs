// HTTP surface. Handlers are thin: resolve the caller's identity, hand off to
// a service, wrap the result.

use axum::{
    extract::{Path, Query, State},
    http::HeaderMap,
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::app_state::AppState;
use crate::core::page::Page;
use crate::core::{CommentId, PostId, TagId, UserId};
use crate::domain::{PostMedia, Tag};
use crate::error::AppResult;
use crate::services::comment_service::{CommentCreateReq, CommentResp, CommentThreadResp};
use crate::services::post_service::{
    MediaItemReq, PostCardResp, PostCreateReq, PostDetailResp, PostUpdateReq,
};
use crate::services::relation_service::RelationResp;
use crate::services::step_service::{
    BatchSyncReq, BatchSyncResp, PullStepsResp, StepDayResp, StepRangeResp, StepSyncReq,
    StepSyncResp,
};
use crate::services::tag_service::ReplacePostTagsReq;

#[derive(Debug, Deserialize)]
struct ListParams {
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CommentListParams {
    limit: Option<usize>,
    cursor: Option<String>,
    preview_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SearchParams {
    keyword: String,
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TagListParams {
    keyword: Option<String>,
    limit: Option<usize>,
    cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PullParams {
    since: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct DayParams {
    date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RangeParams {
    from: Option<String>,
    to: Option<String>,
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/posts", post(create_post).get(list_public_posts))
        .route(
            "/api/posts/{id}",
            get(get_post_detail).patch(update_post).delete(delete_post),
        )
        .route("/api/posts/{id}/publish", post(publish_post))
        .route("/api/posts/{id}/hide", post(hide_post))
        .route("/api/posts/{id}/media", put(replace_post_media))
        .route("/api/posts/{id}/like", post(like_post).delete(unlike_post))
        .route(
            "/api/posts/{id}/bookmark",
            post(bookmark_post).delete(unbookmark_post),
        )
        .route(
            "/api/posts/{id}/comments",
            post(create_comment).get(list_root_comments),
        )
        .route("/api/posts/{id}/tags", put(replace_post_tags))
        .route("/api/posts/search", get(search_posts))
        .route("/api/feed", get(list_follow_feed))
        .route("/api/comments/{id}", delete(delete_comment))
        .route("/api/comments/{id}/replies", get(list_replies))
        .route(
            "/api/comments/{id}/like",
            post(like_comment).delete(unlike_comment),
        )
        .route("/api/users/{id}/follow", post(follow).delete(unfollow))
        .route("/api/users/{id}/block", post(block).delete(unblock))
        .route("/api/relations/followers", get(list_followers))
        .route("/api/relations/followings", get(list_followings))
        .route("/api/relations/blocks", get(list_blocks))
        .route("/api/tags", post(create_tag).get(list_tags))
        .route("/api/tags/{id}", axum::routing::patch(update_tag).delete(delete_tag))
        .route("/api/tags/{id}/posts", get(list_posts_by_tag))
        .route("/api/steps/sync", post(sync_steps))
        .route("/api/steps/sync/batch", post(batch_sync_steps))
        .route("/api/steps/pull", get(pull_steps))
        .route("/api/steps/day", get(get_step_day))
        .route("/api/steps/range", get(get_step_range))
        .layer(ServiceBuilder::new().layer(CorsLayer::permissive()))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn caller(state: &AppState, headers: &HeaderMap) -> AppResult<UserId> {
    state.identity.authenticate(headers)
}

// ---- posts ----

async fn create_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<PostCreateReq>,
) -> AppResult<Json<PostDetailResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.posts.create_post(user, req).await?))
}

async fn update_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
    Json(req): Json<PostUpdateReq>,
) -> AppResult<Json<PostDetailResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.posts.update_post(user, id, req).await?))
}

async fn publish_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.publish_post(user, id).await?;
    Ok(Json(json!({ "published": true })))
}

async fn hide_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.hide_post(user, id).await?;
    Ok(Json(json!({ "hidden": true })))
}

async fn delete_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.delete_post(user, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn replace_post_media(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
    Json(items): Json<Vec<MediaItemReq>>,
) -> AppResult<Json<Vec<PostMedia>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.posts.replace_media(user, id, items).await?))
}

async fn get_post_detail(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<PostDetailResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.posts.get_detail(user, id).await?))
}

async fn list_public_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<PostCardResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .posts
            .list_public(user, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn list_follow_feed(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<PostCardResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .posts
            .list_follow_feed(user, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn search_posts(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<SearchParams>,
) -> AppResult<Json<Page<PostCardResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .posts
            .search(user, &params.keyword, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn like_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.like_post(user, id).await?;
    Ok(Json(json!({ "liked": true })))
}

async fn unlike_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.unlike_post(user, id).await?;
    Ok(Json(json!({ "liked": false })))
}

async fn bookmark_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.bookmark_post(user, id).await?;
    Ok(Json(json!({ "bookmarked": true })))
}

async fn unbookmark_post(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<PostId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.posts.unbookmark_post(user, id).await?;
    Ok(Json(json!({ "bookmarked": false })))
}

// ---- comments ----

async fn create_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<PostId>,
    Json(req): Json<CommentCreateReq>,
) -> AppResult<Json<CommentResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.comments.create_comment(user, post_id, req).await?))
}

async fn delete_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<CommentId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.comments.delete_comment(user, id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn list_root_comments(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<PostId>,
    Query(params): Query<CommentListParams>,
) -> AppResult<Json<Page<CommentThreadResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .comments
            .list_root_comments(
                user,
                post_id,
                params.limit,
                params.cursor.as_deref(),
                params.preview_size,
            )
            .await?,
    ))
}

async fn list_replies(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(root_id): Path<CommentId>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<CommentResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .comments
            .list_replies(user, root_id, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn like_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<CommentId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.comments.like_comment(user, id).await?;
    Ok(Json(json!({ "liked": true })))
}

async fn unlike_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<CommentId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.comments.unlike_comment(user, id).await?;
    Ok(Json(json!({ "liked": false })))
}

// ---- relations ----

async fn follow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.relations.follow(user, target).await?;
    Ok(Json(json!({ "following": true })))
}

async fn unfollow(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.relations.unfollow(user, target).await?;
    Ok(Json(json!({ "following": false })))
}

async fn block(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.relations.block(user, target).await?;
    Ok(Json(json!({ "blocked": true })))
}

async fn unblock(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(target): Path<UserId>,
) -> AppResult<Json<Value>> {
    let user = caller(&state, &headers)?;
    state.relations.unblock(user, target).await?;
    Ok(Json(json!({ "blocked": false })))
}

async fn list_followers(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<RelationResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .relations
            .list_followers(user, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn list_followings(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<RelationResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .relations
            .list_followings(user, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn list_blocks(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<RelationResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .relations
            .list_blocks(user, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

// ---- tags ----

#[derive(Debug, Deserialize)]
struct TagNameReq {
    name: String,
}

async fn create_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<TagNameReq>,
) -> AppResult<Json<Tag>> {
    caller(&state, &headers)?;
    Ok(Json(state.tags.create_tag(&req.name).await?))
}

async fn update_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<TagId>,
    Json(req): Json<TagNameReq>,
) -> AppResult<Json<Tag>> {
    caller(&state, &headers)?;
    Ok(Json(state.tags.update_tag(id, &req.name).await?))
}

async fn delete_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<TagId>,
) -> AppResult<Json<Value>> {
    caller(&state, &headers)?;
    state.tags.delete_tag(id).await?;
    Ok(Json(json!({ "deleted": true })))
}

async fn list_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<TagListParams>,
) -> AppResult<Json<Page<Tag>>> {
    caller(&state, &headers)?;
    Ok(Json(
        state
            .tags
            .list_tags(params.keyword.as_deref(), params.limit, params.cursor.as_deref())
            .await?,
    ))
}

async fn replace_post_tags(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(post_id): Path<PostId>,
    Json(req): Json<ReplacePostTagsReq>,
) -> AppResult<Json<Vec<Tag>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.tags.replace_post_tags(user, post_id, req).await?))
}

async fn list_posts_by_tag(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(tag_id): Path<TagId>,
    Query(params): Query<ListParams>,
) -> AppResult<Json<Page<PostCardResp>>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .tags
            .list_posts_by_tag(user, tag_id, params.limit, params.cursor.as_deref())
            .await?,
    ))
}

// ---- steps ----

async fn sync_steps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<StepSyncReq>,
) -> AppResult<Json<StepSyncResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.steps.sync_steps(user, &req).await?))
}

async fn batch_sync_steps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<BatchSyncReq>,
) -> AppResult<Json<BatchSyncResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.steps.batch_sync(user, req).await?))
}

async fn pull_steps(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<PullParams>,
) -> AppResult<Json<PullStepsResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(state.steps.pull_steps(user, params.since).await?))
}

async fn get_step_day(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<DayParams>,
) -> AppResult<Json<StepDayResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state.steps.get_step_day(user, params.date.as_deref()).await?,
    ))
}

async fn get_step_range(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<RangeParams>,
) -> AppResult<Json<StepRangeResp>> {
    let user = caller(&state, &headers)?;
    Ok(Json(
        state
            .steps
            .get_range(user, params.from.as_deref(), params.to.as_deref())
            .await?,
    ))
}
