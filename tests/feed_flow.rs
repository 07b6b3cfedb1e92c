// End-to-end feed flows over the in-memory backend: post lifecycle, the
// like/bookmark ledger, comment threads and block-based visibility.

use std::sync::Arc;

use aura_feed::error::{AppError, AppResult};
use aura_feed::object_store::ObjectStore;
use aura_feed::services::comment_service::CommentCreateReq;
use aura_feed::services::post_service::{MediaItemReq, PostCreateReq, PostService, PostUpdateReq};
use aura_feed::store::MemoryStore;
use aura_feed::AppState;

fn post_req(title: &str, publish: bool) -> PostCreateReq {
    serde_json::from_value(serde_json::json!({
        "title": title,
        "publish": publish,
    }))
    .unwrap()
}

fn comment_req(content: &str, parent_id: Option<i64>) -> CommentCreateReq {
    serde_json::from_value(serde_json::json!({
        "content": content,
        "parent_id": parent_id,
    }))
    .unwrap()
}

#[tokio::test]
async fn post_like_comment_scenario() {
    let state = AppState::in_memory();

    let post = state
        .posts
        .create_post(1, post_req("Run log", true))
        .await
        .unwrap();
    assert_eq!(post.author_id, 1);
    assert_eq!(post.like_count, 0);
    assert_eq!(post.comment_count, 0);
    assert_eq!(post.bookmark_count, 0);

    // like is unique per (user, post)
    state.posts.like_post(2, post.id).await.unwrap();
    assert!(matches!(
        state.posts.like_post(2, post.id).await,
        Err(AppError::AlreadyLiked)
    ));
    let detail = state.posts.get_detail(2, post.id).await.unwrap();
    assert_eq!(detail.like_count, 1);

    // root comment, then a reply that bumps the root's reply count
    let root = state
        .comments
        .create_comment(3, post.id, comment_req("nice!", None))
        .await
        .unwrap();
    assert_eq!(root.root_id, root.id);
    assert_eq!(root.parent_id, None);

    let reply = state
        .comments
        .create_comment(1, post.id, comment_req("thanks", Some(root.id)))
        .await
        .unwrap();
    assert_eq!(reply.root_id, root.id);
    assert_eq!(reply.parent_id, Some(root.id));

    let detail = state.posts.get_detail(2, post.id).await.unwrap();
    assert_eq!(detail.comment_count, 2);

    let threads = state
        .comments
        .list_root_comments(2, post.id, None, None, None)
        .await
        .unwrap();
    assert_eq!(threads.items.len(), 1);
    assert_eq!(threads.items[0].root.reply_count, 1);
    assert_eq!(threads.items[0].replies.len(), 1);

    // a nested reply still flattens under the same root
    let nested = state
        .comments
        .create_comment(3, post.id, comment_req("welcome", Some(reply.id)))
        .await
        .unwrap();
    assert_eq!(nested.root_id, root.id);
    assert_eq!(nested.parent_id, Some(reply.id));

    let threads = state
        .comments
        .list_root_comments(2, post.id, None, None, None)
        .await
        .unwrap();
    assert_eq!(threads.items[0].root.reply_count, 2);

    // deleting a reply decrements the root's count and the post's total
    state.comments.delete_comment(3, nested.id).await.unwrap();
    let threads = state
        .comments
        .list_root_comments(2, post.id, None, None, None)
        .await
        .unwrap();
    assert_eq!(threads.items[0].root.reply_count, 1);
    let detail = state.posts.get_detail(2, post.id).await.unwrap();
    assert_eq!(detail.comment_count, 2);
}

#[tokio::test]
async fn unlike_and_bookmark_preconditions() {
    let state = AppState::in_memory();
    let post = state
        .posts
        .create_post(1, post_req("t", true))
        .await
        .unwrap();

    assert!(matches!(
        state.posts.unlike_post(2, post.id).await,
        Err(AppError::NotLiked)
    ));

    state.posts.bookmark_post(2, post.id).await.unwrap();
    assert!(matches!(
        state.posts.bookmark_post(2, post.id).await,
        Err(AppError::AlreadyBookmarked)
    ));
    state.posts.unbookmark_post(2, post.id).await.unwrap();
    assert!(matches!(
        state.posts.unbookmark_post(2, post.id).await,
        Err(AppError::NotBookmarked)
    ));

    let detail = state.posts.get_detail(2, post.id).await.unwrap();
    assert_eq!(detail.bookmark_count, 0);
}

#[tokio::test]
async fn draft_and_deleted_posts_read_as_missing() {
    let state = AppState::in_memory();

    let draft = state
        .posts
        .create_post(1, post_req("draft", false))
        .await
        .unwrap();
    assert!(matches!(
        state.posts.get_detail(2, draft.id).await,
        Err(AppError::PostNotFound)
    ));

    state.posts.publish_post(1, draft.id).await.unwrap();
    assert!(state.posts.get_detail(2, draft.id).await.is_ok());

    state.posts.hide_post(1, draft.id).await.unwrap();
    assert!(matches!(
        state.posts.get_detail(2, draft.id).await,
        Err(AppError::PostNotFound)
    ));

    state.posts.publish_post(1, draft.id).await.unwrap();
    state.posts.delete_post(1, draft.id).await.unwrap();
    assert!(matches!(
        state.posts.get_detail(2, draft.id).await,
        Err(AppError::PostNotFound)
    ));
    // deleted posts are gone for the author's mutations too
    assert!(matches!(
        state.posts.publish_post(1, draft.id).await,
        Err(AppError::PostNotFound)
    ));
}

#[tokio::test]
async fn only_the_author_may_mutate() {
    let state = AppState::in_memory();
    let post = state
        .posts
        .create_post(1, post_req("mine", true))
        .await
        .unwrap();

    let update: PostUpdateReq = serde_json::from_value(serde_json::json!({
        "title": "stolen"
    }))
    .unwrap();
    assert!(matches!(
        state.posts.update_post(2, post.id, update).await,
        Err(AppError::Forbidden(_))
    ));
    assert!(matches!(
        state.posts.delete_post(2, post.id).await,
        Err(AppError::Forbidden(_))
    ));
}

#[tokio::test]
async fn blocked_users_cannot_see_or_interact() {
    let state = AppState::in_memory();
    let post = state
        .posts
        .create_post(1, post_req("visible", true))
        .await
        .unwrap();

    assert!(state.posts.get_detail(2, post.id).await.is_ok());

    state.relations.block(1, 2).await.unwrap();

    // blocked in either direction reads as missing, never Forbidden
    assert!(matches!(
        state.posts.get_detail(2, post.id).await,
        Err(AppError::PostNotFound)
    ));
    assert!(matches!(
        state.posts.like_post(2, post.id).await,
        Err(AppError::PostNotFound)
    ));
    assert!(matches!(
        state
            .comments
            .create_comment(2, post.id, comment_req("hi", None))
            .await,
        Err(AppError::PostNotFound)
    ));

    // listings drop the blocked author's posts
    let page = state.posts.list_public(2, None, None).await.unwrap();
    assert!(page.items.iter().all(|c| c.author_id != 1));

    state.relations.unblock(1, 2).await.unwrap();
    assert!(state.posts.get_detail(2, post.id).await.is_ok());
}

#[tokio::test]
async fn block_filtering_trims_the_overfetched_page_window() {
    let state = AppState::in_memory();
    let oldest = state
        .posts
        .create_post(1, post_req("first", true))
        .await
        .unwrap();
    state
        .posts
        .create_post(2, post_req("second", true))
        .await
        .unwrap();
    let newest = state
        .posts
        .create_post(1, post_req("third", true))
        .await
        .unwrap();
    state.relations.block(3, 2).await.unwrap();

    // The block filter runs on the limit+1 window, so a dropped row can end
    // the listing before older visible posts are reached.
    let page = state.posts.list_public(3, Some(1), None).await.unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, newest.id);
    assert!(!page.has_more);

    // A window wide enough to absorb the dropped row sees everything.
    let page = state.posts.list_public(3, Some(10), None).await.unwrap();
    let ids: Vec<i64> = page.items.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![newest.id, oldest.id]);
}

struct FailingCleanupStore;

#[async_trait::async_trait]
impl ObjectStore for FailingCleanupStore {
    async fn upload(&self, _bytes: Vec<u8>, _content_type: &str) -> AppResult<(String, String)> {
        Ok(("memory://fixed".to_string(), "fixed".to_string()))
    }

    async fn delete(&self, _key: &str) -> AppResult<()> {
        Err(AppError::Internal("object store offline".to_string()))
    }

    async fn presign(&self, key: &str, _ttl_minutes: u32) -> AppResult<String> {
        Ok(format!("memory://{}", key))
    }

    async fn exists(&self, _key: &str) -> AppResult<bool> {
        Ok(true)
    }
}

fn media_items(keys: &[&str]) -> Vec<MediaItemReq> {
    keys.iter()
        .map(|key| {
            serde_json::from_value(serde_json::json!({
                "object_key": key,
                "url": format!("memory://{}", key),
                "mime_type": "image/jpeg",
            }))
            .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn media_replacement_survives_failed_object_cleanup() {
    let store = Arc::new(MemoryStore::new());
    let posts = PostService::new(
        store.clone(),
        store.clone(),
        store.clone(),
        Arc::new(FailingCleanupStore),
    );

    let mut req = post_req("with media", true);
    req.media = media_items(&["old-a", "old-b"]);
    let post = posts.create_post(1, req).await.unwrap();
    assert_eq!(post.media.len(), 2);

    // the new media set is persisted even though deleting the old objects fails
    let media = posts
        .replace_media(1, post.id, media_items(&["new-a"]))
        .await
        .unwrap();
    assert_eq!(media.len(), 1);
    assert_eq!(media[0].object_key, "new-a");

    let detail = posts.get_detail(2, post.id).await.unwrap();
    assert_eq!(detail.media.len(), 1);
    assert_eq!(detail.media[0].object_key, "new-a");
}

#[tokio::test]
async fn pagination_visits_every_post_exactly_once() {
    let state = AppState::in_memory();
    let mut created = Vec::new();
    for i in 0..25 {
        let post = state
            .posts
            .create_post(1, post_req(&format!("post {}", i), true))
            .await
            .unwrap();
        created.push(post.id);
    }

    for limit in [1usize, 7, 20, 100] {
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = state
                .posts
                .list_public(9, Some(limit), cursor.as_deref())
                .await
                .unwrap();
            for card in &page.items {
                seen.push((card.created_at, card.id));
            }
            if !page.has_more {
                assert!(page.next_cursor.is_none());
                break;
            }
            cursor = page.next_cursor.clone();
            assert!(cursor.is_some());
        }

        assert_eq!(seen.len(), created.len(), "limit {}", limit);
        // strictly descending (created_at, id), so no duplicates or omissions
        for pair in seen.windows(2) {
            assert!(pair[0] > pair[1], "limit {}", limit);
        }
        let mut ids: Vec<i64> = seen.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        let mut expected = created.clone();
        expected.sort_unstable();
        assert_eq!(ids, expected);
    }
}

#[tokio::test]
async fn follow_feed_and_search() {
    let state = AppState::in_memory();
    state
        .posts
        .create_post(1, post_req("morning run", true))
        .await
        .unwrap();
    state
        .posts
        .create_post(2, post_req("lunch walk", true))
        .await
        .unwrap();

    // empty feed before following anyone
    let feed = state.posts.list_follow_feed(3, None, None).await.unwrap();
    assert!(feed.items.is_empty());

    state.relations.follow(3, 1).await.unwrap();
    let feed = state.posts.list_follow_feed(3, None, None).await.unwrap();
    assert_eq!(feed.items.len(), 1);
    assert_eq!(feed.items[0].author_id, 1);

    let hits = state.posts.search(3, "run", None, None).await.unwrap();
    assert_eq!(hits.items.len(), 1);
    assert_eq!(hits.items[0].title, "morning run");

    assert!(matches!(
        state.posts.search(3, "   ", None, None).await,
        Err(AppError::InvalidParam(_))
    ));
}

#[tokio::test]
async fn comment_likes_and_reply_listing() {
    let state = AppState::in_memory();
    let post = state
        .posts
        .create_post(1, post_req("p", true))
        .await
        .unwrap();
    let root = state
        .comments
        .create_comment(2, post.id, comment_req("root", None))
        .await
        .unwrap();
    for i in 0..5 {
        state
            .comments
            .create_comment(3, post.id, comment_req(&format!("r{}", i), Some(root.id)))
            .await
            .unwrap();
    }

    let replies = state
        .comments
        .list_replies(1, root.id, Some(3), None)
        .await
        .unwrap();
    assert_eq!(replies.items.len(), 3);
    assert!(replies.has_more);

    let rest = state
        .comments
        .list_replies(1, root.id, Some(3), replies.next_cursor.as_deref())
        .await
        .unwrap();
    assert_eq!(rest.items.len(), 2);
    assert!(!rest.has_more);

    state.comments.like_comment(1, root.id).await.unwrap();
    assert!(matches!(
        state.comments.like_comment(1, root.id).await,
        Err(AppError::AlreadyLiked)
    ));
    let threads = state
        .comments
        .list_root_comments(1, post.id, None, None, Some(0))
        .await
        .unwrap();
    assert_eq!(threads.items[0].root.like_count, 1);
    assert!(threads.items[0].replies.is_empty());

    state.comments.unlike_comment(1, root.id).await.unwrap();
    assert!(matches!(
        state.comments.unlike_comment(1, root.id).await,
        Err(AppError::NotLiked)
    ));
}

#[tokio::test]
async fn comment_deletion_permissions() {
    let state = AppState::in_memory();
    let post = state
        .posts
        .create_post(1, post_req("p", true))
        .await
        .unwrap();
    let comment = state
        .comments
        .create_comment(2, post.id, comment_req("c", None))
        .await
        .unwrap();

    // a third party may not delete
    assert!(matches!(
        state.comments.delete_comment(3, comment.id).await,
        Err(AppError::Forbidden(_))
    ));
    // the post author may
    state.comments.delete_comment(1, comment.id).await.unwrap();
    assert!(matches!(
        state.comments.delete_comment(1, comment.id).await,
        Err(AppError::CommentNotFound)
    ));
    // replying to a deleted comment fails
    assert!(matches!(
        state
            .comments
            .create_comment(2, post.id, comment_req("r", Some(comment.id)))
            .await,
        Err(AppError::CommentNotFound)
    ));
}
