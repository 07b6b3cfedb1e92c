// Tag index and relationship graph flows over the in-memory backend.

use aura_feed::error::AppError;
use aura_feed::services::post_service::PostCreateReq;
use aura_feed::services::tag_service::ReplacePostTagsReq;
use aura_feed::AppState;

fn post_req(title: &str) -> PostCreateReq {
    serde_json::from_value(serde_json::json!({
        "title": title,
        "publish": true,
    }))
    .unwrap()
}

#[tokio::test]
async fn tag_creation_is_idempotent_by_lowercase_name() {
    let state = AppState::in_memory();

    let first = state.tags.create_tag("  Running ").await.unwrap();
    assert_eq!(first.name, "Running");
    assert_eq!(first.name_lc, "running");

    let second = state.tags.create_tag("running").await.unwrap();
    assert_eq!(second.id, first.id);
    let third = state.tags.create_tag("RUNNING").await.unwrap();
    assert_eq!(third.id, first.id);

    assert!(matches!(
        state.tags.create_tag("   ").await,
        Err(AppError::InvalidParam(_))
    ));
}

#[tokio::test]
async fn tag_rename_and_delete() {
    let state = AppState::in_memory();
    let tag = state.tags.create_tag("hike").await.unwrap();

    let renamed = state.tags.update_tag(tag.id, "Trail Hike").await.unwrap();
    assert_eq!(renamed.name, "Trail Hike");
    assert_eq!(renamed.name_lc, "trail hike");

    state.tags.delete_tag(tag.id).await.unwrap();
    assert!(matches!(
        state.tags.delete_tag(tag.id).await,
        Err(AppError::TagNotFound)
    ));
    assert!(matches!(
        state.tags.update_tag(tag.id, "x").await,
        Err(AppError::TagNotFound)
    ));
}

#[tokio::test]
async fn tag_listing_is_alphabetical_with_name_cursor() {
    let state = AppState::in_memory();
    for name in ["yoga", "cycling", "running", "rowing", "climbing"] {
        state.tags.create_tag(name).await.unwrap();
    }

    let page = state.tags.list_tags(None, Some(2), None).await.unwrap();
    let names: Vec<&str> = page.items.iter().map(|t| t.name_lc.as_str()).collect();
    assert_eq!(names, ["climbing", "cycling"]);
    assert!(page.has_more);
    assert_eq!(page.next_cursor.as_deref(), Some("cycling"));

    let page = state
        .tags
        .list_tags(None, Some(2), page.next_cursor.as_deref())
        .await
        .unwrap();
    let names: Vec<&str> = page.items.iter().map(|t| t.name_lc.as_str()).collect();
    assert_eq!(names, ["rowing", "running"]);

    // substring filter, case-insensitive
    let page = state.tags.list_tags(Some("ROW"), None, None).await.unwrap();
    let names: Vec<&str> = page.items.iter().map(|t| t.name_lc.as_str()).collect();
    assert_eq!(names, ["rowing"]);
}

#[tokio::test]
async fn replace_post_tags_is_author_only_and_wholesale() {
    let state = AppState::in_memory();
    let post = state.posts.create_post(1, post_req("p")).await.unwrap();
    let existing = state.tags.create_tag("fitness").await.unwrap();

    let req = ReplacePostTagsReq {
        names: vec!["Morning".to_string(), "morning".to_string()],
        tag_ids: vec![existing.id],
    };
    assert!(matches!(
        state.tags.replace_post_tags(2, post.id, req.clone()).await,
        Err(AppError::Forbidden(_))
    ));

    let tags = state.tags.replace_post_tags(1, post.id, req).await.unwrap();
    // duplicate names collapse; explicit id unions in
    assert_eq!(tags.len(), 2);

    let replacement = ReplacePostTagsReq {
        names: vec!["evening".to_string()],
        tag_ids: vec![],
    };
    let tags = state
        .tags
        .replace_post_tags(1, post.id, replacement)
        .await
        .unwrap();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].name_lc, "evening");

    let missing = ReplacePostTagsReq {
        names: vec![],
        tag_ids: vec![999_999],
    };
    assert!(matches!(
        state.tags.replace_post_tags(1, post.id, missing).await,
        Err(AppError::TagNotFound)
    ));
}

#[tokio::test]
async fn posts_by_tag_respects_visibility() {
    let state = AppState::in_memory();
    let post = state.posts.create_post(1, post_req("tagged")).await.unwrap();
    let tag = state.tags.create_tag("run").await.unwrap();
    state
        .tags
        .replace_post_tags(
            1,
            post.id,
            ReplacePostTagsReq {
                names: vec![],
                tag_ids: vec![tag.id],
            },
        )
        .await
        .unwrap();

    let page = state
        .tags
        .list_posts_by_tag(2, tag.id, None, None)
        .await
        .unwrap();
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].id, post.id);

    // hidden post drops out of the tag listing
    state.posts.hide_post(1, post.id).await.unwrap();
    let page = state
        .tags
        .list_posts_by_tag(2, tag.id, None, None)
        .await
        .unwrap();
    assert!(page.items.is_empty());

    assert!(matches!(
        state.tags.list_posts_by_tag(2, 424_242, None, None).await,
        Err(AppError::TagNotFound)
    ));
}

#[tokio::test]
async fn follow_preconditions() {
    let state = AppState::in_memory();

    assert!(matches!(
        state.relations.follow(1, 1).await,
        Err(AppError::CannotFollowSelf)
    ));

    state.relations.follow(1, 2).await.unwrap();
    assert!(matches!(
        state.relations.follow(1, 2).await,
        Err(AppError::AlreadyFollowing)
    ));
    assert!(state.relations.is_following(1, 2).await.unwrap());

    state.relations.unfollow(1, 2).await.unwrap();
    assert!(matches!(
        state.relations.unfollow(1, 2).await,
        Err(AppError::NotFollowing)
    ));
}

#[tokio::test]
async fn block_severs_follows_and_forbids_new_ones() {
    let state = AppState::in_memory();
    state.relations.follow(1, 2).await.unwrap();
    state.relations.follow(2, 1).await.unwrap();

    assert!(matches!(
        state.relations.block(1, 1).await,
        Err(AppError::CannotBlockSelf)
    ));
    // no self edge exists, so self-unblock is just an absent edge
    assert!(matches!(
        state.relations.unblock(1, 1).await,
        Err(AppError::NotBlocking)
    ));

    state.relations.block(1, 2).await.unwrap();
    // idempotent: re-blocking succeeds
    state.relations.block(1, 2).await.unwrap();
    assert!(state.relations.is_blocked(1, 2).await.unwrap());
    assert!(state.relations.is_blocked_by(2, 1).await.unwrap());
    assert!(!state.relations.is_blocked(2, 1).await.unwrap());

    // both follow edges were severed
    assert!(!state.relations.is_following(1, 2).await.unwrap());
    assert!(!state.relations.is_following(2, 1).await.unwrap());

    // neither side may follow while the block stands
    assert!(matches!(
        state.relations.follow(1, 2).await,
        Err(AppError::UserBlocked)
    ));
    assert!(matches!(
        state.relations.follow(2, 1).await,
        Err(AppError::UserBlocked)
    ));

    state.relations.unblock(1, 2).await.unwrap();
    assert!(matches!(
        state.relations.unblock(1, 2).await,
        Err(AppError::NotBlocking)
    ));
    state.relations.follow(2, 1).await.unwrap();
}

#[tokio::test]
async fn relation_listings() {
    let state = AppState::in_memory();
    for follower in [2, 3, 4] {
        state.relations.follow(follower, 1).await.unwrap();
    }
    state.relations.follow(1, 5).await.unwrap();
    state.relations.block(1, 9).await.unwrap();

    let followers = state.relations.list_followers(1, None, None).await.unwrap();
    assert_eq!(followers.items.len(), 3);

    let followings = state
        .relations
        .list_followings(1, None, None)
        .await
        .unwrap();
    assert_eq!(followings.items.len(), 1);
    assert_eq!(followings.items[0].user_id, 5);

    let blocks = state.relations.list_blocks(1, None, None).await.unwrap();
    assert_eq!(blocks.items.len(), 1);
    assert_eq!(blocks.items[0].user_id, 9);

    // a blocked counterpart disappears from follower listings
    state.relations.block(1, 2).await.unwrap();
    let followers = state.relations.list_followers(1, None, None).await.unwrap();
    assert_eq!(followers.items.len(), 2);
    assert!(followers.items.iter().all(|f| f.user_id != 2));
}
