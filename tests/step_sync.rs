// Step sync protocol over the in-memory backend: sequence ordering, replay
// rejection, version conflicts, batch application and range reads.

use aura_feed::domain::SyncStatus;
use aura_feed::error::AppError;
use aura_feed::services::step_service::{BatchSyncReq, StepSyncReq};
use aura_feed::AppState;

fn sync_req(steps: i32, date: &str, sequence: i64) -> StepSyncReq {
    serde_json::from_value(serde_json::json!({
        "steps": steps,
        "date": date,
        "sync_sequence": sequence,
    }))
    .unwrap()
}

#[tokio::test]
async fn sequence_ordering_and_max_steps() {
    let state = AppState::in_memory();

    let resp = state
        .steps
        .sync_steps(5, &sync_req(3000, "2025-01-10", 100))
        .await
        .unwrap();
    assert_eq!(resp.status, SyncStatus::Accepted);
    assert_eq!(resp.steps, 3000);
    assert_eq!(resp.version, 1);
    assert_eq!(resp.distance_km, 2.1);
    assert_eq!(resp.active_minutes, 30);
    assert_eq!(resp.kcal, 120);

    // stale sequence: rejected, state untouched, response echoes what is stored
    let resp = state
        .steps
        .sync_steps(5, &sync_req(2000, "2025-01-10", 50))
        .await
        .unwrap();
    assert_eq!(resp.status, SyncStatus::Rejected);
    assert_eq!(resp.steps, 3000);
    assert_eq!(resp.version, 1);

    // fresher sequence with more steps: accepted
    let resp = state
        .steps
        .sync_steps(5, &sync_req(5000, "2025-01-10", 200))
        .await
        .unwrap();
    assert_eq!(resp.status, SyncStatus::Accepted);
    assert_eq!(resp.steps, 5000);
    assert_eq!(resp.version, 2);

    // fresher sequence with fewer steps: accepted but steps never regress
    let resp = state
        .steps
        .sync_steps(5, &sync_req(4000, "2025-01-10", 300))
        .await
        .unwrap();
    assert_eq!(resp.status, SyncStatus::Accepted);
    assert_eq!(resp.steps, 5000);
    assert_eq!(resp.version, 3);
}

#[tokio::test]
async fn replay_is_rejected() {
    let state = AppState::in_memory();
    let req = sync_req(3000, "2025-01-10", 100);

    let first = state.steps.sync_steps(5, &req).await.unwrap();
    assert_eq!(first.status, SyncStatus::Accepted);

    let replay = state.steps.sync_steps(5, &req).await.unwrap();
    assert_eq!(replay.status, SyncStatus::Rejected);
    assert_eq!(replay.steps, 3000);
    assert_eq!(replay.version, 1);
}

#[tokio::test]
async fn known_version_mismatch_conflicts() {
    let state = AppState::in_memory();
    state
        .steps
        .sync_steps(5, &sync_req(3000, "2025-01-10", 100))
        .await
        .unwrap();
    state
        .steps
        .sync_steps(5, &sync_req(4000, "2025-01-10", 200))
        .await
        .unwrap();

    // another device still believing version 1
    let mut req = sync_req(6000, "2025-01-10", 300);
    req.known_version = Some(1);
    let resp = state.steps.sync_steps(5, &req).await.unwrap();
    assert_eq!(resp.status, SyncStatus::Conflict);
    assert_eq!(resp.steps, 4000);
    assert_eq!(resp.version, 2);

    // reconciled client resubmits with the current version
    let mut req = sync_req(6000, "2025-01-10", 300);
    req.known_version = Some(2);
    let resp = state.steps.sync_steps(5, &req).await.unwrap();
    assert_eq!(resp.status, SyncStatus::Accepted);
    assert_eq!(resp.steps, 6000);
    assert_eq!(resp.version, 3);
}

#[tokio::test]
async fn first_sync_for_a_day_ignores_known_version() {
    let state = AppState::in_memory();

    // With no record yet there is nothing to conflict with: the version
    // check only applies to existing rows, so the first sync lands.
    let mut req = sync_req(3000, "2025-01-10", 100);
    req.known_version = Some(1);
    let resp = state.steps.sync_steps(5, &req).await.unwrap();
    assert_eq!(resp.status, SyncStatus::Accepted);
    assert_eq!(resp.steps, 3000);
    assert_eq!(resp.version, 1);
}

#[tokio::test]
async fn invalid_input_is_refused() {
    let state = AppState::in_memory();
    assert!(matches!(
        state
            .steps
            .sync_steps(5, &sync_req(-1, "2025-01-10", 1))
            .await,
        Err(AppError::InvalidParam(_))
    ));
    assert!(matches!(
        state
            .steps
            .sync_steps(5, &sync_req(100_001, "2025-01-10", 1))
            .await,
        Err(AppError::InvalidParam(_))
    ));
    assert!(matches!(
        state
            .steps
            .sync_steps(5, &sync_req(100, "2999-01-01", 1))
            .await,
        Err(AppError::InvalidParam(_))
    ));
    assert!(matches!(
        state.steps.sync_steps(5, &sync_req(100, "not-a-date", 1)).await,
        Err(AppError::InvalidParam(_))
    ));
}

#[tokio::test]
async fn batch_applies_items_independently() {
    let state = AppState::in_memory();
    let req = BatchSyncReq {
        items: vec![
            sync_req(1000, "2025-01-10", 100),
            // stale relative to the first item: rejected but still a processed result
            sync_req(900, "2025-01-10", 50),
            sync_req(2000, "2025-01-11", 100),
            // invalid steps: counted as a failure, does not abort the batch
            sync_req(-5, "2025-01-12", 100),
        ],
    };
    let resp = state.steps.batch_sync(5, req).await.unwrap();
    assert_eq!(resp.success_count, 3);
    assert_eq!(resp.failed_count, 1);
    assert_eq!(resp.results.len(), 3);
    assert_eq!(resp.results[0].status, SyncStatus::Accepted);
    assert_eq!(resp.results[1].status, SyncStatus::Rejected);
    assert_eq!(resp.results[2].status, SyncStatus::Accepted);

    let day = state
        .steps
        .get_step_day(5, Some("2025-01-11"))
        .await
        .unwrap();
    assert_eq!(day.steps, 2000);

    let oversized = BatchSyncReq {
        items: (0..31).map(|i| sync_req(100, "2025-01-10", i)).collect(),
    };
    assert!(matches!(
        state.steps.batch_sync(5, oversized).await,
        Err(AppError::InvalidParam(_))
    ));
}

#[tokio::test]
async fn pull_returns_updates_after_since() {
    let state = AppState::in_memory();
    state
        .steps
        .sync_steps(5, &sync_req(1000, "2025-01-10", 100))
        .await
        .unwrap();
    state
        .steps
        .sync_steps(5, &sync_req(2000, "2025-01-11", 100))
        .await
        .unwrap();
    // another user's records never leak
    state
        .steps
        .sync_steps(6, &sync_req(9000, "2025-01-10", 100))
        .await
        .unwrap();

    let resp = state.steps.pull_steps(5, Some(0)).await.unwrap();
    assert_eq!(resp.updates.len(), 2);
    assert!(!resp.has_more);
    assert!(resp.latest_timestamp > 0);

    // nothing newer than the reported watermark
    let resp = state
        .steps
        .pull_steps(5, Some(resp.latest_timestamp))
        .await
        .unwrap();
    assert!(resp.updates.is_empty());
    assert!(!resp.has_more);
}

#[tokio::test]
async fn range_zero_fills_and_aggregates() {
    let state = AppState::in_memory();
    state
        .steps
        .sync_steps(5, &sync_req(3000, "2025-01-10", 100))
        .await
        .unwrap();
    state
        .steps
        .sync_steps(5, &sync_req(1000, "2025-01-12", 100))
        .await
        .unwrap();

    // reversed bounds are swapped
    let resp = state
        .steps
        .get_range(5, Some("2025-01-13"), Some("2025-01-10"))
        .await
        .unwrap();
    assert_eq!(resp.items.len(), 4);
    assert_eq!(resp.items[0].steps, 3000);
    assert_eq!(resp.items[1].steps, 0);
    assert_eq!(resp.items[2].steps, 1000);
    assert_eq!(resp.items[3].steps, 0);
    assert_eq!(resp.total_steps, 4000);
    assert_eq!(resp.avg_daily_steps, 1000);
    assert_eq!(resp.total_kcal, 160);

    assert!(matches!(
        state
            .steps
            .get_range(5, Some("2025-01-01"), Some("2025-02-15"))
            .await,
        Err(AppError::RangeTooLarge)
    ));
}

#[tokio::test]
async fn missing_day_reads_as_zero() {
    let state = AppState::in_memory();
    let day = state
        .steps
        .get_step_day(5, Some("2025-01-10"))
        .await
        .unwrap();
    assert_eq!(day.steps, 0);
    assert_eq!(day.version, 0);
    assert_eq!(day.distance_km, 0.0);
}
