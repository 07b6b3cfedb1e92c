// Directed follow and block edges between users.

use serde::Serialize;

use crate::core::{current_time_millis, TimestampMs, UserId};
use crate::error::{AppError, AppResult};

/// Follow edge: follower → followee. At most one row per ordered pair.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct FollowEdge {
    pub follower_id: UserId,
    pub followee_id: UserId,
    pub created_at: TimestampMs,
}

impl FollowEdge {
    pub fn create(follower_id: UserId, followee_id: UserId) -> AppResult<Self> {
        if follower_id == followee_id {
            return Err(AppError::CannotFollowSelf);
        }
        Ok(FollowEdge {
            follower_id,
            followee_id,
            created_at: current_time_millis(),
        })
    }
}

/// Block edge: blocker → blocked. Asymmetric, but visibility checks test both
/// directions.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct BlockEdge {
    pub blocker_id: UserId,
    pub blocked_id: UserId,
    pub created_at: TimestampMs,
}

impl BlockEdge {
    pub fn create(blocker_id: UserId, blocked_id: UserId) -> AppResult<Self> {
        if blocker_id == blocked_id {
            return Err(AppError::CannotBlockSelf);
        }
        Ok(BlockEdge {
            blocker_id,
            blocked_id,
            created_at: current_time_millis(),
        })
    }
}

/// One row of a followers/followings/blocks listing: the counterpart user and
/// when the edge was created (the listing's cursor key).
#[derive(Debug, Clone, Copy, Serialize)]
pub struct RelationEdge {
    pub user_id: UserId,
    pub created_at: TimestampMs,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn self_edges_are_rejected() {
        assert!(matches!(
            FollowEdge::create(7, 7),
            Err(AppError::CannotFollowSelf)
        ));
        assert!(matches!(
            BlockEdge::create(7, 7),
            Err(AppError::CannotBlockSelf)
        ));
    }
}
