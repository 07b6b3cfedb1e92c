// Domain entities. State changes go through entity methods that return typed
// results so invariants hold regardless of which store backend persists them.

pub mod comment;
pub mod post;
pub mod relation;
pub mod steps;
pub mod tag;

pub use comment::PostComment;
pub use post::{MediaType, Post, PostMedia, PostStatistics, Visibility};
pub use relation::{BlockEdge, FollowEdge, RelationEdge};
pub use steps::{validate_steps, StepCount, SyncStatus};
pub use tag::Tag;
