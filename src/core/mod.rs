// Core primitives: id/time aliases, the pagination cursor codec and the
// shared page envelope.

pub mod cursor;
pub mod page;

/// User ID type
pub type UserId = i64;

/// Post ID type
pub type PostId = i64;

/// Comment ID type
pub type CommentId = i64;

/// Tag ID type
pub type TagId = i64;

/// Millisecond epoch timestamp
pub type TimestampMs = i64;

/// Current wall-clock time in epoch milliseconds.
pub fn current_time_millis() -> TimestampMs {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as TimestampMs)
        .unwrap_or(0)
}
