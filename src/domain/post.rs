// Post aggregate: the post row itself plus its media set and statistics
// counters, which live in separate tables keyed by post id.

use serde::{Deserialize, Serialize};

use crate::core::{current_time_millis, PostId, TimestampMs, UserId};
use crate::error::{AppError, AppResult};

/// Post visibility state machine: DRAFT ⇄ PUBLIC via publish/hide, plus a
/// one-way soft delete tracked by `deleted_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Visibility {
    Draft,
    Public,
}

impl Visibility {
    pub fn as_str(&self) -> &'static str {
        match self {
            Visibility::Draft => "DRAFT",
            Visibility::Public => "PUBLIC",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "PUBLIC" => Visibility::Public,
            _ => Visibility::Draft,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: PostId,
    pub author_id: UserId,
    pub title: String,
    pub caption: Option<String>,
    pub visibility: Visibility,
    pub media_count: i32,
    pub created_at: TimestampMs,
    pub updated_at: TimestampMs,
    pub deleted_at: Option<TimestampMs>,
}

impl Post {
    /// Create a new post. The id is assigned by the store on insert.
    pub fn create(
        author_id: UserId,
        title: &str,
        caption: Option<String>,
        publish: bool,
        media_count: i32,
    ) -> AppResult<Self> {
        let title = validated_title(title)?;
        let now = current_time_millis();
        Ok(Post {
            id: 0,
            author_id,
            title,
            caption,
            visibility: if publish {
                Visibility::Public
            } else {
                Visibility::Draft
            },
            media_count,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        })
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    /// Apply a non-null title update. Blank titles are rejected; a non-deleted
    /// post always carries a non-blank title.
    pub fn update_title(&mut self, new_title: Option<&str>) -> AppResult<()> {
        if let Some(title) = new_title {
            self.title = validated_title(title)?;
            self.updated_at = current_time_millis();
        }
        Ok(())
    }

    pub fn update_caption(&mut self, new_caption: Option<String>) {
        if let Some(caption) = new_caption {
            self.caption = Some(caption);
            self.updated_at = current_time_millis();
        }
    }

    pub fn publish(&mut self) {
        self.visibility = Visibility::Public;
        self.updated_at = current_time_millis();
    }

    pub fn hide(&mut self) {
        self.visibility = Visibility::Draft;
        self.updated_at = current_time_millis();
    }

    pub fn delete(&mut self) {
        self.deleted_at = Some(current_time_millis());
    }

    pub fn update_media_count(&mut self, count: i32) {
        self.media_count = count;
        self.updated_at = current_time_millis();
    }

    /// The author may mutate a live post; everyone else gets `Forbidden`.
    pub fn ensure_modifiable(&self, user_id: UserId) -> AppResult<()> {
        if self.is_deleted() {
            return Err(AppError::PostNotFound);
        }
        if self.author_id != user_id {
            return Err(AppError::Forbidden("not the post author".to_string()));
        }
        Ok(())
    }

    /// Read access: PUBLIC and not deleted, and no block edge in either
    /// direction between viewer and author. Failures are always
    /// `PostNotFound` so a blocked or hidden post is indistinguishable from
    /// a missing one.
    pub fn ensure_readable_by(&self, blocked_either: bool) -> AppResult<()> {
        if self.is_deleted() || self.visibility != Visibility::Public || blocked_either {
            return Err(AppError::PostNotFound);
        }
        Ok(())
    }
}

fn validated_title(title: &str) -> AppResult<String> {
    let trimmed = title.trim();
    if trimmed.is_empty() {
        return Err(AppError::TitleRequired);
    }
    Ok(trimmed.to_string())
}

/// Media kind, derived from the MIME type at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
}

impl MediaType {
    pub fn from_mime(mime: &str) -> Self {
        if mime.starts_with("video/") {
            MediaType::Video
        } else {
            MediaType::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
        }
    }
}

/// One media item attached to a post. The object key and url are opaque
/// references into the object store; the core never uploads anything itself.
#[derive(Debug, Clone, Serialize)]
pub struct PostMedia {
    pub id: i64,
    pub post_id: PostId,
    pub media_type: MediaType,
    pub object_key: String,
    pub url: String,
    pub width: i32,
    pub height: i32,
    pub sort_order: i32,
    pub blurhash: Option<String>,
    pub checksum: Option<String>,
    pub bytes: i64,
    pub mime_type: String,
}

/// Per-post counters, 1:1 with the post row. Mutated only through atomic
/// store-level deltas, never read-modify-write.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct PostStatistics {
    pub post_id: PostId,
    pub like_count: i64,
    pub comment_count: i64,
    pub bookmark_count: i64,
    pub heat_score: f64,
}

impl PostStatistics {
    pub fn zeroed(post_id: PostId) -> Self {
        PostStatistics {
            post_id,
            like_count: 0,
            comment_count: 0,
            bookmark_count: 0,
            heat_score: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_title_is_rejected() {
        assert!(matches!(
            Post::create(1, "   ", None, true, 0),
            Err(AppError::TitleRequired)
        ));
    }

    #[test]
    fn title_is_trimmed() {
        let post = Post::create(1, "  Run log  ", None, false, 0).unwrap();
        assert_eq!(post.title, "Run log");
        assert_eq!(post.visibility, Visibility::Draft);
    }

    #[test]
    fn draft_post_is_not_readable() {
        let post = Post::create(1, "t", None, false, 0).unwrap();
        assert!(matches!(
            post.ensure_readable_by(false),
            Err(AppError::PostNotFound)
        ));
    }

    #[test]
    fn blocked_viewer_sees_not_found() {
        let post = Post::create(1, "t", None, true, 0).unwrap();
        assert!(post.ensure_readable_by(false).is_ok());
        assert!(matches!(
            post.ensure_readable_by(true),
            Err(AppError::PostNotFound)
        ));
    }

    #[test]
    fn media_type_from_mime() {
        assert_eq!(MediaType::from_mime("video/mp4"), MediaType::Video);
        assert_eq!(MediaType::from_mime("image/jpeg"), MediaType::Image);
        assert_eq!(MediaType::from_mime("application/pdf"), MediaType::Image);
    }
}
