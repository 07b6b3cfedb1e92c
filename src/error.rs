// Application error taxonomy shared by services, stores and the HTTP layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

#[derive(Debug)]
pub enum AppError {
    // NotFound family. Block-hidden and soft-deleted posts are conflated with
    // missing ones so existence never leaks.
    PostNotFound,
    CommentNotFound,
    TagNotFound,
    // Authorization
    Forbidden(String),
    UserBlocked,
    // State-transition conflicts
    AlreadyLiked,
    AlreadyBookmarked,
    AlreadyFollowing,
    NotLiked,
    NotBookmarked,
    NotFollowing,
    NotBlocking,
    // Input validation
    TitleRequired,
    InvalidParam(String),
    RangeTooLarge,
    CannotFollowSelf,
    CannotBlockSelf,
    // Authentication (identity provider)
    Unauthorized(String),
    TokenExpired,
    // Infrastructure
    Database(anyhow::Error),
    DatabaseError(String),
    Internal(String),
}

impl AppError {
    /// Stable machine-readable code surfaced to clients alongside the message.
    pub fn code(&self) -> &'static str {
        match self {
            AppError::PostNotFound => "POST_NOT_FOUND",
            AppError::CommentNotFound => "COMMENT_NOT_FOUND",
            AppError::TagNotFound => "TAG_NOT_FOUND",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::UserBlocked => "USER_BLOCKED",
            AppError::AlreadyLiked => "ALREADY_LIKED",
            AppError::AlreadyBookmarked => "ALREADY_BOOKMARKED",
            AppError::AlreadyFollowing => "ALREADY_FOLLOWING",
            AppError::NotLiked => "NOT_LIKED",
            AppError::NotBookmarked => "NOT_BOOKMARKED",
            AppError::NotFollowing => "NOT_FOLLOWING",
            AppError::NotBlocking => "NOT_BLOCKING",
            AppError::TitleRequired => "TITLE_REQUIRED",
            AppError::InvalidParam(_) => "INVALID_PARAM",
            AppError::RangeTooLarge => "RANGE_TOO_LARGE",
            AppError::CannotFollowSelf => "CANNOT_FOLLOW_SELF",
            AppError::CannotBlockSelf => "CANNOT_BLOCK_SELF",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::TokenExpired => "TOKEN_EXPIRED",
            AppError::Database(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                "INTERNAL_ERROR"
            }
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::PostNotFound => write!(f, "Post not found"),
            AppError::CommentNotFound => write!(f, "Comment not found"),
            AppError::TagNotFound => write!(f, "Tag not found"),
            AppError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            AppError::UserBlocked => write!(f, "Operation not allowed between blocked users"),
            AppError::AlreadyLiked => write!(f, "Already liked"),
            AppError::AlreadyBookmarked => write!(f, "Already bookmarked"),
            AppError::AlreadyFollowing => write!(f, "Already following"),
            AppError::NotLiked => write!(f, "Not liked"),
            AppError::NotBookmarked => write!(f, "Not bookmarked"),
            AppError::NotFollowing => write!(f, "Not following"),
            AppError::NotBlocking => write!(f, "Not blocking"),
            AppError::TitleRequired => write!(f, "Title must not be blank"),
            AppError::InvalidParam(msg) => write!(f, "Invalid parameter: {}", msg),
            AppError::RangeTooLarge => write!(f, "Date range exceeds 31 days"),
            AppError::CannotFollowSelf => write!(f, "Cannot follow yourself"),
            AppError::CannotBlockSelf => write!(f, "Cannot block yourself"),
            AppError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            AppError::TokenExpired => write!(f, "Token expired"),
            AppError::Database(err) => write!(f, "Database error: {}", err),
            AppError::DatabaseError(msg) => write!(f, "Database error: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::PostNotFound | AppError::CommentNotFound | AppError::TagNotFound => {
                StatusCode::NOT_FOUND
            }
            AppError::Forbidden(_) | AppError::UserBlocked => StatusCode::FORBIDDEN,
            AppError::AlreadyLiked
            | AppError::AlreadyBookmarked
            | AppError::AlreadyFollowing
            | AppError::NotLiked
            | AppError::NotBookmarked
            | AppError::NotFollowing
            | AppError::NotBlocking => StatusCode::CONFLICT,
            AppError::TitleRequired
            | AppError::InvalidParam(_)
            | AppError::RangeTooLarge
            | AppError::CannotFollowSelf
            | AppError::CannotBlockSelf => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::TokenExpired => StatusCode::UNAUTHORIZED,
            AppError::Database(_) | AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        // Storage failures are logged server-side and masked towards clients.
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!("{}", self);
            "Internal server error".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "code": self.code(),
            "message": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::DatabaseError(err.to_string())
    }
}

pub type AppResult<T> = Result<T, AppError>;
