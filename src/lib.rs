// Cursor-paginated social feed core (posts, comments, likes, bookmarks,
// follow/block graph, tags) plus an idempotent step-count sync protocol.

pub mod app_state;
pub mod auth;
pub mod config;
pub mod core;
pub mod domain;
pub mod error;
pub mod object_store;
pub mod server;
pub mod services;
pub mod store;

pub use app_state::AppState;
pub use config::Config;
pub use error::{AppError, AppResult};
