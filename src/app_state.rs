// Shared application state: services wired over a chosen store backend.
// Everything is explicit Arc injection; no process-wide singletons.

use std::sync::Arc;

use crate::auth::{HeaderIdentity, IdentityProvider};
use crate::config::Config;
use crate::error::AppResult;
use crate::object_store::{MemoryObjectStore, ObjectStore};
use crate::services::{CommentService, PostService, RelationService, StepService, TagService};
use crate::store::{ContentStore, GraphStore, MemoryStore, PostgresStore, StepStore, TagStore};

#[derive(Clone)]
pub struct AppState {
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    pub relations: Arc<RelationService>,
    pub tags: Arc<TagService>,
    pub steps: Arc<StepService>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl AppState {
    /// Pick the backend from the configuration: Postgres when a database URL
    /// is configured (schema bootstrapped on startup), in-memory otherwise.
    pub async fn from_config(config: &Config) -> AppResult<Self> {
        match &config.database_url {
            Some(url) => {
                tracing::info!("using postgres store");
                let store = Arc::new(
                    PostgresStore::connect(url, config.max_connections).await?,
                );
                store.initialize().await?;
                Ok(Self::wire(
                    store.clone(),
                    store.clone(),
                    store.clone(),
                    store,
                    Arc::new(MemoryObjectStore::new()),
                ))
            }
            None => {
                tracing::info!("no DATABASE_URL, using in-memory store");
                Ok(Self::in_memory())
            }
        }
    }

    pub fn in_memory() -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::wire(
            store.clone(),
            store.clone(),
            store.clone(),
            store,
            Arc::new(MemoryObjectStore::new()),
        )
    }

    fn wire(
        content: Arc<dyn ContentStore>,
        graph: Arc<dyn GraphStore>,
        tags: Arc<dyn TagStore>,
        steps: Arc<dyn StepStore>,
        objects: Arc<dyn ObjectStore>,
    ) -> Self {
        AppState {
            posts: Arc::new(PostService::new(
                content.clone(),
                graph.clone(),
                tags.clone(),
                objects,
            )),
            comments: Arc::new(CommentService::new(content.clone(), graph.clone())),
            relations: Arc::new(RelationService::new(graph.clone())),
            tags: Arc::new(TagService::new(tags, content, graph)),
            steps: Arc::new(StepService::new(steps)),
            identity: Arc::new(HeaderIdentity),
        }
    }
}
