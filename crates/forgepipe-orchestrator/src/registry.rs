//! In-memory build state. Builds live for the process's lifetime; nothing
//! here is durable, matching the "in-memory, single-process" scope the
//! concurrency model is built around.

use std::collections::HashMap;
use std::sync::Arc;

use forgepipe_core::build::Build;
use forgepipe_core::ids::BuildId;
use tokio::sync::RwLock;

#[derive(Default)]
pub struct BuildRegistry {
    builds: RwLock<HashMap<BuildId, Arc<RwLock<Build>>>>,
}

impl BuildRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, build: Build) -> Arc<RwLock<Build>> {
        let id = build.id;
        let handle = Arc::new(RwLock::new(build));
        self.builds.write().await.insert(id, Arc::clone(&handle));
        handle
    }

    pub async fn handle(&self, id: BuildId) -> Option<Arc<RwLock<Build>>> {
        self.builds.read().await.get(&id).cloned()
    }

    pub async fn snapshot(&self, id: BuildId) -> Option<Build> {
        let handle = self.handle(id).await?;
        Some(handle.read().await.clone())
    }

    pub async fn list(&self) -> Vec<Build> {
        let mut out = Vec::new();
        for handle in self.builds.read().await.values() {
            out.push(handle.read().await.clone());
        }
        out.sort_by_key(|b| b.created_at);
        out
    }
}
