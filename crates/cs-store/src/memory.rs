// memory.rs: MemoryStore, an in-process DocumentStore.
//
// Used by tests and by dry runs. Faults can be injected per community so
// callers can check that one community's failure stays contained:
//   - listing failures (`fail_listing`)
//   - goal query failures (`fail_goal_queries_for`)
//   - commit failures for any batch touching a community (`fail_commits_for`)

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use tokio::sync::Mutex;

use crate::document::{Collection, Document, WriteBatch};
use crate::error::StoreError;
use crate::lease::RunLease;
use crate::records::fields;
use crate::snapshot::Snapshot;
use crate::store::DocumentStore;

#[derive(Debug, Default)]
struct FaultPlan {
    fail_listing: bool,
    query_failures: HashSet<String>,
    commit_failures: HashSet<String>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<Snapshot>,
    faults: StdMutex<FaultPlan>,
    commits: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            state: Mutex::new(snapshot),
            ..Self::default()
        }
    }

    /// Make every `list` call fail.
    pub fn fail_listing(&self) {
        self.faults().fail_listing = true;
    }

    /// Make goal queries for `community_id` fail.
    pub fn fail_goal_queries_for(&self, community_id: impl Into<String>) {
        self.faults().query_failures.insert(community_id.into());
    }

    /// Reject any batch that touches the community document `community_id`.
    pub fn fail_commits_for(&self, community_id: impl Into<String>) {
        self.faults().commit_failures.insert(community_id.into());
    }

    /// Number of batches successfully committed.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }

    pub async fn snapshot(&self) -> Snapshot {
        self.state.lock().await.clone()
    }

    pub async fn document(&self, collection: Collection, id: &str) -> Option<Document> {
        self.state.lock().await.get(collection, id)
    }

    pub async fn insert(&self, collection: Collection, doc: Document) {
        self.state.lock().await.insert(collection, doc);
    }

    fn faults(&self) -> std::sync::MutexGuard<'_, FaultPlan> {
        // A poisoned plan only means a test panicked mid-update; keep using it.
        self.faults.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        if self.faults().fail_listing {
            return Err(StoreError::Unavailable(format!(
                "injected listing failure for {}",
                collection
            )));
        }
        Ok(self.state.lock().await.list(collection))
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        if collection == Collection::Goals && field == fields::COMMUNITY_ID {
            if let Some(id) = value.as_str() {
                if self.faults().query_failures.contains(id) {
                    return Err(StoreError::Unavailable(format!(
                        "injected goal query failure for community {}",
                        id
                    )));
                }
            }
        }
        Ok(self.state.lock().await.query_eq(collection, field, value))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let blocked = self
            .faults()
            .commit_failures
            .iter()
            .find(|id| batch.touches(Collection::Communities, id))
            .cloned();
        if let Some(id) = blocked {
            return Err(StoreError::Unavailable(format!(
                "injected commit failure for community {}",
                id
            )));
        }

        self.state.lock().await.apply(&batch)?;
        self.commits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<RunLease>, StoreError> {
        Ok(self
            .state
            .lock()
            .await
            .try_acquire_lease(key, holder, ttl, Utc::now()))
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        Ok(self.state.lock().await.release_lease(key, holder))
    }
}
