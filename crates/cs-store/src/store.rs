// store.rs: DocumentStore trait.
//
// The reconciliation engine talks to persistence only through this trait.
// The handle is built once at process start and shared as
// `Arc<dyn DocumentStore>`, so backends must be `Send + Sync`.

use async_trait::async_trait;
use chrono::Duration;
use serde_json::Value;

use crate::document::{Collection, Document, WriteBatch};
use crate::error::StoreError;
use crate::lease::RunLease;

#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Every document in a collection.
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError>;

    /// Documents whose `field` equals `value`.
    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError>;

    /// Apply every update in `batch`, or none of them.
    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError>;

    /// Compare-and-set acquisition of a named lease.
    ///
    /// Returns `None` when another holder owns a lease that has not expired.
    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<RunLease>, StoreError>;

    /// Release a lease. Returns `false` if `holder` no longer owns it.
    async fn release_lease(&self, key: &str, holder: &str) -> Result<bool, StoreError>;
}
