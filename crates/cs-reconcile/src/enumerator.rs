// enumerator.rs: Lists the communities a run has to visit.

use cs_store::{Collection, Document, DocumentStore};

use crate::error::ReconcileError;

/// All community documents at call time.
///
/// Documents are returned unvalidated so a single malformed community fails
/// on its own task instead of aborting the whole listing.
pub async fn list_communities(store: &dyn DocumentStore) -> Result<Vec<Document>, ReconcileError> {
    store
        .list(Collection::Communities)
        .await
        .map_err(|source| ReconcileError::StoreQuery {
            what: "list communities".to_string(),
            source,
        })
}

/// All community IDs at call time.
pub async fn list_community_ids(store: &dyn DocumentStore) -> Result<Vec<String>, ReconcileError> {
    Ok(list_communities(store)
        .await?
        .into_iter()
        .map(|doc| doc.id)
        .collect())
}
