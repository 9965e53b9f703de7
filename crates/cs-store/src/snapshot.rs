// snapshot.rs: The full contents of a store, shared by both backends.
//
// `JsonFileStore` serializes a Snapshot to disk; `MemoryStore` keeps one
// behind a mutex. Batch application lives here so both backends get the
// same all-or-nothing semantics: every target is checked before any field
// is written.

use std::collections::BTreeMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::document::{Collection, Document, Fields, WriteBatch};
use crate::error::StoreError;
use crate::lease::RunLease;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub communities: BTreeMap<String, Fields>,
    #[serde(default)]
    pub goals: BTreeMap<String, Fields>,
    #[serde(default)]
    pub leases: BTreeMap<String, RunLease>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert, handy for seeding.
    pub fn with_document(mut self, collection: Collection, doc: Document) -> Self {
        self.insert(collection, doc);
        self
    }

    /// Insert or replace a document.
    pub fn insert(&mut self, collection: Collection, doc: Document) {
        self.collection_mut(collection).insert(doc.id, doc.fields);
    }

    pub fn get(&self, collection: Collection, id: &str) -> Option<Document> {
        self.collection(collection).get(id).map(|fields| Document {
            id: id.to_string(),
            fields: fields.clone(),
        })
    }

    /// All documents of a collection, ordered by ID.
    pub fn list(&self, collection: Collection) -> Vec<Document> {
        self.collection(collection)
            .iter()
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }

    /// Documents whose `field` equals `value`.
    pub fn query_eq(&self, collection: Collection, field: &str, value: &Value) -> Vec<Document> {
        self.collection(collection)
            .iter()
            .filter(|(_, fields)| fields.get(field) == Some(value))
            .map(|(id, fields)| Document {
                id: id.clone(),
                fields: fields.clone(),
            })
            .collect()
    }

    /// Apply a batch: all updates or none.
    pub fn apply(&mut self, batch: &WriteBatch) -> Result<(), StoreError> {
        if let Some(missing) = batch
            .updates()
            .iter()
            .find(|u| !self.collection(u.doc.collection).contains_key(&u.doc.id))
        {
            return Err(StoreError::DocumentNotFound {
                collection: missing.doc.collection,
                id: missing.doc.id.clone(),
            });
        }

        for update in batch.updates() {
            if let Some(fields) = self
                .collection_mut(update.doc.collection)
                .get_mut(&update.doc.id)
            {
                fields.insert(update.field.clone(), update.value.clone());
            }
        }
        Ok(())
    }

    /// Take the lease if it is free, expired, or already ours.
    pub fn try_acquire_lease(
        &mut self,
        key: &str,
        holder: &str,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Option<RunLease> {
        if let Some(existing) = self.leases.get(key) {
            if existing.holder != holder && !existing.is_expired_at(now) {
                return None;
            }
        }
        let lease = RunLease::new(key, holder, now, ttl);
        self.leases.insert(key.to_string(), lease.clone());
        Some(lease)
    }

    /// Drop the lease if `holder` still owns it.
    pub fn release_lease(&mut self, key: &str, holder: &str) -> bool {
        match self.leases.get(key) {
            Some(lease) if lease.holder == holder => {
                self.leases.remove(key);
                true
            }
            _ => false,
        }
    }

    fn collection(&self, collection: Collection) -> &BTreeMap<String, Fields> {
        match collection {
            Collection::Communities => &self.communities,
            Collection::Goals => &self.goals,
        }
    }

    fn collection_mut(&mut self, collection: Collection) -> &mut BTreeMap<String, Fields> {
        match collection {
            Collection::Communities => &mut self.communities,
            Collection::Goals => &mut self.goals,
        }
    }
}
