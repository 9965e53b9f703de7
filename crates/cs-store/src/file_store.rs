// file_store.rs: JsonFileStore, a DocumentStore backed by one JSON file.
//
// The whole store (both collections plus leases) lives in a single
// snapshot file that other processes may write between calls. Nothing is
// cached: every operation takes an advisory lock on `<path>.lock`, loads
// the snapshot from disk, and works on that.
//   reads:    shared lock, load
//   writes:   exclusive lock, load, modify, write temp file, rename over
// A write that fails anywhere before the rename leaves the file as it was.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use fs2::FileExt;
use serde_json::Value;
use tempfile::NamedTempFile;

use crate::document::{Collection, Document, WriteBatch};
use crate::error::StoreError;
use crate::lease::RunLease;
use crate::snapshot::Snapshot;
use crate::store::DocumentStore;

pub struct JsonFileStore {
    path: PathBuf,
    lock_path: PathBuf,
    #[cfg(test)]
    fail_next_persist: std::sync::atomic::AtomicBool,
}

impl JsonFileStore {
    /// Open the store at `path`, starting empty if the file doesn't exist.
    /// Creates the parent directory if needed and checks that an existing
    /// file parses.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| StoreError::IoError {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let mut lock_path = path.clone().into_os_string();
        lock_path.push(".lock");

        let store = Self {
            path,
            lock_path: PathBuf::from(lock_path),
            #[cfg(test)]
            fail_next_persist: std::sync::atomic::AtomicBool::new(false),
        };

        let (communities, goals) = store.read(|snap| (snap.communities.len(), snap.goals.len()))?;
        tracing::debug!(
            path = %store.path.display(),
            communities,
            goals,
            "opened json file store"
        );
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The current contents of the file.
    pub async fn snapshot(&self) -> Result<Snapshot, StoreError> {
        self.read(Snapshot::clone)
    }

    /// Insert or replace a document and persist.
    pub async fn insert(&self, collection: Collection, doc: Document) -> Result<(), StoreError> {
        self.mutate(|snap| {
            snap.insert(collection, doc);
            Ok(())
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Snapshot) -> T) -> Result<T, StoreError> {
        let lock = self.lock(false)?;
        let snapshot = self.load()?;
        drop(lock);
        Ok(f(&snapshot))
    }

    /// Load, apply `f`, persist, all under the exclusive lock.
    fn mutate<T>(
        &self,
        f: impl FnOnce(&mut Snapshot) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let lock = self.lock(true)?;
        let mut snapshot = self.load()?;
        let out = f(&mut snapshot)?;
        self.persist(&snapshot)?;
        drop(lock);
        Ok(out)
    }

    fn lock(&self, exclusive: bool) -> Result<File, StoreError> {
        let io_err = |source| StoreError::IoError {
            path: self.lock_path.clone(),
            source,
        };
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.lock_path)
            .map_err(io_err)?;
        if exclusive {
            FileExt::lock_exclusive(&file).map_err(io_err)?;
        } else {
            FileExt::lock_shared(&file).map_err(io_err)?;
        }
        Ok(file)
    }

    fn load(&self) -> Result<Snapshot, StoreError> {
        if !self.path.exists() {
            return Ok(Snapshot::default());
        }
        let json = fs::read_to_string(&self.path).map_err(|source| StoreError::IoError {
            path: self.path.clone(),
            source,
        })?;
        Ok(serde_json::from_str(&json)?)
    }

    fn persist(&self, snapshot: &Snapshot) -> Result<(), StoreError> {
        #[cfg(test)]
        if self
            .fail_next_persist
            .swap(false, std::sync::atomic::Ordering::SeqCst)
        {
            return Err(StoreError::Unavailable("persist failed".to_string()));
        }

        let dir = match self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            Some(parent) => parent.to_path_buf(),
            None => PathBuf::from("."),
        };
        let json = serde_json::to_string_pretty(snapshot)?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|source| StoreError::IoError {
            path: dir.clone(),
            source,
        })?;
        tmp.write_all(json.as_bytes())
            .and_then(|_| tmp.as_file().sync_all())
            .map_err(|source| StoreError::IoError {
                path: tmp.path().to_path_buf(),
                source,
            })?;
        tmp.persist(&self.path)
            .map_err(|e| StoreError::IoError {
                path: self.path.clone(),
                source: e.error,
            })?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for JsonFileStore {
    async fn list(&self, collection: Collection) -> Result<Vec<Document>, StoreError> {
        self.read(|snap| snap.list(collection))
    }

    async fn query_eq(
        &self,
        collection: Collection,
        field: &str,
        value: &Value,
    ) -> Result<Vec<Document>, StoreError> {
        self.read(|snap| snap.query_eq(collection, field, value))
    }

    async fn commit(&self, batch: WriteBatch) -> Result<(), StoreError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.mutate(|snap| snap.apply(&batch))
    }

    async fn try_acquire_lease(
        &self,
        key: &str,
        holder: &str,
        ttl: Duration,
    ) -> Result<Option<RunLease>, StoreError> {
        let now = Utc::now();
        self.mutate(|snap| Ok(snap.try_acquire_lease(key, holder, ttl, now)))
    }

    async fn release_lease(&self, key: &str, holder: &str) -> Result<bool, StoreError> {
        self.mutate(|snap| Ok(snap.release_lease(key, holder)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::DocRef;
    use crate::records::{Community, Goal};
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use tempfile::tempdir;

    #[tokio::test]
    async fn open_missing_file_starts_empty() {
        let dir = tempdir().unwrap();
        let store = JsonFileStore::open(dir.path().join("nested/store.json")).unwrap();
        assert!(store.list(Collection::Communities).await.unwrap().is_empty());
        assert!(dir.path().join("nested").is_dir());
    }

    #[tokio::test]
    async fn open_rejects_corrupt_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(StoreError::SerializationError(_))
        ));
    }

    #[tokio::test]
    async fn commit_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store
            .insert(Collection::Communities, Community::new("c1", 1).to_document())
            .await
            .unwrap();
        store
            .insert(Collection::Goals, Goal::new("g1", "c1", 3, 3).to_document())
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch
            .update(DocRef::new(Collection::Communities, "c1"), "streak", 2)
            .update(DocRef::new(Collection::Goals, "g1"), "stepsCompleted", 0);
        store.commit(batch).await.unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let goals = reopened
            .query_eq(Collection::Goals, "communityID", &json!("c1"))
            .await
            .unwrap();
        assert_eq!(goals.len(), 1);
        assert_eq!(goals[0].get("stepsCompleted"), Some(&json!(0)));
        let communities = reopened.list(Collection::Communities).await.unwrap();
        assert_eq!(communities[0].get("streak"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn writes_from_another_handle_are_visible_and_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();

        first
            .insert(Collection::Communities, Community::new("c1", 1).to_document())
            .await
            .unwrap();
        second
            .insert(Collection::Communities, Community::new("c2", 7).to_document())
            .await
            .unwrap();

        let mut batch = WriteBatch::new();
        batch.update(DocRef::new(Collection::Communities, "c1"), "streak", 2);
        first.commit(batch).await.unwrap();

        let ids: Vec<_> = second
            .list(Collection::Communities)
            .await
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["c1", "c2"]);
        let snap = second.snapshot().await.unwrap();
        assert_eq!(
            snap.get(Collection::Communities, "c1").unwrap().get("streak"),
            Some(&json!(2))
        );
    }

    #[tokio::test]
    async fn rejected_batch_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store
            .insert(Collection::Communities, Community::new("c1", 4).to_document())
            .await
            .unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        let mut batch = WriteBatch::new();
        batch
            .update(DocRef::new(Collection::Communities, "c1"), "streak", 5)
            .update(DocRef::new(Collection::Goals, "missing"), "stepsCompleted", 0);
        assert!(store.commit(batch).await.is_err());

        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
    }

    #[tokio::test]
    async fn failure_after_apply_leaves_store_unchanged() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        store
            .insert(Collection::Communities, Community::new("c1", 4).to_document())
            .await
            .unwrap();
        store
            .insert(Collection::Goals, Goal::new("g1", "c1", 3, 3).to_document())
            .await
            .unwrap();
        let on_disk = fs::read_to_string(&path).unwrap();

        // Every target exists, so the batch applies to the loaded copy and
        // the failure happens while writing it back.
        store.fail_next_persist.store(true, Ordering::SeqCst);
        let mut batch = WriteBatch::new();
        batch
            .update(DocRef::new(Collection::Communities, "c1"), "streak", 5)
            .update(DocRef::new(Collection::Goals, "g1"), "stepsCompleted", 0);
        let err = store.commit(batch).await.unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));

        assert_eq!(fs::read_to_string(&path).unwrap(), on_disk);
        let snap = store.snapshot().await.unwrap();
        assert_eq!(
            snap.get(Collection::Communities, "c1").unwrap().get("streak"),
            Some(&json!(4))
        );
        assert_eq!(
            snap.get(Collection::Goals, "g1").unwrap().get("stepsCompleted"),
            Some(&json!(3))
        );
    }

    #[tokio::test]
    async fn lease_is_persisted() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let store = JsonFileStore::open(&path).unwrap();
        let lease = store
            .try_acquire_lease("reconcile", "run-a", Duration::minutes(5))
            .await
            .unwrap();
        assert!(lease.is_some());
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let second = reopened
            .try_acquire_lease("reconcile", "run-b", Duration::minutes(5))
            .await
            .unwrap();
        assert!(second.is_none());
        assert!(reopened.release_lease("reconcile", "run-a").await.unwrap());
    }

    #[tokio::test]
    async fn lease_is_exclusive_across_handles_opened_together() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");
        let first = JsonFileStore::open(&path).unwrap();
        let second = JsonFileStore::open(&path).unwrap();

        let a = first
            .try_acquire_lease("reconcile", "run-a", Duration::minutes(5))
            .await
            .unwrap();
        let b = second
            .try_acquire_lease("reconcile", "run-b", Duration::minutes(5))
            .await
            .unwrap();
        assert!(a.is_some());
        assert!(b.is_none());

        assert!(!second.release_lease("reconcile", "run-b").await.unwrap());
        assert!(first.release_lease("reconcile", "run-a").await.unwrap());
        assert!(second
            .try_acquire_lease("reconcile", "run-b", Duration::minutes(5))
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn concurrent_lease_attempts_have_one_winner() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("store.json");

        let mut handles = Vec::new();
        for i in 0..8 {
            let store = JsonFileStore::open(&path).unwrap();
            handles.push(std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .build()
                    .unwrap();
                rt.block_on(store.try_acquire_lease(
                    "reconcile",
                    &format!("run-{}", i),
                    Duration::minutes(5),
                ))
                .unwrap()
                .is_some()
            }));
        }
        let winners = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|won| *won)
            .count();
        assert_eq!(winners, 1);
    }
}
