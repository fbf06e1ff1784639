use async_trait::async_trait;
use fasset_flow_types::{RequestId, StoredRecord};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::StoreError;

// ═══════════════════════════════════════════════════════════════════════════
// STORE TRAIT
// ═══════════════════════════════════════════════════════════════════════════

/// Storage of open request records, keyed by protocol request id
#[async_trait]
pub trait RecordStore<R: StoredRecord>: Send + Sync {
    /// Insert or overwrite a record
    async fn save(&self, record: &R) -> Result<(), StoreError>;

    async fn get(&self, id: RequestId) -> Result<Option<R>, StoreError>;

    /// Remove a record; returns whether it existed
    async fn remove(&self, id: RequestId) -> Result<bool, StoreError>;

    async fn records(&self) -> Result<Vec<R>, StoreError>;

    async fn ids(&self) -> Result<BTreeSet<RequestId>, StoreError> {
        Ok(self.records().await?.iter().map(|r| r.request_id()).collect())
    }

    /// Record that must exist
    async fn require(&self, id: RequestId) -> Result<R, StoreError> {
        self.get(id).await?.ok_or(StoreError::NotFound { kind: R::KIND, id })
    }

    /// Ids stored now but absent from `previous`
    async fn new_ids(&self, previous: &BTreeSet<RequestId>) -> Result<BTreeSet<RequestId>, StoreError> {
        Ok(self.ids().await?.difference(previous).copied().collect())
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// JSON FILE STORE
// ═══════════════════════════════════════════════════════════════════════════

/// One pretty-printed `{request_id}.json` file per record under
/// `{root}/{user}/{kind}/`
pub struct JsonFileStore<R> {
    dir: PathBuf,
    _record: PhantomData<fn() -> R>,
}

impl<R: StoredRecord> JsonFileStore<R> {
    pub fn new(root: impl AsRef<Path>, user: &str) -> Self {
        Self {
            dir: root.as_ref().join(user).join(R::KIND.to_string()),
            _record: PhantomData,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, id: RequestId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }
}

#[async_trait]
impl<R: StoredRecord> RecordStore<R> for JsonFileStore<R> {
    async fn save(&self, record: &R) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(record.request_id());
        let json = serde_json::to_string_pretty(record)?;
        tokio::fs::write(&path, json).await?;
        debug!(path = %path.display(), "Saved record");
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<R>, StoreError> {
        match tokio::fs::read_to_string(self.path(id)).await {
            Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn remove(&self, id: RequestId) -> Result<bool, StoreError> {
        match tokio::fs::remove_file(self.path(id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn records(&self) -> Result<Vec<R>, StoreError> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let content = tokio::fs::read_to_string(&path).await?;
            records.push(serde_json::from_str::<R>(&content)?);
        }
        records.sort_by_key(|r| r.request_id());
        Ok(records)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// IN-MEMORY STORE (for testing and simulation)
// ═══════════════════════════════════════════════════════════════════════════

pub struct InMemoryRecordStore<R> {
    records: Arc<RwLock<BTreeMap<RequestId, R>>>,
}

impl<R: StoredRecord> InMemoryRecordStore<R> {
    pub fn new() -> Self {
        Self {
            records: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

impl<R: StoredRecord> Default for InMemoryRecordStore<R> {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<R: StoredRecord> RecordStore<R> for InMemoryRecordStore<R> {
    async fn save(&self, record: &R) -> Result<(), StoreError> {
        self.records
            .write()
            .await
            .insert(record.request_id(), record.clone());
        Ok(())
    }

    async fn get(&self, id: RequestId) -> Result<Option<R>, StoreError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn remove(&self, id: RequestId) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }

    async fn records(&self) -> Result<Vec<R>, StoreError> {
        Ok(self.records.read().await.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fasset_flow_types::MintRecord;

    fn record(id: RequestId) -> MintRecord {
        MintRecord {
            request_id: id,
            payment_address: "rAgent".to_string(),
            transaction_hash: format!("0x{id:064x}"),
            executor_address: "0x0000000000000000000000000000000000000000".to_string(),
            created_at: "2023-11-14T22:13:20.000Z".to_string(),
            lots: 2,
        }
    }

    #[tokio::test]
    async fn test_json_store_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let store: JsonFileStore<MintRecord> = JsonFileStore::new(dir.path(), "user_0");

        assert!(store.records().await.unwrap().is_empty());
        assert!(store.get(1).await.unwrap().is_none());

        store.save(&record(7)).await.unwrap();
        store.save(&record(3)).await.unwrap();
        assert!(store.dir().ends_with("user_0/mint"));

        let ids: Vec<_> = store.records().await.unwrap().iter().map(|r| r.request_id).collect();
        assert_eq!(ids, vec![3, 7]);
        assert_eq!(store.require(7).await.unwrap(), record(7));

        assert!(store.remove(7).await.unwrap());
        assert!(!store.remove(7).await.unwrap());
        assert!(matches!(
            store.require(7).await,
            Err(StoreError::NotFound { id: 7, .. })
        ));
    }

    #[tokio::test]
    async fn test_new_ids() {
        let store = InMemoryRecordStore::new();
        store.save(&record(1)).await.unwrap();
        let before = store.ids().await.unwrap();

        store.save(&record(2)).await.unwrap();
        store.save(&record(5)).await.unwrap();

        assert_eq!(store.new_ids(&before).await.unwrap(), BTreeSet::from([2, 5]));
        assert_eq!(store.len().await, 3);
    }
}
