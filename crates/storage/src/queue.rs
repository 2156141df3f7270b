use clipsync_core::MutationRecord;
use tokio::sync::Mutex;

use crate::error::StorageError;
use crate::traits::KeyValueStorage;

/// The ordered list of pending mutation records, persisted as one JSON
/// array under a single key.
///
/// ## Single Writer
///
/// Every operation takes the same async mutex for its whole
/// read-modify-write, including the awaits on the backend. Two `update`
/// calls issued concurrently from one process therefore run one after the
/// other and neither append can be lost to a last-write-wins overwrite.
///
/// ## Commit Semantics
///
/// A change is committed only when the backend's `set` returns `Ok`. On
/// error the previously stored queue is still the current one.
pub struct DurableQueue<S> {
    storage: S,
    key: String,
    writer: Mutex<()>,
}

impl<S: KeyValueStorage> DurableQueue<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        DurableQueue {
            storage,
            key: key.into(),
            writer: Mutex::new(()),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Snapshot of the queue in replay order.
    pub async fn get(&self) -> Result<Vec<MutationRecord>, StorageError> {
        let _writer = self.writer.lock().await;
        self.load().await
    }

    /// Replace the whole queue.
    pub async fn set(&self, records: Vec<MutationRecord>) -> Result<(), StorageError> {
        let _writer = self.writer.lock().await;
        self.store(&records).await
    }

    /// Atomically read, transform and write back the queue.
    ///
    /// Returns the queue as committed.
    pub async fn update<F>(&self, transform: F) -> Result<Vec<MutationRecord>, StorageError>
    where
        F: FnOnce(Vec<MutationRecord>) -> Vec<MutationRecord> + Send,
    {
        let _writer = self.writer.lock().await;
        let current = self.load().await?;
        let next = transform(current);
        self.store(&next).await?;
        Ok(next)
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        Ok(self.get().await?.len())
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        Ok(self.len().await? == 0)
    }

    async fn load(&self) -> Result<Vec<MutationRecord>, StorageError> {
        let Some(raw) = self.storage.get(&self.key).await? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).map_err(|e| {
            tracing::warn!(key = %self.key, error = %e, "persisted queue is not valid JSON");
            StorageError::Corrupt {
                key: self.key.clone(),
                reason: e.to_string(),
            }
        })
    }

    async fn store(&self, records: &[MutationRecord]) -> Result<(), StorageError> {
        let raw = serde_json::to_string(records)
            .map_err(|e| StorageError::Backend(format!("could not encode queue: {e}")))?;
        self.storage.set(&self.key, &raw).await?;
        tracing::debug!(key = %self.key, len = records.len(), "queue persisted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use clipsync_core::Mutation;

    use super::*;
    use crate::MemoryStorage;

    fn record(id: &str, mutation: Mutation) -> MutationRecord {
        MutationRecord {
            id: id.to_string(),
            at: 0,
            mutation,
        }
    }

    #[tokio::test]
    async fn missing_key_reads_as_empty() {
        let queue = DurableQueue::new(MemoryStorage::new(), "q");
        assert!(queue.get().await.unwrap().is_empty());
        assert!(queue.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn update_returns_committed_queue() {
        let queue = DurableQueue::new(MemoryStorage::new(), "q");
        let committed = queue
            .update(|mut q| {
                q.push(record("a", Mutation::like("P1", "u")));
                q
            })
            .await
            .unwrap();
        assert_eq!(committed.len(), 1);
        assert_eq!(queue.get().await.unwrap(), committed);
    }

    #[tokio::test]
    async fn persisted_value_is_a_json_array() {
        let storage = Arc::new(MemoryStorage::new());
        let queue = DurableQueue::new(storage.clone(), "clipsync:mutations");
        queue
            .set(vec![record("a", Mutation::bookmark("P1", "u"))])
            .await
            .unwrap();
        let raw = storage.get("clipsync:mutations").await.unwrap().unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value[0]["type"], "bookmark");
        assert_eq!(value[0]["postId"], "P1");
    }

    #[tokio::test]
    async fn corrupt_value_is_reported_not_discarded() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set("q", "{not json").await.unwrap();
        let queue = DurableQueue::new(storage.clone(), "q");

        let err = queue.update(|q| q).await.unwrap_err();
        assert!(matches!(err, StorageError::Corrupt { .. }));
        assert_eq!(
            storage.get("q").await.unwrap().as_deref(),
            Some("{not json")
        );
    }
}
