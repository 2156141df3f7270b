//! Mutation enqueuer and drain loop over the durable queue.

use std::sync::Arc;

use async_trait::async_trait;
use clipsync_core::{
    Clock, Mutation, MutationKind, MutationRecord, QueueSettings, SystemClock,
};
use clipsync_storage::{DurableQueue, KeyValueStorage, StorageError};
use tokio::sync::Mutex;

use crate::error::{QueueError, RemoteError};

/// Replays one queued record against the server.
#[async_trait]
pub trait ReplayHandler: Send + Sync {
    async fn replay(&self, record: &MutationRecord) -> Result<(), RemoteError>;
}

#[async_trait]
impl<T: ReplayHandler + ?Sized> ReplayHandler for Arc<T> {
    async fn replay(&self, record: &MutationRecord) -> Result<(), RemoteError> {
        (**self).replay(record).await
    }
}

/// What `enqueue` did with a mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Enqueued {
    /// The record was appended at the tail of the queue.
    Appended(MutationRecord),
    /// The mutation was an opposite toggle of a still-pending record, which
    /// was removed instead. Only happens with coalescing enabled.
    Coalesced { cancelled: MutationRecord },
}

impl Enqueued {
    pub fn appended(&self) -> Option<&MutationRecord> {
        match self {
            Enqueued::Appended(record) => Some(record),
            Enqueued::Coalesced { .. } => None,
        }
    }
}

/// Why a drain stopped before reaching the end of its snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DrainAbort {
    pub record_id: String,
    pub kind: MutationKind,
    pub error: RemoteError,
}

/// Result of one drain cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Ids replayed and removed, in replay order.
    pub replayed: Vec<String>,
    pub aborted: Option<DrainAbort>,
}

impl DrainReport {
    pub fn is_complete(&self) -> bool {
        self.aborted.is_none()
    }
}

/// Offline mutation queue: appends new records and replays them in order.
///
/// Drains are serialized with each other, so two overlapping triggers (a
/// reconnect and a manual retry, say) never replay the same record twice.
pub struct MutationQueue<S> {
    store: DurableQueue<S>,
    clock: Arc<dyn Clock>,
    coalesce_toggles: bool,
    draining: Mutex<()>,
}

impl<S: KeyValueStorage> MutationQueue<S> {
    pub fn new(storage: S, key: impl Into<String>) -> Self {
        MutationQueue {
            store: DurableQueue::new(storage, key),
            clock: Arc::new(SystemClock),
            coalesce_toggles: false,
            draining: Mutex::new(()),
        }
    }

    pub fn from_settings(storage: S, settings: &QueueSettings) -> Self {
        Self::new(storage, settings.key.clone()).with_coalescing(settings.coalesce_toggles)
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Collapse an opposite toggle with a still-pending one.
    pub fn with_coalescing(mut self, enabled: bool) -> Self {
        self.coalesce_toggles = enabled;
        self
    }

    pub fn store(&self) -> &DurableQueue<S> {
        &self.store
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Stamp `mutation` with a fresh id and timestamp and append it.
    ///
    /// With coalescing enabled, a toggle matching a pending record of the
    /// same kind, target and user cancels that record instead. Coalescing
    /// is skipped while a drain is running, since the pending record may be
    /// in flight.
    pub async fn enqueue(&self, mutation: Mutation) -> Result<Enqueued, QueueError> {
        mutation.validate()?;
        let record = MutationRecord::stamp(mutation, self.clock.as_ref());

        let drain_guard = if self.coalesce_toggles && record.kind().is_toggle() {
            self.draining.try_lock().ok()
        } else {
            None
        };

        let result = if drain_guard.is_some() {
            self.append_or_cancel(record).await?
        } else {
            let appended = record.clone();
            self.store
                .update(move |mut records| {
                    records.push(appended);
                    records
                })
                .await?;
            Enqueued::Appended(record)
        };
        drop(drain_guard);

        match &result {
            Enqueued::Appended(record) => tracing::info!(
                record_id = %record.id,
                kind = %record.kind(),
                target = %record.target_id(),
                "mutation queued"
            ),
            Enqueued::Coalesced { cancelled } => tracing::info!(
                record_id = %cancelled.id,
                kind = %cancelled.kind(),
                target = %cancelled.target_id(),
                "opposite toggle cancelled pending mutation"
            ),
        }
        Ok(result)
    }

    async fn append_or_cancel(&self, record: MutationRecord) -> Result<Enqueued, StorageError> {
        let mut cancelled = None;
        let slot = &mut cancelled;
        let appended = record.clone();
        self.store
            .update(move |mut records| {
                let pending = records.iter().rposition(|r| cancels(r, &appended));
                match pending {
                    Some(i) => *slot = Some(records.remove(i)),
                    None => records.push(appended),
                }
                records
            })
            .await?;
        Ok(match cancelled {
            Some(cancelled) => Enqueued::Coalesced { cancelled },
            None => Enqueued::Appended(record),
        })
    }

    /// Pending records in replay order.
    pub async fn pending(&self) -> Result<Vec<MutationRecord>, StorageError> {
        self.store.get().await
    }

    pub async fn len(&self) -> Result<usize, StorageError> {
        self.store.len().await
    }

    pub async fn is_empty(&self) -> Result<bool, StorageError> {
        self.store.is_empty().await
    }

    /// Replay the queue through `handler`, oldest first.
    ///
    /// Works from a snapshot taken at the start; records appended meanwhile
    /// wait for the next drain. Each successful replay removes its record by
    /// id. The first failure stops the loop and leaves that record and
    /// everything after it queued in their original order.
    ///
    /// A storage error is returned as `Err`; a replay failure is not an error
    /// and is reported through [`DrainReport::aborted`].
    pub async fn drain<H>(&self, handler: &H) -> Result<DrainReport, StorageError>
    where
        H: ReplayHandler + ?Sized,
    {
        let _draining = self.draining.lock().await;
        let snapshot = self.store.get().await?;
        let mut report = DrainReport::default();

        for record in snapshot {
            if let Err(error) = handler.replay(&record).await {
                tracing::warn!(
                    record_id = %record.id,
                    kind = %record.kind(),
                    error = %error,
                    "replay failed; drain stopped"
                );
                report.aborted = Some(DrainAbort {
                    kind: record.kind(),
                    record_id: record.id,
                    error,
                });
                break;
            }

            let id = record.id.clone();
            self.store
                .update(move |records| records.into_iter().filter(|r| r.id != id).collect())
                .await?;
            tracing::debug!(record_id = %record.id, kind = %record.kind(), "mutation replayed");
            report.replayed.push(record.id);
        }

        if !report.replayed.is_empty() || report.aborted.is_some() {
            tracing::info!(
                replayed = report.replayed.len(),
                complete = report.is_complete(),
                "drain finished"
            );
        }
        Ok(report)
    }
}

fn cancels(pending: &MutationRecord, incoming: &MutationRecord) -> bool {
    pending.kind() == incoming.kind()
        && pending.target_id() == incoming.target_id()
        && pending.user_id() == incoming.user_id()
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use clipsync_core::ManualClock;
    use clipsync_storage::MemoryStorage;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        seen: StdMutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl ReplayHandler for Recorder {
        async fn replay(&self, record: &MutationRecord) -> Result<(), RemoteError> {
            self.seen.lock().unwrap().push(record.id.clone());
            if self.fail_on.as_deref() == Some(record.id.as_str()) {
                return Err(RemoteError::Network {
                    reason: "offline".into(),
                });
            }
            Ok(())
        }
    }

    fn queue() -> MutationQueue<MemoryStorage> {
        MutationQueue::new(MemoryStorage::new(), "test:mutations")
            .with_clock(Arc::new(ManualClock::new(1_000)))
    }

    #[tokio::test]
    async fn enqueue_stamps_id_and_time() {
        let q = queue();
        let out = q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        let record = out.appended().unwrap();
        assert_eq!(record.at, 1_000);
        assert_eq!(record.id.len(), 36);
        assert_eq!(q.pending().await.unwrap(), vec![record.clone()]);
    }

    #[tokio::test]
    async fn enqueue_rejects_incomplete_mutation() {
        let q = queue();
        let err = q.enqueue(Mutation::comment("P1", "u1", "")).await.unwrap_err();
        assert!(matches!(err, QueueError::InvalidMutation(_)));
        assert!(q.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn toggles_are_not_merged_by_default() {
        let q = queue();
        q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        assert_eq!(q.len().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn coalescing_cancels_opposite_toggle() {
        let q = queue().with_coalescing(true);
        let first = q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        q.enqueue(Mutation::bookmark("P1", "u1")).await.unwrap();
        let second = q.enqueue(Mutation::like("P1", "u1")).await.unwrap();

        match second {
            Enqueued::Coalesced { cancelled } => {
                assert_eq!(Some(&cancelled), first.appended());
            }
            other => panic!("expected coalesced, got {other:?}"),
        }
        let kinds: Vec<_> = q.pending().await.unwrap().iter().map(|r| r.kind()).collect();
        assert_eq!(kinds, vec![MutationKind::Bookmark]);
    }

    #[tokio::test]
    async fn coalescing_leaves_non_toggles_alone() {
        let q = queue().with_coalescing(true);
        q.enqueue(Mutation::view("P1", "u1")).await.unwrap();
        q.enqueue(Mutation::view("P1", "u1")).await.unwrap();
        q.enqueue(Mutation::like("P1", "u2")).await.unwrap();
        q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        assert_eq!(q.len().await.unwrap(), 4);
    }

    #[tokio::test]
    async fn drain_replays_in_order_and_empties_queue() {
        let q = queue();
        let mut ids = Vec::new();
        for post in ["P1", "P2", "P3"] {
            let out = q.enqueue(Mutation::share(post, "u1")).await.unwrap();
            ids.push(out.appended().unwrap().id.clone());
        }
        let handler = Recorder::default();
        let report = q.drain(&handler).await.unwrap();

        assert!(report.is_complete());
        assert_eq!(report.replayed, ids);
        assert_eq!(*handler.seen.lock().unwrap(), ids);
        assert!(q.is_empty().await.unwrap());
    }

    #[tokio::test]
    async fn drain_stops_at_first_failure() {
        let q = queue();
        let mut ids = Vec::new();
        for post in ["P1", "P2", "P3", "P4"] {
            let out = q.enqueue(Mutation::like(post, "u1")).await.unwrap();
            ids.push(out.appended().unwrap().id.clone());
        }
        let handler = Recorder {
            fail_on: Some(ids[1].clone()),
            ..Recorder::default()
        };
        let report = q.drain(&handler).await.unwrap();

        assert_eq!(report.replayed, vec![ids[0].clone()]);
        let abort = report.aborted.unwrap();
        assert_eq!(abort.record_id, ids[1]);
        assert_eq!(abort.kind, MutationKind::Like);
        assert_eq!(handler.seen.lock().unwrap().len(), 2);

        let remaining: Vec<_> = q.pending().await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(remaining, ids[1..].to_vec());
    }

    #[tokio::test]
    async fn drain_abort_names_the_failing_record() {
        let q = queue();
        q.enqueue(Mutation::like("P1", "u1")).await.unwrap();
        let failing = q
            .enqueue(Mutation::comment("P1", "u1", "hi"))
            .await
            .unwrap()
            .appended()
            .unwrap()
            .id
            .clone();
        let handler = Recorder {
            fail_on: Some(failing.clone()),
            ..Recorder::default()
        };

        let abort = q.drain(&handler).await.unwrap().aborted.unwrap();
        assert_eq!(abort.record_id, failing);
        assert_eq!(abort.kind, MutationKind::Comment);
    }

    #[tokio::test]
    async fn drain_of_empty_queue_is_a_no_op() {
        let q = queue();
        let report = q.drain(&Recorder::default()).await.unwrap();
        assert_eq!(report, DrainReport::default());
    }
}
