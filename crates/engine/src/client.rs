use std::sync::Arc;

use async_trait::async_trait;
use clipsync_core::{CommentThread, MutationRecord, Post};
use clipsync_storage::{KeyValueStorage, StorageError};
use tokio::task::JoinHandle;

use crate::bus::EventBus;
use crate::connectivity::Connectivity;
use crate::executor::OptimisticExecutor;
use crate::error::RemoteError;
use crate::queue::{DrainReport, MutationQueue, ReplayHandler};
use crate::remote::{RemoteActions, RemoteReplayer, Replayed};
use crate::store::ViewStore;

/// The signed-in user on whose behalf commands run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub user_id: String,
    pub user_handle: String,
}

impl Actor {
    pub fn new(user_id: &str, user_handle: &str) -> Self {
        Actor {
            user_id: user_id.to_string(),
            user_handle: user_handle.to_string(),
        }
    }
}

/// Entry point for UI surfaces: view state, verbs, events and draining.
///
/// The verbs live in `commands::post` and `commands::comment`.
pub struct ClipSync<S, R> {
    pub(crate) actor: Actor,
    pub(crate) executor: OptimisticExecutor<S>,
    pub(crate) remote: Arc<R>,
    pub(crate) posts: Arc<ViewStore<Post>>,
    pub(crate) threads: Arc<ViewStore<CommentThread>>,
}

impl<S: KeyValueStorage, R: RemoteActions> ClipSync<S, R> {
    pub fn new(
        actor: Actor,
        queue: Arc<MutationQueue<S>>,
        connectivity: Arc<dyn Connectivity>,
        remote: R,
    ) -> Self {
        ClipSync {
            actor,
            executor: OptimisticExecutor::new(queue, connectivity, EventBus::new()),
            remote: Arc::new(remote),
            posts: Arc::new(ViewStore::new()),
            threads: Arc::new(ViewStore::new()),
        }
    }

    pub fn actor(&self) -> &Actor {
        &self.actor
    }

    pub fn bus(&self) -> &EventBus {
        self.executor.bus()
    }

    pub fn queue(&self) -> &Arc<MutationQueue<S>> {
        self.executor.queue()
    }

    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        self.executor.connectivity()
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn posts(&self) -> &Arc<ViewStore<Post>> {
        &self.posts
    }

    pub fn threads(&self) -> &Arc<ViewStore<CommentThread>> {
        &self.threads
    }

    /// Replay everything queued while offline through the remote actions.
    ///
    /// Comments and replies created by the replay take the place of the
    /// placeholders they were queued for, and are announced as confirmed.
    pub async fn drain(&self) -> Result<DrainReport, StorageError> {
        let handler = Reconciling {
            sync: self,
            replayer: RemoteReplayer::new(self.remote.clone()),
        };
        self.queue().drain(&handler).await
    }

    /// Drain the queue on every committed transition to online.
    ///
    /// The task runs until it is aborted or the connectivity monitor goes
    /// away. A drain that stops on a failing record waits for the next
    /// transition; nothing is retried in between.
    pub fn spawn_reconnect_drain(self: &Arc<Self>) -> JoinHandle<()>
    where
        S: 'static,
        R: 'static,
    {
        let sync = Arc::clone(self);
        let mut online = self.connectivity().watch();
        tokio::spawn(async move {
            while online.changed().await.is_ok() {
                if !*online.borrow_and_update() {
                    continue;
                }
                match sync.drain().await {
                    Ok(report) if !report.is_complete() => {
                        tracing::info!(
                            replayed = report.replayed.len(),
                            "reconnect drain stopped early"
                        );
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!(error = %e, "reconnect drain failed"),
                }
            }
        })
    }
}

/// Replay handler used by [`ClipSync::drain`].
struct Reconciling<'a, S, R> {
    sync: &'a ClipSync<S, R>,
    replayer: RemoteReplayer<Arc<R>>,
}

#[async_trait]
impl<'a, S, R> ReplayHandler for Reconciling<'a, S, R>
where
    S: KeyValueStorage,
    R: RemoteActions,
{
    async fn replay(&self, record: &MutationRecord) -> Result<(), RemoteError> {
        let replayed = self.replayer.dispatch(record).await?;
        if let (Replayed::Comment(created), Some(pending)) =
            (replayed, record.mutation.placeholder_id.as_deref())
        {
            self.sync.settle_queued_comment(&record.mutation, pending, created);
        }
        Ok(())
    }
}
