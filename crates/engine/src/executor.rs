//! The optimistic command combinator every interactive verb goes through.
//!
//! ```text
//! Synced ──apply──▶ OptimisticPending ──offline──▶ QueuedOffline ──drain ok──▶ Synced
//!                        │
//!                        ├── remote ok ──▶ Synced            (canonical merged in)
//!                        └── remote err ─▶ RolledBack ──▶ Synced (previous restored)
//! ```

use std::future::Future;
use std::sync::Arc;

use clipsync_core::{Entity, Mutation};
use clipsync_storage::KeyValueStorage;

use crate::bus::{EntityEvent, EventBus, EventCause, EventKind};
use crate::connectivity::Connectivity;
use crate::error::{CommandError, RemoteError};
use crate::queue::{Enqueued, MutationQueue};
use crate::store::ViewStore;

/// How failures of the remote call are treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// User-initiated: failures roll back and are returned to the caller.
    Required,
    /// Telemetry-like: failures roll back and are swallowed.
    BestEffort,
}

/// Where a command ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The server accepted it and the canonical state is in place.
    Synced,
    /// Offline: the optimistic state stays and the mutation waits for a drain.
    Queued(Enqueued),
    /// A best-effort action failed; the counters are back where they were.
    Discarded(RemoteError),
    /// The command does not apply to the entity's current state, e.g. a
    /// second reclip. Nothing was changed.
    Ignored { reason: String },
}

type Transform<E> = Box<dyn FnOnce(&E) -> E + Send>;
type Detail<E> = Box<dyn Fn(&E) -> serde_json::Value + Send + Sync>;
type Effect = Box<dyn FnOnce() + Send>;

/// One optimistic action against one entity.
pub struct Command<E> {
    entity_id: String,
    event: EventKind,
    mutation: Mutation,
    delivery: Delivery,
    transform: Transform<E>,
    announce_as: Option<String>,
    detail: Option<Detail<E>>,
    alongside: Option<(Effect, Effect)>,
}

impl<E: Entity> Command<E> {
    /// `transform` computes the optimistic state from the current one and
    /// `mutation` is what gets queued if the device is offline.
    pub fn new<F>(entity_id: &str, mutation: Mutation, transform: F) -> Self
    where
        F: FnOnce(&E) -> E + Send + 'static,
    {
        Command {
            entity_id: entity_id.to_string(),
            event: EventKind::from(mutation.kind),
            mutation,
            delivery: Delivery::Required,
            transform: Box::new(transform),
            announce_as: None,
            detail: None,
            alongside: None,
        }
    }

    pub fn best_effort(mut self) -> Self {
        self.delivery = Delivery::BestEffort;
        self
    }

    /// Publish events under `id` instead of the store key, e.g. a comment id
    /// for a like on a comment held inside a thread.
    pub fn announce_as(mut self, id: &str) -> Self {
        self.announce_as = Some(id.to_string());
        self
    }

    /// Event payload computed from the settled or restored entity.
    pub fn with_detail<F>(mut self, detail: F) -> Self
    where
        F: Fn(&E) -> serde_json::Value + Send + Sync + 'static,
    {
        self.detail = Some(Box::new(detail));
        self
    }

    /// A change to state outside the entity that goes with the optimistic
    /// transform: `apply` runs right after it, `undo` when the command is
    /// rolled back (before the rollback is announced).
    pub fn alongside<A, U>(mut self, apply: A, undo: U) -> Self
    where
        A: FnOnce() + Send + 'static,
        U: FnOnce() + Send + 'static,
    {
        self.alongside = Some((Box::new(apply), Box::new(undo)));
        self
    }

    pub fn entity_id(&self) -> &str {
        &self.entity_id
    }

    pub fn mutation(&self) -> &Mutation {
        &self.mutation
    }
}

/// Runs [`Command`]s: applies them locally at once, then confirms them with
/// the server or defers them to the queue.
pub struct OptimisticExecutor<S> {
    queue: Arc<MutationQueue<S>>,
    connectivity: Arc<dyn Connectivity>,
    bus: EventBus,
}

impl<S: KeyValueStorage> OptimisticExecutor<S> {
    pub fn new(
        queue: Arc<MutationQueue<S>>,
        connectivity: Arc<dyn Connectivity>,
        bus: EventBus,
    ) -> Self {
        OptimisticExecutor {
            queue,
            connectivity,
            bus,
        }
    }

    pub fn queue(&self) -> &Arc<MutationQueue<S>> {
        &self.queue
    }

    pub fn connectivity(&self) -> &Arc<dyn Connectivity> {
        &self.connectivity
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    /// Execute `command` against the entity held in `store`.
    ///
    /// Online, `remote` is awaited. On success `settle` merges its response
    /// into the current local state; on failure the state captured before
    /// the optimistic transform is restored exactly. Offline, the mutation
    /// is queued and the optimistic state stays until a drain replays it;
    /// if queueing fails the state is restored and the storage error
    /// returned.
    ///
    /// An [`EntityEvent`] is published once the entity is settled or
    /// restored, never for the queued optimistic state.
    pub async fn execute<E, R, Fut>(
        &self,
        store: &ViewStore<E>,
        command: Command<E>,
        remote: impl FnOnce() -> Fut,
        settle: impl FnOnce(&E, R) -> E,
    ) -> Result<Outcome, CommandError>
    where
        E: Entity,
        Fut: Future<Output = Result<R, RemoteError>>,
    {
        let Command {
            entity_id,
            event,
            mutation,
            delivery,
            transform,
            announce_as,
            detail,
            alongside,
        } = command;
        mutation.validate()?;

        let previous = store
            .get(&entity_id)
            .ok_or_else(|| CommandError::UnknownEntity {
                entity_id: entity_id.clone(),
            })?;
        let optimistic = transform(&previous);
        store.insert(optimistic.clone());
        let undo = alongside.map(|(apply, undo)| {
            apply();
            undo
        });

        let announcer = Announcer {
            bus: &self.bus,
            kind: event,
            entity_id: announce_as.as_deref().unwrap_or(&entity_id),
            detail: detail.as_deref(),
        };
        let kind = mutation.kind;

        if !self.connectivity.is_online() {
            return match self.queue.enqueue(mutation).await {
                Ok(enqueued) => Ok(Outcome::Queued(enqueued)),
                Err(e) => {
                    store.insert(previous);
                    if let Some(undo) = undo {
                        undo();
                    }
                    tracing::warn!(kind = %kind, entity_id = %entity_id, error = %e, "could not queue mutation; rolled back");
                    Err(e.into())
                }
            };
        }

        match remote().await {
            Ok(response) => {
                let current = store.get(&entity_id).unwrap_or(optimistic);
                let settled = settle(&current, response);
                store.insert(settled.clone());
                announcer.publish(&settled, EventCause::Confirmed);
                Ok(Outcome::Synced)
            }
            Err(error) => {
                store.insert(previous.clone());
                if let Some(undo) = undo {
                    undo();
                }
                announcer.publish(&previous, EventCause::RolledBack);
                match delivery {
                    Delivery::BestEffort => {
                        tracing::debug!(kind = %kind, entity_id = %entity_id, error = %error, "best-effort action dropped");
                        Ok(Outcome::Discarded(error))
                    }
                    Delivery::Required => {
                        tracing::warn!(kind = %kind, entity_id = %entity_id, error = %error, "remote action failed; rolled back");
                        Err(CommandError::Remote {
                            kind,
                            entity_id,
                            source: error,
                        })
                    }
                }
            }
        }
    }
}

struct Announcer<'a, E> {
    bus: &'a EventBus,
    kind: EventKind,
    entity_id: &'a str,
    detail: Option<&'a (dyn Fn(&E) -> serde_json::Value + Send + Sync)>,
}

impl<E> Announcer<'_, E> {
    fn publish(&self, entity: &E, cause: EventCause) {
        let detail = self
            .detail
            .map_or(serde_json::Value::Null, |detail| detail(entity));
        self.bus.publish(&EntityEvent {
            kind: self.kind,
            entity_id: self.entity_id.to_string(),
            detail,
            cause,
        });
    }
}
