use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use clipsync_core::Entity;

/// Current view state of every loaded entity of one type, keyed by id.
///
/// UI surfaces read from here; the executor writes optimistic, settled
/// and rolled-back states through it.
pub struct ViewStore<E> {
    entries: RwLock<HashMap<String, E>>,
}

impl<E: Entity> Default for ViewStore<E> {
    fn default() -> Self {
        ViewStore {
            entries: RwLock::new(HashMap::new()),
        }
    }
}

impl<E: Entity> ViewStore<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &str) -> Option<E> {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Store `entity` as is, replacing any previous state for its id.
    pub fn insert(&self, entity: E) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(entity.key().to_string(), entity);
    }

    /// Apply a canonical copy fetched from the server.
    ///
    /// Replaces the held state wholesale except where the entity's
    /// [`Entity::reconcile`] keeps a local field. Returns the stored state.
    pub fn refresh(&self, canonical: E) -> E {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let next = match entries.get(canonical.key()) {
            Some(local) => E::reconcile(local, canonical),
            None => canonical,
        };
        entries.insert(next.key().to_string(), next.clone());
        next
    }

    pub fn remove(&self, id: &str) -> Option<E> {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
