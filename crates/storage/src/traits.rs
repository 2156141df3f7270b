use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StorageError;

/// Local persistent key-value storage.
///
/// The queue stores its whole state as one string value under a single
/// namespaced key, so backends only need whole-value reads and writes.
///
/// ## Durability
///
/// `set` must not return `Ok` until the value is durable, and a concurrent
/// or subsequent `get` must never observe a partially written value.
///
/// ## Thread Safety
///
/// Implementations must be `Send + Sync + 'static` so they can be shared
/// behind an `Arc` across async tasks.
#[async_trait]
pub trait KeyValueStorage: Send + Sync + 'static {
    /// Read the value under `key`, or `None` if nothing was ever written.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Overwrite the value under `key`.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the value under `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<(), StorageError>;
}

#[async_trait]
impl<T: KeyValueStorage + ?Sized> KeyValueStorage for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<(), StorageError> {
        (**self).remove(key).await
    }
}
