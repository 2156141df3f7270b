use std::future::Future;
use std::sync::Arc;

use clipsync_core::Mutation;

use super::{make_record, TestResult, QUEUE_KEY};
use crate::{DurableQueue, KeyValueStorage, StorageError};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    vec![
        TestResult::from_result(
            "error",
            "corrupt_queue_get_returns_corrupt",
            corrupt_queue_get_returns_corrupt(factory).await,
        ),
        TestResult::from_result(
            "error",
            "corrupt_queue_update_leaves_bytes",
            corrupt_queue_update_leaves_bytes(factory).await,
        ),
        TestResult::from_result(
            "error",
            "wrong_json_shape_is_corrupt",
            wrong_json_shape_is_corrupt(factory).await,
        ),
    ]
}

async fn corrupt_queue_get_returns_corrupt<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .set(QUEUE_KEY, "[{\"id\":")
        .await
        .map_err(|e| format!("seed: {e}"))?;
    let queue = DurableQueue::new(storage, QUEUE_KEY);
    match queue.get().await {
        Err(StorageError::Corrupt { key, .. }) if key == QUEUE_KEY => Ok(()),
        other => Err(format!("expected Corrupt for {QUEUE_KEY}, got {other:?}")),
    }
}

async fn corrupt_queue_update_leaves_bytes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .set(QUEUE_KEY, "garbage")
        .await
        .map_err(|e| format!("seed: {e}"))?;
    let queue = DurableQueue::new(storage.clone(), QUEUE_KEY);
    let record = make_record("a", Mutation::like("P1", "u"));
    let result = queue
        .update(move |mut q| {
            q.push(record);
            q
        })
        .await;
    if !matches!(result, Err(StorageError::Corrupt { .. })) {
        return Err(format!("expected Corrupt from update, got {result:?}"));
    }
    let raw = storage.get(QUEUE_KEY).await.map_err(|e| format!("get: {e}"))?;
    if raw.as_deref() != Some("garbage") {
        return Err(format!("corrupt bytes were overwritten: {raw:?}"));
    }
    Ok(())
}

async fn wrong_json_shape_is_corrupt<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: KeyValueStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    storage
        .set(QUEUE_KEY, r#"{"id":"a","type":"like"}"#)
        .await
        .map_err(|e| format!("seed: {e}"))?;
    let queue = DurableQueue::new(storage, QUEUE_KEY);
    match queue.get().await {
        Err(StorageError::Corrupt { .. }) => Ok(()),
        other => Err(format!("expected Corrupt for non-array value, got {other:?}")),
    }
}
